//! Storage capabilities used by the dispatch pipeline.
//!
//! Each trait has a PostgreSQL implementation (`crate::postgres`) and an
//! in-memory one (`crate::memory`) with identical semantics.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use relay_common::error::AppError;
use relay_common::types::{
    ConnectTelegramInput, CreateOrderInput, Integration, Order, OrderListItem, SendStats,
    TelegramSendStatus,
};

/// Per-shop Telegram credentials and enablement.
#[async_trait]
pub trait IntegrationRepository: Send + Sync {
    /// Create or fully replace the shop's integration. Last write wins.
    async fn upsert(
        &self,
        shop_id: i64,
        input: &ConnectTelegramInput,
    ) -> Result<Integration, AppError>;

    /// `Ok(None)` when the shop never connected a bot.
    async fn get_by_shop_id(&self, shop_id: i64) -> Result<Option<Integration>, AppError>;
}

/// Order records and the paginated listing joined with send status.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persist an already validated order.
    async fn create(&self, shop_id: i64, input: &CreateOrderInput) -> Result<Order, AppError>;

    /// Newest first, ties broken by id descending.
    async fn list(
        &self,
        shop_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<OrderListItem>, AppError>;
}

/// Delivery reservations and outcomes, unique per (shop_id, order_id).
#[async_trait]
pub trait SendLogRepository: Send + Sync {
    /// Atomically claim the right to deliver a notification for an order.
    ///
    /// Exactly one caller per key ever gets `Ok(true)`. A key that is
    /// already present yields `Ok(false)`, not an error.
    async fn reserve(
        &self,
        shop_id: i64,
        order_id: i64,
        message: &str,
        reserved_at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    /// Record the terminal outcome of a reserved delivery.
    async fn finalize(
        &self,
        shop_id: i64,
        order_id: i64,
        status: TelegramSendStatus,
        error: Option<&str>,
        sent_at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// Finalized SENT/FAILED counts for rows at or after `since`.
    async fn stats(&self, shop_id: i64, since: DateTime<Utc>) -> Result<SendStats, AppError>;
}
