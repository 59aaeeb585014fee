//! PostgreSQL-backed repositories.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use relay_common::error::AppError;
use relay_common::types::{
    ConnectTelegramInput, CreateOrderInput, Integration, Order, OrderListItem, RESERVED_SENTINEL,
    SendStats, SendStatus, TelegramSendStatus,
};

use crate::repository::{IntegrationRepository, OrderRepository, SendLogRepository};

pub struct PgIntegrationRepository {
    pool: PgPool,
}

impl PgIntegrationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IntegrationRepository for PgIntegrationRepository {
    async fn upsert(
        &self,
        shop_id: i64,
        input: &ConnectTelegramInput,
    ) -> Result<Integration, AppError> {
        let integration: Integration = sqlx::query_as(
            r#"
            INSERT INTO telegram_integrations (shop_id, bot_token, chat_id, enabled, created_at, updated_at)
            VALUES ($1, $2, $3, $4, NOW(), NOW())
            ON CONFLICT (shop_id) DO UPDATE
            SET bot_token = EXCLUDED.bot_token,
                chat_id = EXCLUDED.chat_id,
                enabled = EXCLUDED.enabled,
                updated_at = NOW()
            RETURNING id, shop_id, bot_token, chat_id, enabled, created_at, updated_at
            "#,
        )
        .bind(shop_id)
        .bind(&input.bot_token)
        .bind(&input.chat_id)
        .bind(input.enabled)
        .fetch_one(&self.pool)
        .await?;

        Ok(integration)
    }

    async fn get_by_shop_id(&self, shop_id: i64) -> Result<Option<Integration>, AppError> {
        let integration: Option<Integration> = sqlx::query_as(
            r#"
            SELECT id, shop_id, bot_token, chat_id, enabled, created_at, updated_at
            FROM telegram_integrations
            WHERE shop_id = $1
            "#,
        )
        .bind(shop_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(integration)
    }
}

pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Order columns plus the left-joined send-log state.
#[derive(sqlx::FromRow)]
struct OrderListRow {
    id: i64,
    shop_id: i64,
    number: String,
    total: f64,
    customer_name: String,
    created_at: DateTime<Utc>,
    send_status: Option<String>,
    send_error: Option<String>,
}

impl From<OrderListRow> for OrderListItem {
    fn from(row: OrderListRow) -> Self {
        let send_status = row
            .send_status
            .as_deref()
            .and_then(TelegramSendStatus::parse)
            .map(|status| SendStatus::from_log(status, row.send_error.as_deref()));

        OrderListItem {
            order: Order {
                id: row.id,
                shop_id: row.shop_id,
                number: row.number,
                total: row.total,
                customer_name: row.customer_name,
                created_at: row.created_at,
            },
            send_status,
        }
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn create(&self, shop_id: i64, input: &CreateOrderInput) -> Result<Order, AppError> {
        let order: Order = sqlx::query_as(
            r#"
            INSERT INTO orders (shop_id, number, total, customer_name, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING id, shop_id, number, total, customer_name, created_at
            "#,
        )
        .bind(shop_id)
        .bind(&input.number)
        .bind(input.total)
        .bind(&input.customer_name)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(shop_id, order_id = order.id, "Order created");
        Ok(order)
    }

    async fn list(
        &self,
        shop_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<OrderListItem>, AppError> {
        let rows: Vec<OrderListRow> = sqlx::query_as(
            r#"
            SELECT
                o.id,
                o.shop_id,
                o.number,
                o.total,
                o.customer_name,
                o.created_at,
                tsl.status AS send_status,
                tsl.error AS send_error
            FROM orders o
            LEFT JOIN telegram_send_log tsl
                ON tsl.shop_id = o.shop_id AND tsl.order_id = o.id
            WHERE o.shop_id = $1
            ORDER BY o.created_at DESC, o.id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(shop_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(OrderListItem::from).collect())
    }
}

pub struct PgSendLogRepository {
    pool: PgPool,
}

impl PgSendLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SendLogRepository for PgSendLogRepository {
    async fn reserve(
        &self,
        shop_id: i64,
        order_id: i64,
        message: &str,
        reserved_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        // Single conditional insert; the unique key decides the winner.
        let result = sqlx::query(
            r#"
            INSERT INTO telegram_send_log (shop_id, order_id, message, status, error, sent_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (shop_id, order_id) DO NOTHING
            "#,
        )
        .bind(shop_id)
        .bind(order_id)
        .bind(message)
        .bind(TelegramSendStatus::Failed.as_str())
        .bind(RESERVED_SENTINEL)
        .bind(reserved_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn finalize(
        &self,
        shop_id: i64,
        order_id: i64,
        status: TelegramSendStatus,
        error: Option<&str>,
        sent_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE telegram_send_log
            SET status = $3, error = $4, sent_at = $5
            WHERE shop_id = $1 AND order_id = $2
            "#,
        )
        .bind(shop_id)
        .bind(order_id)
        .bind(status.as_str())
        .bind(error)
        .bind(sent_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::warn!(shop_id, order_id, "Finalize matched no reserved send-log row");
        }

        Ok(())
    }

    async fn stats(&self, shop_id: i64, since: DateTime<Utc>) -> Result<SendStats, AppError> {
        let (last_sent_at, sent_count, failed_count): (Option<DateTime<Utc>>, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    MAX(sent_at) FILTER (WHERE status = 'SENT') AS last_sent_at,
                    COUNT(*) FILTER (WHERE status = 'SENT') AS sent_count,
                    COUNT(*) FILTER (
                        WHERE status = 'FAILED' AND error IS DISTINCT FROM $3
                    ) AS failed_count
                FROM telegram_send_log
                WHERE shop_id = $1 AND sent_at >= $2
                "#,
            )
            .bind(shop_id)
            .bind(since)
            .bind(RESERVED_SENTINEL)
            .fetch_one(&self.pool)
            .await?;

        Ok(SendStats {
            last_sent_at,
            sent_count,
            failed_count,
        })
    }
}
