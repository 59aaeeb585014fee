//! In-memory repositories.
//!
//! Same contracts as the PostgreSQL implementations; used by tests and for
//! running the API without a database. Reservation uses a `DashMap` vacant
//! entry, which is the atomic insert-if-absent the Postgres unique key gives.

use std::cmp::Reverse;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use relay_common::error::AppError;
use relay_common::types::{
    ConnectTelegramInput, CreateOrderInput, Integration, Order, OrderListItem, RESERVED_SENTINEL,
    SendLogEntry, SendStats, SendStatus, TelegramSendStatus,
};

use crate::repository::{IntegrationRepository, OrderRepository, SendLogRepository};

#[derive(Default)]
pub struct MemoryIntegrationRepository {
    integrations: DashMap<i64, Integration>,
    next_id: AtomicI64,
}

impl MemoryIntegrationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IntegrationRepository for MemoryIntegrationRepository {
    async fn upsert(
        &self,
        shop_id: i64,
        input: &ConnectTelegramInput,
    ) -> Result<Integration, AppError> {
        let now = Utc::now();
        let mut integration = self.integrations.entry(shop_id).or_insert_with(|| Integration {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            shop_id,
            bot_token: String::new(),
            chat_id: String::new(),
            enabled: false,
            created_at: now,
            updated_at: now,
        });

        integration.bot_token = input.bot_token.clone();
        integration.chat_id = input.chat_id.clone();
        integration.enabled = input.enabled;
        integration.updated_at = now;

        Ok(integration.value().clone())
    }

    async fn get_by_shop_id(&self, shop_id: i64) -> Result<Option<Integration>, AppError> {
        Ok(self.integrations.get(&shop_id).map(|i| i.value().clone()))
    }
}

/// Orders kept in memory, joined against a [`MemorySendLogRepository`] on list.
pub struct MemoryOrderRepository {
    orders: DashMap<i64, Order>,
    next_id: AtomicI64,
    send_logs: Arc<MemorySendLogRepository>,
}

impl MemoryOrderRepository {
    pub fn new(send_logs: Arc<MemorySendLogRepository>) -> Self {
        Self {
            orders: DashMap::new(),
            next_id: AtomicI64::new(0),
            send_logs,
        }
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

#[async_trait]
impl OrderRepository for MemoryOrderRepository {
    async fn create(&self, shop_id: i64, input: &CreateOrderInput) -> Result<Order, AppError> {
        let order = Order {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            shop_id,
            number: input.number.clone(),
            total: input.total,
            customer_name: input.customer_name.clone(),
            created_at: Utc::now(),
        };
        self.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn list(
        &self,
        shop_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<OrderListItem>, AppError> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|o| o.shop_id == shop_id)
            .map(|o| o.value().clone())
            .collect();
        orders.sort_by_key(|o| Reverse((o.created_at, o.id)));

        let items = orders
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|order| {
                let send_status = self
                    .send_logs
                    .get(shop_id, order.id)
                    .map(|entry| SendStatus::from_log(entry.status, entry.error.as_deref()));
                OrderListItem { order, send_status }
            })
            .collect();

        Ok(items)
    }
}

#[derive(Default)]
pub struct MemorySendLogRepository {
    entries: DashMap<(i64, i64), SendLogEntry>,
}

impl MemorySendLogRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the row for an order, if one was ever reserved.
    pub fn get(&self, shop_id: i64, order_id: i64) -> Option<SendLogEntry> {
        self.entries
            .get(&(shop_id, order_id))
            .map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl SendLogRepository for MemorySendLogRepository {
    async fn reserve(
        &self,
        shop_id: i64,
        order_id: i64,
        message: &str,
        reserved_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        match self.entries.entry((shop_id, order_id)) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(SendLogEntry {
                    shop_id,
                    order_id,
                    message: message.to_string(),
                    status: TelegramSendStatus::Failed,
                    error: Some(RESERVED_SENTINEL.to_string()),
                    sent_at: reserved_at,
                });
                Ok(true)
            }
        }
    }

    async fn finalize(
        &self,
        shop_id: i64,
        order_id: i64,
        status: TelegramSendStatus,
        error: Option<&str>,
        sent_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        match self.entries.get_mut(&(shop_id, order_id)) {
            Some(mut entry) => {
                entry.status = status;
                entry.error = error.map(str::to_string);
                entry.sent_at = sent_at;
            }
            None => {
                tracing::warn!(shop_id, order_id, "Finalize matched no reserved send-log row");
            }
        }
        Ok(())
    }

    async fn stats(&self, shop_id: i64, since: DateTime<Utc>) -> Result<SendStats, AppError> {
        let mut stats = SendStats::default();

        for entry in self.entries.iter() {
            if entry.shop_id != shop_id || entry.sent_at < since || entry.is_reserved() {
                continue;
            }
            match entry.status {
                TelegramSendStatus::Sent => {
                    stats.sent_count += 1;
                    stats.last_sent_at = stats.last_sent_at.max(Some(entry.sent_at));
                }
                TelegramSendStatus::Failed => stats.failed_count += 1,
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn order_input(number: &str) -> CreateOrderInput {
        CreateOrderInput {
            number: number.to_string(),
            total: 10.0,
            customer_name: "Ann".to_string(),
        }
    }

    #[tokio::test]
    async fn test_upsert_then_get_round_trip() {
        let repo = MemoryIntegrationRepository::new();
        let input = ConnectTelegramInput {
            bot_token: "123:abc".to_string(),
            chat_id: "-100".to_string(),
            enabled: true,
        };
        repo.upsert(5, &input).await.unwrap();

        let stored = repo.get_by_shop_id(5).await.unwrap().unwrap();
        assert_eq!(stored.bot_token, "123:abc");
        assert_eq!(stored.chat_id, "-100");
        assert!(stored.enabled);
        assert!(repo.get_by_shop_id(6).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_replaces_and_keeps_identity() {
        let repo = MemoryIntegrationRepository::new();
        let first = repo
            .upsert(
                1,
                &ConnectTelegramInput {
                    bot_token: "old".to_string(),
                    chat_id: "a".to_string(),
                    enabled: true,
                },
            )
            .await
            .unwrap();
        let second = repo
            .upsert(
                1,
                &ConnectTelegramInput {
                    bot_token: "new".to_string(),
                    chat_id: "b".to_string(),
                    enabled: false,
                },
            )
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(second.bot_token, "new");
        assert!(!second.enabled);
    }

    #[tokio::test]
    async fn test_concurrent_reserve_single_winner() {
        let repo = Arc::new(MemorySendLogRepository::new());
        let mut handles = Vec::new();
        for _ in 0..32 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.reserve(1, 42, "msg", Utc::now()).await.unwrap()
            }));
        }

        let mut claimed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                claimed += 1;
            }
        }
        assert_eq!(claimed, 1);
        assert_eq!(repo.len(), 1);
        assert!(repo.get(1, 42).unwrap().is_reserved());
    }

    #[tokio::test]
    async fn test_stats_window_and_reserved_rows() {
        let repo = MemorySendLogRepository::new();
        let now = Utc::now();

        repo.reserve(1, 1, "m", now).await.unwrap();
        repo.finalize(1, 1, TelegramSendStatus::Sent, None, now)
            .await
            .unwrap();
        repo.reserve(1, 2, "m", now).await.unwrap();
        repo.finalize(1, 2, TelegramSendStatus::Failed, Some("timeout"), now)
            .await
            .unwrap();
        // still in flight
        repo.reserve(1, 3, "m", now).await.unwrap();
        // outside the window
        let old = now - Duration::days(10);
        repo.reserve(1, 4, "m", old).await.unwrap();
        repo.finalize(1, 4, TelegramSendStatus::Sent, None, old)
            .await
            .unwrap();
        // other shop
        repo.reserve(2, 5, "m", now).await.unwrap();
        repo.finalize(2, 5, TelegramSendStatus::Sent, None, now)
            .await
            .unwrap();

        let stats = repo.stats(1, now - Duration::days(7)).await.unwrap();
        assert_eq!(stats.sent_count, 1);
        assert_eq!(stats.failed_count, 1);
        assert_eq!(stats.last_sent_at, Some(now));
    }

    #[tokio::test]
    async fn test_list_orders_newest_first_with_status() {
        let send_logs = Arc::new(MemorySendLogRepository::new());
        let orders = MemoryOrderRepository::new(send_logs.clone());

        let a = orders.create(1, &order_input("A-1")).await.unwrap();
        let b = orders.create(1, &order_input("A-2")).await.unwrap();
        orders.create(2, &order_input("B-1")).await.unwrap();
        send_logs.reserve(1, b.id, "m", Utc::now()).await.unwrap();

        let items = orders.list(1, 10, 0).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].order.id, b.id);
        assert_eq!(items[0].send_status, Some(SendStatus::Pending));
        assert_eq!(items[1].order.id, a.id);
        assert_eq!(items[1].send_status, None);

        let page = orders.list(1, 1, 1).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].order.id, a.id);
    }
}
