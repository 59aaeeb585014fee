//! Dispatch service — order creation plus conditional notification send.
//!
//! `create_order` never waits on the transport: once the send-log row is
//! reserved, delivery is handed to a detached [`RetryDispatcher`] task and
//! the caller gets `pending` back.

use std::sync::Arc;

use chrono::{Duration, Utc};

use relay_common::error::AppError;
use relay_common::types::{
    ConnectTelegramInput, CreateOrderInput, Integration, ListOrdersResult, Order,
    OrderSendResult, SendStatus, TelegramStatus,
};
use relay_notifier::NotificationTransport;

use crate::repository::{IntegrationRepository, OrderRepository, SendLogRepository};
use crate::retry::{Delivery, RetryDispatcher, RetryPolicy};

pub const DEFAULT_PAGE_LIMIT: i64 = 20;
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Trailing window for the status summary counters.
const STATUS_WINDOW_DAYS: i64 = 7;

pub struct DispatchService {
    integrations: Arc<dyn IntegrationRepository>,
    orders: Arc<dyn OrderRepository>,
    send_logs: Arc<dyn SendLogRepository>,
    dispatcher: RetryDispatcher,
}

impl DispatchService {
    pub fn new(
        integrations: Arc<dyn IntegrationRepository>,
        orders: Arc<dyn OrderRepository>,
        send_logs: Arc<dyn SendLogRepository>,
        transport: Arc<dyn NotificationTransport>,
        policy: RetryPolicy,
    ) -> Self {
        let dispatcher = RetryDispatcher::new(transport, send_logs.clone(), policy);
        Self {
            integrations,
            orders,
            send_logs,
            dispatcher,
        }
    }

    /// Register or replace the shop's bot integration.
    pub async fn connect_telegram(
        &self,
        shop_id: i64,
        input: ConnectTelegramInput,
    ) -> Result<Integration, AppError> {
        let input = normalize_connect_input(input)?;
        let integration = self.integrations.upsert(shop_id, &input).await?;

        tracing::info!(
            shop_id,
            enabled = integration.enabled,
            "Telegram integration saved"
        );

        Ok(integration)
    }

    /// Persist an order and, when the shop has an enabled integration,
    /// reserve and dispatch its notification in the background.
    pub async fn create_order(
        &self,
        shop_id: i64,
        input: CreateOrderInput,
    ) -> Result<OrderSendResult, AppError> {
        let input = normalize_order_input(input)?;
        let order = self.orders.create(shop_id, &input).await?;

        let integration = match self.integrations.get_by_shop_id(shop_id).await? {
            Some(integration) if integration.enabled => integration,
            _ => {
                tracing::debug!(
                    shop_id,
                    order_id = order.id,
                    "No enabled integration, skipping notification"
                );
                return Ok(skipped(order));
            }
        };

        let message = format_order_message(&order);
        let claimed = self
            .send_logs
            .reserve(shop_id, order.id, &message, Utc::now())
            .await?;

        if !claimed {
            tracing::info!(
                shop_id,
                order_id = order.id,
                "Notification already reserved, skipping"
            );
            return Ok(skipped(order));
        }

        self.dispatcher.spawn(Delivery {
            shop_id,
            order_id: order.id,
            bot_token: integration.bot_token,
            chat_id: integration.chat_id,
            message,
        });

        Ok(OrderSendResult {
            order,
            send_status: SendStatus::Pending,
            send_error: None,
        })
    }

    /// One page of the shop's orders, newest first.
    pub async fn list_orders(
        &self,
        shop_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<ListOrdersResult, AppError> {
        let (limit, offset) = normalize_page(limit, offset);

        let mut items = self.orders.list(shop_id, limit + 1, offset).await?;
        let has_more = items.len() as i64 > limit;
        items.truncate(limit as usize);

        Ok(ListOrdersResult {
            items,
            limit,
            offset,
            has_more,
        })
    }

    /// Integration state plus delivery counters for the trailing week.
    pub async fn telegram_status(&self, shop_id: i64) -> Result<TelegramStatus, AppError> {
        let Some(integration) = self.integrations.get_by_shop_id(shop_id).await? else {
            return Ok(TelegramStatus::default());
        };

        let since = Utc::now() - Duration::days(STATUS_WINDOW_DAYS);
        let stats = self.send_logs.stats(shop_id, since).await?;

        Ok(TelegramStatus {
            enabled: integration.enabled,
            chat_id: integration.chat_id,
            last_sent_at: stats.last_sent_at,
            sent_count_7d: stats.sent_count,
            failed_count_7d: stats.failed_count,
        })
    }
}

fn skipped(order: Order) -> OrderSendResult {
    OrderSendResult {
        order,
        send_status: SendStatus::Skipped,
        send_error: None,
    }
}

/// Chat text for a new order.
pub fn format_order_message(order: &Order) -> String {
    format!(
        "Новый заказ {} на сумму {:.2} ₽, клиент {}",
        order.number, order.total, order.customer_name
    )
}

/// Clamp pagination: non-positive limit → default, cap at max, offset ≥ 0.
pub fn normalize_page(limit: i64, offset: i64) -> (i64, i64) {
    let limit = if limit <= 0 {
        DEFAULT_PAGE_LIMIT
    } else {
        limit.min(MAX_PAGE_LIMIT)
    };
    (limit, offset.max(0))
}

fn normalize_connect_input(input: ConnectTelegramInput) -> Result<ConnectTelegramInput, AppError> {
    let bot_token = input.bot_token.trim().to_string();
    let chat_id = input.chat_id.trim().to_string();

    if bot_token.is_empty() || chat_id.is_empty() {
        return Err(AppError::Validation(
            "botToken and chatId must be non-empty".to_string(),
        ));
    }

    Ok(ConnectTelegramInput {
        bot_token,
        chat_id,
        enabled: input.enabled,
    })
}

fn normalize_order_input(input: CreateOrderInput) -> Result<CreateOrderInput, AppError> {
    let number = input.number.trim().to_string();
    let customer_name = input.customer_name.trim().to_string();

    if number.is_empty() {
        return Err(AppError::Validation("number must be non-empty".to_string()));
    }
    if customer_name.is_empty() {
        return Err(AppError::Validation(
            "customerName must be non-empty".to_string(),
        ));
    }
    if !input.total.is_finite() || input.total <= 0.0 {
        return Err(AppError::Validation(
            "total must be greater than 0".to_string(),
        ));
    }

    Ok(CreateOrderInput {
        number,
        total: input.total,
        customer_name,
    })
}
