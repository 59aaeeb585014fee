use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Error text stored on a send-log row while its delivery is still in flight.
pub const RESERVED_SENTINEL: &str = "reserved";

/// Terminal status persisted in the send log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TelegramSendStatus {
    Sent,
    Failed,
}

impl TelegramSendStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TelegramSendStatus::Sent => "SENT",
            TelegramSendStatus::Failed => "FAILED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "SENT" => Some(TelegramSendStatus::Sent),
            "FAILED" => Some(TelegramSendStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for TelegramSendStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery status as reported to API callers.
///
/// `Pending` and `Skipped` are projections: the send log only stores
/// `SENT` / `FAILED` (plus the reservation sentinel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendStatus {
    Pending,
    Sent,
    Failed,
    Skipped,
}

impl SendStatus {
    /// Project a stored send-log row onto the caller-facing status.
    pub fn from_log(status: TelegramSendStatus, error: Option<&str>) -> Self {
        match status {
            TelegramSendStatus::Sent => SendStatus::Sent,
            TelegramSendStatus::Failed if error == Some(RESERVED_SENTINEL) => SendStatus::Pending,
            TelegramSendStatus::Failed => SendStatus::Failed,
        }
    }
}

impl std::fmt::Display for SendStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendStatus::Pending => write!(f, "pending"),
            SendStatus::Sent => write!(f, "sent"),
            SendStatus::Failed => write!(f, "failed"),
            SendStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// A shop's Telegram bot integration.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Integration {
    pub id: i64,
    pub shop_id: i64,
    /// Bot credentials; never echoed back over the API.
    #[serde(skip_serializing)]
    pub bot_token: String,
    pub chat_id: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An order placed in a shop. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    pub shop_id: i64,
    pub number: String,
    pub total: f64,
    pub customer_name: String,
    pub created_at: DateTime<Utc>,
}

/// An order joined with the current state of its notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderListItem {
    #[serde(flatten)]
    pub order: Order,
    /// `None` when no delivery was ever reserved for the order.
    pub send_status: Option<SendStatus>,
}

/// One row of the send log, keyed by (shop_id, order_id).
#[derive(Debug, Clone)]
pub struct SendLogEntry {
    pub shop_id: i64,
    pub order_id: i64,
    pub message: String,
    pub status: TelegramSendStatus,
    pub error: Option<String>,
    pub sent_at: DateTime<Utc>,
}

impl SendLogEntry {
    pub fn is_reserved(&self) -> bool {
        self.status == TelegramSendStatus::Failed
            && self.error.as_deref() == Some(RESERVED_SENTINEL)
    }
}

/// Aggregated send-log figures for a shop over a time window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SendStats {
    pub last_sent_at: Option<DateTime<Utc>>,
    pub sent_count: i64,
    pub failed_count: i64,
}

/// Request body for `POST /shops/{shop_id}/telegram/connect`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectTelegramInput {
    pub bot_token: String,
    pub chat_id: String,
    #[serde(default)]
    pub enabled: bool,
}

/// Request body for `POST /shops/{shop_id}/orders`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderInput {
    pub number: String,
    pub total: f64,
    pub customer_name: String,
}

/// Result of creating an order and (maybe) dispatching its notification.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSendResult {
    pub order: Order,
    pub send_status: SendStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_error: Option<String>,
}

/// One page of a shop's orders.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOrdersResult {
    pub items: Vec<OrderListItem>,
    pub limit: i64,
    pub offset: i64,
    pub has_more: bool,
}

/// Integration summary returned by `GET /shops/{shop_id}/telegram/status`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramStatus {
    pub enabled: bool,
    pub chat_id: String,
    pub last_sent_at: Option<DateTime<Utc>>,
    #[serde(rename = "sentCount7d")]
    pub sent_count_7d: i64,
    #[serde(rename = "failedCount7d")]
    pub failed_count_7d: i64,
}
