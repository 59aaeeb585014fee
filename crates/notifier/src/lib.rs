//! Outbound notification transport.
//!
//! The engine only sees [`NotificationTransport`]: one message to one
//! destination, success or a single human-readable failure. [`TelegramClient`]
//! is the production implementation backed by the Telegram Bot API.

pub mod telegram;

use async_trait::async_trait;
use thiserror::Error;

pub use telegram::TelegramClient;

/// Fallback description when the remote side rejects a message without saying why.
pub const UNKNOWN_ERROR: &str = "unknown telegram error";

/// Failure of a single delivery attempt.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("botToken and chatID must be non-empty")]
    InvalidDestination,

    #[error("telegram sendMessage request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("decode telegram response: {0}")]
    Decode(String),

    #[error("telegram sendMessage failed (status={status}): {description}")]
    Rejected { status: u16, description: String },
}

/// Sends one formatted message to one chat.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn notify(
        &self,
        bot_token: &str,
        chat_id: &str,
        text: &str,
    ) -> Result<(), TransportError>;
}
