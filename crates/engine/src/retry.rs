//! Background delivery with linear backoff.
//!
//! A [`Delivery`] is handed over only after its send-log row was reserved.
//! The loop attempts the transport up to `max_attempts` times, sleeping
//! `base_delay * attempt` between failures, and then finalizes the row exactly
//! once. Nothing is reported back to the request that created the order.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;

use relay_common::types::TelegramSendStatus;
use relay_notifier::NotificationTransport;

use crate::repository::SendLogRepository;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// A zero attempt count falls back to [`DEFAULT_MAX_ATTEMPTS`].
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: if max_attempts == 0 {
                DEFAULT_MAX_ATTEMPTS
            } else {
                max_attempts
            },
            base_delay,
        }
    }

    /// Pause after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_BASE_DELAY)
    }
}

/// Everything the background task needs; owns its data so it can outlive the request.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub shop_id: i64,
    pub order_id: i64,
    pub bot_token: String,
    pub chat_id: String,
    pub message: String,
}

#[derive(Clone)]
pub struct RetryDispatcher {
    transport: Arc<dyn NotificationTransport>,
    send_logs: Arc<dyn SendLogRepository>,
    policy: RetryPolicy,
}

impl RetryDispatcher {
    pub fn new(
        transport: Arc<dyn NotificationTransport>,
        send_logs: Arc<dyn SendLogRepository>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            send_logs,
            policy,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Detach the delivery onto the runtime. Callers are not expected to await the handle.
    pub fn spawn(&self, delivery: Delivery) -> JoinHandle<TelegramSendStatus> {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.run(delivery).await })
    }

    /// Run the attempt loop to completion and finalize the reserved row.
    pub async fn run(&self, delivery: Delivery) -> TelegramSendStatus {
        let max_attempts = self.policy.max_attempts;
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            match self
                .transport
                .notify(&delivery.bot_token, &delivery.chat_id, &delivery.message)
                .await
            {
                Ok(()) => {
                    tracing::info!(
                        shop_id = delivery.shop_id,
                        order_id = delivery.order_id,
                        attempt,
                        "Order notification sent"
                    );
                    self.finalize(&delivery, TelegramSendStatus::Sent, None)
                        .await;
                    return TelegramSendStatus::Sent;
                }
                Err(e) => {
                    last_error = e.to_string();
                    tracing::warn!(
                        shop_id = delivery.shop_id,
                        order_id = delivery.order_id,
                        attempt,
                        max_attempts,
                        error = %last_error,
                        "Order notification attempt failed"
                    );
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(self.policy.delay_after(attempt)).await;
            }
        }

        tracing::error!(
            shop_id = delivery.shop_id,
            order_id = delivery.order_id,
            attempts = max_attempts,
            error = %last_error,
            "Order notification failed, giving up"
        );
        self.finalize(&delivery, TelegramSendStatus::Failed, Some(&last_error))
            .await;
        TelegramSendStatus::Failed
    }

    async fn finalize(&self, delivery: &Delivery, status: TelegramSendStatus, error: Option<&str>) {
        if let Err(e) = self
            .send_logs
            .finalize(delivery.shop_id, delivery.order_id, status, error, Utc::now())
            .await
        {
            tracing::error!(
                shop_id = delivery.shop_id,
                order_id = delivery.order_id,
                status = %status,
                error = %e,
                "Failed to record notification outcome"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use relay_notifier::TransportError;

    use crate::memory::MemorySendLogRepository;

    /// Fails the first `failures` calls, then succeeds.
    struct FlakyTransport {
        failures: u32,
        calls: AtomicU32,
        seen: Mutex<Vec<(String, String, String)>>,
    }

    impl FlakyTransport {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl NotificationTransport for FlakyTransport {
        async fn notify(
            &self,
            bot_token: &str,
            chat_id: &str,
            text: &str,
        ) -> Result<(), TransportError> {
            self.seen.lock().unwrap().push((
                bot_token.to_string(),
                chat_id.to_string(),
                text.to_string(),
            ));
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                Err(TransportError::Rejected {
                    status: 500,
                    description: format!("attempt {call} failed"),
                })
            } else {
                Ok(())
            }
        }
    }

    fn delivery() -> Delivery {
        Delivery {
            shop_id: 1,
            order_id: 7,
            bot_token: "token".to_string(),
            chat_id: "chat".to_string(),
            message: "hello".to_string(),
        }
    }

    async fn reserved_ledger() -> Arc<MemorySendLogRepository> {
        let ledger = Arc::new(MemorySendLogRepository::new());
        assert!(ledger.reserve(1, 7, "hello", Utc::now()).await.unwrap());
        ledger
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1))
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_after(1), Duration::from_millis(500));
        assert_eq!(policy.delay_after(2), Duration::from_millis(1000));
    }

    #[test]
    fn test_zero_attempts_uses_default() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 3);
    }

    #[tokio::test]
    async fn test_first_attempt_success() {
        let ledger = reserved_ledger().await;
        let transport = Arc::new(FlakyTransport::new(0));
        let dispatcher = RetryDispatcher::new(transport.clone(), ledger.clone(), fast_policy(3));

        assert_eq!(dispatcher.run(delivery()).await, TelegramSendStatus::Sent);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            transport.seen.lock().unwrap()[0],
            ("token".to_string(), "chat".to_string(), "hello".to_string())
        );

        let entry = ledger.get(1, 7).unwrap();
        assert_eq!(entry.status, TelegramSendStatus::Sent);
        assert_eq!(entry.error, None);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let ledger = reserved_ledger().await;
        let transport = Arc::new(FlakyTransport::new(2));
        let dispatcher = RetryDispatcher::new(transport.clone(), ledger.clone(), fast_policy(3));

        assert_eq!(dispatcher.run(delivery()).await, TelegramSendStatus::Sent);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
        assert_eq!(ledger.get(1, 7).unwrap().status, TelegramSendStatus::Sent);
    }

    #[tokio::test]
    async fn test_exhausted_attempts_record_last_error() {
        let ledger = reserved_ledger().await;
        let transport = Arc::new(FlakyTransport::new(u32::MAX));
        let dispatcher = RetryDispatcher::new(transport.clone(), ledger.clone(), fast_policy(4));

        assert_eq!(dispatcher.run(delivery()).await, TelegramSendStatus::Failed);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 4);

        let entry = ledger.get(1, 7).unwrap();
        assert_eq!(entry.status, TelegramSendStatus::Failed);
        assert_eq!(
            entry.error.as_deref(),
            Some("telegram sendMessage failed (status=500): attempt 4 failed")
        );
        assert!(!entry.is_reserved());
    }

    #[tokio::test]
    async fn test_spawned_delivery_completes() {
        let ledger = reserved_ledger().await;
        let transport = Arc::new(FlakyTransport::new(1));
        let dispatcher = RetryDispatcher::new(transport, ledger.clone(), fast_policy(3));

        let status = dispatcher.spawn(delivery()).await.unwrap();
        assert_eq!(status, TelegramSendStatus::Sent);
        assert_eq!(ledger.get(1, 7).unwrap().status, TelegramSendStatus::Sent);
    }
}
