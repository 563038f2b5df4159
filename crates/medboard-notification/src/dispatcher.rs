//! Delivery with retry and exponential backoff.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::email::EmailMessage;
use crate::transport::{MailTransport, TransportError};

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Wait after the first failed attempt.
    pub base_delay: Duration,
    /// Growth factor applied to the wait after each further failure.
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Wait after failed attempt `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

/// Result of a successful send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    /// Transport message id, or `simulated-<uuid>` in simulation mode.
    pub message_id: String,
    /// Attempts made. Zero when simulated.
    pub attempts: u32,
    /// Whether the message was only logged.
    pub simulated: bool,
}

/// One failed try within a send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryAttempt {
    /// 1-based attempt number.
    pub attempt: u32,
    /// What the transport reported.
    pub error: TransportError,
    /// Whether the error allowed another try.
    pub retryable: bool,
    /// Wait before the next try. `None` on the final attempt.
    pub delay: Option<Duration>,
}

/// A send that failed for good.
#[derive(Debug, Clone, thiserror::Error)]
#[error("delivery to {to} failed after {attempts} attempt(s): {error}")]
pub struct DeliveryFailure {
    /// Recipient.
    pub to: String,
    /// Attempts made before giving up.
    pub attempts: u32,
    /// Error from the last attempt.
    #[source]
    pub error: TransportError,
    /// Every failed attempt, oldest first.
    pub history: Vec<DeliveryAttempt>,
}

/// Sends emails through an optional transport.
///
/// Without a transport every send succeeds immediately as a simulation.
#[derive(Clone)]
pub struct NotificationDispatcher {
    transport: Option<Arc<dyn MailTransport>>,
    policy: RetryPolicy,
}

impl NotificationDispatcher {
    /// Create a dispatcher with the default retry policy.
    pub fn new(transport: Option<Arc<dyn MailTransport>>) -> Self {
        Self {
            transport,
            policy: RetryPolicy::default(),
        }
    }

    /// Create a dispatcher that never contacts a relay.
    pub fn simulated() -> Self {
        Self::new(None)
    }

    /// Replace the retry policy.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Whether sends are only logged.
    pub fn is_simulated(&self) -> bool {
        self.transport.is_none()
    }

    /// Active retry policy.
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Deliver `message`, retrying transient failures.
    pub async fn send(&self, message: &EmailMessage) -> Result<DeliveryReport, DeliveryFailure> {
        let Some(transport) = &self.transport else {
            info!(
                to = %message.to,
                subject = %message.subject,
                template = message.template_name(),
                "Simulated email delivery"
            );
            return Ok(DeliveryReport {
                message_id: format!("simulated-{}", Uuid::new_v4()),
                attempts: 0,
                simulated: true,
            });
        };

        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;
        let mut history = Vec::new();

        loop {
            attempt += 1;
            debug!(to = %message.to, subject = %message.subject, attempt, "Sending email");

            let error = match transport.send(message).await {
                Ok(message_id) => {
                    info!(
                        to = %message.to,
                        subject = %message.subject,
                        attempt,
                        message_id = %message_id,
                        "Email delivered"
                    );
                    return Ok(DeliveryReport {
                        message_id,
                        attempts: attempt,
                        simulated: false,
                    });
                }
                Err(e) => e,
            };

            let retryable = error.is_retryable();
            if !retryable || attempt >= max_attempts {
                error!(
                    to = %message.to,
                    subject = %message.subject,
                    attempt,
                    retryable,
                    error = %error,
                    "Email delivery failed"
                );
                history.push(DeliveryAttempt {
                    attempt,
                    error: error.clone(),
                    retryable,
                    delay: None,
                });
                return Err(DeliveryFailure {
                    to: message.to.clone(),
                    attempts: attempt,
                    error,
                    history,
                });
            }

            let delay = self.policy.delay_after(attempt);
            history.push(DeliveryAttempt {
                attempt,
                error: error.clone(),
                retryable,
                delay: Some(delay),
            });
            warn!(
                to = %message.to,
                subject = %message.subject,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Email delivery failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("simulated", &self.is_simulated())
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::time::Instant;

    use super::*;

    /// Transport that replays scripted results, then succeeds.
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        script: Mutex<VecDeque<Result<String, TransportError>>>,
        pub(crate) calls: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new(script: Vec<Result<String, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl MailTransport for ScriptedTransport {
        async fn send(&self, message: &EmailMessage) -> Result<String, TransportError> {
            self.calls.lock().unwrap().push(message.to.clone());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("ok".to_string()))
        }
    }

    fn message() -> EmailMessage {
        EmailMessage::new("doctor@example.com", "Welcome", "<p>Hi</p>", "Hi")
    }

    #[test]
    fn test_default_policy_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_after(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_after(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_after(3), Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulation_reports_zero_attempts() {
        let dispatcher = NotificationDispatcher::simulated();
        assert!(dispatcher.is_simulated());

        let started = Instant::now();
        let report = dispatcher.send(&message()).await.unwrap();
        assert!(report.simulated);
        assert_eq!(report.attempts, 0);
        assert!(report.message_id.starts_with("simulated-"));
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_then_success() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::Connection("refused".into())),
            Err(TransportError::Timeout),
            Ok("<abc@medboard.test>".into()),
        ]);
        let dispatcher = NotificationDispatcher::new(Some(transport.clone()));

        let started = Instant::now();
        let report = dispatcher.send(&message()).await.unwrap();

        assert_eq!(report.attempts, 3);
        assert_eq!(report.message_id, "<abc@medboard.test>");
        assert!(!report.simulated);
        assert_eq!(transport.call_count(), 3);
        // 1000ms after the first failure, 2000ms after the second.
        assert!(started.elapsed() >= Duration::from_millis(3000));
        assert!(started.elapsed() < Duration::from_millis(3100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_is_not_retried() {
        let transport = ScriptedTransport::new(vec![Err(TransportError::Authentication(
            "bad login".into(),
        ))]);
        let dispatcher = NotificationDispatcher::new(Some(transport.clone()));

        let started = Instant::now();
        let failure = dispatcher.send(&message()).await.unwrap_err();

        assert_eq!(failure.attempts, 1);
        assert_eq!(failure.to, "doctor@example.com");
        assert_eq!(transport.call_count(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_5xx_rejection_is_not_retried() {
        let transport =
            ScriptedTransport::new(vec![Err(TransportError::from_reply(550, "no such user"))]);
        let dispatcher = NotificationDispatcher::new(Some(transport.clone()));

        let failure = dispatcher.send(&message()).await.unwrap_err();
        assert_eq!(failure.attempts, 1);
        assert!(matches!(failure.error, TransportError::Rejected { code: 550, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_exhausted_returns_last_error() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::Connection("one".into())),
            Err(TransportError::Connection("two".into())),
            Err(TransportError::Connection("three".into())),
            Ok("never".into()),
        ]);
        let dispatcher = NotificationDispatcher::new(Some(transport.clone()));

        let failure = dispatcher.send(&message()).await.unwrap_err();
        assert_eq!(failure.attempts, 3);
        assert_eq!(failure.error, TransportError::Connection("three".into()));
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_records_each_attempt() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::Connection("one".into())),
            Err(TransportError::Timeout),
            Err(TransportError::Authentication("bad login".into())),
        ]);
        let dispatcher = NotificationDispatcher::new(Some(transport.clone()));

        let failure = dispatcher.send(&message()).await.unwrap_err();

        assert_eq!(
            failure.history,
            vec![
                DeliveryAttempt {
                    attempt: 1,
                    error: TransportError::Connection("one".into()),
                    retryable: true,
                    delay: Some(Duration::from_millis(1000)),
                },
                DeliveryAttempt {
                    attempt: 2,
                    error: TransportError::Timeout,
                    retryable: true,
                    delay: Some(Duration::from_millis(2000)),
                },
                DeliveryAttempt {
                    attempt: 3,
                    error: TransportError::Authentication("bad login".into()),
                    retryable: false,
                    delay: None,
                },
            ]
        );
        assert_eq!(failure.history.last().map(|a| &a.error), Some(&failure.error));
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_policy() {
        let transport = ScriptedTransport::new(vec![Err(TransportError::Timeout)]);
        let dispatcher = NotificationDispatcher::new(Some(transport.clone())).with_policy(
            RetryPolicy {
                max_attempts: 1,
                ..RetryPolicy::default()
            },
        );

        let failure = dispatcher.send(&message()).await.unwrap_err();
        assert_eq!(failure.attempts, 1);
        assert_eq!(transport.call_count(), 1);
    }
}
