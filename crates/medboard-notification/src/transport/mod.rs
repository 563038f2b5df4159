//! Mail transports.
//!
//! A [`MailTransport`] performs one delivery attempt. Retrying is the
//! dispatcher's job; transports only report what went wrong through
//! [`TransportError`] so it can decide.

mod smtp;

use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::Mailbox;
use medboard_core::config::EmailConfig;
use tracing::{error, info};

use crate::email::EmailMessage;

pub use smtp::SmtpTransport;

/// Sends a single email.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Attempt delivery once, returning the message id on success.
    async fn send(&self, message: &EmailMessage) -> Result<String, TransportError>;
}

/// Failure of a single delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Could not reach or talk to the relay.
    #[error("connection failed: {0}")]
    Connection(String),
    /// The relay did not answer in time.
    #[error("timed out")]
    Timeout,
    /// The relay refused our credentials.
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// The relay answered with an error status.
    #[error("rejected with {code}: {message}")]
    Rejected {
        /// SMTP reply code.
        code: u16,
        /// Reply text.
        message: String,
    },
    /// The message itself cannot be sent (bad address, unbuildable body).
    #[error("invalid message: {0}")]
    InvalidMessage(String),
    /// Anything not covered above.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Whether another attempt could succeed.
    ///
    /// Unclassified failures are treated as retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout | Self::Other(_) => true,
            Self::Authentication(_) | Self::InvalidMessage(_) => false,
            Self::Rejected { code, .. } => !(500..600).contains(code),
        }
    }

    /// Classify an SMTP reply code.
    pub fn from_reply(code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            530 | 534 | 535 => Self::Authentication(message),
            _ => Self::Rejected { code, message },
        }
    }
}

/// Build the transport described by `config`.
///
/// Returns `None` (simulation mode) when no relay is configured, and also
/// when a relay is configured without credentials or with an unusable
/// sender address; those cases are logged as errors.
pub fn transport_from_config(config: &EmailConfig) -> Option<Arc<dyn MailTransport>> {
    let Some((host, port)) = config.smtp.endpoint() else {
        info!("SMTP relay not configured, email delivery will be simulated");
        return None;
    };

    let Some((username, password)) = config.smtp.credentials() else {
        error!(
            host,
            port, "SMTP relay configured without credentials, email delivery will be simulated"
        );
        return None;
    };

    let from = match sender_mailbox(config) {
        Ok(from) => from,
        Err(e) => {
            error!(
                from = %config.from_address,
                error = %e,
                "Invalid sender address, email delivery will be simulated"
            );
            return None;
        }
    };

    info!(
        host,
        port,
        implicit_tls = config.smtp.implicit_tls(),
        "SMTP transport configured"
    );

    Some(Arc::new(SmtpTransport::new(
        host,
        port,
        from,
        (username.to_string(), password.to_string()),
        std::time::Duration::from_secs(config.smtp.timeout_seconds),
    )))
}

fn sender_mailbox(config: &EmailConfig) -> Result<Mailbox, lettre::address::AddressError> {
    let address = config.from_address.parse()?;
    let name = Some(config.from_name.clone()).filter(|n| !n.trim().is_empty());
    Ok(Mailbox::new(name, address))
}

#[cfg(test)]
mod tests {
    use medboard_core::config::SmtpConfig;

    use super::*;

    fn relay(username: Option<&str>, password: Option<&str>) -> EmailConfig {
        EmailConfig {
            smtp: SmtpConfig {
                host: Some("smtp.example.com".to_string()),
                port: Some(587),
                username: username.map(str::to_string),
                password: password.map(str::to_string),
                timeout_seconds: 5,
            },
            ..EmailConfig::default()
        }
    }

    #[test]
    fn test_retry_classification() {
        assert!(TransportError::Connection("refused".into()).is_retryable());
        assert!(TransportError::Timeout.is_retryable());
        assert!(TransportError::Other("?".into()).is_retryable());
        assert!(!TransportError::Authentication("bad".into()).is_retryable());
        assert!(!TransportError::InvalidMessage("bad".into()).is_retryable());

        assert!(TransportError::from_reply(421, "try later").is_retryable());
        assert!(TransportError::from_reply(451, "greylisted").is_retryable());
        assert!(!TransportError::from_reply(550, "no such user").is_retryable());
        assert!(!TransportError::from_reply(554, "spam").is_retryable());
    }

    #[test]
    fn test_auth_reply_codes() {
        assert_eq!(
            TransportError::from_reply(535, "bad login"),
            TransportError::Authentication("bad login".into())
        );
        assert!(matches!(
            TransportError::from_reply(552, "too big"),
            TransportError::Rejected { code: 552, .. }
        ));
    }

    #[test]
    fn test_no_relay_means_simulation() {
        assert!(transport_from_config(&EmailConfig::default()).is_none());
    }

    #[test]
    fn test_relay_without_credentials_means_simulation() {
        assert!(transport_from_config(&relay(Some("mailer"), None)).is_none());
        assert!(transport_from_config(&relay(None, None)).is_none());
    }

    #[test]
    fn test_relay_with_credentials_builds_transport() {
        assert!(transport_from_config(&relay(Some("mailer"), Some("secret"))).is_some());
    }

    #[test]
    fn test_bad_sender_means_simulation() {
        let mut config = relay(Some("mailer"), Some("secret"));
        config.from_address = "not an address".to_string();
        assert!(transport_from_config(&config).is_none());
    }
}
