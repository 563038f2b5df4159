//! SMTP transport built on lettre.

use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::{
        Error as SmtpError,
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
};
use tokio::sync::OnceCell;
use tracing::debug;
use uuid::Uuid;

use super::{MailTransport, TransportError};
use crate::email::EmailMessage;

/// Delivers mail through an authenticated SMTP relay.
///
/// The underlying lettre transport is built on first send and reused for
/// the lifetime of this value. Port 465 connects with implicit TLS, any
/// other port upgrades with STARTTLS when the relay offers it.
pub struct SmtpTransport {
    host: String,
    port: u16,
    from: Mailbox,
    credentials: (String, String),
    timeout: Duration,
    inner: OnceCell<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpTransport {
    /// Create a transport for `host:port`. No connection is made yet.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        from: Mailbox,
        credentials: (String, String),
        timeout: Duration,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            from,
            credentials,
            timeout,
            inner: OnceCell::new(),
        }
    }

    async fn transport(&self) -> Result<&AsyncSmtpTransport<Tokio1Executor>, TransportError> {
        self.inner
            .get_or_try_init(|| async { self.build_transport() })
            .await
    }

    fn build_transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, TransportError> {
        let params = TlsParameters::new(self.host.clone())
            .map_err(|e| TransportError::Connection(format!("TLS setup failed: {e}")))?;
        let tls = if self.port == 465 {
            Tls::Wrapper(params)
        } else {
            Tls::Opportunistic(params)
        };

        let (username, password) = self.credentials.clone();
        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.host)
            .port(self.port)
            .tls(tls)
            .credentials(Credentials::new(username, password))
            .timeout(Some(self.timeout))
            .build();

        debug!(host = %self.host, port = self.port, "Built SMTP transport");
        Ok(transport)
    }

    fn build_message(&self, email: &EmailMessage) -> Result<(Message, String), TransportError> {
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| TransportError::InvalidMessage(format!("bad recipient: {e}")))?;

        let message_id = format!("<{}@{}>", Uuid::new_v4(), self.from.email.domain());

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&email.subject)
            .message_id(Some(message_id.clone()))
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text_body.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html_body.clone()),
                    ),
            )
            .map_err(|e| TransportError::InvalidMessage(e.to_string()))?;

        Ok((message, message_id))
    }
}

impl std::fmt::Debug for SmtpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpTransport")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("from", &self.from.to_string())
            .field("username", &self.credentials.0)
            .finish()
    }
}

#[async_trait]
impl MailTransport for SmtpTransport {
    async fn send(&self, email: &EmailMessage) -> Result<String, TransportError> {
        let (message, message_id) = self.build_message(email)?;
        let transport = self.transport().await?;

        transport.send(message).await.map_err(|e| classify(&e))?;
        Ok(message_id)
    }
}

fn classify(err: &SmtpError) -> TransportError {
    if err.is_timeout() {
        return TransportError::Timeout;
    }
    if let Some(code) = err.status() {
        if let Ok(code) = code.to_string().parse::<u16>() {
            return TransportError::from_reply(code, err.to_string());
        }
    }
    if err.is_client() {
        return TransportError::InvalidMessage(err.to_string());
    }
    TransportError::Connection(err.to_string())
}
