//! Outbound email configuration.

use serde::{Deserialize, Serialize};

/// Sender identity and SMTP relay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Envelope and header sender address.
    #[serde(default = "default_from_address")]
    pub from_address: String,
    /// Display name shown next to the sender address.
    #[serde(default = "default_from_name")]
    pub from_name: String,
    /// Public site URL injected into every template as `site_url`.
    #[serde(default = "default_site_url")]
    pub site_url: String,
    /// SMTP relay. Leaving host or port unset enables simulation mode.
    #[serde(default)]
    pub smtp: SmtpConfig,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            from_address: default_from_address(),
            from_name: default_from_name(),
            site_url: default_site_url(),
            smtp: SmtpConfig::default(),
        }
    }
}

/// SMTP relay connection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// Relay host name.
    pub host: Option<String>,
    /// Relay port. `465` selects implicit TLS, anything else STARTTLS.
    pub port: Option<u16>,
    /// Login user.
    pub username: Option<String>,
    /// Login password.
    pub password: Option<String>,
    /// Per-command timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl SmtpConfig {
    /// Host and port, if both are configured.
    pub fn endpoint(&self) -> Option<(&str, u16)> {
        match (self.host.as_deref(), self.port) {
            (Some(host), Some(port)) if !host.trim().is_empty() => Some((host, port)),
            _ => None,
        }
    }

    /// Username and password, if both are configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some((user, pass)),
            _ => None,
        }
    }

    /// Whether the connection starts in TLS (SMTPS) rather than upgrading.
    pub fn implicit_tls(&self) -> bool {
        self.port == Some(465)
    }
}

fn default_from_address() -> String {
    "no-reply@medboard.local".to_string()
}

fn default_from_name() -> String {
    "MedBoard".to_string()
}

fn default_site_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_timeout() -> u64 {
    30
}
