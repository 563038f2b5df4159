//! Email notifications for MedBoard.
//!
//! This crate provides:
//! - A file-backed, cached template store and a small `{{variable}}` /
//!   `{{#if}}` / `{{#unless}}` renderer
//! - An SMTP transport built on lettre
//! - A dispatcher that retries transient failures with exponential backoff,
//!   or simulates delivery when no transport is configured
//! - High-level sends (password reset, verification, welcome, application
//!   status) with per-flow failure policy

pub mod dispatcher;
pub mod email;
pub mod service;
pub mod template;
pub mod transport;

pub use dispatcher::{
    DeliveryAttempt, DeliveryFailure, DeliveryReport, NotificationDispatcher, RetryPolicy,
};
pub use email::EmailMessage;
pub use service::{ApplicationStatus, EmailService, NotificationOutcome, UserRole};
pub use template::{TemplateError, TemplateRenderer, TemplateStore};
pub use transport::{MailTransport, SmtpTransport, TransportError, transport_from_config};
