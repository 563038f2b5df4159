//! Account and application emails.
//!
//! Password reset and email verification block the user's flow, so their
//! failures are returned as errors. Welcome and application-status emails
//! are informational; their failures are logged and reported as a
//! [`NotificationOutcome`] instead.

use std::fmt;

use medboard_core::error::{AppError, ErrorKind};
use medboard_core::AppResult;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::error;

use crate::dispatcher::{DeliveryFailure, DeliveryReport, NotificationDispatcher};
use crate::email::{EmailMessage, TemplateRef};
use crate::template::{TemplateRenderer, html_to_text};

/// Account role, used to tailor the welcome email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Job seeker.
    Doctor,
    /// Employer posting jobs.
    Hospital,
    /// Platform administrator.
    Admin,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Doctor => write!(f, "doctor"),
            Self::Hospital => write!(f, "hospital"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

/// State of a job application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    /// Received, not yet reviewed.
    Submitted,
    /// Under review by the hospital.
    Reviewing,
    /// Candidate invited to interview.
    Interview,
    /// Offer made.
    Accepted,
    /// Not selected.
    Rejected,
}

impl ApplicationStatus {
    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Submitted => "Submitted",
            Self::Reviewing => "Under review",
            Self::Interview => "Interview",
            Self::Accepted => "Accepted",
            Self::Rejected => "Not selected",
        }
    }
}

/// Result of a non-critical send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    /// Delivered (or simulated).
    Sent(DeliveryReport),
    /// Delivery failed; the caller's operation should still succeed.
    Failed {
        /// Failure description.
        reason: String,
    },
}

impl NotificationOutcome {
    /// Whether the email went out.
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent(_))
    }
}

/// Composes templated emails and hands them to the dispatcher.
#[derive(Debug, Clone)]
pub struct EmailService {
    dispatcher: NotificationDispatcher,
    renderer: TemplateRenderer,
}

impl EmailService {
    /// Create the service.
    pub fn new(dispatcher: NotificationDispatcher, renderer: TemplateRenderer) -> Self {
        Self {
            dispatcher,
            renderer,
        }
    }

    /// Dispatcher in use.
    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    /// Render `template` and send it to `to`.
    pub async fn send_templated(
        &self,
        to: &str,
        subject: &str,
        template: &str,
        data: Value,
    ) -> Result<DeliveryReport, DeliveryFailure> {
        let html = self.renderer.compose(template, subject, &data).await;
        let message = EmailMessage {
            to: to.to_string(),
            subject: subject.to_string(),
            text_body: html_to_text(&html),
            html_body: html,
            template: Some(TemplateRef {
                name: template.to_string(),
                data,
            }),
        };
        self.dispatcher.send(&message).await
    }

    /// Send a password reset link.
    pub async fn send_password_reset(
        &self,
        to: &str,
        name: &str,
        reset_url: &str,
    ) -> AppResult<DeliveryReport> {
        let data = json!({ "name": name, "reset_url": reset_url });
        self.send_required(to, "Reset your MedBoard password", "password-reset", data)
            .await
    }

    /// Send an email address verification link.
    pub async fn send_email_verification(
        &self,
        to: &str,
        name: &str,
        verify_url: &str,
    ) -> AppResult<DeliveryReport> {
        let data = json!({ "name": name, "verify_url": verify_url });
        self.send_required(to, "Verify your MedBoard email", "email-verification", data)
            .await
    }

    /// Greet a newly registered user.
    pub async fn send_welcome(&self, to: &str, name: &str, role: UserRole) -> NotificationOutcome {
        let data = json!({
            "name": name,
            "role": role,
            "is_doctor": role == UserRole::Doctor,
            "is_hospital": role == UserRole::Hospital,
        });
        self.send_optional(to, "Welcome to MedBoard", "welcome", data)
            .await
    }

    /// Tell an applicant their application changed state.
    pub async fn send_application_status(
        &self,
        to: &str,
        name: &str,
        job_title: &str,
        status: ApplicationStatus,
    ) -> NotificationOutcome {
        let data = json!({
            "name": name,
            "job_title": job_title,
            "status": status.label(),
            "is_accepted": status == ApplicationStatus::Accepted,
            "is_rejected": status == ApplicationStatus::Rejected,
        });
        let subject = format!("Your application for {job_title}");
        self.send_optional(to, &subject, "application-status", data)
            .await
    }

    async fn send_required(
        &self,
        to: &str,
        subject: &str,
        template: &str,
        data: Value,
    ) -> AppResult<DeliveryReport> {
        self.send_templated(to, subject, template, data)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::ExternalService,
                    format!("Failed to send {template} email"),
                    e,
                )
            })
    }

    async fn send_optional(
        &self,
        to: &str,
        subject: &str,
        template: &str,
        data: Value,
    ) -> NotificationOutcome {
        match self.send_templated(to, subject, template, data).await {
            Ok(report) => NotificationOutcome::Sent(report),
            Err(e) => {
                error!(to, template, error = %e, "Non-critical email not delivered");
                NotificationOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use super::*;
    use crate::dispatcher::tests::ScriptedTransport;
    use crate::template::TemplateStore;
    use crate::transport::TransportError;

    fn renderer() -> TemplateRenderer {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../templates/emails");
        TemplateRenderer::new(Arc::new(TemplateStore::new(root)), "https://medboard.test")
    }

    fn failing_service() -> (EmailService, Arc<ScriptedTransport>) {
        let transport = ScriptedTransport::new(vec![Err(TransportError::Authentication(
            "bad login".into(),
        ))]);
        let dispatcher = NotificationDispatcher::new(Some(transport.clone()));
        (EmailService::new(dispatcher, renderer()), transport)
    }

    #[tokio::test]
    async fn test_password_reset_failure_propagates() {
        let (service, transport) = failing_service();

        let err = service
            .send_password_reset("doctor@example.com", "Amara", "https://x/reset?t=1")
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::ExternalService);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_welcome_failure_is_not_fatal() {
        let (service, _) = failing_service();

        let outcome = service
            .send_welcome("doctor@example.com", "Amara", UserRole::Doctor)
            .await;

        match outcome {
            NotificationOutcome::Failed { reason } => assert!(reason.contains("bad login")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_simulated_sends_succeed() {
        let service = EmailService::new(NotificationDispatcher::simulated(), renderer());

        let report = service
            .send_email_verification("doctor@example.com", "Amara", "https://x/verify?t=1")
            .await
            .unwrap();
        assert!(report.simulated);

        let outcome = service
            .send_application_status(
                "doctor@example.com",
                "Amara",
                "Cardiologist",
                ApplicationStatus::Interview,
            )
            .await;
        assert!(outcome.is_sent());
    }

    #[tokio::test]
    async fn test_rendered_message_reaches_transport() {
        let transport = ScriptedTransport::new(Vec::new());
        let dispatcher = NotificationDispatcher::new(Some(transport.clone()));
        let service = EmailService::new(dispatcher, renderer());

        let report = service
            .send_password_reset("doctor@example.com", "Amara", "https://x/reset?t=1")
            .await
            .unwrap();

        assert_eq!(report.attempts, 1);
        assert_eq!(
            *transport.calls.lock().unwrap(),
            vec!["doctor@example.com".to_string()]
        );
    }
}
