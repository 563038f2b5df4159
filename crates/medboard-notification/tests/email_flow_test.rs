//! End-to-end rendering and delivery through the bundled templates.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use medboard_notification::{
    ApplicationStatus, EmailMessage, EmailService, MailTransport, NotificationDispatcher,
    TemplateRenderer, TemplateStore, TransportError, UserRole,
};

#[derive(Default)]
struct CapturingTransport {
    sent: Mutex<Vec<EmailMessage>>,
}

#[async_trait]
impl MailTransport for CapturingTransport {
    async fn send(&self, message: &EmailMessage) -> Result<String, TransportError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok("<captured@medboard.test>".to_string())
    }
}

fn service() -> (EmailService, Arc<CapturingTransport>) {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../templates/emails");
    let renderer =
        TemplateRenderer::new(Arc::new(TemplateStore::new(root)), "https://medboard.test");
    let transport = Arc::new(CapturingTransport::default());
    let dispatcher = NotificationDispatcher::new(Some(transport.clone()));
    (EmailService::new(dispatcher, renderer), transport)
}

#[tokio::test]
async fn test_password_reset_email_contents() {
    let (service, transport) = service();

    let report = service
        .send_password_reset(
            "amara@example.com",
            "Amara",
            "https://medboard.test/reset?token=abc123",
        )
        .await
        .unwrap();
    assert_eq!(report.message_id, "<captured@medboard.test>");

    let sent = transport.sent.lock().unwrap();
    let message = &sent[0];
    assert_eq!(message.to, "amara@example.com");
    assert_eq!(message.template_name(), Some("password-reset"));
    assert!(message.html_body.contains("Hi Amara,"));
    assert!(message.html_body.contains("https://medboard.test/reset?token=abc123"));
    assert!(message.html_body.contains("<title>Reset your MedBoard password</title>"));
    assert!(message.text_body.contains("https://medboard.test/reset?token=abc123"));
    assert!(!message.text_body.contains('<'));
    assert!(!message.text_body.contains("{{"));
}

#[tokio::test]
async fn test_welcome_email_is_role_specific() {
    let (service, transport) = service();

    assert!(
        service
            .send_welcome("clinic@example.com", "St. Mary's", UserRole::Hospital)
            .await
            .is_sent()
    );

    let sent = transport.sent.lock().unwrap();
    let html = &sent[0].html_body;
    assert!(html.contains("Post a job"));
    assert!(html.contains("https://medboard.test/jobs/new"));
    assert!(!html.contains("Browse open positions"));
    assert!(!html.contains("{{"));
}

#[tokio::test]
async fn test_rejected_application_hides_link() {
    let (service, transport) = service();

    service
        .send_application_status(
            "amara@example.com",
            "Amara",
            "Cardiologist",
            ApplicationStatus::Rejected,
        )
        .await;

    let sent = transport.sent.lock().unwrap();
    let message = &sent[0];
    assert_eq!(message.subject, "Your application for Cardiologist");
    assert!(message.html_body.contains("Not selected"));
    assert!(message.html_body.contains("Thank you for your interest"));
    assert!(!message.html_body.contains("View your applications"));
}
