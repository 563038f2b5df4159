//! Outbound email message.

use std::fmt;

use serde_json::Value;

/// The template an [`EmailMessage`] was rendered from.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateRef {
    /// Content template name.
    pub name: String,
    /// Variables the template was rendered with.
    pub data: Value,
}

/// A single email, built per send and never persisted.
#[derive(Clone, PartialEq)]
pub struct EmailMessage {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text alternative.
    pub text_body: String,
    /// HTML body.
    pub html_body: String,
    /// Source template, if the body was rendered from one.
    pub template: Option<TemplateRef>,
}

impl EmailMessage {
    /// Build a message from already-rendered bodies.
    pub fn new(
        to: impl Into<String>,
        subject: impl Into<String>,
        html_body: impl Into<String>,
        text_body: impl Into<String>,
    ) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            text_body: text_body.into(),
            html_body: html_body.into(),
            template: None,
        }
    }

    /// Name of the source template, for logging.
    pub fn template_name(&self) -> Option<&str> {
        self.template.as_ref().map(|t| t.name.as_str())
    }
}

// Bodies may carry reset links and personal data; keep them out of logs.
impl fmt::Debug for EmailMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailMessage")
            .field("to", &self.to)
            .field("subject", &self.subject)
            .field("template", &self.template_name())
            .field("text_len", &self.text_body.len())
            .field("html_len", &self.html_body.len())
            .finish()
    }
}
