//! Email template loading, rendering, and layout composition.

mod render;
mod store;

use std::sync::Arc;

use chrono::{Datelike, Utc};
use serde_json::{Map, Value};
use tracing::warn;

pub use render::{is_truthy, render};
pub use store::TemplateStore;

/// Name of the layout template every email is wrapped in.
pub const BASE_TEMPLATE: &str = "base";

/// Errors raised while composing an email body.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// The content template does not exist.
    #[error("template '{0}' not found")]
    NotFound(String),
    /// Template variables were not a JSON object.
    #[error("template data must be a JSON object")]
    InvalidData,
}

/// Renders content templates inside the shared layout.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    /// Template source.
    store: Arc<TemplateStore>,
    /// Public site URL, exposed to templates as `site_url`.
    site_url: String,
}

impl TemplateRenderer {
    /// Create a renderer over `store`.
    pub fn new(store: Arc<TemplateStore>, site_url: impl Into<String>) -> Self {
        Self {
            store,
            site_url: site_url.into(),
        }
    }

    /// The underlying template store.
    pub fn store(&self) -> &TemplateStore {
        &self.store
    }

    /// Render the `template` content and wrap it in the base layout.
    ///
    /// Both templates see `site_url`, `year` and `subject`, overlaid by the
    /// caller's `data`; the layout also gets `content`. Without a base
    /// template the rendered content is returned alone. Any failure yields
    /// [`fallback_document`] instead of an error.
    pub async fn compose(&self, template: &str, subject: &str, data: &Value) -> String {
        match self.try_compose(template, subject, data).await {
            Ok(html) => html,
            Err(e) => {
                warn!(template, error = %e, "Falling back to minimal email body");
                fallback_document(subject)
            }
        }
    }

    async fn try_compose(
        &self,
        template: &str,
        subject: &str,
        data: &Value,
    ) -> Result<String, TemplateError> {
        let caller = data.as_object().ok_or(TemplateError::InvalidData)?;
        let source = self
            .store
            .load(template)
            .await
            .ok_or_else(|| TemplateError::NotFound(template.to_string()))?;

        let mut vars = Map::new();
        vars.insert("site_url".into(), Value::String(self.site_url.clone()));
        vars.insert("year".into(), Value::from(Utc::now().year()));
        vars.insert("subject".into(), Value::String(subject.to_string()));
        vars.extend(caller.iter().map(|(k, v)| (k.clone(), v.clone())));

        let content = render(&source, &Value::Object(vars.clone()))?;
        let Some(base) = self.store.load(BASE_TEMPLATE).await else {
            return Ok(content);
        };

        vars.insert("content".into(), Value::String(content));
        render(&base, &Value::Object(vars))
    }
}

/// Minimal HTML document carrying only the subject line.
pub fn fallback_document(subject: &str) -> String {
    let subject = escape_html(subject);
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{subject}</title></head>\
         <body><h1>{subject}</h1></body></html>"
    )
}

/// Escape the five HTML-significant characters.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Derive a plain-text alternative from an HTML body.
///
/// Tags are dropped (block-level ones become line breaks), the contents of
/// `head`, `style`, `script` and `title` are skipped, the entities used by
/// the bundled templates are decoded, and runs of blank lines are collapsed.
pub fn html_to_text(html: &str) -> String {
    const SKIPPED: [&str; 4] = ["head", "style", "script", "title"];
    const BREAKS: [&str; 13] = [
        "br", "p", "div", "tr", "li", "h1", "h2", "h3", "h4", "h5", "h6", "table", "hr",
    ];

    let mut raw = String::with_capacity(html.len());
    let mut skip_until: Option<String> = None;
    let mut rest = html;

    while let Some(open) = rest.find('<') {
        if skip_until.is_none() {
            raw.push_str(&rest[..open]);
        }
        let Some(close) = rest[open..].find('>') else {
            rest = "";
            break;
        };
        let tag = &rest[open + 1..open + close];
        rest = &rest[open + close + 1..];

        let closing = tag.starts_with('/');
        let name: String = tag
            .trim_start_matches('/')
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        if let Some(skipped) = &skip_until {
            if closing && *skipped == name {
                skip_until = None;
            }
            continue;
        }
        if !closing && SKIPPED.contains(&name.as_str()) && !tag.ends_with('/') {
            skip_until = Some(name);
            continue;
        }
        if BREAKS.contains(&name.as_str()) {
            raw.push('\n');
        }
    }
    if skip_until.is_none() {
        raw.push_str(rest);
    }

    let decoded = raw
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&copy;", "\u{a9}")
        .replace("&middot;", "\u{b7}")
        .replace("&amp;", "&");

    let mut lines: Vec<String> = Vec::new();
    for line in decoded.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() && lines.last().is_none_or(|l| l.is_empty()) {
            continue;
        }
        lines.push(line);
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}
