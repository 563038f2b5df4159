//! File-backed template lookup with a process-lifetime cache.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info, warn};

/// Reads `<root>/<name>.html` and keeps every template it has loaded until
/// [`TemplateStore::clear`] is called.
#[derive(Debug)]
pub struct TemplateStore {
    /// Directory holding the templates.
    root: PathBuf,
    /// Loaded templates by name.
    cache: DashMap<String, Arc<str>>,
}

impl TemplateStore {
    /// Create a store rooted at `root`. Nothing is read until first use.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: DashMap::new(),
        }
    }

    /// Load a template by name.
    ///
    /// Returns `None` when the template does not exist or cannot be read;
    /// callers decide how to degrade. Names are limited to ASCII letters,
    /// digits, `-` and `_`.
    pub async fn load(&self, name: &str) -> Option<Arc<str>> {
        if !is_valid_name(name) {
            warn!(template = name, "Rejected template name");
            return None;
        }

        if let Some(hit) = self.cache.get(name) {
            return Some(Arc::clone(hit.value()));
        }

        let path = self.root.join(format!("{name}.html"));
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => {
                let text: Arc<str> = Arc::from(text);
                self.cache.insert(name.to_string(), Arc::clone(&text));
                debug!(template = name, path = %path.display(), "Loaded email template");
                Some(text)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(template = name, path = %path.display(), "Email template not found");
                None
            }
            Err(e) => {
                warn!(template = name, path = %path.display(), error = %e, "Failed to read email template");
                None
            }
        }
    }

    /// Drop every cached template so edits on disk are picked up.
    pub fn clear(&self) {
        let count = self.cache.len();
        self.cache.clear();
        info!(count, "Cleared email template cache");
    }

    /// Number of cached templates.
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
