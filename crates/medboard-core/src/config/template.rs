//! Email template store configuration.

use serde::{Deserialize, Serialize};

/// Location of the HTML email templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Directory holding `<name>.html` template files.
    #[serde(default = "default_directory")]
    pub directory: String,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
        }
    }
}

fn default_directory() -> String {
    "templates/emails".to_string()
}
