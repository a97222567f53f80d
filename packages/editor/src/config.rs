use serde::{Deserialize, Serialize};

/// Editor settings, embedded in the `editor` section of `trellis.config.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfig {
    /// Maximum number of undo levels (0 = unlimited)
    #[serde(default = "default_max_undo_levels")]
    pub max_undo_levels: usize,

    /// Name given to the page created for an empty document
    #[serde(default = "default_page_name")]
    pub default_page_name: String,

    /// Version stamped on copied clipboard payloads
    #[serde(default = "default_clipboard_version")]
    pub clipboard_version: String,

    /// Component library URLs added to freshly initialized projects
    #[serde(default)]
    pub default_component_urls: Vec<String>,
}

fn default_max_undo_levels() -> usize {
    100
}

fn default_page_name() -> String {
    "Page 1".to_string()
}

fn default_clipboard_version() -> String {
    "0.0.1".to_string()
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_undo_levels: default_max_undo_levels(),
            default_page_name: default_page_name(),
            clipboard_version: default_clipboard_version(),
            default_component_urls: vec![],
        }
    }
}
