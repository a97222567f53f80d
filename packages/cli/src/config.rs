use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use trellis_editor::EditorConfig;

pub const DEFAULT_CONFIG_NAME: &str = "trellis.config.json";

/// Extension of project files
pub const PROJECT_EXTENSION: &str = "trellis";

/// Trellis configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Directory containing project files
    #[serde(default = "default_src_dir")]
    pub src_dir: String,

    /// Settings for loaded documents
    #[serde(default)]
    pub editor: EditorConfig,
}

fn default_src_dir() -> String {
    "src".to_string()
}

impl Config {
    /// Load config from a directory, defaults if there is none
    pub fn load(cwd: &str) -> anyhow::Result<Self> {
        let config_path = PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn get_src_dir(&self, cwd: &str) -> PathBuf {
        PathBuf::from(cwd).join(&self.src_dir)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            src_dir: default_src_dir(),
            editor: EditorConfig::default(),
        }
    }
}
