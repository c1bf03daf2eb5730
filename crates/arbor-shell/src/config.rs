//! Shell configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::ShellError;

pub const HISTORY_FILE_NAME: &str = ".arbor_history";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Repository location handed to the connector (`mem:<name>`, `file:<path>`, `<path>.json`).
    pub server: String,
    pub username: String,
    pub password: String,
    /// Workspace to log into; the repository default when absent.
    pub workspace: Option<String>,
    /// Line history file; `$HOME/.arbor_history` when absent.
    pub history_file: Option<PathBuf>,
    /// Print elapsed time after each command.
    pub show_timing: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            server: "mem:default".to_string(),
            username: "admin".to_string(),
            password: "admin".to_string(),
            workspace: None,
            history_file: None,
            show_timing: true,
        }
    }
}

impl ShellConfig {
    /// Load a JSON config file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ShellError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ShellError::Config(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&text)
            .map_err(|e| ShellError::Config(format!("{}: {e}", path.display())))
    }

    pub fn history_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.history_file {
            return Some(path.clone());
        }
        std::env::var("HOME")
            .ok()
            .map(|home| PathBuf::from(home).join(HISTORY_FILE_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arbor.json");
        std::fs::write(&path, r#"{ "server": "mem:other", "show_timing": false }"#).unwrap();

        let config = ShellConfig::from_file(&path).unwrap();
        assert_eq!(config.server, "mem:other");
        assert!(!config.show_timing);
        assert_eq!(config.username, "admin");
    }

    #[test]
    fn malformed_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arbor.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            ShellConfig::from_file(&path),
            Err(ShellError::Config(_))
        ));
    }

    #[test]
    fn explicit_history_file_wins() {
        let config = ShellConfig {
            history_file: Some(PathBuf::from("/tmp/h")),
            ..ShellConfig::default()
        };
        assert_eq!(config.history_path(), Some(PathBuf::from("/tmp/h")));
    }
}
