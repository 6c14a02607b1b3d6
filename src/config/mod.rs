//! Project configuration — `.catscript/config.yaml` in the workspace root.
//!
//! Every field is optional. A missing file means defaults; a malformed one
//! is logged and also means defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Runner used by documents without a `/// runner:` directive.
pub const DEFAULT_RUNNER: &str = "obj_cat_script_runner";

/// Directory (relative to a workspace folder) holding `<runnerId>.json` files.
pub const DEFAULT_SCHEMA_DIR: &str = ".catscript/schemas";

/// Language id used as the code fence tag in descriptors.
pub const DEFAULT_LANGUAGE_ID: &str = "catscript";

const CONFIG_FILE: &str = ".catscript/config.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatscriptConfig {
    pub default_runner: String,
    pub schema_dir: String,
    pub language_id: String,
}

impl Default for CatscriptConfig {
    fn default() -> Self {
        Self {
            default_runner: DEFAULT_RUNNER.into(),
            schema_dir: DEFAULT_SCHEMA_DIR.into(),
            language_id: DEFAULT_LANGUAGE_ID.into(),
        }
    }
}

impl CatscriptConfig {
    /// Path of the config file for a workspace.
    pub fn path(workspace: &Path) -> PathBuf {
        workspace.join(CONFIG_FILE)
    }

    /// Load the workspace config, falling back to defaults.
    pub fn load(workspace: &Path) -> Self {
        let path = Self::path(workspace);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(_) => return Self::default(),
        };
        if content.trim().is_empty() {
            return Self::default();
        }
        match serde_yaml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring malformed {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Write the config to `.catscript/config.yaml`.
    pub fn save(&self, workspace: &Path) -> Result<(), String> {
        let path = Self::path(workspace);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .map_err(|e| format!("Failed to create {}: {e}", dir.display()))?;
        }
        let yaml = serde_yaml::to_string(self).map_err(|e| format!("YAML serialize error: {e}"))?;
        std::fs::write(&path, yaml)
            .map_err(|e| format!("Failed to write {}: {e}", path.display()))?;
        Ok(())
    }
}
