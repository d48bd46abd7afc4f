use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Use the shell backend for protected paths when a shell is available.
    #[serde(default)]
    pub use_shell_backend: bool,

    /// Shell tried first for the persistent session.
    #[serde(default = "default_privileged_shell")]
    pub privileged_shell: String,

    /// Shell used when the privileged one cannot be started.
    #[serde(default = "default_fallback_shell")]
    pub fallback_shell: String,

    /// Helper binary prefixed to listing/mutating commands (e.g. `busybox`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub helper_binary: Option<String>,

    /// Include dotfiles in directory listings.
    #[serde(default)]
    pub show_hidden: bool,
}

fn default_privileged_shell() -> String {
    "su".to_string()
}
fn default_fallback_shell() -> String {
    "sh".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            use_shell_backend: false,
            privileged_shell: default_privileged_shell(),
            fallback_shell: default_fallback_shell(),
            helper_binary: None,
            show_hidden: false,
        }
    }
}

impl Config {
    /// Default config file path for this platform
    pub fn default_path() -> PathBuf {
        if let Some(dirs) = directories::ProjectDirs::from("org", "rootfm", "rootfm") {
            dirs.config_dir().join("config.json")
        } else {
            PathBuf::from("rootfm-config.json")
        }
    }

    /// Load config from a file path
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        let config: Self =
            serde_json::from_str(&data).with_context(|| "failed to parse config JSON")?;
        Ok(config)
    }

    /// Save config to a file path
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create config dir {}", parent.display()))?;
        }
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)
            .with_context(|| format!("failed to write config to {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_sparse_json() {
        let config: Config = serde_json::from_str(r#"{"use_shell_backend": true}"#).unwrap();
        assert!(config.use_shell_backend);
        assert_eq!(config.privileged_shell, "su");
        assert_eq!(config.fallback_shell, "sh");
        assert_eq!(config.helper_binary, None);
        assert!(!config.show_hidden);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested/config.json");

        let mut config = Config::default();
        config.use_shell_backend = true;
        config.helper_binary = Some("busybox".into());
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert!(loaded.use_shell_backend);
        assert_eq!(loaded.helper_binary.as_deref(), Some("busybox"));
    }
}
