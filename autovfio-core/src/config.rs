//! Configuration management.
//!
//! A [`Config`] value is built once at startup and handed to every entry
//! point. Command-line flags override what the config file sets.

use crate::error::{AutoVfioError, Result};
use crate::output::OutputFormat;
use crate::paths::{self, SysfsLayout};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Config file extensions we know how to parse.
pub const SUPPORTED_CONFIG_FORMATS: [&str; 4] = [".json", ".yaml", ".yml", ".toml"];

/// Default bound for a single control-file write.
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// Persistent configuration for auto-vfio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: String,
    pub timeout_ms: u64,
    pub list: ListDefaults,
    pub rebind: RebindDefaults,
    pub paths: SysfsLayout,
}

/// Defaults for the `list` command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListDefaults {
    pub tree: bool,
    pub output: Option<OutputFormat>,
    pub query: Option<String>,
}

/// Defaults for the `rebind` command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RebindDefaults {
    pub persist: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            list: ListDefaults::default(),
            rebind: RebindDefaults::default(),
            paths: SysfsLayout::default(),
        }
    }
}

impl Config {
    /// Control-file write timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from `explicit`, or from the first config file
    /// found by [`paths::config_file`], or fall back to defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        match explicit.map(Path::to_path_buf).or_else(paths::config_file) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a file, choosing the parser by extension.
    pub fn load(path: &Path) -> Result<Self> {
        let format = ConfigFormat::from_path(path)?;
        let content = std::fs::read_to_string(path).map_err(|e| AutoVfioError::Config {
            reason: format!("Failed to read config {}: {}", path.display(), e),
        })?;
        let config = format.parse(&content).map_err(|reason| AutoVfioError::Config {
            reason: format!("Failed to parse config {}: {}", path.display(), reason),
        })?;
        debug!(path = %path.display(), ?format, "Loaded config");
        Ok(config)
    }
}

/// Supported config file syntaxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
    Toml,
}

impl ConfigFormat {
    /// Pick the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        match extension.as_str() {
            ".json" => Ok(Self::Json),
            ".yaml" | ".yml" => Ok(Self::Yaml),
            ".toml" => Ok(Self::Toml),
            _ => Err(AutoVfioError::UnsupportedConfigFormat {
                extension,
                supported: SUPPORTED_CONFIG_FORMATS.join(", "),
            }),
        }
    }

    fn parse(self, content: &str) -> std::result::Result<Config, String> {
        match self {
            Self::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            Self::Yaml if content.trim().is_empty() => Ok(Config::default()),
            Self::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
            Self::Toml => toml::from_str(content).map_err(|e| e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.timeout(), Duration::from_secs(2));
        assert!(!config.rebind.persist);
        assert_eq!(config.paths.vfio_conf, PathBuf::from("/etc/modprobe.d/vfio.conf"));
    }

    #[test]
    fn test_unsupported_extension() {
        let err = ConfigFormat::from_path(Path::new("settings.ini")).unwrap_err();
        match err {
            AutoVfioError::UnsupportedConfigFormat { extension, supported } => {
                assert_eq!(extension, ".ini");
                assert!(supported.contains(".toml"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(ConfigFormat::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn test_load_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("default.yaml");
        std::fs::write(
            &path,
            "log_level: debug\nlist:\n  tree: true\n  output: json\nrebind:\n  persist: true\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert!(config.list.tree);
        assert_eq!(config.list.output, Some(OutputFormat::Json));
        assert!(config.rebind.persist);
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
    }

    #[test]
    fn test_load_toml_and_json() {
        let dir = TempDir::new().unwrap();
        let toml_path = dir.path().join("config.toml");
        std::fs::write(&toml_path, "timeout_ms = 500\n\n[paths]\nvfio_conf = \"/tmp/vfio.conf\"\n")
            .unwrap();
        let config = Config::load(&toml_path).unwrap();
        assert_eq!(config.timeout(), Duration::from_millis(500));
        assert_eq!(config.paths.vfio_conf, PathBuf::from("/tmp/vfio.conf"));
        assert_eq!(config.paths.pci_devices, PathBuf::from(paths::PCI_DEVICES_PATH));

        let json_path = dir.path().join("config.json");
        std::fs::write(&json_path, r#"{"list": {"query": ".\"1\""}}"#).unwrap();
        let config = Config::load(&json_path).unwrap();
        assert_eq!(config.list.query.as_deref(), Some(".\"1\""));
    }

    #[test]
    fn test_load_invalid_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(Config::load(&path), Err(AutoVfioError::Config { .. })));
    }
}
