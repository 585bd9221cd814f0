//! Application settings and paths.
//!
//! Manages the XDG-compliant settings location.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Global paths singleton.
static PATHS: OnceLock<Paths> = OnceLock::new();

/// Application directory paths following the XDG Base Directory layout.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Configuration directory (~/.config/netsweep)
    pub config_dir: PathBuf,
}

impl Paths {
    /// Get the global paths instance, creating the directory on first use.
    pub fn get() -> ConfigResult<&'static Paths> {
        if let Some(paths) = PATHS.get() {
            return Ok(paths);
        }
        let paths = Self::new()?;
        Ok(PATHS.get_or_init(|| paths))
    }

    fn new() -> ConfigResult<Self> {
        let project = ProjectDirs::from("com", "netsweep", "netsweep")
            .ok_or(ConfigError::DirectoryNotFound)?;

        let paths = Self {
            config_dir: project.config_dir().to_path_buf(),
        };
        fs::create_dir_all(&paths.config_dir)?;

        Ok(paths)
    }

    /// Get the path to the settings file.
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }
}

/// Application-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Range scanned when none is given on the command line.
    pub default_range: String,
    /// ARP listening window in milliseconds.
    pub discovery_timeout_ms: u64,
    /// Per-port connect timeout in milliseconds.
    pub probe_timeout_ms: u64,
    /// Reverse lookup budget per host in milliseconds.
    pub resolve_timeout_ms: u64,
    /// Simultaneous probes per host.
    pub concurrency: usize,
    /// Hosts port-scanned at once; 1 scans them one after another.
    pub host_parallelism: usize,
    /// Probes per second, 0 for unlimited.
    pub rate_limit: u32,
    /// Network interface for ARP; picked automatically when unset.
    pub interface: Option<String>,
    /// Default output format.
    pub default_output_format: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            default_range: "192.168.1.0/24".to_string(),
            discovery_timeout_ms: 2000,
            probe_timeout_ms: 500,
            resolve_timeout_ms: 1000,
            concurrency: 100,
            host_parallelism: 1,
            rate_limit: 0,
            interface: None,
            default_output_format: "plain".to_string(),
        }
    }
}

impl AppSettings {
    /// Load settings from the default location, or defaults if none saved.
    pub fn load() -> ConfigResult<Self> {
        let file = Paths::get()?.settings_file();
        if !file.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&file)
    }

    /// Load settings from a specific file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        serde_json::from_str(&content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))
    }

    /// Save settings to the default location and return the path written.
    pub fn save(&self) -> ConfigResult<PathBuf> {
        let file = Paths::get()?.settings_file();
        self.save_to(&file)?;
        Ok(file)
    }

    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| ConfigError::WriteFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_settings() {
        let settings = AppSettings::default();
        assert_eq!(settings.default_range, "192.168.1.0/24");
        assert_eq!(settings.discovery_timeout_ms, 2000);
        assert_eq!(settings.probe_timeout_ms, 500);
        assert_eq!(settings.concurrency, 100);
        assert_eq!(settings.host_parallelism, 1);
        assert!(settings.interface.is_none());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let settings = AppSettings {
            default_range: "10.0.0.0/24".to_string(),
            interface: Some("eth0".to_string()),
            rate_limit: 250,
            ..AppSettings::default()
        };
        settings.save_to(&path).unwrap();

        assert_eq!(AppSettings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "concurrency": 32 }"#).unwrap();

        let settings = AppSettings::load_from(&path).unwrap();
        assert_eq!(settings.concurrency, 32);
        assert_eq!(settings.probe_timeout_ms, 500);
    }

    #[test]
    fn test_invalid_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            AppSettings::load_from(&path),
            Err(ConfigError::InvalidFormat(_))
        ));

        let missing = dir.path().join("absent.json");
        assert!(matches!(
            AppSettings::load_from(&missing),
            Err(ConfigError::ReadFailed { .. })
        ));
    }
}
