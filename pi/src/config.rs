//! peerinit configuration types and loading

use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::coordinator::{CoordinatorConfig, validate_origin};

const LOCAL_CONFIG: &str = ".peerinit.yml";

/// Main peerinit configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Coordinator settings
    pub coordinator: CoordinatorConfig,
}

impl Config {
    /// Load configuration
    ///
    /// An explicit path must load. Otherwise the first readable file from
    /// [`Config::search_paths`] wins; broken files are logged and skipped.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for path in Self::search_paths() {
            if !path.exists() {
                debug!(path = %path.display(), "Config::load: not present");
                continue;
            }
            match Self::load_from_file(&path) {
                Ok(config) => return Ok(config),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unusable config file"),
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Candidate config files, highest priority first
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG)];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("peerinit").join("peerinit.yml"));
        }
        paths
    }

    /// Reject settings the coordinator would refuse or misbehave with
    pub fn validate(&self) -> Result<()> {
        if let Some(origin) = &self.coordinator.own_origin {
            validate_origin(origin).context("Invalid coordinator own-origin")?;
        }
        if self.coordinator.timeout_ms == 0 {
            return Err(eyre!("coordinator timeout-ms must be greater than zero"));
        }
        Ok(())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;

        info!(path = %path.as_ref().display(), "Loaded config");
        Ok(config)
    }
}

/// Directory holding peerinit.log
pub fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("peerinit")
        .join("logs")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(temp: &TempDir, content: &str) -> PathBuf {
        let path = temp.path().join("peerinit.yml");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.coordinator, CoordinatorConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_explicit_file() {
        let temp = TempDir::new().unwrap();
        let path = write(
            &temp,
            "coordinator:\n  own-origin: https://app.example.com\n  timeout-ms: 2500\n",
        );

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.coordinator.own_origin.as_deref(), Some("https://app.example.com"));
        assert_eq!(config.coordinator.timeout_ms, 2500);
        assert_eq!(config.coordinator.safety_check_interval_ms, 1000);
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing.yml");
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("missing.yml"));
    }

    #[test]
    fn test_load_invalid_yaml_fails() {
        let temp = TempDir::new().unwrap();
        let path = write(&temp, "coordinator: [not, a, map]\n");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_load_rejects_bad_own_origin() {
        let temp = TempDir::new().unwrap();
        let path = write(&temp, "coordinator:\n  own-origin: localhost\n");
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(format!("{:?}", err).contains("own-origin"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = Config::default();
        config.coordinator.timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_search_paths_start_with_local_file() {
        let paths = Config::search_paths();
        assert_eq!(paths[0], PathBuf::from(LOCAL_CONFIG));
        assert!(paths.iter().skip(1).all(|p| p.ends_with("peerinit/peerinit.yml")));
    }
}
