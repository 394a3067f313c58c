//! Configuration file support for the workout plan tools.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/workout-plan/config.toml`.

use crate::snapshot::{AccessControl, AllowAll, AllowList, Principal};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub access: AccessConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Who may read and edit workouts
///
/// An empty list lets everyone through.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct AccessConfig {
    #[serde(default)]
    pub principals: Vec<String>,
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from(".local/share"))
        .join("workout-plan")
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("workout-plan")
            .join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Directory holding one JSON snapshot per workout
    pub fn snapshot_dir(&self) -> PathBuf {
        self.data.data_dir.join("workouts")
    }

    /// Access control implied by the `[access]` section
    pub fn access_control(&self) -> Box<dyn AccessControl> {
        if self.access.principals.is_empty() {
            Box::new(AllowAll)
        } else {
            Box::new(AllowList::new(
                self.access.principals.iter().cloned().map(Principal),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::WorkoutId;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.access.principals.is_empty());
        assert!(config.snapshot_dir().ends_with("workout-plan/workouts"));
    }

    #[test]
    fn test_config_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.access.principals = vec!["coach".into()];
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.access.principals, vec!["coach".to_string()]);
        assert_eq!(loaded.data.data_dir, config.data.data_dir);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[data]
data_dir = "/tmp/plans"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.snapshot_dir(), PathBuf::from("/tmp/plans/workouts"));
        assert!(config.access.principals.is_empty()); // default
    }

    #[test]
    fn test_access_control_from_principals() {
        let workout_id = WorkoutId::generate();

        let open = Config::default().access_control();
        assert!(open.authorize(&Principal::new("anyone"), workout_id).is_ok());

        let mut config = Config::default();
        config.access.principals = vec!["coach".into()];
        let closed = config.access_control();
        assert!(closed.authorize(&Principal::new("coach"), workout_id).is_ok());
        assert!(matches!(
            closed.authorize(&Principal::new("athlete"), workout_id),
            Err(Error::UnauthorizedAccess(_))
        ));
    }
}
