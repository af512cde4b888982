use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read settings {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid settings: {0}")]
    Invalid(String),
}

fn default_state_root() -> PathBuf {
    PathBuf::from("campaigner-state")
}

fn default_tick_interval_ms() -> u64 {
    500
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_state_root")]
    pub state_root: PathBuf,
    /// How often the engine sweep runs delays and wait deadlines.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            state_root: default_state_root(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl Settings {
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(source) if source.kind() == ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        let settings: Settings = serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms < 100 || self.tick_interval_ms > 60_000 {
            return Err(ConfigError::Invalid(format!(
                "tickIntervalMs must be within 100..=60000, got {}",
                self.tick_interval_ms
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_settings_file_falls_back_to_defaults() {
        let dir = tempdir().expect("tempdir");
        let settings = Settings::load_or_default(&dir.path().join("settings.yaml"))
            .expect("defaults");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn settings_parse_from_yaml() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("settings.yaml");
        fs::write(&path, "stateRoot: /tmp/campaigns\ntickIntervalMs: 250\n").expect("write");
        let settings = Settings::load_or_default(&path).expect("load");
        assert_eq!(settings.state_root, PathBuf::from("/tmp/campaigns"));
        assert_eq!(settings.tick_interval_ms, 250);
    }

    #[test]
    fn out_of_range_tick_interval_is_rejected() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("settings.yaml");
        fs::write(&path, "tickIntervalMs: 5\n").expect("write");
        assert!(matches!(
            Settings::load_or_default(&path),
            Err(ConfigError::Invalid(_))
        ));
    }
}
