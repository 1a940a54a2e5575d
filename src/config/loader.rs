//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::AppConfig;

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load configuration. With no explicit path, `~/.tracepulse/config.toml` is
/// used when present; a missing file means defaults, not an error.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let default = default_config_path();
            if !default.exists() {
                return Ok(AppConfig::default());
            }
            default
        }
    };

    let content = fs::read_to_string(&path).map_err(ConfigError::Io)?;
    let config: AppConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tracepulse")
        .join("config.toml")
}

fn validate_config(config: &AppConfig) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();
    if config.trace.timeout_secs <= 0.0 {
        errors.push("trace.timeout_secs must be positive".to_string());
    }
    if config.regression.recent_window == 0 {
        errors.push("regression.recent_window must be at least 1".to_string());
    }
    let r = &config.regression;
    if !(r.minor_pct < r.moderate_pct && r.moderate_pct < r.severe_pct) {
        errors.push("regression thresholds must be strictly increasing".to_string());
    }
    if config.dashboard.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(format!("invalid dashboard.bind_address '{}'", config.dashboard.bind_address));
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let mut config = AppConfig::default();
        config.regression.severe_pct = 5.0;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("strictly increasing")));
    }

    #[test]
    fn zero_recent_window_is_rejected() {
        let mut config = AppConfig::default();
        config.regression.recent_window = 0;
        assert!(validate_config(&config).is_err());
    }
}
