//! Configuration loading from disk.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::config::schema::MonitorConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
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

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Validation(_) => None,
        }
    }
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<MonitorConfig, ConfigError> {
    let config: MonitorConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<MonitorConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&content)
}

/// Where the active configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

/// Load configuration, reporting whether defaults were used. Does not log,
/// so it is safe to call before the subscriber is installed.
pub fn load_with_source(path: &Path) -> Result<(MonitorConfig, ConfigSource), ConfigError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok((parse_config(&content)?, ConfigSource::File(path.to_path_buf()))),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Ok((MonitorConfig::default(), ConfigSource::Defaults))
        }
        Err(e) => Err(ConfigError::Io(e)),
    }
}

/// Load configuration, falling back to defaults when the file does not exist.
pub fn load_or_default(path: &Path) -> Result<MonitorConfig, ConfigError> {
    let (config, source) = load_with_source(path)?;
    if source == ConfigSource::Defaults {
        tracing::info!(path = %path.display(), "Config file not found, using defaults");
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_invalid_semantics() {
        let err = parse_config("[retry]\nmultiplier = 1.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref v) if v.len() == 1));
        assert!(err.to_string().starts_with("Validation failed: retry:"));
    }

    #[test]
    fn test_parse_rejects_bad_toml() {
        assert!(matches!(
            parse_config("[retry\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = load_or_default(Path::new("does/not/exist.toml")).unwrap();
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_source_distinguishes_file_from_defaults() {
        let (_, source) = load_with_source(Path::new("does/not/exist.toml")).unwrap();
        assert_eq!(source, ConfigSource::Defaults);

        let dir = std::env::temp_dir().join(format!("sentinel-loader-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        fs::write(&path, "[retry]\nmax_attempts = 5\n").unwrap();

        let (config, source) = load_with_source(&path).unwrap();
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(source, ConfigSource::File(path.clone()));
        fs::remove_dir_all(&dir).unwrap();
    }
}
