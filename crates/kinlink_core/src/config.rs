//! Engine configuration.
//!
//! # Responsibility
//! - Describe tunables shared by the services and the host (`kinlink.toml`).
//!
//! # Invariants
//! - Every field has a default; an absent file means default behavior.
//! - Values are validated at load time, never at use time.

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// File name hosts look for at the vault root.
pub const CONFIG_FILE_NAME: &str = "kinlink.toml";

const DEFAULT_HEADING_LEVEL: usize = 2;

/// Engine tunables.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Heading depth (2..=6) used when a `Related` section must be created.
    pub related_heading_level: usize,
    /// Write inferred `GENDER` onto targets described with gendered terms.
    pub infer_gender: bool,
    /// Folder (relative to the vault root) holding contact notes.
    pub contacts_folder: Option<String>,
    /// `trace|debug|info|warn|error`; build-mode default when unset.
    pub log_level: Option<String>,
    /// Directory for rolling log files, relative paths under the vault root;
    /// logging stays off when unset.
    pub log_dir: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            related_heading_level: DEFAULT_HEADING_LEVEL,
            infer_gender: true,
            contacts_folder: None,
            log_level: None,
            log_dir: None,
        }
    }
}

impl EngineConfig {
    /// Parses and validates TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path`, falling back to defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml_str(&text),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Read {
                path: path.display().to_string(),
                source: err,
            }),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(2..=6).contains(&self.related_heading_level) {
            return Err(ConfigError::Invalid(format!(
                "related_heading_level must be within 2..=6, got {}",
                self.related_heading_level
            )));
        }
        if let Some(folder) = &self.contacts_folder {
            if folder.split(['/', '\\']).any(|part| part == "..") {
                return Err(ConfigError::Invalid(format!(
                    "contacts_folder must stay inside the vault, got `{folder}`"
                )));
            }
        }
        Ok(())
    }
}

/// Configuration load errors.
#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: String,
        source: std::io::Error,
    },
    Parse(String),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => write!(f, "failed to read config `{path}`: {source}"),
            Self::Parse(message) => write!(f, "invalid config syntax: {message}"),
            Self::Invalid(message) => write!(f, "invalid config value: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, EngineConfig};

    #[test]
    fn empty_file_yields_defaults() {
        let config = EngineConfig::from_toml_str("").expect("empty config parses");
        assert_eq!(config, EngineConfig::default());
        assert!(config.infer_gender);
        assert_eq!(config.related_heading_level, 2);
    }

    #[test]
    fn parses_overrides() {
        let config = EngineConfig::from_toml_str(
            "related_heading_level = 3\ninfer_gender = false\ncontacts_folder = \"People\"\n",
        )
        .expect("config parses");
        assert_eq!(config.related_heading_level, 3);
        assert!(!config.infer_gender);
        assert_eq!(config.contacts_folder.as_deref(), Some("People"));
    }

    #[test]
    fn rejects_out_of_range_heading_level() {
        let err = EngineConfig::from_toml_str("related_heading_level = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_unknown_keys_and_escaping_folders() {
        assert!(matches!(
            EngineConfig::from_toml_str("unknown = 1").unwrap_err(),
            ConfigError::Parse(_)
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("contacts_folder = \"../elsewhere\"").unwrap_err(),
            ConfigError::Invalid(_)
        ));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = EngineConfig::load_or_default(&dir.path().join("kinlink.toml"))
            .expect("missing file is not an error");
        assert_eq!(config, EngineConfig::default());
    }
}
