//! Errors raised while loading, checking and saving `config.toml`

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read
    #[error("Cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file holds only whitespace; it is never mistaken for defaults
    #[error("{} is empty, remove it or run `bookwire config init`", .path.display())]
    Empty { path: PathBuf },

    #[error("{} is not valid TOML: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Saving was refused; the file on disk is untouched
    #[error("Refusing to save invalid settings: {}", summarize(.0))]
    Invalid(Vec<ValidationError>),

    #[error("Cannot encode settings as TOML: {0}")]
    Encode(#[from] toml::ser::Error),

    /// Creating the directory, the backup or the replacement file failed
    #[error("Cannot write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("No per-user config directory on this platform, pass --config-dir")]
    NoConfigDir,
}

impl ConfigError {
    /// Dotted names of the settings that blocked a save
    pub fn invalid_fields(&self) -> Vec<&str> {
        match self {
            ConfigError::Invalid(errors) => errors.iter().map(|e| e.field.as_str()).collect(),
            _ => Vec::new(),
        }
    }
}

fn summarize(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ValidationError::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// One rejected setting, named by its dotted path (`server.url`)
///
/// The offending value is only recorded when it is safe to echo; token
/// problems are reported without it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub value: Option<String>,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            value: None,
        }
    }

    /// Same as [`ValidationError::new`] but echoes the rejected value
    pub fn with_value(
        field: impl Into<String>,
        message: impl Into<String>,
        value: impl ToString,
    ) -> Self {
        Self {
            value: Some(value.to_string()),
            ..Self::new(field, message)
        }
    }

    /// Section the field lives in (`server` for `server.url`)
    pub fn section(&self) -> &str {
        self.field
            .split_once('.')
            .map_or(self.field.as_str(), |(section, _)| section)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.message)?;
        match &self.value {
            Some(value) => write!(f, " (got {:?})", value),
            None => Ok(()),
        }
    }
}

impl std::error::Error for ValidationError {}
