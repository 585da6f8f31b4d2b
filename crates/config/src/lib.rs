//! Bookwire configuration
//!
//! Layered configuration for the live notification client:
//! defaults < `config.toml` < environment < command-line flags.
//!
//! # Architecture
//!
//! - **Trait-based**: each section implements `ConfigSection` (validate, merge, name)
//! - **Graceful degradation**: invalid files load with warnings; saving invalid values is refused
//! - **Atomic writes**: the file is written through a temp file and renamed into place
//!
//! # Example
//!
//! ```rust,no_run
//! use bookwire_config::{Config, ConfigManager};
//!
//! let manager = ConfigManager::new().expect("Failed to initialize config");
//! let config = manager.load_with_env_overrides().unwrap_or_else(|e| {
//!     eprintln!("Config error: {}, using defaults", e);
//!     Config::default()
//! });
//!
//! println!("Broker: {}", config.server.url);
//! ```

mod error;
mod manager;
mod persistence;
mod validation;

pub mod app_config;
mod notification_config;
mod reconnect_config;
mod server_config;

pub use error::{ConfigError, ConfigResult, ValidationError};
pub use manager::{
    apply_env_overrides, ConfigManager, ENV_DESTINATION_PREFIX, ENV_LOG_LEVEL, ENV_SERVER_URL,
    ENV_TOKEN,
};
pub use validation::{ConfigSection, Validator};

pub use app_config::{AppConfig, LogLevel};
pub use notification_config::NotificationConfig;
pub use reconnect_config::ReconnectConfig;
pub use server_config::ServerConfig;

use serde::{Deserialize, Serialize};

/// Current config file format version
pub const CONFIG_VERSION: u32 = 1;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Config file format version
    pub version: u32,

    /// Application-level settings
    pub app: AppConfig,

    /// Broker connection settings
    pub server: ServerConfig,

    /// Reconnect backoff settings
    pub reconnect: ReconnectConfig,

    /// Topic selection and buffering
    pub notifications: NotificationConfig,
}

impl Config {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates the entire configuration
    ///
    /// Returns all validation errors found across all sections.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(mut e) = self.app.validate() {
            errors.append(&mut e);
        }

        if let Err(mut e) = self.server.validate() {
            errors.append(&mut e);
        }

        if let Err(mut e) = self.reconnect.validate() {
            errors.append(&mut e);
        }

        if let Err(mut e) = self.notifications.validate() {
            errors.append(&mut e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Merges this config with another, preferring values from `other`
    pub fn merge(&mut self, other: Config) {
        self.app.merge(other.app);
        self.server.merge(other.server);
        self.reconnect.merge(other.reconnect);
        self.notifications.merge(other.notifications);
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            app: AppConfig::default(),
            server: ServerConfig::default(),
            reconnect: ReconnectConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}
