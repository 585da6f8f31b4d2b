//! Reading and writing `config.toml`
//!
//! The file may hold the broker token, so it is replaced atomically and kept
//! readable by its owner only. The file being replaced is kept next to it as
//! `config.toml.backup`.

use crate::{Config, ConfigError, ConfigResult, CONFIG_VERSION};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const BACKUP_EXTENSION: &str = "toml.backup";

/// Written above the settings on every save
const FILE_HEADER: &str = "\
# bookwire live notification settings
#
# Prefer BOOKWIRE_TOKEN in the environment over storing server.token here.
# BOOKWIRE_SERVER_URL, BOOKWIRE_DESTINATION_PREFIX and BOOKWIRE_LOG_LEVEL
# override the matching keys below.

";

pub struct ConfigPersistence {
    path: PathBuf,
}

impl ConfigPersistence {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> PathBuf {
        self.path.with_extension(BACKUP_EXTENSION)
    }

    /// Reads the settings, or defaults when there is no file yet
    ///
    /// An empty or unparsable file is an error. Out-of-range values are only
    /// logged, so `bookwire config show` can still display what is wrong.
    pub fn load(&self) -> ConfigResult<Config> {
        let Some(contents) = self.read()? else {
            log::info!("No settings at {}, using defaults", self.path.display());
            return Ok(Config::default());
        };

        let mut config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })?;
        upgrade(&mut config);

        if let Err(errors) = config.validate() {
            let summary: Vec<String> = errors.iter().map(ToString::to_string).collect();
            log::warn!(
                "{} has invalid settings: {}",
                self.path.display(),
                summary.join("; ")
            );
        }
        if config.server.token.is_some() {
            warn_if_shared(&self.path);
        }
        Ok(config)
    }

    /// Writes the settings, refusing values that would not connect
    pub fn save(&self, config: &Config) -> ConfigResult<()> {
        config.validate().map_err(ConfigError::Invalid)?;
        let body = toml::to_string_pretty(config)?;
        self.replace(&format!("{}{}", FILE_HEADER, body))?;
        log::info!("Saved settings to {}", self.path.display());
        Ok(())
    }

    pub fn generate_default(&self) -> ConfigResult<()> {
        self.save(&Config::default())
    }

    fn read(&self) -> ConfigResult<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Err(ConfigError::Empty {
                path: self.path.clone(),
            }),
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ConfigError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Stages `contents` beside the target and renames it into place
    fn replace(&self, contents: &str) -> ConfigResult<()> {
        let dir = self
            .path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(write_error(dir))?;

        if self.path.exists() {
            let backup = self.backup_path();
            fs::copy(&self.path, &backup).map_err(write_error(&backup))?;
            restrict_to_owner(&backup).map_err(write_error(&backup))?;
            log::debug!("Kept previous settings in {}", backup.display());
        }

        let mut staged = NamedTempFile::new_in(dir).map_err(write_error(dir))?;
        staged
            .write_all(contents.as_bytes())
            .and_then(|()| staged.flush())
            .map_err(write_error(staged.path()))?;
        staged
            .persist(&self.path)
            .map_err(|e| write_error(&self.path)(e.error))?;
        restrict_to_owner(&self.path).map_err(write_error(&self.path))
    }
}

fn write_error(path: &Path) -> impl FnOnce(std::io::Error) -> ConfigError + '_ {
    move |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    }
}

/// Brings older files up to the current version; newer ones load as is
fn upgrade(config: &mut Config) {
    if config.version > CONFIG_VERSION {
        log::warn!(
            "Settings are version {}, this build knows {}; unknown keys are ignored",
            config.version,
            CONFIG_VERSION
        );
    } else if config.version < CONFIG_VERSION {
        log::info!(
            "Upgrading settings from version {} to {}",
            config.version,
            CONFIG_VERSION
        );
        config.version = CONFIG_VERSION;
    }
}

#[cfg(unix)]
fn restrict_to_owner(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_to_owner(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn warn_if_shared(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(metadata) = fs::metadata(path) {
        if metadata.permissions().mode() & 0o077 != 0 {
            log::warn!(
                "{} holds a token but other users can read it; run `chmod 600` on it",
                path.display()
            );
        }
    }
}

#[cfg(not(unix))]
fn warn_if_shared(_path: &Path) {}
