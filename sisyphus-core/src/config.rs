//! YAML configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.sisyphus/
//!   config.yaml   (mode 0600, holds OSM credentials)
//!   state.txt     (replication cursor, see [`crate::cursor`])
//! ```
//!
//! # API pattern
//!
//! As with the cursor store, every filesystem function has two forms:
//! - `fn_at(path: &Path, …)`: explicit location; used in tests with `TempDir`
//! - `fn(…)`: derives the location from `dirs::home_dir()`, delegates to `_at`
//!
//! Keys are snake_case; the upper-case names used by older deployments
//! (`USERS`, `FAIL_MAIL`, `DELAY_MINUTES`, …) are accepted as aliases.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{config_io_err, ConfigError};
use crate::types::WatchList;

pub const DEFAULT_API_ENDPOINT: &str = "https://api.openstreetmap.org";
pub const DEFAULT_REPLICATION_URL: &str = "https://planet.openstreetmap.org/replication/changesets";
pub const DEFAULT_CREATED_BY: &str = "Sisyphus 1.0";
pub const DEFAULT_SENDMAIL: &str = "/usr/sbin/sendmail";

pub const ENV_CONFIG: &str = "SISYPHUS_CONFIG";
pub const ENV_OSM_USERNAME: &str = "SISYPHUS_OSM_USERNAME";
pub const ENV_OSM_PASSWORD: &str = "SISYPHUS_OSM_PASSWORD";

/// What the orchestrator does when one replication unit cannot be fetched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchErrorPolicy {
    /// Stop the run without advancing past the unit; the next run retries it.
    #[default]
    Halt,
    /// Log the failure, advance the cursor past the unit and continue.
    Skip,
}

/// Immutable runtime configuration, built once and handed to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Accounts whose changesets are reverted.
    #[serde(alias = "USERS")]
    pub users: WatchList,

    /// Failure notification recipient. Empty disables mail.
    #[serde(alias = "FAIL_MAIL")]
    pub fail_mail: String,

    #[serde(alias = "SENDMAIL")]
    pub sendmail: PathBuf,

    /// Feed lag buffer, in replication units (one unit per minute).
    #[serde(alias = "DELAY_MINUTES", alias = "DELAY")]
    pub delay_minutes: u64,

    /// Value of the `created_by` tag on revert changesets; also the mail sender.
    #[serde(alias = "CREATED_BY")]
    pub created_by: String,

    /// Changesets with more element changes than this are never reverted.
    #[serde(alias = "MAX_DIFFS")]
    pub max_diffs: usize,

    #[serde(alias = "OSM_USERNAME")]
    pub osm_username: String,

    #[serde(alias = "OSM_PASSWORD")]
    pub osm_password: String,

    pub api_endpoint: String,
    pub replication_url: String,

    /// Cursor file. Relative paths resolve against the config file's directory.
    pub state_file: PathBuf,

    pub http_timeout_secs: u64,

    pub on_fetch_error: FetchErrorPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            users: WatchList::default(),
            fail_mail: String::new(),
            sendmail: PathBuf::from(DEFAULT_SENDMAIL),
            delay_minutes: 30,
            created_by: DEFAULT_CREATED_BY.to_string(),
            max_diffs: 50,
            osm_username: String::new(),
            osm_password: String::new(),
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            replication_url: DEFAULT_REPLICATION_URL.to_string(),
            state_file: PathBuf::from("state.txt"),
            http_timeout_secs: 60,
            on_fetch_error: FetchErrorPolicy::Halt,
        }
    }
}

impl Config {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }

    pub fn mail_enabled(&self) -> bool {
        !self.fail_mail.trim().is_empty()
    }

    pub fn has_credentials(&self) -> bool {
        !self.osm_username.is_empty() && !self.osm_password.is_empty()
    }

    /// Checks that hold for every command.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.users.is_empty() {
            return Err(ConfigError::Invalid("`users` watch-list is empty".into()));
        }
        if self.max_diffs == 0 {
            return Err(ConfigError::Invalid("`max_diffs` must be at least 1".into()));
        }
        if self.created_by.trim().is_empty() {
            return Err(ConfigError::Invalid("`created_by` must not be empty".into()));
        }
        for (key, url) in [
            ("api_endpoint", &self.api_endpoint),
            ("replication_url", &self.replication_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::Invalid(format!(
                    "`{key}` must be an http(s) URL, got '{url}'"
                )));
            }
        }
        Ok(())
    }

    /// Checks needed before anything is written to the OSM API.
    pub fn require_credentials(&self) -> Result<(), ConfigError> {
        if self.has_credentials() {
            Ok(())
        } else {
            Err(ConfigError::MissingCredentials)
        }
    }

    /// Apply `SISYPHUS_OSM_USERNAME` / `SISYPHUS_OSM_PASSWORD` from `lookup`.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(user) = lookup(ENV_OSM_USERNAME).filter(|v| !v.is_empty()) {
            self.osm_username = user;
        }
        if let Some(password) = lookup(ENV_OSM_PASSWORD).filter(|v| !v.is_empty()) {
            self.osm_password = password;
        }
    }

    fn resolve_paths(&mut self, config_path: &Path) {
        if self.state_file.is_relative() {
            if let Some(dir) = config_path.parent() {
                self.state_file = dir.join(&self.state_file);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// `<home>/.sisyphus/config.yaml`: pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    home.join(".sisyphus").join("config.yaml")
}

/// Config location: `$SISYPHUS_CONFIG` if set, else `~/.sisyphus/config.yaml`.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    if let Some(path) = std::env::var_os(ENV_CONFIG).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    Ok(config_path_at(&home()?))
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Load and validate the config at `path`, then apply environment overrides.
///
/// Returns `ConfigError::NotFound` if absent, `ConfigError::Parse` (with path
/// and line context) if malformed.
pub fn load_at(path: &Path) -> Result<Config, ConfigError> {
    let mut config = read_at(path)?;
    config.apply_env_with(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Config, ConfigError> {
    load_at(&default_config_path()?)
}

/// Parse the file at `path` without validation or environment overrides.
pub fn read_at(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| config_io_err(path, e))?;
    let mut config: Config = serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    config.resolve_paths(path);
    Ok(config)
}

/// Atomically write `config` to `path`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(path: &Path, config: &Config) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| config_io_err(dir, e))?;
    }
    let yaml = serde_yaml::to_string(config)?;
    let tmp = path.with_extension("yaml.tmp");
    std::fs::write(&tmp, yaml).map_err(|e| config_io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    std::fs::rename(&tmp, path).map_err(|e| config_io_err(path, e))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| config_io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}
