//! Error types for sisyphus-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading, validating or saving the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure, with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load, with file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("config not found at {path}; run `sisyphus init` first")]
    NotFound { path: PathBuf },

    /// A value is present but unusable.
    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("OSM credentials are not configured (osm_username / osm_password)")]
    MissingCredentials,

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

/// Errors raised by a [`crate::cursor::CursorStore`] write.
#[derive(Debug, Error)]
pub enum CursorError {
    #[error("cursor I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub(crate) fn config_io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn cursor_io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CursorError {
    CursorError::Io {
        path: path.into(),
        source,
    }
}
