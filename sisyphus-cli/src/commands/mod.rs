pub mod cursor;
pub mod init;
pub mod revert;
pub mod run;
pub mod status;

use std::path::Path;

use anyhow::{Context, Result};

use sisyphus_core::{config, Config};

/// Load, apply environment overrides and validate.
pub(crate) fn load_config(path: &Path) -> Result<Config> {
    config::load_at(path).context("failed to load config")
}
