//! `sisyphus init`: write a starter config file.

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Args;

use sisyphus_core::{config, Config, WatchList};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Account id to watch; repeat for several.
    #[arg(long = "user", value_name = "UID")]
    pub users: Vec<u64>,

    /// Where failure reports are mailed. Empty disables mail.
    #[arg(long, value_name = "ADDR")]
    pub fail_mail: Option<String>,

    /// Overwrite an existing config file.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(self, config_path: &Path) -> Result<()> {
        if config_path.exists() && !self.force {
            bail!(
                "{} already exists; pass --force to overwrite it",
                config_path.display()
            );
        }

        let config = Config {
            users: self.users.iter().copied().collect::<WatchList>(),
            fail_mail: self.fail_mail.unwrap_or_default(),
            ..Config::default()
        };
        config::save_at(config_path, &config)
            .with_context(|| format!("failed to write {}", config_path.display()))?;

        println!("✓ Wrote {}", config_path.display());
        if config.users.is_empty() {
            println!("  Add account ids under `users` before the first run.");
        }
        println!(
            "  Set osm_username / osm_password there, or export {} and {}.",
            config::ENV_OSM_USERNAME,
            config::ENV_OSM_PASSWORD
        );
        Ok(())
    }
}
