//! `sisyphus revert <ID>...`: revert specific changesets immediately.

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use sisyphus_core::ChangesetId;
use sisyphus_runner::{pipeline, ChangesetOutcome};

use super::load_config;

#[derive(Args, Debug)]
pub struct RevertArgs {
    /// Changeset ids to revert.
    #[arg(required = true, value_name = "ID")]
    pub ids: Vec<ChangesetId>,

    /// Show what would be reverted without uploading anything.
    #[arg(long)]
    pub dry_run: bool,
}

impl RevertArgs {
    pub fn run(self, config_path: &Path) -> Result<()> {
        let config = load_config(config_path)?;
        if !self.dry_run {
            config
                .require_credentials()
                .context("reverting needs OSM credentials")?;
        }

        let outcomes = pipeline::revert(&config, &self.ids, self.dry_run).context("revert failed")?;
        for (id, outcome) in &outcomes {
            print_outcome(*id, outcome);
        }

        let failed = outcomes.iter().filter(|(_, o)| o.is_failure()).count();
        if failed > 0 {
            bail!("{failed} of {} changesets could not be reverted", outcomes.len());
        }
        Ok(())
    }
}

pub(crate) fn print_outcome(id: ChangesetId, outcome: &ChangesetOutcome) {
    match outcome {
        ChangesetOutcome::Reverted { changeset, changes } => println!(
            "  {} {id} reverted in {changeset} ({changes} changes)",
            "✎".green().bold()
        ),
        ChangesetOutcome::NothingToRevert => {
            println!("  {} {id} nothing to revert", "·".bright_black())
        }
        ChangesetOutcome::DryRun { changes } => {
            println!("  {} {id} would revert {changes} changes", "~".cyan())
        }
        ChangesetOutcome::Failed { kind, detail } => {
            println!("  {} {id} {kind}: {detail}", "✗".red().bold())
        }
    }
}
