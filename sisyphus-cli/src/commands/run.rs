//! `sisyphus run`: one pass over the replication feed.

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use sisyphus_runner::{pipeline, RunReport};

use super::{load_config, revert::print_outcome};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Compute reverts without creating changesets or moving the cursor.
    #[arg(long)]
    pub dry_run: bool,
}

impl RunArgs {
    pub fn run(self, config_path: &Path) -> Result<()> {
        let config = load_config(config_path)?;
        if !self.dry_run {
            config
                .require_credentials()
                .context("reverting needs OSM credentials")?;
        }

        let report = pipeline::run(&config, self.dry_run).context("run failed")?;
        print_report(&report, self.dry_run);

        if let Some(n) = report.halted_at {
            bail!("stopped at replication unit {n}; it will be retried on the next run");
        }
        Ok(())
    }
}

fn print_report(report: &RunReport, dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    let plan = &report.plan;
    if plan.is_empty() {
        println!("{prefix}✓ up to date (head {}, cursor {})", plan.head, plan.start);
        return;
    }

    println!(
        "{prefix}✓ units {}..{} ({} processed, head {})",
        plan.start, plan.end, report.units_processed, plan.head
    );
    for (id, outcome) in &report.outcomes {
        print_outcome(*id, outcome);
    }
    for n in &report.skipped_units {
        println!("  {} unit {n} skipped", "!".yellow().bold());
    }
    if report.failed() > 0 {
        println!(
            "{}",
            format!("{} of {} changesets failed", report.failed(), report.outcomes.len()).red()
        );
    }
}
