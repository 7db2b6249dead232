//! `sisyphus status`: where the feed and the cursor stand.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use sisyphus_runner::{pipeline, FeedStatus};

use super::load_config;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self, config_path: &Path) -> Result<()> {
        let config = load_config(config_path)?;
        let status = pipeline::status(&config).context("cannot read the replication feed")?;

        if self.json {
            print_json(&status, config.state_file.display().to_string())?;
        } else {
            print_table(&status, &config.state_file.display().to_string());
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct StatusJson<'a> {
    #[serde(flatten)]
    status: &'a FeedStatus,
    pending: u64,
    state_file: String,
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "head")]
    head: String,
    #[tabled(rename = "feed updated")]
    last_run: String,
    #[tabled(rename = "cursor")]
    cursor: String,
    #[tabled(rename = "next range")]
    range: String,
    #[tabled(rename = "pending")]
    pending: String,
}

fn print_json(status: &FeedStatus, state_file: String) -> Result<()> {
    let payload = StatusJson {
        status,
        pending: status.pending(),
        state_file,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
    );
    Ok(())
}

fn print_table(status: &FeedStatus, state_file: &str) {
    println!("Sisyphus v{} | state file {state_file}", env!("CARGO_PKG_VERSION"));

    let pending = status.pending();
    let row = StatusRow {
        head: status.head.to_string(),
        last_run: status
            .last_run
            .map(|t| format_age(t, Utc::now()))
            .unwrap_or_else(|| "unknown".to_string()),
        cursor: status
            .cursor
            .map(|c| c.to_string())
            .unwrap_or_else(|| "not set".to_string()),
        range: format!("{}..{}", status.plan.start, status.plan.end),
        pending: if pending == 0 {
            "0".green().to_string()
        } else {
            pending.to_string().yellow().to_string()
        },
    };
    let mut table = Table::new([row]);
    table.with(Style::rounded());
    println!("{table}");
}

fn format_age(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - at).num_seconds().max(0);
    match secs {
        0..=59 => format!("{secs}s ago"),
        60..=3599 => format!("{}m ago", secs / 60),
        3600..=86_399 => format!("{}h ago", secs / 3600),
        _ => format!("{}d ago", secs / 86_400),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn ages_are_coarse() {
        let now = Utc::now();
        assert_eq!(format_age(now - Duration::seconds(42), now), "42s ago");
        assert_eq!(format_age(now - Duration::minutes(5), now), "5m ago");
        assert_eq!(format_age(now - Duration::hours(3), now), "3h ago");
        assert_eq!(format_age(now - Duration::days(2), now), "2d ago");
        assert_eq!(format_age(now + Duration::seconds(5), now), "0s ago");
    }
}
