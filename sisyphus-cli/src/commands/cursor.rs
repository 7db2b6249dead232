//! `sisyphus cursor show` and `sisyphus cursor set <N>`

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};

use sisyphus_core::{config, CursorStore, FileCursorStore, SequenceNumber};

/// Inspect or move the persisted cursor.
#[derive(Subcommand, Debug)]
pub enum CursorCommand {
    /// Print the last processed replication unit.
    Show,

    /// Overwrite the cursor; the next run starts at this unit.
    Set(SetArgs),
}

#[derive(Args, Debug)]
pub struct SetArgs {
    pub value: SequenceNumber,

    /// Allow moving the cursor backwards (units will be processed again).
    #[arg(long)]
    pub force: bool,
}

pub fn run(cmd: CursorCommand, config_path: &Path) -> Result<()> {
    // Cursor handling needs only `state_file`; skip full validation.
    let config = config::read_at(config_path).context("failed to load config")?;
    let store = FileCursorStore::new(&config.state_file);
    match cmd {
        CursorCommand::Show => show(&store),
        CursorCommand::Set(args) => set(&store, args),
    }
}

fn show(store: &FileCursorStore) -> Result<()> {
    match store.read() {
        Some(n) => println!("{n}"),
        None => println!(
            "not set; the next run starts one unit before head - delay ({})",
            store.path().display()
        ),
    }
    Ok(())
}

fn set(store: &FileCursorStore, args: SetArgs) -> Result<()> {
    if let Some(current) = store.read() {
        if args.value < current && !args.force {
            bail!(
                "cursor is at {current}; moving it back to {} needs --force",
                args.value
            );
        }
    }
    store
        .write(args.value)
        .with_context(|| format!("failed to write {}", store.path().display()))?;
    println!("✓ cursor set to {}", args.value);
    Ok(())
}
