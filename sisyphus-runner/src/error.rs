//! Error types for sisyphus-runner.

use std::path::PathBuf;

use thiserror::Error;

use sisyphus_core::CursorError;
use sisyphus_feed::FeedError;

/// Errors that end a run. Per-changeset failures never surface here; they are
/// reported through the notifier and recorded in the run report.
#[derive(Debug, Error)]
pub enum RunError {
    /// The feed head could not be determined; nothing was processed.
    #[error("feed unavailable: {0}")]
    Feed(#[from] FeedError),

    /// Progress could not be persisted.
    #[error("cursor error: {0}")]
    Cursor(#[from] CursorError),

    #[error("notifier setup failed: {0}")]
    Notify(#[from] NotifyError),
}

/// Errors from composing or handing off a failure mail.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("mail template error: {0}")]
    Template(#[from] tera::Error),

    #[error("cannot run {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} exited with {status}")]
    Exit {
        path: PathBuf,
        status: std::process::ExitStatus,
    },
}
