//! # sisyphus-runner
//!
//! The revert loop and everything around it:
//!
//! - [`orchestrator`]: [`Orchestrator`], feed → revert → cursor
//! - [`notify`]: failure mail ([`SendmailNotifier`], [`NullNotifier`])
//! - [`pipeline`]: wiring from a [`sisyphus_core::Config`] for the CLI

pub mod error;
pub mod notify;
pub mod orchestrator;
pub mod pipeline;

pub use error::{NotifyError, RunError};
pub use notify::{notifier_from_config, Notifier, NullNotifier, SendmailNotifier, SUBJECT};
pub use orchestrator::{
    ChangesetOutcome, Orchestrator, OrchestratorSettings, RunPlan, RunReport,
};
pub use pipeline::FeedStatus;
