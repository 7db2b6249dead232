//! Sisyphus core library: domain types, configuration, cursor persistence.
//!
//! - [`types`]: newtypes and the watch-list
//! - [`config`]: YAML configuration load / save / validate
//! - [`cursor`]: [`CursorStore`] and its file and in-memory implementations
//! - [`error`]: [`ConfigError`], [`CursorError`]

pub mod config;
pub mod cursor;
pub mod error;
pub mod types;

pub use config::{Config, FetchErrorPolicy};
pub use cursor::{CursorStore, FileCursorStore, MemoryCursorStore};
pub use error::{ConfigError, CursorError};
pub use types::{ChangesetId, SequenceNumber, UserId, WatchList};
