//! # sisyphus-feed
//!
//! Reader for the OSM changeset replication feed.
//!
//! [`ReplicationClient::head`] reads the published sequence number from
//! `state.yaml`; [`ReplicationClient::fetch`] downloads one gzip unit and
//! returns the ids of changesets whose author is on the watch-list.

pub mod client;
pub mod error;
pub mod state;
pub mod unit;

pub use client::{ReplicationClient, ReplicationFeed};
pub use error::FeedError;
pub use state::{parse_state, FeedState};
pub use unit::{parse_unit, unit_path, unit_url};
