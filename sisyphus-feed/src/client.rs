//! HTTP client for the changeset replication feed.

use std::io::BufReader;
use std::time::Duration;

use flate2::read::GzDecoder;

use sisyphus_core::{ChangesetId, SequenceNumber, WatchList};

use crate::error::{describe, FeedError};
use crate::state::{parse_state, FeedState};
use crate::unit::{parse_unit, unit_url};

/// Source of replication units.
///
/// The orchestrator only talks to the feed through this trait so runs can be
/// exercised against an in-memory feed.
pub trait ReplicationFeed {
    /// Current head sequence number of the feed.
    fn head(&self) -> Result<SequenceNumber, FeedError>;

    /// Watched changeset ids contained in unit `n`.
    fn fetch(&self, n: SequenceNumber) -> Result<Vec<ChangesetId>, FeedError>;
}

impl<T: ReplicationFeed + ?Sized> ReplicationFeed for &T {
    fn head(&self) -> Result<SequenceNumber, FeedError> {
        (**self).head()
    }

    fn fetch(&self, n: SequenceNumber) -> Result<Vec<ChangesetId>, FeedError> {
        (**self).fetch(n)
    }
}

/// Blocking ureq-backed [`ReplicationFeed`].
pub struct ReplicationClient {
    agent: ureq::Agent,
    base_url: String,
    watch: WatchList,
}

impl ReplicationClient {
    pub fn new(base_url: impl Into<String>, watch: WatchList, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("sisyphus/", env!("CARGO_PKG_VERSION")))
            .build();
        Self::with_agent(agent, base_url, watch)
    }

    pub fn with_agent(agent: ureq::Agent, base_url: impl Into<String>, watch: WatchList) -> Self {
        Self {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            watch,
        }
    }

    pub fn state_url(&self) -> String {
        format!("{}/state.yaml", self.base_url)
    }

    /// Full feed state, including `last_run` when published.
    pub fn state(&self) -> Result<FeedState, FeedError> {
        let url = self.state_url();
        let unavailable = |reason: String| FeedError::Unavailable {
            url: url.clone(),
            reason,
        };
        let body = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| unavailable(describe(e)))?
            .into_string()
            .map_err(|e| unavailable(e.to_string()))?;
        parse_state(&body).map_err(unavailable)
    }
}

impl ReplicationFeed for ReplicationClient {
    fn head(&self) -> Result<SequenceNumber, FeedError> {
        let state = self.state()?;
        tracing::debug!(sequence = %state.sequence, "replication head");
        Ok(state.sequence)
    }

    fn fetch(&self, n: SequenceNumber) -> Result<Vec<ChangesetId>, FeedError> {
        let url = unit_url(&self.base_url, n);
        let fetch_err = |reason: String| FeedError::Fetch {
            sequence: n,
            url: url.clone(),
            reason,
        };
        let response = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| fetch_err(describe(e)))?;
        let reader = BufReader::new(GzDecoder::new(response.into_reader()));
        let ids = parse_unit(reader, &self.watch).map_err(|e| fetch_err(e.to_string()))?;
        tracing::debug!(sequence = %n, matched = ids.len(), "fetched replication unit");
        Ok(ids)
    }
}
