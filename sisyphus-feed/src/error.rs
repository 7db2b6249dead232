//! Error types for sisyphus-feed.

use sisyphus_core::SequenceNumber;
use thiserror::Error;

/// All errors that can arise from reading the replication feed.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The feed's state document could not be fetched or has no `sequence:`.
    /// Nothing can be planned without it, so the whole run aborts.
    #[error("replication state unavailable at {url}: {reason}")]
    Unavailable { url: String, reason: String },

    /// One replication unit could not be downloaded, decompressed or parsed.
    #[error("cannot fetch replication unit {sequence} from {url}: {reason}")]
    Fetch {
        sequence: SequenceNumber,
        url: String,
        reason: String,
    },

    /// Malformed XML (or a broken gzip stream underneath it).
    #[error("malformed replication XML: {0}")]
    Xml(String),
}

/// Human-readable reason for a failed ureq call.
pub(crate) fn describe(err: ureq::Error) -> String {
    match err {
        ureq::Error::Status(code, resp) => format!("HTTP {code} {}", resp.status_text()),
        ureq::Error::Transport(transport) => transport.to_string(),
    }
}
