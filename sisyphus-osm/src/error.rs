//! Error types for sisyphus-osm.
//!
//! [`RevertError`] covers everything that can go wrong while reverting one
//! changeset, from downloading its history to closing the revert changeset.
//! None of these abort a run; the orchestrator reports them and moves on.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use sisyphus_core::ChangesetId;

/// Failure of a single revert attempt.
#[derive(Debug, Error)]
pub enum RevertError {
    /// Network or API failure while reading changesets or element history.
    #[error("download of {what} failed: {reason}")]
    Download { what: String, reason: String },

    /// The aggregate edit count exceeds the configured ceiling.
    #[error("would not revert {count} changes (limit is {limit})")]
    TooManyChanges { count: usize, limit: usize },

    /// The downloaded diffs are internally inconsistent.
    #[error("cannot compute revert: {0}")]
    Computation(String),

    #[error("failed to create changeset: {0}")]
    Create(String),

    /// Non-success upload response, including edit conflicts.
    #[error("server rejected the upload to changeset {changeset}: {reason}")]
    Upload {
        changeset: ChangesetId,
        reason: String,
    },

    #[error("failed to close changeset {changeset}: {reason}")]
    Close {
        changeset: ChangesetId,
        reason: String,
    },
}

impl RevertError {
    pub fn kind(&self) -> RevertErrorKind {
        match self {
            RevertError::Download { .. } => RevertErrorKind::Download,
            RevertError::TooManyChanges { .. } => RevertErrorKind::TooManyChanges,
            RevertError::Computation(_) => RevertErrorKind::Computation,
            RevertError::Create(_) => RevertErrorKind::Create,
            RevertError::Upload { .. } => RevertErrorKind::Upload,
            RevertError::Close { .. } => RevertErrorKind::Close,
        }
    }

    pub(crate) fn download(what: impl fmt::Display, reason: impl fmt::Display) -> Self {
        RevertError::Download {
            what: what.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Tag for [`RevertError`] without its payload; used in reports and mail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RevertErrorKind {
    #[serde(rename = "DownloadError")]
    Download,
    TooManyChanges,
    #[serde(rename = "RevertComputationError")]
    Computation,
    #[serde(rename = "CreateError")]
    Create,
    #[serde(rename = "UploadError")]
    Upload,
    #[serde(rename = "CloseError")]
    Close,
}

impl fmt::Display for RevertErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RevertErrorKind::Download => "DownloadError",
            RevertErrorKind::TooManyChanges => "TooManyChanges",
            RevertErrorKind::Computation => "RevertComputationError",
            RevertErrorKind::Create => "CreateError",
            RevertErrorKind::Upload => "UploadError",
            RevertErrorKind::Close => "CloseError",
        })
    }
}

/// Malformed OSM XML.
#[derive(Debug, Error)]
#[error("malformed OSM XML: {0}")]
pub struct XmlError(pub String);

/// Reason text for a failed ureq call; includes the API's error body.
pub(crate) fn describe(err: ureq::Error) -> String {
    match err {
        ureq::Error::Status(code, resp) => {
            let status = resp.status_text().to_string();
            let body = resp.into_string().unwrap_or_default();
            let body = body.trim();
            if body.is_empty() {
                format!("HTTP {code} {status}")
            } else {
                format!("HTTP {code} {status}: {body}")
            }
        }
        ureq::Error::Transport(transport) => transport.to_string(),
    }
}
