//! Parsing of the feed's `state.yaml`.
//!
//! ```text
//! ---
//! last_run: 2024-03-01 10:15:02.517000000 +00:00
//! sequence: 5981203
//! ```
//!
//! Only `sequence:` is required. Fields are matched with a regex, not parsed
//! as YAML.

use chrono::{DateTime, Utc};
use regex::Regex;

use sisyphus_core::SequenceNumber;

const SEQUENCE_PATTERN: &str = r"sequence:\s+(\d+)";
const LAST_RUN_PATTERN: &str = r"last_run:\s+(.+)";
const LAST_RUN_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f %:z";

/// Published head of the replication feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedState {
    pub sequence: SequenceNumber,
    pub last_run: Option<DateTime<Utc>>,
}

/// Extract the feed state from `text`.
///
/// Returns a reason string when the `sequence:` line is missing or its value
/// does not fit a `u64`.
pub fn parse_state(text: &str) -> Result<FeedState, String> {
    let sequence_re = Regex::new(SEQUENCE_PATTERN).map_err(|e| e.to_string())?;
    let caps = sequence_re
        .captures(text)
        .ok_or_else(|| "no `sequence:` field in state document".to_string())?;
    let sequence = caps[1]
        .parse::<u64>()
        .map_err(|e| format!("bad sequence value {:?}: {e}", &caps[1]))?;

    let last_run = Regex::new(LAST_RUN_PATTERN)
        .ok()
        .and_then(|re| re.captures(text).map(|c| c[1].trim().to_string()))
        .and_then(|raw| DateTime::parse_from_str(&raw, LAST_RUN_FORMAT).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Ok(FeedState {
        sequence: SequenceNumber(sequence),
        last_run,
    })
}
