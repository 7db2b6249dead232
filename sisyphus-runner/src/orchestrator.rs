//! The revert loop.
//!
//! One [`Orchestrator::run`] walks the replication feed from the persisted
//! cursor up to `head - delay`, reverts every watched changeset it finds and
//! records progress after each unit:
//!
//! ```text
//! plan:  head ──► end = head - delay
//!        cursor ──► start (or end - 1 on first run)
//!
//! for n in start..end
//!   fetch(n) ──► [c1, c2, …]
//!     revert(c) ─ download ─ size guard ─ compute ─ transaction
//!        └─ any error ─► notifier, continue
//!   cursor := n
//! ```
//!
//! Changeset failures never stop the loop. Only an unreadable feed head or a
//! cursor that cannot be persisted end a run with an error.

use serde::Serialize;

use sisyphus_core::{ChangesetId, Config, CursorStore, FetchErrorPolicy, SequenceNumber};
use sisyphus_feed::ReplicationFeed;
use sisyphus_osm::{
    changeset_tags, run_transaction, ChangesetApi, RevertEngine, RevertError, RevertErrorKind,
};

use crate::error::RunError;
use crate::notify::Notifier;

/// Policy knobs taken from [`Config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Feed units left unprocessed behind the head.
    pub delay: u64,
    pub max_diffs: usize,
    pub created_by: String,
    pub on_fetch_error: FetchErrorPolicy,
    /// Compute reverts but never create a changeset or move the cursor.
    pub dry_run: bool,
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config, dry_run: bool) -> Self {
        Self {
            delay: config.delay_minutes,
            max_diffs: config.max_diffs,
            created_by: config.created_by.clone(),
            on_fetch_error: config.on_fetch_error,
            dry_run,
        }
    }
}

/// Range of feed units one run covers: `start..end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunPlan {
    pub head: SequenceNumber,
    pub start: SequenceNumber,
    pub end: SequenceNumber,
}

impl RunPlan {
    /// `end = head - delay`; `start` is the persisted cursor, or `end - 1`
    /// when nothing has been persisted yet.
    pub fn compute(head: SequenceNumber, cursor: Option<SequenceNumber>, delay: u64) -> Self {
        let end = head.saturating_sub(delay);
        let start = cursor.unwrap_or_else(|| end.saturating_sub(1));
        Self { head, start, end }
    }

    /// Number of units the run will attempt.
    pub fn units(&self) -> u64 {
        self.end.0.saturating_sub(self.start.0)
    }

    pub fn is_empty(&self) -> bool {
        self.units() == 0
    }
}

/// Result of one changeset's revert attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChangesetOutcome {
    /// Inverse edits were uploaded in the remote changeset `changeset`.
    Reverted { changeset: ChangesetId, changes: usize },
    /// Nothing left to undo, usually because it was reverted already.
    NothingToRevert,
    /// Dry run: `changes` inverse edits would have been uploaded.
    DryRun { changes: usize },
    Failed { kind: RevertErrorKind, detail: String },
}

impl ChangesetOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, ChangesetOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub plan: RunPlan,
    pub units_processed: u64,
    pub outcomes: Vec<(ChangesetId, ChangesetOutcome)>,
    /// Units passed over under [`FetchErrorPolicy::Skip`].
    pub skipped_units: Vec<SequenceNumber>,
    /// Unit whose fetch failed under [`FetchErrorPolicy::Halt`].
    pub halted_at: Option<SequenceNumber>,
}

impl RunReport {
    fn new(plan: RunPlan) -> Self {
        Self {
            plan,
            units_processed: 0,
            outcomes: Vec::new(),
            skipped_units: Vec::new(),
            halted_at: None,
        }
    }

    pub fn reverted(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, ChangesetOutcome::Reverted { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_failure()).count()
    }
}

pub struct Orchestrator<F, E, A, N, C> {
    feed: F,
    engine: E,
    api: A,
    notifier: N,
    cursor: C,
    settings: OrchestratorSettings,
}

impl<F, E, A, N, C> Orchestrator<F, E, A, N, C>
where
    F: ReplicationFeed,
    E: RevertEngine,
    A: ChangesetApi,
    N: Notifier,
    C: CursorStore,
{
    pub fn new(
        feed: F,
        engine: E,
        api: A,
        notifier: N,
        cursor: C,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            feed,
            engine,
            api,
            notifier,
            cursor,
            settings,
        }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Read the feed head and the cursor; touches nothing.
    pub fn plan(&self) -> Result<RunPlan, RunError> {
        let head = self.feed.head()?;
        Ok(RunPlan::compute(head, self.cursor.read(), self.settings.delay))
    }

    /// One pass over the feed.
    pub fn run(&self) -> Result<RunReport, RunError> {
        let plan = self.plan()?;
        tracing::info!(
            head = %plan.head,
            start = %plan.start,
            end = %plan.end,
            dry_run = self.settings.dry_run,
            "planned run"
        );
        let mut report = RunReport::new(plan);

        let mut n = plan.start;
        while n < plan.end {
            match self.feed.fetch(n) {
                Ok(ids) => {
                    tracing::debug!(sequence = %n, matches = ids.len(), "fetched unit");
                    for id in ids {
                        let outcome = self.revert_changeset(id);
                        report.outcomes.push((id, outcome));
                    }
                }
                Err(e) => match self.settings.on_fetch_error {
                    FetchErrorPolicy::Halt => {
                        tracing::error!(sequence = %n, "halting run: {e}");
                        report.halted_at = Some(n);
                        return Ok(report);
                    }
                    FetchErrorPolicy::Skip => {
                        tracing::warn!(sequence = %n, "skipping unit: {e}");
                        report.skipped_units.push(n);
                    }
                },
            }

            if !self.settings.dry_run {
                self.cursor.write(n)?;
            }
            report.units_processed += 1;
            n = n.next();
        }

        tracing::info!(
            units = report.units_processed,
            reverted = report.reverted(),
            failed = report.failed(),
            "run finished"
        );
        Ok(report)
    }

    /// Revert one changeset. Failures are sent to the notifier and returned
    /// as [`ChangesetOutcome::Failed`]; this never errors.
    pub fn revert_changeset(&self, id: ChangesetId) -> ChangesetOutcome {
        match self.try_revert(id) {
            Ok(outcome) => outcome,
            Err(e) => {
                let kind = e.kind();
                let detail = e.to_string();
                tracing::error!(changeset = %id, %kind, "revert failed: {detail}");
                self.notifier.notify_failure(id, kind, &detail);
                ChangesetOutcome::Failed { kind, detail }
            }
        }
    }

    fn try_revert(&self, id: ChangesetId) -> Result<ChangesetOutcome, RevertError> {
        let (diffs, authors) = self.engine.download_changesets(&[id])?;
        if diffs.len() > self.settings.max_diffs {
            return Err(RevertError::TooManyChanges {
                count: diffs.len(),
                limit: self.settings.max_diffs,
            });
        }

        let changes = self.engine.compute_reverts(&diffs)?;
        if changes.is_empty() {
            tracing::info!(changeset = %id, "nothing to revert");
            return Ok(ChangesetOutcome::NothingToRevert);
        }
        if self.settings.dry_run {
            let (create, modify, delete) = changes.counts();
            tracing::info!(changeset = %id, create, modify, delete, "dry run: would revert");
            return Ok(ChangesetOutcome::DryRun {
                changes: changes.len(),
            });
        }

        let tags = changeset_tags(&self.settings.created_by, &[id], &authors);
        let remote = run_transaction(&self.api, &tags, &changes)?;
        tracing::info!(changeset = %id, revert = %remote, changes = changes.len(), "reverted");
        Ok(ChangesetOutcome::Reverted {
            changeset: remote,
            changes: changes.len(),
        })
    }
}
