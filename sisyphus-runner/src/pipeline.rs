//! Production wiring shared by the `run`, `revert` and `status` commands.

use chrono::{DateTime, Utc};
use serde::Serialize;

use sisyphus_core::{ChangesetId, Config, CursorStore, FileCursorStore, SequenceNumber};
use sisyphus_feed::{FeedError, ReplicationClient};
use sisyphus_osm::{HistoryRevertEngine, OsmApi};

use crate::error::RunError;
use crate::notify::{notifier_from_config, Notifier};
use crate::orchestrator::{
    ChangesetOutcome, Orchestrator, OrchestratorSettings, RunPlan, RunReport,
};

/// Feed client for `config.replication_url` filtered by `config.users`.
pub fn feed_from_config(config: &Config) -> ReplicationClient {
    ReplicationClient::new(
        config.replication_url.clone(),
        config.users.clone(),
        config.http_timeout(),
    )
}

type LiveOrchestrator<'a> = Orchestrator<
    ReplicationClient,
    HistoryRevertEngine<&'a OsmApi>,
    &'a OsmApi,
    Box<dyn Notifier>,
    FileCursorStore,
>;

fn with_orchestrator<T>(
    config: &Config,
    dry_run: bool,
    f: impl FnOnce(&LiveOrchestrator<'_>) -> T,
) -> Result<T, RunError> {
    let api = OsmApi::from_config(config);
    let orchestrator = Orchestrator::new(
        feed_from_config(config),
        HistoryRevertEngine::new(&api),
        &api,
        notifier_from_config(config)?,
        FileCursorStore::new(&config.state_file),
        OrchestratorSettings::from_config(config, dry_run),
    );
    Ok(f(&orchestrator))
}

/// One orchestrator pass with the real feed, API and cursor file.
pub fn run(config: &Config, dry_run: bool) -> Result<RunReport, RunError> {
    with_orchestrator(config, dry_run, |o| o.run())?
}

/// Revert `ids` directly, outside the feed loop. The cursor is not touched.
pub fn revert(
    config: &Config,
    ids: &[ChangesetId],
    dry_run: bool,
) -> Result<Vec<(ChangesetId, ChangesetOutcome)>, RunError> {
    with_orchestrator(config, dry_run, |o| {
        ids.iter().map(|&id| (id, o.revert_changeset(id))).collect()
    })
}

/// Where the feed and the cursor stand, without processing anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedStatus {
    pub head: SequenceNumber,
    pub last_run: Option<DateTime<Utc>>,
    pub cursor: Option<SequenceNumber>,
    pub plan: RunPlan,
}

impl FeedStatus {
    /// Units waiting for the next run.
    pub fn pending(&self) -> u64 {
        self.plan.units()
    }
}

pub fn status(config: &Config) -> Result<FeedStatus, FeedError> {
    let state = feed_from_config(config).state()?;
    let cursor = FileCursorStore::new(&config.state_file).read();
    Ok(FeedStatus {
        head: state.sequence,
        last_run: state.last_run,
        cursor,
        plan: RunPlan::compute(state.sequence, cursor, config.delay_minutes),
    })
}
