//! Revert computation.
//!
//! [`RevertEngine`] is the boundary the orchestrator talks to. The bundled
//! [`HistoryRevertEngine`] restores every touched object to the version it had
//! before the reverted changeset(s):
//!
//! | change in changeset     | revert                                        |
//! |-------------------------|-----------------------------------------------|
//! | create (v1)             | delete                                        |
//! | modify / delete (vN)    | modify back to v(first touched − 1)           |
//!
//! Every revert is addressed at the last version the changeset produced, so
//! if someone edited the object since, the API refuses the upload instead of
//! silently overwriting their work. Objects that already match their target
//! are skipped, which makes reverting the same changeset twice a no-op.

use std::collections::BTreeMap;

use sisyphus_core::ChangesetId;

use crate::element::{Action, Element, ElementType};
use crate::error::RevertError;

// ---------------------------------------------------------------------------
// Data
// ---------------------------------------------------------------------------

/// One element change recorded in a changeset: the element as it was *after*
/// the change.
#[derive(Debug, Clone, PartialEq)]
pub struct Diff {
    pub action: Action,
    pub element: Element,
}

/// All element changes of one or more changesets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffSet {
    pub diffs: Vec<Diff>,
}

impl DiffSet {
    pub fn len(&self) -> usize {
        self.diffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diffs.is_empty()
    }
}

/// Changeset id → author display name.
pub type AuthorMap = BTreeMap<ChangesetId, String>;

/// One inverse edit to upload.
#[derive(Debug, Clone, PartialEq)]
pub struct ReversibleChange {
    pub action: Action,
    pub element: Element,
}

/// Inverse edits, in upload order. Empty means there is nothing left to revert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReversibleChangeSet {
    changes: Vec<ReversibleChange>,
}

impl ReversibleChangeSet {
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReversibleChange> {
        self.changes.iter()
    }

    /// `(create, modify, delete)` counts.
    pub fn counts(&self) -> (usize, usize, usize) {
        self.changes
            .iter()
            .fold((0, 0, 0), |(c, m, d), change| match change.action {
                Action::Create => (c + 1, m, d),
                Action::Modify => (c, m + 1, d),
                Action::Delete => (c, m, d + 1),
            })
    }
}

impl From<Vec<ReversibleChange>> for ReversibleChangeSet {
    fn from(changes: Vec<ReversibleChange>) -> Self {
        Self { changes }
    }
}

/// Tags for the revert changeset: `created_by`, a `comment` naming what is
/// reverted, and `bot=yes`.
pub fn changeset_tags(
    created_by: &str,
    reverted: &[ChangesetId],
    authors: &AuthorMap,
) -> BTreeMap<String, String> {
    let targets = reverted
        .iter()
        .map(|id| match authors.get(id) {
            Some(user) => format!("{id} by {user}"),
            None => id.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ");

    let mut tags = BTreeMap::new();
    tags.insert("created_by".to_string(), created_by.to_string());
    tags.insert("comment".to_string(), format!("Reverting {targets}"));
    tags.insert("bot".to_string(), "yes".to_string());
    tags
}

// ---------------------------------------------------------------------------
// Engine boundary
// ---------------------------------------------------------------------------

/// Computes inverse edits for changesets.
pub trait RevertEngine {
    /// Full edit history of `ids` plus their authors.
    fn download_changesets(&self, ids: &[ChangesetId]) -> Result<(DiffSet, AuthorMap), RevertError>;

    /// Inverse edits for `diffs`; empty when everything is already reverted.
    fn compute_reverts(&self, diffs: &DiffSet) -> Result<ReversibleChangeSet, RevertError>;
}

impl<T: RevertEngine + ?Sized> RevertEngine for &T {
    fn download_changesets(&self, ids: &[ChangesetId]) -> Result<(DiffSet, AuthorMap), RevertError> {
        (**self).download_changesets(ids)
    }

    fn compute_reverts(&self, diffs: &DiffSet) -> Result<ReversibleChangeSet, RevertError> {
        (**self).compute_reverts(diffs)
    }
}

/// Read access to changesets and element history.
pub trait ElementSource {
    fn changeset_author(&self, id: ChangesetId) -> Result<String, RevertError>;

    fn changeset_changes(&self, id: ChangesetId) -> Result<Vec<Diff>, RevertError>;

    /// Latest version, or `None` if the element is currently deleted.
    fn current(&self, kind: ElementType, id: i64) -> Result<Option<Element>, RevertError>;

    fn version(&self, kind: ElementType, id: i64, version: u64) -> Result<Element, RevertError>;
}

impl<T: ElementSource + ?Sized> ElementSource for &T {
    fn changeset_author(&self, id: ChangesetId) -> Result<String, RevertError> {
        (**self).changeset_author(id)
    }

    fn changeset_changes(&self, id: ChangesetId) -> Result<Vec<Diff>, RevertError> {
        (**self).changeset_changes(id)
    }

    fn current(&self, kind: ElementType, id: i64) -> Result<Option<Element>, RevertError> {
        (**self).current(kind, id)
    }

    fn version(&self, kind: ElementType, id: i64, version: u64) -> Result<Element, RevertError> {
        (**self).version(kind, id, version)
    }
}

// ---------------------------------------------------------------------------
// History-based engine
// ---------------------------------------------------------------------------

/// [`RevertEngine`] that rolls objects back using the API's version history.
pub struct HistoryRevertEngine<S> {
    source: S,
}

/// Range of versions a set of diffs produced for one object.
struct Touched {
    first_version: u64,
    last_version: u64,
    last: Element,
}

impl<S: ElementSource> HistoryRevertEngine<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    fn group(diffs: &DiffSet) -> Result<BTreeMap<(ElementType, i64), Touched>, RevertError> {
        let mut touched: BTreeMap<(ElementType, i64), Touched> = BTreeMap::new();
        for diff in &diffs.diffs {
            let element = &diff.element;
            if element.id <= 0 {
                return Err(RevertError::Computation(format!(
                    "{element} has a placeholder id"
                )));
            }
            match (diff.action, element.version) {
                (Action::Create, 1) | (Action::Modify | Action::Delete, 2..) => {}
                (action, _) => {
                    return Err(RevertError::Computation(format!(
                        "{action} of {element} is inconsistent with its version"
                    )))
                }
            }
            touched
                .entry(element.key())
                .and_modify(|t| {
                    t.first_version = t.first_version.min(element.version);
                    if element.version > t.last_version {
                        t.last_version = element.version;
                        t.last = element.clone();
                    }
                })
                .or_insert_with(|| Touched {
                    first_version: element.version,
                    last_version: element.version,
                    last: element.clone(),
                });
        }
        Ok(touched)
    }

    fn revert_one(&self, touched: Touched) -> Result<Option<ReversibleChange>, RevertError> {
        let (kind, id) = touched.last.key();
        let current = self
            .source
            .current(kind, id)?
            .filter(|element| element.visible);

        let target = match touched.first_version - 1 {
            0 => None,
            before => Some(self.source.version(kind, id, before)?).filter(|e| e.visible),
        };

        match (target, current) {
            (None, None) => Ok(None),
            (None, Some(current)) => {
                let mut element = current;
                element.version = touched.last_version;
                Ok(Some(ReversibleChange {
                    action: Action::Delete,
                    element,
                }))
            }
            (Some(target), Some(current)) if target.same_content(&current) => Ok(None),
            (Some(mut target), _) => {
                target.version = touched.last_version;
                target.visible = true;
                Ok(Some(ReversibleChange {
                    action: Action::Modify,
                    element: target,
                }))
            }
        }
    }
}

impl<S: ElementSource> RevertEngine for HistoryRevertEngine<S> {
    fn download_changesets(&self, ids: &[ChangesetId]) -> Result<(DiffSet, AuthorMap), RevertError> {
        let mut diffs = DiffSet::default();
        let mut authors = AuthorMap::new();
        for &id in ids {
            authors.insert(id, self.source.changeset_author(id)?);
            diffs.diffs.extend(self.source.changeset_changes(id)?);
        }
        tracing::debug!(changesets = ids.len(), diffs = diffs.len(), "downloaded changesets");
        Ok((diffs, authors))
    }

    fn compute_reverts(&self, diffs: &DiffSet) -> Result<ReversibleChangeSet, RevertError> {
        let mut modify = Vec::new();
        let mut delete = Vec::new();
        for (_, touched) in Self::group(diffs)? {
            match self.revert_one(touched)? {
                Some(change) if change.action == Action::Delete => delete.push(change),
                Some(change) => modify.push(change),
                None => {}
            }
        }

        // Referenced objects must exist before referrers are restored, and
        // referrers must be gone before what they reference is deleted.
        modify.sort_by_key(|c| (c.element.kind.build_rank(), c.element.id));
        delete.sort_by_key(|c| (std::cmp::Reverse(c.element.kind.build_rank()), c.element.id));

        modify.extend(delete);
        Ok(ReversibleChangeSet::from(modify))
    }
}
