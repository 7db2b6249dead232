//! Create → upload → close, with a guaranteed close.
//!
//! ```text
//! create ──ok──► Created ──upload ok──► Uploaded ──close──► Closed
//!   │                 └──upload err──────────────────close──► Closed (upload error surfaced)
//!   └──err──► nothing opened, nothing to close
//! ```
//!
//! [`OpenChangeset`] owns an open remote changeset. It is closed exactly once:
//! explicitly via [`OpenChangeset::close`], or by `Drop` if the holder bails
//! out (including by unwinding) before doing so.

use std::collections::BTreeMap;

use sisyphus_core::ChangesetId;

use crate::error::RevertError;
use crate::revert::ReversibleChangeSet;

/// The three write calls of the OSM changeset API.
pub trait ChangesetApi {
    fn create(&self, tags: &BTreeMap<String, String>) -> Result<ChangesetId, RevertError>;

    fn upload(
        &self,
        changeset: ChangesetId,
        changes: &ReversibleChangeSet,
    ) -> Result<(), RevertError>;

    fn close(&self, changeset: ChangesetId) -> Result<(), RevertError>;
}

impl<T: ChangesetApi + ?Sized> ChangesetApi for &T {
    fn create(&self, tags: &BTreeMap<String, String>) -> Result<ChangesetId, RevertError> {
        (**self).create(tags)
    }

    fn upload(
        &self,
        changeset: ChangesetId,
        changes: &ReversibleChangeSet,
    ) -> Result<(), RevertError> {
        (**self).upload(changeset, changes)
    }

    fn close(&self, changeset: ChangesetId) -> Result<(), RevertError> {
        (**self).close(changeset)
    }
}

/// A remote changeset that has been created and not yet closed.
pub struct OpenChangeset<'a, A: ChangesetApi + ?Sized> {
    api: &'a A,
    id: ChangesetId,
    closed: bool,
}

impl<'a, A: ChangesetApi + ?Sized> OpenChangeset<'a, A> {
    /// Create a changeset carrying `tags`. Nothing needs closing on error.
    pub fn open(api: &'a A, tags: &BTreeMap<String, String>) -> Result<Self, RevertError> {
        let id = api.create(tags)?;
        tracing::debug!(changeset = %id, "opened changeset");
        Ok(Self {
            api,
            id,
            closed: false,
        })
    }

    pub fn id(&self) -> ChangesetId {
        self.id
    }

    pub fn upload(&self, changes: &ReversibleChangeSet) -> Result<(), RevertError> {
        self.api.upload(self.id, changes)
    }

    /// Close the changeset and return its id.
    pub fn close(mut self) -> Result<ChangesetId, RevertError> {
        self.closed = true;
        self.api.close(self.id)?;
        tracing::debug!(changeset = %self.id, "closed changeset");
        Ok(self.id)
    }
}

impl<A: ChangesetApi + ?Sized> Drop for OpenChangeset<'_, A> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.api.close(self.id) {
            tracing::error!(changeset = %self.id, "failed to close abandoned changeset: {e}");
        }
    }
}

/// Create a changeset, upload `changes` to it and close it.
///
/// Once `create` succeeds, `close` is called exactly once whatever happens
/// next. If the upload failed, that error is returned and a close failure is
/// only logged; if the upload succeeded, a close failure is returned.
pub fn run_transaction<A: ChangesetApi + ?Sized>(
    api: &A,
    tags: &BTreeMap<String, String>,
    changes: &ReversibleChangeSet,
) -> Result<ChangesetId, RevertError> {
    let changeset = OpenChangeset::open(api, tags)?;
    let id = changeset.id();
    match changeset.upload(changes) {
        Ok(()) => changeset.close(),
        Err(upload_err) => {
            if let Err(close_err) = changeset.close() {
                tracing::error!(changeset = %id, "close after failed upload also failed: {close_err}");
            }
            Err(upload_err)
        }
    }
}
