//! # sisyphus-osm
//!
//! Everything that talks to the OSM API on behalf of a revert:
//!
//! - [`element`]: nodes, ways and relations at one version
//! - [`xml`]: OSM / osmChange reading and writing
//! - [`api`]: [`OsmApi`], the blocking HTTP client
//! - [`revert`]: [`RevertEngine`] and the history-based implementation
//! - [`transaction`]: [`run_transaction`], create → upload → guaranteed close

pub mod api;
pub mod element;
pub mod error;
pub mod revert;
pub mod transaction;
pub mod xml;

pub use api::OsmApi;
pub use element::{Action, Element, ElementType, Member};
pub use error::{RevertError, RevertErrorKind, XmlError};
pub use revert::{
    changeset_tags, AuthorMap, Diff, DiffSet, ElementSource, HistoryRevertEngine, RevertEngine,
    ReversibleChange, ReversibleChangeSet,
};
pub use transaction::{run_transaction, ChangesetApi, OpenChangeset};
