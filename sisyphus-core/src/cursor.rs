//! Durable replication cursor.
//!
//! The cursor is the sequence number up to and including which the feed has
//! been handled. On disk it is a single decimal line:
//!
//! ```text
//! ~/.sisyphus/state.txt
//!   5981203
//! ```
//!
//! Writes go to a `.tmp` sibling, are synced to disk and then renamed into
//! place, so a crash or power loss leaves either the old value or the new
//! one, never a torn line.
//! A missing or unparseable file reads as "no cursor".

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{cursor_io_err, CursorError};
use crate::types::SequenceNumber;

/// Persistence for the last fully processed sequence number.
///
/// Single writer; no locking between processes is attempted.
pub trait CursorStore {
    /// Last recorded cursor, or `None` if never written or unreadable.
    fn read(&self) -> Option<SequenceNumber>;

    /// Durably replace the recorded cursor with `n`.
    fn write(&self, n: SequenceNumber) -> Result<(), CursorError>;
}

impl<T: CursorStore + ?Sized> CursorStore for &T {
    fn read(&self) -> Option<SequenceNumber> {
        (**self).read()
    }

    fn write(&self, n: SequenceNumber) -> Result<(), CursorError> {
        (**self).write(n)
    }
}

impl<T: CursorStore + ?Sized> CursorStore for Box<T> {
    fn read(&self) -> Option<SequenceNumber> {
        (**self).read()
    }

    fn write(&self, n: SequenceNumber) -> Result<(), CursorError> {
        (**self).write(n)
    }
}

// ---------------------------------------------------------------------------
// File-backed store
// ---------------------------------------------------------------------------

/// Cursor kept in a one-line text file.
#[derive(Debug, Clone)]
pub struct FileCursorStore {
    path: PathBuf,
}

impl FileCursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl CursorStore for FileCursorStore {
    fn read(&self) -> Option<SequenceNumber> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("cannot read cursor {}: {e}", self.path.display());
                return None;
            }
        };
        let first = contents.lines().next().unwrap_or_default();
        match first.parse::<SequenceNumber>() {
            Ok(n) => Some(n),
            Err(e) => {
                tracing::warn!(
                    "ignoring corrupt cursor {} ({first:?}): {e}",
                    self.path.display()
                );
                None
            }
        }
    }

    fn write(&self, n: SequenceNumber) -> Result<(), CursorError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| cursor_io_err(dir, e))?;
        }
        let tmp = self.tmp_path();
        write_synced(&tmp, format!("{n}\n").as_bytes()).map_err(|e| cursor_io_err(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(cursor_io_err(&self.path, e));
        }
        tracing::debug!("cursor -> {n}");
        Ok(())
    }
}

/// Write `contents` to `path` and flush it to disk before returning.
fn write_synced(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Cursor held in memory. Clones share state.
///
/// Used for dry runs and tests; keeps every written value so callers can
/// inspect the write history.
#[derive(Debug, Clone, Default)]
pub struct MemoryCursorStore {
    writes: Arc<Mutex<Vec<SequenceNumber>>>,
    initial: Option<SequenceNumber>,
}

impl MemoryCursorStore {
    pub fn new(initial: Option<SequenceNumber>) -> Self {
        Self {
            writes: Arc::default(),
            initial,
        }
    }

    /// Every value passed to `write`, in order.
    pub fn writes(&self) -> Vec<SequenceNumber> {
        self.writes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl CursorStore for MemoryCursorStore {
    fn read(&self) -> Option<SequenceNumber> {
        self.writes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .last()
            .copied()
            .or(self.initial)
    }

    fn write(&self, n: SequenceNumber) -> Result<(), CursorError> {
        self.writes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(n);
        Ok(())
    }
}
