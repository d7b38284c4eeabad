//! Shared in-memory sync state.

use crate::cursor::CursorStore;
use crate::log::ChangeLog;
use crate::projection::ProjectionStore;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Everything a sync user's state consists of, guarded as one unit.
///
/// Holding the write guard across an entire push batch is what makes the
/// batch atomic: validation and commit happen with no interleaved writer.
pub struct StoreInner {
    /// Append-only change log.
    pub log: ChangeLog,
    /// Per-device pull cursors.
    pub cursors: CursorStore,
    /// Current-state entity tables.
    pub projections: ProjectionStore,
}

/// Thread-safe store shared by all request handlers.
pub struct SyncStore {
    inner: RwLock<StoreInner>,
}

impl SyncStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                log: ChangeLog::new(),
                cursors: CursorStore::new(),
                projections: ProjectionStore::new(),
            }),
        }
    }

    /// Acquires shared read access.
    pub fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read()
    }

    /// Acquires exclusive write access.
    pub fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write()
    }
}

impl Default for SyncStore {
    fn default() -> Self {
        Self::new()
    }
}
