//! Progress cursors for pull consumption.

use std::collections::HashMap;
use tracing::warn;

/// Per-device bookmark of pull consumption.
///
/// `last_version` never decreases for a given device. `continuation` is
/// non-null only while a pull sequence is mid-page. `last_entry_id` is stored
/// as a signed column; a log id that does not fit is written as `None`
/// together with a cleared continuation, never as an error.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressCursor {
    /// Owning user.
    pub user_id: String,
    /// Consuming device.
    pub device_id: String,
    /// Highest version the device has consumed.
    pub last_version: u64,
    /// Log id of the last consumed entry, when representable.
    pub last_entry_id: Option<i64>,
    /// Mid-sequence continuation token.
    pub continuation: Option<String>,
    /// Last write time, epoch milliseconds.
    pub updated_at: i64,
}

/// Store of one cursor row per `(user, device)` pair.
pub struct CursorStore {
    rows: HashMap<(String, String), ProgressCursor>,
}

impl CursorStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            rows: HashMap::new(),
        }
    }

    /// Returns the cursor for a `(user, device)` pair.
    pub fn get(&self, user_id: &str, device_id: &str) -> Option<&ProgressCursor> {
        self.rows
            .get(&(user_id.to_string(), device_id.to_string()))
    }

    /// Records pull progress for a device.
    ///
    /// `last_version` only ever moves forward. When `entry_id` cannot be
    /// represented in the cursor column, both it and the continuation are
    /// stored null so the pull itself still succeeds.
    pub fn record(
        &mut self,
        user_id: &str,
        device_id: &str,
        last_version: u64,
        entry_id: Option<u64>,
        continuation: Option<String>,
        now: i64,
    ) {
        let (last_entry_id, continuation) = match entry_id {
            Some(id) => match i64::try_from(id) {
                Ok(id) => (Some(id), continuation),
                Err(_) => {
                    warn!(user_id, device_id, entry_id = id, "cursor entry id not representable, storing null");
                    (None, None)
                }
            },
            None => (None, continuation),
        };
        let key = (user_id.to_string(), device_id.to_string());
        let row = self.rows.entry(key).or_insert_with(|| ProgressCursor {
            user_id: user_id.to_string(),
            device_id: device_id.to_string(),
            last_version: 0,
            last_entry_id: None,
            continuation: None,
            updated_at: now,
        });
        row.last_version = row.last_version.max(last_version);
        row.last_entry_id = last_entry_id;
        row.continuation = continuation;
        row.updated_at = now;
    }

    /// Returns the number of cursor rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if no cursors are recorded.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Default for CursorStore {
    fn default() -> Self {
        Self::new()
    }
}
