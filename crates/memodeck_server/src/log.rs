//! Append-only change log.

use memodeck_protocol::{EntityKind, OpKind};
use std::collections::HashMap;

/// One durable record of an accepted mutation.
///
/// `id` is assigned monotonically in insertion order and, together with
/// `version`, forms the pagination cursor. `payload` is the snapshot the
/// client pushed; pulls hydrate from the projection instead, so the snapshot
/// only serves as a fallback and for replay.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeLogEntry {
    /// Monotone log id.
    pub id: u64,
    /// Owning user.
    pub user_id: String,
    /// Entity the operation targets.
    pub entity_id: String,
    /// Kind of that entity.
    pub entity_type: EntityKind,
    /// Logical version the operation established.
    pub version: u64,
    /// Kind of mutation.
    pub op: OpKind,
    /// Client wall clock, epoch milliseconds.
    pub timestamp: i64,
    /// Payload snapshot at accept time; absent for deletes.
    pub payload: Option<serde_json::Value>,
    /// Device that pushed the operation.
    pub device_id: String,
    /// Opaque change description, carried through untouched.
    pub diff: Option<serde_json::Value>,
}

/// Highest accepted version for one entity, with its writer.
#[derive(Debug, Clone)]
pub struct EntityHead {
    /// Highest version recorded.
    pub version: u64,
    /// Device that pushed it.
    pub device_id: String,
}

/// Per-user ordered log of accepted operations.
///
/// `(user, entity, version)` is unique: appending the same logical operation
/// twice is a no-op, not an error, which is what makes client retries safe.
/// Entries are never mutated after insertion.
pub struct ChangeLog {
    entries: Vec<ChangeLogEntry>,
    next_id: u64,
    // (user_id, entity_id) -> highest accepted version + writer.
    heads: HashMap<(String, String), EntityHead>,
    // (user_id, entity_id, version) uniqueness index.
    seen: HashMap<(String, String), Vec<u64>>,
}

impl ChangeLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
            heads: HashMap::new(),
            seen: HashMap::new(),
        }
    }

    /// Returns the highest version and writer recorded for an entity.
    pub fn head(&self, user_id: &str, entity_id: &str) -> Option<&EntityHead> {
        self.heads.get(&(user_id.to_string(), entity_id.to_string()))
    }

    /// Returns true if `(user, entity, version)` is already logged.
    pub fn contains(&self, user_id: &str, entity_id: &str, version: u64) -> bool {
        self.seen
            .get(&(user_id.to_string(), entity_id.to_string()))
            .is_some_and(|versions| versions.contains(&version))
    }

    /// Returns the logged entry for `(user, entity, version)`, if any.
    pub fn find(&self, user_id: &str, entity_id: &str, version: u64) -> Option<&ChangeLogEntry> {
        if !self.contains(user_id, entity_id, version) {
            return None;
        }
        self.entries.iter().find(|e| {
            e.user_id == user_id && e.entity_id == entity_id && e.version == version
        })
    }

    /// Appends an entry unless `(user, entity, version)` already exists.
    ///
    /// Returns the assigned id, or `None` for a duplicate no-op.
    #[allow(clippy::too_many_arguments)]
    pub fn append(
        &mut self,
        user_id: &str,
        device_id: &str,
        entity_id: &str,
        entity_type: EntityKind,
        version: u64,
        op: OpKind,
        timestamp: i64,
        payload: Option<serde_json::Value>,
        diff: Option<serde_json::Value>,
    ) -> Option<u64> {
        if self.contains(user_id, entity_id, version) {
            return None;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(ChangeLogEntry {
            id,
            user_id: user_id.to_string(),
            entity_id: entity_id.to_string(),
            entity_type,
            version,
            op,
            timestamp,
            payload,
            device_id: device_id.to_string(),
            diff,
        });
        let key = (user_id.to_string(), entity_id.to_string());
        self.seen.entry(key.clone()).or_default().push(version);
        let head = self.heads.entry(key).or_insert_with(|| EntityHead {
            version,
            device_id: device_id.to_string(),
        });
        if version >= head.version {
            head.version = version;
            head.device_id = device_id.to_string();
        }
        Some(id)
    }

    /// Returns one page of a user's entries strictly after `(version, id)`,
    /// ordered by that tuple, plus whether more remain.
    ///
    /// To page from a bare version watermark, pass `u64::MAX` as the id: no
    /// entry can sort after `(v, u64::MAX)` without having a greater version.
    pub fn entries_after(
        &self,
        user_id: &str,
        after: (u64, u64),
        limit: usize,
    ) -> (Vec<&ChangeLogEntry>, bool) {
        let mut page: Vec<&ChangeLogEntry> = self
            .entries
            .iter()
            .filter(|e| e.user_id == user_id && (e.version, e.id) > after)
            .collect();
        // Versions are client-assigned, so insertion order is not version
        // order; the tuple sort makes pagination deterministic and gap-free.
        page.sort_by_key(|e| (e.version, e.id));
        let has_more = page.len() > limit;
        page.truncate(limit);
        (page, has_more)
    }

    /// Returns the highest version in a user's log, or 0 when empty.
    pub fn latest_version(&self, user_id: &str) -> u64 {
        self.heads
            .iter()
            .filter(|((user, _), _)| user == user_id)
            .map(|(_, head)| head.version)
            .max()
            .unwrap_or(0)
    }

    /// Returns the number of entries across all users.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ChangeLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn append_deck(log: &mut ChangeLog, user: &str, device: &str, id: &str, version: u64) -> Option<u64> {
        log.append(
            user,
            device,
            id,
            EntityKind::Deck,
            version,
            OpKind::Create,
            0,
            Some(json!({"name": id})),
            None,
        )
    }

    #[test]
    fn duplicate_append_is_noop() {
        let mut log = ChangeLog::new();
        assert_eq!(append_deck(&mut log, "u1", "d1", "deck-1", 1), Some(1));
        assert_eq!(append_deck(&mut log, "u1", "d1", "deck-1", 1), None);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn same_entity_different_version_is_distinct() {
        let mut log = ChangeLog::new();
        append_deck(&mut log, "u1", "d1", "deck-1", 1);
        append_deck(&mut log, "u1", "d2", "deck-1", 2);
        assert_eq!(log.len(), 2);
        let head = log.head("u1", "deck-1").unwrap();
        assert_eq!(head.version, 2);
        assert_eq!(head.device_id, "d2");
    }

    #[test]
    fn uniqueness_is_user_scoped() {
        let mut log = ChangeLog::new();
        append_deck(&mut log, "u1", "d1", "deck-1", 1);
        assert!(append_deck(&mut log, "u2", "d1", "deck-1", 1).is_some());
        assert_eq!(log.latest_version("u1"), 1);
        assert_eq!(log.latest_version("u3"), 0);
    }

    #[test]
    fn find_returns_the_logged_entry() {
        let mut log = ChangeLog::new();
        append_deck(&mut log, "u1", "d1", "deck-1", 3);
        let entry = log.find("u1", "deck-1", 3).unwrap();
        assert_eq!(entry.device_id, "d1");
        assert!(log.find("u1", "deck-1", 4).is_none());
        assert!(log.find("u2", "deck-1", 3).is_none());
    }

    #[test]
    fn pages_order_by_version_then_id() {
        let mut log = ChangeLog::new();
        // Inserted out of version order, as concurrent devices produce.
        append_deck(&mut log, "u1", "d1", "deck-b", 5);
        append_deck(&mut log, "u1", "d1", "deck-a", 2);
        append_deck(&mut log, "u1", "d1", "deck-c", 5);

        let (page, has_more) = log.entries_after("u1", (0, u64::MAX), 10);
        assert!(!has_more);
        let order: Vec<_> = page.iter().map(|e| (e.version, e.id)).collect();
        assert_eq!(order, vec![(2, 2), (5, 1), (5, 3)]);
    }

    #[test]
    fn resume_after_tuple_cursor() {
        let mut log = ChangeLog::new();
        append_deck(&mut log, "u1", "d1", "deck-a", 5); // id 1
        append_deck(&mut log, "u1", "d1", "deck-b", 5); // id 2

        // Resuming after (5, 1) returns the same-version sibling.
        let (page, _) = log.entries_after("u1", (5, 1), 10);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].entity_id, "deck-b");

        // Bare watermark 5 skips both.
        let (page, _) = log.entries_after("u1", (5, u64::MAX), 10);
        assert!(page.is_empty());
    }

    #[test]
    fn has_more_counts_past_limit() {
        let mut log = ChangeLog::new();
        for i in 0..4 {
            append_deck(&mut log, "u1", "d1", &format!("deck-{i}"), i + 1);
        }
        let (page, has_more) = log.entries_after("u1", (0, u64::MAX), 3);
        assert_eq!(page.len(), 3);
        assert!(has_more);
        let (page, has_more) = log.entries_after("u1", (0, u64::MAX), 4);
        assert_eq!(page.len(), 4);
        assert!(!has_more);
    }
}
