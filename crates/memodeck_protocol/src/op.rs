//! Sync operation records.

use crate::error::{ProtocolError, ProtocolResult};
use crate::payload::EntityPayload;
use serde::{Deserialize, Serialize};

/// Kind of entity an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A deck of cards.
    Deck,
    /// A note holding the authored front/back content.
    Note,
    /// A reviewable card generated from a note.
    Card,
    /// One spaced-repetition review event.
    ReviewLog,
}

impl EntityKind {
    /// Returns the wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Deck => "deck",
            EntityKind::Note => "note",
            EntityKind::Card => "card",
            EntityKind::ReviewLog => "review_log",
        }
    }

    /// Parses a wire name.
    pub fn parse(s: &str) -> ProtocolResult<Self> {
        match s {
            "deck" => Ok(EntityKind::Deck),
            "note" => Ok(EntityKind::Note),
            "card" => Ok(EntityKind::Card),
            "review_log" => Ok(EntityKind::ReviewLog),
            other => Err(ProtocolError::UnknownEntityKind(other.into())),
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of mutation an operation performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    /// Entity was created.
    Create,
    /// Entity was updated.
    Update,
    /// Entity was deleted.
    Delete,
}

impl OpKind {
    /// Returns true for create/update, the kinds that carry a payload.
    pub fn carries_payload(&self) -> bool {
        !matches!(self, OpKind::Delete)
    }
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            OpKind::Create => "create",
            OpKind::Update => "update",
            OpKind::Delete => "delete",
        })
    }
}

/// A single replicated operation.
///
/// This is the wire record exchanged on both push and pull. `version` is the
/// entity's logical version: clients assign it optimistically from their last
/// known server state, and the server rejects any push whose version does not
/// exceed the version it already recorded for that entity. A missing version
/// is a fallback path only; the server defaults it to its current clock.
///
/// `payload` is required for create/update and absent for delete. It travels
/// as a raw JSON object and is only interpreted through
/// [`EntityPayload::from_value`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOp {
    /// Entity identifier, unique within the owning user's data.
    pub entity_id: String,
    /// Kind of entity.
    pub entity_type: EntityKind,
    /// Logical version; absent only on degraded clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    /// Kind of mutation.
    pub op: OpKind,
    /// Client wall clock at mutation time, epoch milliseconds.
    pub timestamp: i64,
    /// Entity payload for create/update; never present for delete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    /// Opaque change description carried through the log untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<serde_json::Value>,
}

impl SyncOp {
    /// Creates a create operation.
    pub fn create(
        entity_type: EntityKind,
        entity_id: impl Into<String>,
        version: u64,
        timestamp: i64,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            entity_type,
            version: Some(version),
            op: OpKind::Create,
            timestamp,
            payload: Some(payload),
            diff: None,
        }
    }

    /// Creates an update operation.
    pub fn update(
        entity_type: EntityKind,
        entity_id: impl Into<String>,
        version: u64,
        timestamp: i64,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            entity_type,
            version: Some(version),
            op: OpKind::Update,
            timestamp,
            payload: Some(payload),
            diff: None,
        }
    }

    /// Creates a delete operation.
    pub fn delete(
        entity_type: EntityKind,
        entity_id: impl Into<String>,
        version: u64,
        timestamp: i64,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            entity_type,
            version: Some(version),
            op: OpKind::Delete,
            timestamp,
            payload: None,
            diff: None,
        }
    }

    /// Returns the declared version, or `fallback` when absent.
    pub fn version_or(&self, fallback: u64) -> u64 {
        self.version.unwrap_or(fallback)
    }

    /// Decodes the payload through the typed dispatch point.
    ///
    /// Fails when a create/update carries no payload or the object does not
    /// match the schema for `entity_type`. Delete operations yield `None`.
    pub fn typed_payload(&self) -> ProtocolResult<Option<EntityPayload>> {
        if !self.op.carries_payload() {
            return Ok(None);
        }
        let value = self.payload.as_ref().ok_or_else(|| ProtocolError::MissingPayload {
            op: self.op,
            entity_type: self.entity_type,
            entity_id: self.entity_id.clone(),
        })?;
        EntityPayload::from_value(self.entity_type, value).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entity_kind_wire_names() {
        assert_eq!(EntityKind::ReviewLog.as_str(), "review_log");
        assert_eq!(EntityKind::parse("deck").unwrap(), EntityKind::Deck);
        assert!(EntityKind::parse("folder").is_err());
    }

    #[test]
    fn op_serializes_camel_case() {
        let op = SyncOp::create(
            EntityKind::Deck,
            "deck-1",
            1,
            1_700_000_000_000,
            json!({"name": "Deck"}),
        );
        let value = serde_json::to_value(&op).unwrap();
        assert_eq!(value["entityId"], "deck-1");
        assert_eq!(value["entityType"], "deck");
        assert_eq!(value["version"], 1);
        assert_eq!(value["op"], "create");
        assert!(value.get("diff").is_none());
    }

    #[test]
    fn op_decodes_without_version() {
        let op: SyncOp = serde_json::from_value(json!({
            "entityId": "card-9",
            "entityType": "card",
            "op": "delete",
            "timestamp": 1_700_000_000_000i64
        }))
        .unwrap();
        assert_eq!(op.version, None);
        assert_eq!(op.version_or(42), 42);
    }

    #[test]
    fn delete_carries_no_payload() {
        let op = SyncOp::delete(EntityKind::Note, "note-1", 3, 0);
        assert!(op.payload.is_none());
        assert_eq!(op.typed_payload().unwrap(), None);
    }

    #[test]
    fn create_without_payload_is_rejected() {
        let mut op = SyncOp::create(EntityKind::Deck, "deck-1", 1, 0, json!({"name": "x"}));
        op.payload = None;
        assert!(matches!(
            op.typed_payload(),
            Err(ProtocolError::MissingPayload { .. })
        ));
    }
}
