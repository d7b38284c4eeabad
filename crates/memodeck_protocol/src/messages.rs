//! Request and response messages for the sync endpoints.

use crate::op::{EntityKind, SyncOp};
use serde::{Deserialize, Serialize};

/// Page size used when a pull does not specify a limit.
pub const DEFAULT_PULL_LIMIT: u32 = 100;

/// Guidance sent with every conflict rejection.
pub const RETRY_HINT: &str =
    "pull the latest changes, merge locally, and resubmit with incremented versions";

/// Body of `POST /sync/push`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRequest {
    /// Identity of the pushing device, used for conflict attribution.
    pub device_id: String,
    /// Operations in the order the device performed them.
    pub ops: Vec<SyncOp>,
}

impl PushRequest {
    /// Creates a new push request.
    pub fn new(device_id: impl Into<String>, ops: Vec<SyncOp>) -> Self {
        Self {
            device_id: device_id.into(),
            ops,
        }
    }
}

/// Successful response to a push.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResponse {
    /// Human-readable status line.
    pub message: String,
    /// Highest version the batch established for this user.
    pub current_version: u64,
}

impl PushResponse {
    /// Creates a success response.
    pub fn accepted(current_version: u64) -> Self {
        Self {
            message: "sync complete".into(),
            current_version,
        }
    }
}

/// One rejected operation inside a conflict rejection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictReport {
    /// Entity the push lost on.
    pub entity_id: String,
    /// Kind of that entity.
    pub entity_type: EntityKind,
    /// Version the client declared.
    pub incoming_version: u64,
    /// Version the server already holds.
    pub current_version: u64,
    /// Device that wrote the server-held version.
    pub last_synced_device_id: String,
    /// What the client should do next.
    pub retry_hint: String,
}

impl ConflictReport {
    /// Creates a report with the standard retry hint.
    pub fn new(
        entity_id: impl Into<String>,
        entity_type: EntityKind,
        incoming_version: u64,
        current_version: u64,
        last_synced_device_id: impl Into<String>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            entity_type,
            incoming_version,
            current_version,
            last_synced_device_id: last_synced_device_id.into(),
            retry_hint: RETRY_HINT.into(),
        }
    }
}

/// Body of a `409 Conflict` push rejection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRejection {
    /// Short machine-readable error tag.
    pub error: String,
    /// Human-readable recovery guidance.
    pub guidance: String,
    /// Every losing operation in the batch.
    pub conflicts: Vec<ConflictReport>,
}

impl ConflictRejection {
    /// Wraps the losing operations of a rejected batch.
    pub fn new(conflicts: Vec<ConflictReport>) -> Self {
        Self {
            error: "version_conflict".into(),
            guidance: RETRY_HINT.into(),
            conflicts,
        }
    }
}

/// Query parameters of `GET /sync/pull`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullQuery {
    /// Pull entries with version strictly greater than this; defaults to 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since_version: Option<u64>,
    /// Identity of the pulling device, used for cursor bookkeeping.
    pub device_id: String,
    /// Maximum entries per page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Mid-sequence cursor from a prior page; takes precedence over
    /// `since_version` when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation_token: Option<String>,
}

impl PullQuery {
    /// Creates a query starting from a version watermark.
    pub fn since(device_id: impl Into<String>, since_version: u64) -> Self {
        Self {
            since_version: Some(since_version),
            device_id: device_id.into(),
            limit: None,
            continuation_token: None,
        }
    }

    /// Sets the page limit.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the continuation token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.continuation_token = Some(token.into());
        self
    }
}

/// Response to a pull.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullResponse {
    /// One page of operations in `(version, id)` order.
    pub ops: Vec<SyncOp>,
    /// Highest version in the page, or the requested watermark if empty.
    pub new_version: u64,
    /// Whether entries remain beyond this page.
    pub has_more: bool,
    /// Cursor for the next page; `None` once exhausted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation_token: Option<String>,
}

/// Response to `GET /sync/session`, used to seed client cursors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    /// Authenticated user.
    pub user_id: String,
    /// Highest version in the user's change log.
    pub latest_version: u64,
    /// Server's default pull page size.
    pub default_pull_limit: u32,
    /// Server clock, epoch milliseconds.
    pub server_timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn push_request_wire_shape() {
        let req: PushRequest = serde_json::from_value(json!({
            "deviceId": "d1",
            "ops": [{
                "entityId": "deck-1",
                "entityType": "deck",
                "version": 1,
                "op": "create",
                "timestamp": 0,
                "payload": {"name": "Deck"}
            }]
        }))
        .unwrap();
        assert_eq!(req.device_id, "d1");
        assert_eq!(req.ops.len(), 1);
    }

    #[test]
    fn conflict_rejection_wire_shape() {
        let rejection = ConflictRejection::new(vec![ConflictReport::new(
            "deck-1",
            EntityKind::Deck,
            1,
            1,
            "d1",
        )]);
        let value = serde_json::to_value(&rejection).unwrap();
        assert_eq!(value["error"], "version_conflict");
        assert_eq!(value["conflicts"][0]["entityId"], "deck-1");
        assert_eq!(value["conflicts"][0]["lastSyncedDeviceId"], "d1");
        assert_eq!(value["conflicts"][0]["incomingVersion"], 1);
    }

    #[test]
    fn pull_query_builder() {
        let query = PullQuery::since("d2", 7).with_limit(5).with_token("7:12");
        assert_eq!(query.since_version, Some(7));
        assert_eq!(query.limit, Some(5));
        assert_eq!(query.continuation_token.as_deref(), Some("7:12"));
    }

    #[test]
    fn pull_response_omits_exhausted_token() {
        let resp = PullResponse {
            ops: vec![],
            new_version: 3,
            has_more: false,
            continuation_token: None,
        };
        let value = serde_json::to_value(&resp).unwrap();
        assert!(value.get("continuationToken").is_none());
        assert_eq!(value["hasMore"], false);
    }
}
