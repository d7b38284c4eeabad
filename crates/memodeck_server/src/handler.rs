//! Push, pull, and session request handling.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::store::SyncStore;
use memodeck_protocol::{
    ConflictReport, ContinuationToken, EntityPayload, OpKind, PullQuery, PullResponse,
    PushRequest, PushResponse, SessionInfo, SyncOp,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// One validated, ready-to-commit operation of a push batch.
struct PlannedOp {
    index: usize,
    version: u64,
    payload: Option<EntityPayload>,
    /// `(user, entity, version)` already logged; apply mutator, skip append.
    replay: bool,
}

/// Executes sync requests against an injected store.
pub struct SyncHandler {
    config: ServerConfig,
    store: Arc<SyncStore>,
}

impl SyncHandler {
    /// Creates a handler over a shared store.
    pub fn new(config: ServerConfig, store: Arc<SyncStore>) -> Self {
        Self { config, store }
    }

    /// Returns the store this handler operates on.
    pub fn store(&self) -> &Arc<SyncStore> {
        &self.store
    }

    /// Handles a push batch for an authenticated user.
    ///
    /// The batch is atomic. Validation and conflict detection run to
    /// completion before the first write; any rejection leaves the log,
    /// projections, and cursors untouched. A conflict rejection reports
    /// every losing operation of the batch, not just the first.
    pub fn handle_push(&self, user_id: &str, request: &PushRequest) -> ServerResult<PushResponse> {
        if request.device_id.is_empty() {
            return Err(ServerError::Validation("deviceId must not be empty".into()));
        }
        if request.ops.len() > self.config.max_push_batch {
            return Err(ServerError::Validation(format!(
                "push batch of {} exceeds the maximum of {}",
                request.ops.len(),
                self.config.max_push_batch
            )));
        }

        let now = now_ms();
        let mut state = self.store.write();

        if request.ops.is_empty() {
            return Ok(PushResponse::accepted(state.log.latest_version(user_id)));
        }

        // Phase 1: plan the whole batch without touching state.
        let mut planned: Vec<PlannedOp> = Vec::with_capacity(request.ops.len());
        let mut conflicts: Vec<ConflictReport> = Vec::new();
        // Versions accepted earlier in this same batch count as current state
        // for the operations after them.
        let mut batch_heads: HashMap<&str, (u64, &str)> = HashMap::new();

        for (index, op) in request.ops.iter().enumerate() {
            if op.entity_id.is_empty() {
                return Err(ServerError::Validation(format!(
                    "operation {index} has an empty entityId"
                )));
            }
            let version = op.version_or(now as u64);

            // Duplicate tolerance covers verbatim replays only. The same
            // version from another device, or with another payload, is a
            // collision and falls through to the conflict check below.
            let is_replay = state.log.find(user_id, &op.entity_id, version).is_some_and(|e| {
                e.device_id == request.device_id && e.op == op.op && e.payload == op.payload
            });
            if is_replay {
                // Re-running the mutator is idempotent; re-appending would
                // duplicate the log.
                let payload = op.typed_payload().map_err(validation)?;
                planned.push(PlannedOp {
                    index,
                    version,
                    payload,
                    replay: true,
                });
                continue;
            }

            let head = batch_heads
                .get(op.entity_id.as_str())
                .map(|&(v, d)| (v, d.to_string()))
                .or_else(|| {
                    state
                        .log
                        .head(user_id, &op.entity_id)
                        .map(|h| (h.version, h.device_id.clone()))
                });
            if let Some((current, writer)) = head {
                if version <= current {
                    conflicts.push(ConflictReport::new(
                        op.entity_id.clone(),
                        op.entity_type,
                        version,
                        current,
                        writer,
                    ));
                    continue;
                }
            }

            let payload = op.typed_payload().map_err(validation)?;
            batch_heads.insert(op.entity_id.as_str(), (version, request.device_id.as_str()));
            planned.push(PlannedOp {
                index,
                version,
                payload,
                replay: false,
            });
        }

        if !conflicts.is_empty() {
            info!(
                user_id,
                device_id = %request.device_id,
                rejected = conflicts.len(),
                batch = request.ops.len(),
                "push rejected on version conflict"
            );
            return Err(ServerError::Conflict(conflicts));
        }

        // Phase 2: commit. Nothing below can fail.
        for plan in &planned {
            let op = &request.ops[plan.index];
            if !plan.replay {
                state.log.append(
                    user_id,
                    &request.device_id,
                    &op.entity_id,
                    op.entity_type,
                    plan.version,
                    op.op,
                    op.timestamp,
                    op.payload.clone(),
                    op.diff.clone(),
                );
            }
            apply_to_projection(&mut state.projections, user_id, op, plan.payload.as_ref());
        }

        let current_version = state.log.latest_version(user_id);
        debug!(
            user_id,
            device_id = %request.device_id,
            ops = planned.len(),
            current_version,
            "push accepted"
        );
        Ok(PushResponse::accepted(current_version))
    }

    /// Handles a paginated pull for an authenticated user.
    ///
    /// A continuation token takes precedence over `sinceVersion`; a bare
    /// watermark resumes strictly after every entry at that version. Payloads
    /// are hydrated from current entity state, falling back to the logged
    /// snapshot when the entity no longer exists.
    pub fn handle_pull(&self, user_id: &str, query: &PullQuery) -> ServerResult<PullResponse> {
        if query.device_id.is_empty() {
            return Err(ServerError::Validation("deviceId must not be empty".into()));
        }
        let after = match &query.continuation_token {
            Some(raw) => {
                let token = ContinuationToken::decode(raw)
                    .map_err(|e| ServerError::Validation(e.to_string()))?;
                (token.version, token.entry_id)
            }
            None => (query.since_version.unwrap_or(0), u64::MAX),
        };
        let limit = query
            .limit
            .unwrap_or(self.config.default_pull_limit)
            .clamp(1, self.config.max_pull_limit) as usize;

        let now = now_ms();
        let mut state = self.store.write();
        let (page, has_more) = state.log.entries_after(user_id, after, limit);

        let mut ops = Vec::with_capacity(page.len());
        let mut new_version = after.0;
        let mut last: Option<(u64, u64)> = None;
        for entry in page {
            let payload = if entry.op.carries_payload() {
                match state
                    .projections
                    .hydrate(user_id, &entry.entity_id, entry.entity_type)
                {
                    Some(current) => Some(current.to_value().map_err(validation)?),
                    // Entity gone since this entry was logged; the snapshot
                    // keeps replay order intact for the client.
                    None => entry.payload.clone(),
                }
            } else {
                None
            };
            ops.push(SyncOp {
                entity_id: entry.entity_id.clone(),
                entity_type: entry.entity_type,
                version: Some(entry.version),
                op: entry.op,
                timestamp: entry.timestamp,
                payload,
                diff: entry.diff.clone(),
            });
            new_version = new_version.max(entry.version);
            last = Some((entry.version, entry.id));
        }

        let continuation_token = if has_more {
            last.map(|(version, entry_id)| ContinuationToken { version, entry_id }.encode())
        } else {
            None
        };

        state.cursors.record(
            user_id,
            &query.device_id,
            new_version,
            last.map(|(_, id)| id),
            continuation_token.clone(),
            now,
        );
        debug!(
            user_id,
            device_id = %query.device_id,
            ops = ops.len(),
            new_version,
            has_more,
            "pull served"
        );
        Ok(PullResponse {
            ops,
            new_version,
            has_more,
            continuation_token,
        })
    }

    /// Handles a session probe, seeding a device's first pull.
    pub fn handle_session(&self, user_id: &str) -> ServerResult<SessionInfo> {
        let state = self.store.read();
        Ok(SessionInfo {
            user_id: user_id.to_string(),
            latest_version: state.log.latest_version(user_id),
            default_pull_limit: self.config.default_pull_limit,
            server_timestamp: now_ms(),
        })
    }
}

fn apply_to_projection(
    projections: &mut crate::projection::ProjectionStore,
    user_id: &str,
    op: &SyncOp,
    payload: Option<&EntityPayload>,
) {
    match (op.op, payload) {
        (OpKind::Create, Some(payload)) => {
            projections.create(user_id, &op.entity_id, payload, op.timestamp);
        }
        (OpKind::Update, Some(payload)) => {
            projections.update(user_id, &op.entity_id, payload, op.timestamp);
        }
        (OpKind::Delete, _) => {
            projections.delete(user_id, &op.entity_id, op.entity_type);
        }
        // Unreachable after validation; create/update always plan a payload.
        (_, None) => {}
    }
}

fn validation(err: memodeck_protocol::ProtocolError) -> ServerError {
    ServerError::Validation(err.to_string())
}

pub(crate) fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
