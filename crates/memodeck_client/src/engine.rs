//! Sync orchestrator.

use crate::apply::apply_page;
use crate::config::SyncConfig;
use crate::error::{ClientError, ClientResult};
use crate::store::LocalStore;
use crate::transport::SyncTransport;
use memodeck_protocol::{PullQuery, PushRequest};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// The current state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No cycle running; the last one, if any, succeeded.
    Idle,
    /// A cycle is running.
    Syncing,
    /// The last cycle failed.
    Error,
}

impl SyncState {
    /// Returns true if a new cycle may start.
    pub fn can_start(&self) -> bool {
        matches!(self, SyncState::Idle | SyncState::Error)
    }
}

/// Statistics accumulated across sync cycles.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Cycles completed successfully.
    pub cycles_completed: u64,
    /// Operations pushed to the server.
    pub operations_pushed: u64,
    /// Operations pulled and applied.
    pub operations_pulled: u64,
    /// Conflict rejections seen.
    pub conflicts_seen: u64,
    /// Retries performed by `sync_with_retry`.
    pub retries: u64,
    /// Message of the last failed cycle, cleared on success.
    pub last_error: Option<String>,
}

/// Result of one successful sync cycle.
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// Operations pushed.
    pub pushed: u64,
    /// Operations pulled and applied.
    pub pulled: u64,
    /// Pull pages consumed.
    pub pages: u32,
    /// Wall-clock duration of the cycle.
    pub duration: Duration,
}

type ReauthCallback = Box<dyn Fn() + Send + Sync>;

/// Drives push and pull cycles against a server through a transport.
///
/// One engine per device. Cycles are single-flight: a `sync` while another
/// is running fails fast with [`ClientError::SyncInFlight`] instead of
/// queueing.
pub struct SyncEngine<T: SyncTransport> {
    config: SyncConfig,
    transport: Arc<T>,
    store: Arc<LocalStore>,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
    in_flight: AtomicBool,
    on_auth_failure: Option<ReauthCallback>,
}

impl<T: SyncTransport> SyncEngine<T> {
    /// Creates an engine over a transport and a local store.
    pub fn new(config: SyncConfig, transport: T, store: Arc<LocalStore>) -> Self {
        Self {
            config,
            transport: Arc::new(transport),
            store,
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
            in_flight: AtomicBool::new(false),
            on_auth_failure: None,
        }
    }

    /// Registers a callback invoked when the server rejects the credential.
    ///
    /// The failing cycle still returns its [`ClientError::Auth`]; the
    /// callback is a hook for kicking off reauthentication out of band.
    pub fn with_reauth_callback(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_auth_failure = Some(Box::new(callback));
        self
    }

    /// Returns the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Returns a snapshot of the statistics.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns the local store this engine syncs.
    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    /// Runs one cycle: session probe, push the outbox, pull to exhaustion.
    ///
    /// On failure the outbox and pull cursor hold whatever progress was
    /// already confirmed, so the next cycle resumes rather than repeats. A
    /// conflict rejection leaves the outbox fully intact.
    pub fn sync(&self) -> ClientResult<SyncReport> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ClientError::SyncInFlight);
        }
        *self.state.write() = SyncState::Syncing;
        let start = Instant::now();
        let result = self.run_cycle();
        self.in_flight.store(false, Ordering::SeqCst);

        match result {
            Ok((pushed, pulled, pages)) => {
                *self.state.write() = SyncState::Idle;
                if pushed > 0 || pulled > 0 {
                    self.store.stamp_synced(now_ms());
                }
                let mut stats = self.stats.write();
                stats.cycles_completed += 1;
                stats.operations_pushed += pushed;
                stats.operations_pulled += pulled;
                stats.last_error = None;
                debug!(pushed, pulled, pages, "sync cycle complete");
                Ok(SyncReport {
                    pushed,
                    pulled,
                    pages,
                    duration: start.elapsed(),
                })
            }
            Err(err) => {
                *self.state.write() = SyncState::Error;
                {
                    let mut stats = self.stats.write();
                    stats.last_error = Some(err.to_string());
                    if let Some(conflicts) = err.conflicts() {
                        stats.conflicts_seen += conflicts.len() as u64;
                    }
                }
                if matches!(err, ClientError::Auth(_)) {
                    warn!("credential rejected, requesting reauthentication");
                    if let Some(callback) = &self.on_auth_failure {
                        callback();
                    }
                }
                Err(err)
            }
        }
    }

    /// Runs `sync`, retrying transient failures with exponential backoff.
    ///
    /// Conflicts and auth failures are returned immediately; only errors
    /// whose `is_retryable` is true are retried.
    pub fn sync_with_retry(&self) -> ClientResult<SyncReport> {
        let retry = self.config.retry.clone();
        let mut last_error = None;
        for attempt in 0..retry.max_attempts {
            if attempt > 0 {
                std::thread::sleep(retry.delay_for_attempt(attempt));
                self.stats.write().retries += 1;
            }
            match self.sync() {
                Ok(report) => return Ok(report),
                Err(err) if err.is_retryable() && attempt + 1 < retry.max_attempts => {
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_error
            .unwrap_or_else(|| ClientError::transport_fatal("no sync attempts configured")))
    }

    fn run_cycle(&self) -> ClientResult<(u64, u64, u32)> {
        let session = self.transport.session()?;
        let pushed = self.push_phase(session.latest_version)?;
        let (pulled, pages) = self.pull_phase()?;
        Ok((pushed, pulled, pages))
    }

    /// Drains the outbox in batches, assigning optimistic versions above
    /// everything this device has seen from the server.
    fn push_phase(&self, latest_server_version: u64) -> ClientResult<u64> {
        let mut total = 0u64;
        let mut base = latest_server_version.max(self.store.meta().last_pulled_version);
        loop {
            let batch = self
                .store
                .inner
                .read()
                .outbox
                .peek_batch(self.config.push_batch_size);
            if batch.is_empty() {
                break;
            }
            let count = batch.len();
            let ops = batch
                .into_iter()
                .enumerate()
                .map(|(i, op)| op.into_sync_op(base + 1 + i as u64))
                .collect();
            let request = PushRequest::new(self.config.device_id.clone(), ops);
            let response = self.transport.push(&request)?;
            // Only now is the batch durable on the server.
            self.store.inner.write().outbox.confirm(count);
            base = base.max(response.current_version);
            self.store.record_push_progress(response.current_version);
            total += count as u64;
            debug!(count, current_version = response.current_version, "push batch accepted");
        }
        Ok(total)
    }

    /// Pulls pages until the server is drained or the page bound is hit.
    fn pull_phase(&self) -> ClientResult<(u64, u32)> {
        let mut pulled = 0u64;
        let mut pages = 0u32;
        // Resume a mid-sequence token left by an interrupted cycle.
        let mut token = self.store.meta().continuation;
        loop {
            let mut query = PullQuery::since(
                self.config.device_id.clone(),
                self.store.meta().last_pulled_version,
            )
            .with_limit(self.config.pull_limit);
            if let Some(token) = token.take() {
                query = query.with_token(token);
            }

            let response = self.transport.pull(&query)?;
            pulled += apply_page(&self.store, &response.ops);
            pages += 1;
            self.store
                .record_pull_progress(response.new_version, response.continuation_token.clone());

            if !response.has_more {
                break;
            }
            if pages >= self.config.max_pull_pages {
                // Progress is persisted; the next cycle picks up the token.
                warn!(pages, "pull page bound reached with more remaining");
                return Err(ClientError::PageLimitExceeded { pages });
            }
            token = response.continuation_token;
        }
        Ok((pulled, pages))
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::outbox::PendingOp;
    use crate::transport::MockTransport;
    use memodeck_protocol::{
        ConflictRejection, ConflictReport, EntityKind, OpKind, PullResponse, PushResponse,
        SessionInfo, SyncOp,
    };
    use serde_json::json;

    fn engine_with(transport: MockTransport) -> SyncEngine<MockTransport> {
        SyncEngine::new(
            SyncConfig::new("device-1").with_retry(RetryConfig::no_retry()),
            transport,
            Arc::new(LocalStore::new()),
        )
    }

    fn stage_deck(engine: &SyncEngine<MockTransport>, id: &str) {
        engine
            .store()
            .stage(PendingOp {
                entity_id: id.into(),
                entity_type: EntityKind::Deck,
                op: OpKind::Create,
                timestamp: 0,
                payload: Some(json!({"name": id})),
                diff: None,
            })
            .unwrap();
    }

    fn session(latest_version: u64) -> SessionInfo {
        SessionInfo {
            user_id: "u1".into(),
            latest_version,
            default_pull_limit: 100,
            server_timestamp: 0,
        }
    }

    fn page(ops: Vec<SyncOp>, new_version: u64, token: Option<&str>) -> PullResponse {
        PullResponse {
            ops,
            new_version,
            has_more: token.is_some(),
            continuation_token: token.map(String::from),
        }
    }

    #[test]
    fn empty_cycle_succeeds() {
        let engine = engine_with(MockTransport::new());
        let report = engine.sync().unwrap();
        assert_eq!(report.pushed, 0);
        assert_eq!(report.pulled, 0);
        assert_eq!(engine.state(), SyncState::Idle);
        assert_eq!(engine.stats().cycles_completed, 1);
        // No progress, so the sync stamp is untouched.
        assert!(engine.store().meta().last_synced_at.is_none());
    }

    #[test]
    fn push_assigns_versions_above_server_state() {
        let transport = MockTransport::new();
        transport.set_session(session(5));
        transport.queue_push(Ok(PushResponse::accepted(7)));
        let engine = engine_with(transport);
        stage_deck(&engine, "deck-1");
        stage_deck(&engine, "deck-2");

        let report = engine.sync().unwrap();
        assert_eq!(report.pushed, 2);
        assert_eq!(engine.store().pending_count(), 0);

        let pushes = engine.transport.pushes_seen();
        assert_eq!(pushes.len(), 1);
        assert_eq!(pushes[0].device_id, "device-1");
        let versions: Vec<_> = pushes[0].ops.iter().map(|op| op.version).collect();
        assert_eq!(versions, vec![Some(6), Some(7)]);

        // The confirmed push advanced the pull watermark past its own ops.
        assert_eq!(engine.store().meta().last_pulled_version, 7);
        assert!(engine.store().meta().last_synced_at.is_some());
    }

    #[test]
    fn conflict_leaves_outbox_untouched() {
        let transport = MockTransport::new();
        transport.queue_push(Err(ClientError::Conflict(ConflictRejection::new(vec![
            ConflictReport::new("deck-1", EntityKind::Deck, 1, 2, "other"),
        ]))));
        let engine = engine_with(transport);
        stage_deck(&engine, "deck-1");

        let err = engine.sync().unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(engine.store().pending_count(), 1);
        assert_eq!(engine.state(), SyncState::Error);
        assert_eq!(engine.stats().conflicts_seen, 1);
        assert!(engine.stats().last_error.is_some());
    }

    #[test]
    fn pull_loops_until_exhausted() {
        let transport = MockTransport::new();
        transport.queue_pull(Ok(page(
            vec![SyncOp::create(EntityKind::Deck, "a", 1, 0, json!({"name": "a"}))],
            1,
            Some("1:1"),
        )));
        transport.queue_pull(Ok(page(
            vec![SyncOp::create(EntityKind::Deck, "b", 2, 0, json!({"name": "b"}))],
            2,
            None,
        )));
        let engine = engine_with(transport);

        let report = engine.sync().unwrap();
        assert_eq!(report.pulled, 2);
        assert_eq!(report.pages, 2);
        assert_eq!(engine.store().meta().last_pulled_version, 2);
        assert_eq!(engine.store().meta().continuation, None);

        // Second page resumed via the token, not the watermark.
        let pulls = engine.transport.pulls_seen();
        assert_eq!(pulls[1].continuation_token.as_deref(), Some("1:1"));
    }

    #[test]
    fn pull_loop_is_bounded() {
        let transport = MockTransport::new();
        for i in 0..3u64 {
            transport.queue_pull(Ok(page(
                vec![SyncOp::create(
                    EntityKind::Deck,
                    format!("deck-{i}"),
                    i + 1,
                    0,
                    json!({"name": "d"}),
                )],
                i + 1,
                Some("next"),
            )));
        }
        let engine = SyncEngine::new(
            SyncConfig::new("device-1").with_max_pull_pages(2),
            transport,
            Arc::new(LocalStore::new()),
        );

        let err = engine.sync().unwrap_err();
        assert!(matches!(err, ClientError::PageLimitExceeded { pages: 2 }));
        // Progress up to the bound is kept for the next cycle.
        assert_eq!(engine.store().meta().last_pulled_version, 2);
        assert_eq!(engine.store().meta().continuation.as_deref(), Some("next"));
    }

    #[test]
    fn auth_failure_fires_reauth_callback() {
        let transport = MockTransport::new();
        transport.queue_session_error(ClientError::Auth("token expired".into()));
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let engine = SyncEngine::new(
            SyncConfig::new("device-1"),
            transport,
            Arc::new(LocalStore::new()),
        )
        .with_reauth_callback(move || flag.store(true, Ordering::SeqCst));
        stage_deck(&engine, "deck-1");

        let err = engine.sync().unwrap_err();
        assert!(matches!(err, ClientError::Auth(_)));
        assert!(fired.load(Ordering::SeqCst));
        // Aborted before push; the outbox and cursor are uncorrupted.
        assert_eq!(engine.store().pending_count(), 1);
        assert_eq!(engine.store().meta().last_pulled_version, 0);
    }

    #[test]
    fn retry_retries_transient_failures_only() {
        let transport = MockTransport::new();
        transport.queue_push(Err(ClientError::Server("hiccup".into())));
        transport.queue_push(Ok(PushResponse::accepted(1)));
        let engine = SyncEngine::new(
            SyncConfig::new("device-1")
                .with_retry(RetryConfig::new(3).with_initial_delay(Duration::ZERO)),
            transport,
            Arc::new(LocalStore::new()),
        );
        stage_deck(&engine, "deck-1");

        let report = engine.sync_with_retry().unwrap();
        assert_eq!(report.pushed, 1);
        assert_eq!(engine.stats().retries, 1);
        assert_eq!(engine.store().pending_count(), 0);
    }

    #[test]
    fn retry_gives_up_on_conflicts() {
        let transport = MockTransport::new();
        transport.queue_push(Err(ClientError::Conflict(ConflictRejection::new(vec![]))));
        let engine = SyncEngine::new(
            SyncConfig::new("device-1")
                .with_retry(RetryConfig::new(3).with_initial_delay(Duration::ZERO)),
            transport,
            Arc::new(LocalStore::new()),
        );
        stage_deck(&engine, "deck-1");

        let err = engine.sync_with_retry().unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(engine.stats().retries, 0);
    }

    #[test]
    fn state_transitions() {
        assert!(SyncState::Idle.can_start());
        assert!(SyncState::Error.can_start());
        assert!(!SyncState::Syncing.can_start());
    }
}
