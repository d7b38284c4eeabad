//! Authenticated facade over the sync handler.

use crate::auth::Authenticator;
use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::handler::{now_ms, SyncHandler};
use crate::store::SyncStore;
use memodeck_protocol::{PullQuery, PullResponse, PushRequest, PushResponse, SessionInfo};
use std::sync::Arc;

/// The full server surface: authentication plus the three sync endpoints.
///
/// A transport front end maps one HTTP route onto each method and translates
/// [`crate::ServerError`] through its `http_status`.
pub struct SyncService {
    handler: SyncHandler,
    auth: Arc<dyn Authenticator>,
}

impl SyncService {
    /// Creates a service over a fresh store.
    pub fn new(config: ServerConfig, auth: Arc<dyn Authenticator>) -> Self {
        Self::with_store(config, auth, Arc::new(SyncStore::new()))
    }

    /// Creates a service over an existing store.
    pub fn with_store(
        config: ServerConfig,
        auth: Arc<dyn Authenticator>,
        store: Arc<SyncStore>,
    ) -> Self {
        Self {
            handler: SyncHandler::new(config, store),
            auth,
        }
    }

    /// `POST /sync/push`.
    pub fn push(&self, bearer: &str, request: &PushRequest) -> ServerResult<PushResponse> {
        let user_id = self.auth.authenticate(bearer, now_ms())?;
        self.handler.handle_push(&user_id, request)
    }

    /// `GET /sync/pull`.
    pub fn pull(&self, bearer: &str, query: &PullQuery) -> ServerResult<PullResponse> {
        let user_id = self.auth.authenticate(bearer, now_ms())?;
        self.handler.handle_pull(&user_id, query)
    }

    /// `GET /sync/session`.
    pub fn session(&self, bearer: &str) -> ServerResult<SessionInfo> {
        let user_id = self.auth.authenticate(bearer, now_ms())?;
        self.handler.handle_session(&user_id)
    }

    /// Returns the underlying store, for inspection in tests and tooling.
    pub fn store(&self) -> &Arc<SyncStore> {
        self.handler.store()
    }
}
