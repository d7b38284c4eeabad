//! Transport abstraction between the engine and a sync server.

use crate::error::{ClientError, ClientResult};
use memodeck_protocol::{PullQuery, PullResponse, PushRequest, PushResponse, SessionInfo};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Network seam for the sync engine.
///
/// An HTTP implementation maps the three methods onto the server routes and
/// translates status codes: 401 → [`ClientError::Auth`], 409 →
/// [`ClientError::Conflict`] with the decoded rejection body, 4xx →
/// [`ClientError::Rejected`], 5xx → [`ClientError::Server`].
pub trait SyncTransport: Send + Sync {
    /// Probes the session, seeding version watermarks.
    fn session(&self) -> ClientResult<SessionInfo>;

    /// Pushes a batch of local operations.
    fn push(&self, request: &PushRequest) -> ClientResult<PushResponse>;

    /// Pulls one page of remote operations.
    fn pull(&self, query: &PullQuery) -> ClientResult<PullResponse>;
}

/// Scripted transport for engine unit tests.
///
/// Push and pull results are consumed front-to-back; with nothing scripted,
/// session and pull answer as an empty server would.
#[derive(Default)]
pub struct MockTransport {
    session_response: Mutex<Option<SessionInfo>>,
    session_errors: Mutex<VecDeque<ClientError>>,
    push_results: Mutex<VecDeque<ClientResult<PushResponse>>>,
    pull_results: Mutex<VecDeque<ClientResult<PullResponse>>>,
    pushes_seen: Mutex<Vec<PushRequest>>,
    pulls_seen: Mutex<Vec<PullQuery>>,
}

impl MockTransport {
    /// Creates a mock with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the session response.
    pub fn set_session(&self, info: SessionInfo) {
        *self.session_response.lock() = Some(info);
    }

    /// Queues a session failure, served before any scripted session info.
    pub fn queue_session_error(&self, error: ClientError) {
        self.session_errors.lock().push_back(error);
    }

    /// Queues a push result.
    pub fn queue_push(&self, result: ClientResult<PushResponse>) {
        self.push_results.lock().push_back(result);
    }

    /// Queues a pull result.
    pub fn queue_pull(&self, result: ClientResult<PullResponse>) {
        self.pull_results.lock().push_back(result);
    }

    /// Returns every push request seen so far.
    pub fn pushes_seen(&self) -> Vec<PushRequest> {
        self.pushes_seen.lock().clone()
    }

    /// Returns every pull query seen so far.
    pub fn pulls_seen(&self) -> Vec<PullQuery> {
        self.pulls_seen.lock().clone()
    }
}

impl SyncTransport for MockTransport {
    fn session(&self) -> ClientResult<SessionInfo> {
        if let Some(error) = self.session_errors.lock().pop_front() {
            return Err(error);
        }
        Ok(self.session_response.lock().clone().unwrap_or(SessionInfo {
            user_id: "mock-user".into(),
            latest_version: 0,
            default_pull_limit: 100,
            server_timestamp: 0,
        }))
    }

    fn push(&self, request: &PushRequest) -> ClientResult<PushResponse> {
        self.pushes_seen.lock().push(request.clone());
        self.push_results.lock().pop_front().unwrap_or_else(|| {
            Err(ClientError::transport_fatal("no scripted push response"))
        })
    }

    fn pull(&self, query: &PullQuery) -> ClientResult<PullResponse> {
        self.pulls_seen.lock().push(query.clone());
        self.pull_results.lock().pop_front().unwrap_or_else(|| {
            Ok(PullResponse {
                ops: vec![],
                new_version: query.since_version.unwrap_or(0),
                has_more: false,
                continuation_token: None,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_serves_scripted_results_in_order() {
        let transport = MockTransport::new();
        transport.queue_push(Ok(PushResponse::accepted(1)));
        transport.queue_push(Err(ClientError::Server("down".into())));

        let req = PushRequest::new("d1", vec![]);
        assert!(transport.push(&req).is_ok());
        assert!(transport.push(&req).is_err());
        assert_eq!(transport.pushes_seen().len(), 2);
    }

    #[test]
    fn unscripted_pull_answers_empty() {
        let transport = MockTransport::new();
        let resp = transport.pull(&PullQuery::since("d1", 7)).unwrap();
        assert!(resp.ops.is_empty());
        assert_eq!(resp.new_version, 7);
        assert!(!resp.has_more);
    }
}
