//! Error taxonomy for the sync server.

use memodeck_protocol::{ConflictRejection, ConflictReport};
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur while handling sync requests.
///
/// The four variants map onto the wire statuses a front end should emit:
/// validation → 400, auth → 401, conflict → 409, persistence → 500. A
/// conflict never mutates state; persistence failures are logged server-side
/// and surfaced with a generic message.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Malformed request shape; no state change.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Missing or invalid bearer credential.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Version collision; carries every losing operation of the batch.
    #[error("version conflict on {} entities", .0.len())]
    Conflict(Vec<ConflictReport>),

    /// Unexpected storage failure; generic message to the caller.
    #[error("persistence failure")]
    Persistence(String),
}

impl ServerError {
    /// Returns the HTTP status this error maps to.
    pub fn http_status(&self) -> u16 {
        match self {
            ServerError::Validation(_) => 400,
            ServerError::Auth(_) => 401,
            ServerError::Conflict(_) => 409,
            ServerError::Persistence(_) => 500,
        }
    }

    /// Returns true if the caller is at fault (4xx).
    pub fn is_client_error(&self) -> bool {
        self.http_status() < 500
    }

    /// Returns the conflict list, if this is a conflict rejection.
    pub fn conflicts(&self) -> Option<&[ConflictReport]> {
        match self {
            ServerError::Conflict(reports) => Some(reports),
            _ => None,
        }
    }

    /// Builds the `409` response body, if this is a conflict rejection.
    pub fn to_rejection(&self) -> Option<ConflictRejection> {
        self.conflicts()
            .map(|reports| ConflictRejection::new(reports.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memodeck_protocol::EntityKind;

    #[test]
    fn status_mapping() {
        assert_eq!(ServerError::Validation("bad".into()).http_status(), 400);
        assert_eq!(ServerError::Auth("no token".into()).http_status(), 401);
        assert_eq!(ServerError::Conflict(vec![]).http_status(), 409);
        assert_eq!(ServerError::Persistence("disk".into()).http_status(), 500);
    }

    #[test]
    fn persistence_message_is_generic() {
        // The internal detail stays out of Display output.
        let err = ServerError::Persistence("row 17 corrupt".into());
        assert_eq!(err.to_string(), "persistence failure");
    }

    #[test]
    fn conflict_carries_reports() {
        let err = ServerError::Conflict(vec![ConflictReport::new(
            "deck-1",
            EntityKind::Deck,
            1,
            3,
            "d1",
        )]);
        assert!(err.is_client_error());
        let rejection = err.to_rejection().unwrap();
        assert_eq!(rejection.conflicts.len(), 1);
        assert_eq!(rejection.conflicts[0].current_version, 3);
    }
}
