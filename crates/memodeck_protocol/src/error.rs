//! Error types for the wire protocol.

use crate::op::{EntityKind, OpKind};
use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while encoding or decoding protocol data.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A continuation token did not decode to two well-formed parts.
    #[error("malformed continuation token: {0}")]
    MalformedToken(String),

    /// An entity type string was not one of the known kinds.
    #[error("unknown entity type: {0}")]
    UnknownEntityKind(String),

    /// A create/update operation arrived without its payload.
    #[error("{op} operation for {entity_type} {entity_id} is missing its payload")]
    MissingPayload {
        /// Operation kind.
        op: OpKind,
        /// Entity kind.
        entity_type: EntityKind,
        /// Entity identifier.
        entity_id: String,
    },

    /// A payload object did not match the schema for its entity kind.
    #[error("invalid {kind} payload: {message}")]
    PayloadShape {
        /// Entity kind the payload was decoded as.
        kind: EntityKind,
        /// Decoder message.
        message: String,
    },

    /// A payload could not be serialized back to a wire object.
    #[error("payload serialization failed: {0}")]
    PayloadEncode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ProtocolError::MissingPayload {
            op: OpKind::Create,
            entity_type: EntityKind::Deck,
            entity_id: "deck-1".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("create"));
        assert!(msg.contains("deck-1"));
    }
}
