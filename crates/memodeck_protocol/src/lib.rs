//! # Memodeck Sync Protocol
//!
//! Wire types for the memodeck reconciliation protocol.
//!
//! This crate provides:
//! - `SyncOp` operation records and entity/operation kind enums
//! - `EntityPayload` typed payloads with one exhaustive dispatch point
//! - Push, pull, and session request/response messages
//! - Continuation token codec for paginated pulls
//! - Machine-readable conflict reports
//!
//! This is a pure protocol crate with no I/O operations. The server and
//! client crates both build on it; neither half ever interprets a payload
//! outside the `EntityPayload` dispatch.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod messages;
mod op;
mod payload;
mod token;

pub use error::{ProtocolError, ProtocolResult};
pub use messages::{
    ConflictRejection, ConflictReport, PullQuery, PullResponse, PushRequest, PushResponse,
    SessionInfo, DEFAULT_PULL_LIMIT, RETRY_HINT,
};
pub use op::{EntityKind, OpKind, SyncOp};
pub use payload::{
    CardPayload, DeckPayload, EntityPayload, NotePayload, ReviewLogPayload, DEFAULT_EASE_FACTOR,
    DEFAULT_INTERVAL_DAYS,
};
pub use token::ContinuationToken;
