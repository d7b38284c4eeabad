//! # Memodeck Sync Client
//!
//! Client half of the memodeck reconciliation protocol.
//!
//! This crate provides:
//! - A local entity store mirroring one user's decks, notes, cards, and
//!   review logs
//! - An outbox of unpushed local changes, drained only on server ack
//! - An apply engine replaying pulled operations with cascade deletes
//! - A sync orchestrator: session probe, optimistic push, paginated pull
//! - A transport seam with a scripted mock for tests
//!
//! # Conflict model
//!
//! The server never merges. A push whose versions lost the race comes back
//! as [`ClientError::Conflict`] with the outbox untouched; the caller pulls
//! the winning state, merges locally, and stages the change again. Retry
//! helpers therefore back off on transport failures only, never on
//! conflicts.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod apply;
mod config;
mod engine;
mod error;
mod outbox;
mod store;
mod transport;

pub use apply::apply_page;
pub use config::{RetryConfig, SyncConfig};
pub use engine::{SyncEngine, SyncReport, SyncState, SyncStats};
pub use error::{ClientError, ClientResult};
pub use outbox::{Outbox, PendingOp};
pub use store::{LocalCard, LocalDeck, LocalNote, LocalReviewLog, LocalStore, SyncMeta};
pub use transport::{MockTransport, SyncTransport};
