//! # Memodeck Sync Server
//!
//! Server half of the memodeck reconciliation protocol.
//!
//! This crate provides:
//! - The per-user append-only change log with `(user, entity, version)`
//!   uniqueness
//! - Progress cursors per `(user, device)` pair
//! - Entity projections (decks, notes, cards, review logs) derived from the
//!   log
//! - Push, pull, and session handlers over an injected store handle
//! - Bearer-token authentication (HMAC-SHA256)
//!
//! # Architecture
//!
//! The change log is the source of truth; projections are a cache mutated
//! only inside the push handler's batch transaction. Conflict detection is
//! the sole serialization mechanism: a push whose declared version does not
//! exceed the recorded version for an entity rejects the whole batch, and
//! the losing device is told to pull, merge, and resubmit.
//!
//! All stores live behind one [`SyncStore`] handle passed to the handlers at
//! construction time; nothing reaches for ambient module state.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod auth;
mod config;
mod cursor;
mod error;
mod handler;
mod log;
mod projection;
mod service;
mod store;

pub use auth::{Authenticator, HmacAuthenticator, StaticAuthenticator, TokenIssuer};
pub use config::ServerConfig;
pub use cursor::{CursorStore, ProgressCursor};
pub use error::{ServerError, ServerResult};
pub use handler::SyncHandler;
pub use log::{ChangeLog, ChangeLogEntry, EntityHead};
pub use projection::{CardRow, DeckRow, NoteRow, ProjectionStore, ReviewLogRow};
pub use service::SyncService;
pub use store::{StoreInner, SyncStore};
