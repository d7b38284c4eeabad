//! Typed entity payloads.
//!
//! Payloads travel on the wire as plain JSON objects keyed by the operation's
//! `entityType`. [`EntityPayload::from_value`] is the single place where that
//! tagged union is turned into a typed value; both the server's projection
//! mutators and the client's apply engine dispatch through it exhaustively.

use crate::error::{ProtocolError, ProtocolResult};
use crate::op::EntityKind;
use serde::{Deserialize, Serialize};

/// Ease factor assumed when a card payload omits one.
pub const DEFAULT_EASE_FACTOR: f64 = 2.5;

/// Interval assumed for a card that has never been scheduled.
pub const DEFAULT_INTERVAL_DAYS: f64 = 0.0;

/// Payload of a deck operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckPayload {
    /// Display name.
    pub name: String,
    /// Optional free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Payload of a note operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotePayload {
    /// Owning deck.
    pub deck_id: String,
    /// Front (question) text.
    pub front: String,
    /// Back (answer) text.
    pub back: String,
    /// User tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Payload of a card operation.
///
/// The scheduling fields are optional on the wire: a payload produced before
/// the first review omits them, and the apply side falls back to
/// [`DEFAULT_EASE_FACTOR`] / [`DEFAULT_INTERVAL_DAYS`] and zero counters
/// rather than nulling out local state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPayload {
    /// Owning note.
    pub note_id: String,
    /// Owning deck, denormalized for cascade scoping.
    pub deck_id: String,
    /// Next due time, epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<i64>,
    /// Current interval in days.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_days: Option<f64>,
    /// Current ease factor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ease_factor: Option<f64>,
    /// Total successful repetitions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reps: Option<u32>,
    /// Total lapses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lapses: Option<u32>,
}

/// Payload of a review log operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewLogPayload {
    /// Card that was reviewed.
    pub card_id: String,
    /// Grade the user gave, 1 (again) through 4 (easy).
    pub rating: u8,
    /// Review time, epoch milliseconds.
    pub reviewed_at: i64,
    /// Interval granted by this review, in days.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_days: Option<f64>,
    /// Ease factor after this review.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ease_factor: Option<f64>,
}

/// A typed entity payload, one variant per entity kind.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityPayload {
    /// Deck payload.
    Deck(DeckPayload),
    /// Note payload.
    Note(NotePayload),
    /// Card payload.
    Card(CardPayload),
    /// Review log payload.
    ReviewLog(ReviewLogPayload),
}

impl EntityPayload {
    /// Decodes a wire payload object as the given entity kind.
    ///
    /// This is the only place the `entityType`-tagged union is interpreted.
    pub fn from_value(kind: EntityKind, value: &serde_json::Value) -> ProtocolResult<Self> {
        let shape_err = |e: serde_json::Error| ProtocolError::PayloadShape {
            kind,
            message: e.to_string(),
        };
        match kind {
            EntityKind::Deck => serde_json::from_value(value.clone())
                .map(EntityPayload::Deck)
                .map_err(shape_err),
            EntityKind::Note => serde_json::from_value(value.clone())
                .map(EntityPayload::Note)
                .map_err(shape_err),
            EntityKind::Card => serde_json::from_value(value.clone())
                .map(EntityPayload::Card)
                .map_err(shape_err),
            EntityKind::ReviewLog => serde_json::from_value(value.clone())
                .map(EntityPayload::ReviewLog)
                .map_err(shape_err),
        }
    }

    /// Returns the entity kind of this payload.
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityPayload::Deck(_) => EntityKind::Deck,
            EntityPayload::Note(_) => EntityKind::Note,
            EntityPayload::Card(_) => EntityKind::Card,
            EntityPayload::ReviewLog(_) => EntityKind::ReviewLog,
        }
    }

    /// Encodes back to a wire payload object.
    pub fn to_value(&self) -> ProtocolResult<serde_json::Value> {
        let encode_err = |e: serde_json::Error| ProtocolError::PayloadEncode(e.to_string());
        match self {
            EntityPayload::Deck(p) => serde_json::to_value(p).map_err(encode_err),
            EntityPayload::Note(p) => serde_json::to_value(p).map_err(encode_err),
            EntityPayload::Card(p) => serde_json::to_value(p).map_err(encode_err),
            EntityPayload::ReviewLog(p) => serde_json::to_value(p).map_err(encode_err),
        }
    }
}
