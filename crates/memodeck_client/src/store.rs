//! Local entity store and sync bookkeeping.
//!
//! The device-local mirror of one user's data: current-state tables per
//! entity kind, the outbox of unpushed changes, and the pull watermark. One
//! lock guards all of it, so a staged change and its outbox entry land
//! together.

use crate::error::ClientResult;
use crate::outbox::{Outbox, PendingOp};
use memodeck_protocol::{
    EntityKind, EntityPayload, OpKind, DEFAULT_EASE_FACTOR, DEFAULT_INTERVAL_DAYS,
};
use parking_lot::RwLock;
use std::collections::HashMap;

/// A deck as known locally.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalDeck {
    /// Entity id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Last local mutation time, epoch milliseconds.
    pub updated_at: i64,
}

/// A note as known locally.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalNote {
    /// Entity id.
    pub id: String,
    /// Owning deck.
    pub deck_id: String,
    /// Front text.
    pub front: String,
    /// Back text.
    pub back: String,
    /// User tags.
    pub tags: Vec<String>,
    /// Last local mutation time, epoch milliseconds.
    pub updated_at: i64,
}

/// A card as known locally.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalCard {
    /// Entity id.
    pub id: String,
    /// Owning note.
    pub note_id: String,
    /// Owning deck.
    pub deck_id: String,
    /// Next due time, epoch milliseconds; 0 until first scheduled.
    pub due_at: i64,
    /// Current interval in days.
    pub interval_days: f64,
    /// Current ease factor.
    pub ease_factor: f64,
    /// Successful repetitions.
    pub reps: u32,
    /// Lapses.
    pub lapses: u32,
    /// Last local mutation time, epoch milliseconds.
    pub updated_at: i64,
}

/// A review log entry as known locally.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalReviewLog {
    /// Entity id.
    pub id: String,
    /// Reviewed card.
    pub card_id: String,
    /// Grade given.
    pub rating: u8,
    /// Review time, epoch milliseconds.
    pub reviewed_at: i64,
    /// Interval granted, in days.
    pub interval_days: f64,
    /// Ease factor after the review.
    pub ease_factor: f64,
}

/// Persisted sync bookkeeping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncMeta {
    /// Highest server version this device has pulled and applied.
    pub last_pulled_version: u64,
    /// Mid-sequence continuation token, non-null only between pages.
    pub continuation: Option<String>,
    /// Wall clock of the last successful cycle, epoch milliseconds.
    pub last_synced_at: Option<i64>,
}

pub(crate) struct LocalInner {
    pub(crate) decks: HashMap<String, LocalDeck>,
    pub(crate) notes: HashMap<String, LocalNote>,
    pub(crate) cards: HashMap<String, LocalCard>,
    pub(crate) review_logs: HashMap<String, LocalReviewLog>,
    pub(crate) outbox: Outbox,
    pub(crate) meta: SyncMeta,
}

impl LocalInner {
    /// Insert-or-ignore by entity id.
    pub(crate) fn apply_create(&mut self, entity_id: &str, payload: &EntityPayload, timestamp: i64) {
        match payload {
            EntityPayload::Deck(p) => {
                self.decks.entry(entity_id.to_string()).or_insert_with(|| LocalDeck {
                    id: entity_id.to_string(),
                    name: p.name.clone(),
                    description: p.description.clone(),
                    updated_at: timestamp,
                });
            }
            EntityPayload::Note(p) => {
                self.notes.entry(entity_id.to_string()).or_insert_with(|| LocalNote {
                    id: entity_id.to_string(),
                    deck_id: p.deck_id.clone(),
                    front: p.front.clone(),
                    back: p.back.clone(),
                    tags: p.tags.clone(),
                    updated_at: timestamp,
                });
            }
            EntityPayload::Card(p) => {
                self.cards.entry(entity_id.to_string()).or_insert_with(|| LocalCard {
                    id: entity_id.to_string(),
                    note_id: p.note_id.clone(),
                    deck_id: p.deck_id.clone(),
                    due_at: p.due_at.unwrap_or(0),
                    interval_days: p.interval_days.unwrap_or(DEFAULT_INTERVAL_DAYS),
                    ease_factor: p.ease_factor.unwrap_or(DEFAULT_EASE_FACTOR),
                    reps: p.reps.unwrap_or(0),
                    lapses: p.lapses.unwrap_or(0),
                    updated_at: timestamp,
                });
            }
            EntityPayload::ReviewLog(p) => {
                self.review_logs
                    .entry(entity_id.to_string())
                    .or_insert_with(|| LocalReviewLog {
                        id: entity_id.to_string(),
                        card_id: p.card_id.clone(),
                        rating: p.rating,
                        reviewed_at: p.reviewed_at,
                        interval_days: p.interval_days.unwrap_or(DEFAULT_INTERVAL_DAYS),
                        ease_factor: p.ease_factor.unwrap_or(DEFAULT_EASE_FACTOR),
                    });
            }
        }
    }

    /// Upsert-merge by entity id. Scheduling fields missing from a card or
    /// review-log payload keep their locally known values.
    pub(crate) fn apply_update(&mut self, entity_id: &str, payload: &EntityPayload, timestamp: i64) {
        match payload {
            EntityPayload::Deck(p) => match self.decks.get_mut(entity_id) {
                Some(row) => {
                    row.name = p.name.clone();
                    row.description = p.description.clone();
                    row.updated_at = timestamp;
                }
                None => self.apply_create(entity_id, payload, timestamp),
            },
            EntityPayload::Note(p) => match self.notes.get_mut(entity_id) {
                Some(row) => {
                    row.deck_id = p.deck_id.clone();
                    row.front = p.front.clone();
                    row.back = p.back.clone();
                    row.tags = p.tags.clone();
                    row.updated_at = timestamp;
                }
                None => self.apply_create(entity_id, payload, timestamp),
            },
            EntityPayload::Card(p) => match self.cards.get_mut(entity_id) {
                Some(row) => {
                    row.note_id = p.note_id.clone();
                    row.deck_id = p.deck_id.clone();
                    if let Some(due_at) = p.due_at {
                        row.due_at = due_at;
                    }
                    if let Some(interval) = p.interval_days {
                        row.interval_days = interval;
                    }
                    if let Some(ease) = p.ease_factor {
                        row.ease_factor = ease;
                    }
                    if let Some(reps) = p.reps {
                        row.reps = reps;
                    }
                    if let Some(lapses) = p.lapses {
                        row.lapses = lapses;
                    }
                    row.updated_at = timestamp;
                }
                None => self.apply_create(entity_id, payload, timestamp),
            },
            EntityPayload::ReviewLog(p) => match self.review_logs.get_mut(entity_id) {
                Some(row) => {
                    row.card_id = p.card_id.clone();
                    row.rating = p.rating;
                    row.reviewed_at = p.reviewed_at;
                    if let Some(interval) = p.interval_days {
                        row.interval_days = interval;
                    }
                    if let Some(ease) = p.ease_factor {
                        row.ease_factor = ease;
                    }
                }
                None => self.apply_create(entity_id, payload, timestamp),
            },
        }
    }

    /// Delete by entity id with the same cascades the server applies:
    /// deck → notes, cards, review logs; note → cards, review logs;
    /// card → review logs.
    pub(crate) fn apply_delete(&mut self, entity_id: &str, kind: EntityKind) {
        match kind {
            EntityKind::Deck => {
                self.decks.remove(entity_id);
                let note_ids: Vec<String> = self
                    .notes
                    .values()
                    .filter(|n| n.deck_id == entity_id)
                    .map(|n| n.id.clone())
                    .collect();
                for note_id in note_ids {
                    self.apply_delete(&note_id, EntityKind::Note);
                }
                let card_ids: Vec<String> = self
                    .cards
                    .values()
                    .filter(|c| c.deck_id == entity_id)
                    .map(|c| c.id.clone())
                    .collect();
                for card_id in card_ids {
                    self.apply_delete(&card_id, EntityKind::Card);
                }
            }
            EntityKind::Note => {
                self.notes.remove(entity_id);
                let card_ids: Vec<String> = self
                    .cards
                    .values()
                    .filter(|c| c.note_id == entity_id)
                    .map(|c| c.id.clone())
                    .collect();
                for card_id in card_ids {
                    self.apply_delete(&card_id, EntityKind::Card);
                }
            }
            EntityKind::Card => {
                self.cards.remove(entity_id);
                self.review_logs.retain(|_, r| r.card_id != entity_id);
            }
            EntityKind::ReviewLog => {
                self.review_logs.remove(entity_id);
            }
        }
    }
}

/// Thread-safe handle over the local store.
pub struct LocalStore {
    pub(crate) inner: RwLock<LocalInner>,
}

impl LocalStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(LocalInner {
                decks: HashMap::new(),
                notes: HashMap::new(),
                cards: HashMap::new(),
                review_logs: HashMap::new(),
                outbox: Outbox::new(),
                meta: SyncMeta::default(),
            }),
        }
    }

    /// Stages a local change: applies it to the local tables and queues it
    /// for push, atomically.
    ///
    /// Fails without queueing when a create/update payload does not match
    /// the schema for its entity kind.
    pub fn stage(&self, op: PendingOp) -> ClientResult<()> {
        let payload = match op.op {
            OpKind::Delete => None,
            _ => {
                let value = op.payload.as_ref().ok_or_else(|| {
                    memodeck_protocol::ProtocolError::MissingPayload {
                        op: op.op,
                        entity_type: op.entity_type,
                        entity_id: op.entity_id.clone(),
                    }
                })?;
                Some(EntityPayload::from_value(op.entity_type, value)?)
            }
        };
        let mut inner = self.inner.write();
        match (op.op, &payload) {
            (OpKind::Create, Some(p)) => inner.apply_create(&op.entity_id, p, op.timestamp),
            (OpKind::Update, Some(p)) => inner.apply_update(&op.entity_id, p, op.timestamp),
            (OpKind::Delete, _) => inner.apply_delete(&op.entity_id, op.entity_type),
            // Decoded above; create/update always carry a payload here.
            (_, None) => {}
        }
        inner.outbox.enqueue(op);
        Ok(())
    }

    /// Returns the number of unpushed changes.
    pub fn pending_count(&self) -> usize {
        self.inner.read().outbox.len()
    }

    /// Returns the persisted sync bookkeeping.
    pub fn meta(&self) -> SyncMeta {
        self.inner.read().meta.clone()
    }

    /// Advances the watermark past a confirmed push. The ops this device
    /// just wrote need no echo on the next pull; the continuation token, if
    /// any, is left alone.
    pub(crate) fn record_push_progress(&self, current_version: u64) {
        let mut inner = self.inner.write();
        inner.meta.last_pulled_version = inner.meta.last_pulled_version.max(current_version);
    }

    /// Advances the pull watermark and continuation after an applied page.
    pub(crate) fn record_pull_progress(&self, new_version: u64, continuation: Option<String>) {
        let mut inner = self.inner.write();
        inner.meta.last_pulled_version = inner.meta.last_pulled_version.max(new_version);
        inner.meta.continuation = continuation;
    }

    /// Stamps a successful cycle.
    pub(crate) fn stamp_synced(&self, now: i64) {
        self.inner.write().meta.last_synced_at = Some(now);
    }

    /// Returns a deck by id.
    pub fn deck(&self, id: &str) -> Option<LocalDeck> {
        self.inner.read().decks.get(id).cloned()
    }

    /// Returns a note by id.
    pub fn note(&self, id: &str) -> Option<LocalNote> {
        self.inner.read().notes.get(id).cloned()
    }

    /// Returns a card by id.
    pub fn card(&self, id: &str) -> Option<LocalCard> {
        self.inner.read().cards.get(id).cloned()
    }

    /// Returns a review log entry by id.
    pub fn review_log(&self, id: &str) -> Option<LocalReviewLog> {
        self.inner.read().review_logs.get(id).cloned()
    }

    /// Returns `(decks, notes, cards, review_logs)` row counts.
    pub fn counts(&self) -> (usize, usize, usize, usize) {
        let inner = self.inner.read();
        (
            inner.decks.len(),
            inner.notes.len(),
            inner.cards.len(),
            inner.review_logs.len(),
        )
    }
}

impl Default for LocalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create(kind: EntityKind, id: &str, payload: serde_json::Value) -> PendingOp {
        PendingOp {
            entity_id: id.into(),
            entity_type: kind,
            op: OpKind::Create,
            timestamp: 0,
            payload: Some(payload),
            diff: None,
        }
    }

    #[test]
    fn stage_applies_locally_and_queues() {
        let store = LocalStore::new();
        store
            .stage(create(EntityKind::Deck, "deck-1", json!({"name": "Deck"})))
            .unwrap();
        assert_eq!(store.deck("deck-1").unwrap().name, "Deck");
        assert_eq!(store.pending_count(), 1);
    }

    #[test]
    fn stage_rejects_malformed_payload_without_queueing() {
        let store = LocalStore::new();
        let err = store
            .stage(create(EntityKind::Deck, "deck-1", json!({"title": "wrong"})))
            .unwrap_err();
        assert!(matches!(err, crate::error::ClientError::Protocol(_)));
        assert_eq!(store.pending_count(), 0);
        assert!(store.deck("deck-1").is_none());
    }

    #[test]
    fn staged_delete_cascades() {
        let store = LocalStore::new();
        store
            .stage(create(EntityKind::Deck, "deck-1", json!({"name": "Deck"})))
            .unwrap();
        store
            .stage(create(
                EntityKind::Note,
                "note-1",
                json!({"deckId": "deck-1", "front": "Q", "back": "A", "tags": []}),
            ))
            .unwrap();
        store
            .stage(create(
                EntityKind::Card,
                "card-1",
                json!({"noteId": "note-1", "deckId": "deck-1"}),
            ))
            .unwrap();
        store
            .stage(PendingOp {
                entity_id: "deck-1".into(),
                entity_type: EntityKind::Deck,
                op: OpKind::Delete,
                timestamp: 1,
                payload: None,
                diff: None,
            })
            .unwrap();
        assert_eq!(store.counts(), (0, 0, 0, 0));
        // All four changes still go to the server in order.
        assert_eq!(store.pending_count(), 4);
    }

    #[test]
    fn pull_watermark_never_regresses() {
        let store = LocalStore::new();
        store.record_pull_progress(9, None);
        store.record_pull_progress(4, Some("4:1".into()));
        let meta = store.meta();
        assert_eq!(meta.last_pulled_version, 9);
        assert_eq!(meta.continuation.as_deref(), Some("4:1"));
    }
}
