//! Entity projections derived from the change log.
//!
//! Current-state tables for each entity kind, keyed by entity id and scoped
//! by user id. The projection is a cache: every row is fully derivable by
//! replaying the log in version order, and it is mutated only inside the
//! push handler's batch transaction.

use memodeck_protocol::{
    CardPayload, DeckPayload, EntityKind, EntityPayload, NotePayload, ReviewLogPayload,
    DEFAULT_EASE_FACTOR, DEFAULT_INTERVAL_DAYS,
};
use std::collections::HashMap;

/// Current state of a deck.
#[derive(Debug, Clone, PartialEq)]
pub struct DeckRow {
    /// Entity id.
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// Display name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Last accepted mutation time, epoch milliseconds.
    pub updated_at: i64,
}

/// Current state of a note.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteRow {
    /// Entity id.
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// Owning deck.
    pub deck_id: String,
    /// Front text.
    pub front: String,
    /// Back text.
    pub back: String,
    /// User tags.
    pub tags: Vec<String>,
    /// Last accepted mutation time, epoch milliseconds.
    pub updated_at: i64,
}

/// Current state of a card.
#[derive(Debug, Clone, PartialEq)]
pub struct CardRow {
    /// Entity id.
    pub id: String,
    /// Owning user.
    pub user_id: String,
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
    /// Last accepted mutation time, epoch milliseconds.
    pub updated_at: i64,
}

/// Current state of a review log entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewLogRow {
    /// Entity id.
    pub id: String,
    /// Owning user.
    pub user_id: String,
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

type Key = (String, String); // (user_id, entity_id)

/// Current-state tables for all four entity kinds.
pub struct ProjectionStore {
    decks: HashMap<Key, DeckRow>,
    notes: HashMap<Key, NoteRow>,
    cards: HashMap<Key, CardRow>,
    review_logs: HashMap<Key, ReviewLogRow>,
}

impl ProjectionStore {
    /// Creates an empty projection store.
    pub fn new() -> Self {
        Self {
            decks: HashMap::new(),
            notes: HashMap::new(),
            cards: HashMap::new(),
            review_logs: HashMap::new(),
        }
    }

    fn key(user_id: &str, entity_id: &str) -> Key {
        (user_id.to_string(), entity_id.to_string())
    }

    /// Applies a create: insert-or-ignore by id and owner.
    pub fn create(
        &mut self,
        user_id: &str,
        entity_id: &str,
        payload: &EntityPayload,
        timestamp: i64,
    ) {
        let key = Self::key(user_id, entity_id);
        match payload {
            EntityPayload::Deck(p) => {
                self.decks.entry(key).or_insert_with(|| DeckRow {
                    id: entity_id.to_string(),
                    user_id: user_id.to_string(),
                    name: p.name.clone(),
                    description: p.description.clone(),
                    updated_at: timestamp,
                });
            }
            EntityPayload::Note(p) => {
                self.notes.entry(key).or_insert_with(|| NoteRow {
                    id: entity_id.to_string(),
                    user_id: user_id.to_string(),
                    deck_id: p.deck_id.clone(),
                    front: p.front.clone(),
                    back: p.back.clone(),
                    tags: p.tags.clone(),
                    updated_at: timestamp,
                });
            }
            EntityPayload::Card(p) => {
                self.cards.entry(key).or_insert_with(|| card_row(user_id, entity_id, p, timestamp));
            }
            EntityPayload::ReviewLog(p) => {
                self.review_logs.entry(key).or_insert_with(|| ReviewLogRow {
                    id: entity_id.to_string(),
                    user_id: user_id.to_string(),
                    card_id: p.card_id.clone(),
                    rating: p.rating,
                    reviewed_at: p.reviewed_at,
                    interval_days: p.interval_days.unwrap_or(DEFAULT_INTERVAL_DAYS),
                    ease_factor: p.ease_factor.unwrap_or(DEFAULT_EASE_FACTOR),
                });
            }
        }
    }

    /// Applies an update by id and owner, merging payload fields over the
    /// existing row. A row that does not exist yet is inserted, so replays
    /// that arrive update-first still converge.
    pub fn update(
        &mut self,
        user_id: &str,
        entity_id: &str,
        payload: &EntityPayload,
        timestamp: i64,
    ) {
        let key = Self::key(user_id, entity_id);
        match payload {
            EntityPayload::Deck(p) => match self.decks.get_mut(&key) {
                Some(row) => {
                    row.name = p.name.clone();
                    row.description = p.description.clone();
                    row.updated_at = timestamp;
                }
                None => self.create(user_id, entity_id, payload, timestamp),
            },
            EntityPayload::Note(p) => match self.notes.get_mut(&key) {
                Some(row) => {
                    row.deck_id = p.deck_id.clone();
                    row.front = p.front.clone();
                    row.back = p.back.clone();
                    row.tags = p.tags.clone();
                    row.updated_at = timestamp;
                }
                None => self.create(user_id, entity_id, payload, timestamp),
            },
            EntityPayload::Card(p) => match self.cards.get_mut(&key) {
                Some(row) => {
                    row.note_id = p.note_id.clone();
                    row.deck_id = p.deck_id.clone();
                    // Missing scheduling fields keep the current values
                    // instead of nulling them out.
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
                None => self.create(user_id, entity_id, payload, timestamp),
            },
            EntityPayload::ReviewLog(p) => match self.review_logs.get_mut(&key) {
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
                None => self.create(user_id, entity_id, payload, timestamp),
            },
        }
    }

    /// Applies a delete by id and owner, cascading to dependents:
    /// deck → notes, cards, review logs; note → cards, review logs;
    /// card → review logs.
    pub fn delete(&mut self, user_id: &str, entity_id: &str, kind: EntityKind) {
        match kind {
            EntityKind::Deck => {
                self.decks.remove(&Self::key(user_id, entity_id));
                let note_ids: Vec<String> = self
                    .notes
                    .values()
                    .filter(|n| n.user_id == user_id && n.deck_id == entity_id)
                    .map(|n| n.id.clone())
                    .collect();
                for note_id in note_ids {
                    self.delete(user_id, &note_id, EntityKind::Note);
                }
                // Cards created directly under the deck, without a surviving
                // note, still go.
                let card_ids: Vec<String> = self
                    .cards
                    .values()
                    .filter(|c| c.user_id == user_id && c.deck_id == entity_id)
                    .map(|c| c.id.clone())
                    .collect();
                for card_id in card_ids {
                    self.delete(user_id, &card_id, EntityKind::Card);
                }
            }
            EntityKind::Note => {
                self.notes.remove(&Self::key(user_id, entity_id));
                let card_ids: Vec<String> = self
                    .cards
                    .values()
                    .filter(|c| c.user_id == user_id && c.note_id == entity_id)
                    .map(|c| c.id.clone())
                    .collect();
                for card_id in card_ids {
                    self.delete(user_id, &card_id, EntityKind::Card);
                }
            }
            EntityKind::Card => {
                self.cards.remove(&Self::key(user_id, entity_id));
                self.review_logs
                    .retain(|_, r| !(r.user_id == user_id && r.card_id == entity_id));
            }
            EntityKind::ReviewLog => {
                self.review_logs.remove(&Self::key(user_id, entity_id));
            }
        }
    }

    /// Re-reads current entity state as a canonical wire payload.
    ///
    /// Owner-scoped fields are stripped; timestamps are epoch milliseconds.
    pub fn hydrate(&self, user_id: &str, entity_id: &str, kind: EntityKind) -> Option<EntityPayload> {
        let key = Self::key(user_id, entity_id);
        match kind {
            EntityKind::Deck => self.decks.get(&key).map(|row| {
                EntityPayload::Deck(DeckPayload {
                    name: row.name.clone(),
                    description: row.description.clone(),
                })
            }),
            EntityKind::Note => self.notes.get(&key).map(|row| {
                EntityPayload::Note(NotePayload {
                    deck_id: row.deck_id.clone(),
                    front: row.front.clone(),
                    back: row.back.clone(),
                    tags: row.tags.clone(),
                })
            }),
            EntityKind::Card => self.cards.get(&key).map(|row| {
                EntityPayload::Card(CardPayload {
                    note_id: row.note_id.clone(),
                    deck_id: row.deck_id.clone(),
                    due_at: Some(row.due_at),
                    interval_days: Some(row.interval_days),
                    ease_factor: Some(row.ease_factor),
                    reps: Some(row.reps),
                    lapses: Some(row.lapses),
                })
            }),
            EntityKind::ReviewLog => self.review_logs.get(&key).map(|row| {
                EntityPayload::ReviewLog(ReviewLogPayload {
                    card_id: row.card_id.clone(),
                    rating: row.rating,
                    reviewed_at: row.reviewed_at,
                    interval_days: Some(row.interval_days),
                    ease_factor: Some(row.ease_factor),
                })
            }),
        }
    }

    /// Returns a deck row for inspection.
    pub fn deck(&self, user_id: &str, entity_id: &str) -> Option<&DeckRow> {
        self.decks.get(&Self::key(user_id, entity_id))
    }

    /// Returns a note row for inspection.
    pub fn note(&self, user_id: &str, entity_id: &str) -> Option<&NoteRow> {
        self.notes.get(&Self::key(user_id, entity_id))
    }

    /// Returns a card row for inspection.
    pub fn card(&self, user_id: &str, entity_id: &str) -> Option<&CardRow> {
        self.cards.get(&Self::key(user_id, entity_id))
    }

    /// Returns a review log row for inspection.
    pub fn review_log(&self, user_id: &str, entity_id: &str) -> Option<&ReviewLogRow> {
        self.review_logs.get(&Self::key(user_id, entity_id))
    }
}

impl Default for ProjectionStore {
    fn default() -> Self {
        Self::new()
    }
}

fn card_row(user_id: &str, entity_id: &str, p: &CardPayload, timestamp: i64) -> CardRow {
    CardRow {
        id: entity_id.to_string(),
        user_id: user_id.to_string(),
        note_id: p.note_id.clone(),
        deck_id: p.deck_id.clone(),
        due_at: p.due_at.unwrap_or(0),
        interval_days: p.interval_days.unwrap_or(DEFAULT_INTERVAL_DAYS),
        ease_factor: p.ease_factor.unwrap_or(DEFAULT_EASE_FACTOR),
        reps: p.reps.unwrap_or(0),
        lapses: p.lapses.unwrap_or(0),
        updated_at: timestamp,
    }
}
