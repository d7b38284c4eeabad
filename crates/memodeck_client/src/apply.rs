//! Applies pulled operations to the local store.

use crate::store::LocalStore;
use memodeck_protocol::{OpKind, SyncOp};
use tracing::warn;

/// Applies one pulled page to the local store.
///
/// Application is best-effort per operation: an op whose payload fails to
/// decode is logged and skipped, and the rest of the page still applies. The
/// caller advances its pull cursor only after the whole page was attempted,
/// so a skipped op is re-offered on the next full resync rather than lost
/// silently mid-page.
///
/// Returns the number of operations applied.
pub fn apply_page(store: &LocalStore, ops: &[SyncOp]) -> u64 {
    let mut inner = store.inner.write();
    let mut applied = 0u64;
    for op in ops {
        let payload = match op.typed_payload() {
            Ok(payload) => payload,
            Err(err) => {
                warn!(
                    entity_id = %op.entity_id,
                    entity_type = %op.entity_type,
                    %err,
                    "skipping unapplyable pulled operation"
                );
                continue;
            }
        };
        match (op.op, &payload) {
            (OpKind::Create, Some(p)) => inner.apply_create(&op.entity_id, p, op.timestamp),
            (OpKind::Update, Some(p)) => inner.apply_update(&op.entity_id, p, op.timestamp),
            (OpKind::Delete, _) => inner.apply_delete(&op.entity_id, op.entity_type),
            (_, None) => {
                // typed_payload already rejected payload-less create/update.
                continue;
            }
        }
        applied += 1;
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use memodeck_protocol::EntityKind;
    use serde_json::json;

    fn page() -> Vec<SyncOp> {
        vec![
            SyncOp::create(EntityKind::Deck, "deck-1", 1, 0, json!({"name": "Deck"})),
            SyncOp::create(
                EntityKind::Note,
                "note-1",
                2,
                0,
                json!({"deckId": "deck-1", "front": "Q", "back": "A", "tags": ["t"]}),
            ),
            SyncOp::create(
                EntityKind::Card,
                "card-1",
                3,
                0,
                json!({"noteId": "note-1", "deckId": "deck-1"}),
            ),
        ]
    }

    #[test]
    fn applies_a_full_page() {
        let store = LocalStore::new();
        assert_eq!(apply_page(&store, &page()), 3);
        assert_eq!(store.counts(), (1, 1, 1, 0));
        // Scheduling defaults filled in for the sparse card payload.
        let card = store.card("card-1").unwrap();
        assert_eq!(card.ease_factor, memodeck_protocol::DEFAULT_EASE_FACTOR);
    }

    #[test]
    fn bad_op_is_skipped_not_fatal() {
        let store = LocalStore::new();
        let mut ops = page();
        ops[1].payload = Some(json!({"front": "missing deckId"}));
        assert_eq!(apply_page(&store, &ops), 2);
        assert_eq!(store.counts(), (1, 0, 1, 0));
    }

    #[test]
    fn delete_cascades_within_a_page() {
        let store = LocalStore::new();
        apply_page(&store, &page());
        let deletes = vec![SyncOp::delete(EntityKind::Deck, "deck-1", 4, 1)];
        assert_eq!(apply_page(&store, &deletes), 1);
        assert_eq!(store.counts(), (0, 0, 0, 0));
    }

    #[test]
    fn replayed_page_is_idempotent() {
        let store = LocalStore::new();
        apply_page(&store, &page());
        apply_page(&store, &page());
        assert_eq!(store.counts(), (1, 1, 1, 0));
    }
}
