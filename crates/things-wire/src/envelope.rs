use std::collections::HashMap;

use serde::Deserialize;
use things_core::{EntityId, Error, Result};
use tracing::warn;

use crate::kinds::EntityKind;

/// The action a wire entry records against its target entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Created,
    Modified,
    Deleted,
}

impl Action {
    fn from_code(code: i64) -> Option<Action> {
        match code {
            0 => Some(Action::Created),
            1 => Some(Action::Modified),
            2 => Some(Action::Deleted),
            _ => None,
        }
    }
}

/// One flattened event: an identifier paired with its envelope. The
/// payload is left as raw JSON — each entity kind's projector parses it
/// into its own payload struct.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub id: EntityId,
    pub kind: EntityKind,
    pub action: Action,
    pub payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    e: String,
    t: i64,
    #[serde(default)]
    p: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RawPage {
    items: Vec<HashMap<String, RawEnvelope>>,
    #[serde(rename = "current-item-index")]
    current_item_index: u64,
}

/// Decodes one history page response, `{items: [{uuid: {e, t, p}}, ...],
/// current-item-index, schema}`, into a flat ordered sequence of
/// [`EventRecord`]s plus the server's high-water index for this stream.
///
/// Each item is a single-entry map from identifier to envelope; that shape is
/// the wire's, not ours — we flatten it here so nothing downstream has to
/// know about it.
pub fn decode_page(raw: &serde_json::Value) -> Result<(Vec<EventRecord>, u64)> {
    let page: RawPage = serde_json::from_value(raw.clone())
        .map_err(|err| Error::Transport(format!("malformed history page: {err}")))?;

    let mut records = Vec::with_capacity(page.items.len());
    for item in page.items {
        let mut entries = item.into_iter();
        let (uuid, envelope) = match entries.next() {
            Some(pair) => pair,
            None => {
                warn!("history page contained an empty item; skipping");
                continue;
            }
        };
        if entries.next().is_some() {
            warn!(uuid, "history item mapped more than one identifier; using the first");
        }

        let id = EntityId::from(uuid);
        let kind = EntityKind::from_tag(&envelope.e);
        let action = Action::from_code(envelope.t).ok_or_else(|| Error::Decode {
            event_id: id.clone(),
            kind: envelope.e.clone(),
            message: format!("unrecognized action code {}", envelope.t),
        })?;

        records.push(EventRecord {
            id,
            kind,
            action,
            payload: envelope.p,
        });
    }

    Ok((records, page.current_item_index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_items_in_page_order() {
        let raw = json!({
            "items": [
                {"t1": {"e": "Task6", "t": 0, "p": {"tt": "Buy milk", "tp": 0}}},
                {"t1": {"e": "Task6", "t": 1, "p": {"ss": 3}}},
            ],
            "current-item-index": 2,
        });

        let (records, current_index) = decode_page(&raw).unwrap();
        assert_eq!(current_index, 2);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].action, Action::Created);
        assert_eq!(records[1].action, Action::Modified);
        assert_eq!(records[0].kind, EntityKind::Task);
    }

    #[test]
    fn tombstone_entries_decode_with_their_payload_intact() {
        let raw = json!({
            "items": [
                {"tomb1": {"e": "Tombstone2", "t": 0, "p": {"dloid": "t1", "dld": 1_700_000_000}}},
            ],
            "current-item-index": 1,
        });

        let (records, _) = decode_page(&raw).unwrap();
        assert_eq!(records[0].kind, EntityKind::Tombstone);
        assert_eq!(records[0].payload["dloid"], "t1");
    }

    #[test]
    fn unrecognized_action_code_is_a_decode_error() {
        let raw = json!({
            "items": [{"t1": {"e": "Task6", "t": 9, "p": {}}}],
            "current-item-index": 1,
        });

        let err = decode_page(&raw).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn empty_item_is_skipped_not_an_error() {
        let raw = json!({
            "items": [{}],
            "current-item-index": 0,
        });

        let (records, _) = decode_page(&raw).unwrap();
        assert!(records.is_empty());
    }
}
