use serde::Deserialize;
use things_core::Field;
use tracing::warn;

/// One note delta: cut `[position, position + length)` code points out of the
/// prior note and splice `replacement` in at that position.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NotePatch {
    #[serde(rename = "r")]
    pub replacement: String,
    #[serde(rename = "p")]
    pub position: i64,
    #[serde(rename = "l")]
    pub length: i64,
    #[serde(rename = "ch", default)]
    pub checksum: Option<i64>,
}

/// The two shapes a note field arrives in: a bare string (legacy payloads),
/// or a structured object carrying either the full text (`type = 1`) or a
/// sequence of patches to apply to the prior note (`type = 2`).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Note {
    Legacy(String),
    Structured {
        #[serde(rename = "t")]
        kind: i64,
        #[serde(rename = "ch", default)]
        checksum: Option<i64>,
        #[serde(rename = "v", default)]
        value: Option<String>,
        #[serde(rename = "ps", default)]
        patches: Option<Vec<NotePatch>>,
    },
}

/// Applies a sequence of patches to `base`, indexing positions over code
/// points (not bytes), clamping out-of-range positions/lengths: a negative
/// position clamps to `0`, a position beyond the end clamps to the end, and
/// an over-long length is truncated to the end. This never panics regardless
/// of how malformed the position/length are.
pub fn apply_patches(base: &str, patches: &[NotePatch]) -> String {
    let mut chars: Vec<char> = base.chars().collect();

    for patch in patches {
        let len = chars.len() as i64;
        let start = patch.position.clamp(0, len) as usize;
        let end = (start as i64 + patch.length.max(0)).clamp(0, len) as usize;

        let replacement: Vec<char> = patch.replacement.chars().collect();
        chars.splice(start..end, replacement);
    }

    chars.into_iter().collect()
}

/// Interprets one raw JSON note value against the prior note: a full-text
/// note (`type = 1` or a legacy bare string)
/// replaces the prior note outright; a patch note (`type = 2`) is applied on
/// top of it. If the JSON doesn't match either shape, the prior note is
/// retained untouched — a note can never be corrupted by a malformed payload.
pub fn merge_note(raw: &serde_json::Value, prior: Option<&str>) -> Option<String> {
    match serde_json::from_value::<Note>(raw.clone()) {
        Ok(Note::Legacy(text)) => Some(text),
        Ok(Note::Structured { kind: 1, value: Some(text), .. }) => Some(text),
        Ok(Note::Structured { kind: 2, patches: Some(patches), .. }) => {
            Some(apply_patches(prior.unwrap_or(""), &patches))
        }
        Ok(_) => {
            warn!("note payload had an unrecognized type/field combination; keeping prior note");
            prior.map(str::to_string)
        }
        Err(err) => {
            warn!(error = %err, "failed to parse note payload; keeping prior note");
            prior.map(str::to_string)
        }
    }
}

/// Applies partial-update semantics to a task's note field:
/// absent means unchanged, an explicit JSON `null` clears it, and a present
/// value is merged via [`merge_note`].
pub fn apply_note_field(field: Field<serde_json::Value>, prior: Option<String>) -> Option<String> {
    match field {
        Field::Absent => prior,
        Field::Clear => None,
        Field::Set(raw) => merge_note(&raw, prior.as_deref()),
    }
}
