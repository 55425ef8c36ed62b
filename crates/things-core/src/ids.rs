use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque identifier for an entity or event, as minted by the server.
///
/// The server encodes these in a specific alphabet we do not understand or
/// need to. Treat them as opaque tokens: never decode, never re-encode, and
/// always preserve the bytes the server returned exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for EntityId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for EntityId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Mints a new opaque identifier for a client-originated write (e.g. a
/// `commit-events` entry, or a command UUID). This doesn't attempt to match
/// the server's exact alphabet, only to produce something unique; a real
/// write path would need to match whatever the native clients use, but this
/// is at least internally consistent.
pub fn new_client_id() -> EntityId {
    EntityId(uuid::Uuid::new_v4().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_raw_encoding() {
        let id = EntityId::new("AbCd-1234_zyx");
        assert_eq!(id.as_str(), "AbCd-1234_zyx");
        assert_eq!(id.to_string(), "AbCd-1234_zyx");
    }

    #[test]
    fn roundtrips_through_serde() {
        let id = EntityId::new("t1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"t1\"");
        let back: EntityId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
