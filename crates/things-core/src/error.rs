use crate::ids::EntityId;
use thiserror::Error;

/// Auth, transport, decode and store errors are distinct kinds so callers
/// can branch on them (e.g. abort vs. retry vs. surface to the user),
/// rather than a single opaque failure.
#[derive(Debug, Error)]
pub enum Error {
    /// Credentials were rejected by the service (HTTP 401).
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    /// Network I/O, TLS, or an unexpected non-2xx response. Propagated
    /// verbatim from the transport; never retried inside the core.
    #[error("transport error: {0}")]
    Transport(String),

    /// A payload failed to parse. Annotated with the event's identifier and
    /// kind tag for diagnosis.
    #[error("failed to decode event {event_id} ({kind}): {message}")]
    Decode {
        event_id: EntityId,
        kind: String,
        message: String,
    },

    /// A database error from the persistent store. Surfaced verbatim; the
    /// sync driver aborts without advancing the cursor.
    #[error("store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_carries_event_identity() {
        let err = Error::Decode {
            event_id: EntityId::new("e1"),
            kind: "Task6".to_string(),
            message: "missing field tt".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("e1"));
        assert!(rendered.contains("Task6"));
    }
}
