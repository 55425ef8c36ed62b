use crate::ids::EntityId;
use serde::{Deserialize, Serialize};

/// A position within one sync stream's event log: the number of events
/// loaded so far (the "loaded" cursor). Also used for the server's
/// high-water mark ("latest").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamPosition(pub u64);

impl StreamPosition {
    pub const ZERO: StreamPosition = StreamPosition(0);

    pub fn get(self) -> u64 {
        self.0
    }
}

/// The locally persisted sync cursor: which stream we last synced, and how
/// far into it. Crossing streams resets the index to zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub stream_id: EntityId,
    pub index: StreamPosition,
}

impl Cursor {
    pub fn new(stream_id: EntityId, index: StreamPosition) -> Self {
        Self { stream_id, index }
    }

    /// The cursor to use when resuming sync against `stream_id`: if we were
    /// previously on a different stream, start from zero; otherwise keep
    /// our prior position.
    pub fn resume_for(self, stream_id: &EntityId) -> Cursor {
        if &self.stream_id == stream_id {
            self
        } else {
            Cursor::new(stream_id.clone(), StreamPosition::ZERO)
        }
    }
}
