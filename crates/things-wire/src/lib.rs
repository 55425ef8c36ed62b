//! Decodes the Things Cloud history-endpoint JSON envelope into a flat,
//! ordered sequence of [`EventRecord`]s, and supplies the payload structs
//! each entity-kind projector merges onto a prior snapshot.

pub mod envelope;
pub mod enums;
pub mod int_bool;
pub mod kinds;
pub mod note;
pub mod payloads;
pub mod timestamp;

pub use envelope::{Action, EventRecord, decode_page};
pub use enums::{Schedule, Status, TaskType};
pub use int_bool::IntBool;
pub use kinds::EntityKind;
pub use note::{Note, NotePatch};
pub use payloads::{AreaPayload, ChecklistItemPayload, TagPayload, TaskPayload, TombstonePayload};
pub use timestamp::Timestamp;
