//! Shared types for the Things Cloud sync SDK: opaque identifiers, the error
//! taxonomy, partial-update semantics, stream cursors, and the typed change
//! vocabulary the detector emits.

pub mod change;
pub mod error;
pub mod field;
pub mod ids;
pub mod position;

pub use change::{Change, ChangeKind, Location};
pub use error::{Error, Result};
pub use field::Field;
pub use ids::EntityId;
pub use position::{Cursor, StreamPosition};
