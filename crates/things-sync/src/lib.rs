//! Entity projection, the change detector, the persistent and in-memory
//! stores, the sync driver, and the read-only query surface — everything
//! downstream of the wire codec and history client.

pub mod detect;
pub mod driver;
pub mod project;
pub mod query;
pub mod snapshot;
pub mod store;

pub use driver::{EventSource, SyncDriver};
pub use query::Query;
pub use snapshot::{
    AreaSnapshot, ChangeLogRecord, ChecklistItemSnapshot, QueryFilter, SyncState, TagSnapshot,
    TaskSnapshot,
};
pub use store::memory::MemoryStore;
pub use store::sqlite::SqliteStore;
pub use store::{OwnerKind, Store};
