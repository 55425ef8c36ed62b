//! The narrow storage capability the sync driver and query surface are built
//! against: get/save/soft-delete per entity kind, plus sync-state and
//! change-log access. The persistent ([`sqlite`]) and in-memory ([`memory`])
//! variants share this trait so the driver and the projection/detection
//! code above it are identical either way.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use things_core::{EntityId, Result};

use crate::snapshot::{AreaSnapshot, ChangeLogRecord, ChecklistItemSnapshot, QueryFilter, SyncState, TagSnapshot, TaskSnapshot};

/// Which per-kind store owns an identifier, discovered by probing
/// (tombstone dispatch).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerKind {
    Task,
    Area,
    Tag,
    ChecklistItem,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn sync_state(&self) -> Result<Option<SyncState>>;
    async fn save_sync_state(&self, state: &SyncState) -> Result<()>;

    async fn get_task(&self, id: &EntityId) -> Result<Option<TaskSnapshot>>;
    async fn save_task(&self, task: &TaskSnapshot) -> Result<()>;
    async fn soft_delete_task(&self, id: &EntityId) -> Result<Option<TaskSnapshot>>;

    async fn get_area(&self, id: &EntityId) -> Result<Option<AreaSnapshot>>;
    async fn save_area(&self, area: &AreaSnapshot) -> Result<()>;
    async fn soft_delete_area(&self, id: &EntityId) -> Result<Option<AreaSnapshot>>;

    async fn get_tag(&self, id: &EntityId) -> Result<Option<TagSnapshot>>;
    async fn save_tag(&self, tag: &TagSnapshot) -> Result<()>;
    async fn soft_delete_tag(&self, id: &EntityId) -> Result<Option<TagSnapshot>>;

    async fn get_checklist_item(&self, id: &EntityId) -> Result<Option<ChecklistItemSnapshot>>;
    async fn save_checklist_item(&self, item: &ChecklistItemSnapshot) -> Result<()>;
    async fn soft_delete_checklist_item(&self, id: &EntityId) -> Result<Option<ChecklistItemSnapshot>>;

    /// Probes each per-kind store in turn for `id`, returning the first one
    /// that owns it. A miss (no store owns it) is `Ok(None)`, not an error —
    /// the tombstone is a no-op.
    async fn probe_owner(&self, id: &EntityId) -> Result<Option<OwnerKind>>;

    async fn append_change(&self, record: &ChangeLogRecord) -> Result<()>;
    async fn changes_since_time(&self, since: DateTime<Utc>) -> Result<Vec<ChangeLogRecord>>;
    async fn changes_since_index(&self, since: u64) -> Result<Vec<ChangeLogRecord>>;
    async fn changes_for_entity(&self, id: &EntityId) -> Result<Vec<ChangeLogRecord>>;

    async fn all_tasks(&self, filter: QueryFilter) -> Result<Vec<TaskSnapshot>>;
    async fn all_areas(&self) -> Result<Vec<AreaSnapshot>>;
    async fn all_tags(&self) -> Result<Vec<TagSnapshot>>;
    async fn tasks_in_project(&self, project_id: &EntityId, filter: QueryFilter) -> Result<Vec<TaskSnapshot>>;
    async fn tasks_in_area(&self, area_id: &EntityId, filter: QueryFilter) -> Result<Vec<TaskSnapshot>>;
    async fn checklist_items_of_task(&self, task_id: &EntityId, filter: QueryFilter) -> Result<Vec<ChecklistItemSnapshot>>;
}
