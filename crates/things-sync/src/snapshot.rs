use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use things_core::EntityId;
use things_wire::{Schedule, Status, TaskType};

/// A task/project/heading snapshot. `task_type` distinguishes the three
/// product-level kinds on one flat struct rather than three separate types
/// or a sum type — tests don't depend on this choice.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSnapshot {
    pub id: EntityId,
    pub task_type: TaskType,
    pub title: String,
    pub note: Option<String>,
    pub status: Status,
    pub schedule: Schedule,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub deadline_date: Option<DateTime<Utc>>,
    pub completion_date: Option<DateTime<Utc>>,
    pub creation_date: Option<DateTime<Utc>>,
    pub modification_date: Option<DateTime<Utc>>,
    pub index: i64,
    pub today_index: i64,
    pub in_trash: bool,
    pub area_id: Option<EntityId>,
    pub project_id: Option<EntityId>,
    pub heading_id: Option<EntityId>,
    pub alarm_time_offset: Option<i64>,
    pub tag_ids: BTreeSet<EntityId>,
    pub recurrence_template_ids: BTreeSet<EntityId>,
    pub delegate_ids: BTreeSet<EntityId>,
}

impl TaskSnapshot {
    /// A fresh task with every default the projector falls back to when
    /// there's no prior snapshot: schedule=anytime, type=task, status=pending,
    /// in-trash=false.
    pub fn zero(id: EntityId) -> TaskSnapshot {
        TaskSnapshot {
            id,
            task_type: TaskType::Task,
            title: String::new(),
            note: None,
            status: Status::Pending,
            schedule: Schedule::Anytime,
            scheduled_date: None,
            deadline_date: None,
            completion_date: None,
            creation_date: None,
            modification_date: None,
            index: 0,
            today_index: 0,
            in_trash: false,
            area_id: None,
            project_id: None,
            heading_id: None,
            alarm_time_offset: None,
            tag_ids: BTreeSet::new(),
            recurrence_template_ids: BTreeSet::new(),
            delegate_ids: BTreeSet::new(),
        }
    }
}

/// An area snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaSnapshot {
    pub id: EntityId,
    pub title: String,
    pub index: i64,
}

impl AreaSnapshot {
    pub fn zero(id: EntityId) -> AreaSnapshot {
        AreaSnapshot { id, title: String::new(), index: 0 }
    }
}

/// A tag snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct TagSnapshot {
    pub id: EntityId,
    pub title: String,
    pub shortcut: Option<String>,
    pub parent_tag_id: Option<EntityId>,
}

impl TagSnapshot {
    pub fn zero(id: EntityId) -> TagSnapshot {
        TagSnapshot { id, title: String::new(), shortcut: None, parent_tag_id: None }
    }
}

/// A checklist item snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ChecklistItemSnapshot {
    pub id: EntityId,
    pub title: String,
    pub status: Status,
    pub index: i64,
    pub creation_date: Option<DateTime<Utc>>,
    pub completion_date: Option<DateTime<Utc>>,
    pub parent_task_id: Option<EntityId>,
}

impl ChecklistItemSnapshot {
    pub fn zero(id: EntityId) -> ChecklistItemSnapshot {
        ChecklistItemSnapshot {
            id,
            title: String::new(),
            status: Status::Pending,
            index: 0,
            creation_date: None,
            completion_date: None,
            parent_task_id: None,
        }
    }
}

/// The sync cursor, persisted across process restarts.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncState {
    pub stream_id: EntityId,
    pub server_index: u64,
    pub last_sync_at: Option<DateTime<Utc>>,
}

/// One change-log row. Only the summary is stored, not the full typed
/// diff — callers who need the complete change must re-derive it from the
/// snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeLogRecord {
    pub server_index: u64,
    pub synced_at: DateTime<Utc>,
    pub change_type: String,
    pub entity_type: String,
    pub entity_id: EntityId,
}

/// Filter applied to every query-surface read. Both fields
/// default to excluding the given class of task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryFilter {
    pub include_completed: bool,
    pub include_trashed: bool,
}

impl QueryFilter {
    pub fn matches_task(&self, task: &TaskSnapshot) -> bool {
        if !self.include_completed && matches!(task.status, Status::Completed) {
            return false;
        }
        if !self.include_trashed && task.in_trash {
            return false;
        }
        true
    }

    pub fn matches_checklist_item(&self, item: &ChecklistItemSnapshot) -> bool {
        if !self.include_completed && matches!(item.status, Status::Completed) {
            return false;
        }
        true
    }
}
