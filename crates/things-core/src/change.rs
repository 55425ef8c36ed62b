use crate::ids::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A task's derived position, computed purely from `(schedule, scheduled_date,
/// now)`. Equal inputs always yield equal outputs — this is a pure function
/// of its arguments, with no hidden clock read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Location {
    Inbox,
    Today,
    Anytime,
    Upcoming,
    Someday,
    Unknown,
}

/// Metadata every emitted change carries: the server index of the triggering
/// event, and a wall-clock timestamp of when the detector ran.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChangeMeta {
    pub server_index: u64,
    pub at: DateTime<Utc>,
}

/// A typed semantic change between two snapshots of one entity.
///
/// `TaskMovedTo` covers all five location transitions (`...Inbox`, `...Today`,
/// `...Anytime`, `...Someday`, `...Upcoming`) as one variant parameterized by
/// [`Location`] — a sum type over five otherwise-identical shapes would just
/// be the same data five times. A reader checks `to` for which one fired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Change {
    TaskCreated {
        id: EntityId,
        title: String,
        meta: ChangeMeta,
    },
    ProjectCreated {
        id: EntityId,
        title: String,
        meta: ChangeMeta,
    },
    HeadingCreated {
        id: EntityId,
        title: String,
        meta: ChangeMeta,
    },
    TaskDeleted {
        id: EntityId,
        meta: ChangeMeta,
    },
    ProjectDeleted {
        id: EntityId,
        meta: ChangeMeta,
    },
    HeadingDeleted {
        id: EntityId,
        meta: ChangeMeta,
    },
    TaskTitleChanged {
        id: EntityId,
        old_title: String,
        meta: ChangeMeta,
    },
    ProjectTitleChanged {
        id: EntityId,
        old_title: String,
        meta: ChangeMeta,
    },
    HeadingTitleChanged {
        id: EntityId,
        old_title: String,
        meta: ChangeMeta,
    },
    TaskNoteChanged {
        id: EntityId,
        old_note: Option<String>,
        meta: ChangeMeta,
    },
    TaskCompleted {
        id: EntityId,
        meta: ChangeMeta,
    },
    ProjectCompleted {
        id: EntityId,
        meta: ChangeMeta,
    },
    TaskCanceled {
        id: EntityId,
        meta: ChangeMeta,
    },
    TaskUncompleted {
        id: EntityId,
        meta: ChangeMeta,
    },
    TaskTrashed {
        id: EntityId,
        meta: ChangeMeta,
    },
    ProjectTrashed {
        id: EntityId,
        meta: ChangeMeta,
    },
    TaskRestored {
        id: EntityId,
        meta: ChangeMeta,
    },
    ProjectRestored {
        id: EntityId,
        meta: ChangeMeta,
    },
    TaskMovedTo {
        id: EntityId,
        to: Location,
        from: Location,
        meta: ChangeMeta,
    },
    TaskDeadlineChanged {
        id: EntityId,
        old_deadline: Option<DateTime<Utc>>,
        meta: ChangeMeta,
    },
    TaskTagsChanged {
        id: EntityId,
        added: Vec<EntityId>,
        removed: Vec<EntityId>,
        meta: ChangeMeta,
    },
    AreaCreated {
        id: EntityId,
        title: String,
        meta: ChangeMeta,
    },
    AreaDeleted {
        id: EntityId,
        meta: ChangeMeta,
    },
    AreaRenamed {
        id: EntityId,
        old_title: String,
        meta: ChangeMeta,
    },
    TagCreated {
        id: EntityId,
        title: String,
        meta: ChangeMeta,
    },
    TagDeleted {
        id: EntityId,
        meta: ChangeMeta,
    },
    TagRenamed {
        id: EntityId,
        old_title: String,
        meta: ChangeMeta,
    },
    TagShortcutChanged {
        id: EntityId,
        old_shortcut: Option<String>,
        meta: ChangeMeta,
    },
    ChecklistItemCreated {
        id: EntityId,
        parent_task_id: Option<EntityId>,
        title: String,
        meta: ChangeMeta,
    },
    ChecklistItemDeleted {
        id: EntityId,
        meta: ChangeMeta,
    },
    ChecklistItemTitleChanged {
        id: EntityId,
        old_title: String,
        meta: ChangeMeta,
    },
    ChecklistItemCompleted {
        id: EntityId,
        parent_task_id: Option<EntityId>,
        meta: ChangeMeta,
    },
    ChecklistItemUncompleted {
        id: EntityId,
        meta: ChangeMeta,
    },
    /// An event whose entity-kind tag wasn't recognized, or a change-log row
    /// whose full typed shape wasn't retained (the log stores only type +
    /// entity + index, not the diff).
    Unknown {
        id: EntityId,
        kind: String,
        meta: ChangeMeta,
    },
}

impl Change {
    /// The entity this change concerns.
    pub fn entity_id(&self) -> &EntityId {
        match self {
            Change::TaskCreated { id, .. }
            | Change::ProjectCreated { id, .. }
            | Change::HeadingCreated { id, .. }
            | Change::TaskDeleted { id, .. }
            | Change::ProjectDeleted { id, .. }
            | Change::HeadingDeleted { id, .. }
            | Change::TaskTitleChanged { id, .. }
            | Change::ProjectTitleChanged { id, .. }
            | Change::HeadingTitleChanged { id, .. }
            | Change::TaskNoteChanged { id, .. }
            | Change::TaskCompleted { id, .. }
            | Change::ProjectCompleted { id, .. }
            | Change::TaskCanceled { id, .. }
            | Change::TaskUncompleted { id, .. }
            | Change::TaskTrashed { id, .. }
            | Change::ProjectTrashed { id, .. }
            | Change::TaskRestored { id, .. }
            | Change::ProjectRestored { id, .. }
            | Change::TaskMovedTo { id, .. }
            | Change::TaskDeadlineChanged { id, .. }
            | Change::TaskTagsChanged { id, .. }
            | Change::AreaCreated { id, .. }
            | Change::AreaDeleted { id, .. }
            | Change::AreaRenamed { id, .. }
            | Change::TagCreated { id, .. }
            | Change::TagDeleted { id, .. }
            | Change::TagRenamed { id, .. }
            | Change::TagShortcutChanged { id, .. }
            | Change::ChecklistItemCreated { id, .. }
            | Change::ChecklistItemDeleted { id, .. }
            | Change::ChecklistItemTitleChanged { id, .. }
            | Change::ChecklistItemCompleted { id, .. }
            | Change::ChecklistItemUncompleted { id, .. }
            | Change::Unknown { id, .. } => id,
        }
    }

    pub fn meta(&self) -> ChangeMeta {
        match self {
            Change::TaskCreated { meta, .. }
            | Change::ProjectCreated { meta, .. }
            | Change::HeadingCreated { meta, .. }
            | Change::TaskDeleted { meta, .. }
            | Change::ProjectDeleted { meta, .. }
            | Change::HeadingDeleted { meta, .. }
            | Change::TaskTitleChanged { meta, .. }
            | Change::ProjectTitleChanged { meta, .. }
            | Change::HeadingTitleChanged { meta, .. }
            | Change::TaskNoteChanged { meta, .. }
            | Change::TaskCompleted { meta, .. }
            | Change::ProjectCompleted { meta, .. }
            | Change::TaskCanceled { meta, .. }
            | Change::TaskUncompleted { meta, .. }
            | Change::TaskTrashed { meta, .. }
            | Change::ProjectTrashed { meta, .. }
            | Change::TaskRestored { meta, .. }
            | Change::ProjectRestored { meta, .. }
            | Change::TaskMovedTo { meta, .. }
            | Change::TaskDeadlineChanged { meta, .. }
            | Change::TaskTagsChanged { meta, .. }
            | Change::AreaCreated { meta, .. }
            | Change::AreaDeleted { meta, .. }
            | Change::AreaRenamed { meta, .. }
            | Change::TagCreated { meta, .. }
            | Change::TagDeleted { meta, .. }
            | Change::TagRenamed { meta, .. }
            | Change::TagShortcutChanged { meta, .. }
            | Change::ChecklistItemCreated { meta, .. }
            | Change::ChecklistItemDeleted { meta, .. }
            | Change::ChecklistItemTitleChanged { meta, .. }
            | Change::ChecklistItemCompleted { meta, .. }
            | Change::ChecklistItemUncompleted { meta, .. }
            | Change::Unknown { meta, .. } => *meta,
        }
    }

    /// The stable type name used as `change_log.change_type` and for
    /// `Unknown`'s fallback reconstruction from a log row.
    pub fn type_name(&self) -> &'static str {
        match self {
            Change::TaskCreated { .. } => "TaskCreated",
            Change::ProjectCreated { .. } => "ProjectCreated",
            Change::HeadingCreated { .. } => "HeadingCreated",
            Change::TaskDeleted { .. } => "TaskDeleted",
            Change::ProjectDeleted { .. } => "ProjectDeleted",
            Change::HeadingDeleted { .. } => "HeadingDeleted",
            Change::TaskTitleChanged { .. } => "TaskTitleChanged",
            Change::ProjectTitleChanged { .. } => "ProjectTitleChanged",
            Change::HeadingTitleChanged { .. } => "HeadingTitleChanged",
            Change::TaskNoteChanged { .. } => "TaskNoteChanged",
            Change::TaskCompleted { .. } => "TaskCompleted",
            Change::ProjectCompleted { .. } => "ProjectCompleted",
            Change::TaskCanceled { .. } => "TaskCanceled",
            Change::TaskUncompleted { .. } => "TaskUncompleted",
            Change::TaskTrashed { .. } => "TaskTrashed",
            Change::ProjectTrashed { .. } => "ProjectTrashed",
            Change::TaskRestored { .. } => "TaskRestored",
            Change::ProjectRestored { .. } => "ProjectRestored",
            Change::TaskMovedTo { to, .. } => match to {
                Location::Inbox => "TaskMovedToInbox",
                Location::Today => "TaskMovedToToday",
                Location::Anytime => "TaskMovedToAnytime",
                Location::Upcoming => "TaskMovedToUpcoming",
                Location::Someday => "TaskMovedToSomeday",
                Location::Unknown => "TaskMovedToUnknown",
            },
            Change::TaskDeadlineChanged { .. } => "TaskDeadlineChanged",
            Change::TaskTagsChanged { .. } => "TaskTagsChanged",
            Change::AreaCreated { .. } => "AreaCreated",
            Change::AreaDeleted { .. } => "AreaDeleted",
            Change::AreaRenamed { .. } => "AreaRenamed",
            Change::TagCreated { .. } => "TagCreated",
            Change::TagDeleted { .. } => "TagDeleted",
            Change::TagRenamed { .. } => "TagRenamed",
            Change::TagShortcutChanged { .. } => "TagShortcutChanged",
            Change::ChecklistItemCreated { .. } => "ChecklistItemCreated",
            Change::ChecklistItemDeleted { .. } => "ChecklistItemDeleted",
            Change::ChecklistItemTitleChanged { .. } => "ChecklistItemTitleChanged",
            Change::ChecklistItemCompleted { .. } => "ChecklistItemCompleted",
            Change::ChecklistItemUncompleted { .. } => "ChecklistItemUncompleted",
            Change::Unknown { .. } => "Unknown",
        }
    }
}

/// What `ChangeKind` a detector pass matched, independent of the full typed
/// payload — used internally to keep detector dispatch tables simple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Task,
    Area,
    Tag,
    ChecklistItem,
    Unknown,
}
