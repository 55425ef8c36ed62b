use serde::Deserialize;
use things_core::{EntityId, Field};

use crate::enums::{Schedule, Status, TaskType};
use crate::int_bool::IntBool;
use crate::timestamp::Timestamp;

/// A task/project/heading payload. Every field is a
/// [`Field`] so absent-vs-null-vs-present survives deserialization; the
/// projector (in `things-sync`) decides what each state means for the
/// snapshot.
///
/// Field codes below are the ones spelled out literally in the end-to-end
/// scenarios (`tt`, `tp`, `ss`, `st`, `sr`, `tir`, `nt`); the remainder
/// follow the same two/three-letter abbreviation convention and would need
/// confirming against live traffic before this codec is pointed at a real
/// account.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskPayload {
    #[serde(default, rename = "tt")]
    pub title: Field<String>,
    #[serde(default, rename = "tp")]
    pub task_type: Field<TaskType>,
    #[serde(default, rename = "nt")]
    pub note: Field<serde_json::Value>,
    #[serde(default, rename = "ss")]
    pub status: Field<Status>,
    #[serde(default, rename = "st")]
    pub schedule: Field<Schedule>,
    /// Scheduled-date synonym #1.
    #[serde(default, rename = "sr")]
    pub scheduled_date_sr: Field<Timestamp>,
    /// Scheduled-date synonym #2; either, if present, updates the scheduled
    /// date.
    #[serde(default, rename = "tir")]
    pub scheduled_date_tir: Field<Timestamp>,
    #[serde(default, rename = "dl")]
    pub deadline_date: Field<Timestamp>,
    #[serde(default, rename = "cld")]
    pub completion_date: Field<Timestamp>,
    #[serde(default, rename = "cd")]
    pub creation_date: Field<Timestamp>,
    #[serde(default, rename = "md")]
    pub modification_date: Field<Timestamp>,
    #[serde(default, rename = "ix")]
    pub index: Field<i64>,
    #[serde(default, rename = "tix")]
    pub today_index: Field<i64>,
    #[serde(default, rename = "tr")]
    pub in_trash: Field<IntBool>,
    #[serde(default, rename = "ar")]
    pub area_id: Field<EntityId>,
    #[serde(default, rename = "pr")]
    pub project_id: Field<EntityId>,
    #[serde(default, rename = "ag")]
    pub heading_id: Field<EntityId>,
    #[serde(default, rename = "ato")]
    pub alarm_time_offset: Field<i64>,
    #[serde(default, rename = "tg")]
    pub tag_ids: Field<Vec<EntityId>>,
    #[serde(default, rename = "rt")]
    pub recurrence_template_ids: Field<Vec<EntityId>>,
    #[serde(default, rename = "dg")]
    pub delegate_ids: Field<Vec<EntityId>>,
}

impl TaskPayload {
    /// Either synonym updates the scheduled date; `sr` wins if both are
    /// present in the same payload (the two are synonyms with no defined
    /// ordering, so any deterministic tie-break is faithful).
    pub fn scheduled_date(&self) -> &Field<Timestamp> {
        if !self.scheduled_date_sr.is_absent() {
            &self.scheduled_date_sr
        } else {
            &self.scheduled_date_tir
        }
    }
}

/// An area payload.
#[derive(Debug, Clone, Deserialize)]
pub struct AreaPayload {
    #[serde(default, rename = "tt")]
    pub title: Field<String>,
    #[serde(default, rename = "ix")]
    pub index: Field<i64>,
}

/// A tag payload.
#[derive(Debug, Clone, Deserialize)]
pub struct TagPayload {
    #[serde(default, rename = "tt")]
    pub title: Field<String>,
    #[serde(default, rename = "sh")]
    pub shortcut: Field<String>,
    #[serde(default, rename = "pr")]
    pub parent_tag_id: Field<EntityId>,
}

/// A checklist item payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ChecklistItemPayload {
    #[serde(default, rename = "tt")]
    pub title: Field<String>,
    #[serde(default, rename = "ss")]
    pub status: Field<Status>,
    #[serde(default, rename = "ix")]
    pub index: Field<i64>,
    #[serde(default, rename = "cd")]
    pub creation_date: Field<Timestamp>,
    #[serde(default, rename = "cld")]
    pub completion_date: Field<Timestamp>,
    #[serde(default, rename = "pr")]
    pub parent_task_id: Field<EntityId>,
}

/// A tombstone payload: directs the projector to mark whichever entity owns
/// `deleted_object_id` as deleted.
#[derive(Debug, Clone, Deserialize)]
pub struct TombstonePayload {
    #[serde(rename = "dloid")]
    pub deleted_object_id: EntityId,
    #[serde(default, rename = "dld")]
    pub deletion_date: Option<Timestamp>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn task_created_payload_parses_literal_scenario_fields() {
        let raw = json!({"tt": "Buy milk", "tp": 0});
        let payload: TaskPayload = serde_json::from_value(raw).unwrap();
        assert_eq!(payload.title, Field::Set("Buy milk".to_string()));
        assert_eq!(payload.task_type, Field::Set(TaskType::Task));
        assert!(payload.status.is_absent());
    }

    #[test]
    fn task_completed_payload_only_touches_status() {
        let raw = json!({"ss": 3});
        let payload: TaskPayload = serde_json::from_value(raw).unwrap();
        assert_eq!(payload.status, Field::Set(Status::Completed));
        assert!(payload.title.is_absent());
    }

    #[test]
    fn move_to_today_payload_sets_schedule_and_both_date_synonyms() {
        let raw = json!({"st": 1, "sr": 1_700_000_000, "tir": 1_700_000_000});
        let payload: TaskPayload = serde_json::from_value(raw).unwrap();
        assert_eq!(payload.schedule, Field::Set(Schedule::Anytime));
        assert!(matches!(payload.scheduled_date(), Field::Set(_)));
    }

    #[test]
    fn tombstone_payload_requires_deleted_object_id() {
        let raw = json!({"dloid": "t1", "dld": 1_700_000_000});
        let payload: TombstonePayload = serde_json::from_value(raw).unwrap();
        assert_eq!(payload.deleted_object_id, EntityId::from("t1"));
        assert!(payload.deletion_date.is_some());
    }

    #[test]
    fn absent_field_stays_absent_on_an_otherwise_populated_payload() {
        let raw = json!({"tt": "Renamed"});
        let payload: TaskPayload = serde_json::from_value(raw).unwrap();
        assert!(payload.note.is_absent());
        assert!(payload.deadline_date.is_absent());
    }
}
