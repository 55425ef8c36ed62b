use std::collections::BTreeSet;

use things_core::{EntityId, Field};
use things_wire::payloads::{AreaPayload, ChecklistItemPayload, TagPayload, TaskPayload};
use things_wire::TombstonePayload;

use crate::snapshot::{AreaSnapshot, ChecklistItemSnapshot, TagSnapshot, TaskSnapshot};

fn apply_set_field<T: Ord>(field: Field<Vec<T>>, prior: BTreeSet<T>) -> BTreeSet<T> {
    match field {
        Field::Absent => prior,
        Field::Clear => BTreeSet::new(),
        Field::Set(values) => values.into_iter().collect(),
    }
}

/// Folds one task payload onto a prior snapshot. Absent fields leave the
/// snapshot untouched; this is the only place that decides what each
/// [`Field`] state means for a task.
pub fn project_task(prior: Option<TaskSnapshot>, id: &EntityId, payload: &TaskPayload) -> TaskSnapshot {
    let mut next = prior.unwrap_or_else(|| TaskSnapshot::zero(id.clone()));

    next.title = payload.title.clone().apply_required(next.title);
    next.task_type = payload.task_type.clone().apply_required(next.task_type);
    next.note = things_wire::note::apply_note_field(payload.note.clone(), next.note);
    next.status = payload.status.clone().apply_required(next.status);
    next.schedule = payload.schedule.clone().apply_required(next.schedule);
    next.scheduled_date = payload
        .scheduled_date()
        .clone()
        .map(|ts| ts.0)
        .apply(next.scheduled_date);
    next.deadline_date = payload.deadline_date.clone().map(|ts| ts.0).apply(next.deadline_date);
    next.completion_date = payload.completion_date.clone().map(|ts| ts.0).apply(next.completion_date);
    next.creation_date = payload.creation_date.clone().map(|ts| ts.0).apply(next.creation_date);
    next.modification_date = payload
        .modification_date
        .clone()
        .map(|ts| ts.0)
        .apply(next.modification_date);
    next.index = payload.index.clone().apply_required(next.index);
    next.today_index = payload.today_index.clone().apply_required(next.today_index);
    next.in_trash = payload.in_trash.clone().map(|b| b.get()).apply_required(next.in_trash);
    next.area_id = payload.area_id.clone().apply(next.area_id);
    next.project_id = payload.project_id.clone().apply(next.project_id);
    next.heading_id = payload.heading_id.clone().apply(next.heading_id);
    next.alarm_time_offset = payload.alarm_time_offset.clone().apply(next.alarm_time_offset);
    next.tag_ids = apply_set_field(payload.tag_ids.clone(), next.tag_ids);
    next.recurrence_template_ids = apply_set_field(payload.recurrence_template_ids.clone(), next.recurrence_template_ids);
    next.delegate_ids = apply_set_field(payload.delegate_ids.clone(), next.delegate_ids);

    next
}

/// Folds one area payload onto a prior snapshot.
pub fn project_area(prior: Option<AreaSnapshot>, id: &EntityId, payload: &AreaPayload) -> AreaSnapshot {
    let mut next = prior.unwrap_or_else(|| AreaSnapshot::zero(id.clone()));
    next.title = payload.title.clone().apply_required(next.title);
    next.index = payload.index.clone().apply_required(next.index);
    next
}

/// Folds one tag payload onto a prior snapshot.
pub fn project_tag(prior: Option<TagSnapshot>, id: &EntityId, payload: &TagPayload) -> TagSnapshot {
    let mut next = prior.unwrap_or_else(|| TagSnapshot::zero(id.clone()));
    next.title = payload.title.clone().apply_required(next.title);
    next.shortcut = payload.shortcut.clone().apply(next.shortcut);
    next.parent_tag_id = payload.parent_tag_id.clone().apply(next.parent_tag_id);
    next
}

/// Folds one checklist item payload onto a prior snapshot.
pub fn project_checklist_item(
    prior: Option<ChecklistItemSnapshot>,
    id: &EntityId,
    payload: &ChecklistItemPayload,
) -> ChecklistItemSnapshot {
    let mut next = prior.unwrap_or_else(|| ChecklistItemSnapshot::zero(id.clone()));
    next.title = payload.title.clone().apply_required(next.title);
    next.status = payload.status.clone().apply_required(next.status);
    next.index = payload.index.clone().apply_required(next.index);
    next.creation_date = payload.creation_date.clone().map(|ts| ts.0).apply(next.creation_date);
    next.completion_date = payload.completion_date.clone().map(|ts| ts.0).apply(next.completion_date);
    next.parent_task_id = payload.parent_task_id.clone().apply(next.parent_task_id);
    next
}

/// The identifier a tombstone names for deletion. Which store actually
/// owns it is discovered by probing, not carried here.
pub fn tombstone_target(payload: &TombstonePayload) -> &EntityId {
    &payload.deleted_object_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn creating_a_task_from_scratch_uses_defaults_for_absent_fields() {
        let payload: TaskPayload = serde_json::from_value(json!({"tt": "Buy milk", "tp": 0})).unwrap();
        let snapshot = project_task(None, &EntityId::from("t1"), &payload);
        assert_eq!(snapshot.title, "Buy milk");
        assert_eq!(snapshot.schedule, things_wire::Schedule::Anytime);
        assert_eq!(snapshot.status, things_wire::Status::Pending);
        assert!(!snapshot.in_trash);
    }

    #[test]
    fn modify_payload_touching_only_status_leaves_other_fields_untouched() {
        let created: TaskPayload = serde_json::from_value(json!({"tt": "Buy milk", "tp": 0})).unwrap();
        let snapshot = project_task(None, &EntityId::from("t1"), &created);

        let modified: TaskPayload = serde_json::from_value(json!({"ss": 3})).unwrap();
        let next = project_task(Some(snapshot), &EntityId::from("t1"), &modified);

        assert_eq!(next.title, "Buy milk");
        assert_eq!(next.status, things_wire::Status::Completed);
    }

    #[test]
    fn either_scheduled_date_synonym_updates_the_scheduled_date() {
        let payload: TaskPayload =
            serde_json::from_value(json!({"st": 1, "sr": 1_700_000_000, "tir": 1_700_000_000})).unwrap();
        let snapshot = project_task(None, &EntityId::from("t1"), &payload);
        assert!(snapshot.scheduled_date.is_some());
    }

    #[test]
    fn explicit_null_tag_ids_clears_the_set() {
        let created: TaskPayload = serde_json::from_value(json!({"tg": ["tag1", "tag2"]})).unwrap();
        let snapshot = project_task(None, &EntityId::from("t1"), &created);
        assert_eq!(snapshot.tag_ids.len(), 2);

        let cleared: TaskPayload = serde_json::from_value(json!({"tg": null})).unwrap();
        let next = project_task(Some(snapshot), &EntityId::from("t1"), &cleared);
        assert!(next.tag_ids.is_empty());
    }
}
