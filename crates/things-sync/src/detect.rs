use chrono::{DateTime, Utc};
use things_core::{Change, ChangeMeta, Location};
use things_wire::{Schedule, Status, TaskType};

use crate::snapshot::{AreaSnapshot, ChecklistItemSnapshot, TagSnapshot, TaskSnapshot};

/// A task's derived position, purely a function of `(schedule,
/// scheduled_date, now)` — no hidden clock read, so equal inputs always
/// yield equal outputs.
pub fn location(schedule: Schedule, scheduled_date: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Location {
    match schedule {
        Schedule::Inbox => Location::Inbox,
        Schedule::Anytime => match scheduled_date {
            Some(date) if date.date_naive() == now.date_naive() => Location::Today,
            _ => Location::Anytime,
        },
        Schedule::Someday => match scheduled_date {
            Some(date) if date > now => Location::Upcoming,
            _ => Location::Someday,
        },
    }
}

/// Compares prior and next task snapshots and emits changes in a
/// deterministic order: title, note, status, trash, schedule, deadline,
/// tags.
pub fn detect_task_changes(
    prior: Option<&TaskSnapshot>,
    next: Option<&TaskSnapshot>,
    meta: ChangeMeta,
) -> Vec<Change> {
    match (prior, next) {
        (None, None) => Vec::new(),
        (None, Some(next)) => vec![created_change(next, meta)],
        (Some(prior), None) => vec![deleted_change(prior, meta)],
        (Some(prior), Some(next)) => changed_changes(prior, next, meta),
    }
}

fn created_change(next: &TaskSnapshot, meta: ChangeMeta) -> Change {
    let id = next.id.clone();
    let title = next.title.clone();
    match next.task_type {
        TaskType::Task => Change::TaskCreated { id, title, meta },
        TaskType::Project => Change::ProjectCreated { id, title, meta },
        TaskType::Heading => Change::HeadingCreated { id, title, meta },
    }
}

fn deleted_change(prior: &TaskSnapshot, meta: ChangeMeta) -> Change {
    let id = prior.id.clone();
    match prior.task_type {
        TaskType::Task => Change::TaskDeleted { id, meta },
        TaskType::Project => Change::ProjectDeleted { id, meta },
        TaskType::Heading => Change::HeadingDeleted { id, meta },
    }
}

fn changed_changes(prior: &TaskSnapshot, next: &TaskSnapshot, meta: ChangeMeta) -> Vec<Change> {
    let mut changes = Vec::new();
    let id = next.id.clone();

    if prior.title != next.title {
        let old_title = prior.title.clone();
        changes.push(match next.task_type {
            TaskType::Task => Change::TaskTitleChanged { id: id.clone(), old_title, meta },
            TaskType::Project => Change::ProjectTitleChanged { id: id.clone(), old_title, meta },
            TaskType::Heading => Change::HeadingTitleChanged { id: id.clone(), old_title, meta },
        });
    }

    if !matches!(next.task_type, TaskType::Heading) && prior.note != next.note {
        changes.push(Change::TaskNoteChanged {
            id: id.clone(),
            old_note: prior.note.clone(),
            meta,
        });
    }

    match (prior.status, next.status) {
        (old, Status::Completed) if old != Status::Completed => {
            changes.push(match next.task_type {
                TaskType::Project => Change::ProjectCompleted { id: id.clone(), meta },
                _ => Change::TaskCompleted { id: id.clone(), meta },
            });
        }
        (old, Status::Canceled) if old != Status::Canceled => {
            changes.push(Change::TaskCanceled { id: id.clone(), meta });
        }
        (Status::Completed, Status::Pending) => {
            changes.push(Change::TaskUncompleted { id: id.clone(), meta });
        }
        _ => {}
    }

    if !prior.in_trash && next.in_trash {
        match next.task_type {
            TaskType::Project => changes.push(Change::ProjectTrashed { id: id.clone(), meta }),
            TaskType::Task => changes.push(Change::TaskTrashed { id: id.clone(), meta }),
            TaskType::Heading => {}
        }
    } else if prior.in_trash && !next.in_trash {
        match next.task_type {
            TaskType::Project => changes.push(Change::ProjectRestored { id: id.clone(), meta }),
            TaskType::Task => changes.push(Change::TaskRestored { id: id.clone(), meta }),
            TaskType::Heading => {}
        }
    }

    if matches!(next.task_type, TaskType::Task) {
        let from = location(prior.schedule, prior.scheduled_date, meta.at);
        let to = location(next.schedule, next.scheduled_date, meta.at);
        if from != to {
            changes.push(Change::TaskMovedTo { id: id.clone(), to, from, meta });
        }
    }

    if prior.deadline_date != next.deadline_date {
        changes.push(Change::TaskDeadlineChanged {
            id: id.clone(),
            old_deadline: prior.deadline_date,
            meta,
        });
    }

    if prior.tag_ids != next.tag_ids {
        let added = next.tag_ids.difference(&prior.tag_ids).cloned().collect::<Vec<_>>();
        let removed = prior.tag_ids.difference(&next.tag_ids).cloned().collect::<Vec<_>>();
        if !added.is_empty() || !removed.is_empty() {
            changes.push(Change::TaskTagsChanged { id, added, removed, meta });
        }
    }

    changes
}

/// Area detector: created / deleted / renamed.
pub fn detect_area_changes(prior: Option<&AreaSnapshot>, next: Option<&AreaSnapshot>, meta: ChangeMeta) -> Vec<Change> {
    match (prior, next) {
        (None, None) => vec![],
        (None, Some(next)) => vec![Change::AreaCreated { id: next.id.clone(), title: next.title.clone(), meta }],
        (Some(prior), None) => vec![Change::AreaDeleted { id: prior.id.clone(), meta }],
        (Some(prior), Some(next)) if prior.title != next.title => {
            vec![Change::AreaRenamed { id: next.id.clone(), old_title: prior.title.clone(), meta }]
        }
        (Some(_), Some(_)) => vec![],
    }
}

/// Tag detector: created / deleted / renamed / shortcut changed.
pub fn detect_tag_changes(prior: Option<&TagSnapshot>, next: Option<&TagSnapshot>, meta: ChangeMeta) -> Vec<Change> {
    match (prior, next) {
        (None, None) => vec![],
        (None, Some(next)) => vec![Change::TagCreated { id: next.id.clone(), title: next.title.clone(), meta }],
        (Some(prior), None) => vec![Change::TagDeleted { id: prior.id.clone(), meta }],
        (Some(prior), Some(next)) => {
            let mut changes = Vec::new();
            if prior.title != next.title {
                changes.push(Change::TagRenamed { id: next.id.clone(), old_title: prior.title.clone(), meta });
            }
            if prior.shortcut != next.shortcut {
                changes.push(Change::TagShortcutChanged {
                    id: next.id.clone(),
                    old_shortcut: prior.shortcut.clone(),
                    meta,
                });
            }
            changes
        }
    }
}

/// Checklist item detector. Creation and completion carry a
/// back-reference to the parent task if known.
pub fn detect_checklist_changes(
    prior: Option<&ChecklistItemSnapshot>,
    next: Option<&ChecklistItemSnapshot>,
    meta: ChangeMeta,
) -> Vec<Change> {
    match (prior, next) {
        (None, None) => vec![],
        (None, Some(next)) => vec![Change::ChecklistItemCreated {
            id: next.id.clone(),
            parent_task_id: next.parent_task_id.clone(),
            title: next.title.clone(),
            meta,
        }],
        (Some(prior), None) => vec![Change::ChecklistItemDeleted { id: prior.id.clone(), meta }],
        (Some(prior), Some(next)) => {
            let mut changes = Vec::new();
            if prior.title != next.title {
                changes.push(Change::ChecklistItemTitleChanged {
                    id: next.id.clone(),
                    old_title: prior.title.clone(),
                    meta,
                });
            }
            if prior.status != Status::Completed && next.status == Status::Completed {
                changes.push(Change::ChecklistItemCompleted {
                    id: next.id.clone(),
                    parent_task_id: next.parent_task_id.clone(),
                    meta,
                });
            } else if prior.status == Status::Completed && next.status == Status::Pending {
                changes.push(Change::ChecklistItemUncompleted { id: next.id.clone(), meta });
            }
            changes
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use things_core::EntityId;

    fn meta(server_index: u64, at: DateTime<Utc>) -> ChangeMeta {
        ChangeMeta { server_index, at }
    }

    #[test]
    fn location_is_pure_given_equal_inputs() {
        let now = Utc.with_ymd_and_hms(2026, 7, 27, 12, 0, 0).unwrap();
        let scheduled = Utc.with_ymd_and_hms(2026, 7, 27, 9, 0, 0).unwrap();
        assert_eq!(location(Schedule::Anytime, Some(scheduled), now), location(Schedule::Anytime, Some(scheduled), now));
        assert_eq!(location(Schedule::Anytime, Some(scheduled), now), Location::Today);
    }

    #[test]
    fn someday_with_future_date_is_upcoming() {
        let now = Utc.with_ymd_and_hms(2026, 7, 27, 12, 0, 0).unwrap();
        let future = Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap();
        assert_eq!(location(Schedule::Someday, Some(future), now), Location::Upcoming);
    }

    #[test]
    fn task_created_emits_one_change() {
        let snapshot = TaskSnapshot { title: "Buy milk".to_string(), ..TaskSnapshot::zero(EntityId::from("t1")) };
        let changes = detect_task_changes(None, Some(&snapshot), meta(0, Utc::now()));
        assert_eq!(changes.len(), 1);
        assert!(matches!(changes[0], Change::TaskCreated { .. }));
    }

    #[test]
    fn status_change_to_completed_emits_exactly_one_change() {
        let prior = TaskSnapshot::zero(EntityId::from("t1"));
        let next = TaskSnapshot { status: Status::Completed, ..prior.clone() };
        let changes = detect_task_changes(Some(&prior), Some(&next), meta(1, Utc::now()));
        assert_eq!(changes.len(), 1);
        assert!(matches!(changes[0], Change::TaskCompleted { .. }));
    }

    #[test]
    fn moving_to_today_emits_task_moved_to_with_from_inbox() {
        let now = Utc.with_ymd_and_hms(2026, 7, 27, 12, 0, 0).unwrap();
        let prior = TaskSnapshot { schedule: Schedule::Inbox, ..TaskSnapshot::zero(EntityId::from("t1")) };
        let next = TaskSnapshot {
            schedule: Schedule::Anytime,
            scheduled_date: Some(now),
            ..prior.clone()
        };
        let changes = detect_task_changes(Some(&prior), Some(&next), meta(2, now));
        assert_eq!(changes.len(), 1);
        match &changes[0] {
            Change::TaskMovedTo { to, from, .. } => {
                assert_eq!(*to, Location::Today);
                assert_eq!(*from, Location::Inbox);
            }
            other => panic!("expected TaskMovedTo, got {other:?}"),
        }
    }

    #[test]
    fn a_single_event_touching_title_status_and_trash_emits_three_ordered_changes() {
        let prior = TaskSnapshot::zero(EntityId::from("t1"));
        let next = TaskSnapshot {
            title: "Renamed".to_string(),
            status: Status::Completed,
            in_trash: true,
            ..prior.clone()
        };
        let changes = detect_task_changes(Some(&prior), Some(&next), meta(3, Utc::now()));
        assert_eq!(changes.len(), 3);
        assert!(matches!(changes[0], Change::TaskTitleChanged { .. }));
        assert!(matches!(changes[1], Change::TaskCompleted { .. }));
        assert!(matches!(changes[2], Change::TaskTrashed { .. }));
    }

    #[test]
    fn tag_diff_satisfies_the_set_algebra_property() {
        let mut prior = TaskSnapshot::zero(EntityId::from("t1"));
        prior.tag_ids.insert(EntityId::from("a"));
        prior.tag_ids.insert(EntityId::from("b"));
        let mut next = prior.clone();
        next.tag_ids.remove(&EntityId::from("a"));
        next.tag_ids.insert(EntityId::from("c"));

        let changes = detect_task_changes(Some(&prior), Some(&next), meta(4, Utc::now()));
        match &changes[0] {
            Change::TaskTagsChanged { added, removed, .. } => {
                assert_eq!(added, &vec![EntityId::from("c")]);
                assert_eq!(removed, &vec![EntityId::from("a")]);
            }
            other => panic!("expected TaskTagsChanged, got {other:?}"),
        }
    }

    #[test]
    fn nil_deadline_on_both_sides_is_not_a_change() {
        let prior = TaskSnapshot::zero(EntityId::from("t1"));
        let next = prior.clone();
        let changes = detect_task_changes(Some(&prior), Some(&next), meta(5, Utc::now()));
        assert!(changes.is_empty());
    }
}
