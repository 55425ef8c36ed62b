use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use things_core::{EntityId, Result};
use tokio::sync::Mutex;

use crate::snapshot::{AreaSnapshot, ChangeLogRecord, ChecklistItemSnapshot, QueryFilter, SyncState, TagSnapshot, TaskSnapshot};

use super::{OwnerKind, Store};

struct Entry<T> {
    snapshot: T,
    deleted: bool,
}

#[derive(Default)]
struct Inner {
    sync_state: Option<SyncState>,
    tasks: HashMap<EntityId, Entry<TaskSnapshot>>,
    areas: HashMap<EntityId, Entry<AreaSnapshot>>,
    tags: HashMap<EntityId, Entry<TagSnapshot>>,
    checklist_items: HashMap<EntityId, Entry<ChecklistItemSnapshot>>,
    changes: Vec<ChangeLogRecord>,
}

/// The projection held in memory rather than a database, for callers that
/// don't need persistence. Shares the same projection and detection code as
/// the persistent store; only these storage calls differ. Not safe for
/// concurrent mutation across separate `sync()` calls beyond what the
/// internal mutex serializes.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn sync_state(&self) -> Result<Option<SyncState>> {
        Ok(self.inner.lock().await.sync_state.clone())
    }

    async fn save_sync_state(&self, state: &SyncState) -> Result<()> {
        self.inner.lock().await.sync_state = Some(state.clone());
        Ok(())
    }

    async fn get_task(&self, id: &EntityId) -> Result<Option<TaskSnapshot>> {
        let inner = self.inner.lock().await;
        Ok(inner.tasks.get(id).filter(|e| !e.deleted).map(|e| e.snapshot.clone()))
    }

    async fn save_task(&self, task: &TaskSnapshot) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.tasks.insert(task.id.clone(), Entry { snapshot: task.clone(), deleted: false });
        Ok(())
    }

    async fn soft_delete_task(&self, id: &EntityId) -> Result<Option<TaskSnapshot>> {
        let mut inner = self.inner.lock().await;
        match inner.tasks.get_mut(id) {
            Some(entry) if !entry.deleted => {
                let prior = entry.snapshot.clone();
                entry.deleted = true;
                Ok(Some(prior))
            }
            _ => Ok(None),
        }
    }

    async fn get_area(&self, id: &EntityId) -> Result<Option<AreaSnapshot>> {
        let inner = self.inner.lock().await;
        Ok(inner.areas.get(id).filter(|e| !e.deleted).map(|e| e.snapshot.clone()))
    }

    async fn save_area(&self, area: &AreaSnapshot) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.areas.insert(area.id.clone(), Entry { snapshot: area.clone(), deleted: false });
        Ok(())
    }

    async fn soft_delete_area(&self, id: &EntityId) -> Result<Option<AreaSnapshot>> {
        let mut inner = self.inner.lock().await;
        match inner.areas.get_mut(id) {
            Some(entry) if !entry.deleted => {
                let prior = entry.snapshot.clone();
                entry.deleted = true;
                Ok(Some(prior))
            }
            _ => Ok(None),
        }
    }

    async fn get_tag(&self, id: &EntityId) -> Result<Option<TagSnapshot>> {
        let inner = self.inner.lock().await;
        Ok(inner.tags.get(id).filter(|e| !e.deleted).map(|e| e.snapshot.clone()))
    }

    async fn save_tag(&self, tag: &TagSnapshot) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.tags.insert(tag.id.clone(), Entry { snapshot: tag.clone(), deleted: false });
        Ok(())
    }

    async fn soft_delete_tag(&self, id: &EntityId) -> Result<Option<TagSnapshot>> {
        let mut inner = self.inner.lock().await;
        match inner.tags.get_mut(id) {
            Some(entry) if !entry.deleted => {
                let prior = entry.snapshot.clone();
                entry.deleted = true;
                Ok(Some(prior))
            }
            _ => Ok(None),
        }
    }

    async fn get_checklist_item(&self, id: &EntityId) -> Result<Option<ChecklistItemSnapshot>> {
        let inner = self.inner.lock().await;
        Ok(inner.checklist_items.get(id).filter(|e| !e.deleted).map(|e| e.snapshot.clone()))
    }

    async fn save_checklist_item(&self, item: &ChecklistItemSnapshot) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.checklist_items.insert(item.id.clone(), Entry { snapshot: item.clone(), deleted: false });
        Ok(())
    }

    async fn soft_delete_checklist_item(&self, id: &EntityId) -> Result<Option<ChecklistItemSnapshot>> {
        let mut inner = self.inner.lock().await;
        match inner.checklist_items.get_mut(id) {
            Some(entry) if !entry.deleted => {
                let prior = entry.snapshot.clone();
                entry.deleted = true;
                Ok(Some(prior))
            }
            _ => Ok(None),
        }
    }

    async fn probe_owner(&self, id: &EntityId) -> Result<Option<OwnerKind>> {
        let inner = self.inner.lock().await;
        if inner.tasks.get(id).is_some_and(|e| !e.deleted) {
            return Ok(Some(OwnerKind::Task));
        }
        if inner.areas.get(id).is_some_and(|e| !e.deleted) {
            return Ok(Some(OwnerKind::Area));
        }
        if inner.tags.get(id).is_some_and(|e| !e.deleted) {
            return Ok(Some(OwnerKind::Tag));
        }
        if inner.checklist_items.get(id).is_some_and(|e| !e.deleted) {
            return Ok(Some(OwnerKind::ChecklistItem));
        }
        Ok(None)
    }

    async fn append_change(&self, record: &ChangeLogRecord) -> Result<()> {
        self.inner.lock().await.changes.push(record.clone());
        Ok(())
    }

    async fn changes_since_time(&self, since: DateTime<Utc>) -> Result<Vec<ChangeLogRecord>> {
        Ok(self.inner.lock().await.changes.iter().filter(|c| c.synced_at >= since).cloned().collect())
    }

    async fn changes_since_index(&self, since: u64) -> Result<Vec<ChangeLogRecord>> {
        Ok(self.inner.lock().await.changes.iter().filter(|c| c.server_index >= since).cloned().collect())
    }

    async fn changes_for_entity(&self, id: &EntityId) -> Result<Vec<ChangeLogRecord>> {
        Ok(self.inner.lock().await.changes.iter().filter(|c| &c.entity_id == id).cloned().collect())
    }

    async fn all_tasks(&self, filter: QueryFilter) -> Result<Vec<TaskSnapshot>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .tasks
            .values()
            .filter(|e| !e.deleted)
            .map(|e| &e.snapshot)
            .filter(|t| filter.matches_task(t))
            .cloned()
            .collect())
    }

    async fn all_areas(&self) -> Result<Vec<AreaSnapshot>> {
        let inner = self.inner.lock().await;
        Ok(inner.areas.values().filter(|e| !e.deleted).map(|e| e.snapshot.clone()).collect())
    }

    async fn all_tags(&self) -> Result<Vec<TagSnapshot>> {
        let inner = self.inner.lock().await;
        Ok(inner.tags.values().filter(|e| !e.deleted).map(|e| e.snapshot.clone()).collect())
    }

    async fn tasks_in_project(&self, project_id: &EntityId, filter: QueryFilter) -> Result<Vec<TaskSnapshot>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .tasks
            .values()
            .filter(|e| !e.deleted)
            .map(|e| &e.snapshot)
            .filter(|t| t.project_id.as_ref() == Some(project_id))
            .filter(|t| filter.matches_task(t))
            .cloned()
            .collect())
    }

    async fn tasks_in_area(&self, area_id: &EntityId, filter: QueryFilter) -> Result<Vec<TaskSnapshot>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .tasks
            .values()
            .filter(|e| !e.deleted)
            .map(|e| &e.snapshot)
            .filter(|t| t.area_id.as_ref() == Some(area_id))
            .filter(|t| filter.matches_task(t))
            .cloned()
            .collect())
    }

    async fn checklist_items_of_task(&self, task_id: &EntityId, filter: QueryFilter) -> Result<Vec<ChecklistItemSnapshot>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .checklist_items
            .values()
            .filter(|e| !e.deleted)
            .map(|e| &e.snapshot)
            .filter(|item| item.parent_task_id.as_ref() == Some(task_id))
            .filter(|item| filter.matches_checklist_item(item))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_get_round_trips_a_task() {
        let store = MemoryStore::new();
        let task = TaskSnapshot { title: "Buy milk".to_string(), ..TaskSnapshot::zero(EntityId::from("t1")) };
        store.save_task(&task).await.unwrap();
        let loaded = store.get_task(&EntityId::from("t1")).await.unwrap();
        assert_eq!(loaded, Some(task));
    }

    #[tokio::test]
    async fn soft_deleted_task_is_not_found_but_stays_deleted() {
        let store = MemoryStore::new();
        let task = TaskSnapshot::zero(EntityId::from("t1"));
        store.save_task(&task).await.unwrap();

        let prior = store.soft_delete_task(&EntityId::from("t1")).await.unwrap();
        assert!(prior.is_some());
        assert_eq!(store.get_task(&EntityId::from("t1")).await.unwrap(), None);

        // A second delete of the same id is a no-op, not an error.
        let second = store.soft_delete_task(&EntityId::from("t1")).await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn probe_owner_finds_the_right_kind_and_misses_cleanly() {
        let store = MemoryStore::new();
        store.save_area(&AreaSnapshot::zero(EntityId::from("a1"))).await.unwrap();

        assert_eq!(store.probe_owner(&EntityId::from("a1")).await.unwrap(), Some(OwnerKind::Area));
        assert_eq!(store.probe_owner(&EntityId::from("missing")).await.unwrap(), None);
    }
}
