use std::sync::Arc;

use chrono::{DateTime, Utc};
use things_core::{EntityId, Result};
use things_wire::TaskType;
use tracing::instrument;

use crate::snapshot::{
    AreaSnapshot, ChangeLogRecord, ChecklistItemSnapshot, QueryFilter, TagSnapshot, TaskSnapshot,
};
use crate::store::Store;

/// The read-only surface over a [`Store`]: lookups by identifier, by
/// collection, by location, and by container, plus the change-log accessors
/// callers poll for "what changed". Holds no state of its own beyond the
/// store handle — every call is a direct read-through.
#[derive(Clone)]
pub struct Query {
    store: Arc<dyn Store>,
}

impl Query {
    pub fn new(store: Arc<dyn Store>) -> Query {
        Query { store }
    }

    #[instrument(skip(self))]
    pub async fn task(&self, id: &EntityId) -> Result<Option<TaskSnapshot>> {
        self.store.get_task(id).await
    }

    #[instrument(skip(self))]
    pub async fn area(&self, id: &EntityId) -> Result<Option<AreaSnapshot>> {
        self.store.get_area(id).await
    }

    #[instrument(skip(self))]
    pub async fn tag(&self, id: &EntityId) -> Result<Option<TagSnapshot>> {
        self.store.get_tag(id).await
    }

    #[instrument(skip(self))]
    pub async fn checklist_item(&self, id: &EntityId) -> Result<Option<ChecklistItemSnapshot>> {
        self.store.get_checklist_item(id).await
    }

    /// Every task matching `filter`, regardless of type.
    pub async fn all_tasks(&self, filter: QueryFilter) -> Result<Vec<TaskSnapshot>> {
        self.store.all_tasks(filter).await
    }

    /// Tasks narrowed to `task_type == Task` — the "plain task" collection
    /// distinct from projects and headings.
    pub async fn tasks(&self, filter: QueryFilter) -> Result<Vec<TaskSnapshot>> {
        let all = self.store.all_tasks(filter).await?;
        Ok(all.into_iter().filter(|t| t.task_type == TaskType::Task).collect())
    }

    /// Projects are tasks with `task_type == Project` — there is no separate
    /// project store, so this is a filter over the same table.
    pub async fn projects(&self, filter: QueryFilter) -> Result<Vec<TaskSnapshot>> {
        let all = self.store.all_tasks(filter).await?;
        Ok(all.into_iter().filter(|t| t.task_type == TaskType::Project).collect())
    }

    pub async fn all_areas(&self) -> Result<Vec<AreaSnapshot>> {
        self.store.all_areas().await
    }

    pub async fn all_tags(&self) -> Result<Vec<TagSnapshot>> {
        self.store.all_tags().await
    }

    /// Tasks scheduled in the inbox (`Location::Inbox`).
    pub async fn inbox(&self, filter: QueryFilter) -> Result<Vec<TaskSnapshot>> {
        let all = self.store.all_tasks(filter).await?;
        Ok(all
            .into_iter()
            .filter(|t| t.task_type == TaskType::Task && t.schedule == things_wire::Schedule::Inbox)
            .collect())
    }

    /// Tasks whose derived location is Today, computed at read time against
    /// `now` — the same purity property the change detector relies on.
    pub async fn today(&self, filter: QueryFilter, now: DateTime<Utc>) -> Result<Vec<TaskSnapshot>> {
        let all = self.store.all_tasks(filter).await?;
        Ok(all
            .into_iter()
            .filter(|t| {
                t.task_type == TaskType::Task
                    && matches!(
                        crate::detect::location(t.schedule, t.scheduled_date, now),
                        things_core::Location::Today
                    )
            })
            .collect())
    }

    pub async fn tasks_in_project(&self, project_id: &EntityId, filter: QueryFilter) -> Result<Vec<TaskSnapshot>> {
        self.store.tasks_in_project(project_id, filter).await
    }

    pub async fn tasks_in_area(&self, area_id: &EntityId, filter: QueryFilter) -> Result<Vec<TaskSnapshot>> {
        self.store.tasks_in_area(area_id, filter).await
    }

    pub async fn checklist_items_of_task(
        &self,
        task_id: &EntityId,
        filter: QueryFilter,
    ) -> Result<Vec<ChecklistItemSnapshot>> {
        self.store.checklist_items_of_task(task_id, filter).await
    }

    pub async fn changes_since_time(&self, since: DateTime<Utc>) -> Result<Vec<ChangeLogRecord>> {
        self.store.changes_since_time(since).await
    }

    pub async fn changes_since_index(&self, since: u64) -> Result<Vec<ChangeLogRecord>> {
        self.store.changes_since_index(since).await
    }

    pub async fn changes_for_entity(&self, id: &EntityId) -> Result<Vec<ChangeLogRecord>> {
        self.store.changes_for_entity(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::project_task;
    use crate::store::memory::MemoryStore;
    use chrono::TimeZone;
    use serde_json::json;
    use things_wire::TaskPayload;

    async fn seeded_store() -> Arc<dyn Store> {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let task: TaskPayload = serde_json::from_value(json!({"tt": "Buy milk", "tp": 0})).unwrap();
        let project: TaskPayload = serde_json::from_value(json!({"tt": "Launch", "tp": 1})).unwrap();
        store
            .save_task(&project_task(None, &EntityId::from("t1"), &task))
            .await
            .unwrap();
        store
            .save_task(&project_task(None, &EntityId::from("p1"), &project))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn tasks_excludes_projects_and_headings() {
        let query = Query::new(seeded_store().await);
        let tasks = query.tasks(QueryFilter::default()).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, EntityId::from("t1"));
    }

    #[tokio::test]
    async fn projects_is_the_complementary_filter() {
        let query = Query::new(seeded_store().await);
        let projects = query.projects(QueryFilter::default()).await.unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].id, EntityId::from("p1"));
    }

    #[tokio::test]
    async fn today_view_matches_the_detector_s_location_rule() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let now = Utc.with_ymd_and_hms(2026, 7, 27, 12, 0, 0).unwrap();
        let payload: TaskPayload =
            serde_json::from_value(json!({"tt": "Buy milk", "tp": 0, "st": 1, "sr": now.timestamp()})).unwrap();
        store
            .save_task(&project_task(None, &EntityId::from("t1"), &payload))
            .await
            .unwrap();

        let query = Query::new(store);
        let today = query.today(QueryFilter::default(), now).await.unwrap();
        assert_eq!(today.len(), 1);
    }

    #[tokio::test]
    async fn task_lookup_by_id_round_trips() {
        let query = Query::new(seeded_store().await);
        let found = query.task(&EntityId::from("t1")).await.unwrap();
        assert_eq!(found.unwrap().title, "Buy milk");
        assert!(query.task(&EntityId::from("missing")).await.unwrap().is_none());
    }
}
