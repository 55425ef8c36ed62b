use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use things_client::{EventsPage, HistoryClient};
use things_core::{Change, ChangeMeta, Cursor, EntityId, Error, Result, StreamPosition};
use things_wire::{
    Action, AreaPayload, ChecklistItemPayload, EntityKind, EventRecord, TagPayload, TaskPayload,
    TombstonePayload,
};
use tracing::{debug, info, instrument, warn};

use crate::project;
use crate::snapshot::ChangeLogRecord;
use crate::store::{OwnerKind, Store};
use crate::{detect, snapshot::SyncState};

/// What the sync driver needs from a history transport. [`HistoryClient`]
/// implements this directly; tests inject a stub instead of making network
/// calls.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Resolves the account's own sync stream, creating one if none exists.
    async fn resolve_own_stream(&self) -> Result<EntityId>;
    async fn read_events(&self, stream_id: &EntityId, start_index: u64) -> Result<EventsPage>;
}

#[async_trait]
impl EventSource for HistoryClient {
    async fn resolve_own_stream(&self) -> Result<EntityId> {
        let streams = self.list_streams().await?;
        match streams.into_iter().next() {
            Some(id) => Ok(EntityId::from(id)),
            None => Ok(EntityId::from(self.create_stream().await?)),
        }
    }

    async fn read_events(&self, stream_id: &EntityId, start_index: u64) -> Result<EventsPage> {
        HistoryClient::read_events(self, stream_id.as_str(), start_index).await
    }
}

/// Orchestrates one `sync()` call: resolve the stream, load the cursor,
/// page events, route each to its projector and detector, persist, and
/// advance the cursor. One entry point, `sync()`, returns the ordered
/// change list.
pub struct SyncDriver<S: EventSource> {
    source: S,
    store: Arc<dyn Store>,
    stream_id: tokio::sync::Mutex<Option<EntityId>>,
}

impl<S: EventSource> SyncDriver<S> {
    pub fn new(source: S, store: Arc<dyn Store>) -> SyncDriver<S> {
        SyncDriver { source, store, stream_id: tokio::sync::Mutex::new(None) }
    }

    /// Runs one sync pass end to end and returns the ordered list of detected
    /// changes. Any error in the paging loop aborts the whole sync without
    /// advancing the cursor — partial writes already performed are retained,
    /// since each event's projection is idempotent and will simply be
    /// reprocessed next time.
    #[instrument(skip(self))]
    pub async fn sync(&self) -> Result<Vec<Change>> {
        let stream_id = self.resolve_stream().await?;

        let stored = self.store.sync_state().await?;
        let cursor = match stored {
            Some(state) => Cursor::new(state.stream_id, StreamPosition(state.server_index))
                .resume_for(&stream_id),
            None => Cursor::new(stream_id.clone(), StreamPosition::ZERO),
        };

        let mut index = cursor.index.get();
        let gate_index = cursor.index.get();
        let mut accumulated = Vec::new();
        let mut latest = index;

        loop {
            debug!(stream = %stream_id, start_index = index, "reading history page");
            let page = self.source.read_events(&stream_id, index).await?;
            latest = page.latest_server_index;

            for (offset, event) in page.events.iter().enumerate() {
                let event_index = index + offset as u64;
                let changes = self.process_event(event, event_index).await?;
                // Only log changes for events past the cursor we started this
                // sync from, so replaying an already-consumed prefix writes
                // no spurious change-log rows.
                if event_index >= gate_index {
                    for change in &changes {
                        self.store
                            .append_change(&ChangeLogRecord {
                                server_index: change.meta().server_index,
                                synced_at: change.meta().at,
                                change_type: change.type_name().to_string(),
                                entity_type: entity_type_of(change).to_string(),
                                entity_id: change.entity_id().clone(),
                            })
                            .await?;
                    }
                }
                accumulated.extend(changes);
            }

            index = page.loaded_index;
            if !page.has_more {
                break;
            }
        }

        self.store
            .save_sync_state(&SyncState { stream_id, server_index: latest, last_sync_at: Some(Utc::now()) })
            .await?;

        info!(changes = accumulated.len(), server_index = latest, "sync complete");
        Ok(accumulated)
    }

    async fn resolve_stream(&self) -> Result<EntityId> {
        let mut guard = self.stream_id.lock().await;
        if let Some(id) = guard.as_ref() {
            return Ok(id.clone());
        }
        let id = self.source.resolve_own_stream().await?;
        *guard = Some(id.clone());
        Ok(id)
    }

    async fn process_event(&self, event: &EventRecord, server_index: u64) -> Result<Vec<Change>> {
        let meta = ChangeMeta { server_index, at: Utc::now() };
        match &event.kind {
            EntityKind::Task => self.process_task(event, meta).await,
            EntityKind::Area => self.process_area(event, meta).await,
            EntityKind::Tag => self.process_tag(event, meta).await,
            EntityKind::ChecklistItem => self.process_checklist_item(event, meta).await,
            EntityKind::Tombstone => self.process_tombstone(event, meta).await,
            EntityKind::Settings => Ok(Vec::new()),
            EntityKind::Unknown(tag) => {
                warn!(id = %event.id, kind = %tag, "unrecognized entity-kind tag");
                Ok(vec![Change::Unknown { id: event.id.clone(), kind: tag.clone(), meta }])
            }
        }
    }

    async fn process_task(&self, event: &EventRecord, meta: ChangeMeta) -> Result<Vec<Change>> {
        if matches!(event.action, Action::Deleted) {
            let prior = self.store.soft_delete_task(&event.id).await?;
            return Ok(detect::detect_task_changes(prior.as_ref(), None, meta));
        }
        let payload: TaskPayload = decode(event)?;
        let prior = self.store.get_task(&event.id).await?;
        let next = project::project_task(prior.clone(), &event.id, &payload);
        self.store.save_task(&next).await?;
        Ok(detect::detect_task_changes(prior.as_ref(), Some(&next), meta))
    }

    async fn process_area(&self, event: &EventRecord, meta: ChangeMeta) -> Result<Vec<Change>> {
        if matches!(event.action, Action::Deleted) {
            let prior = self.store.soft_delete_area(&event.id).await?;
            return Ok(detect::detect_area_changes(prior.as_ref(), None, meta));
        }
        let payload: AreaPayload = decode(event)?;
        let prior = self.store.get_area(&event.id).await?;
        let next = project::project_area(prior.clone(), &event.id, &payload);
        self.store.save_area(&next).await?;
        Ok(detect::detect_area_changes(prior.as_ref(), Some(&next), meta))
    }

    async fn process_tag(&self, event: &EventRecord, meta: ChangeMeta) -> Result<Vec<Change>> {
        if matches!(event.action, Action::Deleted) {
            let prior = self.store.soft_delete_tag(&event.id).await?;
            return Ok(detect::detect_tag_changes(prior.as_ref(), None, meta));
        }
        let payload: TagPayload = decode(event)?;
        let prior = self.store.get_tag(&event.id).await?;
        let next = project::project_tag(prior.clone(), &event.id, &payload);
        self.store.save_tag(&next).await?;
        Ok(detect::detect_tag_changes(prior.as_ref(), Some(&next), meta))
    }

    async fn process_checklist_item(&self, event: &EventRecord, meta: ChangeMeta) -> Result<Vec<Change>> {
        if matches!(event.action, Action::Deleted) {
            let prior = self.store.soft_delete_checklist_item(&event.id).await?;
            return Ok(detect::detect_checklist_changes(prior.as_ref(), None, meta));
        }
        let payload: ChecklistItemPayload = decode(event)?;
        let prior = self.store.get_checklist_item(&event.id).await?;
        let next = project::project_checklist_item(prior.clone(), &event.id, &payload);
        self.store.save_checklist_item(&next).await?;
        Ok(detect::detect_checklist_changes(prior.as_ref(), Some(&next), meta))
    }

    /// Probes each entity store in turn for the tombstoned identifier. A
    /// miss — already deleted, or never synced — is a no-op, not an error.
    async fn process_tombstone(&self, event: &EventRecord, meta: ChangeMeta) -> Result<Vec<Change>> {
        let payload: TombstonePayload = decode(event)?;
        let target = project::tombstone_target(&payload).clone();

        match self.store.probe_owner(&target).await? {
            Some(OwnerKind::Task) => {
                let prior = self.store.soft_delete_task(&target).await?;
                Ok(detect::detect_task_changes(prior.as_ref(), None, meta))
            }
            Some(OwnerKind::Area) => {
                let prior = self.store.soft_delete_area(&target).await?;
                Ok(detect::detect_area_changes(prior.as_ref(), None, meta))
            }
            Some(OwnerKind::Tag) => {
                let prior = self.store.soft_delete_tag(&target).await?;
                Ok(detect::detect_tag_changes(prior.as_ref(), None, meta))
            }
            Some(OwnerKind::ChecklistItem) => {
                let prior = self.store.soft_delete_checklist_item(&target).await?;
                Ok(detect::detect_checklist_changes(prior.as_ref(), None, meta))
            }
            None => {
                debug!(id = %target, "tombstone for an identifier no store owns; no-op");
                Ok(Vec::new())
            }
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(event: &EventRecord) -> Result<T> {
    serde_json::from_value(event.payload.clone()).map_err(|err| Error::Decode {
        event_id: event.id.clone(),
        kind: format!("{:?}", event.kind),
        message: err.to_string(),
    })
}

/// Which store owns the entity a change concerns (the `change_log.entity_type`
/// column). Derived from the change itself, not the triggering event's wire
/// kind — a tombstone's event kind is `Tombstone`, but the entity it deleted
/// is a task, area, tag, or checklist item.
fn entity_type_of(change: &Change) -> &'static str {
    match change {
        Change::TaskCreated { .. }
        | Change::ProjectCreated { .. }
        | Change::HeadingCreated { .. }
        | Change::TaskDeleted { .. }
        | Change::ProjectDeleted { .. }
        | Change::HeadingDeleted { .. }
        | Change::TaskTitleChanged { .. }
        | Change::ProjectTitleChanged { .. }
        | Change::HeadingTitleChanged { .. }
        | Change::TaskNoteChanged { .. }
        | Change::TaskCompleted { .. }
        | Change::ProjectCompleted { .. }
        | Change::TaskCanceled { .. }
        | Change::TaskUncompleted { .. }
        | Change::TaskTrashed { .. }
        | Change::ProjectTrashed { .. }
        | Change::TaskRestored { .. }
        | Change::ProjectRestored { .. }
        | Change::TaskMovedTo { .. }
        | Change::TaskDeadlineChanged { .. }
        | Change::TaskTagsChanged { .. } => "task",
        Change::AreaCreated { .. } | Change::AreaDeleted { .. } | Change::AreaRenamed { .. } => "area",
        Change::TagCreated { .. }
        | Change::TagDeleted { .. }
        | Change::TagRenamed { .. }
        | Change::TagShortcutChanged { .. } => "tag",
        Change::ChecklistItemCreated { .. }
        | Change::ChecklistItemDeleted { .. }
        | Change::ChecklistItemTitleChanged { .. }
        | Change::ChecklistItemCompleted { .. }
        | Change::ChecklistItemUncompleted { .. } => "checklist_item",
        Change::Unknown { .. } => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    /// Stubbed history transport: pre-programmed pages, served one at a
    /// time.
    struct FakeSource {
        pages: StdMutex<Vec<(Vec<EventRecord>, u64)>>,
    }

    impl FakeSource {
        fn new(pages: Vec<(Vec<EventRecord>, u64)>) -> FakeSource {
            FakeSource { pages: StdMutex::new(pages) }
        }
    }

    #[async_trait]
    impl EventSource for FakeSource {
        async fn resolve_own_stream(&self) -> Result<EntityId> {
            Ok(EntityId::from("stream-1"))
        }

        async fn read_events(&self, _stream_id: &EntityId, start_index: u64) -> Result<EventsPage> {
            let mut pages = self.pages.lock().unwrap();
            if pages.is_empty() {
                return Ok(EventsPage { events: vec![], loaded_index: start_index, latest_server_index: start_index, has_more: false });
            }
            let (events, latest_server_index) = pages.remove(0);
            let loaded_index = start_index + events.len() as u64;
            Ok(EventsPage { events, loaded_index, latest_server_index, has_more: loaded_index < latest_server_index })
        }
    }

    fn task_event(id: &str, action: Action, payload: serde_json::Value) -> EventRecord {
        EventRecord { id: EntityId::from(id), kind: EntityKind::Task, action, payload }
    }

    #[tokio::test]
    async fn scenario_1_create_a_task() {
        let source = FakeSource::new(vec![(
            vec![task_event("t1", Action::Created, json!({"tt": "Buy milk", "tp": 0}))],
            1,
        )]);
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let driver = SyncDriver::new(source, store.clone());

        let changes = driver.sync().await.unwrap();
        assert_eq!(changes.len(), 1);
        assert!(matches!(&changes[0], Change::TaskCreated { title, .. } if title == "Buy milk"));

        let task = store.get_task(&EntityId::from("t1")).await.unwrap().unwrap();
        assert_eq!(task.status, things_wire::Status::Pending);
        assert_eq!(task.schedule, things_wire::Schedule::Anytime);

        let state = store.sync_state().await.unwrap().unwrap();
        assert_eq!(state.server_index, 1);
    }

    #[tokio::test]
    async fn scenario_2_complete_a_task() {
        let source = FakeSource::new(vec![
            (vec![task_event("t1", Action::Created, json!({"tt": "Buy milk", "tp": 0}))], 1),
        ]);
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        SyncDriver::new(source, store.clone()).sync().await.unwrap();

        let source2 = FakeSource::new(vec![(vec![task_event("t1", Action::Modified, json!({"ss": 3}))], 2)]);
        let changes = SyncDriver::new(source2, store.clone()).sync().await.unwrap();

        assert_eq!(changes.len(), 1);
        assert!(matches!(&changes[0], Change::TaskCompleted { .. }));
        let task = store.get_task(&EntityId::from("t1")).await.unwrap().unwrap();
        assert_eq!(task.status, things_wire::Status::Completed);
    }

    #[tokio::test]
    async fn scenario_4_tombstone_deletes_the_owning_entity() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let source = FakeSource::new(vec![(
            vec![task_event("t1", Action::Created, json!({"tt": "Buy milk", "tp": 0}))],
            1,
        )]);
        SyncDriver::new(source, store.clone()).sync().await.unwrap();

        let tomb = EventRecord {
            id: EntityId::from("tomb1"),
            kind: EntityKind::Tombstone,
            action: Action::Created,
            payload: json!({"dloid": "t1", "dld": 1_700_000_000}),
        };
        let source2 = FakeSource::new(vec![(vec![tomb], 2)]);
        let changes = SyncDriver::new(source2, store.clone()).sync().await.unwrap();

        assert_eq!(changes.len(), 1);
        assert!(matches!(&changes[0], Change::TaskDeleted { .. }));
        assert_eq!(store.get_task(&EntityId::from("t1")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn tombstone_for_unknown_identifier_is_a_no_op() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let tomb = EventRecord {
            id: EntityId::from("tomb1"),
            kind: EntityKind::Tombstone,
            action: Action::Created,
            payload: json!({"dloid": "missing", "dld": 1_700_000_000}),
        };
        let source = FakeSource::new(vec![(vec![tomb], 1)]);
        let changes = SyncDriver::new(source, store).sync().await.unwrap();
        assert!(changes.is_empty());
    }

    #[tokio::test]
    async fn scenario_6_pagination_requests_the_next_page_with_loaded_not_latest() {
        // Page A: 1 event, current-item-index=2. Page B: 1 event, current-item-index=2.
        // Regression: the driver must request page B with start-index=1, not 2.
        let source = FakeSource::new(vec![
            (vec![task_event("t1", Action::Created, json!({"tt": "A", "tp": 0}))], 2),
            (vec![task_event("t2", Action::Created, json!({"tt": "B", "tp": 0}))], 2),
        ]);
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let changes = SyncDriver::new(source, store.clone()).sync().await.unwrap();

        assert_eq!(changes.len(), 2);
        assert_eq!(store.sync_state().await.unwrap().unwrap().server_index, 2);
    }

    #[tokio::test]
    async fn replaying_an_already_consumed_prefix_writes_no_spurious_change_log_rows() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let source = FakeSource::new(vec![(
            vec![task_event("t1", Action::Created, json!({"tt": "Buy milk", "tp": 0}))],
            1,
        )]);
        SyncDriver::new(source, store.clone()).sync().await.unwrap();
        assert_eq!(store.changes_since_index(0).await.unwrap().len(), 1);

        // A second sync that replays the same prefix (server hasn't advanced)
        // must not append another change-log row.
        let source2 = FakeSource::new(vec![(
            vec![task_event("t1", Action::Created, json!({"tt": "Buy milk", "tp": 0}))],
            1,
        )]);
        SyncDriver::new(source2, store.clone()).sync().await.unwrap();
        assert_eq!(store.changes_since_index(0).await.unwrap().len(), 1);
    }
}
