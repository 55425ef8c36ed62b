use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::{Row, Sqlite, Transaction, sqlite::SqlitePoolOptions, SqlitePool};
use things_core::{EntityId, Error, Result};
use things_wire::{Schedule, Status, TaskType};

use crate::snapshot::{
    AreaSnapshot, ChangeLogRecord, ChecklistItemSnapshot, QueryFilter, SyncState, TagSnapshot,
    TaskSnapshot,
};

use super::{OwnerKind, Store};

/// Forward-only migrations, applied inside one transaction per step. A
/// `schema_version` row tracks how far a database has gotten; opening a
/// store replays whichever steps it hasn't seen yet.
const MIGRATIONS: &[&str] = &[
    // Version 1: one table per entity snapshot, the singleton sync cursor,
    // the change log, plus the indexes the query surface needs at scale.
    r#"
    CREATE TABLE sync_state (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        history_id TEXT NOT NULL,
        server_index INTEGER NOT NULL,
        last_sync_at INTEGER
    );

    CREATE TABLE areas (
        uuid TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        idx INTEGER NOT NULL DEFAULT 0,
        deleted INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE tags (
        uuid TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        shortcut TEXT,
        parent_uuid TEXT,
        idx INTEGER NOT NULL DEFAULT 0,
        deleted INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE tasks (
        uuid TEXT PRIMARY KEY,
        type INTEGER NOT NULL,
        title TEXT NOT NULL,
        note TEXT,
        status INTEGER NOT NULL,
        schedule INTEGER NOT NULL,
        scheduled_date INTEGER,
        deadline_date INTEGER,
        completion_date INTEGER,
        creation_date INTEGER,
        modification_date INTEGER,
        idx INTEGER NOT NULL DEFAULT 0,
        today_index INTEGER NOT NULL DEFAULT 0,
        in_trash INTEGER NOT NULL DEFAULT 0,
        area_uuid TEXT,
        project_uuid TEXT,
        heading_uuid TEXT,
        alarm_time_offset INTEGER,
        recurrence_template_ids TEXT,
        delegate_ids TEXT,
        deleted INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE checklist_items (
        uuid TEXT PRIMARY KEY,
        task_uuid TEXT,
        title TEXT NOT NULL,
        status INTEGER NOT NULL,
        idx INTEGER NOT NULL DEFAULT 0,
        creation_date INTEGER,
        completion_date INTEGER,
        deleted INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE task_tags (
        task_uuid TEXT NOT NULL,
        tag_uuid TEXT NOT NULL,
        PRIMARY KEY (task_uuid, tag_uuid)
    );

    CREATE TABLE change_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        server_index INTEGER NOT NULL,
        synced_at INTEGER NOT NULL,
        change_type TEXT NOT NULL,
        entity_type TEXT NOT NULL,
        entity_uuid TEXT NOT NULL
    );

    CREATE INDEX idx_change_log_server_index ON change_log (server_index);
    CREATE INDEX idx_change_log_synced_at ON change_log (synced_at);
    CREATE INDEX idx_change_log_entity_uuid ON change_log (entity_uuid);
    CREATE INDEX idx_tasks_kind ON tasks (type, schedule, in_trash, deleted);
    CREATE INDEX idx_tasks_area ON tasks (area_uuid);
    CREATE INDEX idx_tasks_project ON tasks (project_uuid);
    CREATE INDEX idx_tasks_scheduled_date ON tasks (scheduled_date);
    CREATE INDEX idx_checklist_items_task ON checklist_items (task_uuid);
    "#,
];

fn to_unix(dt: Option<DateTime<Utc>>) -> Option<i64> {
    dt.map(|d| d.timestamp())
}

fn from_unix(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|s| Utc.timestamp_opt(s, 0).single())
}

fn store_err(err: sqlx::Error) -> Error {
    Error::Store(err.to_string())
}

/// The persistent store: one row per entity snapshot, the singleton sync
/// cursor, and the append-only change log. Soft deletion sets `deleted = 1`;
/// every read filters it out unless explicitly asked not to.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<SqliteStore> {
        let url = format!("sqlite:{}?mode=rwc", path.as_ref().display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .map_err(store_err)?;
        let store = SqliteStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn open_in_memory() -> Result<SqliteStore> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(store_err)?;
        let store = SqliteStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;

        let current: Option<i64> =
            sqlx::query_scalar("SELECT version FROM schema_version LIMIT 1")
                .fetch_optional(&mut *tx)
                .await
                .map_err(store_err)?;
        let mut version = current.unwrap_or(0) as usize;

        while version < MIGRATIONS.len() {
            sqlx::query(MIGRATIONS[version])
                .execute(&mut *tx)
                .await
                .map_err(store_err)?;
            version += 1;
        }

        if current.is_some() {
            sqlx::query("UPDATE schema_version SET version = ?")
                .bind(version as i64)
                .execute(&mut *tx)
                .await
                .map_err(store_err)?;
        } else {
            sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
                .bind(version as i64)
                .execute(&mut *tx)
                .await
                .map_err(store_err)?;
        }

        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    async fn tx(&self) -> Result<Transaction<'_, Sqlite>> {
        self.pool.begin().await.map_err(store_err)
    }
}

fn task_type_of(row: &sqlx::sqlite::SqliteRow) -> Result<TaskType> {
    let raw: i64 = row.try_get("type").map_err(store_err)?;
    TaskType::from_i64(raw).ok_or_else(|| Error::Store(format!("unrecognized task type {raw}")))
}

fn status_of(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<Status> {
    let raw: i64 = row.try_get(column).map_err(store_err)?;
    Status::from_i64(raw).ok_or_else(|| Error::Store(format!("unrecognized status {raw}")))
}

fn schedule_of(row: &sqlx::sqlite::SqliteRow) -> Result<Schedule> {
    let raw: i64 = row.try_get("schedule").map_err(store_err)?;
    Schedule::from_i64(raw).ok_or_else(|| Error::Store(format!("unrecognized schedule {raw}")))
}

async fn load_tag_ids(pool: &SqlitePool, task_uuid: &str) -> Result<BTreeSet<EntityId>> {
    let rows = sqlx::query("SELECT tag_uuid FROM task_tags WHERE task_uuid = ?")
        .bind(task_uuid)
        .fetch_all(pool)
        .await
        .map_err(store_err)?;
    Ok(rows
        .into_iter()
        .map(|row| EntityId::from(row.try_get::<String, _>("tag_uuid").unwrap()))
        .collect())
}

fn task_from_row(row: &sqlx::sqlite::SqliteRow, tag_ids: BTreeSet<EntityId>) -> Result<TaskSnapshot> {
    let get_opt_string = |col: &str| -> Result<Option<String>> { row.try_get(col).map_err(store_err) };
    let get_opt_id = |col: &str| -> Result<Option<EntityId>> {
        Ok(get_opt_string(col)?.map(EntityId::from))
    };
    let recurrence: Option<String> = get_opt_string("recurrence_template_ids")?;
    let delegates: Option<String> = get_opt_string("delegate_ids")?;
    let split_ids = |raw: Option<String>| -> BTreeSet<EntityId> {
        raw.map(|s| s.split(',').filter(|p| !p.is_empty()).map(EntityId::from).collect())
            .unwrap_or_default()
    };

    Ok(TaskSnapshot {
        id: EntityId::from(row.try_get::<String, _>("uuid").map_err(store_err)?),
        task_type: task_type_of(row)?,
        title: row.try_get("title").map_err(store_err)?,
        note: get_opt_string("note")?,
        status: status_of(row, "status")?,
        schedule: schedule_of(row)?,
        scheduled_date: from_unix(row.try_get("scheduled_date").map_err(store_err)?),
        deadline_date: from_unix(row.try_get("deadline_date").map_err(store_err)?),
        completion_date: from_unix(row.try_get("completion_date").map_err(store_err)?),
        creation_date: from_unix(row.try_get("creation_date").map_err(store_err)?),
        modification_date: from_unix(row.try_get("modification_date").map_err(store_err)?),
        index: row.try_get("idx").map_err(store_err)?,
        today_index: row.try_get("today_index").map_err(store_err)?,
        in_trash: row.try_get::<i64, _>("in_trash").map_err(store_err)? != 0,
        area_id: get_opt_id("area_uuid")?,
        project_id: get_opt_id("project_uuid")?,
        heading_id: get_opt_id("heading_uuid")?,
        alarm_time_offset: row.try_get("alarm_time_offset").map_err(store_err)?,
        tag_ids,
        recurrence_template_ids: split_ids(recurrence),
        delegate_ids: split_ids(delegates),
    })
}

fn join_ids(ids: &BTreeSet<EntityId>) -> String {
    ids.iter().map(EntityId::as_str).collect::<Vec<_>>().join(",")
}

#[async_trait]
impl Store for SqliteStore {
    async fn sync_state(&self) -> Result<Option<SyncState>> {
        let row = sqlx::query("SELECT history_id, server_index, last_sync_at FROM sync_state WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(match row {
            Some(row) => Some(SyncState {
                stream_id: EntityId::from(row.try_get::<String, _>("history_id").map_err(store_err)?),
                server_index: row.try_get::<i64, _>("server_index").map_err(store_err)? as u64,
                last_sync_at: from_unix(row.try_get("last_sync_at").map_err(store_err)?),
            }),
            None => None,
        })
    }

    async fn save_sync_state(&self, state: &SyncState) -> Result<()> {
        sqlx::query(
            "INSERT INTO sync_state (id, history_id, server_index, last_sync_at) VALUES (1, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET history_id = excluded.history_id,
                server_index = excluded.server_index, last_sync_at = excluded.last_sync_at",
        )
        .bind(state.stream_id.as_str())
        .bind(state.server_index as i64)
        .bind(to_unix(state.last_sync_at))
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn get_task(&self, id: &EntityId) -> Result<Option<TaskSnapshot>> {
        let row = sqlx::query("SELECT * FROM tasks WHERE uuid = ? AND deleted = 0")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        match row {
            Some(row) => {
                let tag_ids = load_tag_ids(&self.pool, id.as_str()).await?;
                Ok(Some(task_from_row(&row, tag_ids)?))
            }
            None => Ok(None),
        }
    }

    async fn save_task(&self, task: &TaskSnapshot) -> Result<()> {
        let mut tx = self.tx().await?;
        sqlx::query(
            "INSERT INTO tasks (uuid, type, title, note, status, schedule, scheduled_date,
                deadline_date, completion_date, creation_date, modification_date, idx,
                today_index, in_trash, area_uuid, project_uuid, heading_uuid,
                alarm_time_offset, recurrence_template_ids, delegate_ids, deleted)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0)
             ON CONFLICT(uuid) DO UPDATE SET
                type = excluded.type, title = excluded.title, note = excluded.note,
                status = excluded.status, schedule = excluded.schedule,
                scheduled_date = excluded.scheduled_date, deadline_date = excluded.deadline_date,
                completion_date = excluded.completion_date, creation_date = excluded.creation_date,
                modification_date = excluded.modification_date, idx = excluded.idx,
                today_index = excluded.today_index, in_trash = excluded.in_trash,
                area_uuid = excluded.area_uuid, project_uuid = excluded.project_uuid,
                heading_uuid = excluded.heading_uuid, alarm_time_offset = excluded.alarm_time_offset,
                recurrence_template_ids = excluded.recurrence_template_ids,
                delegate_ids = excluded.delegate_ids, deleted = 0",
        )
        .bind(task.id.as_str())
        .bind(task.task_type.as_i64())
        .bind(&task.title)
        .bind(&task.note)
        .bind(task.status.as_i64())
        .bind(task.schedule.as_i64())
        .bind(to_unix(task.scheduled_date))
        .bind(to_unix(task.deadline_date))
        .bind(to_unix(task.completion_date))
        .bind(to_unix(task.creation_date))
        .bind(to_unix(task.modification_date))
        .bind(task.index)
        .bind(task.today_index)
        .bind(task.in_trash as i64)
        .bind(task.area_id.as_ref().map(EntityId::as_str))
        .bind(task.project_id.as_ref().map(EntityId::as_str))
        .bind(task.heading_id.as_ref().map(EntityId::as_str))
        .bind(task.alarm_time_offset)
        .bind(join_ids(&task.recurrence_template_ids))
        .bind(join_ids(&task.delegate_ids))
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        // Tag membership is a junction table; save replaces the task's row set.
        sqlx::query("DELETE FROM task_tags WHERE task_uuid = ?")
            .bind(task.id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        for tag_id in &task.tag_ids {
            sqlx::query("INSERT INTO task_tags (task_uuid, tag_uuid) VALUES (?, ?)")
                .bind(task.id.as_str())
                .bind(tag_id.as_str())
                .execute(&mut *tx)
                .await
                .map_err(store_err)?;
        }

        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    async fn soft_delete_task(&self, id: &EntityId) -> Result<Option<TaskSnapshot>> {
        let prior = self.get_task(id).await?;
        if prior.is_some() {
            sqlx::query("UPDATE tasks SET deleted = 1 WHERE uuid = ?")
                .bind(id.as_str())
                .execute(&self.pool)
                .await
                .map_err(store_err)?;
        }
        Ok(prior)
    }

    async fn get_area(&self, id: &EntityId) -> Result<Option<AreaSnapshot>> {
        let row = sqlx::query("SELECT title, idx FROM areas WHERE uuid = ? AND deleted = 0")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(row.map(|row| AreaSnapshot {
            id: id.clone(),
            title: row.try_get("title").unwrap(),
            index: row.try_get("idx").unwrap(),
        }))
    }

    async fn save_area(&self, area: &AreaSnapshot) -> Result<()> {
        sqlx::query(
            "INSERT INTO areas (uuid, title, idx, deleted) VALUES (?, ?, ?, 0)
             ON CONFLICT(uuid) DO UPDATE SET title = excluded.title, idx = excluded.idx, deleted = 0",
        )
        .bind(area.id.as_str())
        .bind(&area.title)
        .bind(area.index)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn soft_delete_area(&self, id: &EntityId) -> Result<Option<AreaSnapshot>> {
        let prior = self.get_area(id).await?;
        if prior.is_some() {
            sqlx::query("UPDATE areas SET deleted = 1 WHERE uuid = ?")
                .bind(id.as_str())
                .execute(&self.pool)
                .await
                .map_err(store_err)?;
        }
        Ok(prior)
    }

    async fn get_tag(&self, id: &EntityId) -> Result<Option<TagSnapshot>> {
        let row = sqlx::query("SELECT title, shortcut, parent_uuid FROM tags WHERE uuid = ? AND deleted = 0")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(row.map(|row| TagSnapshot {
            id: id.clone(),
            title: row.try_get("title").unwrap(),
            shortcut: row.try_get("shortcut").unwrap(),
            parent_tag_id: row.try_get::<Option<String>, _>("parent_uuid").unwrap().map(EntityId::from),
        }))
    }

    async fn save_tag(&self, tag: &TagSnapshot) -> Result<()> {
        sqlx::query(
            "INSERT INTO tags (uuid, title, shortcut, parent_uuid, deleted) VALUES (?, ?, ?, ?, 0)
             ON CONFLICT(uuid) DO UPDATE SET title = excluded.title, shortcut = excluded.shortcut,
                parent_uuid = excluded.parent_uuid, deleted = 0",
        )
        .bind(tag.id.as_str())
        .bind(&tag.title)
        .bind(&tag.shortcut)
        .bind(tag.parent_tag_id.as_ref().map(EntityId::as_str))
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn soft_delete_tag(&self, id: &EntityId) -> Result<Option<TagSnapshot>> {
        let prior = self.get_tag(id).await?;
        if prior.is_some() {
            sqlx::query("UPDATE tags SET deleted = 1 WHERE uuid = ?")
                .bind(id.as_str())
                .execute(&self.pool)
                .await
                .map_err(store_err)?;
        }
        Ok(prior)
    }

    async fn get_checklist_item(&self, id: &EntityId) -> Result<Option<ChecklistItemSnapshot>> {
        let row = sqlx::query("SELECT * FROM checklist_items WHERE uuid = ? AND deleted = 0")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        match row {
            Some(row) => Ok(Some(ChecklistItemSnapshot {
                id: id.clone(),
                title: row.try_get("title").map_err(store_err)?,
                status: status_of(&row, "status")?,
                index: row.try_get("idx").map_err(store_err)?,
                creation_date: from_unix(row.try_get("creation_date").map_err(store_err)?),
                completion_date: from_unix(row.try_get("completion_date").map_err(store_err)?),
                parent_task_id: row
                    .try_get::<Option<String>, _>("task_uuid")
                    .map_err(store_err)?
                    .map(EntityId::from),
            })),
            None => Ok(None),
        }
    }

    async fn save_checklist_item(&self, item: &ChecklistItemSnapshot) -> Result<()> {
        sqlx::query(
            "INSERT INTO checklist_items (uuid, task_uuid, title, status, idx, creation_date,
                completion_date, deleted) VALUES (?, ?, ?, ?, ?, ?, ?, 0)
             ON CONFLICT(uuid) DO UPDATE SET task_uuid = excluded.task_uuid, title = excluded.title,
                status = excluded.status, idx = excluded.idx, creation_date = excluded.creation_date,
                completion_date = excluded.completion_date, deleted = 0",
        )
        .bind(item.id.as_str())
        .bind(item.parent_task_id.as_ref().map(EntityId::as_str))
        .bind(&item.title)
        .bind(item.status.as_i64())
        .bind(item.index)
        .bind(to_unix(item.creation_date))
        .bind(to_unix(item.completion_date))
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn soft_delete_checklist_item(&self, id: &EntityId) -> Result<Option<ChecklistItemSnapshot>> {
        let prior = self.get_checklist_item(id).await?;
        if prior.is_some() {
            sqlx::query("UPDATE checklist_items SET deleted = 1 WHERE uuid = ?")
                .bind(id.as_str())
                .execute(&self.pool)
                .await
                .map_err(store_err)?;
        }
        Ok(prior)
    }

    async fn probe_owner(&self, id: &EntityId) -> Result<Option<OwnerKind>> {
        // Tombstone dispatch probes each store in a fixed order, first hit
        // wins.
        if self.get_task(id).await?.is_some() {
            return Ok(Some(OwnerKind::Task));
        }
        if self.get_area(id).await?.is_some() {
            return Ok(Some(OwnerKind::Area));
        }
        if self.get_tag(id).await?.is_some() {
            return Ok(Some(OwnerKind::Tag));
        }
        if self.get_checklist_item(id).await?.is_some() {
            return Ok(Some(OwnerKind::ChecklistItem));
        }
        Ok(None)
    }

    async fn append_change(&self, record: &ChangeLogRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO change_log (server_index, synced_at, change_type, entity_type, entity_uuid)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(record.server_index as i64)
        .bind(record.synced_at.timestamp())
        .bind(&record.change_type)
        .bind(&record.entity_type)
        .bind(record.entity_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn changes_since_time(&self, since: DateTime<Utc>) -> Result<Vec<ChangeLogRecord>> {
        let rows = sqlx::query(
            "SELECT server_index, synced_at, change_type, entity_type, entity_uuid
             FROM change_log WHERE synced_at >= ? ORDER BY id ASC",
        )
        .bind(since.timestamp())
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows_to_records(rows)
    }

    async fn changes_since_index(&self, since: u64) -> Result<Vec<ChangeLogRecord>> {
        let rows = sqlx::query(
            "SELECT server_index, synced_at, change_type, entity_type, entity_uuid
             FROM change_log WHERE server_index >= ? ORDER BY id ASC",
        )
        .bind(since as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows_to_records(rows)
    }

    async fn changes_for_entity(&self, id: &EntityId) -> Result<Vec<ChangeLogRecord>> {
        let rows = sqlx::query(
            "SELECT server_index, synced_at, change_type, entity_type, entity_uuid
             FROM change_log WHERE entity_uuid = ? ORDER BY id ASC",
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows_to_records(rows)
    }

    async fn all_tasks(&self, filter: QueryFilter) -> Result<Vec<TaskSnapshot>> {
        let rows = sqlx::query("SELECT * FROM tasks WHERE deleted = 0")
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        let mut tasks = Vec::with_capacity(rows.len());
        for row in rows {
            let uuid: String = row.try_get("uuid").map_err(store_err)?;
            let tag_ids = load_tag_ids(&self.pool, &uuid).await?;
            let task = task_from_row(&row, tag_ids)?;
            if filter.matches_task(&task) {
                tasks.push(task);
            }
        }
        Ok(tasks)
    }

    async fn all_areas(&self) -> Result<Vec<AreaSnapshot>> {
        let rows = sqlx::query("SELECT uuid, title, idx FROM areas WHERE deleted = 0")
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(rows
            .into_iter()
            .map(|row| AreaSnapshot {
                id: EntityId::from(row.try_get::<String, _>("uuid").unwrap()),
                title: row.try_get("title").unwrap(),
                index: row.try_get("idx").unwrap(),
            })
            .collect())
    }

    async fn all_tags(&self) -> Result<Vec<TagSnapshot>> {
        let rows = sqlx::query("SELECT uuid, title, shortcut, parent_uuid FROM tags WHERE deleted = 0")
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(rows
            .into_iter()
            .map(|row| TagSnapshot {
                id: EntityId::from(row.try_get::<String, _>("uuid").unwrap()),
                title: row.try_get("title").unwrap(),
                shortcut: row.try_get("shortcut").unwrap(),
                parent_tag_id: row.try_get::<Option<String>, _>("parent_uuid").unwrap().map(EntityId::from),
            })
            .collect())
    }

    async fn tasks_in_project(&self, project_id: &EntityId, filter: QueryFilter) -> Result<Vec<TaskSnapshot>> {
        let rows = sqlx::query("SELECT * FROM tasks WHERE project_uuid = ? AND deleted = 0")
            .bind(project_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        let mut tasks = Vec::with_capacity(rows.len());
        for row in rows {
            let uuid: String = row.try_get("uuid").map_err(store_err)?;
            let tag_ids = load_tag_ids(&self.pool, &uuid).await?;
            let task = task_from_row(&row, tag_ids)?;
            if filter.matches_task(&task) {
                tasks.push(task);
            }
        }
        Ok(tasks)
    }

    async fn tasks_in_area(&self, area_id: &EntityId, filter: QueryFilter) -> Result<Vec<TaskSnapshot>> {
        let rows = sqlx::query("SELECT * FROM tasks WHERE area_uuid = ? AND deleted = 0")
            .bind(area_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        let mut tasks = Vec::with_capacity(rows.len());
        for row in rows {
            let uuid: String = row.try_get("uuid").map_err(store_err)?;
            let tag_ids = load_tag_ids(&self.pool, &uuid).await?;
            let task = task_from_row(&row, tag_ids)?;
            if filter.matches_task(&task) {
                tasks.push(task);
            }
        }
        Ok(tasks)
    }

    async fn checklist_items_of_task(&self, task_id: &EntityId, filter: QueryFilter) -> Result<Vec<ChecklistItemSnapshot>> {
        let rows = sqlx::query("SELECT * FROM checklist_items WHERE task_uuid = ? AND deleted = 0")
            .bind(task_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let item = ChecklistItemSnapshot {
                id: EntityId::from(row.try_get::<String, _>("uuid").map_err(store_err)?),
                title: row.try_get("title").map_err(store_err)?,
                status: status_of(&row, "status")?,
                index: row.try_get("idx").map_err(store_err)?,
                creation_date: from_unix(row.try_get("creation_date").map_err(store_err)?),
                completion_date: from_unix(row.try_get("completion_date").map_err(store_err)?),
                parent_task_id: row
                    .try_get::<Option<String>, _>("task_uuid")
                    .map_err(store_err)?
                    .map(EntityId::from),
            };
            if filter.matches_checklist_item(&item) {
                items.push(item);
            }
        }
        Ok(items)
    }
}

fn rows_to_records(rows: Vec<sqlx::sqlite::SqliteRow>) -> Result<Vec<ChangeLogRecord>> {
    rows.into_iter()
        .map(|row| {
            Ok(ChangeLogRecord {
                server_index: row.try_get::<i64, _>("server_index").map_err(store_err)? as u64,
                synced_at: from_unix(Some(row.try_get("synced_at").map_err(store_err)?))
                    .ok_or_else(|| Error::Store("change_log row had no synced_at".to_string()))?,
                change_type: row.try_get("change_type").map_err(store_err)?,
                entity_type: row.try_get("entity_type").map_err(store_err)?,
                entity_id: EntityId::from(row.try_get::<String, _>("entity_uuid").map_err(store_err)?),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_get_round_trips_a_task_through_sqlite() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let mut task = TaskSnapshot::zero(EntityId::from("t1"));
        task.title = "Buy milk".to_string();
        task.tag_ids.insert(EntityId::from("tag1"));
        store.save_task(&task).await.unwrap();

        let loaded = store.get_task(&EntityId::from("t1")).await.unwrap().unwrap();
        assert_eq!(loaded.title, "Buy milk");
        assert_eq!(loaded.tag_ids, task.tag_ids);
    }

    #[tokio::test]
    async fn soft_deleted_task_is_excluded_from_reads() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.save_task(&TaskSnapshot::zero(EntityId::from("t1"))).await.unwrap();
        store.soft_delete_task(&EntityId::from("t1")).await.unwrap();
        assert_eq!(store.get_task(&EntityId::from("t1")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn sync_state_round_trips_and_upserts() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let state = SyncState { stream_id: EntityId::from("s1"), server_index: 5, last_sync_at: None };
        store.save_sync_state(&state).await.unwrap();
        assert_eq!(store.sync_state().await.unwrap(), Some(state.clone()));

        let next = SyncState { server_index: 9, ..state };
        store.save_sync_state(&next).await.unwrap();
        assert_eq!(store.sync_state().await.unwrap().unwrap().server_index, 9);
    }

    #[tokio::test]
    async fn change_log_is_queryable_by_index_time_and_entity() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let record = ChangeLogRecord {
            server_index: 3,
            synced_at: Utc.timestamp_opt(1_700_000_000, 0).single().unwrap(),
            change_type: "TaskCreated".to_string(),
            entity_type: "task".to_string(),
            entity_id: EntityId::from("t1"),
        };
        store.append_change(&record).await.unwrap();

        assert_eq!(store.changes_since_index(0).await.unwrap().len(), 1);
        assert_eq!(store.changes_since_index(4).await.unwrap().len(), 0);
        assert_eq!(store.changes_for_entity(&EntityId::from("t1")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reopening_an_on_disk_database_keeps_its_data_and_skips_past_migrations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("things.sqlite");

        {
            let store = SqliteStore::open(&path).await.unwrap();
            store.save_task(&TaskSnapshot::zero(EntityId::from("t1"))).await.unwrap();
        }

        let reopened = SqliteStore::open(&path).await.unwrap();
        let task = reopened.get_task(&EntityId::from("t1")).await.unwrap();
        assert!(task.is_some());
    }

    #[tokio::test]
    async fn tag_save_replaces_the_task_tag_row_set() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let mut task = TaskSnapshot::zero(EntityId::from("t1"));
        task.tag_ids.insert(EntityId::from("a"));
        task.tag_ids.insert(EntityId::from("b"));
        store.save_task(&task).await.unwrap();

        task.tag_ids.remove(&EntityId::from("a"));
        task.tag_ids.insert(EntityId::from("c"));
        store.save_task(&task).await.unwrap();

        let loaded = store.get_task(&EntityId::from("t1")).await.unwrap().unwrap();
        assert_eq!(loaded.tag_ids, task.tag_ids);
    }
}
