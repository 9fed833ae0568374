use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, QueryBuilder, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::listing::{Page, PageRequest, fetch_page, push_eq};

/// Kind of inventory object a change refers to
#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display)]
#[sqlx(type_name = "change_entity", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChangeEntity {
    Site,
    Rack,
    Device,
}

/// What happened to the object
#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display)]
#[sqlx(type_name = "change_action", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChangeAction {
    Created,
    Updated,
    Deleted,
    Mounted,
    Moved,
    Unmounted,
}

/// One row of the inventory audit trail
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct ChangeLogEntry {
    pub id: Uuid,
    pub entity: ChangeEntity,
    pub entity_id: Uuid,
    pub entity_name: String,
    pub action: ChangeAction,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Audit trail filters. `entity_name` matches whole names case-insensitively;
/// `from` and `to` bound `created_at` inclusively.
#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct ChangeLogFilter {
    pub entity: Option<ChangeEntity>,
    pub action: Option<ChangeAction>,
    pub entity_name: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

fn push_filter<'a>(qb: &mut QueryBuilder<'a, Sqlite>, filter: &'a ChangeLogFilter) {
    qb.push("FROM change_log WHERE 1 = 1");
    push_eq(qb, "entity", filter.entity);
    push_eq(qb, "action", filter.action);
    if let Some(name) = filter.entity_name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        qb.push(" AND lower(entity_name) = lower(").push_bind(name).push(")");
    }
    if let Some(from) = filter.from {
        qb.push(" AND julianday(created_at) >= julianday(").push_bind(from).push(")");
    }
    if let Some(to) = filter.to {
        qb.push(" AND julianday(created_at) <= julianday(").push_bind(to).push(")");
    }
}

impl ChangeLogEntry {
    pub async fn create<'e, E>(
        executor: E,
        entity: ChangeEntity,
        entity_id: Uuid,
        entity_name: &str,
        action: ChangeAction,
        message: Option<String>,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let id = Uuid::new_v4();
        sqlx::query_as::<_, ChangeLogEntry>(
            r#"INSERT INTO change_log (id, entity, entity_id, entity_name, action, message)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, entity, entity_id, entity_name, action, message, created_at"#,
        )
        .bind(id)
        .bind(entity)
        .bind(entity_id)
        .bind(entity_name)
        .bind(action)
        .bind(message)
        .fetch_one(executor)
        .await
    }

    /// Newest first.
    pub async fn find_recent<'e, E>(executor: E, limit: i64) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, ChangeLogEntry>(
            r#"SELECT id, entity, entity_id, entity_name, action, message, created_at
            FROM change_log
            ORDER BY created_at DESC, rowid DESC
            LIMIT $1"#,
        )
        .bind(limit)
        .fetch_all(executor)
        .await
    }

    /// Filtered audit trail, newest first.
    pub async fn find_page(
        pool: &SqlitePool,
        filter: &ChangeLogFilter,
        request: PageRequest,
    ) -> Result<Page<Self>, sqlx::Error> {
        fetch_page(
            pool,
            "SELECT id, entity, entity_id, entity_name, action, message, created_at ",
            |qb| push_filter(qb, filter),
            "created_at DESC, rowid DESC",
            request,
        )
        .await
    }

    pub async fn find_by_entity<'e, E>(
        executor: E,
        entity: ChangeEntity,
        entity_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, ChangeLogEntry>(
            r#"SELECT id, entity, entity_id, entity_name, action, message, created_at
            FROM change_log
            WHERE entity = $1 AND entity_id = $2
            ORDER BY created_at DESC, rowid DESC"#,
        )
        .bind(entity)
        .bind(entity_id)
        .fetch_all(executor)
        .await
    }
}
