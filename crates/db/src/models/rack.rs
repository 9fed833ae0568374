use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, QueryBuilder, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::listing::{Page, PageRequest, fetch_page, push_contains, push_eq};

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "rack_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RackStatus {
    #[default]
    Active,
    Planned,
    Reserved,
    Decommissioned,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Rack {
    pub id: Uuid,
    pub name: String,
    pub datacenter_id: Uuid, // Foreign key to a datacenter-level Site
    pub status: RackStatus,
    pub width: Option<i64>,
    pub height: i64, // total rack units
    pub space_used: i64,
    pub space_available: i64,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateRack {
    pub name: String,
    pub datacenter_id: Uuid,
    pub status: Option<RackStatus>,
    pub width: Option<i64>,
    pub height: i64,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateRack {
    pub status: Option<RackStatus>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub description: Option<String>,
}

/// List filters; text fields match case-insensitive substrings
#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct RackFilter {
    pub datacenter_id: Option<Uuid>,
    pub name: Option<String>,
    pub status: Option<RackStatus>,
    pub height: Option<i64>,
    pub description: Option<String>,
}

fn push_filter<'a>(qb: &mut QueryBuilder<'a, Sqlite>, filter: &'a RackFilter) {
    qb.push("FROM racks WHERE 1 = 1");
    push_eq(qb, "datacenter_id", filter.datacenter_id);
    push_contains(qb, "name", filter.name.as_deref());
    push_eq(qb, "status", filter.status);
    push_eq(qb, "height", filter.height);
    push_contains(qb, "description", filter.description.as_deref());
}

impl Rack {
    pub async fn create<'e, E>(executor: E, data: &CreateRack, id: Uuid) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let status = data.status.unwrap_or_default();
        sqlx::query_as::<_, Rack>(
            r#"INSERT INTO racks (id, name, datacenter_id, status, width, height, space_used, space_available, description)
               VALUES ($1, $2, $3, $4, $5, $6, 0, $6, $7)
               RETURNING id, name, datacenter_id, status, width, height, space_used, space_available, description, created_at, updated_at"#,
        )
        .bind(id)
        .bind(data.name.trim())
        .bind(data.datacenter_id)
        .bind(status)
        .bind(data.width)
        .bind(data.height)
        .bind(&data.description)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Rack>(
            r#"SELECT id, name, datacenter_id, status, width, height, space_used, space_available, description, created_at, updated_at
               FROM racks
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Case-insensitive lookup; rack names are unique regardless of case.
    pub async fn find_by_name<'e, E>(executor: E, name: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Rack>(
            r#"SELECT id, name, datacenter_id, status, width, height, space_used, space_available, description, created_at, updated_at
               FROM racks
               WHERE name = $1"#,
        )
        .bind(name.trim())
        .fetch_optional(executor)
        .await
    }

    pub async fn find_all<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Rack>(
            r#"SELECT id, name, datacenter_id, status, width, height, space_used, space_available, description, created_at, updated_at
               FROM racks
               ORDER BY name ASC"#,
        )
        .fetch_all(executor)
        .await
    }

    pub async fn find_page(
        pool: &SqlitePool,
        filter: &RackFilter,
        request: PageRequest,
    ) -> Result<Page<Self>, sqlx::Error> {
        fetch_page(
            pool,
            "SELECT id, name, datacenter_id, status, width, height, space_used, space_available, description, created_at, updated_at ",
            |qb| push_filter(qb, filter),
            "name ASC, id ASC",
            request,
        )
        .await
    }

    /// Racks whose name, status or description contains `term`, or whose
    /// height equals it.
    pub async fn search<'e, E>(executor: E, term: &str, limit: i64) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Rack>(
            r#"SELECT id, name, datacenter_id, status, width, height, space_used, space_available, description, created_at, updated_at
               FROM racks
               WHERE instr(lower(name), lower($1)) > 0
                  OR instr(status, lower($1)) > 0
                  OR instr(lower(COALESCE(description, '')), lower($1)) > 0
                  OR CAST(height AS TEXT) = $1
               ORDER BY name ASC
               LIMIT $2"#,
        )
        .bind(term)
        .bind(limit)
        .fetch_all(executor)
        .await
    }

    /// Applies the non-capacity fields of `data`; absent fields are kept.
    pub async fn update<'e, E>(executor: E, id: Uuid, data: &UpdateRack) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Rack>(
            r#"UPDATE racks
               SET status = COALESCE($2, status),
                   width = COALESCE($3, width),
                   height = COALESCE($4, height),
                   description = COALESCE($5, description),
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING id, name, datacenter_id, status, width, height, space_used, space_available, description, created_at, updated_at"#,
        )
        .bind(id)
        .bind(data.status)
        .bind(data.width)
        .bind(data.height)
        .bind(&data.description)
        .fetch_one(executor)
        .await
    }

    pub async fn set_capacity<'e, E>(
        executor: E,
        id: Uuid,
        space_used: i64,
        space_available: i64,
    ) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            "UPDATE racks SET space_used = $2, space_available = $3, updated_at = datetime('now', 'subsec') WHERE id = $1",
        )
        .bind(id)
        .bind(space_used)
        .bind(space_available)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM racks WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
