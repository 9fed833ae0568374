use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, QueryBuilder, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::listing::{Page, PageRequest, fetch_page, push_contains, push_eq};

/// Level of a node in the location hierarchy, outermost first
#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, Hash, TS, EnumString, Display,
)]
#[sqlx(type_name = "site_level", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SiteLevel {
    Location,
    Building,
    Wing,
    Floor,
    /// Racks live directly under a datacenter
    Datacenter,
}

impl SiteLevel {
    pub const ALL: [SiteLevel; 5] = [
        SiteLevel::Location,
        SiteLevel::Building,
        SiteLevel::Wing,
        SiteLevel::Floor,
        SiteLevel::Datacenter,
    ];

    /// Level a node of this level must hang under. `None` for locations.
    pub fn parent(self) -> Option<SiteLevel> {
        match self {
            SiteLevel::Location => None,
            SiteLevel::Building => Some(SiteLevel::Location),
            SiteLevel::Wing => Some(SiteLevel::Building),
            SiteLevel::Floor => Some(SiteLevel::Wing),
            SiteLevel::Datacenter => Some(SiteLevel::Floor),
        }
    }

    pub fn child(self) -> Option<SiteLevel> {
        match self {
            SiteLevel::Location => Some(SiteLevel::Building),
            SiteLevel::Building => Some(SiteLevel::Wing),
            SiteLevel::Wing => Some(SiteLevel::Floor),
            SiteLevel::Floor => Some(SiteLevel::Datacenter),
            SiteLevel::Datacenter => None,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Site {
    pub id: Uuid,
    pub level: SiteLevel,
    pub name: String,
    pub parent_id: Option<Uuid>, // None only for locations
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateSite {
    pub level: SiteLevel,
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub description: Option<String>,
}

/// List filters; text fields match case-insensitive substrings
#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct SiteFilter {
    pub level: Option<SiteLevel>,
    pub parent_id: Option<Uuid>,
    pub name: Option<String>,
    pub description: Option<String>,
}

fn push_filter<'a>(qb: &mut QueryBuilder<'a, Sqlite>, filter: &'a SiteFilter) {
    qb.push("FROM sites WHERE 1 = 1");
    push_eq(qb, "level", filter.level);
    push_eq(qb, "parent_id", filter.parent_id);
    push_contains(qb, "name", filter.name.as_deref());
    push_contains(qb, "description", filter.description.as_deref());
}

impl Site {
    pub async fn create<'e, E>(executor: E, data: &CreateSite, id: Uuid) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Site>(
            r#"INSERT INTO sites (id, level, name, parent_id, description)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING id, level, name, parent_id, description, created_at, updated_at"#,
        )
        .bind(id)
        .bind(data.level)
        .bind(data.name.trim())
        .bind(data.parent_id)
        .bind(&data.description)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Site>(
            r#"SELECT id, level, name, parent_id, description, created_at, updated_at
               FROM sites
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn find_all<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Site>(
            r#"SELECT id, level, name, parent_id, description, created_at, updated_at
               FROM sites
               ORDER BY name COLLATE NOCASE ASC"#,
        )
        .fetch_all(executor)
        .await
    }

    pub async fn find_page(
        pool: &SqlitePool,
        filter: &SiteFilter,
        request: PageRequest,
    ) -> Result<Page<Self>, sqlx::Error> {
        fetch_page(
            pool,
            "SELECT id, level, name, parent_id, description, created_at, updated_at ",
            |qb| push_filter(qb, filter),
            "name COLLATE NOCASE ASC, id ASC",
            request,
        )
        .await
    }

    /// Sites whose name or description contains `term`, case-insensitively.
    pub async fn search<'e, E>(executor: E, term: &str, limit: i64) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Site>(
            r#"SELECT id, level, name, parent_id, description, created_at, updated_at
               FROM sites
               WHERE instr(lower(name), lower($1)) > 0
                  OR instr(lower(COALESCE(description, '')), lower($1)) > 0
               ORDER BY name COLLATE NOCASE ASC
               LIMIT $2"#,
        )
        .bind(term)
        .bind(limit)
        .fetch_all(executor)
        .await
    }

    /// Ids of every rack below `site_id`, the site itself included.
    pub async fn rack_ids_under<'e, E>(executor: E, site_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar::<_, Uuid>(
            r#"WITH RECURSIVE subtree(id) AS (
                   SELECT id FROM sites WHERE id = $1
                   UNION ALL
                   SELECT s.id FROM sites s JOIN subtree t ON s.parent_id = t.id
               )
               SELECT r.id
               FROM racks r
               JOIN subtree t ON r.datacenter_id = t.id"#,
        )
        .bind(site_id)
        .fetch_all(executor)
        .await
    }

    /// Deletes the site; children and their racks go with it.
    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM sites WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
