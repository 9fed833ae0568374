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
#[sqlx(type_name = "device_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeviceStatus {
    #[default]
    Active,
    Offline,
    Planned,
    Decommissioned,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Device {
    pub id: Uuid,
    pub name: String,
    pub serial_no: Option<String>,
    pub status: DeviceStatus,
    pub rack_id: Option<Uuid>,  // None while the device sits in stock
    pub position: Option<i64>, // bottom unit, set iff rack_id is set
    pub space_required: i64,   // height in rack units
    pub face_front: bool,
    pub face_rear: bool,
    pub color: Option<String>, // display hint for the rack elevation
    pub ip: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct CreateDevice {
    pub name: String,
    pub serial_no: Option<String>,
    pub status: Option<DeviceStatus>,
    pub rack_name: Option<String>,
    pub position: Option<i64>,
    pub space_required: Option<i64>,
    pub face_front: Option<bool>,
    pub face_rear: Option<bool>,
    pub color: Option<String>,
    pub ip: Option<String>,
    pub description: Option<String>,
}

/// Non-placement fields; placement changes go through their own operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateDevice {
    pub serial_no: Option<String>,
    pub status: Option<DeviceStatus>,
    pub face_front: Option<bool>,
    pub face_rear: Option<bool>,
    pub color: Option<String>,
    pub ip: Option<String>,
    pub description: Option<String>,
}

/// List filters; text fields match case-insensitive substrings
#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct DeviceFilter {
    pub rack_id: Option<Uuid>,
    pub mounted: Option<bool>,
    pub name: Option<String>,
    pub status: Option<DeviceStatus>,
    pub serial_no: Option<String>,
    pub ip: Option<String>,
    pub description: Option<String>,
}

fn push_filter<'a>(qb: &mut QueryBuilder<'a, Sqlite>, filter: &'a DeviceFilter) {
    qb.push("FROM devices WHERE 1 = 1");
    push_eq(qb, "rack_id", filter.rack_id);
    if let Some(mounted) = filter.mounted {
        qb.push(if mounted {
            " AND rack_id IS NOT NULL"
        } else {
            " AND rack_id IS NULL"
        });
    }
    push_contains(qb, "name", filter.name.as_deref());
    push_eq(qb, "status", filter.status);
    push_contains(qb, "serial_no", filter.serial_no.as_deref());
    push_contains(qb, "ip", filter.ip.as_deref());
    push_contains(qb, "description", filter.description.as_deref());
}

impl Device {
    /// Top unit occupied by the device, when mounted.
    pub fn top_position(&self) -> Option<i64> {
        self.position.map(|p| p + self.space_required - 1)
    }

    pub async fn create<'e, E>(
        executor: E,
        data: &CreateDevice,
        id: Uuid,
        rack_id: Option<Uuid>,
        space_required: i64,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let status = data.status.unwrap_or_default();
        let position = rack_id.and(data.position);
        sqlx::query_as::<_, Device>(
            r#"INSERT INTO devices (id, name, serial_no, status, rack_id, position, space_required, face_front, face_rear, color, ip, description)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
               RETURNING id, name, serial_no, status, rack_id, position, space_required, face_front, face_rear, color, ip, description, created_at, updated_at"#,
        )
        .bind(id)
        .bind(data.name.trim())
        .bind(&data.serial_no)
        .bind(status)
        .bind(rack_id)
        .bind(position)
        .bind(space_required)
        .bind(data.face_front.unwrap_or(true))
        .bind(data.face_rear.unwrap_or(false))
        .bind(&data.color)
        .bind(&data.ip)
        .bind(&data.description)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_name<'e, E>(executor: E, name: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Device>(
            r#"SELECT id, name, serial_no, status, rack_id, position, space_required, face_front, face_rear, color, ip, description, created_at, updated_at
               FROM devices
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
        sqlx::query_as::<_, Device>(
            r#"SELECT id, name, serial_no, status, rack_id, position, space_required, face_front, face_rear, color, ip, description, created_at, updated_at
               FROM devices
               ORDER BY name ASC"#,
        )
        .fetch_all(executor)
        .await
    }

    /// Devices mounted in a rack, bottom slot first.
    pub async fn find_by_rack<'e, E>(executor: E, rack_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Device>(
            r#"SELECT id, name, serial_no, status, rack_id, position, space_required, face_front, face_rear, color, ip, description, created_at, updated_at
               FROM devices
               WHERE rack_id = $1
               ORDER BY position ASC, name ASC"#,
        )
        .bind(rack_id)
        .fetch_all(executor)
        .await
    }

    pub async fn find_page(
        pool: &SqlitePool,
        filter: &DeviceFilter,
        request: PageRequest,
    ) -> Result<Page<Self>, sqlx::Error> {
        fetch_page(
            pool,
            "SELECT id, name, serial_no, status, rack_id, position, space_required, face_front, face_rear, color, ip, description, created_at, updated_at ",
            |qb| push_filter(qb, filter),
            "name ASC, id ASC",
            request,
        )
        .await
    }

    /// Devices matching `term` on their own text fields or the name of the
    /// rack they are mounted in; numbers also match positions.
    pub async fn search<'e, E>(executor: E, term: &str, limit: i64) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Device>(
            r#"SELECT d.id, d.name, d.serial_no, d.status, d.rack_id, d.position, d.space_required, d.face_front, d.face_rear, d.color, d.ip, d.description, d.created_at, d.updated_at
               FROM devices d
               LEFT JOIN racks r ON r.id = d.rack_id
               WHERE instr(lower(d.name), lower($1)) > 0
                  OR instr(lower(COALESCE(d.serial_no, '')), lower($1)) > 0
                  OR instr(lower(COALESCE(d.ip, '')), lower($1)) > 0
                  OR instr(d.status, lower($1)) > 0
                  OR instr(lower(COALESCE(d.description, '')), lower($1)) > 0
                  OR instr(lower(COALESCE(r.name, '')), lower($1)) > 0
                  OR CAST(d.position AS TEXT) = $1
               ORDER BY d.name ASC
               LIMIT $2"#,
        )
        .bind(term)
        .bind(limit)
        .fetch_all(executor)
        .await
    }

    pub async fn update<'e, E>(executor: E, id: Uuid, data: &UpdateDevice) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Device>(
            r#"UPDATE devices
               SET serial_no = COALESCE($2, serial_no),
                   status = COALESCE($3, status),
                   face_front = COALESCE($4, face_front),
                   face_rear = COALESCE($5, face_rear),
                   color = COALESCE($6, color),
                   ip = COALESCE($7, ip),
                   description = COALESCE($8, description),
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING id, name, serial_no, status, rack_id, position, space_required, face_front, face_rear, color, ip, description, created_at, updated_at"#,
        )
        .bind(id)
        .bind(&data.serial_no)
        .bind(data.status)
        .bind(data.face_front)
        .bind(data.face_rear)
        .bind(&data.color)
        .bind(&data.ip)
        .bind(&data.description)
        .fetch_one(executor)
        .await
    }

    /// Mount, move, resize or (with `rack_id = None`) unmount a device.
    pub async fn set_placement<'e, E>(
        executor: E,
        id: Uuid,
        rack_id: Option<Uuid>,
        position: Option<i64>,
        space_required: i64,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Device>(
            r#"UPDATE devices
               SET rack_id = $2,
                   position = $3,
                   space_required = $4,
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING id, name, serial_no, status, rack_id, position, space_required, face_front, face_rear, color, ip, description, created_at, updated_at"#,
        )
        .bind(id)
        .bind(rack_id)
        .bind(rack_id.and(position))
        .bind(space_required)
        .fetch_one(executor)
        .await
    }

    /// Takes every device out of a rack, keeping them in inventory.
    pub async fn unmount_all_in_rack<'e, E>(executor: E, rack_id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            "UPDATE devices SET rack_id = NULL, position = NULL, updated_at = datetime('now', 'subsec') WHERE rack_id = $1",
        )
        .bind(rack_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM devices WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
