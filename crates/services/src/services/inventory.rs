//! Site, rack and device workflows. Every write runs in one transaction,
//! keeps the rack capacity counters in step and leaves a change-log row.

use db::models::{
    change_log::{ChangeAction, ChangeEntity, ChangeLogEntry, ChangeLogFilter},
    device::{CreateDevice, Device, DeviceFilter, UpdateDevice},
    listing::{DEFAULT_PAGE_SIZE, Page, PageError, PageQuery},
    rack::{CreateRack, Rack, RackFilter, UpdateRack},
    site::{CreateSite, Site, SiteFilter, SiteLevel},
};
use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, SqlitePool, Transaction};
use thiserror::Error;
use tracing::{debug, info};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    rack_capacity::{PlacementError, PlacementRequest, RackCapacity, check_placement},
    rack_elevation::{
        AnchorPolicy, MAX_RACK_UNITS, OccupancyEntry, OccupancyError, RackElevation, SlotClick,
        SlotView,
    },
    summary::SummaryService,
};

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("{entity} '{name}' not found")]
    NotFound { entity: &'static str, name: String },
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Placement(#[from] PlacementError),
    #[error(transparent)]
    Occupancy(#[from] OccupancyError),
    #[error(transparent)]
    Paging(#[from] PageError),
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for InventoryError {
    fn from(err: sqlx::Error) -> Self {
        match err.as_database_error() {
            Some(db_err) if db_err.is_unique_violation() => {
                InventoryError::Conflict(db_err.message().to_string())
            }
            _ => InventoryError::Database(err),
        }
    }
}

impl InventoryError {
    fn not_found(entity: &'static str, name: impl Into<String>) -> Self {
        InventoryError::NotFound {
            entity,
            name: name.into(),
        }
    }

    /// Maps a unique violation to a readable conflict message.
    fn or_conflict(err: sqlx::Error, message: impl FnOnce() -> String) -> Self {
        match err.as_database_error() {
            Some(db_err) if db_err.is_unique_violation() => InventoryError::Conflict(message()),
            _ => InventoryError::Database(err),
        }
    }
}

/// How elevations are drawn when a request does not say otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElevationSettings {
    pub anchor: AnchorPolicy,
    pub unit_px: u32,
}

impl Default for ElevationSettings {
    fn default() -> Self {
        Self {
            anchor: AnchorPolicy::Top,
            unit_px: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ElevationView {
    pub rack: String,
    pub units: u32,
    pub anchor: AnchorPolicy,
    pub unit_px: u32,
    pub slots: Vec<SlotView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct RackStats {
    pub total_devices: usize,
    pub total_height: i64,
    pub used_space: i64,
    pub available_space: i64,
    pub utilization_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct RackDetails {
    pub rack: Rack,
    pub devices: Vec<Device>,
    pub stats: RackStats,
    pub elevation: ElevationView,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct DeviceDetails {
    pub device: Device,
    pub rack: Option<Rack>,
    pub rack_devices: Vec<Device>,
    pub elevation: Option<ElevationView>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct FreeRun {
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct FreeSpace {
    pub rack: String,
    pub units: u32,
    pub free_runs: Vec<FreeRun>,
    pub height: Option<u32>,
    pub first_fit: Option<u32>,
}

/// Target placement of a device. `rack_name: None` unmounts it; an absent
/// `space_required` keeps the device's current height.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct PlaceDevice {
    pub rack_name: Option<String>,
    pub position: Option<i64>,
    pub space_required: Option<i64>,
}

/// Occupancy entries for the mounted devices of one rack.
pub fn occupancy_entries(devices: &[Device]) -> Result<Vec<OccupancyEntry>, OccupancyError> {
    let unit = |device: &Device, value: i64| {
        u32::try_from(value).map_err(|_| OccupancyError::EntryOutOfRange {
            label: format!("'{}'", device.name),
            value,
        })
    };
    devices
        .iter()
        .filter_map(|device| device.position.map(|position| (device, position)))
        .map(|(device, position)| {
            Ok(OccupancyEntry {
                start: unit(device, position)?,
                height: unit(device, device.space_required)?,
                label: Some(device.name.clone()),
                color: device.color.clone(),
                device_id: Some(device.id),
            })
        })
        .collect()
}

pub fn build_elevation(
    rack: &Rack,
    devices: &[Device],
    anchor: AnchorPolicy,
) -> Result<RackElevation, OccupancyError> {
    let units = u32::try_from(rack.height).map_err(|_| OccupancyError::UnitsOutOfRange {
        units: rack.height,
        max: MAX_RACK_UNITS,
    })?;
    RackElevation::new(units, occupancy_entries(devices)?, anchor)
}

fn check_height(height: i64) -> Result<(), InventoryError> {
    if !(1..=i64::from(MAX_RACK_UNITS)).contains(&height) {
        return Err(InventoryError::Invalid(format!(
            "rack height must be between 1 and {MAX_RACK_UNITS}, got {height}"
        )));
    }
    Ok(())
}

const CHANGE_LOG_PAGE_SIZE: i64 = 50;

fn units_label(rack: &str, position: u32, space_required: u32) -> String {
    format!("{rack} U{position}-U{}", position + space_required - 1)
}

fn required_name(name: &str, entity: &str) -> Result<String, InventoryError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(InventoryError::Invalid(format!("{entity} name must not be empty")));
    }
    Ok(trimmed.to_string())
}

#[derive(Clone)]
pub struct InventoryService {
    pool: SqlitePool,
    summary: SummaryService,
    settings: ElevationSettings,
}

impl InventoryService {
    pub fn new(pool: SqlitePool, summary: SummaryService, settings: ElevationSettings) -> Self {
        Self {
            pool,
            summary,
            settings,
        }
    }

    async fn finish(&self, tx: Transaction<'_, Sqlite>) -> Result<(), InventoryError> {
        tx.commit().await?;
        self.summary.invalidate().await;
        Ok(())
    }

    async fn rack_in(tx: &mut Transaction<'_, Sqlite>, name: &str) -> Result<Rack, InventoryError> {
        Rack::find_by_name(&mut **tx, name)
            .await?
            .ok_or_else(|| InventoryError::not_found("rack", name.trim()))
    }

    async fn device_in(
        tx: &mut Transaction<'_, Sqlite>,
        name: &str,
    ) -> Result<Device, InventoryError> {
        Device::find_by_name(&mut **tx, name)
            .await?
            .ok_or_else(|| InventoryError::not_found("device", name.trim()))
    }

    // Sites

    pub async fn list_sites(
        &self,
        filter: &SiteFilter,
        page: PageQuery,
    ) -> Result<Page<Site>, InventoryError> {
        let request = page.resolve(DEFAULT_PAGE_SIZE)?;
        Ok(Site::find_page(&self.pool, filter, request).await?)
    }

    pub async fn create_site(&self, data: CreateSite) -> Result<Site, InventoryError> {
        let name = required_name(&data.name, &data.level.to_string())?;
        match (data.level.parent(), data.parent_id) {
            (None, Some(_)) => {
                return Err(InventoryError::Invalid(format!(
                    "a {} cannot have a parent",
                    data.level
                )));
            }
            (Some(expected), None) => {
                return Err(InventoryError::Invalid(format!(
                    "a {} must belong to a {expected}",
                    data.level
                )));
            }
            (Some(expected), Some(parent_id)) => {
                let parent = Site::find_by_id(&self.pool, parent_id)
                    .await?
                    .ok_or_else(|| InventoryError::not_found("site", parent_id.to_string()))?;
                if parent.level != expected {
                    return Err(InventoryError::Invalid(format!(
                        "a {} must belong to a {expected}, not a {}",
                        data.level, parent.level
                    )));
                }
            }
            (None, None) => {}
        }

        let mut tx = self.pool.begin().await?;
        let site = Site::create(&mut *tx, &data, Uuid::new_v4())
            .await
            .map_err(|e| {
                InventoryError::or_conflict(e, || {
                    format!("{} '{name}' already exists at this level", data.level)
                })
            })?;
        ChangeLogEntry::create(
            &mut *tx,
            ChangeEntity::Site,
            site.id,
            &site.name,
            ChangeAction::Created,
            Some(site.level.to_string()),
        )
        .await?;
        self.finish(tx).await?;

        info!(site = %site.name, level = %site.level, "Site created");
        Ok(site)
    }

    /// Deletes a site and everything under it. Devices in the removed racks
    /// are unmounted and stay in inventory.
    pub async fn delete_site(&self, id: Uuid) -> Result<(), InventoryError> {
        let mut tx = self.pool.begin().await?;
        let site = Site::find_by_id(&mut *tx, id)
            .await?
            .ok_or_else(|| InventoryError::not_found("site", id.to_string()))?;

        let rack_ids = Site::rack_ids_under(&mut *tx, id).await?;
        let mut unmounted = 0;
        for rack_id in &rack_ids {
            unmounted += Device::unmount_all_in_rack(&mut *tx, *rack_id).await?;
        }
        Site::delete(&mut *tx, id).await?;
        ChangeLogEntry::create(
            &mut *tx,
            ChangeEntity::Site,
            site.id,
            &site.name,
            ChangeAction::Deleted,
            Some(format!(
                "{} racks removed, {unmounted} devices unmounted",
                rack_ids.len()
            )),
        )
        .await?;
        self.finish(tx).await?;

        info!(
            site = %site.name,
            racks = rack_ids.len(),
            devices_unmounted = unmounted,
            "Site deleted"
        );
        Ok(())
    }

    // Racks

    pub async fn list_racks(
        &self,
        filter: &RackFilter,
        page: PageQuery,
    ) -> Result<Page<Rack>, InventoryError> {
        let request = page.resolve(DEFAULT_PAGE_SIZE)?;
        Ok(Rack::find_page(&self.pool, filter, request).await?)
    }

    pub async fn create_rack(&self, data: CreateRack) -> Result<Rack, InventoryError> {
        let name = required_name(&data.name, "rack")?;
        check_height(data.height)?;
        if data.width.is_some_and(|w| w < 1) {
            return Err(InventoryError::Invalid("rack width must be positive".to_string()));
        }

        let mut tx = self.pool.begin().await?;
        let datacenter = Site::find_by_id(&mut *tx, data.datacenter_id)
            .await?
            .ok_or_else(|| InventoryError::not_found("datacenter", data.datacenter_id.to_string()))?;
        if datacenter.level != SiteLevel::Datacenter {
            return Err(InventoryError::Invalid(format!(
                "racks belong to a datacenter, '{}' is a {}",
                datacenter.name, datacenter.level
            )));
        }

        let rack = Rack::create(&mut *tx, &data, Uuid::new_v4())
            .await
            .map_err(|e| InventoryError::or_conflict(e, || format!("rack '{name}' already exists")))?;
        ChangeLogEntry::create(
            &mut *tx,
            ChangeEntity::Rack,
            rack.id,
            &rack.name,
            ChangeAction::Created,
            Some(format!("{}U in {}", rack.height, datacenter.name)),
        )
        .await?;
        self.finish(tx).await?;

        info!(rack = %rack.name, height = rack.height, datacenter = %datacenter.name, "Rack created");
        Ok(rack)
    }

    /// Height may shrink only down to the topmost occupied unit.
    pub async fn update_rack(&self, name: &str, data: UpdateRack) -> Result<Rack, InventoryError> {
        if data.width.is_some_and(|w| w < 1) {
            return Err(InventoryError::Invalid("rack width must be positive".to_string()));
        }

        let mut tx = self.pool.begin().await?;
        let rack = Self::rack_in(&mut tx, name).await?;

        if let Some(height) = data.height {
            check_height(height)?;
            let devices = Device::find_by_rack(&mut *tx, rack.id).await?;
            let top = devices.iter().filter_map(Device::top_position).max();
            if let Some(top) = top.filter(|top| height < *top) {
                return Err(InventoryError::Invalid(format!(
                    "rack height {height} is below the topmost occupied unit {top}"
                )));
            }
        }

        let mut updated = Rack::update(&mut *tx, rack.id, &data).await?;
        if updated.height != rack.height {
            let capacity = RackCapacity::from_counters(&updated.name, updated.height, updated.space_used);
            Rack::set_capacity(&mut *tx, updated.id, capacity.space_used, capacity.space_available)
                .await?;
            updated.space_used = capacity.space_used;
            updated.space_available = capacity.space_available;
        }
        ChangeLogEntry::create(
            &mut *tx,
            ChangeEntity::Rack,
            updated.id,
            &updated.name,
            ChangeAction::Updated,
            (updated.height != rack.height)
                .then(|| format!("height {}U -> {}U", rack.height, updated.height)),
        )
        .await?;
        self.finish(tx).await?;

        info!(rack = %updated.name, status = %updated.status, height = updated.height, "Rack updated");
        Ok(updated)
    }

    /// Unmounts every device of the rack, then deletes it.
    pub async fn delete_rack(&self, name: &str) -> Result<(), InventoryError> {
        let mut tx = self.pool.begin().await?;
        let rack = Self::rack_in(&mut tx, name).await?;
        let unmounted = Device::unmount_all_in_rack(&mut *tx, rack.id).await?;
        Rack::delete(&mut *tx, rack.id).await?;
        ChangeLogEntry::create(
            &mut *tx,
            ChangeEntity::Rack,
            rack.id,
            &rack.name,
            ChangeAction::Deleted,
            Some(format!("{unmounted} devices unmounted")),
        )
        .await?;
        self.finish(tx).await?;

        info!(rack = %rack.name, devices_unmounted = unmounted, "Rack deleted");
        Ok(())
    }

    // Devices

    /// `rack_name` narrows the list to one rack and must name an existing one.
    pub async fn list_devices(
        &self,
        rack_name: Option<&str>,
        mut filter: DeviceFilter,
        page: PageQuery,
    ) -> Result<Page<Device>, InventoryError> {
        let request = page.resolve(DEFAULT_PAGE_SIZE)?;
        if let Some(name) = rack_name {
            filter.rack_id = Some(self.find_rack(name).await?.id);
        }
        Ok(Device::find_page(&self.pool, &filter, request).await?)
    }

    /// Creates a device, mounting it right away when a rack is named.
    pub async fn create_device(&self, data: CreateDevice) -> Result<Device, InventoryError> {
        let name = required_name(&data.name, "device")?;
        let space_required = data.space_required.unwrap_or(1);

        let mut tx = self.pool.begin().await?;
        let (device, mounted) = match data.rack_name.as_deref() {
            Some(rack_name) => {
                let request = PlacementRequest::from_input(data.position, space_required)?;
                let rack = Self::rack_in(&mut tx, rack_name).await?;
                let devices = Device::find_by_rack(&mut *tx, rack.id).await?;
                let elevation = build_elevation(&rack, &devices, self.settings.anchor)?;
                check_placement(&elevation, &request, None)?;

                let mut capacity = RackCapacity::from_counters(&rack.name, rack.height, rack.space_used);
                capacity.reserve(space_required)?;

                let device = Device::create(&mut *tx, &data, Uuid::new_v4(), Some(rack.id), space_required)
                    .await
                    .map_err(|e| InventoryError::or_conflict(e, || format!("device '{name}' already exists")))?;
                Rack::set_capacity(&mut *tx, rack.id, capacity.space_used, capacity.space_available)
                    .await?;
                let position = request.position.unwrap_or_default();
                (device, Some(units_label(&rack.name, position, request.space_required)))
            }
            None => {
                PlacementRequest::from_input(None, space_required)?;
                let device = Device::create(&mut *tx, &data, Uuid::new_v4(), None, space_required)
                    .await
                    .map_err(|e| InventoryError::or_conflict(e, || format!("device '{name}' already exists")))?;
                (device, None)
            }
        };
        ChangeLogEntry::create(
            &mut *tx,
            ChangeEntity::Device,
            device.id,
            &device.name,
            ChangeAction::Created,
            mounted.clone(),
        )
        .await?;
        self.finish(tx).await?;

        info!(device = %device.name, placement = mounted.as_deref().unwrap_or("unmounted"), "Device created");
        Ok(device)
    }

    pub async fn update_device(&self, name: &str, data: UpdateDevice) -> Result<Device, InventoryError> {
        let mut tx = self.pool.begin().await?;
        let device = Self::device_in(&mut tx, name).await?;
        let updated = Device::update(&mut *tx, device.id, &data).await?;
        ChangeLogEntry::create(
            &mut *tx,
            ChangeEntity::Device,
            updated.id,
            &updated.name,
            ChangeAction::Updated,
            None,
        )
        .await?;
        self.finish(tx).await?;

        debug!(device = %updated.name, "Device updated");
        Ok(updated)
    }

    /// Mounts, moves, resizes or unmounts a device. The device's own current
    /// units never block its new placement.
    pub async fn place_device(&self, name: &str, target: PlaceDevice) -> Result<Device, InventoryError> {
        let mut tx = self.pool.begin().await?;
        let device = Self::device_in(&mut tx, name).await?;
        let space_required = target.space_required.unwrap_or(device.space_required);
        let request = PlacementRequest::from_input(
            target.rack_name.as_ref().and(target.position),
            space_required,
        )?;

        let old_rack = match device.rack_id {
            Some(rack_id) => Rack::find_by_id(&mut *tx, rack_id).await?,
            None => None,
        };

        let (placed, action, message) = match target.rack_name.as_deref() {
            None => {
                if let Some(old) = &old_rack {
                    let mut capacity = RackCapacity::from_counters(&old.name, old.height, old.space_used);
                    capacity.release(device.space_required);
                    Rack::set_capacity(&mut *tx, old.id, capacity.space_used, capacity.space_available)
                        .await?;
                }
                let placed = Device::set_placement(&mut *tx, device.id, None, None, space_required).await?;
                let action = match &old_rack {
                    Some(_) => ChangeAction::Unmounted,
                    None => ChangeAction::Updated,
                };
                (placed, action, old_rack.as_ref().map(|r| format!("removed from {}", r.name)))
            }
            Some(rack_name) => {
                let rack = Self::rack_in(&mut tx, rack_name).await?;
                let devices = Device::find_by_rack(&mut *tx, rack.id).await?;
                let elevation = build_elevation(&rack, &devices, self.settings.anchor)?;
                check_placement(&elevation, &request, Some(device.id))?;

                let same_rack = old_rack.as_ref().is_some_and(|old| old.id == rack.id);
                let mut capacity = RackCapacity::from_counters(&rack.name, rack.height, rack.space_used);
                if same_rack {
                    capacity.release(device.space_required);
                }
                capacity.reserve(space_required)?;
                Rack::set_capacity(&mut *tx, rack.id, capacity.space_used, capacity.space_available)
                    .await?;

                if let Some(old) = old_rack.as_ref().filter(|_| !same_rack) {
                    let mut released = RackCapacity::from_counters(&old.name, old.height, old.space_used);
                    released.release(device.space_required);
                    Rack::set_capacity(&mut *tx, old.id, released.space_used, released.space_available)
                        .await?;
                }

                let placed = Device::set_placement(
                    &mut *tx,
                    device.id,
                    Some(rack.id),
                    request.position.map(i64::from),
                    space_required,
                )
                .await?;
                let action = match &old_rack {
                    Some(_) => ChangeAction::Moved,
                    None => ChangeAction::Mounted,
                };
                let position = request.position.unwrap_or_default();
                (
                    placed,
                    action,
                    Some(units_label(&rack.name, position, request.space_required)),
                )
            }
        };

        ChangeLogEntry::create(
            &mut *tx,
            ChangeEntity::Device,
            placed.id,
            &placed.name,
            action,
            message.clone(),
        )
        .await?;
        self.finish(tx).await?;

        info!(
            device = %placed.name,
            action = %action,
            placement = message.as_deref().unwrap_or("-"),
            "Device placement changed"
        );
        Ok(placed)
    }

    pub async fn delete_device(&self, name: &str) -> Result<(), InventoryError> {
        let mut tx = self.pool.begin().await?;
        let device = Self::device_in(&mut tx, name).await?;
        let rack = match device.rack_id {
            Some(rack_id) => Rack::find_by_id(&mut *tx, rack_id).await?,
            None => None,
        };
        if let Some(rack) = rack {
            let mut capacity = RackCapacity::from_counters(&rack.name, rack.height, rack.space_used);
            capacity.release(device.space_required);
            Rack::set_capacity(&mut *tx, rack.id, capacity.space_used, capacity.space_available)
                .await?;
        }
        Device::delete(&mut *tx, device.id).await?;
        ChangeLogEntry::create(
            &mut *tx,
            ChangeEntity::Device,
            device.id,
            &device.name,
            ChangeAction::Deleted,
            None,
        )
        .await?;
        self.finish(tx).await?;

        info!(device = %device.name, "Device deleted");
        Ok(())
    }

    // Audit trail

    /// Filtered change log, newest first, 50 rows per page unless asked
    /// otherwise.
    pub async fn list_changes(
        &self,
        filter: &ChangeLogFilter,
        page: PageQuery,
    ) -> Result<Page<ChangeLogEntry>, InventoryError> {
        let request = page.resolve(CHANGE_LOG_PAGE_SIZE)?;
        match (filter.from, filter.to) {
            (Some(from), Some(to)) if from > to => {
                return Err(InventoryError::Invalid(format!(
                    "from ({from}) is after to ({to})"
                )));
            }
            _ => {}
        }
        Ok(ChangeLogEntry::find_page(&self.pool, filter, request).await?)
    }

    // Read side

    pub async fn find_rack(&self, name: &str) -> Result<Rack, InventoryError> {
        Rack::find_by_name(&self.pool, name)
            .await?
            .ok_or_else(|| InventoryError::not_found("rack", name.trim()))
    }

    pub async fn find_device(&self, name: &str) -> Result<Device, InventoryError> {
        Device::find_by_name(&self.pool, name)
            .await?
            .ok_or_else(|| InventoryError::not_found("device", name.trim()))
    }

    /// Occupancy snapshot of a rack under the configured anchor policy.
    pub async fn elevation(&self, rack_name: &str) -> Result<RackElevation, InventoryError> {
        let rack = self.find_rack(rack_name).await?;
        let devices = Device::find_by_rack(&self.pool, rack.id).await?;
        Ok(build_elevation(&rack, &devices, self.settings.anchor)?)
    }

    fn view(&self, rack: &Rack, elevation: &RackElevation, unit_px: Option<u32>) -> ElevationView {
        let unit_px = unit_px.unwrap_or(self.settings.unit_px);
        ElevationView {
            rack: rack.name.clone(),
            units: elevation.units(),
            anchor: elevation.anchor(),
            unit_px,
            slots: elevation.render(unit_px),
        }
    }

    /// Render plan of a rack; `None` falls back to the configured settings.
    pub async fn elevation_view(
        &self,
        rack_name: &str,
        anchor: Option<AnchorPolicy>,
        unit_px: Option<u32>,
    ) -> Result<ElevationView, InventoryError> {
        let rack = self.find_rack(rack_name).await?;
        let devices = Device::find_by_rack(&self.pool, rack.id).await?;
        let elevation = build_elevation(&rack, &devices, anchor.unwrap_or(self.settings.anchor))?;
        Ok(self.view(&rack, &elevation, unit_px))
    }

    pub async fn rack_details(&self, name: &str) -> Result<RackDetails, InventoryError> {
        let rack = self.find_rack(name).await?;
        let devices = Device::find_by_rack(&self.pool, rack.id).await?;
        let elevation = build_elevation(&rack, &devices, self.settings.anchor)?;
        let capacity = RackCapacity::from_counters(&rack.name, rack.height, rack.space_used);

        let stats = RackStats {
            total_devices: devices.len(),
            total_height: devices.iter().map(|d| d.space_required).sum(),
            used_space: rack.space_used,
            available_space: rack.space_available,
            utilization_percent: capacity.utilization_percent(),
        };
        let elevation = self.view(&rack, &elevation, None);
        Ok(RackDetails {
            rack,
            devices,
            stats,
            elevation,
        })
    }

    pub async fn device_details(&self, name: &str) -> Result<DeviceDetails, InventoryError> {
        let device = self.find_device(name).await?;
        let rack = match device.rack_id {
            Some(rack_id) => Rack::find_by_id(&self.pool, rack_id).await?,
            None => None,
        };
        let Some(rack) = rack else {
            return Ok(DeviceDetails {
                device,
                rack: None,
                rack_devices: Vec::new(),
                elevation: None,
            });
        };

        let rack_devices = Device::find_by_rack(&self.pool, rack.id).await?;
        let elevation = build_elevation(&rack, &rack_devices, self.settings.anchor)?;
        let elevation = self.view(&rack, &elevation, None);
        Ok(DeviceDetails {
            device,
            rack: Some(rack),
            rack_devices,
            elevation: Some(elevation),
        })
    }

    pub async fn click_slot(&self, rack_name: &str, slot: u32) -> Result<SlotClick, InventoryError> {
        Ok(self.elevation(rack_name).await?.click(slot)?)
    }

    pub async fn free_space(
        &self,
        rack_name: &str,
        height: Option<u32>,
    ) -> Result<FreeSpace, InventoryError> {
        let elevation = self.elevation(rack_name).await?;
        let free_runs = elevation
            .free_runs()
            .into_iter()
            .map(|run| FreeRun {
                start: *run.start(),
                end: *run.end(),
            })
            .collect();
        Ok(FreeSpace {
            rack: rack_name.trim().to_string(),
            units: elevation.units(),
            free_runs,
            height,
            first_fit: height.and_then(|h| elevation.first_fit(h)),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use db::DBService;

    use super::*;

    async fn service_with(anchor: AnchorPolicy) -> (DBService, InventoryService) {
        let db = DBService::new_in_memory().await.unwrap();
        let summary = SummaryService::new(db.pool.clone(), Duration::ZERO);
        let settings = ElevationSettings {
            anchor,
            unit_px: 20,
        };
        let service = InventoryService::new(db.pool.clone(), summary, settings);
        (db, service)
    }

    async fn service() -> (DBService, InventoryService) {
        service_with(AnchorPolicy::Top).await
    }

    async fn datacenter(service: &InventoryService, name: &str) -> Site {
        let mut parent = None;
        let mut site = None;
        for level in SiteLevel::ALL {
            let created = service
                .create_site(CreateSite {
                    level,
                    name: format!("{name}-{level}"),
                    parent_id: parent,
                    description: None,
                })
                .await
                .unwrap();
            parent = Some(created.id);
            site = Some(created);
        }
        site.unwrap()
    }

    async fn rack(service: &InventoryService, name: &str, height: i64) -> Rack {
        let dc = datacenter(service, name).await;
        service
            .create_rack(CreateRack {
                name: name.to_string(),
                datacenter_id: dc.id,
                status: None,
                width: None,
                height,
                description: None,
            })
            .await
            .unwrap()
    }

    fn mounted(name: &str, rack: &str, position: i64, space_required: i64) -> CreateDevice {
        CreateDevice {
            name: name.to_string(),
            rack_name: Some(rack.to_string()),
            position: Some(position),
            space_required: Some(space_required),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_site_levels_must_chain() {
        let (_db, service) = service().await;
        let orphan = service
            .create_site(CreateSite {
                level: SiteLevel::Building,
                name: "B1".to_string(),
                parent_id: None,
                description: None,
            })
            .await;
        assert!(matches!(orphan, Err(InventoryError::Invalid(_))));

        let loc = service
            .create_site(CreateSite {
                level: SiteLevel::Location,
                name: "Pune".to_string(),
                parent_id: None,
                description: None,
            })
            .await
            .unwrap();
        let skipped = service
            .create_site(CreateSite {
                level: SiteLevel::Floor,
                name: "F1".to_string(),
                parent_id: Some(loc.id),
                description: None,
            })
            .await;
        assert!(matches!(skipped, Err(InventoryError::Invalid(_))));

        let duplicate = service
            .create_site(CreateSite {
                level: SiteLevel::Location,
                name: "pune".to_string(),
                parent_id: None,
                description: None,
            })
            .await;
        assert!(matches!(duplicate, Err(InventoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_racks_only_live_in_datacenters() {
        let (_db, service) = service().await;
        let loc = service
            .create_site(CreateSite {
                level: SiteLevel::Location,
                name: "Chennai".to_string(),
                parent_id: None,
                description: None,
            })
            .await
            .unwrap();
        let result = service
            .create_rack(CreateRack {
                name: "R-01".to_string(),
                datacenter_id: loc.id,
                status: None,
                width: None,
                height: 42,
                description: None,
            })
            .await;
        assert!(matches!(result, Err(InventoryError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_rack_height_is_bounded() {
        let (_db, service) = service().await;
        let dc = datacenter(&service, "DC").await;
        for height in [0, i64::from(MAX_RACK_UNITS) + 1, 5_000_000_000] {
            let result = service
                .create_rack(CreateRack {
                    name: "R-01".to_string(),
                    datacenter_id: dc.id,
                    status: None,
                    width: None,
                    height,
                    description: None,
                })
                .await;
            assert!(matches!(result, Err(InventoryError::Invalid(_))));
        }
        let racks = service
            .list_racks(&RackFilter::default(), PageQuery::default())
            .await
            .unwrap();
        assert_eq!(racks.total, 0);

        rack(&service, "R-02", 42).await;
        let result = service
            .update_rack(
                "R-02",
                UpdateRack {
                    height: Some(5_000_000_000),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(InventoryError::Invalid(_))));

        let tallest = service
            .update_rack(
                "R-02",
                UpdateRack {
                    height: Some(i64::from(MAX_RACK_UNITS)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(tallest.space_available, i64::from(MAX_RACK_UNITS));
        service
            .create_device(mounted("Server-01", "R-02", 99, 2))
            .await
            .unwrap();
        let details = service.rack_details("R-02").await.unwrap();
        assert_eq!(details.elevation.slots.len(), MAX_RACK_UNITS as usize);
    }

    #[test]
    fn test_out_of_range_rows_are_reported() {
        let rack = Rack {
            id: Uuid::new_v4(),
            name: "R-01".to_string(),
            datacenter_id: Uuid::new_v4(),
            status: Default::default(),
            width: None,
            height: 5_000_000_000,
            space_used: 0,
            space_available: 0,
            description: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        assert_eq!(
            build_elevation(&rack, &[], AnchorPolicy::Top).unwrap_err(),
            OccupancyError::UnitsOutOfRange {
                units: 5_000_000_000,
                max: MAX_RACK_UNITS
            }
        );
    }

    #[tokio::test]
    async fn test_rack_names_conflict_case_insensitively() {
        let (_db, service) = service().await;
        let first = rack(&service, "R-01", 42).await;
        let result = service
            .create_rack(CreateRack {
                name: "r-01".to_string(),
                datacenter_id: first.datacenter_id,
                status: None,
                width: None,
                height: 42,
                description: None,
            })
            .await;
        assert!(matches!(result, Err(InventoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_mounting_reserves_capacity() {
        let (_db, service) = service().await;
        rack(&service, "R-01", 42).await;
        let device = service
            .create_device(mounted("Server-01", "R-01", 10, 4))
            .await
            .unwrap();
        assert_eq!(device.position, Some(10));

        let details = service.rack_details("r-01").await.unwrap();
        assert_eq!(details.rack.space_used, 4);
        assert_eq!(details.rack.space_available, 38);
        assert_eq!(details.stats.total_devices, 1);
        assert_eq!(details.stats.total_height, 4);
        assert_eq!(details.stats.utilization_percent, 9.52);
    }

    #[tokio::test]
    async fn test_overlapping_mount_is_rejected() {
        let (_db, service) = service().await;
        rack(&service, "R-01", 42).await;
        service
            .create_device(mounted("Server-01", "R-01", 10, 4))
            .await
            .unwrap();

        let result = service.create_device(mounted("Server-02", "R-01", 13, 2)).await;
        assert!(matches!(
            result,
            Err(InventoryError::Placement(PlacementError::Occupied {
                overlap_from: 13,
                overlap_to: 13,
                ..
            }))
        ));
        let result = service.create_device(mounted("Server-03", "R-01", 41, 3)).await;
        assert!(matches!(
            result,
            Err(InventoryError::Placement(PlacementError::ExceedsRack { .. }))
        ));
        let result = service
            .create_device(CreateDevice {
                position: None,
                ..mounted("Server-04", "R-01", 1, 1)
            })
            .await;
        assert!(matches!(
            result,
            Err(InventoryError::Placement(PlacementError::PositionRequired))
        ));

        assert!(service.find_device("Server-02").await.is_err());
        assert_eq!(service.find_rack("R-01").await.unwrap().space_used, 4);
    }

    #[tokio::test]
    async fn test_move_within_rack_over_own_units() {
        let (_db, service) = service().await;
        rack(&service, "R-01", 42).await;
        service
            .create_device(mounted("Server-01", "R-01", 10, 4))
            .await
            .unwrap();

        let moved = service
            .place_device(
                "Server-01",
                PlaceDevice {
                    rack_name: Some("R-01".to_string()),
                    position: Some(12),
                    space_required: Some(6),
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.position, Some(12));
        assert_eq!(moved.space_required, 6);

        let rack = service.find_rack("R-01").await.unwrap();
        assert_eq!((rack.space_used, rack.space_available), (6, 36));
        let elevation = service.elevation("R-01").await.unwrap();
        assert!(!elevation.is_occupied(11));
        assert!(elevation.is_occupied(17));
    }

    #[tokio::test]
    async fn test_move_across_racks_and_unmount() {
        let (_db, service) = service().await;
        rack(&service, "R-01", 42).await;
        rack(&service, "R-02", 24).await;
        service
            .create_device(mounted("sw-01", "R-01", 1, 2))
            .await
            .unwrap();

        service
            .place_device(
                "sw-01",
                PlaceDevice {
                    rack_name: Some("R-02".to_string()),
                    position: Some(23),
                    space_required: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(service.find_rack("R-01").await.unwrap().space_used, 0);
        assert_eq!(service.find_rack("R-02").await.unwrap().space_used, 2);

        let unmounted = service
            .place_device("sw-01", PlaceDevice::default())
            .await
            .unwrap();
        assert_eq!(unmounted.rack_id, None);
        assert_eq!(unmounted.position, None);
        assert_eq!(service.find_rack("R-02").await.unwrap().space_available, 24);

        let log = ChangeLogEntry::find_by_entity(&service.pool, ChangeEntity::Device, unmounted.id)
            .await
            .unwrap();
        let actions: Vec<ChangeAction> = log.iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![ChangeAction::Unmounted, ChangeAction::Moved, ChangeAction::Created]
        );
    }

    #[tokio::test]
    async fn test_rack_cannot_shrink_below_mounted_device() {
        let (_db, service) = service().await;
        rack(&service, "R-01", 42).await;
        service
            .create_device(mounted("Server-01", "R-01", 30, 4))
            .await
            .unwrap();

        let result = service
            .update_rack(
                "R-01",
                UpdateRack {
                    height: Some(32),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(InventoryError::Invalid(_))));

        let rack = service
            .update_rack(
                "R-01",
                UpdateRack {
                    height: Some(33),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!((rack.height, rack.space_used, rack.space_available), (33, 4, 29));
    }

    #[tokio::test]
    async fn test_deleting_rack_keeps_devices() {
        let (_db, service) = service().await;
        rack(&service, "R-01", 42).await;
        service
            .create_device(mounted("Server-01", "R-01", 10, 4))
            .await
            .unwrap();

        service.delete_rack("R-01").await.unwrap();
        assert!(matches!(
            service.find_rack("R-01").await,
            Err(InventoryError::NotFound { entity: "rack", .. })
        ));
        let device = service.find_device("Server-01").await.unwrap();
        assert_eq!(device.rack_id, None);
        assert_eq!(device.position, None);
    }

    #[tokio::test]
    async fn test_deleting_site_unmounts_devices_below_it() {
        let (_db, service) = service().await;
        let r = rack(&service, "R-01", 42).await;
        service
            .create_device(mounted("Server-01", "R-01", 1, 1))
            .await
            .unwrap();
        let locations = SiteFilter {
            level: Some(SiteLevel::Location),
            ..Default::default()
        };
        let location = service
            .list_sites(&locations, PageQuery::default())
            .await
            .unwrap()
            .data
            .remove(0);

        service.delete_site(location.id).await.unwrap();
        let in_datacenter = RackFilter {
            datacenter_id: Some(r.datacenter_id),
            ..Default::default()
        };
        let racks = service
            .list_racks(&in_datacenter, PageQuery::default())
            .await
            .unwrap();
        assert!(racks.data.is_empty());
        let sites = service
            .list_sites(&SiteFilter::default(), PageQuery::default())
            .await
            .unwrap();
        assert_eq!(sites.total, 0);
        assert_eq!(service.find_device("Server-01").await.unwrap().rack_id, None);
    }

    #[tokio::test]
    async fn test_deleting_device_releases_capacity() {
        let (_db, service) = service().await;
        rack(&service, "R-01", 42).await;
        service
            .create_device(mounted("Server-01", "R-01", 10, 4))
            .await
            .unwrap();
        service.delete_device("server-01").await.unwrap();
        assert_eq!(service.find_rack("R-01").await.unwrap().space_available, 42);
    }

    #[tokio::test]
    async fn test_details_share_anchor_policy() {
        for (anchor, anchor_slot) in [(AnchorPolicy::Top, 13), (AnchorPolicy::Bottom, 10)] {
            let (_db, service) = service_with(anchor).await;
            rack(&service, "R-01", 42).await;
            service
                .create_device(mounted("Server-01", "R-01", 10, 4))
                .await
                .unwrap();

            let rack_view = service.rack_details("R-01").await.unwrap().elevation;
            let device_view = service
                .device_details("Server-01")
                .await
                .unwrap()
                .elevation
                .unwrap();
            let plain_view = service.elevation_view("R-01", None, None).await.unwrap();

            for view in [&rack_view, &device_view, &plain_view] {
                let blocks: Vec<u32> = view
                    .slots
                    .iter()
                    .filter(|s| matches!(s, SlotView::Block { .. }))
                    .map(SlotView::slot)
                    .collect();
                assert_eq!(blocks, vec![anchor_slot]);
                assert_eq!(view.anchor, anchor);
            }
        }
    }

    #[tokio::test]
    async fn test_click_and_free_space() {
        let (_db, service) = service().await;
        rack(&service, "R-01", 42).await;
        let device = service
            .create_device(mounted("Server-01", "R-01", 10, 4))
            .await
            .unwrap();

        let click = service.click_slot("R-01", 20).await.unwrap();
        assert!(click.empty);
        assert_eq!(click.slot, Some(20));

        let click = service.click_slot("R-01", 13).await.unwrap();
        assert_eq!(click.label.as_deref(), Some("Server-01"));
        assert_eq!(click.device_id, Some(device.id));

        assert!(matches!(
            service.click_slot("R-01", 43).await,
            Err(InventoryError::Occupancy(OccupancyError::SlotOutOfRange { .. }))
        ));

        let free = service.free_space("R-01", Some(10)).await.unwrap();
        assert_eq!(
            free.free_runs,
            vec![FreeRun { start: 1, end: 9 }, FreeRun { start: 14, end: 42 }]
        );
        assert_eq!(free.first_fit, Some(14));
    }

    #[tokio::test]
    async fn test_lists_are_paged_and_filtered() {
        let (_db, service) = service().await;
        rack(&service, "R-01", 42).await;
        for (name, position) in [("srv-01", 1), ("srv-02", 5), ("srv-03", 9)] {
            service
                .create_device(mounted(name, "R-01", position, 2))
                .await
                .unwrap();
        }
        service
            .create_device(CreateDevice {
                name: "spare-psu".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let two = PageQuery {
            page_size: Some(2),
            ..Default::default()
        };
        let page = service
            .list_devices(Some("r-01"), DeviceFilter::default(), two)
            .await
            .unwrap();
        assert_eq!((page.total, page.total_pages, page.data.len()), (3, 2, 2));
        let second = service
            .list_devices(
                Some("R-01"),
                DeviceFilter::default(),
                PageQuery {
                    page: Some(2),
                    ..two
                },
            )
            .await
            .unwrap();
        assert_eq!(second.offset, 2);
        assert_eq!(second.data[0].name, "srv-03");

        let unmounted = DeviceFilter {
            mounted: Some(false),
            ..Default::default()
        };
        let page = service
            .list_devices(None, unmounted, PageQuery::default())
            .await
            .unwrap();
        assert_eq!(page.data[0].name, "spare-psu");

        let too_big = PageQuery {
            page_size: Some(101),
            ..Default::default()
        };
        assert!(matches!(
            service.list_racks(&RackFilter::default(), too_big).await,
            Err(InventoryError::Paging(PageError::PageSize { .. }))
        ));

        let devices = ChangeLogFilter {
            entity: Some(ChangeEntity::Device),
            ..Default::default()
        };
        let changes = service
            .list_changes(&devices, PageQuery::default())
            .await
            .unwrap();
        assert_eq!((changes.total, changes.page_size), (4, 50));
        assert_eq!(changes.data[0].entity_name, "spare-psu");

        let now = chrono::Utc::now();
        let backwards = ChangeLogFilter {
            from: Some(now),
            to: Some(now - chrono::Duration::hours(1)),
            ..Default::default()
        };
        assert!(matches!(
            service.list_changes(&backwards, PageQuery::default()).await,
            Err(InventoryError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_unmounted_device_details() {
        let (_db, service) = service().await;
        service
            .create_device(CreateDevice {
                name: "spare-psu".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let details = service.device_details("spare-psu").await.unwrap();
        assert!(details.rack.is_none());
        assert!(details.elevation.is_none());
        assert!(matches!(
            service
                .list_devices(Some("missing"), DeviceFilter::default(), PageQuery::default())
                .await,
            Err(InventoryError::NotFound { entity: "rack", .. })
        ));
    }
}
