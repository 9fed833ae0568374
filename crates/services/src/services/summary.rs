//! Per-location inventory totals, cached for a short time.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use db::models::{
    device::Device,
    rack::Rack,
    site::{Site, SiteLevel},
};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct LocationSummary {
    pub id: Uuid,
    pub name: String,
    pub total_buildings: i64,
    pub total_datacenters: i64,
    pub total_racks: i64,
    pub total_devices: i64,
    pub total_capacity: i64,
    pub used_space: i64,
    pub available_space: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct LocationSummaryReport {
    pub total_locations: usize,
    pub results: Vec<LocationSummary>,
}

/// Folds the inventory into one summary per location, sorted by name.
/// Devices count toward the location of the rack they are mounted in.
pub fn summarize_locations(sites: &[Site], racks: &[Rack], devices: &[Device]) -> Vec<LocationSummary> {
    let by_id: HashMap<Uuid, &Site> = sites.iter().map(|s| (s.id, s)).collect();
    let root_of = |mut id: Uuid| -> Option<Uuid> {
        // bounded by the depth of the level chain
        for _ in 0..SiteLevel::ALL.len() {
            let site = by_id.get(&id)?;
            match site.parent_id {
                Some(parent) => id = parent,
                None => return Some(site.id),
            }
        }
        None
    };

    let mut summaries: HashMap<Uuid, LocationSummary> = sites
        .iter()
        .filter(|s| s.level == SiteLevel::Location)
        .map(|s| {
            (
                s.id,
                LocationSummary {
                    id: s.id,
                    name: s.name.clone(),
                    ..Default::default()
                },
            )
        })
        .collect();

    for site in sites {
        let Some(summary) = root_of(site.id).and_then(|root| summaries.get_mut(&root)) else {
            continue;
        };
        match site.level {
            SiteLevel::Building => summary.total_buildings += 1,
            SiteLevel::Datacenter => summary.total_datacenters += 1,
            _ => {}
        }
    }

    let mut rack_location: HashMap<Uuid, Uuid> = HashMap::new();
    for rack in racks {
        let Some(root) = root_of(rack.datacenter_id) else {
            continue;
        };
        rack_location.insert(rack.id, root);
        if let Some(summary) = summaries.get_mut(&root) {
            summary.total_racks += 1;
            summary.total_capacity += rack.height;
            summary.used_space += rack.space_used;
            summary.available_space += rack.space_available;
        }
    }

    for device in devices {
        let summary = device
            .rack_id
            .and_then(|rack_id| rack_location.get(&rack_id))
            .and_then(|root| summaries.get_mut(root));
        if let Some(summary) = summary {
            summary.total_devices += 1;
        }
    }

    let mut results: Vec<LocationSummary> = summaries.into_values().collect();
    results.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    results
}

/// Serves location summaries, caching the last computed report for `ttl`.
/// A zero `ttl` disables the cache.
#[derive(Clone)]
pub struct SummaryService {
    pool: SqlitePool,
    cache: Option<Cache<(), Arc<LocationSummaryReport>>>,
    // bumped by every invalidation
    generation: Arc<AtomicU64>,
}

impl SummaryService {
    pub fn new(pool: SqlitePool, ttl: Duration) -> Self {
        let cache = (!ttl.is_zero()).then(|| {
            Cache::builder()
                .max_capacity(1)
                .time_to_live(ttl)
                .build()
        });
        Self {
            pool,
            cache,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub async fn locations(&self) -> Result<Arc<LocationSummaryReport>, sqlx::Error> {
        let cached = match &self.cache {
            Some(cache) => cache.get(&()).await,
            None => None,
        };
        if let Some(report) = cached {
            debug!("Location summary served from cache");
            return Ok(report);
        }

        let generation = self.generation.load(Ordering::Acquire);
        let sites = Site::find_all(&self.pool).await?;
        let racks = Rack::find_all(&self.pool).await?;
        let devices = Device::find_all(&self.pool).await?;
        let results = summarize_locations(&sites, &racks, &devices);
        let report = Arc::new(LocationSummaryReport {
            total_locations: results.len(),
            results,
        });

        self.store(generation, report.clone()).await;
        debug!(locations = report.total_locations, "Location summary computed");
        Ok(report)
    }

    /// Caches `report` unless an invalidation happened since `generation`
    /// was read.
    async fn store(&self, generation: u64, report: Arc<LocationSummaryReport>) {
        let Some(cache) = &self.cache else {
            return;
        };
        if self.generation.load(Ordering::Acquire) != generation {
            debug!("Location summary outdated before caching, skipped");
            return;
        }
        cache.insert((), report).await;
        // an invalidation racing the insert must still win
        if self.generation.load(Ordering::Acquire) != generation {
            cache.invalidate(&()).await;
        }
    }

    /// Drops the cached report; called after every inventory write.
    pub async fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        if let Some(cache) = &self.cache {
            cache.invalidate(&()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use db::{
        DBService,
        models::{
            device::DeviceStatus,
            rack::RackStatus,
            site::CreateSite,
        },
    };

    use super::*;

    fn site(level: SiteLevel, name: &str, parent_id: Option<Uuid>) -> Site {
        Site {
            id: Uuid::new_v4(),
            level,
            name: name.to_string(),
            parent_id,
            description: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn rack(datacenter_id: Uuid, height: i64, used: i64) -> Rack {
        Rack {
            id: Uuid::new_v4(),
            name: format!("R-{height}-{used}"),
            datacenter_id,
            status: RackStatus::Active,
            width: None,
            height,
            space_used: used,
            space_available: height - used,
            description: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn device(rack_id: Option<Uuid>) -> Device {
        Device {
            id: Uuid::new_v4(),
            name: Uuid::new_v4().to_string(),
            serial_no: None,
            status: DeviceStatus::Active,
            rack_id,
            position: rack_id.map(|_| 1),
            space_required: 1,
            face_front: true,
            face_rear: false,
            color: None,
            ip: None,
            description: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_totals_roll_up_to_location() {
        let loc = site(SiteLevel::Location, "Pune", None);
        let empty = site(SiteLevel::Location, "Agra", None);
        let building = site(SiteLevel::Building, "B1", Some(loc.id));
        let wing = site(SiteLevel::Wing, "W1", Some(building.id));
        let floor = site(SiteLevel::Floor, "F1", Some(wing.id));
        let dc = site(SiteLevel::Datacenter, "DC1", Some(floor.id));
        let r1 = rack(dc.id, 42, 10);
        let r2 = rack(dc.id, 24, 0);
        let devices = vec![device(Some(r1.id)), device(Some(r1.id)), device(None)];
        let sites = vec![loc.clone(), empty, building, wing, floor, dc];

        let results = summarize_locations(&sites, &[r1, r2], &devices);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name, "Agra");
        assert_eq!(results[0].total_racks, 0);

        let pune = &results[1];
        assert_eq!(pune.id, loc.id);
        assert_eq!(pune.total_buildings, 1);
        assert_eq!(pune.total_datacenters, 1);
        assert_eq!(pune.total_racks, 2);
        assert_eq!(pune.total_devices, 2);
        assert_eq!(pune.total_capacity, 66);
        assert_eq!(pune.used_space, 10);
        assert_eq!(pune.available_space, 56);
    }

    #[tokio::test]
    async fn test_cached_report_until_invalidated() {
        let db = DBService::new_in_memory().await.unwrap();
        let service = SummaryService::new(db.pool.clone(), Duration::from_secs(60));
        assert_eq!(service.locations().await.unwrap().total_locations, 0);

        Site::create(
            &db.pool,
            &CreateSite {
                level: SiteLevel::Location,
                name: "Delhi".to_string(),
                parent_id: None,
                description: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        assert_eq!(service.locations().await.unwrap().total_locations, 0);

        service.invalidate().await;
        assert_eq!(service.locations().await.unwrap().total_locations, 1);
    }

    #[tokio::test]
    async fn test_report_computed_before_invalidation_is_not_cached() {
        let db = DBService::new_in_memory().await.unwrap();
        let service = SummaryService::new(db.pool.clone(), Duration::from_secs(60));
        let generation = service.generation.load(Ordering::Acquire);
        let outdated = service.locations().await.unwrap();
        service.cache.as_ref().unwrap().invalidate(&()).await;

        Site::create(
            &db.pool,
            &CreateSite {
                level: SiteLevel::Location,
                name: "Surat".to_string(),
                parent_id: None,
                description: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        service.invalidate().await;

        // the read finishes after the write committed and invalidated
        service.store(generation, outdated).await;
        assert_eq!(service.locations().await.unwrap().total_locations, 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_always_recomputes() {
        let db = DBService::new_in_memory().await.unwrap();
        let service = SummaryService::new(db.pool.clone(), Duration::ZERO);
        assert_eq!(service.locations().await.unwrap().total_locations, 0);

        Site::create(
            &db.pool,
            &CreateSite {
                level: SiteLevel::Location,
                name: "Goa".to_string(),
                parent_id: None,
                description: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        assert_eq!(service.locations().await.unwrap().total_locations, 1);
    }
}
