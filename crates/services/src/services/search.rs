//! Free-text search across sites, racks and devices.

use db::models::{device::Device, rack::Rack, site::Site};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::debug;
use ts_rs::TS;

pub const DEFAULT_LIMIT_PER_TYPE: i64 = 10;
pub const MAX_LIMIT_PER_TYPE: i64 = 50;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search query cannot be empty")]
    EmptyQuery,
    #[error("limit_per_type must be between 1 and {max}, got {got}")]
    Limit { got: i64, max: i64 },
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct SearchCounts {
    pub sites: usize,
    pub racks: usize,
    pub devices: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct SearchResults {
    pub query: String,
    pub limit_per_type: i64,
    pub total: usize,
    pub counts: SearchCounts,
    pub sites: Vec<Site>,
    pub racks: Vec<Rack>,
    pub devices: Vec<Device>,
}

/// Runs `query` against every entity type, at most `limit_per_type` hits
/// each.
pub async fn search(
    pool: &SqlitePool,
    query: &str,
    limit_per_type: Option<i64>,
) -> Result<SearchResults, SearchError> {
    let term = query.trim();
    if term.is_empty() {
        return Err(SearchError::EmptyQuery);
    }
    let limit = limit_per_type.unwrap_or(DEFAULT_LIMIT_PER_TYPE);
    if !(1..=MAX_LIMIT_PER_TYPE).contains(&limit) {
        return Err(SearchError::Limit {
            got: limit,
            max: MAX_LIMIT_PER_TYPE,
        });
    }

    let sites = Site::search(pool, term, limit).await?;
    let racks = Rack::search(pool, term, limit).await?;
    let devices = Device::search(pool, term, limit).await?;
    let counts = SearchCounts {
        sites: sites.len(),
        racks: racks.len(),
        devices: devices.len(),
    };
    let total = counts.sites + counts.racks + counts.devices;
    debug!(query = term, total, "Search finished");

    Ok(SearchResults {
        query: term.to_string(),
        limit_per_type: limit,
        total,
        counts,
        sites,
        racks,
        devices,
    })
}
