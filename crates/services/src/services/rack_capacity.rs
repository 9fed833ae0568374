//! Capacity counters and placement rules applied when a device is mounted,
//! moved or resized.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use super::rack_elevation::RackElevation;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlacementError {
    #[error("position is required for device placement")]
    PositionRequired,
    #[error("position must be >= 1, got {0}")]
    PositionBelowOne(i64),
    #[error("space_required must be >= 1, got {0}")]
    SpaceRequired(i64),
    #[error(
        "device position {position} + space {space_required} (ends at position {end}) exceeds rack height {height}"
    )]
    ExceedsRack {
        position: u32,
        space_required: u32,
        end: u64,
        height: u32,
    },
    #[error(
        "cannot place device at positions {position}-{end}: positions {overlap_from}-{overlap_to} are already occupied by {device}"
    )]
    Occupied {
        position: u32,
        end: u32,
        overlap_from: u32,
        overlap_to: u32,
        device: String,
    },
    #[error("rack '{rack}' only has {available}U available but {required}U is required")]
    InsufficientCapacity {
        rack: String,
        available: i64,
        required: i64,
    },
}

/// Stored capacity counters of one rack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct RackCapacity {
    pub rack: String,
    pub height: i64,
    pub space_used: i64,
    pub space_available: i64,
}

impl RackCapacity {
    pub fn from_counters(rack: impl Into<String>, height: i64, space_used: i64) -> Self {
        let mut capacity = Self {
            rack: rack.into(),
            height,
            space_used: space_used.max(0),
            space_available: 0,
        };
        capacity.recalculate();
        capacity
    }

    fn recalculate(&mut self) {
        self.space_available = (self.height - self.space_used).max(0);
    }

    pub fn ensure(&self, space_required: i64) -> Result<(), PlacementError> {
        if space_required <= 0 || self.space_available >= space_required {
            return Ok(());
        }
        Err(PlacementError::InsufficientCapacity {
            rack: self.rack.clone(),
            available: self.space_available,
            required: space_required,
        })
    }

    pub fn reserve(&mut self, space_required: i64) -> Result<(), PlacementError> {
        if space_required <= 0 {
            return Ok(());
        }
        self.ensure(space_required)?;
        self.space_used += space_required;
        self.recalculate();
        Ok(())
    }

    pub fn release(&mut self, space_released: i64) {
        if space_released <= 0 {
            return;
        }
        self.space_used = (self.space_used - space_released).max(0);
        self.recalculate();
    }

    pub fn utilization_percent(&self) -> f64 {
        if self.height <= 0 {
            return 0.0;
        }
        let percent = self.space_used as f64 / self.height as f64 * 100.0;
        (percent * 100.0).round() / 100.0
    }
}

/// Where a device wants to sit: bottom unit and height in units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementRequest {
    pub position: Option<u32>,
    pub space_required: u32,
}

impl PlacementRequest {
    /// Validates raw request values before they reach the rack checks.
    pub fn from_input(position: Option<i64>, space_required: i64) -> Result<Self, PlacementError> {
        let space_required = u32::try_from(space_required)
            .ok()
            .filter(|s| *s >= 1)
            .ok_or(PlacementError::SpaceRequired(space_required))?;
        let position = match position {
            None => None,
            Some(p) if p < 1 => return Err(PlacementError::PositionBelowOne(p)),
            Some(p) => Some(u32::try_from(p).map_err(|_| PlacementError::PositionBelowOne(p))?),
        };
        Ok(Self {
            position,
            space_required,
        })
    }

    pub fn end(&self) -> Option<u64> {
        self.position
            .map(|p| p as u64 + self.space_required as u64 - 1)
    }
}

/// Checks that `request` fits inside the rack and only covers free units.
/// The entry belonging to `exclude` is ignored so a device can be moved or
/// resized over its own current slots.
pub fn check_placement(
    elevation: &RackElevation,
    request: &PlacementRequest,
    exclude: Option<Uuid>,
) -> Result<(), PlacementError> {
    if request.space_required == 0 {
        return Err(PlacementError::SpaceRequired(0));
    }
    let position = request.position.ok_or(PlacementError::PositionRequired)?;
    if position < 1 {
        return Err(PlacementError::PositionBelowOne(position as i64));
    }

    let end = position as u64 + request.space_required as u64 - 1;
    if end > elevation.units() as u64 {
        return Err(PlacementError::ExceedsRack {
            position,
            space_required: request.space_required,
            end,
            height: elevation.units(),
        });
    }
    let end = end as u32;

    for entry in elevation.entries() {
        if exclude.is_some() && entry.device_id == exclude {
            continue;
        }
        let overlap_from = position.max(entry.start);
        let overlap_to = end.min(entry.top());
        if overlap_from <= overlap_to {
            let device = match &entry.label {
                Some(label) => format!(
                    "device '{label}' (position {}, {}U)",
                    entry.start, entry.height
                ),
                None => format!("a device at position {}", entry.start),
            };
            return Err(PlacementError::Occupied {
                position,
                end,
                overlap_from,
                overlap_to,
                device,
            });
        }
    }
    Ok(())
}
