//! Rack-unit occupancy model: which slots of a rack are taken, by whom, and
//! where each multi-unit block is drawn in the elevation view.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

/// Tallest rack the elevation model accepts
pub const MAX_RACK_UNITS: u32 = 100;

/// Which boundary slot of a multi-unit device carries its visual block
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AnchorPolicy {
    /// Block drawn at `start + height - 1`, the device's top unit
    #[default]
    Top,
    /// Block drawn at `start`
    Bottom,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OccupancyError {
    #[error("rack must have at least one unit")]
    ZeroUnits,
    #[error("rack height {units} is outside 1-{max}")]
    UnitsOutOfRange { units: i64, max: u32 },
    #[error("{label} has unit value {value} outside the rack range")]
    EntryOutOfRange { label: String, value: i64 },
    #[error("{label} has zero height")]
    ZeroHeight { label: String },
    #[error("start slot {start} is outside rack units 1-{units}")]
    StartOutOfRange { start: u32, units: u32 },
    #[error("slots {start}-{end} exceed rack height {units}")]
    ExceedsRack { start: u32, end: u32, units: u32 },
    #[error("slots {slot_from}-{slot_to} are claimed by both {first} and {second}")]
    Overlap {
        slot_from: u32,
        slot_to: u32,
        first: String,
        second: String,
    },
    #[error("slot {slot} is outside rack units 1-{units}")]
    SlotOutOfRange { slot: u32, units: u32 },
}

/// Slot numbers of a rack in elevation order, top unit first.
pub fn slots(units: u32) -> impl Iterator<Item = u32> + Clone {
    (1..=units).rev()
}

/// One device's claim on a rack: units `start..=start + height - 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct OccupancyEntry {
    pub start: u32,
    pub height: u32,
    pub label: Option<String>,
    pub color: Option<String>,
    pub device_id: Option<Uuid>,
}

impl OccupancyEntry {
    pub fn new(start: u32, height: u32, label: impl Into<String>) -> Self {
        Self {
            start,
            height,
            label: Some(label.into()),
            color: None,
            device_id: None,
        }
    }

    pub fn covers(&self, slot: u32) -> bool {
        slot >= self.start && slot - self.start < self.height
    }

    pub fn top(&self) -> u32 {
        self.start.saturating_add(self.height.saturating_sub(1))
    }

    pub fn anchor(&self, policy: AnchorPolicy) -> u32 {
        match policy {
            AnchorPolicy::Top => self.top(),
            AnchorPolicy::Bottom => self.start,
        }
    }

    fn display_name(&self) -> String {
        match &self.label {
            Some(label) => format!("'{label}'"),
            None => format!("entry at U{}", self.start),
        }
    }
}

/// Per-slot render decision for the elevation view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SlotView {
    Empty {
        slot: u32,
    },
    Block {
        slot: u32,
        entry: OccupancyEntry,
        height_px: u32,
    },
    Covered {
        slot: u32,
        anchor_slot: u32,
    },
}

impl SlotView {
    pub fn slot(&self) -> u32 {
        match self {
            SlotView::Empty { slot }
            | SlotView::Block { slot, .. }
            | SlotView::Covered { slot, .. } => *slot,
        }
    }
}

/// What a click on a slot resolves to: an empty slot offers "add device
/// here", an occupied one points at the device to view or edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct SlotClick {
    pub empty: bool,
    pub slot: Option<u32>,
    pub label: Option<String>,
    pub device_id: Option<Uuid>,
}

/// Validated occupancy snapshot of one rack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
pub struct RackElevation {
    units: u32,
    entries: Vec<OccupancyEntry>,
    anchor: AnchorPolicy,
}

impl RackElevation {
    pub fn new(
        units: u32,
        mut entries: Vec<OccupancyEntry>,
        anchor: AnchorPolicy,
    ) -> Result<Self, OccupancyError> {
        if units == 0 {
            return Err(OccupancyError::ZeroUnits);
        }
        if units > MAX_RACK_UNITS {
            return Err(OccupancyError::UnitsOutOfRange {
                units: units.into(),
                max: MAX_RACK_UNITS,
            });
        }
        for entry in &entries {
            if entry.height == 0 {
                return Err(OccupancyError::ZeroHeight {
                    label: entry.display_name(),
                });
            }
            if entry.start < 1 || entry.start > units {
                return Err(OccupancyError::StartOutOfRange {
                    start: entry.start,
                    units,
                });
            }
            if entry.top() > units {
                return Err(OccupancyError::ExceedsRack {
                    start: entry.start,
                    end: entry.top(),
                    units,
                });
            }
        }

        entries.sort_by_key(|e| e.start);
        // sorted by start, so any overlap shows up between neighbours
        for pair in entries.windows(2) {
            let (below, above) = (&pair[0], &pair[1]);
            if above.start <= below.top() {
                return Err(OccupancyError::Overlap {
                    slot_from: above.start,
                    slot_to: below.top().min(above.top()),
                    first: below.display_name(),
                    second: above.display_name(),
                });
            }
        }

        Ok(Self {
            units,
            entries,
            anchor,
        })
    }

    pub fn units(&self) -> u32 {
        self.units
    }

    /// Entries in ascending `start` order.
    pub fn entries(&self) -> &[OccupancyEntry] {
        &self.entries
    }

    pub fn anchor(&self) -> AnchorPolicy {
        self.anchor
    }

    pub fn occupant(&self, slot: u32) -> Option<&OccupancyEntry> {
        self.entries.iter().find(|e| e.covers(slot))
    }

    pub fn is_occupied(&self, slot: u32) -> bool {
        self.occupant(slot).is_some()
    }

    pub fn is_anchor(&self, slot: u32) -> bool {
        self.occupant(slot)
            .is_some_and(|e| e.anchor(self.anchor) == slot)
    }

    pub fn block_height_px(entry: &OccupancyEntry, unit_px: u32) -> u32 {
        entry.height.saturating_mul(unit_px)
    }

    pub fn render(&self, unit_px: u32) -> Vec<SlotView> {
        slots(self.units)
            .map(|slot| match self.occupant(slot) {
                None => SlotView::Empty { slot },
                Some(entry) if entry.anchor(self.anchor) == slot => SlotView::Block {
                    slot,
                    entry: entry.clone(),
                    height_px: Self::block_height_px(entry, unit_px),
                },
                Some(entry) => SlotView::Covered {
                    slot,
                    anchor_slot: entry.anchor(self.anchor),
                },
            })
            .collect()
    }

    pub fn click(&self, slot: u32) -> Result<SlotClick, OccupancyError> {
        if slot < 1 || slot > self.units {
            return Err(OccupancyError::SlotOutOfRange {
                slot,
                units: self.units,
            });
        }
        Ok(match self.occupant(slot) {
            None => SlotClick {
                empty: true,
                slot: Some(slot),
                label: None,
                device_id: None,
            },
            Some(entry) => SlotClick {
                empty: false,
                slot: None,
                label: entry.label.clone(),
                device_id: entry.device_id,
            },
        })
    }

    /// Maximal runs of free units, bottom to top.
    pub fn free_runs(&self) -> Vec<RangeInclusive<u32>> {
        let mut runs = Vec::new();
        let mut cursor = 1;
        for entry in &self.entries {
            if entry.start > cursor {
                runs.push(cursor..=entry.start - 1);
            }
            cursor = entry.top() + 1;
        }
        if cursor <= self.units {
            runs.push(cursor..=self.units);
        }
        runs
    }

    /// Lowest start slot with `height` contiguous free units.
    pub fn first_fit(&self, height: u32) -> Option<u32> {
        if height == 0 {
            return None;
        }
        self.free_runs()
            .into_iter()
            .find(|run| run.end() - run.start() + 1 >= height)
            .map(|run| *run.start())
    }
}
