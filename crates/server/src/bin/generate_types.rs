//! Prints the TypeScript declarations of the API types, or writes them to
//! the path given as first argument.

use db::models::{
    change_log::{ChangeAction, ChangeEntity, ChangeLogEntry, ChangeLogFilter},
    device::{CreateDevice, Device, DeviceFilter, DeviceStatus, UpdateDevice},
    listing::{Page, PageQuery},
    rack::{CreateRack, Rack, RackFilter, RackStatus, UpdateRack},
    site::{CreateSite, Site, SiteFilter, SiteLevel},
};
use services::services::{
    hierarchy::{HierarchyNode, NodeKind},
    inventory::{
        DeviceDetails, ElevationView, FreeRun, FreeSpace, PlaceDevice, RackDetails, RackStats,
    },
    rack_capacity::RackCapacity,
    rack_elevation::{AnchorPolicy, OccupancyEntry, RackElevation, SlotClick, SlotView},
    search::{SearchCounts, SearchResults},
    summary::{LocationSummary, LocationSummaryReport},
};
use ts_rs::TS;
use utils::response::ApiResponse;

fn main() -> anyhow::Result<()> {
    let decls = [
        PageQuery::decl(),
        Page::<()>::decl(),
        SiteLevel::decl(),
        Site::decl(),
        CreateSite::decl(),
        SiteFilter::decl(),
        RackStatus::decl(),
        Rack::decl(),
        CreateRack::decl(),
        UpdateRack::decl(),
        RackFilter::decl(),
        DeviceStatus::decl(),
        Device::decl(),
        CreateDevice::decl(),
        UpdateDevice::decl(),
        DeviceFilter::decl(),
        PlaceDevice::decl(),
        ChangeEntity::decl(),
        ChangeAction::decl(),
        ChangeLogEntry::decl(),
        ChangeLogFilter::decl(),
        AnchorPolicy::decl(),
        OccupancyEntry::decl(),
        RackElevation::decl(),
        SlotView::decl(),
        SlotClick::decl(),
        RackCapacity::decl(),
        ElevationView::decl(),
        RackStats::decl(),
        RackDetails::decl(),
        DeviceDetails::decl(),
        FreeRun::decl(),
        FreeSpace::decl(),
        NodeKind::decl(),
        HierarchyNode::decl(),
        LocationSummary::decl(),
        LocationSummaryReport::decl(),
        SearchCounts::decl(),
        SearchResults::decl(),
        ApiResponse::<()>::decl(),
    ];

    let mut output = String::from("// Generated by generate_types. Do not edit.\n\n");
    for decl in decls {
        output.push_str("export ");
        output.push_str(&decl);
        output.push_str("\n\n");
    }

    match std::env::args().nth(1) {
        Some(path) => std::fs::write(&path, output)?,
        None => print!("{output}"),
    }
    Ok(())
}
