use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    listing::{Page, PageQuery},
    rack::{CreateRack, Rack, RackFilter, UpdateRack},
};
use serde::Deserialize;
use services::services::{
    inventory::{ElevationView, FreeSpace, RackDetails},
    rack_elevation::{AnchorPolicy, SlotClick},
};
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct ElevationQuery {
    pub anchor: Option<AnchorPolicy>,
    pub unit_px: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FreeSpaceQuery {
    pub height: Option<u32>,
}

/// GET /api/dcim/racks?datacenter_id=&name=&status=&height=&description=&offset=&page_size=
pub async fn list_racks(
    State(deployment): State<DeploymentImpl>,
    Query(filter): Query<RackFilter>,
    Query(page): Query<PageQuery>,
) -> Result<ResponseJson<ApiResponse<Page<Rack>>>, ApiError> {
    let racks = deployment.inventory().list_racks(&filter, page).await?;
    Ok(ResponseJson(ApiResponse::success(racks)))
}

/// POST /api/dcim/racks
pub async fn create_rack(
    State(deployment): State<DeploymentImpl>,
    axum::Json(payload): axum::Json<CreateRack>,
) -> Result<ResponseJson<ApiResponse<Rack>>, ApiError> {
    let rack = deployment.inventory().create_rack(payload).await?;
    Ok(ResponseJson(ApiResponse::success(rack)))
}

/// GET /api/dcim/racks/{name}
/// Rack, mounted devices, capacity stats and the elevation render plan
pub async fn get_rack(
    State(deployment): State<DeploymentImpl>,
    Path(name): Path<String>,
) -> Result<ResponseJson<ApiResponse<RackDetails>>, ApiError> {
    let details = deployment.inventory().rack_details(&name).await?;
    Ok(ResponseJson(ApiResponse::success(details)))
}

/// PUT /api/dcim/racks/{name}
pub async fn update_rack(
    State(deployment): State<DeploymentImpl>,
    Path(name): Path<String>,
    axum::Json(payload): axum::Json<UpdateRack>,
) -> Result<ResponseJson<ApiResponse<Rack>>, ApiError> {
    let rack = deployment.inventory().update_rack(&name, payload).await?;
    Ok(ResponseJson(ApiResponse::success(rack)))
}

/// DELETE /api/dcim/racks/{name}
/// Mounted devices are kept in inventory, unmounted
pub async fn delete_rack(
    State(deployment): State<DeploymentImpl>,
    Path(name): Path<String>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    deployment.inventory().delete_rack(&name).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// GET /api/dcim/racks/{name}/elevation?anchor=&unit_px=
pub async fn get_elevation(
    State(deployment): State<DeploymentImpl>,
    Path(name): Path<String>,
    Query(query): Query<ElevationQuery>,
) -> Result<ResponseJson<ApiResponse<ElevationView>>, ApiError> {
    if query.unit_px == Some(0) {
        return Err(ApiError::BadRequest("unit_px must be at least 1".to_string()));
    }
    let view = deployment
        .inventory()
        .elevation_view(&name, query.anchor, query.unit_px)
        .await?;
    Ok(ResponseJson(ApiResponse::success(view)))
}

/// GET /api/dcim/racks/{name}/slots/{slot}
/// What a click on the slot opens: "add device here" or the occupying device
pub async fn click_slot(
    State(deployment): State<DeploymentImpl>,
    Path((name, slot)): Path<(String, u32)>,
) -> Result<ResponseJson<ApiResponse<SlotClick>>, ApiError> {
    let click = deployment.inventory().click_slot(&name, slot).await?;
    Ok(ResponseJson(ApiResponse::success(click)))
}

/// GET /api/dcim/racks/{name}/free-space?height=
pub async fn get_free_space(
    State(deployment): State<DeploymentImpl>,
    Path(name): Path<String>,
    Query(query): Query<FreeSpaceQuery>,
) -> Result<ResponseJson<ApiResponse<FreeSpace>>, ApiError> {
    let free = deployment.inventory().free_space(&name, query.height).await?;
    Ok(ResponseJson(ApiResponse::success(free)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/dcim/racks", get(list_racks).post(create_rack))
        .route(
            "/dcim/racks/{name}",
            get(get_rack).put(update_rack).delete(delete_rack),
        )
        .route("/dcim/racks/{name}/elevation", get(get_elevation))
        .route("/dcim/racks/{name}/slots/{slot}", get(click_slot))
        .route("/dcim/racks/{name}/free-space", get(get_free_space))
}
