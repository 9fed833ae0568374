use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, put},
};
use db::models::{
    device::{CreateDevice, Device, DeviceFilter, UpdateDevice},
    listing::{Page, PageQuery},
};
use serde::Deserialize;
use services::services::inventory::{DeviceDetails, PlaceDevice};
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct DeviceQuery {
    pub rack: Option<String>,
}

/// GET /api/dcim/devices?rack=&mounted=&name=&status=&serial_no=&ip=&description=&offset=&page_size=
pub async fn list_devices(
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<DeviceQuery>,
    Query(filter): Query<DeviceFilter>,
    Query(page): Query<PageQuery>,
) -> Result<ResponseJson<ApiResponse<Page<Device>>>, ApiError> {
    let devices = deployment
        .inventory()
        .list_devices(query.rack.as_deref(), filter, page)
        .await?;
    Ok(ResponseJson(ApiResponse::success(devices)))
}

/// POST /api/dcim/devices
/// Mounts the device right away when `rack_name` is given
pub async fn create_device(
    State(deployment): State<DeploymentImpl>,
    axum::Json(payload): axum::Json<CreateDevice>,
) -> Result<ResponseJson<ApiResponse<Device>>, ApiError> {
    let device = deployment.inventory().create_device(payload).await?;
    Ok(ResponseJson(ApiResponse::success(device)))
}

/// GET /api/dcim/devices/{name}
pub async fn get_device(
    State(deployment): State<DeploymentImpl>,
    Path(name): Path<String>,
) -> Result<ResponseJson<ApiResponse<DeviceDetails>>, ApiError> {
    let details = deployment.inventory().device_details(&name).await?;
    Ok(ResponseJson(ApiResponse::success(details)))
}

/// PUT /api/dcim/devices/{name}
pub async fn update_device(
    State(deployment): State<DeploymentImpl>,
    Path(name): Path<String>,
    axum::Json(payload): axum::Json<UpdateDevice>,
) -> Result<ResponseJson<ApiResponse<Device>>, ApiError> {
    let device = deployment.inventory().update_device(&name, payload).await?;
    Ok(ResponseJson(ApiResponse::success(device)))
}

/// DELETE /api/dcim/devices/{name}
pub async fn delete_device(
    State(deployment): State<DeploymentImpl>,
    Path(name): Path<String>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    deployment.inventory().delete_device(&name).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// PUT /api/dcim/devices/{name}/placement
/// Mount, move or resize; a null `rack_name` unmounts
pub async fn place_device(
    State(deployment): State<DeploymentImpl>,
    Path(name): Path<String>,
    axum::Json(payload): axum::Json<PlaceDevice>,
) -> Result<ResponseJson<ApiResponse<Device>>, ApiError> {
    let device = deployment.inventory().place_device(&name, payload).await?;
    Ok(ResponseJson(ApiResponse::success(device)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/dcim/devices", get(list_devices).post(create_device))
        .route(
            "/dcim/devices/{name}",
            get(get_device).put(update_device).delete(delete_device),
        )
        .route("/dcim/devices/{name}/placement", put(place_device))
}
