use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use services::services::summary::LocationSummaryReport;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError};

/// GET /api/dcim/summary/locations
/// Per-location totals, served from a short-lived cache
pub async fn get_location_summary(
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<LocationSummaryReport>>, ApiError> {
    let report = deployment.summary().locations().await?;
    Ok(ResponseJson(ApiResponse::success(report.as_ref().clone())))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route("/dcim/summary/locations", get(get_location_summary))
}
