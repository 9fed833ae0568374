use axum::{
    Router,
    extract::{Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    change_log::{ChangeLogEntry, ChangeLogFilter},
    listing::{Page, PageQuery},
};
use serde::Deserialize;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Default, Deserialize)]
pub struct ChangeLogQuery {
    pub limit: Option<i64>,
}

/// GET /api/dcim/change-log?limit=
/// Most recent inventory changes, newest first
pub async fn list_changes(
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<ChangeLogQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<ChangeLogEntry>>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    if limit < 1 {
        return Err(ApiError::BadRequest(format!(
            "limit must be at least 1, got {limit}"
        )));
    }
    let entries = ChangeLogEntry::find_recent(&deployment.db().pool, limit.min(MAX_LIMIT)).await?;
    Ok(ResponseJson(ApiResponse::success(entries)))
}

/// GET /api/dcim/change-logs?entity=&action=&entity_name=&from=&to=&page=&page_size=
pub async fn list_change_logs(
    State(deployment): State<DeploymentImpl>,
    Query(filter): Query<ChangeLogFilter>,
    Query(page): Query<PageQuery>,
) -> Result<ResponseJson<ApiResponse<Page<ChangeLogEntry>>>, ApiError> {
    let entries = deployment.inventory().list_changes(&filter, page).await?;
    Ok(ResponseJson(ApiResponse::success(entries)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/dcim/change-log", get(list_changes))
        .route("/dcim/change-logs", get(list_change_logs))
}
