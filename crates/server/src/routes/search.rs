use axum::{
    Router,
    extract::{Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use serde::Deserialize;
use services::services::search::{self, SearchResults};
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub limit_per_type: Option<i64>,
}

/// GET /api/dcim/search?q=&limit_per_type=
/// Matches sites, racks and devices by name and descriptive fields
pub async fn search_inventory(
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<SearchQuery>,
) -> Result<ResponseJson<ApiResponse<SearchResults>>, ApiError> {
    let results = search::search(
        &deployment.db().pool,
        query.q.as_deref().unwrap_or_default(),
        query.limit_per_type,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(results)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route("/dcim/search", get(search_inventory))
}
