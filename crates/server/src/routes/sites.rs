use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{delete, get},
};
use db::models::{
    listing::{Page, PageQuery},
    rack::Rack,
    site::{CreateSite, Site, SiteFilter},
};
use services::services::hierarchy::{HierarchyNode, build_hierarchy};
use uuid::Uuid;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError};

/// GET /api/dcim/sites?level=&parent_id=&name=&description=&offset=&page_size=
pub async fn list_sites(
    State(deployment): State<DeploymentImpl>,
    Query(filter): Query<SiteFilter>,
    Query(page): Query<PageQuery>,
) -> Result<ResponseJson<ApiResponse<Page<Site>>>, ApiError> {
    let sites = deployment.inventory().list_sites(&filter, page).await?;
    Ok(ResponseJson(ApiResponse::success(sites)))
}

/// POST /api/dcim/sites
pub async fn create_site(
    State(deployment): State<DeploymentImpl>,
    axum::Json(payload): axum::Json<CreateSite>,
) -> Result<ResponseJson<ApiResponse<Site>>, ApiError> {
    let site = deployment.inventory().create_site(payload).await?;
    Ok(ResponseJson(ApiResponse::success(site)))
}

/// DELETE /api/dcim/sites/{id}
/// Removes the site with its subtree; devices in removed racks are unmounted
pub async fn delete_site(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    deployment.inventory().delete_site(id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// GET /api/dcim/hierarchy
pub async fn get_hierarchy(
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<HierarchyNode>>>, ApiError> {
    let pool = &deployment.db().pool;
    let sites = Site::find_all(pool).await?;
    let racks = Rack::find_all(pool).await?;
    Ok(ResponseJson(ApiResponse::success(build_hierarchy(
        &sites, &racks,
    ))))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/dcim/sites", get(list_sites).post(create_site))
        .route("/dcim/sites/{id}", delete(delete_site))
        .route("/dcim/hierarchy", get(get_hierarchy))
}
