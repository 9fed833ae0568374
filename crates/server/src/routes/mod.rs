use axum::Router;

use crate::DeploymentImpl;

pub mod change_log;
pub mod devices;
pub mod health;
pub mod racks;
pub mod search;
pub mod sites;
pub mod summary;

pub fn router(deployment: &DeploymentImpl) -> Router {
    let api = Router::new()
        .merge(health::router(deployment))
        .merge(sites::router(deployment))
        .merge(racks::router(deployment))
        .merge(devices::router(deployment))
        .merge(search::router(deployment))
        .merge(summary::router(deployment))
        .merge(change_log::router(deployment));

    Router::new()
        .nest("/api", api)
        .with_state(deployment.clone())
}
