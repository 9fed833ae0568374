pub mod config;
pub mod deployment;
pub mod error;
pub mod routes;

use axum::{Router, http::HeaderValue};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

pub use deployment::DeploymentImpl;

use crate::config::CorsOrigins;

fn cors_layer(origins: &CorsOrigins) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match origins {
        CorsOrigins::Any => layer.allow_origin(Any),
        CorsOrigins::List(list) => {
            let parsed: Vec<HeaderValue> = list
                .iter()
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!(origin = %origin, "Ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            layer.allow_origin(AllowOrigin::list(parsed))
        }
    }
}

/// Full application router with CORS and request tracing.
pub fn app(deployment: &DeploymentImpl) -> Router {
    routes::router(deployment)
        .layer(cors_layer(&deployment.config().cors_origins))
        .layer(TraceLayer::new_for_http())
}
