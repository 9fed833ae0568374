use axum::{
    http::StatusCode,
    response::{IntoResponse, Json as ResponseJson, Response},
};
use services::services::{
    database_validator::DatabaseValidationError, inventory::InventoryError, search::SearchError,
};
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Inventory(#[from] InventoryError),
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    DatabaseValidation(#[from] DatabaseValidationError),
    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Inventory(err) => match err {
                InventoryError::NotFound { .. } => StatusCode::NOT_FOUND,
                InventoryError::Conflict(_) => StatusCode::CONFLICT,
                InventoryError::Invalid(_)
                | InventoryError::Placement(_)
                | InventoryError::Occupancy(_)
                | InventoryError::Paging(_) => StatusCode::BAD_REQUEST,
                InventoryError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Search(err) => match err {
                SearchError::EmptyQuery | SearchError::Limit { .. } => StatusCode::BAD_REQUEST,
                SearchError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Database(_) | ApiError::DatabaseValidation(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            "Internal server error".to_string()
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
            self.to_string()
        };
        (status, ResponseJson(ApiResponse::<()>::error(&message))).into_response()
    }
}
