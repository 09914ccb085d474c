use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use services::services::resource::ResourceError;
use thiserror::Error;
use utils::response::{Ack, ApiResponse};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error("{0}")]
    BadRequest(String),
    #[error("Admin access required")]
    Forbidden,
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Controller failures stay on 200 so clients only inspect `success`.
        let status = match &self {
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Resource(_) | ApiError::BadRequest(_) => StatusCode::OK,
        };
        (status, Json(ApiResponse::<Ack>::error(self.to_string()))).into_response()
    }
}
