use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::{AppState, error::ApiError};

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Lets the request through only when `x-admin-token` matches the configured
/// token. Without a configured token every request is refused.
pub async fn require_admin(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let presented = request
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());

    match (state.config.admin_token.as_deref(), presented) {
        (Some(expected), Some(presented)) if expected == presented => next.run(request).await,
        _ => {
            warn!(path = %request.uri().path(), "rejected non-admin request");
            ApiError::Forbidden.into_response()
        }
    }
}
