pub mod resources;

use axum::{
    Router,
    http::HeaderValue,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::resource::ResourceKind;
use strum::IntoEnumIterator;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;
use utils::response::{Ack, ApiResponse};

use crate::{AppState, config::ServerConfig};

pub async fn health() -> ResponseJson<ApiResponse<Ack>> {
    ResponseJson(ApiResponse::acknowledged("ok"))
}

fn cors(config: &ServerConfig) -> CorsLayer {
    let Some(origin) = config.cors_origin.as_deref() else {
        return CorsLayer::permissive();
    };
    match origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any),
        Err(_) => {
            warn!(origin, "ignoring unparseable CORS_ORIGIN, allowing any origin");
            CorsLayer::permissive()
        }
    }
}

pub fn router(state: AppState) -> Router {
    let api = ResourceKind::iter().fold(
        Router::new().route("/health", get(health)),
        |api, kind| api.nest(&format!("/{}", kind.plural()), resources::router(&state, kind)),
    );

    Router::new()
        .nest("/api", api)
        .layer(cors(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
