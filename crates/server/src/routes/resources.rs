//! The generic CRUD surface mounted once per resource kind. The kind is
//! injected as a request extension so one set of handlers serves every
//! collection.

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{document::Document, resource::ResourceKind};
use serde_json::{Map, Value};
use utils::response::{Ack, ApiResponse, DefaultObj, Item, Items, SchemaDoc};

use crate::{AppState, error::ApiError, middleware::require_admin};

type Params = Query<Vec<(String, String)>>;

fn first<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.as_str())
}

/// GET /api/{plural}?page=&per=
pub async fn list(
    State(state): State<AppState>,
    Extension(kind): Extension<ResourceKind>,
    Query(params): Params,
) -> Result<ResponseJson<ApiResponse<Items<Document>>>, ApiError> {
    let listing = state
        .service(kind)
        .list(first(&params, "page"), first(&params, "per"))
        .await?;
    Ok(ResponseJson(ApiResponse::success(listing.into())))
}

/// GET /api/{plural}/search?field=value&...
pub async fn search(
    State(state): State<AppState>,
    Extension(kind): Extension<ResourceKind>,
    Query(params): Params,
) -> Result<ResponseJson<ApiResponse<Items<Document>>>, ApiError> {
    let listing = state.service(kind).search(&params).await?;
    Ok(ResponseJson(ApiResponse::success(listing.into())))
}

/// GET /api/{plural}/schema (admin only)
pub async fn get_schema(
    State(state): State<AppState>,
    Extension(kind): Extension<ResourceKind>,
) -> ResponseJson<ApiResponse<SchemaDoc<Value>>> {
    ResponseJson(ApiResponse::success(SchemaDoc {
        schema: state.service(kind).get_schema(),
    }))
}

/// GET /api/{plural}/default
pub async fn get_default(
    State(state): State<AppState>,
    Extension(kind): Extension<ResourceKind>,
) -> ResponseJson<ApiResponse<DefaultObj<Map<String, Value>>>> {
    ResponseJson(ApiResponse::success(DefaultObj {
        default_obj: state.service(kind).get_default(),
    }))
}

/// GET /api/{plural}/by-values/{ref_key}?{ref_key}=a&{ref_key}=b
pub async fn list_by_values(
    State(state): State<AppState>,
    Extension(kind): Extension<ResourceKind>,
    Path(ref_key): Path<String>,
    Query(params): Params,
) -> Result<ResponseJson<ApiResponse<Items<Document>>>, ApiError> {
    let items = state.service(kind).list_by_values(&ref_key, &params).await?;
    Ok(ResponseJson(ApiResponse::success(Items {
        items,
        pagination: None,
    })))
}

/// GET /api/{plural}/by-ref/{ref_key}/{ref_id}
pub async fn list_by_ref(
    State(state): State<AppState>,
    Extension(kind): Extension<ResourceKind>,
    Path((ref_key, ref_id)): Path<(String, String)>,
) -> Result<ResponseJson<ApiResponse<Items<Document>>>, ApiError> {
    let items = state
        .service(kind)
        .list_by_refs(&ref_key, &ref_id, None)
        .await?;
    Ok(ResponseJson(ApiResponse::success(Items {
        items,
        pagination: None,
    })))
}

/// GET /api/{plural}/by-ref/{ref_key}/{ref_id}/{key}/{value}/...
pub async fn list_by_refs(
    State(state): State<AppState>,
    Extension(kind): Extension<ResourceKind>,
    Path((ref_key, ref_id, rest)): Path<(String, String, String)>,
) -> Result<ResponseJson<ApiResponse<Items<Document>>>, ApiError> {
    let items = state
        .service(kind)
        .list_by_refs(&ref_key, &ref_id, Some(&rest))
        .await?;
    Ok(ResponseJson(ApiResponse::success(Items {
        items,
        pagination: None,
    })))
}

/// GET /api/{plural}/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Extension(kind): Extension<ResourceKind>,
    Path(id): Path<String>,
) -> Result<ResponseJson<ApiResponse<Item<Document>>>, ApiError> {
    let item = state.service(kind).get_by_id(&id).await?;
    Ok(ResponseJson(ApiResponse::success(Item { item })))
}

/// POST /api/{plural}
pub async fn create(
    State(state): State<AppState>,
    Extension(kind): Extension<ResourceKind>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<ResponseJson<ApiResponse<Item<Document>>>, ApiError> {
    let Json(body) = payload?;
    let item = state.service(kind).create(body).await?;
    Ok(ResponseJson(ApiResponse::success(Item { item })))
}

/// PUT /api/{plural}/{id}
pub async fn update(
    State(state): State<AppState>,
    Extension(kind): Extension<ResourceKind>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<ResponseJson<ApiResponse<Item<Document>>>, ApiError> {
    let Json(body) = payload?;
    let item = state.service(kind).update(&id, body).await?;
    Ok(ResponseJson(ApiResponse::success(Item { item })))
}

/// DELETE /api/{plural}/{id}
pub async fn delete(
    State(state): State<AppState>,
    Extension(kind): Extension<ResourceKind>,
    Path(id): Path<String>,
) -> Result<ResponseJson<ApiResponse<Ack>>, ApiError> {
    state.service(kind).delete(&id).await?;
    Ok(ResponseJson(ApiResponse::acknowledged(format!(
        "Deleted {}",
        kind.def().singular
    ))))
}

pub fn router(state: &AppState, kind: ResourceKind) -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/search", get(search))
        .route(
            "/schema",
            get(get_schema).route_layer(from_fn_with_state(state.clone(), require_admin)),
        )
        .route("/default", get(get_default))
        .route("/by-values/{ref_key}", get(list_by_values))
        .route("/by-ref/{ref_key}/{ref_id}", get(list_by_ref))
        .route("/by-ref/{ref_key}/{ref_id}/{*rest}", get(list_by_refs))
        .route("/{id}", get(get_by_id).put(update).delete(delete))
        .layer(Extension(kind))
}
