use axum::{
    http::StatusCode,
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::server::rest::{
    handlers::instances, logging_middleware::request_logging_middleware, openapi::ApiDoc, AppState,
};

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .route(
            "/instances",
            get(instances::list_instances).post(instances::create_instance),
        )
        .route(
            "/instances/{name}",
            put(instances::edit_instance).delete(instances::delete_instance),
        )
        .route("/instances/{name}/toggle", post(instances::toggle_instance))
        // Kept outside /instances so every name there is an instance.
        .route("/monitor", get(instances::monitor_instances))
        .with_state(state);

    Router::new()
        .nest("/api/v0", api_routes)
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(TraceLayer::new_for_http())
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn version() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "api": "v0"
    }))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
