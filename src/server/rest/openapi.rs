use utoipa::OpenApi;

use crate::docker::InstanceStatus;
use crate::operator::{
    CreatedInstance, InspectionOutcome, InstanceView, RawEditInput, RawInstanceInput,
    StorageOutcome, UsageSnapshot,
};
use crate::server::rest::{
    error::{ErrorDetails, ErrorResponse},
    handlers::instances::ToggleResponse,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::server::rest::openapi::health,
        crate::server::rest::openapi::version,
        crate::server::rest::openapi::list_instances,
        crate::server::rest::openapi::create_instance,
        crate::server::rest::openapi::monitor_instances,
        crate::server::rest::openapi::edit_instance,
        crate::server::rest::openapi::toggle_instance,
        crate::server::rest::openapi::delete_instance,
    ),
    components(
        schemas(
            InstanceView,
            InspectionOutcome,
            InstanceStatus,
            UsageSnapshot,
            RawInstanceInput,
            RawEditInput,
            CreatedInstance,
            StorageOutcome,
            ToggleResponse,
            ErrorResponse,
            ErrorDetails,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Instances", description = "VPS instance management"),
    ),
    info(
        title = "vpsman REST API",
        version = "0.1.0",
        description = "Manage container-backed VPS instances on a single host",
        license(name = "MIT"),
    ),
    servers(
        (url = "/", description = "Current server"),
    ),
)]
pub struct ApiDoc;

// Health endpoints
#[utoipa::path(
    get,
    path = "/api/v0/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
)]
#[allow(dead_code)]
pub async fn health() {}

#[utoipa::path(
    get,
    path = "/api/v0/version",
    tag = "Health",
    responses(
        (status = 200, description = "API version", body = serde_json::Value),
    ),
)]
#[allow(dead_code)]
pub async fn version() {}

// Instance endpoints
#[utoipa::path(
    get,
    path = "/api/v0/instances",
    tag = "Instances",
    responses(
        (status = 200, description = "Managed instances, including ones that could not be inspected", body = Vec<InstanceView>),
        (status = 502, description = "Container runtime unavailable", body = ErrorResponse),
    ),
)]
#[allow(dead_code)]
pub async fn list_instances() {}

#[utoipa::path(
    post,
    path = "/api/v0/instances",
    tag = "Instances",
    request_body = RawInstanceInput,
    responses(
        (status = 201, description = "Instance created", body = CreatedInstance),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 409, description = "Host port taken concurrently; safe to retry", body = ErrorResponse),
        (status = 502, description = "Container runtime error", body = ErrorResponse),
    ),
)]
#[allow(dead_code)]
pub async fn create_instance() {}

#[utoipa::path(
    get,
    path = "/api/v0/monitor",
    tag = "Instances",
    responses(
        (status = 200, description = "Live usage of running managed instances", body = Vec<UsageSnapshot>),
        (status = 502, description = "Container runtime error", body = ErrorResponse),
    ),
)]
#[allow(dead_code)]
pub async fn monitor_instances() {}

#[utoipa::path(
    put,
    path = "/api/v0/instances/{name}",
    tag = "Instances",
    params(
        ("name" = String, Path, description = "Instance name")
    ),
    request_body = RawEditInput,
    responses(
        (status = 200, description = "Instance recreated with new settings", body = CreatedInstance),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 500, description = "Instance was removed but could not be recreated", body = ErrorResponse),
        (status = 502, description = "Container runtime error", body = ErrorResponse),
    ),
)]
#[allow(dead_code)]
pub async fn edit_instance() {}

#[utoipa::path(
    post,
    path = "/api/v0/instances/{name}/toggle",
    tag = "Instances",
    params(
        ("name" = String, Path, description = "Instance name")
    ),
    responses(
        (status = 200, description = "New run state", body = ToggleResponse),
        (status = 404, description = "Instance not found", body = ErrorResponse),
        (status = 502, description = "Container runtime error", body = ErrorResponse),
    ),
)]
#[allow(dead_code)]
pub async fn toggle_instance() {}

#[utoipa::path(
    delete,
    path = "/api/v0/instances/{name}",
    tag = "Instances",
    params(
        ("name" = String, Path, description = "Instance name")
    ),
    responses(
        (status = 204, description = "Instance removed or already absent"),
        (status = 502, description = "Container runtime error", body = ErrorResponse),
    ),
)]
#[allow(dead_code)]
pub async fn delete_instance() {}
