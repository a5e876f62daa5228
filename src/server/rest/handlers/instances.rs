use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::docker::InstanceStatus;
use crate::operator::{CreatedInstance, InstanceView, RawEditInput, RawInstanceInput, UsageSnapshot};
use crate::server::rest::error::{ApiError, ApiResult};
use crate::server::rest::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct ToggleResponse {
    pub name: String,
    pub state: InstanceStatus,
}

pub async fn list_instances(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<InstanceView>>> {
    let views = state.manager.inventory().list().await?;
    Ok(Json(views))
}

pub async fn monitor_instances(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<UsageSnapshot>>> {
    let snapshots = state.manager.inventory().monitor().await?;
    Ok(Json(snapshots))
}

pub async fn create_instance(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RawInstanceInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreatedInstance>)> {
    let Json(raw) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let created = state.manager.provision(raw).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn edit_instance(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    payload: Result<Json<RawEditInput>, JsonRejection>,
) -> ApiResult<Json<CreatedInstance>> {
    let Json(raw) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let edited = state.manager.edit(&name, raw).await?;
    Ok(Json(edited))
}

pub async fn toggle_instance(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Json<ToggleResponse>> {
    let new_state = state.manager.toggle(&name).await?;
    Ok(Json(ToggleResponse {
        name,
        state: new_state,
    }))
}

pub async fn delete_instance(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    state.manager.delete(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}
