// src/backend/handlers/groups.rs
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::backend::extract::ApiJson;
use crate::backend::{AppState, CurrentUser};
use crate::database::db::queries::groups;
use crate::database::models::Group;
use crate::error::{ApiError, ApiResult};
use crate::policy::ensure_privileged;

#[derive(Debug, Deserialize)]
pub struct GroupPayload {
    pub code: String,
    pub name: String,
}

pub async fn list_groups(
    State(state): State<AppState>,
    CurrentUser(_actor): CurrentUser,
) -> ApiResult<Json<Vec<Group>>> {
    Ok(Json(groups::list_groups(&state.db).await?))
}

pub async fn create_group(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ApiJson(payload): ApiJson<GroupPayload>,
) -> ApiResult<(StatusCode, Json<Group>)> {
    ensure_privileged(&actor)?;

    let code = payload.code.trim();
    if code.is_empty() {
        return Err(ApiError::validation("code", "this field may not be blank"));
    }
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("name", "this field may not be blank"));
    }

    let group = groups::create_group(&state.db, code, name).await?;
    tracing::info!(group = group.id, code = %group.code, "group created");
    Ok((StatusCode::CREATED, Json(group)))
}
