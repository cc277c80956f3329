// src/backend/handlers/users.rs
use axum::extract::State;
use axum::Json;

use crate::backend::{AppState, CurrentUser};
use crate::database::db::queries::users;
use crate::database::models::UserDto;
use crate::error::ApiResult;

/// Active users, for the "responsible" pickers.
pub async fn list_users(
    State(state): State<AppState>,
    CurrentUser(_actor): CurrentUser,
) -> ApiResult<Json<Vec<UserDto>>> {
    let list = users::list_users(&state.db).await?;
    Ok(Json(list.iter().map(UserDto::from).collect()))
}
