// src/backend/auth.rs
//! Session-cookie login and the `CurrentUser` extractor.

use axum::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use super::extract::ApiJson;
use super::AppState;
use crate::database::db::queries::users;
use crate::database::models::{CurrentUserDto, User};
use crate::error::{ApiError, ApiResult};

pub const SESSION_COOKIE: &str = "sessionid";

/// The authenticated actor of a request. Rejects with 401 when there is no live session.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers)
            .ok_or_else(|| ApiError::Authentication("authentication required".to_string()))?;
        let user = users::user_for_session(&state.db, &token, Utc::now())
            .await?
            .ok_or_else(|| ApiError::Authentication("session expired or invalid".to_string()))?;
        Ok(CurrentUser(user))
    }
}

pub(crate) fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

fn session_cookie(token: &str, max_age_secs: i64) -> ApiResult<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE}={token}; HttpOnly; Path=/; SameSite=Lax; Max-Age={max_age_secs}"
    ))
    .map_err(|e| ApiError::Internal(e.to_string()))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let invalid = || ApiError::Authentication("invalid username or password".to_string());

    let (user, hash) = users::find_credentials(&state.db, payload.username.trim())
        .await?
        .ok_or_else(invalid)?;
    if !user.is_active {
        return Err(invalid());
    }

    // bcrypt is deliberately slow; keep it off the async workers
    let password = payload.password;
    let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    if !verified {
        tracing::info!(username = %user.username, "login rejected");
        return Err(invalid());
    }

    let now = Utc::now();
    let purged = users::purge_expired_sessions(&state.db, now).await?;
    if purged > 0 {
        tracing::debug!(purged, "expired sessions removed");
    }

    let token = uuid::Uuid::new_v4().simple().to_string();
    let expires_at = now + state.session_ttl;
    users::create_session(&state.db, &token, user.id, expires_at).await?;
    tracing::info!(user = user.id, "login");

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, session_cookie(&token, state.session_ttl.num_seconds())?);
    Ok((headers, Json(CurrentUserDto::from(&user))))
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<impl IntoResponse> {
    if let Some(token) = session_token(&headers) {
        users::delete_session(&state.db, &token).await?;
    }
    let mut out = HeaderMap::new();
    out.insert(SET_COOKIE, session_cookie("", 0)?);
    Ok((StatusCode::NO_CONTENT, out))
}

pub async fn me(CurrentUser(user): CurrentUser) -> Json<CurrentUserDto> {
    Json(CurrentUserDto::from(&user))
}
