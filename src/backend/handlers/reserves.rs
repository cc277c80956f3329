// src/backend/handlers/reserves.rs
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::backend::extract::ApiJson;
use crate::backend::{AppState, CurrentUser};
use crate::database::db::queries::reserves::NewReserve;
use crate::database::db::queries::{items, reserves};
use crate::database::models::ReserveView;
use crate::error::{ApiError, ApiResult};
use crate::ledger::WriteOff;
use crate::policy::ensure_privileged;

#[derive(Debug, Deserialize)]
pub struct ReservePayload {
    pub item: i64,
    pub year: i32,
    pub quarter: i32,
    #[serde(default)]
    pub accrual_sum: Decimal,
    #[serde(default)]
    pub payment_sum: Decimal,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReserveQuery {
    pub item: Option<i64>,
    pub year: Option<i32>,
}

fn validate_reserve(payload: &ReservePayload) -> ApiResult<()> {
    if !(1..=4).contains(&payload.quarter) {
        return Err(ApiError::validation("quarter", "quarter must be between 1 and 4"));
    }
    if payload.accrual_sum < Decimal::ZERO {
        return Err(ApiError::validation("accrual_sum", "must not be negative"));
    }
    if payload.payment_sum < Decimal::ZERO {
        return Err(ApiError::validation("payment_sum", "must not be negative"));
    }
    Ok(())
}

pub async fn list_reserves(
    State(state): State<AppState>,
    CurrentUser(_actor): CurrentUser,
    Query(query): Query<ReserveQuery>,
) -> ApiResult<Json<Vec<ReserveView>>> {
    let list = reserves::list_reserves(&state.db, query.item, query.year).await?;
    Ok(Json(list.into_iter().map(ReserveView::from).collect()))
}

pub async fn get_reserve(
    State(state): State<AppState>,
    CurrentUser(_actor): CurrentUser,
    Path(reserve_id): Path<i64>,
) -> ApiResult<Json<ReserveView>> {
    reserves::get_reserve(&state.db, reserve_id)
        .await?
        .map(|r| Json(ReserveView::from(r)))
        .ok_or(ApiError::NotFound("reserve"))
}

pub async fn create_reserve(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ApiJson(payload): ApiJson<ReservePayload>,
) -> ApiResult<(StatusCode, Json<ReserveView>)> {
    ensure_privileged(&actor)?;
    validate_reserve(&payload)?;
    items::get_item(&state.db, payload.item)
        .await?
        .ok_or(ApiError::NotFound("item"))?;

    let reserve = reserves::create_reserve(
        &state.db,
        &NewReserve {
            item_id: payload.item,
            year: payload.year,
            quarter: payload.quarter,
            accrual_sum: payload.accrual_sum,
            payment_sum: payload.payment_sum,
        },
    )
    .await?;
    tracing::info!(reserve = reserve.id, item = reserve.item_id, year = reserve.year, quarter = reserve.quarter, "reserve created");
    Ok((StatusCode::CREATED, Json(ReserveView::from(reserve))))
}

/// `POST /reserves/{id}/write_off` with `{acc, pay}`; missing sides count as zero.
pub async fn write_off(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(reserve_id): Path<i64>,
    ApiJson(request): ApiJson<WriteOff>,
) -> ApiResult<Json<ReserveView>> {
    tracing::debug!(reserve = reserve_id, actor = actor.id, "write-off requested");
    let reserve = reserves::write_off(&state.db, reserve_id, &request).await?;
    Ok(Json(ReserveView::from(reserve)))
}
