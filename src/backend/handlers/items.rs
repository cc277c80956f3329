// src/backend/handlers/items.rs
use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use sqlx::{Pool, Sqlite};

use super::works::work_dtos;
use crate::backend::extract::ApiJson;
use crate::backend::{AppState, CurrentUser};
use crate::database::db::queries::items::ItemRecord;
use crate::database::db::queries::works::WorkFilter;
use crate::database::db::queries::{groups, items, materials, works};
use crate::database::models::month::{plan_totals, PlanTotals};
use crate::database::models::{BudgetItem, BudgetItemDto, CertificationPatch, Material, WorkDto};
use crate::error::{ApiError, ApiResult};
use crate::policy::ensure_privileged;

#[derive(Debug, Deserialize)]
pub struct ItemPayload {
    pub name: String,
    #[serde(default)]
    pub position: i64,
    pub group: i64,
    #[serde(flatten)]
    pub certification: CertificationPatch,
}

#[derive(Debug, Default, Deserialize)]
pub struct ItemPatch {
    pub name: Option<String>,
    pub position: Option<i64>,
    pub group: Option<i64>,
    #[serde(flatten)]
    pub certification: CertificationPatch,
}

#[derive(Debug, Default, Deserialize)]
pub struct ItemQuery {
    pub group: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TotalsQuery {
    pub year: Option<i32>,
}

async fn load_item(pool: &Pool<Sqlite>, item_id: i64) -> ApiResult<BudgetItem> {
    items::get_item(pool, item_id)
        .await?
        .ok_or(ApiError::NotFound("item"))
}

async fn ensure_group(pool: &Pool<Sqlite>, group_id: i64) -> ApiResult<()> {
    match groups::get_group(pool, group_id).await? {
        Some(_) => Ok(()),
        None => Err(ApiError::validation("group", format!("unknown group {group_id}"))),
    }
}

fn validate_name(name: &str) -> ApiResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("name", "this field may not be blank"));
    }
    Ok(name.to_string())
}

/// Nests works (with their details and materials) and item-level materials under each item.
async fn item_dtos(pool: &Pool<Sqlite>, list: Vec<BudgetItem>) -> ApiResult<Vec<BudgetItemDto>> {
    let item_ids: Vec<i64> = list.iter().map(|i| i.id).collect();

    let mut works_by_item: HashMap<i64, Vec<WorkDto>> = HashMap::new();
    for dto in work_dtos(pool, works::works_for_items(pool, &item_ids).await?).await? {
        works_by_item.entry(dto.work.item_id).or_default().push(dto);
    }

    let mut materials_by_item: HashMap<i64, Vec<Material>> = HashMap::new();
    for material in materials::materials_for_items(pool, &item_ids).await? {
        if let Some(item_id) = material.item_id {
            materials_by_item.entry(item_id).or_default().push(material);
        }
    }

    Ok(list
        .into_iter()
        .map(|item| BudgetItemDto {
            works: works_by_item.remove(&item.id).unwrap_or_default(),
            materials: materials_by_item.remove(&item.id).unwrap_or_default(),
            item,
        })
        .collect())
}

pub async fn list_items(
    State(state): State<AppState>,
    CurrentUser(_actor): CurrentUser,
    Query(query): Query<ItemQuery>,
) -> ApiResult<Json<Vec<BudgetItemDto>>> {
    let list = items::list_items(&state.db, query.group.as_deref()).await?;
    Ok(Json(item_dtos(&state.db, list).await?))
}

pub async fn get_item(
    State(state): State<AppState>,
    CurrentUser(_actor): CurrentUser,
    Path(item_id): Path<i64>,
) -> ApiResult<Json<BudgetItemDto>> {
    let item = load_item(&state.db, item_id).await?;
    let dto = item_dtos(&state.db, vec![item])
        .await?
        .pop()
        .ok_or(ApiError::NotFound("item"))?;
    Ok(Json(dto))
}

pub async fn create_item(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ApiJson(payload): ApiJson<ItemPayload>,
) -> ApiResult<(StatusCode, Json<BudgetItem>)> {
    ensure_privileged(&actor)?;
    ensure_group(&state.db, payload.group).await?;

    let record = ItemRecord {
        name: validate_name(&payload.name)?,
        position: payload.position,
        group_id: payload.group,
        certification: payload.certification.apply(Default::default()),
    };
    let item = items::create_item(&state.db, &record).await?;
    tracing::info!(item = item.id, group = item.group_id, "budget item created");
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn update_item(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(item_id): Path<i64>,
    ApiJson(payload): ApiJson<ItemPayload>,
) -> ApiResult<Json<BudgetItem>> {
    ensure_privileged(&actor)?;
    load_item(&state.db, item_id).await?;
    ensure_group(&state.db, payload.group).await?;

    let record = ItemRecord {
        name: validate_name(&payload.name)?,
        position: payload.position,
        group_id: payload.group,
        certification: payload.certification.apply(Default::default()),
    };
    save_item(&state.db, item_id, &record).await
}

pub async fn patch_item(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(item_id): Path<i64>,
    ApiJson(patch): ApiJson<ItemPatch>,
) -> ApiResult<Json<BudgetItem>> {
    ensure_privileged(&actor)?;
    let existing = load_item(&state.db, item_id).await?;
    if let Some(group_id) = patch.group {
        ensure_group(&state.db, group_id).await?;
    }

    let record = ItemRecord {
        name: match patch.name {
            Some(name) => validate_name(&name)?,
            None => existing.name,
        },
        position: patch.position.unwrap_or(existing.position),
        group_id: patch.group.unwrap_or(existing.group_id),
        certification: patch.certification.apply(existing.certification),
    };
    save_item(&state.db, item_id, &record).await
}

async fn save_item(pool: &Pool<Sqlite>, item_id: i64, record: &ItemRecord) -> ApiResult<Json<BudgetItem>> {
    if !items::update_item(pool, item_id, record).await? {
        return Err(ApiError::NotFound("item"));
    }
    Ok(Json(load_item(pool, item_id).await?))
}

pub async fn delete_item(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(item_id): Path<i64>,
) -> ApiResult<StatusCode> {
    ensure_privileged(&actor)?;
    if !items::delete_item(&state.db, item_id).await? {
        return Err(ApiError::NotFound("item"));
    }
    tracing::info!(item = item_id, actor = actor.id, "budget item deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /items/{id}/totals`: plan sums of the item's works per month and quarter.
pub async fn item_totals(
    State(state): State<AppState>,
    CurrentUser(_actor): CurrentUser,
    Path(item_id): Path<i64>,
    Query(query): Query<TotalsQuery>,
) -> ApiResult<Json<PlanTotals>> {
    load_item(&state.db, item_id).await?;
    let filter = WorkFilter {
        item_id: Some(item_id),
        year: query.year,
        ..WorkFilter::default()
    };
    let list = works::list_works(&state.db, &filter).await?;
    Ok(Json(plan_totals(list.iter().map(|w| (&w.accruals, &w.payments)))?))
}
