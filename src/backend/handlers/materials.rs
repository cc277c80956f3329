// src/backend/handlers/materials.rs
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use sqlx::{Pool, Sqlite};

use super::read_upload;
use crate::backend::{AppState, CurrentUser};
use crate::database::db::queries::materials::MaterialFilter;
use crate::database::db::queries::{items, materials, works};
use crate::database::models::Material;
use crate::error::{ApiError, ApiResult};
use crate::policy::ensure_can_mutate;
use crate::storage::MATERIALS_DIR;

#[derive(Debug, Default, Deserialize)]
pub struct MaterialQuery {
    pub work: Option<i64>,
    pub item: Option<i64>,
}

/// What a material hangs off. Exactly one target per material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Work(i64),
    Item(i64),
}

impl Target {
    fn from_fields(work: Option<i64>, item: Option<i64>) -> ApiResult<Self> {
        match (work, item) {
            (Some(work), None) => Ok(Self::Work(work)),
            (None, Some(item)) => Ok(Self::Item(item)),
            (Some(_), Some(_)) => Err(ApiError::validation(
                "non_field_errors",
                "a material belongs to either a work or an item, not both",
            )),
            (None, None) => Err(ApiError::validation(
                "non_field_errors",
                "either work or item is required",
            )),
        }
    }
}

/// Owner of a material: the responsible of its work, or the uploader for item-level files.
async fn material_owner(pool: &Pool<Sqlite>, material: &Material) -> ApiResult<i64> {
    match material.work_id {
        Some(work_id) => Ok(works::get_work(pool, work_id)
            .await?
            .map(|w| w.responsible_id)
            .unwrap_or(material.uploaded_by)),
        None => Ok(material.uploaded_by),
    }
}

pub async fn list_materials(
    State(state): State<AppState>,
    CurrentUser(_actor): CurrentUser,
    Query(query): Query<MaterialQuery>,
) -> ApiResult<Json<Vec<Material>>> {
    let filter = MaterialFilter {
        work_id: query.work,
        item_id: query.item,
    };
    Ok(Json(materials::list_materials(&state.db, filter).await?))
}

pub async fn get_material(
    State(state): State<AppState>,
    CurrentUser(_actor): CurrentUser,
    Path(material_id): Path<i64>,
) -> ApiResult<Json<Material>> {
    materials::get_material(&state.db, material_id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("material"))
}

pub async fn upload_material(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Material>)> {
    let upload = read_upload(multipart).await?;
    let target = Target::from_fields(upload.id_field("work")?, upload.id_field("item")?)?;

    match target {
        Target::Work(work_id) => {
            let work = works::get_work(&state.db, work_id)
                .await?
                .ok_or(ApiError::NotFound("work"))?;
            ensure_can_mutate(&actor, work.responsible_id)?;
        }
        Target::Item(item_id) => {
            items::get_item(&state.db, item_id)
                .await?
                .ok_or(ApiError::NotFound("item"))?;
        }
    }

    let (original_name, bytes) = upload.require_file()?;
    let stored = state.files.save(MATERIALS_DIR, &original_name, &bytes).await?;

    let (work_id, item_id) = match target {
        Target::Work(id) => (Some(id), None),
        Target::Item(id) => (None, Some(id)),
    };
    let inserted = materials::insert_material(&state.db, work_id, item_id, &stored, &original_name, actor.id).await;
    let material = match inserted {
        Ok(material) => material,
        Err(err) => {
            // no row may point at a file that is not there, and no file may outlive its row
            if let Err(cleanup) = state.files.remove(&stored).await {
                tracing::warn!(file = %stored, error = %cleanup, "orphaned attachment left on disk");
            }
            return Err(err.into());
        }
    };

    tracing::info!(material = material.id, ?work_id, ?item_id, actor = actor.id, "material uploaded");
    Ok((StatusCode::CREATED, Json(material)))
}

pub async fn delete_material(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(material_id): Path<i64>,
) -> ApiResult<StatusCode> {
    let material = materials::get_material(&state.db, material_id)
        .await?
        .ok_or(ApiError::NotFound("material"))?;
    ensure_can_mutate(&actor, material_owner(&state.db, &material).await?)?;

    if !materials::delete_material(&state.db, material_id).await? {
        return Err(ApiError::NotFound("material"));
    }
    if let Err(err) = state.files.remove(&material.file).await {
        tracing::warn!(file = %material.file, error = %err, "could not remove material file");
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_one_target_is_required() {
        assert_eq!(Target::from_fields(Some(1), None).unwrap(), Target::Work(1));
        assert_eq!(Target::from_fields(None, Some(2)).unwrap(), Target::Item(2));
        assert!(Target::from_fields(Some(1), Some(2)).is_err());
        assert!(Target::from_fields(None, None).is_err());
    }
}
