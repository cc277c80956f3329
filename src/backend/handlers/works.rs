// src/backend/handlers/works.rs
use std::collections::{BTreeMap, HashMap};

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Datelike;
use serde::Deserialize;
use sqlx::{Pool, Sqlite};

use super::read_upload;
use crate::backend::extract::ApiJson;
use crate::backend::{AppState, CurrentUser};
use crate::database::db::queries::works::{DetailChanges, WorkFilter, WorkRecord};
use crate::database::db::queries::{details, items, materials, users, works};
use crate::database::models::detail::{
    details_to_legacy, legacy_to_details, reconcile_attachments, validate_details,
};
use crate::database::models::month::{validate_month, validate_plan};
use crate::database::models::{
    CertificationPatch, DetailInput, DetailKind, Feasibility, LegacyMonthlyEntry, Material,
    MonthlyPlan, User, VatRate, Work, WorkDetail, WorkDto,
};
use crate::error::{ApiError, ApiResult};
use crate::policy::{ensure_can_mutate, resolve_responsible};
use crate::storage::DETAIL_FILES_DIR;

type LegacyMap = BTreeMap<String, LegacyMonthlyEntry>;

/// Body of `POST /works` and `PUT /works/{id}`.
#[derive(Debug, Deserialize)]
pub struct WorkPayload {
    pub item: i64,
    pub name: String,
    #[serde(default)]
    pub justification: String,
    #[serde(default)]
    pub comment: String,
    #[serde(flatten)]
    pub certification: CertificationPatch,
    #[serde(default)]
    pub accruals: MonthlyPlan,
    #[serde(default)]
    pub payments: MonthlyPlan,
    pub year: Option<i32>,
    pub responsible: Option<i64>,
    #[serde(default)]
    pub vat_rate: VatRate,
    #[serde(default)]
    pub feasibility: Feasibility,
    #[serde(flatten)]
    pub actuals: ActualsPayload,
}

/// Body of `PATCH /works/{id}`: every field optional.
#[derive(Debug, Default, Deserialize)]
pub struct WorkPatch {
    pub item: Option<i64>,
    pub name: Option<String>,
    pub justification: Option<String>,
    pub comment: Option<String>,
    #[serde(flatten)]
    pub certification: CertificationPatch,
    pub accruals: Option<MonthlyPlan>,
    pub payments: Option<MonthlyPlan>,
    pub year: Option<i32>,
    pub responsible: Option<i64>,
    pub vat_rate: Option<VatRate>,
    pub feasibility: Option<Feasibility>,
    #[serde(flatten)]
    pub actuals: ActualsPayload,
}

/// Actual figures, either as detail lists or in the legacy month-keyed form.
#[derive(Debug, Default, Deserialize)]
pub struct ActualsPayload {
    pub payment_details: Option<Vec<DetailInput>>,
    pub accrual_details: Option<Vec<DetailInput>>,
    #[serde(alias = "actualPayments")]
    pub actual_payments: Option<LegacyMap>,
    #[serde(alias = "actualAccruals")]
    pub actual_accruals: Option<LegacyMap>,
}

impl ActualsPayload {
    /// Detail lists win over the legacy maps; every list is checked before anything is written.
    /// `stored` holds the work's current detail rows, whose attachments carry over.
    fn into_changes(self, stored: &[WorkDetail]) -> ApiResult<DetailChanges> {
        let mut payments = self
            .payment_details
            .or_else(|| self.actual_payments.map(legacy_to_details));
        let mut accruals = self
            .accrual_details
            .or_else(|| self.actual_accruals.map(legacy_to_details));

        if let Some(list) = payments.as_mut() {
            validate_details(DetailKind::Payment, list)?;
            reconcile_attachments(DetailKind::Payment, list, stored)?;
        }
        if let Some(list) = accruals.as_mut() {
            validate_details(DetailKind::Accrual, list)?;
            reconcile_attachments(DetailKind::Accrual, list, stored)?;
        }
        Ok(DetailChanges { payments, accruals })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct WorkQuery {
    pub item: Option<i64>,
    pub year: Option<i32>,
    pub search: Option<String>,
    pub responsible: Option<i64>,
}

/*========== shared helpers ========== */

/// Attaches detail rows, legacy encodings and materials to each work.
pub(crate) async fn work_dtos(pool: &Pool<Sqlite>, list: Vec<Work>) -> ApiResult<Vec<WorkDto>> {
    let ids: Vec<i64> = list.iter().map(|w| w.id).collect();

    let mut details_by_work: HashMap<i64, Vec<WorkDetail>> = HashMap::new();
    for detail in details::details_for_works(pool, &ids).await? {
        details_by_work.entry(detail.work_id).or_default().push(detail);
    }
    let mut materials_by_work: HashMap<i64, Vec<Material>> = HashMap::new();
    for material in materials::materials_for_works(pool, &ids).await? {
        if let Some(work_id) = material.work_id {
            materials_by_work.entry(work_id).or_default().push(material);
        }
    }

    Ok(list
        .into_iter()
        .map(|work| {
            let (payment_details, accrual_details): (Vec<_>, Vec<_>) = details_by_work
                .remove(&work.id)
                .unwrap_or_default()
                .into_iter()
                .partition(|d| d.kind == DetailKind::Payment);
            WorkDto {
                actual_payments: details_to_legacy(&payment_details),
                actual_accruals: details_to_legacy(&accrual_details),
                materials: materials_by_work.remove(&work.id).unwrap_or_default(),
                payment_details,
                accrual_details,
                work,
            }
        })
        .collect())
}

async fn work_dto(pool: &Pool<Sqlite>, work: Work) -> ApiResult<WorkDto> {
    work_dtos(pool, vec![work])
        .await?
        .pop()
        .ok_or(ApiError::NotFound("work"))
}

async fn load_work(pool: &Pool<Sqlite>, work_id: i64) -> ApiResult<Work> {
    works::get_work(pool, work_id)
        .await?
        .ok_or(ApiError::NotFound("work"))
}

/// Resolves the owner for a write and checks that the user exists.
async fn checked_responsible(pool: &Pool<Sqlite>, actor: &User, requested: Option<i64>) -> ApiResult<i64> {
    let responsible = resolve_responsible(actor, requested)?;
    if responsible != actor.id && users::get_user(pool, responsible).await?.is_none() {
        return Err(ApiError::validation("responsible", format!("unknown user {responsible}")));
    }
    Ok(responsible)
}

fn validate_record(record: &WorkRecord) -> ApiResult<()> {
    if record.name.trim().is_empty() {
        return Err(ApiError::validation("name", "this field may not be blank"));
    }
    validate_plan("accruals", &record.accruals)?;
    validate_plan("payments", &record.payments)?;
    Ok(())
}

fn current_year() -> i32 {
    chrono::Utc::now().year()
}

/*========== handlers ========== */

pub async fn list_works(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Query(query): Query<WorkQuery>,
) -> ApiResult<Json<Vec<WorkDto>>> {
    // non-privileged callers only ever see their own works
    let responsible_id = if actor.can_edit_any_work {
        query.responsible
    } else {
        Some(actor.id)
    };
    let filter = WorkFilter {
        responsible_id,
        item_id: query.item,
        year: query.year,
        search: query.search,
    };
    let list = works::list_works(&state.db, &filter).await?;
    Ok(Json(work_dtos(&state.db, list).await?))
}

pub async fn get_work(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(work_id): Path<i64>,
) -> ApiResult<Json<WorkDto>> {
    let work = load_work(&state.db, work_id).await?;
    ensure_can_mutate(&actor, work.responsible_id)?;
    Ok(Json(work_dto(&state.db, work).await?))
}

pub async fn create_work(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ApiJson(payload): ApiJson<WorkPayload>,
) -> ApiResult<(StatusCode, Json<WorkDto>)> {
    let item = items::get_item(&state.db, payload.item)
        .await?
        .ok_or(ApiError::NotFound("item"))?;
    let responsible_id = checked_responsible(&state.db, &actor, payload.responsible).await?;
    let changes = payload.actuals.into_changes(&[])?;

    let record = WorkRecord {
        item_id: item.id,
        name: payload.name.trim().to_string(),
        justification: payload.justification,
        comment: payload.comment,
        // works start from the item's certification metadata
        certification: payload.certification.apply(item.certification),
        accruals: payload.accruals,
        payments: payload.payments,
        year: payload.year.unwrap_or_else(current_year),
        responsible_id,
        vat_rate: payload.vat_rate,
        feasibility: payload.feasibility,
    };
    validate_record(&record)?;

    let work = works::create_work(&state.db, &record, &changes).await?;
    tracing::info!(work = work.id, item = work.item_id, actor = actor.id, "work created");
    Ok((StatusCode::CREATED, Json(work_dto(&state.db, work).await?)))
}

pub async fn update_work(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(work_id): Path<i64>,
    ApiJson(payload): ApiJson<WorkPayload>,
) -> ApiResult<Json<WorkDto>> {
    let existing = load_work(&state.db, work_id).await?;
    ensure_can_mutate(&actor, existing.responsible_id)?;

    let item = items::get_item(&state.db, payload.item)
        .await?
        .ok_or(ApiError::NotFound("item"))?;
    let responsible_id = match payload.responsible {
        Some(id) if id != existing.responsible_id => checked_responsible(&state.db, &actor, Some(id)).await?,
        _ => existing.responsible_id,
    };
    let stored = details::details_for_works(&state.db, &[work_id]).await?;
    let changes = payload.actuals.into_changes(&stored)?;

    let record = WorkRecord {
        item_id: item.id,
        name: payload.name.trim().to_string(),
        justification: payload.justification,
        comment: payload.comment,
        certification: payload.certification.apply(item.certification),
        accruals: payload.accruals,
        payments: payload.payments,
        year: payload.year.unwrap_or(existing.year),
        responsible_id,
        vat_rate: payload.vat_rate,
        feasibility: payload.feasibility,
    };
    validate_record(&record)?;

    let work = works::update_work(&state.db, work_id, &record, &changes)
        .await?
        .ok_or(ApiError::NotFound("work"))?;
    tracing::info!(work = work.id, actor = actor.id, "work updated");
    Ok(Json(work_dto(&state.db, work).await?))
}

pub async fn patch_work(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(work_id): Path<i64>,
    ApiJson(patch): ApiJson<WorkPatch>,
) -> ApiResult<Json<WorkDto>> {
    let existing = load_work(&state.db, work_id).await?;
    ensure_can_mutate(&actor, existing.responsible_id)?;

    let item_id = match patch.item {
        Some(id) if id != existing.item_id => {
            items::get_item(&state.db, id)
                .await?
                .ok_or(ApiError::NotFound("item"))?
                .id
        }
        _ => existing.item_id,
    };
    let responsible_id = match patch.responsible {
        Some(id) if id != existing.responsible_id => checked_responsible(&state.db, &actor, Some(id)).await?,
        _ => existing.responsible_id,
    };
    let stored = details::details_for_works(&state.db, &[work_id]).await?;
    let changes = patch.actuals.into_changes(&stored)?;

    let record = WorkRecord {
        item_id,
        name: patch.name.map(|n| n.trim().to_string()).unwrap_or(existing.name),
        justification: patch.justification.unwrap_or(existing.justification),
        comment: patch.comment.unwrap_or(existing.comment),
        certification: patch.certification.apply(existing.certification),
        accruals: patch.accruals.unwrap_or(existing.accruals),
        payments: patch.payments.unwrap_or(existing.payments),
        year: patch.year.unwrap_or(existing.year),
        responsible_id,
        vat_rate: patch.vat_rate.unwrap_or(existing.vat_rate),
        feasibility: patch.feasibility.unwrap_or(existing.feasibility),
    };
    validate_record(&record)?;

    let work = works::update_work(&state.db, work_id, &record, &changes)
        .await?
        .ok_or(ApiError::NotFound("work"))?;
    tracing::info!(work = work.id, actor = actor.id, "work updated");
    Ok(Json(work_dto(&state.db, work).await?))
}

pub async fn delete_work(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(work_id): Path<i64>,
) -> ApiResult<StatusCode> {
    let work = load_work(&state.db, work_id).await?;
    ensure_can_mutate(&actor, work.responsible_id)?;

    let attached = materials::materials_for_works(&state.db, &[work_id]).await?;
    if !works::delete_work(&state.db, work_id).await? {
        return Err(ApiError::NotFound("work"));
    }
    // rows are gone with the cascade; files are cleaned up best-effort
    for material in attached {
        if let Err(err) = state.files.remove(&material.file).await {
            tracing::warn!(file = %material.file, error = %err, "could not remove material file");
        }
    }
    tracing::info!(work = work_id, actor = actor.id, "work deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /works/{id}/details/{kind}/{month}/attachment`: stores the comment file of one detail row.
pub async fn upload_detail_attachment(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path((work_id, kind, month)): Path<(i64, String, String)>,
    multipart: Multipart,
) -> ApiResult<Json<WorkDetail>> {
    let kind: DetailKind = kind
        .parse()
        .map_err(|e: String| ApiError::validation("kind", e))?;
    validate_month("month", &month)?;

    let work = load_work(&state.db, work_id).await?;
    ensure_can_mutate(&actor, work.responsible_id)?;
    let detail = details::get_detail(&state.db, work_id, kind, &month)
        .await?
        .ok_or(ApiError::NotFound("detail"))?;

    let upload = read_upload(multipart).await?;
    let (file_name, bytes) = upload.require_file()?;

    let stored = state.files.save(DETAIL_FILES_DIR, &file_name, &bytes).await?;
    let failure = match details::set_comment_file(&state.db, detail.id, &stored).await {
        Ok(true) => None,
        Ok(false) => Some(ApiError::NotFound("detail")),
        Err(err) => Some(err.into()),
    };
    if let Some(err) = failure {
        if let Err(cleanup) = state.files.remove(&stored).await {
            tracing::warn!(file = %stored, error = %cleanup, "orphaned attachment left on disk");
        }
        return Err(err);
    }
    tracing::info!(work = work_id, kind = kind.as_str(), %month, actor = actor.id, "detail attachment stored");

    Ok(Json(WorkDetail {
        comment_file: Some(stored),
        ..detail
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_lists_take_precedence_over_legacy_maps() {
        let actuals: ActualsPayload = serde_json::from_str(
            r#"{
                "payment_details": [{"month": "Янв", "amount": 10}],
                "actual_payments": {"Фев": 99},
                "actualAccruals": {"Мар": {"amount": 5, "status": "done"}}
            }"#,
        )
        .unwrap();
        let changes = actuals.into_changes(&[]).unwrap();
        let payments = changes.payments.unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].month, "Янв");
        let accruals = changes.accruals.unwrap();
        assert_eq!(accruals[0].status.as_deref(), Some("done"));
    }

    #[test]
    fn omitted_lists_leave_details_untouched() {
        let changes = ActualsPayload::default().into_changes(&[]).unwrap();
        assert!(changes.payments.is_none());
        assert!(changes.accruals.is_none());
    }

    #[test]
    fn duplicate_months_fail_before_persistence() {
        let actuals: ActualsPayload = serde_json::from_str(
            r#"{"payment_details": [{"month": "Янв", "amount": 1}, {"month": "Янв", "amount": 2}]}"#,
        )
        .unwrap();
        assert!(matches!(
            actuals.into_changes(&[]),
            Err(ApiError::Validation { ref field, .. }) if field == "payment_details"
        ));
    }
}
