use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::types::Json;
use sqlx::{Pool, QueryBuilder, Row, Sqlite};

use super::details::replace_details;
use super::{certification_columns, enum_column};
use crate::database::models::{
    Certification, DetailInput, DetailKind, Feasibility, MonthlyPlan, VatRate, Work,
};

/*==========Work Queries=========== */

/// Writable fields of a work.
#[derive(Debug, Clone)]
pub struct WorkRecord {
    pub item_id: i64,
    pub name: String,
    pub justification: String,
    pub comment: String,
    pub certification: Certification,
    pub accruals: MonthlyPlan,
    pub payments: MonthlyPlan,
    pub year: i32,
    pub responsible_id: i64,
    pub vat_rate: VatRate,
    pub feasibility: Feasibility,
}

/// Detail lists to replace alongside the work. `None` leaves that kind untouched.
#[derive(Debug, Clone, Default)]
pub struct DetailChanges {
    pub payments: Option<Vec<DetailInput>>,
    pub accruals: Option<Vec<DetailInput>>,
}

#[derive(Debug, Clone, Default)]
pub struct WorkFilter {
    pub responsible_id: Option<i64>,
    pub item_id: Option<i64>,
    pub year: Option<i32>,
    pub search: Option<String>,
}

const WORK_COLUMNS: &str = "id, item_id, name, justification, comment, is_certification, \
    work_type, product_name, responsible_parties, certificate_number, certification_body, \
    accruals, payments, year, responsible_id, vat_rate, feasibility, created_at, updated_at";

fn work_from_row(row: &SqliteRow) -> Result<Work, sqlx::Error> {
    let vat: i64 = row.try_get("vat_rate")?;
    let Json(accruals): Json<MonthlyPlan> = row.try_get("accruals")?;
    let Json(payments): Json<MonthlyPlan> = row.try_get("payments")?;

    Ok(Work {
        id: row.try_get("id")?,
        item_id: row.try_get("item_id")?,
        name: row.try_get("name")?,
        justification: row.try_get("justification")?,
        comment: row.try_get("comment")?,
        certification: certification_columns(row)?,
        accruals,
        payments,
        year: row.try_get("year")?,
        responsible_id: row.try_get("responsible_id")?,
        vat_rate: VatRate::try_from(vat).map_err(|e| sqlx::Error::Decode(e.into()))?,
        feasibility: enum_column(row, "feasibility")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/* The work row and its replaced detail rows are written in one transaction:
either the whole request lands or nothing does. */

pub async fn create_work(
    pool: &Pool<Sqlite>,
    record: &WorkRecord,
    details: &DetailChanges,
) -> Result<Work, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let now = Utc::now();
    let cert = &record.certification;

    let work_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO works (
            item_id, name, justification, comment, is_certification, work_type, product_name,
            responsible_parties, certificate_number, certification_body, accruals, payments,
            year, responsible_id, vat_rate, feasibility, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(record.item_id)
    .bind(&record.name)
    .bind(&record.justification)
    .bind(&record.comment)
    .bind(cert.is_certification)
    .bind(cert.work_type.map(|t| t.as_str()))
    .bind(&cert.product_name)
    .bind(&cert.responsible_parties)
    .bind(&cert.certificate_number)
    .bind(&cert.certification_body)
    .bind(Json(&record.accruals))
    .bind(Json(&record.payments))
    .bind(record.year)
    .bind(record.responsible_id)
    .bind(i64::from(record.vat_rate))
    .bind(record.feasibility.as_str())
    .bind(now)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    apply_detail_changes(&mut tx, work_id, details).await?;
    tx.commit().await?;

    get_work(pool, work_id).await?.ok_or(sqlx::Error::RowNotFound)
}

pub async fn update_work(
    pool: &Pool<Sqlite>,
    work_id: i64,
    record: &WorkRecord,
    details: &DetailChanges,
) -> Result<Option<Work>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let cert = &record.certification;

    let result = sqlx::query(
        r#"
        UPDATE works
        SET item_id = ?, name = ?, justification = ?, comment = ?, is_certification = ?,
            work_type = ?, product_name = ?, responsible_parties = ?, certificate_number = ?,
            certification_body = ?, accruals = ?, payments = ?, year = ?, responsible_id = ?,
            vat_rate = ?, feasibility = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(record.item_id)
    .bind(&record.name)
    .bind(&record.justification)
    .bind(&record.comment)
    .bind(cert.is_certification)
    .bind(cert.work_type.map(|t| t.as_str()))
    .bind(&cert.product_name)
    .bind(&cert.responsible_parties)
    .bind(&cert.certificate_number)
    .bind(&cert.certification_body)
    .bind(Json(&record.accruals))
    .bind(Json(&record.payments))
    .bind(record.year)
    .bind(record.responsible_id)
    .bind(i64::from(record.vat_rate))
    .bind(record.feasibility.as_str())
    .bind(Utc::now())
    .bind(work_id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        // dropping tx rolls back
        return Ok(None);
    }

    apply_detail_changes(&mut tx, work_id, details).await?;
    tx.commit().await?;

    get_work(pool, work_id).await
}

async fn apply_detail_changes(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    work_id: i64,
    details: &DetailChanges,
) -> Result<(), sqlx::Error> {
    if let Some(payments) = &details.payments {
        replace_details(&mut **tx, work_id, DetailKind::Payment, payments).await?;
    }
    if let Some(accruals) = &details.accruals {
        replace_details(&mut **tx, work_id, DetailKind::Accrual, accruals).await?;
    }
    Ok(())
}

pub async fn get_work(pool: &Pool<Sqlite>, work_id: i64) -> Result<Option<Work>, sqlx::Error> {
    sqlx::query(&format!("SELECT {WORK_COLUMNS} FROM works WHERE id = ?"))
        .bind(work_id)
        .fetch_optional(pool)
        .await?
        .map(|row| work_from_row(&row))
        .transpose()
}

pub async fn list_works(pool: &Pool<Sqlite>, filter: &WorkFilter) -> Result<Vec<Work>, sqlx::Error> {
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {WORK_COLUMNS} FROM works WHERE 1 = 1"));
    if let Some(responsible_id) = filter.responsible_id {
        qb.push(" AND responsible_id = ").push_bind(responsible_id);
    }
    if let Some(item_id) = filter.item_id {
        qb.push(" AND item_id = ").push_bind(item_id);
    }
    if let Some(year) = filter.year {
        qb.push(" AND year = ").push_bind(year);
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        qb.push(" AND name LIKE ").push_bind(format!("%{search}%"));
    }
    qb.push(" ORDER BY item_id ASC, id ASC");

    let rows = qb.build().fetch_all(pool).await?;
    rows.iter().map(work_from_row).collect()
}

/// Works of the given items, in the same order as `list_works`.
pub async fn works_for_items(pool: &Pool<Sqlite>, item_ids: &[i64]) -> Result<Vec<Work>, sqlx::Error> {
    if item_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {WORK_COLUMNS} FROM works WHERE item_id IN ("));
    let mut ids = qb.separated(", ");
    for id in item_ids {
        ids.push_bind(*id);
    }
    qb.push(") ORDER BY item_id ASC, id ASC");

    let rows = qb.build().fetch_all(pool).await?;
    rows.iter().map(work_from_row).collect()
}

// Materials and detail rows cascade
pub async fn delete_work(pool: &Pool<Sqlite>, work_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM works WHERE id = ?")
        .bind(work_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
