use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, QueryBuilder, Row, Sqlite};

use super::decimal_column;
use crate::database::models::QuarterReserve;
use crate::error::{ApiError, ApiResult};
use crate::ledger::{self, WriteOff};

/*==========Quarter Reserve Queries=========== */

/// Attempts before a contended write-off gives up with a retryable conflict.
pub const MAX_WRITE_OFF_ATTEMPTS: usize = 8;

#[derive(Debug, Clone)]
pub struct NewReserve {
    pub item_id: i64,
    pub year: i32,
    pub quarter: i32,
    pub accrual_sum: Decimal,
    pub payment_sum: Decimal,
}

const RESERVE_COLUMNS: &str =
    "id, item_id, year, quarter, accrual_sum, payment_sum, used_acc, used_pay, version";

fn reserve_from_row(row: &SqliteRow) -> Result<QuarterReserve, sqlx::Error> {
    Ok(QuarterReserve {
        id: row.try_get("id")?,
        item_id: row.try_get("item_id")?,
        year: row.try_get("year")?,
        quarter: row.try_get("quarter")?,
        accrual_sum: decimal_column(row, "accrual_sum")?,
        payment_sum: decimal_column(row, "payment_sum")?,
        used_acc: decimal_column(row, "used_acc")?,
        used_pay: decimal_column(row, "used_pay")?,
        version: row.try_get("version")?,
    })
}

pub async fn create_reserve(pool: &Pool<Sqlite>, new: &NewReserve) -> Result<QuarterReserve, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO quarter_reserves (item_id, year, quarter, accrual_sum, payment_sum, used_acc, used_pay)
        VALUES (?, ?, ?, ?, ?, '0', '0')
        RETURNING {RESERVE_COLUMNS}
        "#
    ))
    .bind(new.item_id)
    .bind(new.year)
    .bind(new.quarter)
    .bind(new.accrual_sum.to_string())
    .bind(new.payment_sum.to_string())
    .fetch_one(pool)
    .await?;

    reserve_from_row(&row)
}

pub async fn get_reserve(pool: &Pool<Sqlite>, reserve_id: i64) -> Result<Option<QuarterReserve>, sqlx::Error> {
    sqlx::query(&format!("SELECT {RESERVE_COLUMNS} FROM quarter_reserves WHERE id = ?"))
        .bind(reserve_id)
        .fetch_optional(pool)
        .await?
        .map(|row| reserve_from_row(&row))
        .transpose()
}

pub async fn list_reserves(
    pool: &Pool<Sqlite>,
    item_id: Option<i64>,
    year: Option<i32>,
) -> Result<Vec<QuarterReserve>, sqlx::Error> {
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {RESERVE_COLUMNS} FROM quarter_reserves WHERE 1 = 1"));
    if let Some(item_id) = item_id {
        qb.push(" AND item_id = ").push_bind(item_id);
    }
    if let Some(year) = year {
        qb.push(" AND year = ").push_bind(year);
    }
    qb.push(" ORDER BY item_id ASC, year ASC, quarter ASC");

    let rows = qb.build().fetch_all(pool).await?;
    rows.iter().map(reserve_from_row).collect()
}

/* Write-off is a read-check-update on one row. The update only lands if the row still carries
the version that was checked; otherwise another write-off got there first and we re-read.
The ledger check therefore always runs against the state being replaced. */

pub async fn write_off(
    pool: &Pool<Sqlite>,
    reserve_id: i64,
    request: &WriteOff,
) -> ApiResult<QuarterReserve> {
    for attempt in 1..=MAX_WRITE_OFF_ATTEMPTS {
        let current = get_reserve(pool, reserve_id)
            .await?
            .ok_or(ApiError::NotFound("reserve"))?;
        let next = ledger::apply_write_off(&current, request)?;

        let result = sqlx::query(
            r#"
            UPDATE quarter_reserves
            SET used_acc = ?, used_pay = ?, version = version + 1
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(next.used_acc.to_string())
        .bind(next.used_pay.to_string())
        .bind(reserve_id)
        .bind(current.version)
        .execute(pool)
        .await?;

        if result.rows_affected() == 1 {
            tracing::info!(
                reserve = reserve_id,
                acc = %request.accrual(),
                pay = %request.payment(),
                used_acc = %next.used_acc,
                used_pay = %next.used_pay,
                "reserve written off"
            );
            return Ok(QuarterReserve {
                version: current.version + 1,
                ..next
            });
        }
        tracing::debug!(reserve = reserve_id, attempt, "write-off lost a version race, retrying");
    }

    Err(ApiError::Conflict(format!(
        "reserve {reserve_id} is being updated concurrently, retry the write-off"
    )))
}
