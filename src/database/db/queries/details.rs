use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, QueryBuilder, Row, Sqlite, SqliteConnection};

use super::{decimal_column, enum_column};
use crate::database::models::{DetailInput, DetailKind, WorkDetail};

/*==========Work Detail Queries=========== */

const DETAIL_COLUMNS: &str = "id, work_id, kind, month, amount, status, creditor, contract, \
    cost_center, document_ref, comment, comment_file, cancel_reason, transfer_reason, \
    correction_reason, is_correction";

fn detail_from_row(row: &SqliteRow) -> Result<WorkDetail, sqlx::Error> {
    Ok(WorkDetail {
        id: row.try_get("id")?,
        work_id: row.try_get("work_id")?,
        kind: enum_column(row, "kind")?,
        month: row.try_get("month")?,
        amount: decimal_column(row, "amount")?,
        status: row.try_get("status")?,
        creditor: row.try_get("creditor")?,
        contract: row.try_get("contract")?,
        cost_center: row.try_get("cost_center")?,
        document_ref: row.try_get("document_ref")?,
        comment: row.try_get("comment")?,
        comment_file: row.try_get("comment_file")?,
        cancel_reason: row.try_get("cancel_reason")?,
        transfer_reason: row.try_get("transfer_reason")?,
        correction_reason: row.try_get("correction_reason")?,
        is_correction: row.try_get("is_correction")?,
    })
}

/// Drops every `kind` row of the work and inserts `details` in their place.
///
/// Runs on the caller's connection so it shares the work update's transaction. Month uniqueness
/// must already have been checked with `validate_details`; the table constraint is the backstop.
pub async fn replace_details(
    conn: &mut SqliteConnection,
    work_id: i64,
    kind: DetailKind,
    details: &[DetailInput],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM work_details WHERE work_id = ? AND kind = ?")
        .bind(work_id)
        .bind(kind.as_str())
        .execute(&mut *conn)
        .await?;

    for detail in details {
        sqlx::query(
            r#"
            INSERT INTO work_details (
                work_id, kind, month, amount, status, creditor, contract, cost_center,
                document_ref, comment, comment_file, cancel_reason, transfer_reason,
                correction_reason, is_correction
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(work_id)
        .bind(kind.as_str())
        .bind(&detail.month)
        .bind(detail.amount.to_string())
        .bind(&detail.status)
        .bind(&detail.creditor)
        .bind(&detail.contract)
        .bind(&detail.cost_center)
        .bind(&detail.document_ref)
        .bind(&detail.comment)
        .bind(detail.attachment())
        .bind(&detail.cancel_reason)
        .bind(&detail.transfer_reason)
        .bind(&detail.correction_reason)
        .bind(detail.is_correction)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Detail rows of the given works, in insertion order per work.
pub async fn details_for_works(
    pool: &Pool<Sqlite>,
    work_ids: &[i64],
) -> Result<Vec<WorkDetail>, sqlx::Error> {
    if work_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {DETAIL_COLUMNS} FROM work_details WHERE work_id IN ("
    ));
    let mut ids = qb.separated(", ");
    for id in work_ids {
        ids.push_bind(*id);
    }
    qb.push(") ORDER BY work_id ASC, id ASC");

    let rows = qb.build().fetch_all(pool).await?;
    rows.iter().map(detail_from_row).collect()
}

pub async fn get_detail(
    pool: &Pool<Sqlite>,
    work_id: i64,
    kind: DetailKind,
    month: &str,
) -> Result<Option<WorkDetail>, sqlx::Error> {
    sqlx::query(&format!(
        "SELECT {DETAIL_COLUMNS} FROM work_details WHERE work_id = ? AND kind = ? AND month = ?"
    ))
    .bind(work_id)
    .bind(kind.as_str())
    .bind(month)
    .fetch_optional(pool)
    .await?
    .map(|row| detail_from_row(&row))
    .transpose()
}

pub async fn set_comment_file(
    pool: &Pool<Sqlite>,
    detail_id: i64,
    comment_file: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE work_details SET comment_file = ? WHERE id = ?")
        .bind(comment_file)
        .bind(detail_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
