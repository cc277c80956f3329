use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};

use super::certification_columns;
use crate::database::models::{BudgetItem, Certification};

/*==========Budget Item Queries=========== */

/// Writable fields of a budget item.
#[derive(Debug, Clone)]
pub struct ItemRecord {
    pub name: String,
    pub position: i64,
    pub group_id: i64,
    pub certification: Certification,
}

const ITEM_COLUMNS: &str = "bi.id, bi.name, bi.position, bi.group_id, bi.is_certification, \
    bi.work_type, bi.product_name, bi.responsible_parties, bi.certificate_number, \
    bi.certification_body, bi.created_at";

fn item_from_row(row: &SqliteRow) -> Result<BudgetItem, sqlx::Error> {
    Ok(BudgetItem {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        position: row.try_get("position")?,
        group_id: row.try_get("group_id")?,
        certification: certification_columns(row)?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn create_item(pool: &Pool<Sqlite>, record: &ItemRecord) -> Result<BudgetItem, sqlx::Error> {
    let cert = &record.certification;
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO budget_items (
            name, position, group_id, is_certification, work_type, product_name,
            responsible_parties, certificate_number, certification_body, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(&record.name)
    .bind(record.position)
    .bind(record.group_id)
    .bind(cert.is_certification)
    .bind(cert.work_type.map(|t| t.as_str()))
    .bind(&cert.product_name)
    .bind(&cert.responsible_parties)
    .bind(&cert.certificate_number)
    .bind(&cert.certification_body)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    get_item(pool, id).await?.ok_or(sqlx::Error::RowNotFound)
}

pub async fn get_item(pool: &Pool<Sqlite>, item_id: i64) -> Result<Option<BudgetItem>, sqlx::Error> {
    sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM budget_items bi WHERE bi.id = ?"))
        .bind(item_id)
        .fetch_optional(pool)
        .await?
        .map(|row| item_from_row(&row))
        .transpose()
}

/// Items ordered by position; equal positions keep creation order.
pub async fn list_items(
    pool: &Pool<Sqlite>,
    group_code: Option<&str>,
) -> Result<Vec<BudgetItem>, sqlx::Error> {
    let rows = match group_code {
        Some(code) => {
            sqlx::query(&format!(
                r#"
                SELECT {ITEM_COLUMNS}
                FROM budget_items bi
                JOIN budget_groups g ON g.id = bi.group_id
                WHERE g.code = ?
                ORDER BY bi.position ASC, bi.id ASC
                "#
            ))
            .bind(code)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(&format!(
                "SELECT {ITEM_COLUMNS} FROM budget_items bi ORDER BY bi.position ASC, bi.id ASC"
            ))
            .fetch_all(pool)
            .await?
        }
    };

    rows.iter().map(item_from_row).collect()
}

pub async fn update_item(
    pool: &Pool<Sqlite>,
    item_id: i64,
    record: &ItemRecord,
) -> Result<bool, sqlx::Error> {
    let cert = &record.certification;
    let result = sqlx::query(
        r#"
        UPDATE budget_items
        SET name = ?, position = ?, group_id = ?, is_certification = ?, work_type = ?,
            product_name = ?, responsible_parties = ?, certificate_number = ?,
            certification_body = ?
        WHERE id = ?
        "#,
    )
    .bind(&record.name)
    .bind(record.position)
    .bind(record.group_id)
    .bind(cert.is_certification)
    .bind(cert.work_type.map(|t| t.as_str()))
    .bind(&cert.product_name)
    .bind(&cert.responsible_parties)
    .bind(&cert.certificate_number)
    .bind(&cert.certification_body)
    .bind(item_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

// Works, their details/materials and the item's reserves go with it (ON DELETE CASCADE)
pub async fn delete_item(pool: &Pool<Sqlite>, item_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM budget_items WHERE id = ?")
        .bind(item_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
