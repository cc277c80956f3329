/*
SQL for every table, one submodule per entity.
Decimal amounts live in TEXT columns and are parsed here; timestamps are bound as UTC.
 */

pub mod details;
pub mod groups;
pub mod items;
pub mod materials;
pub mod reserves;
pub mod users;
pub mod works;

use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::database::models::{Certification, WorkType};

pub(crate) fn decimal_column(row: &SqliteRow, column: &str) -> Result<Decimal, sqlx::Error> {
    let text: String = row.try_get(column)?;
    Decimal::from_str(&text)
        .map_err(|e| sqlx::Error::Decode(format!("Invalid Decimal format for {column}: {e}").into()))
}

pub(crate) fn enum_column<T>(row: &SqliteRow, column: &str) -> Result<T, sqlx::Error>
where
    T: FromStr<Err = String>,
{
    let text: String = row.try_get(column)?;
    T::from_str(&text).map_err(|e| sqlx::Error::Decode(e.into()))
}

// Shared by budget_items and works, which carry the same certification columns.
pub(crate) fn certification_columns(row: &SqliteRow) -> Result<Certification, sqlx::Error> {
    let work_type: Option<String> = row.try_get("work_type")?;
    let work_type = work_type
        .map(|s| WorkType::from_str(&s))
        .transpose()
        .map_err(|e| sqlx::Error::Decode(e.into()))?;

    Ok(Certification {
        is_certification: row.try_get("is_certification")?,
        work_type,
        product_name: row.try_get("product_name")?,
        responsible_parties: row.try_get("responsible_parties")?,
        certificate_number: row.try_get("certificate_number")?,
        certification_body: row.try_get("certification_body")?,
    })
}
