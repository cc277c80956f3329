use chrono::Utc;
use sqlx::{Pool, QueryBuilder, Sqlite};

use crate::database::models::Material;

/*==========Material Queries=========== */

const MATERIAL_COLUMNS: &str = "id, work_id, item_id, file, original_name, uploaded_by, uploaded_at";

#[derive(Debug, Clone, Copy, Default)]
pub struct MaterialFilter {
    pub work_id: Option<i64>,
    pub item_id: Option<i64>,
}

pub async fn insert_material(
    pool: &Pool<Sqlite>,
    work_id: Option<i64>,
    item_id: Option<i64>,
    file: &str,
    original_name: &str,
    uploaded_by: i64,
) -> Result<Material, sqlx::Error> {
    sqlx::query_as::<_, Material>(&format!(
        r#"
        INSERT INTO materials (work_id, item_id, file, original_name, uploaded_by, uploaded_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING {MATERIAL_COLUMNS}
        "#
    ))
    .bind(work_id)
    .bind(item_id)
    .bind(file)
    .bind(original_name)
    .bind(uploaded_by)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
}

pub async fn get_material(pool: &Pool<Sqlite>, material_id: i64) -> Result<Option<Material>, sqlx::Error> {
    sqlx::query_as::<_, Material>(&format!("SELECT {MATERIAL_COLUMNS} FROM materials WHERE id = ?"))
        .bind(material_id)
        .fetch_optional(pool)
        .await
}

pub async fn list_materials(
    pool: &Pool<Sqlite>,
    filter: MaterialFilter,
) -> Result<Vec<Material>, sqlx::Error> {
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {MATERIAL_COLUMNS} FROM materials WHERE 1 = 1"));
    if let Some(work_id) = filter.work_id {
        qb.push(" AND work_id = ").push_bind(work_id);
    }
    if let Some(item_id) = filter.item_id {
        qb.push(" AND item_id = ").push_bind(item_id);
    }
    qb.push(" ORDER BY uploaded_at ASC, id ASC");

    qb.build_query_as::<Material>().fetch_all(pool).await
}

/// Materials attached to any of the given works.
pub async fn materials_for_works(
    pool: &Pool<Sqlite>,
    work_ids: &[i64],
) -> Result<Vec<Material>, sqlx::Error> {
    if work_ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {MATERIAL_COLUMNS} FROM materials WHERE work_id IN ("
    ));
    let mut ids = qb.separated(", ");
    for id in work_ids {
        ids.push_bind(*id);
    }
    qb.push(") ORDER BY uploaded_at ASC, id ASC");

    qb.build_query_as::<Material>().fetch_all(pool).await
}

/// Item-level materials (not attached to a work) of the given items.
pub async fn materials_for_items(
    pool: &Pool<Sqlite>,
    item_ids: &[i64],
) -> Result<Vec<Material>, sqlx::Error> {
    if item_ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {MATERIAL_COLUMNS} FROM materials WHERE item_id IN ("
    ));
    let mut ids = qb.separated(", ");
    for id in item_ids {
        ids.push_bind(*id);
    }
    qb.push(") ORDER BY uploaded_at ASC, id ASC");

    qb.build_query_as::<Material>().fetch_all(pool).await
}

pub async fn delete_material(pool: &Pool<Sqlite>, material_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM materials WHERE id = ?")
        .bind(material_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
