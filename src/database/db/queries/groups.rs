use sqlx::{Pool, Sqlite};

use crate::database::models::Group;

pub async fn list_groups(pool: &Pool<Sqlite>) -> Result<Vec<Group>, sqlx::Error> {
    sqlx::query_as::<_, Group>("SELECT id, code, name FROM budget_groups ORDER BY id ASC")
        .fetch_all(pool)
        .await
}

pub async fn get_group(pool: &Pool<Sqlite>, group_id: i64) -> Result<Option<Group>, sqlx::Error> {
    sqlx::query_as::<_, Group>("SELECT id, code, name FROM budget_groups WHERE id = ?")
        .bind(group_id)
        .fetch_optional(pool)
        .await
}

pub async fn create_group(pool: &Pool<Sqlite>, code: &str, name: &str) -> Result<Group, sqlx::Error> {
    sqlx::query_as::<_, Group>(
        "INSERT INTO budget_groups (code, name) VALUES (?, ?) RETURNING id, code, name",
    )
    .bind(code)
    .bind(name)
    .fetch_one(pool)
    .await
}
