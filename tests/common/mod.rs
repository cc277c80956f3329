#![allow(dead_code)]

use std::path::Path;

use budget_planner::config::AppConfig;
use budget_planner::database::db::connection::get_db_pool;
use budget_planner::database::db::migrate::run_migrations;
use budget_planner::database::db::queries::items::ItemRecord;
use budget_planner::database::db::queries::{groups, items, users};
use budget_planner::database::models::{BudgetItem, Certification};
use sqlx::{Pool, Sqlite};

/// Config pointing at a fresh database and media root inside `dir`.
pub fn test_config(dir: &Path) -> AppConfig {
    AppConfig {
        database_url: format!("sqlite://{}", dir.join("budget.db").display()),
        media_root: dir.join("media"),
        ..AppConfig::default()
    }
}

pub async fn migrated_pool(config: &AppConfig) -> Pool<Sqlite> {
    let pool = get_db_pool(config).await.expect("open test database");
    run_migrations(&pool).await.expect("run migrations");
    pool
}

/// Low bcrypt cost keeps login tests fast.
pub async fn create_user(pool: &Pool<Sqlite>, username: &str, password: &str, admin: bool) -> i64 {
    let hash = bcrypt::hash(password, 4).expect("hash password");
    users::create_user(pool, username, &hash, "", "", admin)
        .await
        .expect("create user")
}

pub async fn group_id(pool: &Pool<Sqlite>, code: &str) -> i64 {
    groups::list_groups(pool)
        .await
        .expect("list groups")
        .into_iter()
        .find(|g| g.code == code)
        .map(|g| g.id)
        .expect("seeded group")
}

pub async fn create_item(pool: &Pool<Sqlite>, name: &str, position: i64) -> BudgetItem {
    let group_id = group_id(pool, "general").await;
    items::create_item(
        pool,
        &ItemRecord {
            name: name.to_string(),
            position,
            group_id,
            certification: Certification::default(),
        },
    )
    .await
    .expect("create item")
}
