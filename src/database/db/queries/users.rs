use chrono::{DateTime, Utc};
use sqlx::{Pool, QueryBuilder, Row, Sqlite};

use crate::database::models::User;

/*==========User Queries=========== */

const USER_COLUMNS: &str = "id, username, first_name, last_name, can_edit_any_work, is_active";

pub async fn create_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password_hash: &str,
    first_name: &str,
    last_name: &str,
    can_edit_any_work: bool,
) -> Result<i64, sqlx::Error> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO users (username, password_hash, first_name, last_name, can_edit_any_work, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(username)
    .bind(password_hash)
    .bind(first_name)
    .bind(last_name)
    .bind(can_edit_any_work)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(id)
}

pub async fn get_user(pool: &Pool<Sqlite>, user_id: i64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

// Directory listing, active users only
pub async fn list_users(pool: &Pool<Sqlite>) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE is_active = 1 ORDER BY last_name, first_name, username"
    ))
    .fetch_all(pool)
    .await
}

/// User and stored bcrypt hash for a login attempt.
pub async fn find_credentials(
    pool: &Pool<Sqlite>,
    username: &str,
) -> Result<Option<(User, String)>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {USER_COLUMNS}, password_hash FROM users WHERE username = ?"
    ))
    .bind(username)
    .fetch_optional(pool)
    .await?;

    row.map(|row| {
        let user = User {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            can_edit_any_work: row.try_get("can_edit_any_work")?,
            is_active: row.try_get("is_active")?,
        };
        Ok((user, row.try_get("password_hash")?))
    })
    .transpose()
}

pub async fn set_edit_any_work(
    pool: &Pool<Sqlite>,
    username: &str,
    allowed: bool,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE users SET can_edit_any_work = ? WHERE username = ?")
        .bind(allowed)
        .bind(username)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/*==========Session Queries=========== */

pub async fn create_session(
    pool: &Pool<Sqlite>,
    token: &str,
    user_id: i64,
    expires_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)")
        .bind(token)
        .bind(user_id)
        .bind(Utc::now())
        .bind(expires_at)
        .execute(pool)
        .await?;
    Ok(())
}

/// Removes sessions that expired at or before `now`. Expiry is compared as `DateTime`, the same
/// way `user_for_session` does, not as stored text.
pub async fn purge_expired_sessions(pool: &Pool<Sqlite>, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
    let rows = sqlx::query("SELECT token, expires_at FROM sessions")
        .fetch_all(pool)
        .await?;

    let mut expired = Vec::new();
    for row in &rows {
        let expires_at: DateTime<Utc> = row.try_get("expires_at")?;
        if expires_at <= now {
            expired.push(row.try_get::<String, _>("token")?);
        }
    }
    if expired.is_empty() {
        return Ok(0);
    }

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("DELETE FROM sessions WHERE token IN (");
    let mut tokens = qb.separated(", ");
    for token in &expired {
        tokens.push_bind(token.as_str());
    }
    qb.push(")");
    Ok(qb.build().execute(pool).await?.rows_affected())
}

/// Active user behind a session token, if the session exists and has not expired.
pub async fn user_for_session(
    pool: &Pool<Sqlite>,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT u.id, u.username, u.first_name, u.last_name, u.can_edit_any_work, u.is_active,
               s.expires_at
        FROM sessions s
        JOIN users u ON u.id = s.user_id
        WHERE s.token = ?
        "#,
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let expires_at: DateTime<Utc> = row.try_get("expires_at")?;
    let is_active: bool = row.try_get("is_active")?;
    if expires_at <= now || !is_active {
        return Ok(None);
    }

    Ok(Some(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        can_edit_any_work: row.try_get("can_edit_any_work")?,
        is_active,
    }))
}

pub async fn delete_session(pool: &Pool<Sqlite>, token: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
