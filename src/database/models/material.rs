use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Uploaded file attached to a work or directly to a budget item (never both).
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Material {
    pub id: i64,
    #[serde(rename = "work")]
    pub work_id: Option<i64>,
    #[serde(rename = "item")]
    pub item_id: Option<i64>,
    pub file: String, // path relative to the media root
    pub original_name: String,
    pub uploaded_by: i64,
    pub uploaded_at: DateTime<Utc>,
}
