use axum::extract::FromRequest;

use crate::error::ApiError;

/// `axum::Json` whose rejections come back as `validation_error` bodies (400).
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);
