// src/backend/handlers/mod.rs
pub mod groups;
pub mod items;
pub mod materials;
pub mod reserves;
pub mod users;
pub mod works;

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::Multipart;

use crate::error::{ApiError, ApiResult};

/// A parsed multipart body: at most one file part plus plain text fields.
#[derive(Debug, Default)]
pub(crate) struct Upload {
    file: Option<(String, Bytes)>,
    fields: HashMap<String, String>,
}

impl Upload {
    /// The uploaded file. Missing or empty files are rejected.
    pub fn require_file(self) -> ApiResult<(String, Bytes)> {
        match self.file {
            Some((_, bytes)) if bytes.is_empty() => {
                Err(ApiError::validation("file", "the submitted file is empty"))
            }
            Some(file) => Ok(file),
            None => Err(ApiError::validation("file", "no file was submitted")),
        }
    }

    /// An optional numeric form field. Blank values count as absent.
    pub fn id_field(&self, name: &str) -> ApiResult<Option<i64>> {
        match self.fields.get(name).map(|v| v.trim()) {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| ApiError::validation(name, format!("expected an id, got {raw:?}"))),
        }
    }
}

pub(crate) async fn read_upload(mut multipart: Multipart) -> ApiResult<Upload> {
    let mut upload = Upload::default();
    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if name == "file" {
            if upload.file.is_some() {
                return Err(ApiError::validation("file", "only one file may be submitted"));
            }
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let bytes = field.bytes().await?;
            upload.file = Some((file_name, bytes));
        } else {
            let value = field.text().await?;
            upload.fields.insert(name, value);
        }
    }
    Ok(upload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_rejected() {
        let upload = Upload {
            file: Some(("a.pdf".into(), Bytes::new())),
            ..Upload::default()
        };
        assert!(matches!(
            upload.require_file(),
            Err(ApiError::Validation { ref field, .. }) if field == "file"
        ));
    }

    #[test]
    fn blank_id_field_is_absent() {
        let mut upload = Upload::default();
        upload.fields.insert("work".into(), " ".into());
        upload.fields.insert("item".into(), "7".into());
        assert_eq!(upload.id_field("work").unwrap(), None);
        assert_eq!(upload.id_field("item").unwrap(), Some(7));
        upload.fields.insert("item".into(), "x".into());
        assert!(upload.id_field("item").is_err());
    }
}
