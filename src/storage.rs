//! Attachment storage on the local filesystem, under the configured media root.
//!
//! A file is written to a temporary name, synced and renamed into place, so a stored path
//! always refers to a complete file. Every operation runs under the configured timeout.

use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use tokio::io::AsyncWriteExt;

use crate::error::{ApiError, ApiResult};

pub const MATERIALS_DIR: &str = "materials";
pub const DETAIL_FILES_DIR: &str = "details";

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    timeout: Duration,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            root: root.into(),
            timeout,
        }
    }

    /// Stores `bytes` as `<dir>/<uuid>_<name>` and returns that relative path.
    pub async fn save(&self, dir: &str, original_name: &str, bytes: &[u8]) -> ApiResult<String> {
        let relative = format!("{dir}/{}_{}", uuid::Uuid::new_v4().simple(), sanitize_file_name(original_name));
        let target = self.root.join(&relative);
        let partial = self.root.join(dir).join(format!(".{}.part", uuid::Uuid::new_v4().simple()));

        let written = self
            .bounded("write", async {
                tokio::fs::create_dir_all(self.root.join(dir)).await?;
                let mut file = tokio::fs::File::create(&partial).await?;
                file.write_all(bytes).await?;
                file.sync_all().await?;
                tokio::fs::rename(&partial, &target).await
            })
            .await;

        if let Err(err) = written {
            // a half-written temp file must not linger
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(err);
        }

        tracing::debug!(path = %relative, size = bytes.len(), "attachment stored");
        Ok(relative)
    }

    /// Removes a stored file. A file that is already gone is not an error.
    pub async fn remove(&self, relative: &str) -> ApiResult<()> {
        let path = self.resolve(relative)?;
        self.bounded("remove", async {
            match tokio::fs::remove_file(&path).await {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                other => other,
            }
        })
        .await
    }

    pub fn resolve(&self, relative: &str) -> ApiResult<PathBuf> {
        let rel = Path::new(relative);
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if relative.is_empty() || escapes {
            return Err(ApiError::validation("file", "invalid attachment path"));
        }
        Ok(self.root.join(rel))
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> ApiResult<T>
    where
        F: Future<Output = std::io::Result<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                tracing::warn!(op, error = %err, "attachment storage failed");
                Err(ApiError::Unavailable(format!("attachment storage {op} failed")))
            }
            Err(_) => {
                tracing::warn!(op, timeout_ms = self.timeout.as_millis() as u64, "attachment storage timed out");
                Err(ApiError::Unavailable(format!("attachment storage {op} timed out")))
            }
        }
    }
}

/// Keeps letters, digits, `.`, `-` and `_`; everything else becomes `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}
