//! Media host collaborator: durable storage for message attachments.
//!
//! The core hands raw attachment bytes and a declared kind to a [`MediaHost`]
//! and persists only the returned retrieval URL. The default implementation
//! stores files on the local disk and serves them back through the HTTP
//! layer; a hosted deployment can swap in a CDN-backed implementation behind
//! the same trait.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parley_shared::types::AttachmentKind;
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ServerError;

/// External collaborator interface: bytes in, durable retrieval URL out.
#[async_trait]
pub trait MediaHost: Send + Sync {
    /// Store attachment bytes and return a durable retrieval URL.
    async fn store(&self, data: &[u8], kind: AttachmentKind) -> Result<String, ServerError>;
}

/// Verify that a resolved path stays within the expected base directory.
/// Prevents path traversal attacks.
fn ensure_within(base: &Path, target: &Path) -> Result<PathBuf, ServerError> {
    let canonical_base = base.canonicalize().unwrap_or_else(|_| base.to_path_buf());
    let mut resolved = canonical_base.clone();
    for component in target
        .strip_prefix(&canonical_base)
        .unwrap_or(target)
        .components()
    {
        match component {
            std::path::Component::Normal(c) => resolved.push(c),
            std::path::Component::ParentDir => {
                return Err(ServerError::BadRequest(
                    "Path traversal detected".to_string(),
                ));
            }
            _ => {} // RootDir, CurDir, Prefix — skip
        }
    }
    if !resolved.starts_with(&canonical_base) {
        return Err(ServerError::BadRequest(
            "Path traversal detected".to_string(),
        ));
    }
    Ok(resolved)
}

/// Disk-backed media host. Files are stored under `base_path` named by a
/// fresh UUID and served back via the `/media/{id}` route.
#[derive(Debug, Clone)]
pub struct LocalMediaHost {
    base_path: PathBuf,
    max_size: usize,
}

impl LocalMediaHost {
    pub async fn new(base_path: PathBuf, max_size: usize) -> Result<Self, ServerError> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            ServerError::MediaStorage(format!(
                "Failed to create media directory '{}': {}",
                base_path.display(),
                e
            ))
        })?;

        info!(path = %base_path.display(), "Media store initialized");

        Ok(Self {
            base_path,
            max_size,
        })
    }

    /// Read back a stored attachment by id.
    pub async fn fetch(&self, id: Uuid) -> Result<Vec<u8>, ServerError> {
        let path = self.safe_media_path(&id)?;

        if !path.exists() {
            return Err(ServerError::MediaNotFound(id));
        }

        let data = fs::read(&path)
            .await
            .map_err(|e| ServerError::MediaStorage(format!("Failed to read media {}: {}", id, e)))?;

        debug!(id = %id, size = data.len(), "Retrieved attachment");
        Ok(data)
    }

    /// Safe media path that validates against traversal.
    fn safe_media_path(&self, id: &Uuid) -> Result<PathBuf, ServerError> {
        let raw = self.base_path.join(id.to_string());
        ensure_within(&self.base_path, &raw)
    }
}

#[async_trait]
impl MediaHost for LocalMediaHost {
    async fn store(&self, data: &[u8], kind: AttachmentKind) -> Result<String, ServerError> {
        if data.is_empty() {
            return Err(ServerError::MediaStorage("Empty attachment".to_string()));
        }
        if data.len() > self.max_size {
            return Err(ServerError::MediaTooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let id = Uuid::new_v4();
        let path = self.safe_media_path(&id)?;

        fs::write(&path, data)
            .await
            .map_err(|e| ServerError::MediaStorage(format!("Failed to write media {}: {}", id, e)))?;

        debug!(id = %id, kind = %kind, size = data.len(), "Stored attachment");
        Ok(format!("/media/{id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_host() -> (LocalMediaHost, TempDir) {
        let dir = TempDir::new().unwrap();
        let host = LocalMediaHost::new(dir.path().to_path_buf(), 1024)
            .await
            .unwrap();
        (host, dir)
    }

    fn id_from_url(url: &str) -> Uuid {
        url.strip_prefix("/media/").unwrap().parse().unwrap()
    }

    #[tokio::test]
    async fn store_returns_a_retrieval_url() {
        let (host, _dir) = test_host().await;

        let url = host.store(b"bytes", AttachmentKind::Image).await.unwrap();
        let data = host.fetch(id_from_url(&url)).await.unwrap();
        assert_eq!(data, b"bytes");
    }

    #[tokio::test]
    async fn empty_attachment_rejected() {
        let (host, _dir) = test_host().await;
        assert!(host.store(b"", AttachmentKind::File).await.is_err());
    }

    #[tokio::test]
    async fn oversized_attachment_rejected() {
        let (host, _dir) = test_host().await;
        let big = vec![0u8; 2048];
        assert!(matches!(
            host.store(&big, AttachmentKind::Video).await,
            Err(ServerError::MediaTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn missing_attachment_is_not_found() {
        let (host, _dir) = test_host().await;
        assert!(matches!(
            host.fetch(Uuid::new_v4()).await,
            Err(ServerError::MediaNotFound(_))
        ));
    }
}
