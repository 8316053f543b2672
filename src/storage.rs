//! Media storage for generated assets.
//!
//! Writes go to a local directory when `LOCAL_STORAGE_PATH` is set, otherwise
//! to the configured GCS bucket. Locally stored files are served back by the
//! `/media/{*path}` route.

use bytes::Bytes;
use google_cloud_storage::client::Storage;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("no storage backend configured (set LOCAL_STORAGE_PATH or GCS_BUCKET_NAME)")]
    NotConfigured,
    #[error("invalid storage path: {0}")]
    InvalidPath(String),
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("gcs error: {0}")]
    Gcs(String),
}

pub struct GcsBucket {
    pub client: Storage,
    pub bucket: String,
}

impl GcsBucket {
    fn resource(&self) -> String {
        format!("projects/_/buckets/{}", self.bucket)
    }
}

pub struct MediaStorage {
    local_root: Option<PathBuf>,
    gcs: Option<GcsBucket>,
    public_base_url: String,
}

/// Reject keys that could escape the storage root.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() || key.contains("..") || key.contains('\0') || key.starts_with('/') {
        return Err(StorageError::InvalidPath(key.to_string()));
    }
    Ok(())
}

pub fn content_type_for(path: &str) -> &'static str {
    if path.ends_with(".mp4") {
        "video/mp4"
    } else if path.ends_with(".webm") {
        "video/webm"
    } else if path.ends_with(".mov") {
        "video/quicktime"
    } else if path.ends_with(".png") {
        "image/png"
    } else if path.ends_with(".jpg") || path.ends_with(".jpeg") {
        "image/jpeg"
    } else if path.ends_with(".webp") {
        "image/webp"
    } else {
        "application/octet-stream"
    }
}

impl MediaStorage {
    pub fn new(local_root: Option<PathBuf>, gcs: Option<GcsBucket>, public_base_url: &str) -> Self {
        Self {
            local_root,
            gcs,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Store `data` under `key` and return the URL clients should fetch it from.
    pub async fn put(&self, key: &str, data: Bytes) -> Result<String, StorageError> {
        validate_key(key)?;

        if let Some(root) = &self.local_root {
            let full_path = root.join(key);
            if let Some(parent) = full_path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&full_path, &data).await?;
            return Ok(format!("{}/media/{}", self.public_base_url, key));
        }

        if let Some(gcs) = &self.gcs {
            gcs.client
                .write_object(&gcs.resource(), key, data)
                .send_buffered()
                .await
                .map_err(|e| StorageError::Gcs(e.to_string()))?;
            return Ok(format!(
                "https://storage.googleapis.com/{}/{}",
                gcs.bucket, key
            ));
        }

        Err(StorageError::NotConfigured)
    }

    /// Read an object back. Local disk first, then GCS. `None` when absent.
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        validate_key(key)?;

        if let Some(root) = &self.local_root {
            let full_path = root.join(key);
            if let (Ok(canonical), Ok(root_canonical)) =
                (full_path.canonicalize(), root.canonicalize())
            {
                if !canonical.starts_with(&root_canonical) {
                    return Err(StorageError::InvalidPath(key.to_string()));
                }
                match tokio::fs::read(&canonical).await {
                    Ok(bytes) => return Ok(Some(bytes)),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }

        if let Some(gcs) = &self.gcs {
            let mut resp = match gcs.client.read_object(&gcs.resource(), key).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    tracing::debug!(error = %e, key, "GCS read failed");
                    return Ok(None);
                }
            };
            let mut data = Vec::new();
            while let Some(chunk) = resp.next().await {
                data.extend_from_slice(&chunk.map_err(|e| StorageError::Gcs(e.to_string()))?);
            }
            return Ok(Some(data));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_traversal_keys() {
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("/abs/path.mp4").is_err());
        assert!(validate_key("").is_err());
        assert!(validate_key("videos/1/clip.mp4").is_ok());
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type_for("a/b.mp4"), "video/mp4");
        assert_eq!(content_type_for("thumb.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("blob"), "application/octet-stream");
    }

    #[tokio::test]
    async fn local_put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let storage = MediaStorage::new(
            Some(dir.path().to_path_buf()),
            None,
            "http://localhost:3000/",
        );

        let url = storage
            .put("videos/7/out.mp4", Bytes::from_static(b"mp4data"))
            .await
            .unwrap();
        assert_eq!(url, "http://localhost:3000/media/videos/7/out.mp4");

        let bytes = storage.get("videos/7/out.mp4").await.unwrap();
        assert_eq!(bytes.as_deref(), Some(&b"mp4data"[..]));
        assert!(storage.get("videos/7/missing.mp4").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_without_backend_fails() {
        let storage = MediaStorage::new(None, None, "http://localhost:3000");
        let err = storage
            .put("a.mp4", Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotConfigured));
    }
}
