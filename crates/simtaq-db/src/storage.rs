//! Local-disk object storage for uploaded images.
//!
//! Objects live under `uploads_dir` and are served by the HTTP layer at
//! `public_prefix`. Keys are relative slash-separated paths such as
//! `ttd/ttd_<guru>_<ts>.png`.

use anyhow::{Context, Result, bail};
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};

use simtaq_common::config::StorageConfig;

/// Image types accepted for signatures and certificate templates.
pub const IMAGE_CONTENT_TYPES: [&str; 3] = ["image/png", "image/jpeg", "image/jpg"];

/// Result of a successful upload.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub key: String,
    pub public_url: String,
    pub size: usize,
    /// Hex SHA-256 of the bytes.
    pub checksum: String,
}

#[derive(Debug, Clone)]
pub struct StorageClient {
    root: PathBuf,
    public_prefix: String,
    max_bytes: usize,
}

impl StorageClient {
    pub fn new(cfg: &StorageConfig) -> Self {
        Self {
            root: PathBuf::from(&cfg.uploads_dir),
            public_prefix: cfg.public_prefix.trim_end_matches('/').to_string(),
            max_bytes: cfg.max_upload_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Create the upload root if absent.
    pub async fn ensure_root(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("creating uploads dir {}", self.root.display()))
    }

    /// Resolve a key to a path below the root, rejecting traversal.
    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key.trim_start_matches('/'));
        if relative.as_os_str().is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            bail!("invalid storage key: {key}");
        }
        Ok(self.root.join(relative))
    }

    /// Public URL for a key, e.g. `/uploads/ttd/a.png`.
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_prefix, key.trim_start_matches('/'))
    }

    /// Key for a public URL produced by [`public_url`](Self::public_url).
    pub fn key_from_url<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(self.public_prefix.as_str())
            .map(|rest| rest.trim_start_matches('/'))
            .filter(|rest| !rest.is_empty())
    }

    /// Write bytes under `key`, replacing any existing object.
    pub async fn put_object(&self, key: &str, data: &[u8]) -> Result<StoredObject> {
        if data.len() > self.max_bytes {
            bail!("object of {} bytes exceeds limit of {}", data.len(), self.max_bytes);
        }
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, data)
            .await
            .with_context(|| format!("writing {}", path.display()))?;

        let checksum = hex::encode(Sha256::digest(data));
        tracing::debug!(key, size = data.len(), %checksum, "Stored upload");

        Ok(StoredObject {
            key: key.to_string(),
            public_url: self.public_url(key),
            size: data.len(),
            checksum,
        })
    }

    pub async fn read_object(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))
    }

    /// Delete an object. Missing objects are not an error.
    pub async fn delete_object(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("deleting {}", path.display())),
        }
    }
}

/// Content type from the declared type, falling back to the file extension.
pub fn content_type_for(filename: &str, declared: Option<&str>) -> String {
    declared
        .filter(|ct| !ct.is_empty() && *ct != "application/octet-stream")
        .map(str::to_string)
        .unwrap_or_else(|| mime_guess::from_path(filename).first_or_octet_stream().to_string())
}

pub fn is_image(content_type: &str) -> bool {
    IMAGE_CONTENT_TYPES.contains(&content_type)
}

/// File extension for an accepted image type.
pub fn image_extension(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        _ => "jpg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> StorageClient {
        let dir = std::env::temp_dir().join(format!("simtaq-storage-{}", uuid::Uuid::new_v4()));
        StorageClient::new(&StorageConfig {
            uploads_dir: dir.to_string_lossy().into_owned(),
            public_prefix: "/uploads/".into(),
            max_upload_bytes: 16,
        })
    }

    #[tokio::test]
    async fn put_read_delete() {
        let storage = client();
        let stored = storage.put_object("ttd/a.png", b"png-bytes").await.unwrap();
        assert_eq!(stored.public_url, "/uploads/ttd/a.png");
        assert_eq!(stored.checksum.len(), 64);
        assert_eq!(storage.read_object("ttd/a.png").await.unwrap(), b"png-bytes");

        storage.delete_object("ttd/a.png").await.unwrap();
        storage.delete_object("ttd/a.png").await.unwrap();
        assert!(storage.read_object("ttd/a.png").await.is_err());
        let _ = std::fs::remove_dir_all(storage.root());
    }

    #[tokio::test]
    async fn rejects_traversal_and_oversize() {
        let storage = client();
        assert!(storage.put_object("../escape.png", b"x").await.is_err());
        assert!(storage.put_object("big.png", &[0u8; 17]).await.is_err());
        let _ = std::fs::remove_dir_all(storage.root());
    }

    #[test]
    fn url_key_mapping_and_types() {
        let storage = client();
        assert_eq!(storage.key_from_url("/uploads/templates/t.png"), Some("templates/t.png"));
        assert_eq!(storage.key_from_url("/elsewhere/t.png"), None);
        assert_eq!(content_type_for("logo.PNG", None), "image/png");
        assert_eq!(content_type_for("x.bin", Some("image/jpeg")), "image/jpeg");
        assert!(is_image("image/jpeg"));
        assert!(!is_image("application/pdf"));
        assert_eq!(image_extension("image/png"), "png");
    }
}
