//! Multipart helpers shared by the image upload endpoints
//! (teacher signatures, signer signatures, certificate templates).

use axum::extract::Multipart;
use simtaq_common::error::{SimtaqError, SimtaqResult};
use simtaq_db::storage::{self, StorageClient, StoredObject};
use std::collections::HashMap;

/// An image read from the `file` field of a multipart form.
#[derive(Debug)]
pub struct ImageUpload {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn extension(&self) -> &'static str {
        storage::image_extension(&self.content_type)
    }
}

/// The uploaded image plus every other text field of the form.
pub struct ImageForm {
    pub image: ImageUpload,
    pub fields: HashMap<String, String>,
}

impl ImageForm {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|v| v.trim()).filter(|v| !v.is_empty())
    }
}

/// Read a form with one PNG/JPEG `file` field no larger than the storage limit.
pub async fn read_image_form(mut multipart: Multipart, storage: &StorageClient) -> SimtaqResult<ImageForm> {
    let mut image = None;
    let mut fields = HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| SimtaqError::validation(format!("Form upload tidak valid: {e}")))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if name == "file" {
            let filename = sanitize_filename(field.file_name().unwrap_or("upload"));
            let content_type = storage::content_type_for(&filename, field.content_type());
            if !storage::is_image(&content_type) {
                return Err(SimtaqError::validation("Format file harus PNG atau JPG"));
            }
            let bytes = field
                .bytes()
                .await
                .map_err(|e| SimtaqError::validation(format!("Gagal membaca file: {e}")))?;
            if bytes.is_empty() {
                return Err(SimtaqError::validation("File kosong"));
            }
            if bytes.len() > storage.max_bytes() {
                return Err(SimtaqError::validation(format!(
                    "Ukuran file maksimal {} MB",
                    storage.max_bytes() / (1024 * 1024)
                )));
            }
            image = Some(ImageUpload {
                filename,
                content_type,
                bytes: bytes.to_vec(),
            });
        } else {
            let value = field.text().await.unwrap_or_default();
            fields.insert(name, value);
        }
    }

    let image = image.ok_or_else(|| SimtaqError::validation("File wajib diunggah"))?;
    Ok(ImageForm { image, fields })
}

/// Store an upload, mapping storage failures to an internal error.
pub async fn store(storage: &StorageClient, key: &str, bytes: &[u8]) -> SimtaqResult<StoredObject> {
    storage.put_object(key, bytes).await.map_err(SimtaqError::Internal)
}

/// Best-effort removal of a previously stored object by its public URL.
pub async fn remove_by_url(storage: &StorageClient, url: Option<&str>) {
    let Some(key) = url.and_then(|u| storage.key_from_url(u)) else {
        return;
    };
    if let Err(e) = storage.delete_object(key).await {
        tracing::warn!(error = %e, key, "Failed to delete stale upload");
    }
}

/// Read a stored object back by its public URL.
pub async fn read_by_url(storage: &StorageClient, url: &str) -> Option<Vec<u8>> {
    let key = storage.key_from_url(url)?;
    match storage.read_object(key).await {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            tracing::warn!(error = %e, key, "Stored image unavailable");
            None
        }
    }
}

/// Keep ASCII letters, digits, dot, dash and underscore.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let clean: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let clean = clean.trim_matches('.').to_string();
    if clean.is_empty() {
        "upload".into()
    } else {
        clean
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filenames_are_flattened() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\tmp\\ttd guru.png"), "ttd_guru.png");
        assert_eq!(sanitize_filename(".."), "upload");
        assert_eq!(sanitize_filename("tanda-tangan_01.JPG"), "tanda-tangan_01.JPG");
    }
}
