/**
 * Image uploads
 * Multipart form parsing and image storage shared by the gallery and
 * rental handlers
 */
use axum::{body::Bytes, extract::Multipart};
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{ApiError, ApiResult};

pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024; // 10MB
const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];
const IMAGE_FIELD: &str = "image";

/// Subdirectory of the upload root, also the second segment of the public URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Gallery,
    Rentals,
}

impl UploadKind {
    pub fn dir_name(&self) -> &'static str {
        match self {
            UploadKind::Gallery => "gallery",
            UploadKind::Rentals => "rentals",
        }
    }
}

#[derive(Debug)]
pub struct ImageUpload {
    pub original_name: String,
    pub extension: String,
    pub bytes: Bytes,
}

/// An image written to disk. Call [`SavedImage::discard`] when the row that
/// should reference it could not be stored.
#[derive(Debug)]
pub struct SavedImage {
    pub path: PathBuf,
    pub url: String,
    pub file_name: String,
}

impl SavedImage {
    pub async fn discard(self) {
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove orphaned upload");
        }
    }
}

/// Text fields and the optional `image` file of a multipart request.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    pub image: Option<ImageUpload>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = MultipartForm::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            if name == IMAGE_FIELD {
                let original_name = field.file_name().unwrap_or("").to_string();
                let bytes = field.bytes().await?;
                // Browsers send an empty part when no file was picked.
                if original_name.is_empty() && bytes.is_empty() {
                    continue;
                }
                let extension = validate_image(&original_name, &bytes)?;
                form.image = Some(ImageUpload {
                    original_name,
                    extension,
                    bytes,
                });
            } else {
                let value = field.text().await?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    /// Trimmed text value; empty values count as absent.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn bool(&self, name: &str) -> ApiResult<Option<bool>> {
        self.text(name)
            .map(|raw| match raw.to_ascii_lowercase().as_str() {
                "true" | "1" | "on" | "yes" => Ok(true),
                "false" | "0" | "off" | "no" => Ok(false),
                _ => Err(ApiError::invalid(format!("Invalid boolean for '{}'", name))),
            })
            .transpose()
    }

    pub fn number<T: std::str::FromStr>(&self, name: &str) -> ApiResult<Option<T>> {
        self.text(name)
            .map(|raw| {
                raw.parse::<T>()
                    .map_err(|_| ApiError::invalid(format!("Invalid number for '{}'", name)))
            })
            .transpose()
    }
}

fn validate_image_magic_bytes(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() < 4 {
        return None;
    }
    match bytes {
        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        // PNG: 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        // GIF: 47 49 46 38
        [0x47, 0x49, 0x46, 0x38, ..] => Some("image/gif"),
        // WebP: 52 49 46 46 ... 57 45 42 50
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some("image/webp"),
        _ => None,
    }
}

/// Checks name, size and content of an uploaded image and returns its
/// lowercased extension.
pub fn validate_image(original_name: &str, bytes: &[u8]) -> ApiResult<String> {
    let extension = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ApiError::invalid(
            "Unsupported file type. Allowed: jpg, jpeg, png, gif, webp",
        ));
    }
    if bytes.is_empty() {
        return Err(ApiError::invalid("Empty file"));
    }
    if bytes.len() > MAX_FILE_SIZE {
        return Err(ApiError::invalid("File too large. Maximum size is 10MB"));
    }
    if validate_image_magic_bytes(bytes).is_none() {
        return Err(ApiError::invalid(
            "File content does not match an allowed image type",
        ));
    }
    Ok(extension)
}

/// Writes the image as `<unix-nanos>.<ext>` under `<upload_root>/<kind>`.
pub async fn save_image(
    upload_root: &Path,
    kind: UploadKind,
    image: &ImageUpload,
) -> ApiResult<SavedImage> {
    let dir = upload_root.join(kind.dir_name());
    tokio::fs::create_dir_all(&dir).await?;

    let nanos = Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_else(|| Utc::now().timestamp_micros() * 1000);
    let file_name = format!("{}.{}", nanos, image.extension);
    let path = dir.join(&file_name);

    tokio::fs::write(&path, &image.bytes).await?;

    tracing::info!(
        file = %file_name,
        original = %image.original_name,
        size = image.bytes.len(),
        "image uploaded"
    );

    Ok(SavedImage {
        url: format!("/uploads/{}/{}", kind.dir_name(), file_name),
        path,
        file_name,
    })
}

#[cfg(test)]
pub(crate) const PNG_BYTES: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_image_checks_extension_and_content() {
        assert_eq!(validate_image("photo.PNG", PNG_BYTES).unwrap(), "png");
        assert!(validate_image("photo.bmp", PNG_BYTES).is_err());
        assert!(validate_image("noext", PNG_BYTES).is_err());
        assert!(validate_image("fake.jpg", b"not an image at all").is_err());
        assert!(validate_image("empty.png", b"").is_err());
    }

    #[test]
    fn test_validate_image_rejects_oversized() {
        let mut big = PNG_BYTES.to_vec();
        big.resize(MAX_FILE_SIZE + 1, 0);
        assert!(validate_image("big.png", &big).is_err());
    }

    #[tokio::test]
    async fn test_save_image_writes_under_kind_dir() {
        let dir = tempfile::tempdir().unwrap();
        let upload = ImageUpload {
            original_name: "robe.png".to_string(),
            extension: "png".to_string(),
            bytes: Bytes::from_static(PNG_BYTES),
        };

        let saved = save_image(dir.path(), UploadKind::Rentals, &upload).await.unwrap();
        assert!(saved.url.starts_with("/uploads/rentals/"));
        assert!(saved.file_name.ends_with(".png"));
        assert!(saved.path.starts_with(dir.path().join("rentals")));
        assert!(saved.path.exists());

        let path = saved.path.clone();
        saved.discard().await;
        assert!(!path.exists());
    }
}
