//! Multipart image intake for product listings.
//!
//! Files land in the configured upload directory under a generated name and
//! are referenced by that name alone; `/uploads/{name}` serves them back.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use axum::extract::{Multipart, multipart::MultipartError};
use chrono::Utc;
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub const IMAGE_FIELD: &str = "images";
pub const MAX_FILES: usize = 5;
pub const MAX_FILE_BYTES: usize = 10 * 1024 * 1024;
/// Upper bound for a whole multipart request body.
pub const MAX_REQUEST_BYTES: usize = MAX_FILES * MAX_FILE_BYTES + 1024 * 1024;

/// Text fields and stored image names from one multipart request.
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub images: Vec<String>,
}

impl MultipartForm {
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Drains `multipart`, storing every `images` part under `dir`.
///
/// Files already written are removed again if the request turns out to be bad.
pub async fn read_form(multipart: &mut Multipart, dir: &Path) -> AppResult<MultipartForm> {
    let mut form = MultipartForm::default();
    match drain(multipart, dir, &mut form).await {
        Ok(()) => Ok(form),
        Err(err) => {
            discard(dir, &form.images).await;
            Err(err)
        }
    }
}

async fn drain(multipart: &mut Multipart, dir: &Path, form: &mut MultipartForm) -> AppResult<()> {
    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name != IMAGE_FIELD && name != "images[]" {
            let value = field.text().await.map_err(multipart_error)?;
            form.fields.insert(name, value);
            continue;
        }

        if form.images.len() >= MAX_FILES {
            return Err(AppError::bad_request(format!(
                "At most {MAX_FILES} images may be uploaded"
            )));
        }

        let stored = stored_name(field.file_name(), Utc::now().timestamp_millis(), Uuid::new_v4());
        let path = dir.join(&stored);
        let mut file = fs::File::create(&path).await?;
        // registered before writing so a failure below cleans it up
        form.images.push(stored);

        let mut written = 0usize;
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            written += chunk.len();
            if written > MAX_FILE_BYTES {
                return Err(AppError::bad_request(format!(
                    "Image exceeds the {} MiB limit",
                    MAX_FILE_BYTES / (1024 * 1024)
                )));
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        if written == 0 {
            // browsers send an empty part when no file was picked
            if let Some(stored) = form.images.pop() {
                remove(dir, &stored).await;
            }
        }
    }
    Ok(())
}

/// Builds `<unix-millis>-<8 hex chars><.ext>`, keeping only a short alphanumeric extension.
pub fn stored_name(original: Option<&str>, millis: i64, id: Uuid) -> String {
    let ext = original
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8)
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default();
    let simple = id.simple().to_string();
    let short = &simple[..8];
    format!("{millis}-{short}{ext}")
}

pub async fn discard(dir: &Path, names: &[String]) {
    for name in names {
        remove(dir, name).await;
    }
}

async fn remove(dir: &Path, name: &str) {
    let path: PathBuf = dir.join(name);
    if let Err(err) = fs::remove_file(&path).await {
        tracing::warn!(error = %err, path = %path.display(), "failed to remove upload");
    }
}

fn multipart_error(err: MultipartError) -> AppError {
    AppError::BadRequest(err.body_text())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> Uuid {
        Uuid::parse_str("0123abcd-0000-4000-8000-000000000000").expect("uuid")
    }

    #[test]
    fn keeps_simple_extension() {
        assert_eq!(
            stored_name(Some("My Sneaker.JPG"), 1700000000000, id()),
            "1700000000000-0123abcd.jpg"
        );
    }

    #[test]
    fn drops_suspicious_or_missing_extension() {
        assert_eq!(stored_name(None, 1, id()), "1-0123abcd");
        assert_eq!(stored_name(Some("noext"), 1, id()), "1-0123abcd");
        assert_eq!(stored_name(Some("evil.ph p"), 1, id()), "1-0123abcd");
        assert_eq!(stored_name(Some("../../x.averyveryverylongext"), 1, id()), "1-0123abcd");
    }

    #[test]
    fn blank_text_fields_read_as_missing() {
        let mut form = MultipartForm::default();
        form.fields.insert("name".into(), "  Air Max  ".into());
        form.fields.insert("description".into(), "   ".into());
        assert_eq!(form.text("name"), Some("Air Max"));
        assert_eq!(form.text("description"), None);
        assert_eq!(form.text("brand"), None);
    }
}
