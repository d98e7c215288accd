//! Local file storage for uploaded images, receipts and documents.
//!
//! Files land in `{upload_dir}/{kind}/{unix_millis}-{random}.{ext}` and are
//! served back under `/uploads`. Only the relative URL is stored on rows.
//!
//! Handlers save a file before the row that references it is written. When
//! that write fails, or a newer file replaces an older one, the orphan is
//! removed with [`UploadStore::discard`].

use std::path::{Path, PathBuf};

use axum::extract::Multipart;
use axum::extract::multipart::Field;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::error::AppError;

/// Largest accepted file.
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Public URL prefix the upload directory is served under.
pub const PUBLIC_PREFIX: &str = "/uploads";

/// What an upload is for. Decides its subdirectory and accepted types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    PetImage,
    ProductImage,
    Receipt,
    BoardingDocument,
}

impl UploadKind {
    const fn dir(self) -> &'static str {
        match self {
            Self::PetImage => "pets",
            Self::ProductImage => "products",
            Self::Receipt => "receipts",
            Self::BoardingDocument => "documents",
        }
    }

    const fn accepts_pdf(self) -> bool {
        matches!(self, Self::Receipt | Self::BoardingDocument)
    }

    /// File extension for an accepted MIME type.
    fn extension_for(self, content_type: &str) -> Option<&'static str> {
        match content_type {
            "image/jpeg" | "image/jpg" => Some("jpg"),
            "image/png" => Some("png"),
            "image/webp" => Some("webp"),
            "image/gif" => Some("gif"),
            "application/pdf" if self.accepts_pdf() => Some("pdf"),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("File exceeds the {max} byte limit", max = MAX_UPLOAD_BYTES)]
    TooLarge,

    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("No file provided")]
    Missing,

    #[error("Invalid upload: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error("Failed to store upload: {0}")]
    Io(#[from] std::io::Error),
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Io(_) => Self::Internal(err.to_string()),
            _ => Self::BadRequest(err.to_string()),
        }
    }
}

/// A file read from a multipart field and checked against its kind.
#[derive(Debug)]
pub struct ReceivedFile {
    /// Multipart field name.
    pub field: String,
    extension: &'static str,
    bytes: Vec<u8>,
}

/// Writes uploads below a root directory.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read every multipart field named in `fields`, validating type and size.
    ///
    /// Other fields are skipped. Returns an empty list when none matched.
    ///
    /// # Errors
    ///
    /// Returns `UploadError` for oversized or unsupported files.
    pub async fn receive(
        multipart: &mut Multipart,
        kind: UploadKind,
        fields: &[&str],
    ) -> Result<Vec<ReceivedFile>, UploadError> {
        let mut files = Vec::new();
        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            if !fields.contains(&name.as_str()) {
                continue;
            }
            let content_type = field.content_type().unwrap_or_default().to_ascii_lowercase();
            let extension = kind
                .extension_for(&content_type)
                .ok_or(UploadError::UnsupportedType(content_type))?;
            let bytes = read_limited(field).await?;
            if bytes.is_empty() {
                return Err(UploadError::Missing);
            }
            files.push(ReceivedFile {
                field: name,
                extension,
                bytes,
            });
        }
        Ok(files)
    }

    /// Read the single file in field `field`.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::Missing` if the field is absent.
    pub async fn receive_one(
        multipart: &mut Multipart,
        kind: UploadKind,
        field: &str,
    ) -> Result<ReceivedFile, UploadError> {
        Self::receive(multipart, kind, &[field])
            .await?
            .into_iter()
            .next()
            .ok_or(UploadError::Missing)
    }

    /// Persist a received file and return its public URL.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::Io` if the file cannot be written.
    #[instrument(skip(self, file), fields(field = %file.field, bytes = file.bytes.len()))]
    pub async fn save(&self, kind: UploadKind, file: &ReceivedFile) -> Result<String, UploadError> {
        let file_name = stored_file_name(file.extension);
        let dir = self.root.join(kind.dir());
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(&file_name), &file.bytes).await?;

        let url = format!("{PUBLIC_PREFIX}/{}/{file_name}", kind.dir());
        debug!(url = %url, "Stored upload");
        Ok(url)
    }

    /// Remove a previously stored upload by its public URL.
    ///
    /// Missing files are ignored. Failures are logged, never returned: a
    /// leftover file must not fail the request that replaced it.
    #[instrument(skip(self))]
    pub async fn discard(&self, url: &str) {
        let Some(path) = self.path_for(url) else {
            warn!("Refusing to remove upload outside the upload directory");
            return;
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!("Removed upload"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(error = %e, "Failed to remove upload"),
        }
    }

    /// Map `/uploads/{dir}/{file}` back to a path below the root.
    fn path_for(&self, url: &str) -> Option<PathBuf> {
        let relative = url.strip_prefix(PUBLIC_PREFIX)?.strip_prefix('/')?;
        let (dir, name) = relative.split_once('/')?;
        let plain = |part: &str| {
            !part.is_empty() && !part.starts_with('.') && !part.contains(['/', '\\'])
        };
        (plain(dir) && plain(name)).then(|| self.root.join(dir).join(name))
    }
}

/// `{unix_millis}-{8 hex chars}.{ext}`
fn stored_file_name(extension: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let random = Uuid::new_v4().simple().to_string();
    format!("{millis}-{}.{extension}", &random[..8])
}

async fn read_limited(mut field: Field<'_>) -> Result<Vec<u8>, UploadError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.chunk().await? {
        if bytes.len() + chunk.len() > MAX_UPLOAD_BYTES {
            return Err(UploadError::TooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_images_accepted_everywhere() {
        for kind in [
            UploadKind::PetImage,
            UploadKind::ProductImage,
            UploadKind::Receipt,
            UploadKind::BoardingDocument,
        ] {
            assert_eq!(kind.extension_for("image/png"), Some("png"));
            assert_eq!(kind.extension_for("image/jpeg"), Some("jpg"));
        }
    }

    #[test]
    fn test_pdf_only_for_paperwork() {
        assert_eq!(UploadKind::Receipt.extension_for("application/pdf"), Some("pdf"));
        assert_eq!(
            UploadKind::BoardingDocument.extension_for("application/pdf"),
            Some("pdf")
        );
        assert_eq!(UploadKind::PetImage.extension_for("application/pdf"), None);
        assert_eq!(UploadKind::Receipt.extension_for("text/html"), None);
    }

    #[test]
    fn test_stored_file_name_shape() {
        let name = stored_file_name("png");
        let (stem, ext) = name.rsplit_once('.').unwrap();
        assert_eq!(ext, "png");
        let (millis, random) = stem.split_once('-').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(random.len(), 8);
    }

    #[tokio::test]
    async fn test_save_writes_below_kind_dir() {
        let root = std::env::temp_dir().join(format!("vetclinic-upload-{}", Uuid::new_v4()));
        let store = UploadStore::new(&root);
        let file = ReceivedFile {
            field: "file".to_string(),
            extension: "pdf",
            bytes: b"%PDF-1.4".to_vec(),
        };

        let url = store.save(UploadKind::Receipt, &file).await.unwrap();
        assert!(url.starts_with("/uploads/receipts/"));
        let on_disk = root.join(url.trim_start_matches("/uploads/"));
        assert_eq!(tokio::fs::read(&on_disk).await.unwrap(), b"%PDF-1.4");

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }

    #[test]
    fn test_path_for_stays_below_root() {
        let store = UploadStore::new("/srv/uploads");
        assert_eq!(
            store.path_for("/uploads/receipts/1-ab.png"),
            Some(PathBuf::from("/srv/uploads/receipts/1-ab.png"))
        );
        assert_eq!(store.path_for("/uploads/../etc/passwd"), None);
        assert_eq!(store.path_for("/uploads/receipts/../../x"), None);
        assert_eq!(store.path_for("/uploads/receipts"), None);
        assert_eq!(store.path_for("/static/receipts/1-ab.png"), None);
    }

    #[tokio::test]
    async fn test_discard_removes_stored_file() {
        let root = std::env::temp_dir().join(format!("vetclinic-upload-{}", Uuid::new_v4()));
        let store = UploadStore::new(&root);
        let file = ReceivedFile {
            field: "file".to_string(),
            extension: "png",
            bytes: vec![1, 2, 3],
        };

        let url = store.save(UploadKind::Receipt, &file).await.unwrap();
        let on_disk = root.join(url.trim_start_matches("/uploads/"));
        assert!(tokio::fs::try_exists(&on_disk).await.unwrap());

        store.discard(&url).await;
        assert!(!tokio::fs::try_exists(&on_disk).await.unwrap());

        // A second discard of the same URL is a no-op.
        store.discard(&url).await;

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }
}
