use crate::error::app_error::AppError;
use crate::models::device::DeviceId;
use crate::models::pdf_history::PdfHistoryEntry;
use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::fs;
use tracing::{debug, warn};

static UNSAFE_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]").expect("valid filename pattern"));

/// Reduces an uploaded name to a single safe path component.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned = UNSAFE_CHARS.replace_all(base, "_");
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() { "file".to_string() } else { cleaned.to_string() }
}

/// Per-device directory trees for PDFs, QR images and item photos.
///
/// ```text
/// <qr_root>/<device>/pdf/<millis>_<suffix>_<name>.pdf
/// <qr_root>/<device>/qr/<qr filename>
/// <photo_root>/<device>/<stem>.jpg
/// ```
#[derive(Debug, Clone)]
pub struct FileStore {
    qr_root: PathBuf,
    photo_root: PathBuf,
}

impl FileStore {
    pub fn new(qr_root: impl Into<PathBuf>, photo_root: impl Into<PathBuf>) -> Self {
        Self {
            qr_root: qr_root.into(),
            photo_root: photo_root.into(),
        }
    }

    pub async fn prepare(&self) -> Result<(), AppError> {
        for root in [&self.qr_root, &self.photo_root] {
            fs::create_dir_all(root)
                .await
                .map_err(|e| AppError::storage(format!("Failed to create {}", root.display()), e))?;
        }
        Ok(())
    }

    fn device_dir(root: &Path, device_id: &DeviceId) -> PathBuf {
        root.join(sanitize_filename(device_id.as_str()))
    }

    fn pdf_dir(&self, device_id: &DeviceId) -> PathBuf {
        Self::device_dir(&self.qr_root, device_id).join("pdf")
    }

    fn qr_dir(&self, device_id: &DeviceId) -> PathBuf {
        Self::device_dir(&self.qr_root, device_id).join("qr")
    }

    pub fn qr_image_path(&self, device_id: &DeviceId, qr_filename: &str) -> PathBuf {
        self.qr_dir(device_id).join(sanitize_filename(qr_filename))
    }

    pub fn photo_path(&self, device_id: &DeviceId, photo_filename: &str) -> PathBuf {
        Self::device_dir(&self.photo_root, device_id).join(sanitize_filename(photo_filename))
    }

    /// Writes the PDF under a name prefixed with the ledger id so the ledger
    /// can be rebuilt from the directory listing.
    pub async fn save_pdf(&self, device_id: &DeviceId, entry_id: &str, filename: &str, bytes: &[u8]) -> Result<PathBuf, AppError> {
        let name = format!("{}_{}", entry_id.replacen('-', "_", 1), sanitize_filename(filename));
        let path = self.pdf_dir(device_id).join(name);
        if let Err(e) = write_file(&path, bytes).await {
            // A partial file here would be picked up as history on restart.
            match fs::remove_file(&path).await {
                Err(remove_error) if remove_error.kind() != ErrorKind::NotFound => {
                    warn!(path = %path.display(), error = %remove_error, "failed to delete partial pdf");
                }
                _ => {}
            }
            return Err(e);
        }
        Ok(path)
    }

    pub async fn save_qr_image(&self, device_id: &DeviceId, qr_filename: &str, bytes: &[u8]) -> Result<PathBuf, AppError> {
        let path = self.qr_image_path(device_id, qr_filename);
        write_file(&path, bytes).await?;
        Ok(path)
    }

    pub async fn save_photo(&self, device_id: &DeviceId, photo_filename: &str, bytes: &[u8]) -> Result<PathBuf, AppError> {
        let path = self.photo_path(device_id, photo_filename);
        write_file(&path, bytes).await?;
        Ok(path)
    }

    pub async fn read(&self, path: &Path) -> Result<Vec<u8>, AppError> {
        self.read_optional(path)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("file {}", path.file_name().unwrap_or_default().to_string_lossy())))
    }

    /// `None` when the file no longer exists.
    pub async fn read_optional(&self, path: &Path) -> Result<Option<Vec<u8>>, AppError> {
        match fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::storage(format!("Failed to read {}", path.display()), e)),
        }
    }

    /// Deletes the file of an evicted ledger entry. Failures are only logged.
    pub async fn remove_evicted(&self, entry: &PdfHistoryEntry) {
        match fs::remove_file(&entry.path).await {
            Ok(()) => debug!(device_id = %entry.device_id, history_id = %entry.id, "evicted pdf deleted"),
            Err(e) => warn!(
                device_id = %entry.device_id,
                history_id = %entry.id,
                path = %entry.path.display(),
                error = %e,
                "failed to delete evicted pdf"
            ),
        }
    }

    /// Lists the PDFs stored for a device as ledger entries. Files whose names
    /// do not carry a ledger id are ignored.
    pub async fn scan_pdf_history(&self, device_id: &DeviceId) -> Result<Vec<PdfHistoryEntry>, AppError> {
        let dir = self.pdf_dir(device_id);
        let mut reader = match fs::read_dir(&dir).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::storage(format!("Failed to list {}", dir.display()), e)),
        };

        let mut found = Vec::new();
        while let Some(item) = reader
            .next_entry()
            .await
            .map_err(|e| AppError::storage(format!("Failed to list {}", dir.display()), e))?
        {
            let name = item.file_name().to_string_lossy().into_owned();
            let Some((id, filename, uploaded_at)) = parse_stored_pdf_name(&name) else {
                debug!(device_id = %device_id, file = %name, "skipping unrecognised file in pdf directory");
                continue;
            };
            let metadata = item
                .metadata()
                .await
                .map_err(|e| AppError::storage(format!("Failed to stat {name}"), e))?;
            if !metadata.is_file() {
                continue;
            }

            found.push(PdfHistoryEntry {
                id,
                device_id: device_id.clone(),
                filename,
                uploaded_at,
                path: item.path(),
                qr_count: 0,
                file_size: metadata.len(),
            });
        }

        Ok(found)
    }
}

fn parse_stored_pdf_name(name: &str) -> Option<(String, String, DateTime<Utc>)> {
    let mut parts = name.splitn(3, '_');
    let millis = parts.next()?;
    let suffix = parts.next()?;
    let filename = parts.next()?;

    if suffix.len() != 8 || !suffix.chars().all(|c| c.is_ascii_hexdigit()) || filename.is_empty() {
        return None;
    }
    let uploaded_at = Utc.timestamp_millis_opt(millis.parse().ok()?).single()?;
    Some((format!("{millis}-{suffix}"), filename.to_string(), uploaded_at))
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| AppError::storage(format!("Failed to create {}", parent.display()), e))?;
    }
    fs::write(path, bytes)
        .await
        .map_err(|e| AppError::storage(format!("Failed to write {}", path.display()), e))
}
