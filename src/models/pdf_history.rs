use crate::models::device::DeviceId;
use chrono::{DateTime, Utc};
use rocket::serde::Serialize;
use schemars::JsonSchema;
use std::path::PathBuf;

/// One uploaded PDF bundle, backed by a file under the device's PDF directory.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfHistoryEntry {
    pub id: String,
    pub device_id: DeviceId,
    pub filename: String,
    pub uploaded_at: DateTime<Utc>,
    pub path: PathBuf,
    pub qr_count: usize,
    pub file_size: u64,
}

/// Ledger entry metadata as exposed to clients; never carries the path.
#[derive(Serialize, Debug, Clone, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PdfInfo {
    pub id: String,
    pub filename: String,
    pub uploaded_at: DateTime<Utc>,
    pub qr_count: usize,
    pub file_size: u64,
}

impl From<&PdfHistoryEntry> for PdfInfo {
    fn from(entry: &PdfHistoryEntry) -> Self {
        Self {
            id: entry.id.clone(),
            filename: entry.filename.clone(),
            uploaded_at: entry.uploaded_at,
            qr_count: entry.qr_count,
            file_size: entry.file_size,
        }
    }
}

#[derive(Serialize, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PdfHistoryResponse {
    pub device_id: DeviceId,
    pub history: Vec<PdfInfo>,
    pub total_count: usize,
}
