use crate::models::device::DeviceId;
use crate::models::pdf_history::PdfInfo;
use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use validator::Validate;

/// A QR code belonging to a device's configuration. `image_data` is the
/// base64 image as uploaded, kept for display in the web client.
#[derive(Serialize, Debug, Clone, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QrEntry {
    pub filename: String,
    pub label: String,
    pub uploaded_at: DateTime<Utc>,
    pub has_photo: bool,
    pub image_data: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QrEntrySummary {
    pub filename: String,
    pub label: String,
    pub uploaded_at: DateTime<Utc>,
    pub has_photo: bool,
}

impl From<&QrEntry> for QrEntrySummary {
    fn from(entry: &QrEntry) -> Self {
        Self {
            filename: entry.filename.clone(),
            label: entry.label.clone(),
            uploaded_at: entry.uploaded_at,
            has_photo: entry.has_photo,
        }
    }
}

/// Metadata of a photo stored for a QR entry. The bytes live on disk.
#[derive(Serialize, Debug, Clone, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PhotoEntry {
    pub filename: String,
    pub qr_filename: String,
    pub uploaded_at: DateTime<Utc>,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct Configuration {
    pub device_id: DeviceId,
    pub qr_codes: Vec<QrEntry>,
    pub photos: Vec<PhotoEntry>,
    pub qr_pdf: Option<PdfInfo>,
    pub last_updated: DateTime<Utc>,
}

impl Configuration {
    pub fn empty(device_id: DeviceId, now: DateTime<Utc>) -> Self {
        Self {
            device_id,
            qr_codes: Vec::new(),
            photos: Vec::new(),
            qr_pdf: None,
            last_updated: now,
        }
    }
}

/// Full snapshot pushed to a web client on join: QR images included,
/// photo bytes excluded.
#[derive(Serialize, Debug, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationData {
    pub device_id: DeviceId,
    pub qr_codes: Vec<QrEntry>,
    pub photos: Vec<PhotoEntry>,
    pub qr_pdf: Option<PdfInfo>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Metadata-only view served over HTTP.
#[derive(Serialize, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationResponse {
    pub device_id: DeviceId,
    pub qr_codes: Vec<QrEntrySummary>,
    pub photos: Vec<PhotoEntry>,
    pub qr_pdf: Option<PdfInfo>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl From<&ConfigurationData> for ConfigurationResponse {
    fn from(data: &ConfigurationData) -> Self {
        Self {
            device_id: data.device_id.clone(),
            qr_codes: data.qr_codes.iter().map(QrEntrySummary::from).collect(),
            photos: data.photos.clone(),
            qr_pdf: data.qr_pdf.clone(),
            last_updated: data.last_updated,
        }
    }
}

/// One QR image inside a bundle upload.
#[derive(Deserialize, Debug, Clone, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QrItem {
    #[validate(length(min = 1))]
    pub filename: String,
    pub label: Option<String>,
    #[validate(length(min = 1))]
    pub image_data: String,
}

/// A PDF with the QR codes it was rendered from, as sent over the socket.
#[derive(Deserialize, Debug, Clone, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PdfBundle {
    #[validate(length(min = 1))]
    pub filename: String,
    #[validate(length(min = 1))]
    pub pdf_data: String,
    #[serde(default)]
    #[validate(nested)]
    pub qr_list: Vec<QrItem>,
}

/// HTTP fallback for bundle upload; the device names itself in the body.
#[derive(Deserialize, Debug, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PdfUploadRequest {
    #[validate(length(min = 1))]
    pub device_id: String,
    #[serde(flatten)]
    #[validate(nested)]
    pub bundle: PdfBundle,
}

#[derive(Serialize, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PdfUploadResponse {
    pub success: bool,
    pub message: String,
    pub filename: String,
    #[serde(rename = "processedQRs")]
    pub processed_qrs: usize,
    pub history_id: String,
}

/// Legacy single-QR upload.
#[derive(Deserialize, Debug, Clone, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QrUpload {
    #[validate(length(min = 1))]
    pub filename: String,
    #[validate(length(min = 1))]
    pub image_data: String,
    pub label: Option<String>,
}

#[derive(Serialize, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PhotoUploadResponse {
    pub success: bool,
    pub filename: String,
    pub size: u64,
    pub sent_to_pi: bool,
}

/// Label shown for a QR code uploaded without one: the file stem with
/// underscores turned back into spaces.
pub fn default_label(filename: &str) -> String {
    let stem = filename.rsplit_once('.').map_or(filename, |(stem, _)| stem);
    stem.replace('_', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_label_uses_stem() {
        assert_eq!(default_label("Monday_Math_Book.png"), "Monday Math Book");
        assert_eq!(default_label("noext"), "noext");
    }

    #[test]
    fn bundle_validation_checks_nested_items() {
        let bundle: PdfBundle = serde_json::from_str(r#"{"filename": "bag.pdf", "pdfData": "JVBERi0=", "qrList": [{"filename": "", "imageData": "aGk="}]}"#).unwrap();
        assert!(bundle.validate().is_err());
    }

    #[test]
    fn http_upload_request_flattens_bundle() {
        let request: PdfUploadRequest = serde_json::from_str(
            r#"{"deviceId": "raspi-001", "filename": "bag.pdf", "pdfData": "JVBERi0=", "qrList": [{"filename": "a.png", "label": "A", "imageData": "aGk="}]}"#,
        )
        .unwrap();
        assert!(request.validate().is_ok());
        assert_eq!(request.bundle.qr_list.len(), 1);
    }
}
