//! Socket protocol. Every frame is a JSON text message of the form
//! `{"event": "<name>", "data": {...}}`; unit events may omit `data`.

use crate::models::configuration::{ConfigurationData, PdfBundle, QrEntry, QrUpload};
use crate::models::device::DeviceId;
use crate::models::emergency::{EmergencySignal, EmergencyState};
use crate::models::location::{LocationFix, LocationRecord};
use crate::models::pdf_history::PdfInfo;
use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Serialize};

/// Identity declared by the first message on a transport.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Handshake {
    Device {
        #[serde(rename = "deviceId")]
        device_id: String,
    },
    Client,
}

/// Device handshake as sent by older Pi scripts, answered with
/// `deviceAuthSuccess`/`deviceAuthError`.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceAuth {
    pub device_id: String,
}

/// Messages accepted from devices and browsers.
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    Authenticate(Handshake),
    DeviceAuth(DeviceAuth),
    LocationUpdate(LocationFix),
    QrPdfUpload(PdfBundle),
    QrUpload(QrUpload),
    RequestPhotos,
    Emergency(EmergencySignal),
    ClearEmergency,
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Authenticate(_) => "authenticate",
            ClientEvent::DeviceAuth(_) => "deviceAuth",
            ClientEvent::LocationUpdate(_) => "locationUpdate",
            ClientEvent::QrPdfUpload(_) => "qrPdfUpload",
            ClientEvent::QrUpload(_) => "qrUpload",
            ClientEvent::RequestPhotos => "requestPhotos",
            ClientEvent::Emergency(_) => "emergency",
            ClientEvent::ClearEmergency => "clearEmergency",
        }
    }
}

/// Messages pushed to devices and browsers.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    AuthSuccess(AuthSuccess),
    AuthError(ErrorMessage),
    AuthRequired(AuthRequired),
    DeviceAuthSuccess(AuthSuccess),
    DeviceAuthError(ErrorMessage),
    LocationAck(LocationAck),
    LocationError(ErrorMessage),
    LocationUpdate(LocationRecord),
    LocationHistory(LocationHistory),
    DeviceStatus(DeviceStatus),
    DeviceConnectionStatus(DeviceConnectionStatus),
    ConfigurationData(ConfigurationData),
    QrPdfReceived(PdfReceived),
    PdfReceived(PdfReceived),
    QrCodeReceived(QrCodeReceived),
    QrPdfUploadAck(PdfUploadAck),
    QrPdfUploadError(ErrorMessage),
    QrUploadAck(QrUploadAck),
    QrUploadError(ErrorMessage),
    PhotoData(PhotoData),
    PhotoTransferComplete(PhotoTransferComplete),
    PhotoUploaded(PhotoUploaded),
    EmergencyAlert(EmergencyState),
    EmergencyCleared(EmergencyCleared),
    EmergencyAck(EmergencyAck),
    Error(ErrorMessage),
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error(ErrorMessage::new(message))
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ErrorMessage {
    pub message: String,
}

impl ErrorMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthSuccess {
    pub device_id: DeviceId,
    pub message: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AuthRequired {
    pub message: String,
    pub redirect: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct LocationAck {
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationHistory {
    pub device_id: DeviceId,
    pub history: Vec<LocationRecord>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    pub connected_devices: Vec<DeviceId>,
    pub total_connected: usize,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConnectionStatus {
    pub device_id: DeviceId,
    pub connected: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PdfReceived {
    pub device_id: DeviceId,
    pub filename: String,
    #[serde(rename = "totalQRs")]
    pub total_qrs: usize,
    pub qr_codes: Vec<QrEntry>,
    pub pdf: PdfInfo,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QrCodeReceived {
    pub device_id: DeviceId,
    pub qr_code: QrEntry,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PdfUploadAck {
    pub success: bool,
    pub filename: String,
    #[serde(rename = "processedQRs")]
    pub processed_qrs: usize,
    pub history_id: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct QrUploadAck {
    pub success: bool,
    pub filename: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PhotoData {
    pub qr_filename: String,
    pub filename: String,
    pub image_data: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PhotoTransferComplete {
    pub count: usize,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PhotoUploaded {
    pub device_id: DeviceId,
    pub qr_filename: String,
    pub filename: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
    pub sent_to_pi: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyCleared {
    pub device_id: DeviceId,
    pub cleared_at: DateTime<Utc>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct EmergencyAck {
    pub success: bool,
    pub active: bool,
}
