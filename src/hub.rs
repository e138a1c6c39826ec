//! Shared relay state and the operations performed on it by sockets and
//! HTTP handlers alike.
//!
//! Everything mutable lives in one [`HubState`] behind a single async mutex.
//! Mutations finish without awaiting while the guard is held; file I/O,
//! base64 work and image encoding happen before or after.

pub mod connection;
pub mod registry;

use crate::config::{PhotoConfig, RelayConfig};
use crate::error::app_error::AppError;
use crate::models::configuration::{
    ConfigurationResponse, PdfBundle, PhotoEntry, PhotoUploadResponse, QrEntry, QrUpload, default_label,
};
use crate::models::device::{DeviceId, DevicesResponse};
use crate::models::emergency::{DEFAULT_EMERGENCY_MESSAGE, EmergencySignal, EmergencyState};
use crate::models::events::{
    AuthRequired, AuthSuccess, ClientEvent, DeviceConnectionStatus, DeviceStatus, EmergencyAck, EmergencyCleared, ErrorMessage,
    Handshake, LocationAck, LocationHistory, PdfReceived, PdfUploadAck, PhotoData, PhotoTransferComplete, PhotoUploaded,
    QrCodeReceived, QrUploadAck, ServerEvent,
};
use crate::models::location::{LocationFix, LocationRecord, LocationSnapshot};
use crate::models::pdf_history::{PdfHistoryEntry, PdfHistoryResponse, PdfInfo};
use crate::models::session::Session;
use crate::service::archive::{ArchiveFile, build_zip};
use crate::service::payload::{decode_base64, encode_base64};
use crate::service::photo::{compress_photo, photo_filename};
use crate::store::configurations::ConfigurationStore;
use crate::store::credentials::CredentialStore;
use crate::store::files::{FileStore, sanitize_filename};
use crate::store::ledger::{PdfLedger, generate_id};
use crate::store::locations::LocationBook;
use chrono::{DateTime, Utc};
use registry::{ConnectionId, Outbound, Registry, TransportRole};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tracing::{debug, info, warn};
use validator::Validate;

pub const LOGIN_REDIRECT: &str = "/login";

#[derive(Debug)]
struct HubState {
    registry: Registry,
    locations: LocationBook,
    configurations: ConfigurationStore,
    ledger: PdfLedger,
    emergencies: HashMap<DeviceId, EmergencyState>,
}

/// Which pair of events answers a device handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandshakeReply {
    /// `authSuccess` / `authError`
    Auth,
    /// `deviceAuthSuccess` / `deviceAuthError`, for `deviceAuth` frames
    DeviceAuth,
}

impl HandshakeReply {
    fn success(self, body: AuthSuccess) -> ServerEvent {
        match self {
            HandshakeReply::Auth => ServerEvent::AuthSuccess(body),
            HandshakeReply::DeviceAuth => ServerEvent::DeviceAuthSuccess(body),
        }
    }

    fn failure(self, body: ErrorMessage) -> ServerEvent {
        match self {
            HandshakeReply::Auth => ServerEvent::AuthError(body),
            HandshakeReply::DeviceAuth => ServerEvent::DeviceAuthError(body),
        }
    }
}

/// Which event announces a stored bundle to web clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleSource {
    Socket,
    Http,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BundleStored {
    pub filename: String,
    pub processed_qrs: usize,
    pub history_id: String,
}

/// A stored file ready to be served as a download.
#[derive(Debug)]
pub struct StoredFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug)]
pub struct Hub {
    state: Mutex<HubState>,
    /// Held while a device's QR and photo files are written or exported, so
    /// files on disk always match the configuration committed last.
    file_locks: Mutex<HashMap<DeviceId, Arc<Mutex<()>>>>,
    credentials: Arc<CredentialStore>,
    files: FileStore,
    photo: PhotoConfig,
}

impl HubState {
    fn require_device(&self, id: ConnectionId) -> Result<DeviceId, AppError> {
        self.registry.device_of(id).cloned().ok_or(AppError::UnauthorizedTransport)
    }

    fn device_status(&self) -> ServerEvent {
        let connected_devices = self.registry.connected_devices();
        ServerEvent::DeviceStatus(DeviceStatus {
            total_connected: connected_devices.len(),
            connected_devices,
        })
    }

    fn announce_presence(&self, device_id: &DeviceId, connected: bool) {
        self.registry.broadcast_all_clients(self.device_status());
        self.registry.broadcast_to_device_clients(
            device_id,
            ServerEvent::DeviceConnectionStatus(DeviceConnectionStatus {
                device_id: device_id.clone(),
                connected,
            }),
        );
    }

    /// Everything a browser needs to render a device right after joining.
    fn send_client_snapshot(&self, id: ConnectionId, device_id: &DeviceId) {
        if let Some(current) = self.locations.current(device_id) {
            self.registry.send(id, ServerEvent::LocationUpdate(current));
        }
        self.registry.send(
            id,
            ServerEvent::LocationHistory(LocationHistory {
                device_id: device_id.clone(),
                history: self.locations.history(device_id),
            }),
        );
        self.registry.send(id, self.device_status());
        self.registry.send(id, ServerEvent::ConfigurationData(self.configurations.snapshot(device_id)));
        self.registry.send(
            id,
            ServerEvent::DeviceConnectionStatus(DeviceConnectionStatus {
                device_id: device_id.clone(),
                connected: self.registry.is_device_connected(device_id),
            }),
        );
        if let Some(emergency) = self.emergencies.get(device_id) {
            self.registry.send(id, ServerEvent::EmergencyAlert(emergency.clone()));
        }
    }

    fn apply_location(&mut self, device_id: &DeviceId, fix: LocationFix, now: DateTime<Utc>) -> LocationRecord {
        let record = self.locations.record(device_id, fix, now);
        self.registry.broadcast_all_clients(ServerEvent::LocationUpdate(record.clone()));
        record
    }

    fn raise_emergency(&mut self, device_id: &DeviceId, signal: EmergencySignal, now: DateTime<Utc>) -> EmergencyState {
        let state = EmergencyState {
            device_id: device_id.clone(),
            message: signal
                .message
                .filter(|message| !message.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_EMERGENCY_MESSAGE.to_string()),
            latitude: signal.latitude,
            longitude: signal.longitude,
            raised_at: now,
        };
        self.emergencies.insert(device_id.clone(), state.clone());
        self.registry
            .broadcast_to_device_clients(device_id, ServerEvent::EmergencyAlert(state.clone()));
        state
    }

    fn clear_emergency(&mut self, device_id: &DeviceId, now: DateTime<Utc>) -> bool {
        let was_active = self.emergencies.remove(device_id).is_some();
        self.registry.broadcast_to_device_clients(
            device_id,
            ServerEvent::EmergencyCleared(EmergencyCleared {
                device_id: device_id.clone(),
                cleared_at: now,
            }),
        );
        was_active
    }
}

impl Hub {
    pub fn new(relay: &RelayConfig, photo: PhotoConfig, credentials: Arc<CredentialStore>, files: FileStore) -> Self {
        Self {
            state: Mutex::new(HubState {
                registry: Registry::default(),
                locations: LocationBook::new(relay.location_history_limit),
                configurations: ConfigurationStore::default(),
                ledger: PdfLedger::new(relay.pdf_history_limit),
                emergencies: HashMap::new(),
            }),
            file_locks: Mutex::new(HashMap::new()),
            credentials,
            files,
            photo,
        }
    }

    async fn lock_device_files(&self, device_id: &DeviceId) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(self.file_locks.lock().await.entry(device_id.clone()).or_default());
        lock.lock_owned().await
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// HTTP uploads name their device in the body; only allow-listed ids pass.
    pub fn authorize_device(&self, device_id: &str) -> Result<DeviceId, AppError> {
        self.credentials
            .resolve(device_id.trim())
            .ok_or_else(|| AppError::UnauthorizedDevice(device_id.to_string()))
    }

    /// Rebuilds every device's PDF ledger from the files on disk.
    pub async fn restore_ledgers(&self) -> Result<usize, AppError> {
        let mut restored = 0;
        for device_id in self.credentials.device_ids() {
            let found = self.files.scan_pdf_history(&device_id).await?;
            if found.is_empty() {
                continue;
            }

            let overflow = {
                let mut state = self.state.lock().await;
                let overflow = state.ledger.restore(&device_id, found);
                let latest = state.ledger.latest(&device_id).map(PdfInfo::from);
                restored += state.ledger.list(&device_id).len();
                state.configurations.set_qr_pdf(&device_id, latest, Utc::now());
                overflow
            };

            for entry in &overflow {
                self.files.remove_evicted(entry).await;
            }
            info!(device_id = %device_id, dropped = overflow.len(), "pdf history restored from disk");
        }
        Ok(restored)
    }

    // ── Transports ──────────────────────────────────────────────────────────

    pub async fn open(&self) -> (ConnectionId, UnboundedReceiver<Outbound>) {
        let (sender, receiver) = unbounded_channel();
        let id = self.state.lock().await.registry.register(sender);
        debug!(connection_id = id, "transport opened");
        (id, receiver)
    }

    pub async fn close(&self, id: ConnectionId) {
        let mut state = self.state.lock().await;
        if let Some(device_id) = state.registry.remove(id) {
            info!(device_id = %device_id, connection_id = id, "device disconnected");
            state.announce_presence(&device_id, false);
        } else {
            debug!(connection_id = id, "transport closed");
        }
    }

    /// False only while the transport has not completed a handshake.
    pub async fn is_identified(&self, id: ConnectionId) -> bool {
        !matches!(self.state.lock().await.registry.role(id), Some(TransportRole::Unidentified))
    }

    pub(crate) async fn reply(&self, id: ConnectionId, event: ServerEvent) {
        self.state.lock().await.registry.send(id, event);
    }

    pub async fn handle_text(&self, id: ConnectionId, session: Option<&Session>, text: &str) {
        match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => self.handle_event(id, session, event).await,
            Err(e) => {
                debug!(connection_id = id, error = %e, "rejected malformed frame");
                self.reply(id, ServerEvent::error(format!("Invalid message: {e}"))).await;
            }
        }
    }

    pub async fn handle_event(&self, id: ConnectionId, session: Option<&Session>, event: ClientEvent) {
        let name = event.name();
        let on_error: fn(ErrorMessage) -> ServerEvent = match &event {
            ClientEvent::LocationUpdate(_) => ServerEvent::LocationError,
            ClientEvent::QrPdfUpload(_) => ServerEvent::QrPdfUploadError,
            ClientEvent::QrUpload(_) => ServerEvent::QrUploadError,
            _ => ServerEvent::Error,
        };

        let result = match event {
            ClientEvent::Authenticate(handshake) => {
                self.authenticate(id, handshake, session, HandshakeReply::Auth).await;
                Ok(())
            }
            ClientEvent::DeviceAuth(auth) => {
                let handshake = Handshake::Device { device_id: auth.device_id };
                self.authenticate(id, handshake, session, HandshakeReply::DeviceAuth).await;
                Ok(())
            }
            ClientEvent::LocationUpdate(fix) => self.device_location(id, fix).await,
            ClientEvent::QrPdfUpload(bundle) => self.device_bundle(id, bundle).await,
            ClientEvent::QrUpload(upload) => self.device_qr(id, upload).await,
            ClientEvent::RequestPhotos => self.send_photos(id).await,
            ClientEvent::Emergency(signal) => self.device_emergency(id, signal).await,
            ClientEvent::ClearEmergency => self.device_clear_emergency(id).await,
        };

        if let Err(error) = result {
            warn!(connection_id = id, event = name, kind = error.kind(), error = %error, "socket event failed");
            self.reply(id, on_error(ErrorMessage::new(error.to_string()))).await;
        }
    }

    async fn authenticate(&self, id: ConnectionId, handshake: Handshake, session: Option<&Session>, reply: HandshakeReply) {
        let mut state = self.state.lock().await;
        if !matches!(state.registry.role(id), Some(TransportRole::Unidentified)) {
            state.registry.send(id, ServerEvent::error("Transport already authenticated"));
            return;
        }

        match handshake {
            Handshake::Device { device_id } => {
                let Some(device_id) = self.credentials.resolve(&device_id) else {
                    warn!(connection_id = id, device_id = %device_id, "unknown device handshake");
                    state
                        .registry
                        .send(id, reply.failure(ErrorMessage::new(format!("Unknown device: {device_id}"))));
                    state.registry.close(id);
                    return;
                };

                if let Some(previous) = state.registry.install_device(id, device_id.clone()) {
                    info!(device_id = %device_id, connection_id = id, previous, "replaced existing device transport");
                }
                info!(device_id = %device_id, connection_id = id, "device connected");
                state.registry.send(
                    id,
                    reply.success(AuthSuccess {
                        device_id: device_id.clone(),
                        message: "Device authenticated".to_string(),
                    }),
                );
                state.announce_presence(&device_id, true);
            }
            Handshake::Client => {
                let now = Utc::now();
                match session.filter(|session| !session.is_expired(now)) {
                    Some(session) => {
                        debug!(connection_id = id, device_id = %session.device_id, "web client joined");
                        state.registry.bind_client(id, Some(session.device_id.clone()));
                        state.send_client_snapshot(id, &session.device_id);
                    }
                    None => {
                        state.registry.bind_client(id, None);
                        state.registry.send(
                            id,
                            ServerEvent::AuthRequired(AuthRequired {
                                message: "Authentication required".to_string(),
                                redirect: LOGIN_REDIRECT.to_string(),
                            }),
                        );
                    }
                }
            }
        }
    }

    // ── Locations ───────────────────────────────────────────────────────────

    async fn device_location(&self, id: ConnectionId, fix: LocationFix) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        let device_id = state.require_device(id)?;
        fix.validate()?;

        let record = state.apply_location(&device_id, fix, Utc::now());
        state.registry.send(
            id,
            ServerEvent::LocationAck(LocationAck {
                success: true,
                timestamp: record.timestamp,
            }),
        );
        Ok(())
    }

    pub async fn report_location(&self, device_id: &str, fix: LocationFix) -> Result<LocationRecord, AppError> {
        let device_id = self.authorize_device(device_id)?;
        fix.validate()?;
        Ok(self.state.lock().await.apply_location(&device_id, fix, Utc::now()))
    }

    /// A device's track, or the most recent activity of all devices.
    pub async fn location_snapshot(&self, device_id: Option<&str>) -> Result<LocationSnapshot, AppError> {
        let device_id = device_id.map(|id| self.authorize_device(id)).transpose()?;
        let state = self.state.lock().await;
        Ok(match device_id {
            Some(device_id) => LocationSnapshot {
                current: state.locations.current(&device_id),
                history: state.locations.history(&device_id),
                device_id: Some(device_id),
            },
            None => LocationSnapshot {
                device_id: None,
                current: state.locations.latest_overall(),
                history: state.locations.merged_history(),
            },
        })
    }

    // ── Bundles ─────────────────────────────────────────────────────────────

    async fn device_bundle(&self, id: ConnectionId, bundle: PdfBundle) -> Result<(), AppError> {
        let device_id = self.state.lock().await.require_device(id)?;
        let stored = self.store_bundle(&device_id, bundle, BundleSource::Socket).await?;
        self.reply(
            id,
            ServerEvent::QrPdfUploadAck(PdfUploadAck {
                success: true,
                filename: stored.filename,
                processed_qrs: stored.processed_qrs,
                history_id: stored.history_id,
            }),
        )
        .await;
        Ok(())
    }

    pub async fn upload_bundle(&self, device_id: &str, bundle: PdfBundle) -> Result<BundleStored, AppError> {
        let device_id = self.authorize_device(device_id)?;
        self.store_bundle(&device_id, bundle, BundleSource::Http).await
    }

    /// Persists the QR images and then the PDF, then swaps the device's
    /// configuration and ledger in one step.
    async fn store_bundle(&self, device_id: &DeviceId, bundle: PdfBundle, source: BundleSource) -> Result<BundleStored, AppError> {
        bundle.validate()?;
        let pdf_bytes = decode_base64("pdfData", &bundle.pdf_data)?;
        let images = bundle
            .qr_list
            .iter()
            .map(|item| decode_base64("imageData", &item.image_data))
            .collect::<Result<Vec<_>, _>>()?;

        let _files = self.lock_device_files(device_id).await;
        let now = Utc::now();
        let history_id = generate_id(now);

        // QR images go first: the PDF is what marks a bundle as stored on disk.
        let mut qr_codes: Vec<QrEntry> = Vec::with_capacity(images.len());
        for (item, bytes) in bundle.qr_list.into_iter().zip(images) {
            self.files.save_qr_image(device_id, &item.filename, &bytes).await?;
            let entry = QrEntry {
                label: item
                    .label
                    .filter(|label| !label.trim().is_empty())
                    .unwrap_or_else(|| default_label(&item.filename)),
                filename: item.filename,
                uploaded_at: now,
                has_photo: false,
                image_data: item.image_data,
            };
            match qr_codes.iter_mut().find(|existing| existing.filename == entry.filename) {
                Some(existing) => *existing = entry,
                None => qr_codes.push(entry),
            }
        }

        let path = self.files.save_pdf(device_id, &history_id, &bundle.filename, &pdf_bytes).await?;

        let processed_qrs = qr_codes.len();
        let entry = PdfHistoryEntry {
            id: history_id.clone(),
            device_id: device_id.clone(),
            filename: bundle.filename.clone(),
            uploaded_at: now,
            path,
            qr_count: processed_qrs,
            file_size: pdf_bytes.len() as u64,
        };
        let pdf = PdfInfo::from(&entry);

        let evicted = {
            let mut state = self.state.lock().await;
            let evicted = state.ledger.record(entry);
            let qr_codes = state
                .configurations
                .replace_qr_codes(device_id, qr_codes, pdf.clone(), now)
                .qr_codes
                .clone();

            let received = PdfReceived {
                device_id: device_id.clone(),
                filename: bundle.filename.clone(),
                total_qrs: processed_qrs,
                qr_codes,
                pdf,
            };
            let event = match source {
                BundleSource::Socket => ServerEvent::QrPdfReceived(received),
                BundleSource::Http => ServerEvent::PdfReceived(received),
            };
            state.registry.broadcast_to_device_clients(device_id, event);
            evicted
        };

        if let Some(evicted) = evicted {
            self.files.remove_evicted(&evicted).await;
        }

        info!(device_id = %device_id, history_id = %history_id, qr_count = processed_qrs, "pdf bundle stored");
        Ok(BundleStored {
            filename: bundle.filename,
            processed_qrs,
            history_id,
        })
    }

    async fn device_qr(&self, id: ConnectionId, upload: QrUpload) -> Result<(), AppError> {
        let device_id = self.state.lock().await.require_device(id)?;
        upload.validate()?;
        let bytes = decode_base64("imageData", &upload.image_data)?;
        let _files = self.lock_device_files(&device_id).await;
        self.files.save_qr_image(&device_id, &upload.filename, &bytes).await?;

        let now = Utc::now();
        let entry = QrEntry {
            label: upload
                .label
                .filter(|label| !label.trim().is_empty())
                .unwrap_or_else(|| default_label(&upload.filename)),
            filename: upload.filename.clone(),
            uploaded_at: now,
            has_photo: false,
            image_data: upload.image_data,
        };

        let mut state = self.state.lock().await;
        state.configurations.append_qr(&device_id, entry.clone(), now);
        state.registry.broadcast_to_device_clients(
            &device_id,
            ServerEvent::QrCodeReceived(QrCodeReceived {
                device_id: device_id.clone(),
                qr_code: entry,
            }),
        );
        state.registry.send(
            id,
            ServerEvent::QrUploadAck(QrUploadAck {
                success: true,
                filename: upload.filename,
            }),
        );
        Ok(())
    }

    // ── Photos ──────────────────────────────────────────────────────────────

    /// Streams every stored photo to the requesting device, then reports how
    /// many were sent. Photos whose file has gone missing are skipped.
    async fn send_photos(&self, id: ConnectionId) -> Result<(), AppError> {
        let (device_id, sender, photos) = {
            let state = self.state.lock().await;
            let device_id = state.require_device(id)?;
            let photos = state.configurations.latest_photos(&device_id);
            (device_id, state.registry.sender(id), photos)
        };
        let Some(sender) = sender else {
            return Ok(());
        };

        let mut count = 0;
        for photo in photos {
            let path = self.files.photo_path(&device_id, &photo.filename);
            let Some(bytes) = self.files.read_optional(&path).await? else {
                debug!(device_id = %device_id, file = %photo.filename, "photo missing on disk, skipped");
                continue;
            };

            let event = ServerEvent::PhotoData(PhotoData {
                qr_filename: photo.qr_filename,
                filename: photo.filename,
                image_data: encode_base64(&bytes),
                size: bytes.len() as u64,
                uploaded_at: photo.uploaded_at,
            });
            if sender.send(Outbound::Event(Arc::new(event))).is_err() {
                return Ok(());
            }
            count += 1;
        }

        let _ = sender.send(Outbound::Event(Arc::new(ServerEvent::PhotoTransferComplete(PhotoTransferComplete { count }))));
        info!(device_id = %device_id, count, "photos sent to device");
        Ok(())
    }

    /// Re-encodes a browser photo, stores it against a QR entry and forwards
    /// it to the device if it is online.
    pub async fn upload_photo(&self, device_id: &DeviceId, qr_filename: &str, bytes: Vec<u8>) -> Result<PhotoUploadResponse, AppError> {
        self.state.lock().await.configurations.require_qr(device_id, qr_filename)?;
        if bytes.is_empty() {
            return Err(AppError::BadRequest("No photo uploaded".to_string()));
        }

        let config = self.photo.clone();
        let compressed = tokio::task::spawn_blocking(move || compress_photo(&bytes, &config)).await??;

        // A bundle may have replaced the QR entries while the photo was encoded.
        let _files = self.lock_device_files(device_id).await;
        self.state.lock().await.configurations.require_qr(device_id, qr_filename)?;

        let filename = photo_filename(qr_filename);
        self.files.save_photo(device_id, &filename, &compressed).await?;

        let now = Utc::now();
        let size = compressed.len() as u64;
        let image_data = encode_base64(&compressed);
        let photo = PhotoEntry {
            filename: filename.clone(),
            qr_filename: qr_filename.to_string(),
            uploaded_at: now,
            size,
        };

        let mut state = self.state.lock().await;
        state.configurations.record_photo(device_id, photo, now)?;
        let sent_to_pi = state.registry.send_to_device(
            device_id,
            ServerEvent::PhotoData(PhotoData {
                qr_filename: qr_filename.to_string(),
                filename: filename.clone(),
                image_data,
                size,
                uploaded_at: now,
            }),
        );
        if !sent_to_pi {
            debug!(device_id = %device_id, "device offline, photo kept for the next requestPhotos");
        }
        state.registry.broadcast_to_device_clients(
            device_id,
            ServerEvent::PhotoUploaded(PhotoUploaded {
                device_id: device_id.clone(),
                qr_filename: qr_filename.to_string(),
                filename: filename.clone(),
                size,
                uploaded_at: now,
                sent_to_pi,
            }),
        );

        info!(device_id = %device_id, qr_filename, size, sent_to_pi, "photo stored");
        Ok(PhotoUploadResponse {
            success: true,
            filename,
            size,
            sent_to_pi,
        })
    }

    // ── Reads ───────────────────────────────────────────────────────────────

    pub async fn configuration(&self, device_id: &DeviceId) -> ConfigurationResponse {
        ConfigurationResponse::from(&self.state.lock().await.configurations.snapshot(device_id))
    }

    pub async fn pdf_history(&self, device_id: &DeviceId) -> PdfHistoryResponse {
        let history = self.state.lock().await.ledger.list(device_id);
        PdfHistoryResponse {
            device_id: device_id.clone(),
            total_count: history.len(),
            history,
        }
    }

    pub async fn pdf_file(&self, device_id: &DeviceId, history_id: &str) -> Result<StoredFile, AppError> {
        let entry = self
            .state
            .lock()
            .await
            .ledger
            .fetch(device_id, history_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("PDF {history_id}")))?;
        self.read_pdf(&entry).await
    }

    pub async fn current_pdf(&self, device_id: &DeviceId) -> Result<StoredFile, AppError> {
        let entry = self
            .state
            .lock()
            .await
            .ledger
            .latest(device_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("No PDF uploaded for this device".to_string()))?;
        self.read_pdf(&entry).await
    }

    async fn read_pdf(&self, entry: &PdfHistoryEntry) -> Result<StoredFile, AppError> {
        Ok(StoredFile {
            filename: sanitize_filename(&entry.filename),
            bytes: self.files.read(&entry.path).await?,
        })
    }

    /// ZIP of the device's QR images and photos as found on disk.
    pub async fn export_bundle(&self, device_id: &DeviceId) -> Result<Vec<u8>, AppError> {
        let files_guard = self.lock_device_files(device_id).await;
        let (qr_names, photo_names) = {
            let state = self.state.lock().await;
            let configuration = state.configurations.get(device_id).filter(|c| !c.qr_codes.is_empty()).ok_or(AppError::NoData)?;
            let qr_names: Vec<String> = configuration.qr_codes.iter().map(|entry| entry.filename.clone()).collect();
            let photo_names: Vec<String> = state
                .configurations
                .latest_photos(device_id)
                .into_iter()
                .map(|photo| photo.filename)
                .collect();
            (qr_names, photo_names)
        };

        let mut qr_files = Vec::new();
        for name in qr_names {
            if let Some(bytes) = self.files.read_optional(&self.files.qr_image_path(device_id, &name)).await? {
                qr_files.push(ArchiveFile {
                    name: sanitize_filename(&name),
                    bytes,
                });
            }
        }

        let mut photo_files = Vec::new();
        for name in photo_names {
            if let Some(bytes) = self.files.read_optional(&self.files.photo_path(device_id, &name)).await? {
                photo_files.push(ArchiveFile { name, bytes });
            }
        }

        drop(files_guard);

        debug!(device_id = %device_id, qr = qr_files.len(), photos = photo_files.len(), "building export archive");
        tokio::task::spawn_blocking(move || build_zip(&qr_files, &photo_files)).await?
    }

    pub async fn devices_overview(&self) -> DevicesResponse {
        let connected_devices = self.state.lock().await.registry.connected_devices();
        DevicesResponse {
            authorized_devices: self.credentials.device_ids(),
            total_connected: connected_devices.len(),
            connected_devices,
        }
    }

    // ── Emergencies ─────────────────────────────────────────────────────────

    async fn device_emergency(&self, id: ConnectionId, signal: EmergencySignal) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        let device_id = state.require_device(id)?;
        signal.validate()?;

        let emergency = state.raise_emergency(&device_id, signal, Utc::now());
        warn!(device_id = %device_id, message = %emergency.message, "emergency raised");
        state
            .registry
            .send(id, ServerEvent::EmergencyAck(EmergencyAck { success: true, active: true }));
        Ok(())
    }

    async fn device_clear_emergency(&self, id: ConnectionId) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        let device_id = state.require_device(id)?;
        state.clear_emergency(&device_id, Utc::now());
        info!(device_id = %device_id, "emergency cleared");
        state
            .registry
            .send(id, ServerEvent::EmergencyAck(EmergencyAck { success: true, active: false }));
        Ok(())
    }

    pub async fn raise_emergency(&self, device_id: &str, signal: EmergencySignal) -> Result<EmergencyState, AppError> {
        let device_id = self.authorize_device(device_id)?;
        signal.validate()?;
        let emergency = self.state.lock().await.raise_emergency(&device_id, signal, Utc::now());
        warn!(device_id = %device_id, message = %emergency.message, "emergency raised over http");
        Ok(emergency)
    }

    pub async fn clear_emergency(&self, device_id: &str) -> Result<bool, AppError> {
        let device_id = self.authorize_device(device_id)?;
        let was_active = self.state.lock().await.clear_emergency(&device_id, Utc::now());
        info!(device_id = %device_id, was_active, "emergency cleared over http");
        Ok(was_active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{bundle, png_bytes, test_hub, test_session};
    use serde_json::{Value, json};
    use tempfile::TempDir;

    struct Peer {
        id: ConnectionId,
        inbox: UnboundedReceiver<Outbound>,
    }

    impl Peer {
        async fn open(hub: &Hub) -> Self {
            let (id, inbox) = hub.open().await;
            Self { id, inbox }
        }

        async fn device(hub: &Hub, device_id: &str) -> Self {
            let mut peer = Self::open(hub).await;
            peer.send(hub, None, json!({"event": "authenticate", "data": {"type": "device", "deviceId": device_id}}))
                .await;
            assert_eq!(peer.drain()[0]["event"], "authSuccess");
            peer
        }

        async fn client(hub: &Hub, session: Option<&Session>) -> Self {
            let mut peer = Self::open(hub).await;
            peer.send(hub, session, json!({"event": "authenticate", "data": {"type": "client"}})).await;
            peer.drain();
            peer
        }

        async fn send(&self, hub: &Hub, session: Option<&Session>, frame: Value) {
            hub.handle_text(self.id, session, &frame.to_string()).await;
        }

        /// Events queued so far, as they would appear on the wire.
        fn drain(&mut self) -> Vec<Value> {
            let mut events = Vec::new();
            while let Ok(outbound) = self.inbox.try_recv() {
                match outbound {
                    Outbound::Event(event) => events.push(serde_json::to_value(&*event).unwrap()),
                    Outbound::Close => events.push(json!({"event": "<close>"})),
                }
            }
            events
        }

        fn names(&mut self) -> Vec<String> {
            self.drain().iter().map(|event| event["event"].as_str().unwrap().to_string()).collect()
        }
    }

    fn raspi() -> DeviceId {
        DeviceId::new("raspi-001")
    }

    #[tokio::test]
    async fn location_update_is_acked_and_broadcast_to_clients() {
        let dir = TempDir::new().unwrap();
        let hub = test_hub(&dir);
        let session = test_session("raspi-001");
        let mut device = Peer::device(&hub, "raspi-001").await;
        let mut owner = Peer::client(&hub, Some(&session)).await;
        let mut anonymous = Peer::client(&hub, None).await;

        device
            .send(
                &hub,
                None,
                json!({"event": "locationUpdate", "data": {"latitude": 40.7128, "longitude": -74.0060, "accuracy": 5.0}}),
            )
            .await;

        let ack = device.drain();
        assert_eq!(ack[0]["event"], "locationAck");
        assert_eq!(ack[0]["data"]["success"], true);

        for peer in [&mut owner, &mut anonymous] {
            let events = peer.drain();
            assert_eq!(events.len(), 1);
            assert_eq!(events[0]["event"], "locationUpdate");
            assert_eq!(events[0]["data"]["deviceId"], "raspi-001");
            assert_eq!(events[0]["data"]["latitude"], 40.7128);
        }

        let snapshot = hub.location_snapshot(Some("raspi-001")).await.unwrap();
        assert_eq!(snapshot.history.len(), 1);
        assert_eq!(snapshot.current.unwrap().accuracy, Some(5.0));
    }

    #[tokio::test]
    async fn out_of_range_location_is_rejected() {
        let dir = TempDir::new().unwrap();
        let hub = test_hub(&dir);
        let mut device = Peer::device(&hub, "raspi-001").await;

        device
            .send(&hub, None, json!({"event": "locationUpdate", "data": {"latitude": 91.0, "longitude": 0.0}}))
            .await;
        assert_eq!(device.names(), vec!["locationError"]);
        assert!(hub.location_snapshot(Some("raspi-001")).await.unwrap().current.is_none());
    }

    #[tokio::test]
    async fn device_only_events_from_clients_are_refused() {
        let dir = TempDir::new().unwrap();
        let hub = test_hub(&dir);
        let session = test_session("raspi-001");
        let mut client = Peer::client(&hub, Some(&session)).await;

        client
            .send(&hub, Some(&session), json!({"event": "locationUpdate", "data": {"latitude": 1.0, "longitude": 1.0}}))
            .await;
        client.send(&hub, Some(&session), json!({"event": "requestPhotos"})).await;
        assert_eq!(client.names(), vec!["locationError", "error"]);
    }

    #[tokio::test]
    async fn history_is_capped_per_device() {
        let dir = TempDir::new().unwrap();
        let hub = test_hub(&dir);
        let fix = LocationFix {
            latitude: 1.0,
            longitude: 2.0,
            accuracy: None,
        };

        for _ in 0..120 {
            hub.report_location("raspi-001", fix).await.unwrap();
        }
        hub.report_location("raspi-002", fix).await.unwrap();

        assert_eq!(hub.location_snapshot(Some("raspi-001")).await.unwrap().history.len(), 100);
        assert_eq!(hub.location_snapshot(Some("raspi-002")).await.unwrap().history.len(), 1);
        assert!(matches!(
            hub.report_location("raspi-999", fix).await,
            Err(AppError::UnauthorizedDevice(_))
        ));
    }

    #[tokio::test]
    async fn second_device_transport_replaces_the_first() {
        let dir = TempDir::new().unwrap();
        let hub = test_hub(&dir);
        let mut watcher = Peer::client(&hub, None).await;
        let mut first = Peer::device(&hub, "raspi-001").await;
        let second = Peer::device(&hub, "raspi-001").await;

        assert!(first.names().contains(&"<close>".to_string()));
        let overview = hub.devices_overview().await;
        assert_eq!(overview.total_connected, 1);
        assert_eq!(watcher.names(), vec!["deviceStatus", "deviceStatus"]);

        // The replaced transport going away must not mark the device offline.
        hub.close(first.id).await;
        assert_eq!(hub.devices_overview().await.connected_devices, vec![raspi()]);
        assert!(watcher.drain().is_empty());

        hub.close(second.id).await;
        assert_eq!(hub.devices_overview().await.total_connected, 0);
        let events = watcher.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["event"], "deviceStatus");
        assert_eq!(events[0]["data"], json!({"connectedDevices": [], "totalConnected": 0}));
    }

    #[tokio::test]
    async fn device_auth_frame_is_a_device_handshake() {
        let dir = TempDir::new().unwrap();
        let hub = test_hub(&dir);
        let mut device = Peer::open(&hub).await;
        device
            .send(&hub, None, json!({"event": "deviceAuth", "data": {"deviceId": "raspi-001"}}))
            .await;

        let events = device.drain();
        assert_eq!(events[0]["event"], "deviceAuthSuccess");
        assert_eq!(events[0]["data"]["deviceId"], "raspi-001");
        assert!(hub.is_identified(device.id).await);
        assert_eq!(hub.devices_overview().await.connected_devices, vec![raspi()]);

        let payload = json!({"event": "qrPdfUpload", "data": crate::test_utils::bundle_json("bag.pdf", &["a.png"])});
        device.send(&hub, None, payload).await;
        assert_eq!(device.names(), vec!["qrPdfUploadAck"]);

        let mut stranger = Peer::open(&hub).await;
        stranger
            .send(&hub, None, json!({"event": "deviceAuth", "data": {"deviceId": "raspi-999"}}))
            .await;
        assert_eq!(stranger.names(), vec!["deviceAuthError", "<close>"]);
    }

    #[tokio::test]
    async fn unauthenticated_client_only_sees_public_events() {
        let dir = TempDir::new().unwrap();
        let hub = test_hub(&dir);
        let mut anonymous = Peer::open(&hub).await;
        anonymous
            .send(&hub, None, json!({"event": "authenticate", "data": {"type": "client"}}))
            .await;
        let events = anonymous.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["event"], "authRequired");
        assert_eq!(events[0]["data"]["redirect"], "/login");

        hub.upload_bundle("raspi-001", bundle("bag.pdf", &["a.png"])).await.unwrap();
        hub.raise_emergency("raspi-001", EmergencySignal::default()).await.unwrap();
        assert!(anonymous.drain().is_empty());

        let device = Peer::device(&hub, "raspi-001").await;
        assert_eq!(anonymous.names(), vec!["deviceStatus"]);
        hub.close(device.id).await;
    }

    #[tokio::test]
    async fn expired_session_gets_auth_required() {
        let dir = TempDir::new().unwrap();
        let hub = test_hub(&dir);
        let mut session = test_session("raspi-001");
        session.expires_at = Utc::now() - chrono::Duration::minutes(1);

        let mut client = Peer::open(&hub).await;
        client
            .send(&hub, Some(&session), json!({"event": "authenticate", "data": {"type": "client"}}))
            .await;
        assert_eq!(client.names(), vec!["authRequired"]);
    }

    #[tokio::test]
    async fn client_join_receives_device_snapshot() {
        let dir = TempDir::new().unwrap();
        let hub = test_hub(&dir);
        hub.report_location(
            "raspi-001",
            LocationFix {
                latitude: 10.0,
                longitude: 20.0,
                accuracy: None,
            },
        )
        .await
        .unwrap();
        hub.upload_bundle("raspi-001", bundle("bag.pdf", &["a.png"])).await.unwrap();
        hub.raise_emergency("raspi-001", EmergencySignal::default()).await.unwrap();

        let session = test_session("raspi-001");
        let mut client = Peer::open(&hub).await;
        client
            .send(&hub, Some(&session), json!({"event": "authenticate", "data": {"type": "client"}}))
            .await;
        let events = client.drain();
        let names: Vec<&str> = events.iter().map(|event| event["event"].as_str().unwrap()).collect();
        assert_eq!(
            names,
            vec![
                "locationUpdate",
                "locationHistory",
                "deviceStatus",
                "configurationData",
                "deviceConnectionStatus",
                "emergencyAlert"
            ]
        );
        assert_eq!(events[3]["data"]["qrCodes"][0]["filename"], "a.png");
        assert!(events[3]["data"]["qrCodes"][0]["imageData"].is_string());
        assert_eq!(events[4]["data"]["connected"], false);
    }

    #[tokio::test]
    async fn socket_bundle_with_three_codes() {
        let dir = TempDir::new().unwrap();
        let hub = test_hub(&dir);
        let session = test_session("raspi-001");
        let mut device = Peer::device(&hub, "raspi-001").await;
        let mut owner = Peer::client(&hub, Some(&session)).await;
        let other_session = test_session("raspi-002");
        let mut other = Peer::client(&hub, Some(&other_session)).await;

        let payload = json!({
            "event": "qrPdfUpload",
            "data": crate::test_utils::bundle_json("bag.pdf", &["a.png", "b.png", "c.png"]),
        });
        device.send(&hub, None, payload).await;

        let ack = device.drain();
        assert_eq!(ack[0]["event"], "qrPdfUploadAck");
        assert_eq!(ack[0]["data"]["processedQRs"], 3);

        let received = owner.drain();
        assert_eq!(received[0]["event"], "qrPdfReceived");
        assert_eq!(received[0]["data"]["totalQRs"], 3);
        assert!(other.drain().is_empty());

        let history = hub.pdf_history(&raspi()).await;
        assert_eq!(history.total_count, 1);
        assert_eq!(history.history[0].qr_count, 3);

        let current = hub.current_pdf(&raspi()).await.unwrap();
        assert_eq!(current.bytes, crate::test_utils::PDF_BYTES);
    }

    #[tokio::test]
    async fn invalid_bundle_stores_nothing() {
        let dir = TempDir::new().unwrap();
        let hub = test_hub(&dir);
        let mut broken = bundle("bag.pdf", &["a.png"]);
        broken.qr_list[0].image_data = "not base64!".to_string();

        assert!(matches!(
            hub.upload_bundle("raspi-001", broken).await,
            Err(AppError::InvalidEncoding { .. })
        ));
        assert_eq!(hub.pdf_history(&raspi()).await.total_count, 0);
        assert!(!dir.path().join("qr-pdfs").join("raspi-001").exists());
    }

    #[tokio::test]
    async fn failed_bundle_leaves_no_pdf_for_restore() {
        let dir = TempDir::new().unwrap();
        let hub = test_hub(&dir);
        let device_dir = dir.path().join("qr-pdfs/raspi-001");
        std::fs::create_dir_all(&device_dir).unwrap();
        std::fs::write(device_dir.join("qr"), b"not a directory").unwrap();

        assert!(matches!(
            hub.upload_bundle("raspi-001", bundle("failed.pdf", &["a.png"])).await,
            Err(AppError::Storage { .. })
        ));
        assert_eq!(hub.pdf_history(&raspi()).await.total_count, 0);
        assert!(!device_dir.join("pdf").exists());

        let restarted = test_hub(&dir);
        assert_eq!(restarted.restore_ledgers().await.unwrap(), 0);
        assert!(restarted.configuration(&raspi()).await.qr_pdf.is_none());
    }

    #[tokio::test]
    async fn concurrent_bundles_leave_files_matching_configuration() {
        let dir = TempDir::new().unwrap();
        let hub = test_hub(&dir);
        let mut small = bundle("one.pdf", &["a.png", "b.png"]);
        let mut large = bundle("two.pdf", &["a.png", "b.png"]);
        for item in &mut small.qr_list {
            item.image_data = encode_base64(&png_bytes(4, 4));
        }
        for item in &mut large.qr_list {
            item.image_data = encode_base64(&png_bytes(64, 64));
        }

        let (first, second) = tokio::join!(hub.upload_bundle("raspi-001", small), hub.upload_bundle("raspi-001", large));
        first.unwrap();
        second.unwrap();

        let committed = hub.state.lock().await.configurations.snapshot(&raspi());
        for entry in &committed.qr_codes {
            let on_disk = std::fs::read(dir.path().join("qr-pdfs/raspi-001/qr").join(&entry.filename)).unwrap();
            assert_eq!(on_disk, decode_base64("imageData", &entry.image_data).unwrap());
        }
    }

    #[tokio::test]
    async fn photo_rejected_by_concurrent_replace_writes_no_file() {
        let dir = TempDir::new().unwrap();
        let hub = test_hub(&dir);
        hub.upload_bundle("raspi-001", bundle("bag.pdf", &["a.png"])).await.unwrap();

        let device = raspi();
        let (photo, replaced) = tokio::join!(
            hub.upload_photo(&device, "a.png", png_bytes(64, 64)),
            hub.upload_bundle("raspi-001", bundle("new.pdf", &["b.png"]))
        );
        replaced.unwrap();

        let photo_path = dir.path().join("item-photos/raspi-001/a.jpg");
        match photo {
            Ok(_) => {
                assert!(photo_path.exists());
                assert_eq!(hub.configuration(&raspi()).await.photos.len(), 1);
            }
            Err(AppError::UnknownQr(_)) => {
                assert!(!photo_path.exists());
                assert!(hub.configuration(&raspi()).await.photos.is_empty());
            }
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn ledger_keeps_latest_fifty_and_deletes_evicted_files() {
        let dir = TempDir::new().unwrap();
        let hub = test_hub(&dir);

        let first = hub.upload_bundle("raspi-001", bundle("first.pdf", &[])).await.unwrap();
        for i in 0..50 {
            hub.upload_bundle("raspi-001", bundle(&format!("bag-{i}.pdf"), &[])).await.unwrap();
        }

        let history = hub.pdf_history(&raspi()).await;
        assert_eq!(history.total_count, 50);
        assert_eq!(history.history[0].filename, "bag-49.pdf");
        assert!(history.history.iter().all(|pdf| pdf.id != first.history_id));
        assert!(matches!(
            hub.pdf_file(&raspi(), &first.history_id).await,
            Err(AppError::NotFound(_))
        ));

        let stored = std::fs::read_dir(dir.path().join("qr-pdfs/raspi-001/pdf")).unwrap().count();
        assert_eq!(stored, 50);
    }

    #[tokio::test]
    async fn new_bundle_resets_photo_flags_but_keeps_photos() {
        let dir = TempDir::new().unwrap();
        let hub = test_hub(&dir);
        hub.upload_bundle("raspi-001", bundle("bag.pdf", &["a.png"])).await.unwrap();
        hub.upload_photo(&raspi(), "a.png", png_bytes(32, 32)).await.unwrap();
        assert!(hub.configuration(&raspi()).await.qr_codes[0].has_photo);

        hub.upload_bundle("raspi-001", bundle("bag.pdf", &["a.png", "b.png"])).await.unwrap();
        let config = hub.configuration(&raspi()).await;
        assert_eq!(config.qr_codes.len(), 2);
        assert!(config.qr_codes.iter().all(|qr| !qr.has_photo));
        assert_eq!(config.photos.len(), 1);
    }

    #[tokio::test]
    async fn photo_for_unknown_qr_creates_nothing() {
        let dir = TempDir::new().unwrap();
        let hub = test_hub(&dir);
        assert!(matches!(
            hub.upload_photo(&raspi(), "a.png", png_bytes(8, 8)).await,
            Err(AppError::NoConfiguration)
        ));

        hub.upload_bundle("raspi-001", bundle("bag.pdf", &["a.png"])).await.unwrap();
        assert!(matches!(
            hub.upload_photo(&raspi(), "zzz.png", png_bytes(8, 8)).await,
            Err(AppError::UnknownQr(_))
        ));
        assert!(hub.configuration(&raspi()).await.photos.is_empty());
        assert!(!dir.path().join("item-photos/raspi-001/zzz.jpg").exists());
    }

    #[tokio::test]
    async fn photo_reaches_connected_device_and_owner() {
        let dir = TempDir::new().unwrap();
        let hub = test_hub(&dir);
        hub.upload_bundle("raspi-001", bundle("bag.pdf", &["a.png"])).await.unwrap();
        let mut device = Peer::device(&hub, "raspi-001").await;
        let session = test_session("raspi-001");
        let mut owner = Peer::client(&hub, Some(&session)).await;

        let response = hub.upload_photo(&raspi(), "a.png", png_bytes(16, 16)).await.unwrap();
        assert!(response.sent_to_pi);

        let delivered = device.drain();
        assert_eq!(delivered[0]["event"], "photoData");
        assert_eq!(delivered[0]["data"]["qrFilename"], "a.png");
        assert_eq!(delivered[0]["data"]["filename"], "a.jpg");

        let notified = owner.drain();
        assert_eq!(notified[0]["event"], "photoUploaded");
        assert_eq!(notified[0]["data"]["sentToPi"], true);
    }

    #[tokio::test]
    async fn request_photos_replays_stored_photos() {
        let dir = TempDir::new().unwrap();
        let hub = test_hub(&dir);
        hub.upload_bundle("raspi-001", bundle("bag.pdf", &["a.png", "b.png"])).await.unwrap();
        hub.upload_photo(&raspi(), "a.png", png_bytes(16, 16)).await.unwrap();
        hub.upload_photo(&raspi(), "b.png", png_bytes(16, 16)).await.unwrap();
        std::fs::remove_file(dir.path().join("item-photos/raspi-001/b.jpg")).unwrap();

        let mut device = Peer::device(&hub, "raspi-001").await;
        device.send(&hub, None, json!({"event": "requestPhotos"})).await;

        let events = device.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["event"], "photoData");
        assert_eq!(events[0]["data"]["filename"], "a.jpg");
        assert_eq!(events[1], json!({"event": "photoTransferComplete", "data": {"count": 1}}));
    }

    #[tokio::test]
    async fn legacy_qr_upload_appends_or_replaces() {
        let dir = TempDir::new().unwrap();
        let hub = test_hub(&dir);
        let session = test_session("raspi-001");
        let mut device = Peer::device(&hub, "raspi-001").await;
        let mut owner = Peer::client(&hub, Some(&session)).await;
        let image = encode_base64(&png_bytes(4, 4));

        for label in ["Keys", "House keys"] {
            device
                .send(
                    &hub,
                    None,
                    json!({"event": "qrUpload", "data": {"filename": "keys.png", "imageData": image, "label": label}}),
                )
                .await;
        }

        assert_eq!(device.names(), vec!["qrUploadAck", "qrUploadAck"]);
        assert_eq!(owner.names(), vec!["qrCodeReceived", "qrCodeReceived"]);
        let config = hub.configuration(&raspi()).await;
        assert_eq!(config.qr_codes.len(), 1);
        assert_eq!(config.qr_codes[0].label, "House keys");
    }

    #[tokio::test]
    async fn emergency_round_trip_over_socket() {
        let dir = TempDir::new().unwrap();
        let hub = test_hub(&dir);
        let session = test_session("raspi-001");
        let mut device = Peer::device(&hub, "raspi-001").await;
        let mut owner = Peer::client(&hub, Some(&session)).await;

        device
            .send(&hub, None, json!({"event": "emergency", "data": {"message": "Help", "latitude": 1.5, "longitude": 2.5}}))
            .await;
        assert_eq!(device.drain()[0]["data"], json!({"success": true, "active": true}));
        let alert = owner.drain();
        assert_eq!(alert[0]["event"], "emergencyAlert");
        assert_eq!(alert[0]["data"]["message"], "Help");

        device.send(&hub, None, json!({"event": "clearEmergency"})).await;
        assert_eq!(device.drain()[0]["data"]["active"], false);
        assert_eq!(owner.names(), vec!["emergencyCleared"]);
        assert!(!hub.clear_emergency("raspi-001").await.unwrap());
    }

    #[tokio::test]
    async fn repeated_handshake_is_an_error() {
        let dir = TempDir::new().unwrap();
        let hub = test_hub(&dir);
        let mut device = Peer::device(&hub, "raspi-001").await;
        device
            .send(&hub, None, json!({"event": "authenticate", "data": {"type": "client"}}))
            .await;
        assert_eq!(device.names(), vec!["error"]);
        assert!(hub.devices_overview().await.connected_devices.contains(&raspi()));
    }

    #[tokio::test]
    async fn ledgers_are_restored_from_disk() {
        let dir = TempDir::new().unwrap();
        {
            let hub = test_hub(&dir);
            hub.upload_bundle("raspi-001", bundle("one.pdf", &["a.png"])).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            hub.upload_bundle("raspi-001", bundle("two.pdf", &["a.png"])).await.unwrap();
        }

        let hub = test_hub(&dir);
        assert_eq!(hub.restore_ledgers().await.unwrap(), 2);
        let history = hub.pdf_history(&raspi()).await;
        assert_eq!(history.history[0].filename, "two.pdf");
        assert_eq!(hub.configuration(&raspi()).await.qr_pdf.unwrap().filename, "two.pdf");
    }
}
