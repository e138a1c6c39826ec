use crate::build_rocket;
use crate::config::{Config, DeviceCredentialConfig, StorageConfig};
use crate::hub::Hub;
use crate::models::configuration::{PdfBundle, QrItem};
use crate::models::device::DeviceId;
use crate::models::session::Session;
use crate::service::payload::encode_base64;
use crate::store::credentials::CredentialStore;
use crate::store::files::FileStore;
use chrono::{Duration, Utc};
use image::{ImageFormat, Rgb, RgbImage};
use rocket::http::{ContentType, Status};
use rocket::local::asynchronous::Client;
use serde_json::{Value, json};
use std::io::Cursor;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

pub const PDF_BYTES: &[u8] = b"%PDF-1.4 test";
const MULTIPART_BOUNDARY: &str = "relay-test-boundary";

fn device(id: &str, password: &str) -> DeviceCredentialConfig {
    DeviceCredentialConfig {
        id: id.to_string(),
        password_hash: None,
        password: Some(password.to_string()),
    }
}

/// Config with storage inside `dir` and two allow-listed devices.
pub fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage = StorageConfig {
        qr_root: dir.path().join("qr-pdfs"),
        photo_root: dir.path().join("item-photos"),
    };
    config.logging.level = "warn".to_string();
    config.devices = vec![device("raspi-001", "Bag@123"), device("raspi-002", "Pi@456")];
    config
}

pub fn test_hub(dir: &TempDir) -> Arc<Hub> {
    let config = test_config(dir);
    let credentials = CredentialStore::from_config(&config.devices).expect("valid test credentials");
    let files = FileStore::new(config.storage.qr_root.clone(), config.storage.photo_root.clone());
    Arc::new(Hub::new(&config.relay, config.photo.clone(), Arc::new(credentials), files))
}

pub async fn test_client(dir: &TempDir) -> Client {
    Client::tracked(build_rocket(test_config(dir))).await.expect("valid rocket instance")
}

/// Signs the client's cookie jar in as `device_id`.
pub async fn login(client: &Client, device_id: &str, password: &str) {
    let response = client
        .post("/api/login")
        .header(ContentType::JSON)
        .body(json!({"deviceId": device_id, "password": password}).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
}

pub fn test_session(device_id: &str) -> Session {
    let now = Utc::now();
    Session {
        id: Uuid::new_v4(),
        device_id: DeviceId::new(device_id),
        created_at: now,
        expires_at: now + Duration::hours(1),
    }
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]));
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png).expect("encode png");
    out.into_inner()
}

/// Bundle body as a device sends it; callers add `deviceId` for HTTP.
pub fn bundle_json(filename: &str, qr_files: &[&str]) -> Value {
    let image_data = encode_base64(&png_bytes(8, 8));
    let qr_list: Vec<Value> = qr_files
        .iter()
        .map(|name| json!({"filename": name, "label": null, "imageData": image_data}))
        .collect();
    json!({
        "filename": filename,
        "pdfData": encode_base64(PDF_BYTES),
        "qrList": qr_list,
    })
}

pub fn bundle(filename: &str, qr_files: &[&str]) -> PdfBundle {
    let image_data = encode_base64(&png_bytes(8, 8));
    PdfBundle {
        filename: filename.to_string(),
        pdf_data: encode_base64(PDF_BYTES),
        qr_list: qr_files
            .iter()
            .map(|name| QrItem {
                filename: name.to_string(),
                label: None,
                image_data: image_data.clone(),
            })
            .collect(),
    }
}

/// A `multipart/form-data` body with a single `photo` file field.
pub fn multipart_photo(bytes: &[u8]) -> (ContentType, Vec<u8>) {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Disposition: form-data; name=\"photo\"; filename=\"photo.png\"\r\n");
    body.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}--\r\n").as_bytes());

    let content_type = ContentType::new("multipart", "form-data").with_params(("boundary", MULTIPART_BOUNDARY));
    (content_type, body)
}
