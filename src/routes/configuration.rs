use crate::auth::CurrentSession;
use crate::error::app_error::AppError;
use crate::hub::Hub;
use crate::models::configuration::{ConfigurationResponse, PhotoUploadResponse};
use crate::routes::attachment::Attachment;
use rocket::data::Capped;
use rocket::form::{Form, FromForm};
use rocket::http::ContentType;
use rocket::serde::json::Json;
use rocket::{State, get, routes};
use rocket_okapi::openapi;
use std::sync::Arc;

/// Multipart body of a photo upload.
#[derive(FromForm)]
pub struct PhotoForm<'r> {
    photo: Capped<&'r [u8]>,
}

/// QR codes, photos and current PDF of the signed-in device, without image bytes
#[openapi(tag = "Configuration")]
#[get("/user-config")]
pub async fn get_user_config(hub: &State<Arc<Hub>>, current_session: CurrentSession) -> Json<ConfigurationResponse> {
    Json(hub.configuration(&current_session.device_id).await)
}

/// ZIP of the device's QR images and item photos
#[openapi(tag = "Configuration")]
#[get("/download-zip")]
pub async fn download_zip(hub: &State<Arc<Hub>>, current_session: CurrentSession) -> Result<Attachment, AppError> {
    let archive = hub.export_bundle(&current_session.device_id).await?;
    let filename = format!("bag-items-{}.zip", current_session.device_id);
    Ok(Attachment::new(&filename, ContentType::ZIP, archive))
}

#[rocket::post("/upload-photo/<qr_filename>", data = "<form>")]
pub async fn upload_photo(
    hub: &State<Arc<Hub>>,
    current_session: CurrentSession,
    qr_filename: &str,
    form: Form<PhotoForm<'_>>,
) -> Result<Json<PhotoUploadResponse>, AppError> {
    if !form.photo.is_complete() {
        return Err(AppError::BadRequest("Photo exceeds the upload limit".to_string()));
    }
    let bytes = form.photo.value.to_vec();
    Ok(Json(hub.upload_photo(&current_session.device_id, qr_filename, bytes).await?))
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![get_user_config, download_zip]
}

/// Multipart routes, kept out of the generated API docs.
pub fn upload_routes() -> Vec<rocket::Route> {
    routes![upload_photo]
}
