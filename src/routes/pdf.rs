use crate::auth::CurrentSession;
use crate::error::app_error::AppError;
use crate::error::json::JsonBody;
use crate::hub::Hub;
use crate::models::configuration::{PdfUploadRequest, PdfUploadResponse};
use crate::models::pdf_history::PdfHistoryResponse;
use crate::routes::attachment::Attachment;
use rocket::http::ContentType;
use rocket::serde::json::Json;
use rocket::{State, get, post};
use rocket_okapi::openapi;
use std::sync::Arc;
use validator::Validate;

/// Upload a PDF bundle over HTTP instead of the socket
#[openapi(tag = "PDF")]
#[post("/pdf", data = "<payload>")]
pub async fn post_pdf(hub: &State<Arc<Hub>>, payload: JsonBody<PdfUploadRequest>) -> Result<Json<PdfUploadResponse>, AppError> {
    let request = payload.into_inner();
    request.validate()?;

    let stored = hub.upload_bundle(&request.device_id, request.bundle).await?;
    Ok(Json(PdfUploadResponse {
        success: true,
        message: format!("PDF received with {} QR codes", stored.processed_qrs),
        filename: stored.filename,
        processed_qrs: stored.processed_qrs,
        history_id: stored.history_id,
    }))
}

/// PDFs uploaded by the signed-in device, newest first
#[openapi(tag = "PDF")]
#[get("/pdf-history")]
pub async fn get_pdf_history(hub: &State<Arc<Hub>>, current_session: CurrentSession) -> Json<PdfHistoryResponse> {
    Json(hub.pdf_history(&current_session.device_id).await)
}

/// Download one PDF from the history
#[openapi(tag = "PDF")]
#[get("/download-pdf-history/<id>")]
pub async fn download_pdf_history(hub: &State<Arc<Hub>>, current_session: CurrentSession, id: &str) -> Result<Attachment, AppError> {
    let file = hub.pdf_file(&current_session.device_id, id).await?;
    Ok(Attachment::new(&file.filename, ContentType::PDF, file.bytes))
}

/// Download the most recent PDF
#[openapi(tag = "PDF")]
#[get("/download-qr-pdf")]
pub async fn download_qr_pdf(hub: &State<Arc<Hub>>, current_session: CurrentSession) -> Result<Attachment, AppError> {
    let file = hub.current_pdf(&current_session.device_id).await?;
    Ok(Attachment::new(&file.filename, ContentType::PDF, file.bytes))
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![post_pdf, get_pdf_history, download_pdf_history, download_qr_pdf]
}
