use crate::error::app_error::AppError;
use crate::error::json::JsonBody;
use crate::hub::Hub;
use crate::models::emergency::{ClearEmergencyRequest, EmergencyRequest, EmergencyResponse};
use rocket::serde::json::Json;
use rocket::{State, post};
use rocket_okapi::openapi;
use std::sync::Arc;
use validator::Validate;

/// Raise an emergency for a device, e.g. from its panic switch
#[openapi(tag = "Emergency")]
#[post("/emergency", data = "<payload>")]
pub async fn post_emergency(hub: &State<Arc<Hub>>, payload: JsonBody<EmergencyRequest>) -> Result<Json<EmergencyResponse>, AppError> {
    let request = payload.into_inner();
    request.validate()?;

    let emergency = hub.raise_emergency(&request.device_id, request.signal).await?;
    Ok(Json(EmergencyResponse {
        success: true,
        emergency: Some(emergency),
    }))
}

#[openapi(tag = "Emergency")]
#[post("/clear-emergency", data = "<payload>")]
pub async fn post_clear_emergency(hub: &State<Arc<Hub>>, payload: JsonBody<ClearEmergencyRequest>) -> Result<Json<EmergencyResponse>, AppError> {
    payload.validate()?;
    hub.clear_emergency(&payload.device_id).await?;
    Ok(Json(EmergencyResponse {
        success: true,
        emergency: None,
    }))
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![post_emergency, post_clear_emergency]
}
