use crate::hub::Hub;
use crate::models::device::DevicesResponse;
use rocket::serde::json::Json;
use rocket::{State, get};
use rocket_okapi::openapi;
use std::sync::Arc;

/// Allow-listed devices and the ones currently connected
#[openapi(tag = "Devices")]
#[get("/devices")]
pub async fn get_devices(hub: &State<Arc<Hub>>) -> Json<DevicesResponse> {
    Json(hub.devices_overview().await)
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![get_devices]
}
