use crate::error::app_error::AppError;
use crate::error::json::JsonBody;
use crate::hub::Hub;
use crate::models::location::{LocationAccepted, LocationReport, LocationSnapshot};
use rocket::serde::json::Json;
use rocket::{State, get, post};
use rocket_okapi::openapi;
use std::sync::Arc;

/// Record a location reported over HTTP instead of the socket
#[openapi(tag = "Location")]
#[post("/location", data = "<payload>")]
pub async fn post_location(hub: &State<Arc<Hub>>, payload: JsonBody<LocationReport>) -> Result<Json<LocationAccepted>, AppError> {
    let (device_id, fix) = payload
        .into_inner()
        .split()
        .map_err(|missing| AppError::BadRequest(format!("Missing required fields: {}", missing.join(", "))))?;

    let location = hub.report_location(&device_id, fix).await?;
    Ok(Json(LocationAccepted { success: true, location }))
}

/// Current location and history, for one device or across all devices
#[allow(non_snake_case)]
#[openapi(tag = "Location")]
#[get("/location?<deviceId>")]
pub async fn get_location(hub: &State<Arc<Hub>>, deviceId: Option<&str>) -> Result<Json<LocationSnapshot>, AppError> {
    Ok(Json(hub.location_snapshot(deviceId).await?))
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![post_location, get_location]
}

#[cfg(test)]
mod tests {
    use crate::test_utils::test_client;
    use rocket::http::{ContentType, Status};
    use rocket::local::asynchronous::Client;
    use serde_json::{Value, json};
    use tempfile::TempDir;

    async fn post(client: &Client, body: Value) -> (Status, Value) {
        let response = client
            .post("/api/location")
            .header(ContentType::JSON)
            .body(body.to_string())
            .dispatch()
            .await;
        let status = response.status();
        (status, response.into_json().await.unwrap_or(Value::Null))
    }

    #[rocket::async_test]
    async fn accepts_location_for_authorized_device() {
        let dir = TempDir::new().unwrap();
        let client = test_client(&dir).await;

        let (status, body) = post(
            &client,
            json!({"deviceId": "raspi-001", "latitude": 40.7128, "longitude": -74.006, "accuracy": 5.0, "timestamp": "1999-01-01T00:00:00Z"}),
        )
        .await;
        assert_eq!(status, Status::Ok);
        assert_eq!(body["success"], true);
        assert_eq!(body["location"]["deviceId"], "raspi-001");
        assert_ne!(body["location"]["timestamp"], "1999-01-01T00:00:00Z");

        let snapshot: Value = client.get("/api/location?deviceId=raspi-001").dispatch().await.into_json().await.unwrap();
        assert_eq!(snapshot["current"]["latitude"], 40.7128);
        assert_eq!(snapshot["history"].as_array().unwrap().len(), 1);

        let overall: Value = client.get("/api/location").dispatch().await.into_json().await.unwrap();
        assert_eq!(overall["current"]["deviceId"], "raspi-001");
    }

    #[rocket::async_test]
    async fn missing_fields_and_bad_ranges_are_rejected() {
        let dir = TempDir::new().unwrap();
        let client = test_client(&dir).await;

        let (status, body) = post(&client, json!({"deviceId": "raspi-001", "latitude": 1.0})).await;
        assert_eq!(status, Status::BadRequest);
        assert!(body["message"].as_str().unwrap().contains("longitude"));

        let (status, _) = post(&client, json!({"deviceId": "raspi-001", "latitude": 95.0, "longitude": 0.0})).await;
        assert_eq!(status, Status::BadRequest);
    }

    #[rocket::async_test]
    async fn unknown_device_is_forbidden() {
        let dir = TempDir::new().unwrap();
        let client = test_client(&dir).await;

        let (status, _) = post(&client, json!({"deviceId": "raspi-999", "latitude": 1.0, "longitude": 1.0})).await;
        assert_eq!(status, Status::Forbidden);
        assert_eq!(client.get("/api/location?deviceId=raspi-999").dispatch().await.status(), Status::Forbidden);
    }
}
