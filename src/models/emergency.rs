use crate::models::device::DeviceId;
use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use validator::Validate;

pub const DEFAULT_EMERGENCY_MESSAGE: &str = "Emergency triggered on device";

/// An emergency raised by a device's panic switch, active until cleared.
#[derive(Serialize, Debug, Clone, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyState {
    pub device_id: DeviceId,
    pub message: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub raised_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Clone, Default, Validate, JsonSchema)]
pub struct EmergencySignal {
    pub message: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
}

#[derive(Deserialize, Debug, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyRequest {
    #[validate(length(min = 1))]
    pub device_id: String,
    #[serde(flatten)]
    #[validate(nested)]
    pub signal: EmergencySignal,
}

#[derive(Deserialize, Debug, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClearEmergencyRequest {
    #[validate(length(min = 1))]
    pub device_id: String,
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct EmergencyResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency: Option<EmergencyState>,
}
