use crate::models::device::DeviceId;
use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use validator::Validate;

/// A location accepted from a device, stamped with server time.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LocationRecord {
    pub device_id: DeviceId,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Coordinates as sent by a device. Any client-side timestamp is ignored.
#[derive(Deserialize, Debug, Clone, Copy, Validate, JsonSchema)]
pub struct LocationFix {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    #[validate(range(min = 0.0))]
    pub accuracy: Option<f64>,
}

/// HTTP fallback body; every field is optional so a missing one is reported
/// as a validation failure instead of a parse failure.
#[derive(Deserialize, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LocationReport {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy: Option<f64>,
    pub device_id: Option<String>,
}

impl LocationReport {
    /// Returns the device id and fix, or the names of the missing fields.
    pub fn split(self) -> Result<(String, LocationFix), Vec<&'static str>> {
        match (self.device_id, self.latitude, self.longitude) {
            (Some(device_id), Some(latitude), Some(longitude)) if !device_id.trim().is_empty() => Ok((
                device_id,
                LocationFix {
                    latitude,
                    longitude,
                    accuracy: self.accuracy,
                },
            )),
            (device_id, latitude, longitude) => {
                let mut missing = Vec::new();
                if latitude.is_none() {
                    missing.push("latitude");
                }
                if longitude.is_none() {
                    missing.push("longitude");
                }
                if device_id.is_none_or(|id| id.trim().is_empty()) {
                    missing.push("deviceId");
                }
                Err(missing)
            }
        }
    }
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct LocationAccepted {
    pub success: bool,
    pub location: LocationRecord,
}

#[derive(Serialize, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LocationSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<DeviceId>,
    pub current: Option<LocationRecord>,
    pub history: Vec<LocationRecord>,
}
