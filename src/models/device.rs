use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use std::borrow::Borrow;
use std::fmt;

/// Identity of a device on the static allow-list.
///
/// Only the credential store hands these out after checking the allow-list;
/// everything downstream can treat a `DeviceId` as authorized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        DeviceId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for DeviceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[derive(Serialize, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DevicesResponse {
    pub authorized_devices: Vec<DeviceId>,
    pub connected_devices: Vec<DeviceId>,
    pub total_connected: usize,
}
