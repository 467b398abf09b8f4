//! Kiosk device models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kiosk device record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: i64,
    pub device_id: String,
    pub location_id: i64,
    pub name: Option<String>,
    pub is_approved: bool,
    pub is_active: bool,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Device identity handed to kiosk handlers once the device gate passes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceContext {
    pub id: i64,
    pub device_id: String,
    pub location_id: i64,
}

impl From<&Device> for DeviceContext {
    fn from(device: &Device) -> Self {
        Self {
            id: device.id,
            device_id: device.device_id.clone(),
            location_id: device.location_id,
        }
    }
}
