use super::event::EventData;
use serde::{Deserialize, Serialize};

pub const UNKNOWN: &str = "Unknown";
pub const HIDDEN_IP: &str = "Hidden";

/// Coarse geolocation attached to the visit event.
///
/// `ip` is `None` only for the failure fallback, which the collector receives
/// without an `ip` field at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationInfo {
    pub country: String,
    pub city: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

impl LocationInfo {
    pub fn unknown() -> Self {
        Self {
            country: UNKNOWN.to_string(),
            city: UNKNOWN.to_string(),
            region: UNKNOWN.to_string(),
            ip: None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        *self == Self::unknown()
    }

    /// Flattens the location into event data fields.
    pub fn to_event_data(&self) -> EventData {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => EventData::new(),
        }
    }
}

impl Default for LocationInfo {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Keeps the first eight characters of an address and marks the rest as elided.
pub fn mask_ip(ip: &str) -> String {
    let prefix: String = ip.chars().take(8).collect();
    format!("{prefix}...")
}
