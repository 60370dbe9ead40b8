use serde::{Deserialize, Serialize};

use super::EntityId;

/// A point-of-sale station with its denormalized display fields.
///
/// Owned by the server; the client only ever holds copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct StationRef {
    #[cfg_attr(feature = "ts", ts(type = "string | number"))]
    pub id: EntityId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(rename = "ipAddress", default)]
    pub ip_address: Option<String>,
    #[serde(rename = "printerName", default)]
    pub printer_name: Option<String>,
    #[serde(rename = "scannerName", default)]
    pub scanner_name: Option<String>,
}

impl StationRef {
    /// Name for list display, falling back to the id.
    pub fn display_name(&self) -> String {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => format!("Station {}", self.id),
        }
    }
}

/// Body for station create/update.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StationRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "ipAddress", skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(rename = "printerName", skip_serializing_if = "Option::is_none")]
    pub printer_name: Option<String>,
    #[serde(rename = "scannerName", skip_serializing_if = "Option::is_none")]
    pub scanner_name: Option<String>,
}
