use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque station identifier, as shown in the Tempest app.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StationId(String);

impl StationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StationId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The sensor device a station's push data is subscribed through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceBinding {
    pub station: StationId,
    pub device_id: u64,
    pub serial_number: Option<String>,
}

impl DeviceBinding {
    /// Whether a push frame tagged with `device_id` belongs to this binding.
    pub fn matches(&self, device_id: Option<u64>) -> bool {
        device_id == Some(self.device_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_matches_only_its_device() {
        let binding = DeviceBinding {
            station: StationId::from("1234"),
            device_id: 42,
            serial_number: None,
        };
        assert!(binding.matches(Some(42)));
        assert!(!binding.matches(Some(43)));
        assert!(!binding.matches(None));
    }

    #[test]
    fn station_id_displays_raw_value() {
        assert_eq!(StationId::new("98765").to_string(), "98765");
    }
}
