//! Core data model shared by the registry, coordinators and remote backend

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Local workspace tab identity (positive, never reused within a process)
pub type TabId = u32;

/// Id minted by the remote session store ("SAVE-1a2b3c4d")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The five kinds of equipment a site can hold
///
/// Transformer is the dependent kind: its count is derived from the battery
/// total and can only be raised manually, never lowered below that minimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeviceType {
    MegapackXL,
    Megapack2,
    Megapack,
    PowerPack,
    Transformer,
}

impl DeviceType {
    pub const ALL: [DeviceType; 5] = [
        DeviceType::MegapackXL,
        DeviceType::Megapack2,
        DeviceType::Megapack,
        DeviceType::PowerPack,
        DeviceType::Transformer,
    ];

    pub fn is_battery(self) -> bool {
        !matches!(self, DeviceType::Transformer)
    }

    /// Human readable catalogue name
    pub fn label(self) -> &'static str {
        match self {
            DeviceType::MegapackXL => "Megapack XL",
            DeviceType::Megapack2 => "Megapack 2",
            DeviceType::Megapack => "Megapack",
            DeviceType::PowerPack => "PowerPack",
            DeviceType::Transformer => "Transformer",
        }
    }

    fn key(self) -> &'static str {
        match self {
            DeviceType::MegapackXL => "MegapackXL",
            DeviceType::Megapack2 => "Megapack2",
            DeviceType::Megapack => "Megapack",
            DeviceType::PowerPack => "PowerPack",
            DeviceType::Transformer => "Transformer",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for DeviceType {
    type Err = anyhow::Error;

    /// Accepts the wire key ("MegapackXL") or the label ("Megapack XL"), case-insensitive
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        DeviceType::ALL
            .into_iter()
            .find(|d| d.key().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown device type '{}' (expected one of: {})",
                    s,
                    DeviceType::ALL.map(|d| d.key()).join(", ")
                )
            })
    }
}

/// Requested count for every device type
///
/// Serialized as a JSON object keyed by device type. Every key is always
/// present on output; missing keys on input read as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(rename = "MegapackXL", default)]
    pub megapack_xl: u32,
    #[serde(rename = "Megapack2", default)]
    pub megapack_2: u32,
    #[serde(rename = "Megapack", default)]
    pub megapack: u32,
    #[serde(rename = "PowerPack", default)]
    pub power_pack: u32,
    #[serde(rename = "Transformer", default)]
    pub transformer: u32,
}

impl Configuration {
    pub fn get(&self, device: DeviceType) -> u32 {
        match device {
            DeviceType::MegapackXL => self.megapack_xl,
            DeviceType::Megapack2 => self.megapack_2,
            DeviceType::Megapack => self.megapack,
            DeviceType::PowerPack => self.power_pack,
            DeviceType::Transformer => self.transformer,
        }
    }

    pub fn set(&mut self, device: DeviceType, count: u32) {
        let slot = match device {
            DeviceType::MegapackXL => &mut self.megapack_xl,
            DeviceType::Megapack2 => &mut self.megapack_2,
            DeviceType::Megapack => &mut self.megapack,
            DeviceType::PowerPack => &mut self.power_pack,
            DeviceType::Transformer => &mut self.transformer,
        };
        *slot = count;
    }

    /// Builder-style setter, handy for fixtures
    pub fn with(mut self, device: DeviceType, count: u32) -> Self {
        self.set(device, count);
        self
    }

    /// Sum of every non-transformer count
    pub fn battery_total(&self) -> u64 {
        DeviceType::ALL
            .into_iter()
            .filter(|d| d.is_battery())
            .map(|d| u64::from(self.get(d)))
            .sum()
    }

    /// Minimum transformers for the current batteries (one per two)
    pub fn required_transformers(&self) -> u64 {
        self.battery_total() / 2
    }

    pub fn total_units(&self) -> u64 {
        self.battery_total() + u64::from(self.transformer)
    }

    pub fn is_empty(&self) -> bool {
        self.total_units() == 0
    }

    /// Compact "2x Megapack, 1x Transformer" description
    pub fn describe(&self) -> String {
        let parts: Vec<String> = DeviceType::ALL
            .into_iter()
            .filter(|d| self.get(*d) > 0)
            .map(|d| format!("{}x {}", self.get(d), d.label()))
            .collect();
        if parts.is_empty() {
            "empty".to_string()
        } else {
            parts.join(", ")
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

/// One device as placed by the remote layout service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedDevice {
    pub id: String,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    pub width: u32,
    pub height: u32,
    pub position: Position,
}

/// Remote layout computation result, kept verbatim once received
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutResult {
    #[serde(default)]
    pub placed_devices: Vec<PlacedDevice>,
    pub total_width: u32,
    pub total_height: u32,
    pub total_cost: u64,
    /// MWh; transformers draw a fractional amount
    pub total_energy: f64,
    #[serde(rename = "transformers_count")]
    pub transformers: u32,
}

impl LayoutResult {
    /// Footprint area in square feet
    pub fn area(&self) -> u64 {
        u64::from(self.total_width) * u64::from(self.total_height)
    }
}

/// Read-only projection of a stored session, owned by the remote store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub unix_time: i64,
    #[serde(default)]
    pub config: Option<Configuration>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_serializes_every_key() {
        let json = serde_json::to_value(Configuration::default()).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 5);
        for device in DeviceType::ALL {
            assert_eq!(obj[&device.to_string()], 0);
        }
    }

    #[test]
    fn test_configuration_partial_map_fills_zero() {
        let config: Configuration = serde_json::from_str(r#"{"Megapack": 4}"#).unwrap();
        assert_eq!(config.get(DeviceType::Megapack), 4);
        assert_eq!(config.get(DeviceType::Transformer), 0);
        assert_eq!(config.total_units(), 4);
    }

    #[test]
    fn test_configuration_totals() {
        let config = Configuration::default()
            .with(DeviceType::MegapackXL, 3)
            .with(DeviceType::PowerPack, 2)
            .with(DeviceType::Transformer, 4);
        assert_eq!(config.battery_total(), 5);
        assert_eq!(config.required_transformers(), 2);
        assert_eq!(config.total_units(), 9);
        assert!(!config.is_empty());
        assert_eq!(config.describe(), "3x Megapack XL, 2x PowerPack, 4x Transformer");
    }

    #[test]
    fn test_device_type_parse() {
        assert_eq!("megapackxl".parse::<DeviceType>().unwrap(), DeviceType::MegapackXL);
        assert_eq!("Megapack 2".parse::<DeviceType>().unwrap(), DeviceType::Megapack2);
        assert!("Powerwall".parse::<DeviceType>().is_err());
    }

    #[test]
    fn test_layout_result_decodes_backend_payload() {
        let payload = r#"{
            "placed_devices": [
                {"id": "Megapack-0", "type": "Megapack", "width": 30, "height": 10,
                 "position": {"x": 0, "y": 0}}
            ],
            "total_width": 100,
            "total_height": 10,
            "total_cost": 60000,
            "total_energy": 1.5,
            "transformers_count": 1
        }"#;
        let layout: LayoutResult = serde_json::from_str(payload).unwrap();
        assert_eq!(layout.placed_devices.len(), 1);
        assert_eq!(layout.placed_devices[0].device_type, DeviceType::Megapack);
        assert_eq!(layout.transformers, 1);
        assert_eq!(layout.area(), 1000);
    }
}
