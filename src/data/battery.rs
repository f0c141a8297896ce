//! Battery level reading.

use crate::error::{Error, Result};

/// Battery charge as reported by the standard Battery Level characteristic.
///
/// The raw byte is passed through unscaled. Firmware reports 0-100, but
/// nothing stops a peripheral sending up to 255.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BatteryLevel(pub u8);

impl BatteryLevel {
    /// The charge as a percentage.
    pub fn percent(&self) -> u8 {
        self.0
    }

    /// Whether the value lies in the conventional 0-100 range.
    pub fn is_in_range(&self) -> bool {
        self.0 <= 100
    }
}

impl std::fmt::Display for BatteryLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Decode a raw Battery Level characteristic value.
///
/// # Errors
///
/// Returns [`Error::InvalidData`] for an empty payload.
pub fn decode_battery(data: &[u8]) -> Result<BatteryLevel> {
    data.first()
        .copied()
        .map(BatteryLevel)
        .ok_or_else(|| Error::InvalidData {
            context: "Empty battery level payload".to_string(),
        })
}
