//! BLE Service and Characteristic UUIDs.
//!
//! The Thingy:52 custom UUIDs share the base `ef68xxxx-9b35-4933-9b10-52ffa9740042`.
//! They must match the firmware bit for bit.

use uuid::Uuid;

// Thingy Configuration Service (only used as a scan filter)
/// Thingy Configuration Service UUID.
pub const CONFIGURATION_SERVICE_UUID: Uuid =
    Uuid::from_u128(0xef68_0100_9b35_4933_9b10_52ffa9740042);

// Weather Station Service
/// Thingy Weather Station Service UUID.
pub const WEATHER_STATION_SERVICE_UUID: Uuid =
    Uuid::from_u128(0xef68_0200_9b35_4933_9b10_52ffa9740042);
/// Temperature characteristic UUID (Notify).
pub const TEMPERATURE_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0xef68_0201_9b35_4933_9b10_52ffa9740042);

// Battery Service (Standard BLE)
/// Standard BLE Battery Service UUID (`battery_service`).
pub const BATTERY_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_180f_0000_1000_8000_00805f9b34fb);
/// Battery Level characteristic UUID (`battery_level`; Read, Notify).
pub const BATTERY_LEVEL_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x0000_2a19_0000_1000_8000_00805f9b34fb);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_format() {
        assert_eq!(
            CONFIGURATION_SERVICE_UUID.to_string(),
            "ef680100-9b35-4933-9b10-52ffa9740042"
        );
        assert_eq!(
            WEATHER_STATION_SERVICE_UUID.to_string(),
            "ef680200-9b35-4933-9b10-52ffa9740042"
        );
        assert_eq!(
            TEMPERATURE_CHARACTERISTIC_UUID.to_string(),
            "ef680201-9b35-4933-9b10-52ffa9740042"
        );
    }

    #[test]
    fn test_battery_uuids_are_16_bit_sig_ids() {
        assert_eq!(
            BATTERY_SERVICE_UUID,
            btleplug::api::bleuuid::uuid_from_u16(0x180F)
        );
        assert_eq!(
            BATTERY_LEVEL_CHARACTERISTIC_UUID,
            btleplug::api::bleuuid::uuid_from_u16(0x2A19)
        );
    }
}
