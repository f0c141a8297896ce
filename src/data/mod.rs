//! Sensor readings and the decoders that produce them.
//!
//! Decoders are pure functions over raw characteristic values.

pub mod battery;
pub mod temperature;

pub use battery::{decode_battery, BatteryLevel};
pub use temperature::{decode_temperature, TemperatureReading, TEMPERATURE_PAYLOAD_LEN};
