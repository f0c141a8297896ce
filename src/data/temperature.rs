//! Temperature reading and payload decoding.
//!
//! The weather-station temperature characteristic carries two bytes:
//!
//! | Byte | Type | Meaning |
//! |------|------|---------|
//! | 0 | `i8` | Integer part, degrees Celsius |
//! | 1 | `u8` | Fractional part |
//!
//! The fractional byte is not a binary fraction. Its decimal digits are
//! written after the decimal point, so `[21, 50]` and `[21, 5]` both read
//! as `21.5` and `[21, 25]` reads as `21.25`.

use crate::error::{Error, Result};
use crate::utils::{celsius_to_fahrenheit, celsius_to_kelvin};

/// Size of a temperature notification payload.
pub const TEMPERATURE_PAYLOAD_LEN: usize = 2;

/// One temperature sample expressed on all three scales.
///
/// Only [`TemperatureReading::from_celsius`] builds a reading, so the
/// Fahrenheit and Kelvin values always agree with the Celsius one.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TemperatureReading {
    celsius: f64,
    fahrenheit: f64,
    kelvin: f64,
}

impl TemperatureReading {
    /// Build a reading from a Celsius value.
    ///
    /// ```
    /// use thingy52_ble::TemperatureReading;
    ///
    /// let reading = TemperatureReading::from_celsius(100.0);
    /// assert!((reading.fahrenheit() - 212.0).abs() < 0.001);
    /// assert!((reading.kelvin() - 373.15).abs() < 0.001);
    /// ```
    pub fn from_celsius(celsius: f64) -> Self {
        Self {
            celsius,
            fahrenheit: celsius_to_fahrenheit(celsius),
            kelvin: celsius_to_kelvin(celsius),
        }
    }

    /// Temperature in degrees Celsius.
    pub fn celsius(&self) -> f64 {
        self.celsius
    }

    /// Temperature in degrees Fahrenheit.
    pub fn fahrenheit(&self) -> f64 {
        self.fahrenheit
    }

    /// Temperature in Kelvin.
    pub fn kelvin(&self) -> f64 {
        self.kelvin
    }
}

impl std::fmt::Display for TemperatureReading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.2}°C / {:.2}°F / {:.2}K",
            self.celsius, self.fahrenheit, self.kelvin
        )
    }
}

/// Decode a raw temperature characteristic value.
///
/// Bytes past the first two are ignored.
///
/// # Errors
///
/// Returns [`Error::InvalidData`] if fewer than two bytes are supplied.
///
/// # Example
///
/// ```
/// use thingy52_ble::data::decode_temperature;
///
/// let reading = decode_temperature(&[21, 50]).unwrap();
/// assert_eq!(reading.celsius(), 21.5);
/// ```
pub fn decode_temperature(data: &[u8]) -> Result<TemperatureReading> {
    if data.len() < TEMPERATURE_PAYLOAD_LEN {
        return Err(Error::InvalidData {
            context: format!(
                "Temperature payload too short: {} bytes, expected {}",
                data.len(),
                TEMPERATURE_PAYLOAD_LEN
            ),
        });
    }

    let integer = data[0] as i8;
    let fraction = data[1];

    // Parse the joined text so the result is the nearest f64 to the printed value.
    let text = format!("{}.{}", integer, fraction);
    let celsius = text.parse::<f64>().map_err(|_| Error::InvalidData {
        context: format!("Unparseable temperature '{}'", text),
    })?;

    Ok(TemperatureReading::from_celsius(celsius))
}
