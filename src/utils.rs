//! Utility functions for the thingy52-ble crate.

/// Offset between the Celsius and Kelvin scales.
pub const KELVIN_OFFSET: f64 = 273.15;

/// Convert Celsius to Fahrenheit.
///
/// # Example
///
/// ```
/// use thingy52_ble::celsius_to_fahrenheit;
///
/// let fahrenheit = celsius_to_fahrenheit(100.0);
/// assert!((fahrenheit - 212.0).abs() < 0.001);
/// ```
#[inline]
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

/// Convert Celsius to Kelvin.
///
/// ```
/// use thingy52_ble::celsius_to_kelvin;
///
/// assert!((celsius_to_kelvin(0.0) - 273.15).abs() < 0.001);
/// ```
#[inline]
pub fn celsius_to_kelvin(celsius: f64) -> f64 {
    celsius + KELVIN_OFFSET
}
