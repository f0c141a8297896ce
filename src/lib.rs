// Allow unusual byte groupings for UUIDs which have standard format
#![allow(clippy::unusual_byte_groupings)]

//! # thingy52-ble
//!
//! A Rust driver for the Nordic Thingy:52 over Bluetooth Low Energy.
//!
//! The driver keeps one device connected at a time, subscribes to the
//! weather-station temperature and the standard battery level, and
//! republishes decoded readings as events.
//!
//! ## Features
//!
//! - **Single session**: connecting a new device always drops the old one
//! - **Temperature**: Celsius, Fahrenheit and Kelvin from every notification
//! - **Battery**: initial read plus notifications, skipped on stacks that
//!   cannot reach 16-bit services
//! - **Events**: `connect`, `disconnect`, `battery`, `temperature-change`
//!   through callbacks or a broadcast channel
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use thingy52_ble::{DriverConfig, Result, Thingy52Driver};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let driver = Thingy52Driver::with_btleplug(DriverConfig::default()).await?;
//!
//!     let _temperature = driver.on_temperature_change(|reading| {
//!         println!("{:.1}°C", reading.celsius());
//!     });
//!     let _battery = driver.on_battery(|level| println!("Battery: {}", level));
//!
//!     driver.scan().await?;
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(30)).await;
//!     driver.disconnect();
//!     Ok(())
//! }
//! ```
//!
//! ## Platform Notes
//!
//! ### Linux
//! Requires BlueZ. Older BlueZ releases may hide the 16-bit battery
//! service; the driver connects without battery data in that case.
//!
//! ### macOS
//! Requires Bluetooth permission. Add `NSBluetoothAlwaysUsageDescription`
//! to your Info.plist for bundled apps.
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization for readings

// Public modules
pub mod ble;
pub mod config;
pub mod data;
pub mod driver;
pub mod error;
pub mod events;
pub mod utils;

// Re-exports for convenience
pub use config::DriverConfig;
pub use driver::Thingy52Driver;
pub use error::{Error, Result};
pub use events::{CallbackHandle, DriverEvent, EventKind, EventPublisher};
pub use utils::{celsius_to_fahrenheit, celsius_to_kelvin};

pub use ble::connection::ConnectionState;
pub use ble::transport::{BleDevice, DeviceDiscovery, DeviceFilter, DeviceHandle};
pub use data::{BatteryLevel, TemperatureReading};
