//! BLE communication module.
//!
//! Transport traits, their btleplug implementations, and the connection
//! manager that drives a single Thingy:52 session.

pub mod connection;
#[cfg(test)]
pub(crate) mod fake;
pub mod gatt;
pub mod scanner;
pub mod subscriber;
pub mod transport;
pub mod uuids;

pub use connection::{ConnectionManager, ConnectionState};
pub use gatt::{BtleCharacteristic, BtleDevice, BtleService, BtleSession};
pub use scanner::BleScanner;
pub use subscriber::{InitialRead, SensorSubscription, SensorTarget};
pub use transport::{
    BleDevice, DeviceDiscovery, DeviceFilter, DeviceHandle, GattCharacteristic, GattService,
    GattSession,
};
pub use uuids::*;
