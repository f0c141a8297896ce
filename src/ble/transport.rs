//! Transport abstractions.
//!
//! The driver talks to the radio only through these traits. The btleplug
//! backed implementations live in [`crate::ble::gatt`] and
//! [`crate::ble::scanner`].

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use std::sync::Arc;
use uuid::Uuid;

use crate::ble::uuids::{
    BATTERY_SERVICE_UUID, CONFIGURATION_SERVICE_UUID, WEATHER_STATION_SERVICE_UUID,
};
use crate::error::Result;

/// Shared handle to a peripheral chosen by a [`DeviceDiscovery`].
pub type DeviceHandle = Arc<dyn BleDevice>;

/// Which peripherals a discovery request should accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFilter {
    /// The peripheral must advertise this service.
    pub required_service: Uuid,
    /// Services the driver wants access to once connected, if present.
    pub optional_services: Vec<Uuid>,
}

impl Default for DeviceFilter {
    fn default() -> Self {
        Self {
            required_service: CONFIGURATION_SERVICE_UUID,
            optional_services: vec![BATTERY_SERVICE_UUID, WEATHER_STATION_SERVICE_UUID],
        }
    }
}

/// Supplies a device handle, typically after a user-driven scan.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceDiscovery: Send + Sync {
    /// Pick one device matching `filter`.
    ///
    /// # Errors
    ///
    /// [`Error::UserCancelled`](crate::Error::UserCancelled) when the user
    /// backs out, [`Error::NoDeviceFound`](crate::Error::NoDeviceFound) when
    /// nothing matched.
    async fn request_device(&self, filter: &DeviceFilter) -> Result<DeviceHandle>;
}

/// One physical peripheral.
#[async_trait]
pub trait BleDevice: Send + Sync + std::fmt::Debug {
    /// Platform identifier of the peripheral.
    fn id(&self) -> String;

    /// Advertised name, if any.
    fn name(&self) -> Option<String>;

    /// A future that resolves once the link to this peripheral drops.
    ///
    /// Taken before [`connect`](Self::connect) so a drop during setup is
    /// still observed. It never resolves if link loss can no longer be
    /// watched.
    async fn disconnect_signal(&self) -> Result<BoxFuture<'static, ()>>;

    /// Open a GATT session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LinkError`](crate::Error::LinkError) if the link
    /// cannot be established.
    async fn connect(&self) -> Result<Box<dyn GattSession>>;
}

/// A live connection to a peripheral's GATT server.
#[async_trait]
pub trait GattSession: Send + Sync {
    /// Look up a primary service.
    async fn primary_service(&self, uuid: Uuid) -> Result<Box<dyn GattService>>;

    /// Close the link.
    async fn disconnect(&self) -> Result<()>;
}

/// A service on a connected peripheral.
#[async_trait]
pub trait GattService: Send + Sync {
    /// UUID of the service.
    fn uuid(&self) -> Uuid;

    /// Look up a characteristic of this service.
    async fn characteristic(&self, uuid: Uuid) -> Result<Box<dyn GattCharacteristic>>;
}

/// A characteristic on a connected peripheral.
#[async_trait]
pub trait GattCharacteristic: Send + Sync {
    /// UUID of the characteristic.
    fn uuid(&self) -> Uuid;

    /// Read the current value once.
    async fn read_value(&self) -> Result<Vec<u8>>;

    /// Ask the peripheral to start pushing value changes.
    async fn start_notifications(&self) -> Result<()>;

    /// Stream of raw values pushed for this characteristic, in arrival order.
    ///
    /// The stream only yields after [`start_notifications`](Self::start_notifications).
    async fn value_changes(&self) -> Result<BoxStream<'static, Vec<u8>>>;
}
