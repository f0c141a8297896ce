//! Driver configuration.

use std::time::Duration;
use uuid::Uuid;

use crate::ble::scanner::DEFAULT_SCAN_TIMEOUT;
use crate::ble::transport::DeviceFilter;
use crate::ble::uuids::*;

/// Default capacity of the broadcast event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Settings for a [`Thingy52Driver`](crate::Thingy52Driver).
#[derive(Debug, Clone, PartialEq)]
pub struct DriverConfig {
    /// How long the built-in scanner looks for a device.
    pub scan_timeout: Duration,
    /// Events buffered per broadcast receiver before it starts lagging.
    pub event_capacity: usize,
    /// Service a device must advertise to be picked.
    pub required_service: Uuid,
    /// Services requested in addition to the required one.
    pub optional_services: Vec<Uuid>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            required_service: CONFIGURATION_SERVICE_UUID,
            optional_services: vec![BATTERY_SERVICE_UUID, WEATHER_STATION_SERVICE_UUID],
        }
    }
}

impl DriverConfig {
    /// Set the scan timeout.
    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    /// Set the broadcast channel capacity.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// The discovery filter described by this configuration.
    pub fn device_filter(&self) -> DeviceFilter {
        DeviceFilter {
            required_service: self.required_service,
            optional_services: self.optional_services.clone(),
        }
    }
}
