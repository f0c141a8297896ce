//! The public driver for a Thingy:52.
//!
//! [`Thingy52Driver`] is a long-lived service object. Build one at startup
//! and share it (`Arc<Thingy52Driver>`) with every consumer; it enforces a
//! single device session for its whole lifetime.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::ble::connection::{ConnectionManager, ConnectionState};
use crate::ble::scanner::BleScanner;
use crate::ble::transport::{DeviceDiscovery, DeviceHandle};
use crate::config::DriverConfig;
use crate::data::{BatteryLevel, TemperatureReading};
use crate::error::{Error, Result};
use crate::events::{CallbackHandle, DriverEvent, EventKind, EventPublisher};

/// Driver for one Thingy:52 at a time.
pub struct Thingy52Driver {
    /// Source of device handles.
    discovery: Arc<dyn DeviceDiscovery>,
    /// Session owner.
    connection: ConnectionManager,
    /// Listener registry.
    publisher: Arc<EventPublisher>,
    /// Driver settings.
    config: DriverConfig,
}

impl Thingy52Driver {
    /// Create a driver that gets devices from `discovery`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(discovery: Arc<dyn DeviceDiscovery>) -> Self {
        Self::with_config(discovery, DriverConfig::default())
    }

    /// Create a driver with explicit settings.
    pub fn with_config(discovery: Arc<dyn DeviceDiscovery>, config: DriverConfig) -> Self {
        let publisher = Arc::new(EventPublisher::new(config.event_capacity));
        let connection = ConnectionManager::new(publisher.clone());

        Self {
            discovery,
            connection,
            publisher,
            config,
        }
    }

    /// Create a driver backed by btleplug on the first Bluetooth adapter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BluetoothUnavailable`] if there is no usable adapter.
    pub async fn with_btleplug(config: DriverConfig) -> Result<Self> {
        let scanner = BleScanner::new()
            .await?
            .with_scan_timeout(config.scan_timeout);

        Ok(Self::with_config(Arc::new(scanner), config))
    }

    /// Pick a device and connect to it.
    ///
    /// A `connect` event follows once the session is up. A failure emits
    /// nothing and is returned here only. If discovery fails, the current
    /// session (if any) is left untouched.
    ///
    /// # Errors
    ///
    /// [`Error::UserCancelled`], [`Error::NoDeviceFound`], link and profile
    /// errors, or [`Error::Cancelled`] if [`disconnect`](Self::disconnect)
    /// was called while connecting.
    pub async fn scan(&self) -> Result<()> {
        let filter = self.config.device_filter();
        debug!("Requesting device with filter {:?}", filter);

        let device = self.discovery.request_device(&filter).await?;
        info!(
            "Selected device {} ({})",
            device.id(),
            device.name().as_deref().unwrap_or("unnamed")
        );

        self.connection.open_session(device).await
    }

    /// Disconnect from the current device.
    ///
    /// Safe to call at any time; does nothing when not connected.
    pub fn disconnect(&self) {
        self.connection.disconnect();
    }

    /// Disconnect if connected, otherwise scan.
    ///
    /// # Errors
    ///
    /// Same as [`scan`](Self::scan).
    pub async fn toggle(&self) -> Result<()> {
        if self.is_connected() {
            self.disconnect();
            Ok(())
        } else {
            self.scan().await
        }
    }

    /// Get the current connection state.
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// The connected device, if any.
    pub fn device(&self) -> Option<DeviceHandle> {
        self.connection.device()
    }

    /// Why the battery (or another best-effort feature) is unavailable on
    /// the current session.
    pub fn last_optional_failure(&self) -> Option<Error> {
        self.connection.last_optional_failure()
    }

    /// Get the driver settings.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    // === Events ===

    /// Register a callback for every event of `kind`.
    pub fn on<F>(&self, kind: EventKind, callback: F) -> CallbackHandle
    where
        F: Fn(&DriverEvent) + Send + Sync + 'static,
    {
        self.publisher.subscribe(kind, callback)
    }

    /// Register a callback for `connect`.
    pub fn on_connect<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(DeviceHandle) + Send + Sync + 'static,
    {
        self.on(EventKind::Connect, move |event| {
            if let DriverEvent::Connect { device } = event {
                callback(device.clone());
            }
        })
    }

    /// Register a callback for `disconnect`.
    pub fn on_disconnect<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on(EventKind::Disconnect, move |_| callback())
    }

    /// Register a callback for `battery`.
    pub fn on_battery<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(BatteryLevel) + Send + Sync + 'static,
    {
        self.on(EventKind::Battery, move |event| {
            if let DriverEvent::Battery { battery } = event {
                callback(*battery);
            }
        })
    }

    /// Register a callback for `temperature-change`.
    pub fn on_temperature_change<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(TemperatureReading) + Send + Sync + 'static,
    {
        self.on(EventKind::TemperatureChange, move |event| {
            if let DriverEvent::TemperatureChange(reading) = event {
                callback(*reading);
            }
        })
    }

    /// Get a receiver for all events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<DriverEvent> {
        self.publisher.subscribe_events()
    }
}

impl std::fmt::Debug for Thingy52Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Thingy52Driver")
            .field("state", &self.state())
            .field("device", &self.device().map(|d| d.id()))
            .finish_non_exhaustive()
    }
}
