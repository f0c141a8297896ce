//! BLE scanning functionality.
//!
//! [`BleScanner`] is the btleplug implementation of [`DeviceDiscovery`]. It
//! has no chooser UI: it scans for peripherals advertising the required
//! service and hands back the first one it sees.

use async_trait::async_trait;
use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::stream::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use crate::ble::gatt::BtleDevice;
use crate::ble::transport::{DeviceDiscovery, DeviceFilter, DeviceHandle};
use crate::error::{Error, Result};

/// Default time to wait for a matching peripheral.
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(10);

/// BLE scanner for discovering Thingy:52 devices.
pub struct BleScanner {
    /// The BLE adapter to use for scanning.
    adapter: Adapter,
    /// How long a single request may scan before giving up.
    scan_timeout: Duration,
}

impl BleScanner {
    /// Create a new BLE scanner on the first available adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available.
    pub async fn new() -> Result<Self> {
        let manager = Manager::new()
            .await
            .map_err(|_e| Error::BluetoothUnavailable)?;

        let adapters = manager.adapters().await.map_err(Error::Bluetooth)?;

        let adapter = adapters
            .into_iter()
            .next()
            .ok_or(Error::BluetoothUnavailable)?;

        info!(
            "Using Bluetooth adapter: {:?}",
            adapter.adapter_info().await.ok()
        );

        Ok(Self::with_adapter(adapter))
    }

    /// Create a new BLE scanner with a specific adapter.
    pub fn with_adapter(adapter: Adapter) -> Self {
        Self {
            adapter,
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
        }
    }

    /// Set how long a request scans before failing with
    /// [`Error::NoDeviceFound`].
    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    /// Get the underlying adapter.
    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    /// Wait for the first peripheral advertising the required service.
    async fn find_matching(&self, filter: &DeviceFilter) -> Result<Peripheral> {
        let mut events = self.adapter.events().await?;

        // Peripherals cached from an earlier scan never produce a new
        // DeviceDiscovered event.
        for peripheral in self.adapter.peripherals().await? {
            if Self::matches(&peripheral, filter).await {
                return Ok(peripheral);
            }
        }

        while let Some(event) = events.next().await {
            let id = match event {
                CentralEvent::DeviceDiscovered(id)
                | CentralEvent::DeviceUpdated(id)
                | CentralEvent::ServicesAdvertisement { id, .. } => id,
                _ => continue,
            };

            if let Some(peripheral) = self.lookup(&id).await {
                if Self::matches(&peripheral, filter).await {
                    return Ok(peripheral);
                }
            }
        }

        Err(Error::NoDeviceFound)
    }

    async fn lookup(&self, id: &PeripheralId) -> Option<Peripheral> {
        match self.adapter.peripheral(id).await {
            Ok(p) => Some(p),
            Err(e) => {
                trace!("Failed to get peripheral: {}", e);
                None
            }
        }
    }

    async fn matches(peripheral: &Peripheral, filter: &DeviceFilter) -> bool {
        match peripheral.properties().await {
            Ok(Some(properties)) => properties.services.contains(&filter.required_service),
            _ => false,
        }
    }
}

#[async_trait]
impl DeviceDiscovery for BleScanner {
    async fn request_device(&self, filter: &DeviceFilter) -> Result<DeviceHandle> {
        info!(
            "Scanning for devices advertising {} (timeout {:?})",
            filter.required_service, self.scan_timeout
        );

        self.adapter
            .start_scan(ScanFilter {
                services: vec![filter.required_service],
            })
            .await
            .map_err(Error::Bluetooth)?;

        let found = tokio::time::timeout(self.scan_timeout, self.find_matching(filter)).await;

        if let Err(e) = self.adapter.stop_scan().await {
            warn!("Failed to stop scan: {}", e);
        }

        let peripheral = match found {
            Ok(result) => result?,
            Err(_) => {
                debug!("Scan timed out after {:?}", self.scan_timeout);
                return Err(Error::NoDeviceFound);
            }
        };

        let name = peripheral
            .properties()
            .await
            .ok()
            .flatten()
            .and_then(|p| p.local_name);

        info!(
            "Found device {} ({})",
            peripheral.id(),
            name.as_deref().unwrap_or("unnamed")
        );

        Ok(Arc::new(BtleDevice::new(
            self.adapter.clone(),
            peripheral,
            name,
        )))
    }
}
