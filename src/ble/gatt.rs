//! btleplug implementations of the GATT transport traits.

use async_trait::async_trait;
use btleplug::api::{Central, CentralEvent, Characteristic, Peripheral as _, Service};
use btleplug::platform::{Adapter, Peripheral};
use futures::future::{self, BoxFuture, FutureExt};
use futures::stream::{BoxStream, Stream, StreamExt};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::ble::transport::{BleDevice, GattCharacteristic, GattService, GattSession};
use crate::error::{Error, Result};

/// A peripheral found by btleplug.
#[derive(Clone)]
pub struct BtleDevice {
    /// Adapter the peripheral was found on; needed for disconnect events.
    adapter: Adapter,
    peripheral: Peripheral,
    name: Option<String>,
}

impl BtleDevice {
    /// Wrap a peripheral discovered on `adapter`.
    pub fn new(adapter: Adapter, peripheral: Peripheral, name: Option<String>) -> Self {
        Self {
            adapter,
            peripheral,
            name,
        }
    }

    /// Get the underlying peripheral.
    pub fn peripheral(&self) -> &Peripheral {
        &self.peripheral
    }
}

impl std::fmt::Debug for BtleDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BtleDevice")
            .field("id", &self.peripheral.id())
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl BleDevice for BtleDevice {
    fn id(&self) -> String {
        self.peripheral.id().to_string()
    }

    fn name(&self) -> Option<String> {
        self.name.clone()
    }

    async fn connect(&self) -> Result<Box<dyn GattSession>> {
        if self.peripheral.is_connected().await.unwrap_or(false) {
            info!("Peripheral already connected at BLE level");
        } else {
            self.peripheral
                .connect()
                .await
                .map_err(|e| Error::LinkError {
                    reason: e.to_string(),
                })?;
        }

        self.peripheral
            .discover_services()
            .await
            .map_err(|e| Error::LinkError {
                reason: format!("Service discovery failed: {}", e),
            })?;

        debug!(
            "Discovered {} services on {}",
            self.peripheral.services().len(),
            self.id()
        );

        Ok(Box::new(BtleSession {
            peripheral: self.peripheral.clone(),
        }))
    }

    async fn disconnect_signal(&self) -> Result<BoxFuture<'static, ()>> {
        let events = self.adapter.events().await?;
        let id = self.peripheral.id();
        let watched = id.clone();

        Ok(async move {
            first_matching(events, move |event| {
                matches!(event, CentralEvent::DeviceDisconnected(d) if *d == watched)
            })
            .await;
            debug!("Peripheral {} dropped the link", id);
        }
        .boxed())
    }
}

/// Resolve on the first item of `events` accepted by `is_match`.
///
/// If the stream ends first this never resolves: a closed event stream says
/// nothing about the link.
async fn first_matching<S, F>(mut events: S, is_match: F)
where
    S: Stream + Unpin,
    F: Fn(&S::Item) -> bool,
{
    while let Some(event) = events.next().await {
        if is_match(&event) {
            return;
        }
    }

    warn!("Adapter event stream ended, link loss is no longer observable");
    future::pending::<()>().await
}

/// GATT session on a connected btleplug peripheral.
pub struct BtleSession {
    peripheral: Peripheral,
}

#[async_trait]
impl GattSession for BtleSession {
    async fn primary_service(&self, uuid: Uuid) -> Result<Box<dyn GattService>> {
        let service = self
            .peripheral
            .services()
            .into_iter()
            .find(|s| s.uuid == uuid)
            .ok_or_else(|| {
                debug!("Service {} NOT found in discovered services", uuid);
                Error::ServiceNotFound {
                    uuid: uuid.to_string(),
                }
            })?;

        if !service.primary {
            debug!("Service {} is not flagged primary, using it anyway", uuid);
        }

        Ok(Box::new(BtleService {
            peripheral: self.peripheral.clone(),
            service,
        }))
    }

    async fn disconnect(&self) -> Result<()> {
        self.peripheral.disconnect().await?;
        info!("Successfully disconnected from {}", self.peripheral.id());
        Ok(())
    }
}

/// A discovered service on a btleplug peripheral.
pub struct BtleService {
    peripheral: Peripheral,
    service: Service,
}

#[async_trait]
impl GattService for BtleService {
    fn uuid(&self) -> Uuid {
        self.service.uuid
    }

    async fn characteristic(&self, uuid: Uuid) -> Result<Box<dyn GattCharacteristic>> {
        let characteristic = self
            .service
            .characteristics
            .iter()
            .find(|c| c.uuid == uuid)
            .cloned()
            .ok_or_else(|| {
                for c in &self.service.characteristics {
                    debug!("  Available characteristic: {}", c.uuid);
                }
                Error::CharacteristicNotFound {
                    uuid: uuid.to_string(),
                }
            })?;

        debug!(
            "Found characteristic {}, properties: {:?}",
            uuid, characteristic.properties
        );

        Ok(Box::new(BtleCharacteristic {
            peripheral: self.peripheral.clone(),
            characteristic,
        }))
    }
}

/// A characteristic on a btleplug peripheral.
pub struct BtleCharacteristic {
    peripheral: Peripheral,
    characteristic: Characteristic,
}

#[async_trait]
impl GattCharacteristic for BtleCharacteristic {
    fn uuid(&self) -> Uuid {
        self.characteristic.uuid
    }

    async fn read_value(&self) -> Result<Vec<u8>> {
        let data = self.peripheral.read(&self.characteristic).await?;
        trace!(
            "Read {} bytes from characteristic {}",
            data.len(),
            self.characteristic.uuid
        );
        Ok(data)
    }

    async fn start_notifications(&self) -> Result<()> {
        self.peripheral.subscribe(&self.characteristic).await?;
        debug!(
            "Successfully subscribed to notifications from {}",
            self.characteristic.uuid
        );
        Ok(())
    }

    async fn value_changes(&self) -> Result<BoxStream<'static, Vec<u8>>> {
        let uuid = self.characteristic.uuid;
        let notifications = self.peripheral.notifications().await?;

        Ok(notifications
            .filter_map(move |n| async move {
                if n.uuid == uuid {
                    trace!("Notification from {}: {:02X?}", uuid, n.value);
                    Some(n.value)
                } else {
                    None
                }
            })
            .boxed())
    }
}
