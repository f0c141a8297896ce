//! Per-characteristic notification subscriptions.
//!
//! [`subscribe`] walks service → characteristic on a live session, takes an
//! optional initial read, attaches the change listener and then enables
//! notifications. The result is a [`SensorSubscription`] that the connection
//! manager turns into a stream of decoded values.

use futures::future;
use futures::stream::{BoxStream, StreamExt};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::ble::transport::GattSession;
use crate::ble::uuids::*;
use crate::error::Result;

/// Decoder from a raw characteristic value to a typed reading.
pub type Decoder<T> = fn(&[u8]) -> Result<T>;

/// A (service, characteristic) pair on the peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SensorTarget {
    /// Primary service that owns the characteristic.
    pub service: Uuid,
    /// The characteristic carrying the sensor value.
    pub characteristic: Uuid,
}

impl SensorTarget {
    /// Weather-station temperature.
    pub const TEMPERATURE: Self = Self {
        service: WEATHER_STATION_SERVICE_UUID,
        characteristic: TEMPERATURE_CHARACTERISTIC_UUID,
    };

    /// Standard battery level.
    pub const BATTERY: Self = Self {
        service: BATTERY_SERVICE_UUID,
        characteristic: BATTERY_LEVEL_CHARACTERISTIC_UUID,
    };
}

/// Whether to read the characteristic once before relying on notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitialRead {
    /// Read and publish the current value straight away.
    Read,
    /// Wait for the first notification.
    Skip,
}

/// An active notification subscription on one characteristic.
pub struct SensorSubscription<T> {
    target: SensorTarget,
    initial: Option<T>,
    values: BoxStream<'static, Vec<u8>>,
    decode: Decoder<T>,
}

impl<T: Send + 'static> SensorSubscription<T> {
    /// The characteristic this subscription is bound to.
    pub fn target(&self) -> SensorTarget {
        self.target
    }

    /// Split into the initial value (if one was read) and a stream of
    /// decoded notifications.
    ///
    /// Payloads that fail to decode are logged and skipped.
    pub fn into_parts(self) -> (Option<T>, BoxStream<'static, T>) {
        let decode = self.decode;
        let characteristic = self.target.characteristic;

        let decoded = self
            .values
            .filter_map(move |raw| {
                let value = match decode(&raw) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        warn!(
                            "Dropping undecodable value from {}: {} ({:02X?})",
                            characteristic, e, raw
                        );
                        None
                    }
                };
                future::ready(value)
            })
            .boxed();

        (self.initial, decoded)
    }
}

/// Subscribe to value changes on `target`.
///
/// Listener registration happens before notifications are enabled, so no
/// value pushed right after enabling is lost.
///
/// # Errors
///
/// [`Error::ServiceNotFound`](crate::Error::ServiceNotFound) or
/// [`Error::CharacteristicNotFound`](crate::Error::CharacteristicNotFound)
/// when the profile does not match, and any transport or decode error from
/// the initial read or from enabling notifications.
pub async fn subscribe<T: Send + 'static>(
    session: &dyn GattSession,
    target: SensorTarget,
    initial_read: InitialRead,
    decode: Decoder<T>,
) -> Result<SensorSubscription<T>> {
    debug!(
        "Subscribing to {} on service {}",
        target.characteristic, target.service
    );

    let service = session.primary_service(target.service).await?;
    let characteristic = service.characteristic(target.characteristic).await?;

    let initial = match initial_read {
        InitialRead::Read => {
            let raw = characteristic.read_value().await?;
            trace!("Initial value of {}: {:02X?}", target.characteristic, raw);
            Some(decode(&raw)?)
        }
        InitialRead::Skip => None,
    };

    let values = characteristic.value_changes().await?;
    characteristic.start_notifications().await?;

    debug!("Notifications enabled on {}", target.characteristic);

    Ok(SensorSubscription {
        target,
        initial,
        values,
        decode,
    })
}
