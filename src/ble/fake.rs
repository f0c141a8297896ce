//! In-memory peripheral used by the unit tests.

use async_trait::async_trait;
use futures::channel::{mpsc, oneshot};
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{BoxStream, StreamExt};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::ble::transport::{BleDevice, GattCharacteristic, GattService, GattSession};
use crate::ble::uuids::*;
use crate::error::{Error, Result};

struct CharacteristicState {
    uuid: Uuid,
    value: Mutex<Vec<u8>>,
    listeners: Mutex<Vec<mpsc::UnboundedSender<Vec<u8>>>>,
    notifying: AtomicBool,
    reads: AtomicUsize,
    fail_reads: AtomicBool,
}

#[derive(Clone)]
pub(crate) struct FakeCharacteristic(Arc<CharacteristicState>);

impl FakeCharacteristic {
    fn new(uuid: Uuid, value: Vec<u8>) -> Self {
        Self(Arc::new(CharacteristicState {
            uuid,
            value: Mutex::new(value),
            listeners: Mutex::new(Vec::new()),
            notifying: AtomicBool::new(false),
            reads: AtomicUsize::new(0),
            fail_reads: AtomicBool::new(false),
        }))
    }

    /// Push a value the way the radio would; silent until notifications are on.
    fn push(&self, data: &[u8]) {
        *self.0.value.lock() = data.to_vec();
        if !self.0.notifying.load(Ordering::SeqCst) {
            return;
        }
        self.0
            .listeners
            .lock()
            .retain(|tx| tx.unbounded_send(data.to_vec()).is_ok());
    }
}

#[async_trait]
impl GattCharacteristic for FakeCharacteristic {
    fn uuid(&self) -> Uuid {
        self.0.uuid
    }

    async fn read_value(&self) -> Result<Vec<u8>> {
        self.0.reads.fetch_add(1, Ordering::SeqCst);
        if self.0.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::LinkError {
                reason: "read failed".to_string(),
            });
        }
        Ok(self.0.value.lock().clone())
    }

    async fn start_notifications(&self) -> Result<()> {
        self.0.notifying.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn value_changes(&self) -> Result<BoxStream<'static, Vec<u8>>> {
        let (tx, rx) = mpsc::unbounded();
        self.0.listeners.lock().push(tx);
        Ok(rx.boxed())
    }
}

struct FakeService {
    uuid: Uuid,
    characteristics: Vec<FakeCharacteristic>,
}

#[async_trait]
impl GattService for FakeService {
    fn uuid(&self) -> Uuid {
        self.uuid
    }

    async fn characteristic(&self, uuid: Uuid) -> Result<Box<dyn GattCharacteristic>> {
        self.characteristics
            .iter()
            .find(|c| c.uuid() == uuid)
            .cloned()
            .map(|c| Box::new(c) as Box<dyn GattCharacteristic>)
            .ok_or_else(|| Error::CharacteristicNotFound {
                uuid: uuid.to_string(),
            })
    }
}

struct PeripheralState {
    id: String,
    temperature: FakeCharacteristic,
    battery: FakeCharacteristic,
    has_weather_station: AtomicBool,
    has_temperature_characteristic: AtomicBool,
    has_battery: AtomicBool,
    link_fails: AtomicBool,
    drops_during_connect: AtomicBool,
    connect_gate: Mutex<Option<Arc<Notify>>>,
    connect_attempts: AtomicUsize,
    connects: AtomicUsize,
    link_closes: AtomicUsize,
    drop_signals: Mutex<Vec<oneshot::Sender<()>>>,
}

/// A scriptable Thingy-like peripheral.
#[derive(Clone)]
pub(crate) struct FakePeripheral(Arc<PeripheralState>);

impl FakePeripheral {
    /// A peripheral with the full weather-station and battery profile.
    pub(crate) fn thingy() -> Self {
        Self::named("thingy-1")
    }

    pub(crate) fn named(id: &str) -> Self {
        Self(Arc::new(PeripheralState {
            id: id.to_string(),
            temperature: FakeCharacteristic::new(TEMPERATURE_CHARACTERISTIC_UUID, vec![0, 0]),
            battery: FakeCharacteristic::new(BATTERY_LEVEL_CHARACTERISTIC_UUID, vec![100]),
            has_weather_station: AtomicBool::new(true),
            has_temperature_characteristic: AtomicBool::new(true),
            has_battery: AtomicBool::new(true),
            link_fails: AtomicBool::new(false),
            drops_during_connect: AtomicBool::new(false),
            connect_gate: Mutex::new(None),
            connect_attempts: AtomicUsize::new(0),
            connects: AtomicUsize::new(0),
            link_closes: AtomicUsize::new(0),
            drop_signals: Mutex::new(Vec::new()),
        }))
    }

    pub(crate) fn with_battery_level(self, level: u8) -> Self {
        *self.0.battery.0.value.lock() = vec![level];
        self
    }

    pub(crate) fn without_battery(self) -> Self {
        self.0.has_battery.store(false, Ordering::SeqCst);
        self
    }

    pub(crate) fn with_failing_battery_read(self) -> Self {
        self.0.battery.0.fail_reads.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn without_weather_station(self) -> Self {
        self.0.has_weather_station.store(false, Ordering::SeqCst);
        self
    }

    pub(crate) fn without_temperature_characteristic(self) -> Self {
        self.0
            .has_temperature_characteristic
            .store(false, Ordering::SeqCst);
        self
    }

    pub(crate) fn with_failing_link(self) -> Self {
        self.0.link_fails.store(true, Ordering::SeqCst);
        self
    }

    /// Lose the link right as `connect()` completes.
    pub(crate) fn with_link_drop_during_connect(self) -> Self {
        self.0.drops_during_connect.store(true, Ordering::SeqCst);
        self
    }

    /// Make `connect()` wait until [`release_connect`](Self::release_connect).
    pub(crate) fn with_paused_connect(self) -> Self {
        *self.0.connect_gate.lock() = Some(Arc::new(Notify::new()));
        self
    }

    pub(crate) fn release_connect(&self) {
        if let Some(gate) = self.0.connect_gate.lock().as_ref() {
            gate.notify_one();
        }
    }

    pub(crate) fn push_temperature(&self, data: &[u8]) {
        self.0.temperature.push(data);
    }

    pub(crate) fn push_battery(&self, data: &[u8]) {
        self.0.battery.push(data);
    }

    /// Simulate the peripheral going out of range.
    pub(crate) fn drop_link(&self) {
        for tx in self.0.drop_signals.lock().drain(..) {
            let _ = tx.send(());
        }
    }

    pub(crate) fn temperature_reads(&self) -> usize {
        self.0.temperature.0.reads.load(Ordering::SeqCst)
    }

    pub(crate) fn temperature_notifying(&self) -> bool {
        self.0.temperature.0.notifying.load(Ordering::SeqCst)
    }

    pub(crate) fn battery_notifying(&self) -> bool {
        self.0.battery.0.notifying.load(Ordering::SeqCst)
    }

    /// Calls to `connect()`, including ones still waiting on the gate.
    pub(crate) fn connect_attempts(&self) -> usize {
        self.0.connect_attempts.load(Ordering::SeqCst)
    }

    pub(crate) fn connects(&self) -> usize {
        self.0.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn link_closes(&self) -> usize {
        self.0.link_closes.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for FakePeripheral {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakePeripheral")
            .field("id", &self.0.id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl BleDevice for FakePeripheral {
    fn id(&self) -> String {
        self.0.id.clone()
    }

    fn name(&self) -> Option<String> {
        Some("Thingy".to_string())
    }

    async fn disconnect_signal(&self) -> Result<BoxFuture<'static, ()>> {
        let (tx, rx) = oneshot::channel();
        self.0.drop_signals.lock().push(tx);
        Ok(rx.map(|_| ()).boxed())
    }

    async fn connect(&self) -> Result<Box<dyn GattSession>> {
        self.0.connect_attempts.fetch_add(1, Ordering::SeqCst);

        let gate = self.0.connect_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.0.connects.fetch_add(1, Ordering::SeqCst);

        if self.0.link_fails.load(Ordering::SeqCst) {
            return Err(Error::LinkError {
                reason: "peripheral unreachable".to_string(),
            });
        }

        if self.0.drops_during_connect.load(Ordering::SeqCst) {
            self.drop_link();
        }

        Ok(Box::new(FakeSession(self.clone())))
    }
}

struct FakeSession(FakePeripheral);

#[async_trait]
impl GattSession for FakeSession {
    async fn primary_service(&self, uuid: Uuid) -> Result<Box<dyn GattService>> {
        let state = &(self.0).0;

        let service = if uuid == WEATHER_STATION_SERVICE_UUID
            && state.has_weather_station.load(Ordering::SeqCst)
        {
            let mut characteristics = Vec::new();
            if state.has_temperature_characteristic.load(Ordering::SeqCst) {
                characteristics.push(state.temperature.clone());
            }
            Some(FakeService {
                uuid,
                characteristics,
            })
        } else if uuid == BATTERY_SERVICE_UUID && state.has_battery.load(Ordering::SeqCst) {
            Some(FakeService {
                uuid,
                characteristics: vec![state.battery.clone()],
            })
        } else {
            None
        };

        service
            .map(|s| Box::new(s) as Box<dyn GattService>)
            .ok_or_else(|| Error::ServiceNotFound {
                uuid: uuid.to_string(),
            })
    }

    async fn disconnect(&self) -> Result<()> {
        (self.0).0.link_closes.fetch_add(1, Ordering::SeqCst);
        // A real adapter reports our own disconnects as well.
        self.0.drop_link();
        Ok(())
    }
}

/// Poll `condition` until it holds, failing after one second.
pub(crate) async fn eventually(condition: impl Fn() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(1), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;

    assert!(waited.is_ok(), "condition not met within 1s");
}
