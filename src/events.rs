//! Driver events and the publisher that fans them out.
//!
//! Listeners register per [`EventKind`] and are called synchronously, in
//! registration order, from [`EventPublisher::publish`]. Every event is
//! also forwarded to a broadcast channel for async consumers.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;

use crate::ble::transport::DeviceHandle;
use crate::data::{BatteryLevel, TemperatureReading};

/// Callback handle for unregistering callbacks.
///
/// Dropping the handle unregisters the callback.
pub struct CallbackHandle {
    id: u64,
    unregister_fn: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl CallbackHandle {
    /// Create a new callback handle.
    pub(crate) fn new(id: u64, unregister_fn: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            id,
            unregister_fn: Some(Box::new(unregister_fn)),
        }
    }

    /// Unregister this callback.
    pub fn unregister(mut self) {
        if let Some(f) = self.unregister_fn.take() {
            f();
        }
    }

    /// Keep the callback registered for the lifetime of the publisher.
    pub fn detach(mut self) {
        self.unregister_fn.take();
    }

    /// Get the callback ID.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for CallbackHandle {
    fn drop(&mut self) {
        if let Some(f) = self.unregister_fn.take() {
            f();
        }
    }
}

impl std::fmt::Debug for CallbackHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// The kinds of event the driver emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A session was established.
    Connect,
    /// The session ended.
    Disconnect,
    /// New battery level.
    Battery,
    /// New temperature reading.
    TemperatureChange,
}

impl EventKind {
    /// All event kinds.
    pub const ALL: [EventKind; 4] = [
        Self::Connect,
        Self::Disconnect,
        Self::Battery,
        Self::TemperatureChange,
    ];

    /// Event name as exposed to consumers.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::Battery => "battery",
            Self::TemperatureChange => "temperature-change",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for EventKind {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| crate::error::Error::InvalidData {
                context: format!("Unknown event name '{}'", s),
            })
    }
}

/// An event emitted by the driver.
#[derive(Debug, Clone)]
pub enum DriverEvent {
    /// A session was established with `device`.
    Connect {
        /// The connected device.
        device: DeviceHandle,
    },
    /// The session ended, by request or because the peripheral went away.
    Disconnect,
    /// Battery level, from the initial read or a notification.
    Battery {
        /// Charge percentage.
        battery: BatteryLevel,
    },
    /// Temperature notification.
    TemperatureChange(TemperatureReading),
}

impl DriverEvent {
    /// The kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connect { .. } => EventKind::Connect,
            Self::Disconnect => EventKind::Disconnect,
            Self::Battery { .. } => EventKind::Battery,
            Self::TemperatureChange(_) => EventKind::TemperatureChange,
        }
    }
}

type Callback = Arc<dyn Fn(&DriverEvent) + Send + Sync>;

struct Listener {
    id: u64,
    kind: EventKind,
    callback: Callback,
}

/// Synchronous, multi-listener event dispatcher.
pub struct EventPublisher {
    /// Registered listeners in registration order.
    listeners: Arc<RwLock<Vec<Listener>>>,
    /// Callback ID counter.
    callback_counter: AtomicU64,
    /// Channel mirroring every published event.
    event_tx: broadcast::Sender<DriverEvent>,
}

impl EventPublisher {
    /// Create a publisher whose broadcast mirror buffers `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity.max(1));

        Self {
            listeners: Arc::new(RwLock::new(Vec::new())),
            callback_counter: AtomicU64::new(0),
            event_tx,
        }
    }

    /// Register `callback` for events of `kind`.
    pub fn subscribe<F>(&self, kind: EventKind, callback: F) -> CallbackHandle
    where
        F: Fn(&DriverEvent) + Send + Sync + 'static,
    {
        let id = self.callback_counter.fetch_add(1, Ordering::SeqCst);

        self.listeners.write().push(Listener {
            id,
            kind,
            callback: Arc::new(callback),
        });

        let listeners: Weak<RwLock<Vec<Listener>>> = Arc::downgrade(&self.listeners);
        CallbackHandle::new(id, move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners.write().retain(|l| l.id != id);
            }
        })
    }

    /// Get a receiver for every event published from now on.
    pub fn subscribe_events(&self) -> broadcast::Receiver<DriverEvent> {
        self.event_tx.subscribe()
    }

    /// Deliver `event` to every listener of its kind. Returns how many
    /// listeners were called.
    pub fn publish(&self, event: &DriverEvent) -> usize {
        let kind = event.kind();

        // Snapshot so callbacks may (un)register without deadlocking.
        let callbacks: Vec<Callback> = self
            .listeners
            .read()
            .iter()
            .filter(|l| l.kind == kind)
            .map(|l| l.callback.clone())
            .collect();

        for callback in &callbacks {
            callback(event);
        }

        let _ = self.event_tx.send(event.clone());

        callbacks.len()
    }

    /// Number of listeners registered for `kind`.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners
            .read()
            .iter()
            .filter(|l| l.kind == kind)
            .count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_EVENT_CAPACITY)
    }
}
