//! BLE connection management.
//!
//! [`ConnectionManager`] owns the single device handle and GATT session,
//! wires up the sensor subscriptions and turns link loss into lifecycle
//! events.
//!
//! Every session setup attempt and every [`ConnectionManager::disconnect`]
//! bumps a generation counter. A setup that finds its generation stale after
//! a suspension point gives up with [`Error::Cancelled`]; notification
//! values tagged with a generation other than the live session's are
//! discarded before they reach listeners.

use futures::future::BoxFuture;
use futures::stream::{BoxStream, StreamExt};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::ble::subscriber::{subscribe, InitialRead, SensorTarget};
use crate::ble::transport::{DeviceHandle, GattSession};
use crate::data::{decode_battery, decode_temperature};
use crate::error::{Error, Result};
use crate::events::{DriverEvent, EventPublisher};

/// Connection state of the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No session.
    #[default]
    Disconnected,
    /// A session is open and the temperature subscription is live.
    Connected,
}

impl ConnectionState {
    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}

/// Work item for the dispatcher.
enum Dispatch {
    /// `connect` / `disconnect`; always delivered.
    Lifecycle(DriverEvent),
    /// A sensor value; delivered only while its session is still live.
    Sensor { generation: u64, event: DriverEvent },
}

struct ActiveSession {
    generation: u64,
    device: DeviceHandle,
    session: Arc<dyn GattSession>,
    tasks: Vec<JoinHandle<()>>,
}

/// Why a best-effort feature was skipped.
#[derive(Debug, Clone)]
struct OptionalFailure {
    feature: &'static str,
    reason: String,
}

struct Shared {
    active: Mutex<Option<ActiveSession>>,
    generation: AtomicU64,
    publisher: Arc<EventPublisher>,
    dispatch_tx: mpsc::UnboundedSender<Dispatch>,
    /// Held while delivering, which keeps listener calls serialized.
    dispatch_rx: Mutex<mpsc::UnboundedReceiver<Dispatch>>,
    dispatch_wake: Notify,
    /// Link closes still running in the background.
    closing: Mutex<Vec<JoinHandle<()>>>,
    last_optional_failure: RwLock<Option<OptionalFailure>>,
}

impl Shared {
    fn active_generation(&self) -> Option<u64> {
        self.active.lock().as_ref().map(|s| s.generation)
    }

    fn dispatch(&self, item: Dispatch) {
        if self.dispatch_tx.send(item).is_err() {
            debug!("Dispatch queue closed, dropping event");
            return;
        }
        self.dispatch_wake.notify_one();
    }

    /// Publish everything queued so far. Returns how many events went out.
    fn deliver_pending(&self) -> usize {
        let mut rx = self.dispatch_rx.lock();
        let mut delivered = 0;

        while let Ok(item) = rx.try_recv() {
            match item {
                Dispatch::Lifecycle(event) => {
                    self.publisher.publish(&event);
                    delivered += 1;
                }
                Dispatch::Sensor { generation, event } => {
                    if self.active_generation() == Some(generation) {
                        self.publisher.publish(&event);
                        delivered += 1;
                    } else {
                        trace!("Discarding {} from stale session {}", event.kind(), generation);
                    }
                }
            }
        }

        delivered
    }

    /// End the live session, if any (and if it is `only`, when given).
    ///
    /// Queues exactly one `disconnect` per session. Returns whether a
    /// session was ended.
    fn end_session(&self, only: Option<u64>, close_link: bool) -> bool {
        let ended = {
            let mut active = self.active.lock();
            let matches = match active.as_ref() {
                Some(session) => only.map_or(true, |g| g == session.generation),
                None => false,
            };
            if !matches {
                return false;
            }
            // Queue while locked so a following connect cannot overtake it.
            self.dispatch(Dispatch::Lifecycle(DriverEvent::Disconnect));
            active.take()
        };

        let Some(ended) = ended else {
            return false;
        };

        info!(
            "Session {} with {} ended",
            ended.generation,
            ended.device.id()
        );

        for task in ended.tasks {
            task.abort();
        }

        if close_link {
            if let Some(handle) = close_in_background(ended.session) {
                let mut closing = self.closing.lock();
                closing.retain(|h| !h.is_finished());
                closing.push(handle);
            }
        }

        true
    }
}

/// Owns the device connection and its sensor subscriptions.
pub struct ConnectionManager {
    shared: Arc<Shared>,
    /// Task draining the dispatch queue into the publisher.
    dispatcher: JoinHandle<()>,
}

impl ConnectionManager {
    /// Create a connection manager publishing through `publisher`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(publisher: Arc<EventPublisher>) -> Self {
        let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            active: Mutex::new(None),
            generation: AtomicU64::new(0),
            publisher,
            dispatch_tx,
            dispatch_rx: Mutex::new(dispatch_rx),
            dispatch_wake: Notify::new(),
            closing: Mutex::new(Vec::new()),
            last_optional_failure: RwLock::new(None),
        });

        let dispatcher = tokio::spawn(run_dispatcher(shared.clone()));

        Self { shared, dispatcher }
    }

    /// Get the current connection state.
    pub fn state(&self) -> ConnectionState {
        if self.shared.active.lock().is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// The connected device, if any.
    pub fn device(&self) -> Option<DeviceHandle> {
        self.shared.active.lock().as_ref().map(|s| s.device.clone())
    }

    /// The most recent best-effort feature that could not be enabled.
    ///
    /// Cleared whenever a new session is established.
    pub fn last_optional_failure(&self) -> Option<Error> {
        self.shared
            .last_optional_failure
            .read()
            .as_ref()
            .map(|f| Error::OptionalFeatureUnavailable {
                feature: f.feature.to_string(),
                reason: f.reason.clone(),
            })
    }

    /// Open a session on `device`, replacing any current one.
    ///
    /// The previous link is fully closed before the new one is attempted.
    /// `connect` is published only after the temperature subscription is
    /// in place. Battery is best effort.
    ///
    /// # Errors
    ///
    /// Link, profile and transport errors from session setup or the
    /// temperature subscription; [`Error::Cancelled`] if
    /// [`disconnect`](Self::disconnect) or another `open_session` ran while
    /// this one was suspended. No events are emitted for a failed attempt.
    pub async fn open_session(&self, device: DeviceHandle) -> Result<()> {
        // New connection always wins.
        self.disconnect();
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;

        // The new device may be the same peripheral as the old one.
        self.finish_closing().await;
        self.check_current(generation)?;

        info!("Opening session {} with {}", generation, device.id());

        // Watch before connecting so a drop during setup is not missed.
        let link_lost = device.disconnect_signal().await?;
        self.check_current(generation)?;

        let session: Arc<dyn GattSession> = Arc::from(device.connect().await?);
        self.ensure_current(generation, &session).await?;

        let temperature = match subscribe(
            session.as_ref(),
            SensorTarget::TEMPERATURE,
            InitialRead::Skip,
            decode_temperature,
        )
        .await
        {
            Ok(subscription) => subscription,
            Err(e) => {
                warn!("Temperature subscription failed: {}", e);
                close_now(&session).await;
                return Err(e);
            }
        };
        self.ensure_current(generation, &session).await?;

        let committed = {
            let mut active = self.shared.active.lock();

            if self.shared.generation.load(Ordering::SeqCst) == generation {
                *self.shared.last_optional_failure.write() = None;

                let (_, readings) = temperature.into_parts();
                let tasks = vec![
                    spawn_watcher(self.shared.clone(), generation, link_lost),
                    spawn_forwarder(
                        self.shared.clone(),
                        generation,
                        readings,
                        DriverEvent::TemperatureChange,
                    ),
                ];

                // Queue connect before any task gets a chance to queue a value.
                self.shared.dispatch(Dispatch::Lifecycle(DriverEvent::Connect {
                    device: device.clone(),
                }));

                *active = Some(ActiveSession {
                    generation,
                    device: device.clone(),
                    session: session.clone(),
                    tasks,
                });
                true
            } else {
                false
            }
        };

        if !committed {
            close_now(&session).await;
            return Err(Error::Cancelled);
        }

        info!("Connected to {}", device.id());

        self.start_battery(generation, session.as_ref()).await;

        Ok(())
    }

    /// Close the current session.
    ///
    /// Idempotent and infallible. Emits one `disconnect` if a session was
    /// open, nothing otherwise. Also cancels a setup still in progress. The
    /// radio link closes in the background; the next
    /// [`open_session`](Self::open_session) waits for it.
    pub fn disconnect(&self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);

        if !self.shared.end_session(None, true) {
            trace!("disconnect() with no active session");
        }
    }

    async fn start_battery(&self, generation: u64, session: &dyn GattSession) {
        // Some host stacks cannot reach 16-bit services; carry on without.
        let subscription = match subscribe(
            session,
            SensorTarget::BATTERY,
            InitialRead::Read,
            decode_battery,
        )
        .await
        {
            Ok(subscription) => subscription,
            Err(e) => {
                if e.is_profile_mismatch() {
                    warn!("Battery service not reachable on this host: {}", e);
                } else {
                    warn!("Battery subscription failed: {}", e);
                }
                if self.shared.active_generation() == Some(generation) {
                    *self.shared.last_optional_failure.write() = Some(OptionalFailure {
                        feature: "battery",
                        reason: e.to_string(),
                    });
                }
                return;
            }
        };

        let mut active = self.shared.active.lock();
        let Some(live) = active.as_mut().filter(|s| s.generation == generation) else {
            debug!("Session {} ended before battery was ready", generation);
            return;
        };

        let (initial, levels) = subscription.into_parts();
        if let Some(battery) = initial {
            self.shared.dispatch(Dispatch::Sensor {
                generation,
                event: DriverEvent::Battery { battery },
            });
        }

        live.tasks.push(spawn_forwarder(
            self.shared.clone(),
            generation,
            levels,
            |battery| DriverEvent::Battery { battery },
        ));
    }

    async fn finish_closing(&self) {
        let pending = std::mem::take(&mut *self.shared.closing.lock());

        for handle in pending {
            if let Err(e) = handle.await {
                debug!("Background link close did not finish: {}", e);
            }
        }
    }

    fn check_current(&self, generation: u64) -> Result<()> {
        if self.shared.generation.load(Ordering::SeqCst) == generation {
            Ok(())
        } else {
            debug!("Session setup {} superseded", generation);
            Err(Error::Cancelled)
        }
    }

    async fn ensure_current(&self, generation: u64, session: &Arc<dyn GattSession>) -> Result<()> {
        if let Err(e) = self.check_current(generation) {
            close_now(session).await;
            return Err(e);
        }
        Ok(())
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.disconnect();
        // The dispatcher gets no further turn; flush the final disconnect here.
        self.shared.deliver_pending();
        self.dispatcher.abort();
    }
}

async fn run_dispatcher(shared: Arc<Shared>) {
    debug!("Event dispatcher started");

    loop {
        shared.deliver_pending();
        shared.dispatch_wake.notified().await;
    }
}

fn spawn_forwarder<T: Send + 'static>(
    shared: Arc<Shared>,
    generation: u64,
    mut values: BoxStream<'static, T>,
    to_event: fn(T) -> DriverEvent,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(value) = values.next().await {
            shared.dispatch(Dispatch::Sensor {
                generation,
                event: to_event(value),
            });
        }
        debug!("Notification stream for session {} ended", generation);
    })
}

fn spawn_watcher(
    shared: Arc<Shared>,
    generation: u64,
    link_lost: BoxFuture<'static, ()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        link_lost.await;
        if shared.end_session(Some(generation), false) {
            info!("Peripheral closed session {}", generation);
        }
    })
}

async fn close_now(session: &Arc<dyn GattSession>) {
    if let Err(e) = session.disconnect().await {
        warn!("Failed to disconnect: {}", e);
    }
}

fn close_in_background(session: Arc<dyn GattSession>) -> Option<JoinHandle<()>> {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => Some(handle.spawn(async move {
            close_now(&session).await;
        })),
        Err(_) => {
            warn!("No Tokio runtime, leaving link for the platform to close");
            None
        }
    }
}
