use std::{
    sync::{Arc, Weak},
    time::Instant,
};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use shared::{
    domain::{Car, ConnectionState, Direction},
    error::FleetError,
    protocol::{decode_snapshot, CallBody, StatusResponse},
};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{info, warn};

pub mod calls;
pub mod config;
pub mod connection;
pub mod doors;
pub mod snapshot;
pub mod view;

pub use calls::{CallKey, CallRequestTracker, ClearPolicy, ClearReason};
pub use config::{load_settings, ClientSettings};
pub use view::{DoorCaption, FleetView};

use calls::validate_call;
use connection::ConnectionLifecycle;
use doors::DoorOverrideStore;
use snapshot::SnapshotStore;

const EVENT_CHANNEL_CAPACITY: usize = 1024;
const EXPIRY_SWEEP_PERIOD: std::time::Duration = std::time::Duration::from_millis(250);

#[derive(Debug, Clone)]
pub enum FleetEvent {
    ConnectionChanged(ConnectionState),
    SnapshotApplied {
        generation: u64,
    },
    CallPending {
        column: usize,
        floor: i64,
        direction: Direction,
    },
    CallCleared {
        column: usize,
        floor: i64,
        direction: Direction,
        reason: ClearReason,
    },
    Error(String),
}

/// The logical "send call / fetch status" capability. The facade only needs
/// this much of the backend; tests inject mocks here.
#[async_trait]
pub trait CallTransport: Send + Sync {
    async fn fetch_status(&self) -> Result<Vec<Car>>;
    async fn send_call(&self, floor: i64, direction: Direction) -> Result<()>;
}

/// REST transport against the real backend.
pub struct HttpCallTransport {
    http: Client,
    base_url: String,
}

impl HttpCallTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl CallTransport for HttpCallTransport {
    async fn fetch_status(&self) -> Result<Vec<Car>> {
        let response: StatusResponse = self
            .http
            .get(format!("{}/api/elevators/status", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.elevators)
    }

    async fn send_call(&self, floor: i64, direction: Direction) -> Result<()> {
        // Ack body is ignored beyond HTTP success.
        self.http
            .post(format!("{}/api/elevators/call", self.base_url))
            .json(&CallBody { floor, direction })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

struct FleetState {
    lifecycle: ConnectionLifecycle,
    snapshot: SnapshotStore,
    calls: CallRequestTracker,
    doors: DoorOverrideStore,
}

struct ChannelSession {
    ws_task: JoinHandle<()>,
}

/// Client facade over the three stores and the channel lifecycle. All store
/// mutations run under one mutex, so a snapshot application and a call
/// submission serialize the way a single event loop would.
pub struct FleetClient {
    settings: ClientSettings,
    transport: Arc<dyn CallTransport>,
    inner: Mutex<FleetState>,
    session: Mutex<Option<ChannelSession>>,
    sweeper: std::sync::Mutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<FleetEvent>,
}

impl FleetClient {
    pub fn new(settings: ClientSettings) -> Arc<Self> {
        let transport = Arc::new(HttpCallTransport::new(settings.api_base_url.clone()));
        Self::new_with_transport(settings, transport)
    }

    pub fn new_with_transport(
        settings: ClientSettings,
        transport: Arc<dyn CallTransport>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let call_timeout = settings.call_timeout;
        let client = Arc::new(Self {
            settings,
            transport,
            inner: Mutex::new(FleetState {
                lifecycle: ConnectionLifecycle::new(),
                snapshot: SnapshotStore::new(),
                calls: CallRequestTracker::new(call_timeout),
                doors: DoorOverrideStore::new(),
            }),
            session: Mutex::new(None),
            sweeper: std::sync::Mutex::new(None),
            events,
        });

        // The fallback timer must outlive any one channel session: a call
        // can go pending before connect() and after shutdown(), and with no
        // snapshots arriving only this sweeper can clear it.
        let weak = Arc::downgrade(&client);
        let sweeper = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(EXPIRY_SWEEP_PERIOD);
            loop {
                ticker.tick().await;
                let Some(client) = Weak::upgrade(&weak) else {
                    break;
                };
                let cleared = { client.inner.lock().await.calls.expire(Instant::now()) };
                client.emit_cleared(cleared);
            }
        });
        if let Ok(mut guard) = client.sweeper.lock() {
            *guard = Some(sweeper);
        }

        client
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<FleetEvent> {
        self.events.subscribe()
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.inner.lock().await.lifecycle.state().clone()
    }

    /// Dial a fresh realtime channel: initial status fetch, then WebSocket
    /// subscription. Safe to call again after a terminal state; the previous
    /// channel instance is torn down first.
    pub async fn connect(self: &Arc<Self>) -> Result<()> {
        self.settings.validate()?;
        self.shutdown().await;

        {
            let mut guard = self.inner.lock().await;
            guard.lifecycle = ConnectionLifecycle::new();
        }
        self.transition(ConnectionState::Connecting).await;

        // The fetch and the first push race; whichever snapshot arrives
        // later wins, so a fetch failure is non-fatal here.
        match self.transport.fetch_status().await {
            Ok(cars) => self.apply_snapshot(cars).await,
            Err(err) => {
                warn!(%err, "initial status fetch failed");
                let _ = self
                    .events
                    .send(FleetEvent::Error(format!("status fetch failed: {err}")));
            }
        }

        let ws_url = websocket_url(&self.settings.api_base_url)?;
        let (ws_stream, _) = match connect_async(&ws_url).await {
            Ok(connected) => connected,
            Err(err) => {
                let message = format!("websocket connect failed: {err}");
                self.transition(ConnectionState::Errored(message.clone()))
                    .await;
                return Err(anyhow!(message)).with_context(|| format!("dialing {ws_url}"));
            }
        };
        self.transition(ConnectionState::Connected).await;
        info!(%ws_url, "realtime channel connected");

        let client = Arc::clone(self);
        let ws_task = tokio::spawn(async move {
            let (_, mut reader) = ws_stream.split();
            let mut errored = false;
            while let Some(frame) = reader.next().await {
                match frame {
                    Ok(Message::Text(text)) => match decode_snapshot(&text) {
                        Ok(cars) => client.apply_snapshot(cars).await,
                        Err(err) => {
                            // Prior state is retained; only this frame is lost.
                            warn!(%err, "dropping malformed push");
                            let _ = client.events.send(FleetEvent::Error(err.to_string()));
                        }
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        client
                            .transition(ConnectionState::Errored(format!(
                                "websocket receive failed: {err}"
                            )))
                            .await;
                        errored = true;
                        break;
                    }
                }
            }
            if !errored {
                client.transition(ConnectionState::Disconnected).await;
            }
        });

        let previous = {
            let mut guard = self.session.lock().await;
            guard.replace(ChannelSession { ws_task })
        };
        if let Some(previous) = previous {
            previous.ws_task.abort();
        }

        Ok(())
    }

    /// Tear the channel down. The take() guarantees the underlying socket is
    /// closed exactly once no matter how often or from where this is called.
    pub async fn shutdown(&self) {
        let session = { self.session.lock().await.take() };
        if let Some(session) = session {
            session.ws_task.abort();
            self.transition(ConnectionState::Disconnected).await;
        }
    }

    /// Summon a car: validate, submit, then mark pending. A submission
    /// failure is logged and returned without marking anything pending, so
    /// no highlight can outlive a call the backend never saw. Buttons stay
    /// usable while disconnected; the submission simply fails fast.
    pub async fn request_call(
        &self,
        column: usize,
        floor: i64,
        direction: Direction,
    ) -> Result<(), FleetError> {
        validate_call(floor, direction, self.settings.floor_count)?;

        self.transport
            .send_call(floor, direction)
            .await
            .map_err(|err| {
                warn!(column, floor, %direction, %err, "call submission failed");
                FleetError::transport(err)
            })?;

        let key = CallKey {
            column,
            floor,
            direction,
        };
        let newly_pending = { self.inner.lock().await.calls.request(key, Instant::now()) };
        if newly_pending {
            info!(column, floor, %direction, "call pending");
            // A repeat press is an issued_at refresh, not a second highlight.
            let _ = self.events.send(FleetEvent::CallPending {
                column,
                floor,
                direction,
            });
        }
        Ok(())
    }

    pub async fn open_door(&self, column: usize, floor: i64) -> Result<(), FleetError> {
        self.set_door(column, floor, true).await
    }

    pub async fn close_door(&self, column: usize, floor: i64) -> Result<(), FleetError> {
        self.set_door(column, floor, false).await
    }

    async fn set_door(&self, column: usize, floor: i64, open: bool) -> Result<(), FleetError> {
        if !self.settings.door_overrides {
            return Err(FleetError::validation("door overrides are disabled"));
        }
        let mut guard = self.inner.lock().await;
        let at_floor = guard
            .snapshot
            .cars()
            .get(column)
            .is_some_and(|car| car.current_floor == floor);
        if !at_floor {
            return Err(FleetError::validation(format!(
                "car {column} is not stationed at floor {floor}"
            )));
        }
        guard.doors.set(column, floor, open);
        Ok(())
    }

    /// Derive the current display values from the stores.
    pub async fn view(&self) -> FleetView {
        let guard = self.inner.lock().await;
        view::derive(
            &guard.snapshot,
            &guard.calls,
            &guard.doors,
            guard.lifecycle.state(),
            &self.settings,
        )
    }

    /// Last-write-wins entry point shared by the initial fetch and every
    /// push: replace the snapshot wholesale, reconcile pending calls, prune
    /// stale door overrides.
    async fn apply_snapshot(&self, cars: Vec<Car>) {
        let (generation, cleared) = {
            let mut guard = self.inner.lock().await;
            let state = &mut *guard;
            let generation = state.snapshot.replace(cars);
            let cleared = state
                .calls
                .reconcile(state.snapshot.cars(), self.settings.clear_policy);
            state.doors.prune(state.snapshot.cars());
            (generation, cleared)
        };
        let _ = self.events.send(FleetEvent::SnapshotApplied { generation });
        self.emit_cleared(cleared);
    }

    async fn transition(&self, next: ConnectionState) {
        let changed = { self.inner.lock().await.lifecycle.transition(next) };
        if let Some(state) = changed {
            let _ = self.events.send(FleetEvent::ConnectionChanged(state));
        }
    }

    fn emit_cleared(&self, cleared: Vec<(CallKey, ClearReason)>) {
        for (key, reason) in cleared {
            info!(
                column = key.column,
                floor = key.floor,
                direction = %key.direction,
                ?reason,
                "call cleared"
            );
            let _ = self.events.send(FleetEvent::CallCleared {
                column: key.column,
                floor: key.floor,
                direction: key.direction,
                reason,
            });
        }
    }
}

impl Drop for FleetClient {
    fn drop(&mut self) {
        if let Ok(guard) = self.sweeper.get_mut() {
            if let Some(sweeper) = guard.take() {
                sweeper.abort();
            }
        }
    }
}

fn websocket_url(base_url: &str) -> Result<String> {
    if let Some(rest) = base_url.strip_prefix("https://") {
        Ok(format!("wss://{rest}"))
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        Ok(format!("ws://{rest}"))
    } else {
        Err(anyhow!(
            "api_base_url must start with http:// or https://, got '{base_url}'"
        ))
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
