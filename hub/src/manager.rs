use crate::connection::{Client, ClientId, ClientRegistry};
use crate::error::Error;
use crate::message::{EventType, Message};
use chrono::{DateTime, Utc};
use log::*;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant, MissedTickBehavior};

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_BROADCAST_BUFFER: usize = 256;
pub const DEFAULT_CLIENT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct HubConfig {
    /// How often a heartbeat is broadcast to every client
    pub heartbeat_interval: Duration,
    /// Capacity of the channel feeding broadcasts into the event loop
    pub broadcast_buffer: usize,
    /// Capacity of each client's outbound queue
    pub client_queue_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            broadcast_buffer: DEFAULT_BROADCAST_BUFFER,
            client_queue_capacity: DEFAULT_CLIENT_QUEUE_CAPACITY,
        }
    }
}

/// Point-in-time view of the hub.
#[derive(Debug, Clone, Serialize)]
pub struct HubStats {
    pub total_clients: usize,
    pub timestamp: DateTime<Utc>,
}

struct Registration {
    client: Client,
    ack: oneshot::Sender<Result<(), Error>>,
}

/// Handle to the notification hub.
///
/// Cloning is cheap; every clone talks to the same event loop. The loop runs
/// until `shutdown` is called or every handle has been dropped.
#[derive(Clone)]
pub struct Hub {
    registry: Arc<ClientRegistry>,
    running: Arc<AtomicBool>,
    register_tx: mpsc::Sender<Registration>,
    unregister_tx: mpsc::UnboundedSender<ClientId>,
    broadcast_tx: mpsc::Sender<Message>,
    shutdown_tx: mpsc::Sender<oneshot::Sender<()>>,
    config: HubConfig,
}

impl Hub {
    /// Starts the hub's event loop on the current tokio runtime.
    pub fn spawn(config: HubConfig) -> Self {
        let registry = Arc::new(ClientRegistry::new());
        let running = Arc::new(AtomicBool::new(true));
        let (register_tx, register_rx) = mpsc::channel(16);
        let (unregister_tx, unregister_rx) = mpsc::unbounded_channel();
        let (broadcast_tx, broadcast_rx) = mpsc::channel(config.broadcast_buffer.max(1));
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let event_loop = EventLoop {
            registry: Arc::clone(&registry),
            running: Arc::clone(&running),
            register_rx,
            unregister_rx,
            broadcast_rx,
            shutdown_rx,
            heartbeat_interval: config.heartbeat_interval,
        };
        tokio::spawn(event_loop.run());

        Self {
            registry,
            running,
            register_tx,
            unregister_tx,
            broadcast_tx,
            shutdown_tx,
            config,
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Creates a client sized by this hub's queue capacity.
    pub fn new_client(&self) -> (Client, crate::connection::Connection) {
        Client::new(self.config.client_queue_capacity)
    }

    /// Registers a client. Returns once the event loop has added it and
    /// enqueued its `welcome` message, so anything broadcast afterwards is
    /// queued behind the welcome.
    pub async fn register(&self, client: Client) -> Result<(), Error> {
        if !self.is_running() {
            return Err(Error::Closed);
        }

        let (ack, ack_rx) = oneshot::channel();
        self.register_tx
            .send(Registration { client, ack })
            .await
            .map_err(|_| Error::Closed)?;

        ack_rx.await.unwrap_or(Err(Error::Closed))
    }

    /// Removes a client. Unknown or already removed clients are ignored.
    pub fn unregister(&self, id: &ClientId) {
        if self.unregister_tx.send(id.clone()).is_err() {
            debug!("Hub closed, ignoring unregister of {id}");
        }
    }

    /// Queues a message for delivery to every registered client.
    pub async fn broadcast_message(&self, message: Message) -> Result<(), Error> {
        if !self.is_running() {
            return Err(Error::Closed);
        }

        self.broadcast_tx
            .send(message)
            .await
            .map_err(|_| Error::Closed)
    }

    pub fn stats(&self) -> HubStats {
        HubStats {
            total_clients: self.registry.len(),
            timestamp: Utc::now(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Sends `shutdown` to every client, closes every transport and empties
    /// the registry. Runs to completion; calling it again is a no-op.
    pub async fn shutdown(&self) {
        let (ack, ack_rx) = oneshot::channel();
        if self.shutdown_tx.send(ack).await.is_err() {
            return;
        }
        let _ = ack_rx.await;
    }
}

struct EventLoop {
    registry: Arc<ClientRegistry>,
    running: Arc<AtomicBool>,
    register_rx: mpsc::Receiver<Registration>,
    unregister_rx: mpsc::UnboundedReceiver<ClientId>,
    broadcast_rx: mpsc::Receiver<Message>,
    shutdown_rx: mpsc::Receiver<oneshot::Sender<()>>,
    heartbeat_interval: Duration,
}

impl EventLoop {
    async fn run(mut self) {
        let period = self.heartbeat_interval;
        let mut heartbeat = time::interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Notification hub started");

        loop {
            // One event per iteration. Shutdown outranks everything else.
            // Queued broadcasts are fanned out before a pending registration
            // so a client never receives a message sent before it joined.
            tokio::select! {
                biased;

                Some(ack) = self.shutdown_rx.recv() => {
                    self.shut_down();
                    let _ = ack.send(());
                    break;
                }
                Some(id) = self.unregister_rx.recv() => self.unregister(&id),
                Some(message) = self.broadcast_rx.recv() => self.broadcast(message),
                registration = self.register_rx.recv() => match registration {
                    Some(registration) => self.register(registration),
                    None => {
                        debug!("Every hub handle was dropped");
                        self.shut_down();
                        break;
                    }
                },
                _ = heartbeat.tick() => self.heartbeat(),
            }
        }

        info!("Notification hub stopped");
    }

    fn register(&self, registration: Registration) {
        let Registration { client, ack } = registration;
        let id = client.id().clone();

        let result = self
            .registry
            .register(client)
            .and_then(|()| self.registry.send_to(&id, Message::welcome(&id)));

        match &result {
            Ok(()) => info!(
                "WebSocket client connected (ID: {id}). Total clients: {}",
                self.registry.len()
            ),
            Err(e) => warn!("Failed to register WebSocket client {id}: {e}"),
        }

        let _ = ack.send(result);
    }

    fn unregister(&self, id: &ClientId) {
        if self.registry.unregister(id).is_some() {
            info!(
                "WebSocket client disconnected (ID: {id}). Total clients: {}",
                self.registry.len()
            );
        }
    }

    fn broadcast(&self, message: Message) {
        let dropped = self.registry.broadcast(&message);
        if !dropped.is_empty() {
            warn!(
                "Dropped {} unresponsive client(s) while broadcasting {}",
                dropped.len(),
                message.event_type()
            );
        }
    }

    fn heartbeat(&self) {
        let message = Message::heartbeat(self.registry.len());
        trace!("Broadcasting heartbeat");
        self.broadcast(message);
    }

    fn shut_down(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        let message = Message::shutdown();
        let clients = self.registry.drain();
        let total = clients.len();

        for client in clients {
            if let Err(e) = client.try_send(message.clone()) {
                debug!("Could not deliver shutdown message: {e}");
            }
            client.close_transport();
            // Dropping the client closes its outbound queue.
        }

        // Refuse whatever is still queued.
        self.register_rx.close();
        self.broadcast_rx.close();

        info!("WebSocket: {total} client(s) disconnected");
    }
}
