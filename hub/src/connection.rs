use crate::error::Error;
use crate::message::Message;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    pub fn new() -> Self {
        Self(format!("client_{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for ClientId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The hub's side of one connected peer: the sending half of its bounded
/// outbound queue and the token that closes its transport.
///
/// The registry owns the only sender, so dropping the `Client` closes the
/// queue and tells the write pump to stop.
#[derive(Debug)]
pub struct Client {
    id: ClientId,
    sender: mpsc::Sender<Message>,
    transport: CancellationToken,
}

/// The pumps' side of one connected peer.
#[derive(Debug)]
pub struct Connection {
    pub id: ClientId,
    pub outbound: mpsc::Receiver<Message>,
    pub transport: CancellationToken,
}

impl Client {
    /// Creates a client with an outbound queue of `capacity` messages.
    pub fn new(capacity: usize) -> (Client, Connection) {
        Self::with_id(ClientId::new(), capacity)
    }

    pub fn with_id(id: ClientId, capacity: usize) -> (Client, Connection) {
        let (sender, outbound) = mpsc::channel(capacity.max(1));
        let transport = CancellationToken::new();

        let client = Client {
            id: id.clone(),
            sender,
            transport: transport.clone(),
        };
        let connection = Connection {
            id,
            outbound,
            transport,
        };
        (client, connection)
    }

    pub fn id(&self) -> &ClientId {
        &self.id
    }

    /// Enqueues without waiting. A full queue means the peer is not keeping up.
    pub fn try_send(&self, message: Message) -> Result<(), Error> {
        self.sender.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => Error::QueueFull(self.id.clone()),
            TrySendError::Closed(_) => Error::QueueClosed(self.id.clone()),
        })
    }

    pub fn close_transport(&self) {
        self.transport.cancel();
    }
}

/// The live client set.
///
/// DashMap shard locks are only held for a membership change or for the
/// non-blocking enqueue attempt of a broadcast, never while a transport is
/// written to.
pub struct ClientRegistry {
    clients: DashMap<ClientId, Client>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            clients: DashMap::new(),
        }
    }

    /// Adds a client. A client id is registered at most once.
    pub fn register(&self, client: Client) -> Result<(), Error> {
        match self.clients.entry(client.id.clone()) {
            Entry::Occupied(_) => Err(Error::AlreadyRegistered(client.id.clone())),
            Entry::Vacant(entry) => {
                entry.insert(client);
                Ok(())
            }
        }
    }

    /// Removes a client, closing its outbound queue. Returns `None` when the
    /// client was not registered.
    pub fn unregister(&self, id: &ClientId) -> Option<Client> {
        self.clients.remove(id).map(|(_, client)| client)
    }

    pub fn contains(&self, id: &ClientId) -> bool {
        self.clients.contains_key(id)
    }

    /// Enqueues a message for a single client, dropping the client if its
    /// queue cannot take it.
    pub fn send_to(&self, id: &ClientId, message: Message) -> Result<(), Error> {
        // The shard guard from `get` must be released before `remove`.
        let result = match self.clients.get(id) {
            Some(client) => client.try_send(message),
            None => return Ok(()),
        };

        if let Err(e) = &result {
            warn!("Dropping client {id}: {e}");
            self.drop_client(id);
        }
        result
    }

    /// Enqueues a message for every client. Clients whose queue is full are
    /// unregistered and their transport closed; their ids are returned.
    pub fn broadcast(&self, message: &Message) -> Vec<ClientId> {
        let mut dropped = Vec::new();

        for entry in self.clients.iter() {
            if let Err(e) = entry.value().try_send(message.clone()) {
                warn!("Failed to send broadcast: {e}. Client will be dropped.");
                dropped.push(entry.key().clone());
            }
        }

        // Removal happens after iteration; removing while holding an
        // iterator guard on the same shard would deadlock.
        for id in &dropped {
            self.drop_client(id);
        }

        dropped
    }

    /// Removes and returns every client.
    pub fn drain(&self) -> Vec<Client> {
        let ids: Vec<ClientId> = self.clients.iter().map(|entry| entry.key().clone()).collect();
        ids.iter().filter_map(|id| self.unregister(id)).collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    fn drop_client(&self, id: &ClientId) {
        if let Some(client) = self.unregister(id) {
            client.close_transport();
        }
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}
