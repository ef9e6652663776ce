//! WebSocket notification hub.
//!
//! Fans server-side events out to every connected WebSocket client and echoes
//! client frames back to everyone.
//!
//! # Architecture
//!
//! - **Single event loop**: registration, unregistration, broadcasts and the
//!   periodic heartbeat are handled one at a time by one task, so every
//!   client sees broadcasts in the same order.
//! - **Bounded per-client queues**: broadcasts never block on a slow peer. A
//!   client whose queue is full is dropped and its transport closed.
//! - **Two pumps per connection**: `read_pump` turns inbound frames into
//!   `echo` broadcasts and enforces the read deadline; `write_pump` drains
//!   the outbound queue and pings the peer.
//! - **Ephemeral messages**: clients that are not connected miss events.
//!
//! # Message Flow
//!
//! 1. A client upgrades at `/ws` and is registered; it receives `welcome`
//! 2. A user is created, the domain layer publishes `DomainEvent::UserCreated`
//! 3. `HubEventHandler` turns it into a `user_created` broadcast
//! 4. The event loop enqueues the message on every client's queue
//! 5. Each client's `write_pump` serializes and sends it
//!
//! # Modules
//!
//! - `connection`: client handles, ids and the live client registry
//! - `manager`: the hub handle and its event loop
//! - `message`: the wire envelope and payloads
//! - `pump`: per-connection read and write loops

pub mod connection;
pub mod domain_event_handler;
pub mod error;
pub mod manager;
pub mod message;
pub mod pump;

pub use domain_event_handler::HubEventHandler;
pub use error::Error;
pub use manager::{Hub, HubConfig, HubStats};
pub use pump::PumpConfig;
