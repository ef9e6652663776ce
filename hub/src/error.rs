use crate::connection::ClientId;

/// Failures surfaced by the hub and the client pumps.
///
/// None of these are fatal to the process: `Closed` is reported to callers,
/// the queue variants resolve to dropping one client, and the transport
/// variants end one connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("hub is closed")]
    Closed,

    #[error("client {0} is already registered")]
    AlreadyRegistered(ClientId),

    #[error("outbound queue of client {0} is full")]
    QueueFull(ClientId),

    #[error("outbound queue of client {0} is closed")]
    QueueClosed(ClientId),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("write deadline elapsed")]
    WriteTimeout,

    #[error("failed to encode message: {0}")]
    Encode(String),
}
