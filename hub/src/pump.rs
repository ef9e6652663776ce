//! Per-connection read and write loops.
//!
//! Each WebSocket connection runs exactly one `read_pump` and one
//! `write_pump`. They share a `CancellationToken` standing in for the
//! transport: whichever pump stops first cancels it and the other one
//! follows.

use crate::connection::ClientId;
use crate::error::Error;
use crate::manager::Hub;
use crate::message::{ClientMessage, EventType, Message};
use axum::extract::ws::Message as WsMessage;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use log::*;
use std::fmt::Display;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_PING_PERIOD: Duration = Duration::from_secs(54);
pub const DEFAULT_PONG_WAIT: Duration = Duration::from_secs(60);
pub const DEFAULT_WRITE_WAIT: Duration = Duration::from_secs(10);

/// Liveness and write deadlines for a single connection.
#[derive(Debug, Clone, Copy)]
pub struct PumpConfig {
    /// Interval between pings sent to the peer. Must be shorter than `pong_wait`.
    pub ping_period: Duration,
    /// How long the peer may stay silent before the connection is closed
    pub pong_wait: Duration,
    /// Deadline for a single outbound frame
    pub write_wait: Duration,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            ping_period: DEFAULT_PING_PERIOD,
            pong_wait: DEFAULT_PONG_WAIT,
            write_wait: DEFAULT_WRITE_WAIT,
        }
    }
}

/// Reads frames from the peer until it goes away.
///
/// Every frame received, pongs included, extends the read deadline by
/// `pong_wait`. Text and binary frames are decoded as `ClientMessage` and
/// broadcast back to everyone as an `echo`. A frame that does not decode
/// ends the connection. On exit the client is unregistered and the transport
/// closed.
pub async fn read_pump<S, E>(
    hub: Hub,
    client_id: ClientId,
    mut stream: S,
    transport: CancellationToken,
    timing: PumpConfig,
) where
    S: Stream<Item = Result<WsMessage, E>> + Unpin,
    E: Display,
{
    loop {
        let frame = tokio::select! {
            _ = transport.cancelled() => break,
            frame = time::timeout(timing.pong_wait, stream.next()) => frame,
        };

        let frame = match frame {
            Ok(Some(Ok(frame))) => frame,
            Ok(Some(Err(e))) => {
                debug!("WebSocket read error for {client_id}: {e}");
                break;
            }
            Ok(None) => break,
            Err(_) => {
                info!("WebSocket client {client_id} timed out");
                break;
            }
        };

        let received = match &frame {
            WsMessage::Text(text) => ClientMessage::decode(text.as_str().as_bytes()),
            WsMessage::Binary(bytes) => ClientMessage::decode(bytes),
            WsMessage::Close(_) => break,
            _ => continue,
        };

        match received {
            Ok(received) => {
                trace!("Received {:?} from {client_id}", received.kind);
                let echo = Message::echo(received, client_id.clone());
                if let Err(e) = hub.broadcast_message(echo).await {
                    debug!("Dropping echo from {client_id}: {e}");
                }
            }
            Err(e) => {
                warn!("Closing {client_id} after undecodable frame: {e}");
                break;
            }
        }
    }

    hub.unregister(&client_id);
    transport.cancel();
}

/// Drains the client's outbound queue onto the transport and keeps the peer
/// alive with pings.
///
/// When the queue is closed by the hub a close frame is sent before
/// returning. A failed or timed out write ends the pump.
pub async fn write_pump<S>(
    mut sink: S,
    mut outbound: mpsc::Receiver<Message>,
    transport: CancellationToken,
    timing: PumpConfig,
) where
    S: Sink<WsMessage> + Unpin,
    S::Error: Display,
{
    let mut ping = time::interval_at(Instant::now() + timing.ping_period, timing.ping_period);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let result = tokio::select! {
            biased;

            message = outbound.recv() => match message {
                Some(message) => write_message(&mut sink, &message, timing.write_wait).await,
                None => {
                    let _ = write_frame(&mut sink, WsMessage::Close(None), timing.write_wait).await;
                    break;
                }
            },
            _ = ping.tick() => {
                write_frame(&mut sink, WsMessage::Ping(Default::default()), timing.write_wait).await
            }
            _ = transport.cancelled() => break,
        };

        if let Err(e) = result {
            debug!("WebSocket write failed: {e}");
            break;
        }
    }

    transport.cancel();
}

async fn write_message<S>(sink: &mut S, message: &Message, write_wait: Duration) -> Result<(), Error>
where
    S: Sink<WsMessage> + Unpin,
    S::Error: Display,
{
    let json = message
        .to_json()
        .map_err(|e| Error::Encode(format!("{}: {e}", message.event_type())))?;
    write_frame(sink, WsMessage::Text(json.into()), write_wait).await
}

async fn write_frame<S>(sink: &mut S, frame: WsMessage, write_wait: Duration) -> Result<(), Error>
where
    S: Sink<WsMessage> + Unpin,
    S::Error: Display,
{
    match time::timeout(write_wait, sink.send(frame)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(Error::Transport(e.to_string())),
        Err(_) => Err(Error::WriteTimeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connection;
    use crate::manager::HubConfig;
    use futures::channel::mpsc as fake;
    use serde_json::Value;
    use std::convert::Infallible;

    const WAIT: Duration = Duration::from_secs(2);

    fn fast_timing() -> PumpConfig {
        PumpConfig {
            ping_period: Duration::from_millis(20),
            pong_wait: Duration::from_millis(100),
            write_wait: Duration::from_millis(100),
        }
    }

    fn quiet_hub() -> Hub {
        Hub::spawn(HubConfig {
            heartbeat_interval: Duration::from_secs(3600),
            ..Default::default()
        })
    }

    async fn registered(hub: &Hub) -> Connection {
        let (client, connection) = hub.new_client();
        hub.register(client).await.unwrap();
        connection
    }

    async fn next_text(frames: &mut fake::UnboundedReceiver<WsMessage>) -> Value {
        loop {
            let frame = time::timeout(WAIT, frames.next())
                .await
                .expect("timed out waiting for a frame")
                .expect("sink closed");
            if let WsMessage::Text(text) = frame {
                return serde_json::from_str(text.as_str()).unwrap();
            }
        }
    }

    #[tokio::test]
    async fn write_pump_serializes_queued_messages_in_order() {
        let hub = quiet_hub();
        let connection = registered(&hub).await;
        let (sink, mut frames) = fake::unbounded();
        tokio::spawn(write_pump(
            sink,
            connection.outbound,
            connection.transport.clone(),
            PumpConfig::default(),
        ));

        hub.broadcast_message(Message::heartbeat(1)).await.unwrap();

        assert_eq!(next_text(&mut frames).await["type"], "welcome");
        assert_eq!(next_text(&mut frames).await["type"], "heartbeat");
    }

    #[tokio::test]
    async fn write_pump_sends_close_frame_when_queue_closes() {
        let (client, connection) = crate::connection::Client::new(4);
        let (sink, mut frames) = fake::unbounded();
        let pump = tokio::spawn(write_pump(
            sink,
            connection.outbound,
            connection.transport.clone(),
            PumpConfig::default(),
        ));

        drop(client);
        time::timeout(WAIT, pump).await.unwrap().unwrap();

        assert!(matches!(frames.next().await, Some(WsMessage::Close(None))));
        assert!(connection.transport.is_cancelled());
    }

    #[tokio::test]
    async fn write_pump_pings_periodically() {
        let (_client, connection) = crate::connection::Client::new(4);
        let (sink, mut frames) = fake::unbounded();
        tokio::spawn(write_pump(
            sink,
            connection.outbound,
            connection.transport.clone(),
            fast_timing(),
        ));

        let frame = time::timeout(WAIT, frames.next()).await.unwrap();
        assert!(matches!(frame, Some(WsMessage::Ping(_))));
    }

    #[tokio::test]
    async fn write_pump_stops_when_sink_fails() {
        let (_client, connection) = crate::connection::Client::new(4);
        let (sink, frames) = fake::unbounded::<WsMessage>();
        drop(frames);

        let pump = tokio::spawn(write_pump(
            sink,
            connection.outbound,
            connection.transport.clone(),
            fast_timing(),
        ));

        time::timeout(WAIT, pump).await.unwrap().unwrap();
        assert!(connection.transport.is_cancelled());
    }

    #[tokio::test]
    async fn read_pump_echoes_to_every_client() {
        let hub = quiet_hub();
        let mut sender = registered(&hub).await;
        let mut listener = registered(&hub).await;
        let sender_id = sender.id.clone();
        let (peer, stream) = fake::unbounded::<Result<WsMessage, Infallible>>();
        tokio::spawn(read_pump(
            hub.clone(),
            sender_id.clone(),
            stream,
            sender.transport.clone(),
            PumpConfig::default(),
        ));

        peer.unbounded_send(Ok(WsMessage::Text(
            r#"{"type":"chat","data":{"text":"hi"}}"#.into(),
        )))
        .unwrap();

        for connection in [&mut sender, &mut listener] {
            let welcome = time::timeout(WAIT, connection.outbound.recv()).await.unwrap().unwrap();
            assert_eq!(welcome.event_type(), "welcome");
            let echo = time::timeout(WAIT, connection.outbound.recv()).await.unwrap().unwrap();
            let value: Value = serde_json::from_str(&echo.to_json().unwrap()).unwrap();
            assert_eq!(value["type"], "echo");
            assert_eq!(value["data"]["from"], sender_id.as_str());
            assert_eq!(value["data"]["received"]["data"]["text"], "hi");
        }
    }

    #[tokio::test]
    async fn read_pump_closes_on_undecodable_frame() {
        let hub = quiet_hub();
        let connection = registered(&hub).await;
        let (peer, stream) = fake::unbounded::<Result<WsMessage, Infallible>>();
        let pump = tokio::spawn(read_pump(
            hub.clone(),
            connection.id.clone(),
            stream,
            connection.transport.clone(),
            PumpConfig::default(),
        ));

        peer.unbounded_send(Ok(WsMessage::Text("not json".into()))).unwrap();

        time::timeout(WAIT, pump).await.unwrap().unwrap();
        assert!(connection.transport.is_cancelled());
        time::timeout(WAIT, async {
            while hub.stats().total_clients != 0 {
                time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn read_pump_times_out_a_silent_peer() {
        let hub = quiet_hub();
        let connection = registered(&hub).await;
        let (_peer, stream) = fake::unbounded::<Result<WsMessage, Infallible>>();

        let pump = tokio::spawn(read_pump(
            hub.clone(),
            connection.id.clone(),
            stream,
            connection.transport.clone(),
            fast_timing(),
        ));

        time::timeout(WAIT, pump).await.unwrap().unwrap();
        assert!(connection.transport.is_cancelled());
    }

    #[tokio::test]
    async fn read_pump_keeps_reading_while_pongs_arrive() {
        let hub = quiet_hub();
        let connection = registered(&hub).await;
        let (peer, stream) = fake::unbounded::<Result<WsMessage, Infallible>>();
        let timing = fast_timing();

        let pump = tokio::spawn(read_pump(
            hub.clone(),
            connection.id.clone(),
            stream,
            connection.transport.clone(),
            timing,
        ));

        for _ in 0..5 {
            time::sleep(timing.pong_wait / 2).await;
            peer.unbounded_send(Ok(WsMessage::Pong(Default::default()))).unwrap();
        }
        assert!(!connection.transport.is_cancelled());

        peer.unbounded_send(Ok(WsMessage::Close(None))).unwrap();
        time::timeout(WAIT, pump).await.unwrap().unwrap();
        assert!(connection.transport.is_cancelled());
    }

    #[tokio::test]
    async fn read_pump_stops_when_transport_is_closed() {
        let hub = quiet_hub();
        let connection = registered(&hub).await;
        let (_peer, stream) = fake::unbounded::<Result<WsMessage, Infallible>>();

        let pump = tokio::spawn(read_pump(
            hub.clone(),
            connection.id.clone(),
            stream,
            connection.transport.clone(),
            PumpConfig::default(),
        ));

        connection.transport.cancel();
        time::timeout(WAIT, pump).await.unwrap().unwrap();
    }
}
