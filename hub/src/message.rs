use crate::connection::ClientId;
use chrono::{DateTime, SecondsFormat, Utc};
use entity::users;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const WELCOME_TEXT: &str = "Welcome to the user hub WebSocket!";
pub const SHUTDOWN_TEXT: &str = "Server is shutting down gracefully";

/// Trait for getting the wire type tag of a message
pub trait EventType {
    fn event_type(&self) -> &'static str;
}

/// Every payload the server sends. Serialized as the adjacent `type`/`data`
/// pair of the envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    #[serde(rename = "welcome")]
    Welcome { message: String, id: ClientId },

    #[serde(rename = "user_created")]
    UserCreated(users::Model),

    #[serde(rename = "heartbeat")]
    Heartbeat {
        active_clients: usize,
        server_time: String,
    },

    #[serde(rename = "echo")]
    Echo {
        received: ClientMessage,
        from: ClientId,
    },

    #[serde(rename = "shutdown")]
    Shutdown { message: String },
}

impl EventType for Payload {
    fn event_type(&self) -> &'static str {
        match self {
            Payload::Welcome { .. } => "welcome",
            Payload::UserCreated(_) => "user_created",
            Payload::Heartbeat { .. } => "heartbeat",
            Payload::Echo { .. } => "echo",
            Payload::Shutdown { .. } => "shutdown",
        }
    }
}

/// The frame envelope: `{"type": ..., "data": ..., "timestamp": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    #[serde(flatten)]
    pub payload: Payload,
    pub timestamp: DateTime<Utc>,
}

impl EventType for Message {
    fn event_type(&self) -> &'static str {
        self.payload.event_type()
    }
}

impl Message {
    pub fn new(payload: Payload) -> Self {
        Self {
            payload,
            timestamp: Utc::now(),
        }
    }

    pub fn welcome(id: &ClientId) -> Self {
        Self::new(Payload::Welcome {
            message: WELCOME_TEXT.to_string(),
            id: id.clone(),
        })
    }

    pub fn user_created(user: users::Model) -> Self {
        Self::new(Payload::UserCreated(user))
    }

    pub fn heartbeat(active_clients: usize) -> Self {
        Self::new(Payload::Heartbeat {
            active_clients,
            server_time: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        })
    }

    /// Wraps a message received from `from`, re-stamping it with the time it
    /// was received.
    pub fn echo(mut received: ClientMessage, from: ClientId) -> Self {
        received.timestamp = Utc::now();
        Self::new(Payload::Echo { received, from })
    }

    pub fn shutdown() -> Self {
        Self::new(Payload::Shutdown {
            message: SHUTDOWN_TEXT.to_string(),
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A frame sent by a client. Its `data` is client-controlled and is carried
/// through untouched as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientMessage {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ClientMessage {
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn to_value(message: &Message) -> Value {
        serde_json::from_str(&message.to_json().unwrap()).unwrap()
    }

    #[test]
    fn envelope_has_type_data_and_timestamp() {
        let id = ClientId::from("client_1");
        let value = to_value(&Message::welcome(&id));

        assert_eq!(value["type"], json!("welcome"));
        assert_eq!(value["data"]["id"], json!("client_1"));
        assert_eq!(value["data"]["message"], json!(WELCOME_TEXT));
        assert!(value["timestamp"].is_string());
        assert_eq!(value.as_object().unwrap().len(), 3);
    }

    #[test]
    fn heartbeat_carries_client_count_and_server_time() {
        let value = to_value(&Message::heartbeat(3));

        assert_eq!(value["type"], json!("heartbeat"));
        assert_eq!(value["data"]["active_clients"], json!(3));
        let server_time = value["data"]["server_time"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(server_time).is_ok());
    }

    #[test]
    fn user_created_carries_the_record() {
        let now = Utc::now();
        let user = users::Model {
            id: 1,
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            age: Some(28),
            country: None,
            active: true,
            created_at: now,
            updated_at: now,
        };

        let value = to_value(&Message::user_created(user));

        assert_eq!(value["type"], json!("user_created"));
        assert_eq!(value["data"]["id"], json!(1));
        assert_eq!(value["data"]["email"], json!("alice@example.com"));
    }

    #[test]
    fn echo_wraps_received_message_and_sender() {
        let received = ClientMessage::decode(br#"{"type":"chat","data":{"text":"hi"}}"#).unwrap();

        let value = to_value(&Message::echo(received, ClientId::from("client_9")));

        assert_eq!(value["type"], json!("echo"));
        assert_eq!(value["data"]["from"], json!("client_9"));
        assert_eq!(value["data"]["received"]["type"], json!("chat"));
        assert_eq!(value["data"]["received"]["data"], json!({"text": "hi"}));
        assert!(value["data"]["received"]["timestamp"].is_string());
    }

    #[test]
    fn echo_restamps_received_timestamp() {
        let received = ClientMessage::decode(
            br#"{"type":"chat","data":null,"timestamp":"2001-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        let message = Message::echo(received, ClientId::from("client_9"));

        match message.payload {
            Payload::Echo { received, .. } => {
                assert!(received.timestamp.timestamp() > 978_307_200);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn client_message_fields_default_when_missing() {
        let message = ClientMessage::decode(b"{}").unwrap();

        assert_eq!(message.kind, "");
        assert_eq!(message.data, Value::Null);
    }

    #[test]
    fn client_message_rejects_non_objects() {
        assert!(ClientMessage::decode(b"\"hello\"").is_err());
        assert!(ClientMessage::decode(b"not json").is_err());
    }

    #[test]
    fn event_type_matches_serialized_tag() {
        let message = Message::shutdown();

        assert_eq!(message.event_type(), "shutdown");
        assert_eq!(to_value(&message)["type"], json!("shutdown"));
    }
}
