use crate::message::Message;
use crate::Hub;
use async_trait::async_trait;
use events::{DomainEvent, EventHandler};
use log::*;

/// Handles domain events by converting them to hub messages and broadcasting
/// them to every connected client.
pub struct HubEventHandler {
    hub: Hub,
}

impl HubEventHandler {
    pub fn new(hub: Hub) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl EventHandler for HubEventHandler {
    async fn handle(&self, event: &DomainEvent) {
        match event {
            DomainEvent::UserCreated { user } => {
                debug!("Handling UserCreated event for user {}", user.id);

                if let Err(e) = self
                    .hub
                    .broadcast_message(Message::user_created(user.clone()))
                    .await
                {
                    warn!("Failed to broadcast user {} creation: {e}", user.id);
                }
            }
        }
    }
}
