//! Event system infrastructure for the user service.
//!
//! This crate decouples business operations from their side effects (like
//! WebSocket notifications).
//!
//! # Architecture
//!
//! - **DomainEvent**: Enum representing all business events in the system
//! - **EventHandler**: Trait for implementing event handlers
//! - **EventPublisher**: Publishes events to registered handlers
//!
//! Only the `entity` crate is depended upon, so the hub and the domain layer
//! can both use this crate without depending on each other.

use async_trait::async_trait;
use entity::users;
use log::*;
use std::sync::Arc;

/// Domain events that represent business-level changes in the system.
/// These events are emitted after the store has committed the change, never
/// while its lock is held.
#[derive(Debug, Clone)]
pub enum DomainEvent {
    /// Emitted when a new user is created. Fanned out to every connected
    /// real-time client.
    UserCreated {
        /// Copy of the freshly created record
        user: users::Model,
    },
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::UserCreated { .. } => "user_created",
        }
    }
}

/// Trait for handling domain events.
/// Implementations can perform side effects like sending notifications,
/// updating caches, logging, etc.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &DomainEvent);
}

/// Publishes domain events to registered handlers.
/// Handlers are called sequentially in registration order.
#[derive(Clone)]
pub struct EventPublisher {
    handlers: Arc<Vec<Arc<dyn EventHandler>>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Vec::new()),
        }
    }

    /// Register a new event handler.
    /// Note: This creates a new publisher instance with the additional handler.
    /// Store the returned publisher in your application state.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        let mut handlers = (*self.handlers).clone();
        handlers.push(handler);
        self.handlers = Arc::new(handlers);
        self
    }

    /// Publish an event to all registered handlers.
    /// Handlers are called sequentially and are expected to absorb their own
    /// failures, so one handler never prevents the next from running.
    pub async fn publish(&self, event: DomainEvent) {
        debug!(
            "Publishing {} to {} handler(s)",
            event.name(),
            self.handlers.len()
        );
        for handler in self.handlers.iter() {
            handler.handle(&event).await;
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}
