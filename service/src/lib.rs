use chrono::{DateTime, Utc};
use config::Config;
use entity_api::user::UserStore;
use events::EventPublisher;
use hub::{Hub, HubEventHandler};
use log::info;
use metrics::RequestMetrics;
use std::sync::Arc;

pub mod config;
pub mod logging;
pub mod metrics;

// Application state shared by every request handler.
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub user_store: Arc<UserStore>,
    pub hub: Hub,
    pub event_publisher: Arc<EventPublisher>,
    pub request_metrics: Arc<RequestMetrics>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Builds the store and starts the notification hub. Must be called from
    /// within a tokio runtime.
    pub fn new(app_config: Config) -> Self {
        let user_store = Arc::new(UserStore::new());
        if app_config.seed_demo_data {
            entity_api::seed_database(&user_store);
        }

        let hub = Hub::spawn(app_config.hub_config());
        let event_publisher = Arc::new(
            EventPublisher::new().with_handler(Arc::new(HubEventHandler::new(hub.clone()))),
        );

        info!(
            "Application state ready with {} user(s) [{}]",
            user_store.count(),
            app_config.runtime_env()
        );

        Self {
            config: app_config,
            user_store,
            hub,
            event_publisher,
            request_metrics: Arc::new(RequestMetrics::new()),
            started_at: Utc::now(),
        }
    }

    pub fn user_store_ref(&self) -> &UserStore {
        self.user_store.as_ref()
    }

    /// Time elapsed since the state was built, rounded to whole seconds.
    pub fn uptime(&self) -> chrono::Duration {
        chrono::Duration::seconds((Utc::now() - self.started_at).num_seconds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[tokio::test]
    async fn new_state_seeds_demo_users_when_enabled() {
        let state = AppState::new(Config::parse_from(["user_hub"]));

        assert_eq!(state.user_store_ref().count(), 5);
        assert!(state.hub.is_running());
        assert_eq!(state.hub.stats().total_clients, 0);
    }

    #[tokio::test]
    async fn new_state_starts_empty_without_seed() {
        let state = AppState::new(Config::parse_from(["user_hub", "--seed-demo-data", "false"]));

        assert_eq!(state.user_store_ref().count(), 0);
        assert!(state.uptime() >= chrono::Duration::zero());
    }
}
