//! Response bodies that are composed in the web layer rather than returned
//! as-is from the domain.

use chrono::{DateTime, Utc};
use domain::{users, Analytics, Id};
use hub::HubStats;
use serde::Serialize;
use service::metrics::PathMetrics;
use std::collections::BTreeMap;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct BatchCreated {
    pub(crate) created: Vec<users::Model>,
    pub(crate) count: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct BatchDeleted {
    pub(crate) deleted: Vec<Id>,
    pub(crate) count: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct SearchResults {
    pub(crate) results: Vec<users::Model>,
    pub(crate) count: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct Deleted {
    pub(crate) message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct AnalyticsReport {
    #[serde(flatten)]
    pub(crate) analytics: Analytics,
    pub(crate) timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct Health {
    pub(crate) status: String,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) uptime: String,
    pub(crate) total_users: usize,
    pub(crate) active_users: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct HttpStats {
    pub(crate) total_requests: u64,
    pub(crate) total_users: usize,
    pub(crate) active_users: usize,
    pub(crate) users_by_country: BTreeMap<String, usize>,
    pub(crate) requests_by_path: BTreeMap<String, u64>,
    pub(crate) avg_response_time_ms: f64,
    pub(crate) start_time: DateTime<Utc>,
    pub(crate) uptime: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct Stats {
    pub(crate) http: HttpStats,
    #[schema(value_type = Object)]
    pub(crate) websocket: HubStats,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct Metrics {
    #[schema(value_type = Vec<Object>)]
    pub(crate) metrics: Vec<PathMetrics>,
    pub(crate) timestamp: DateTime<Utc>,
}

/// Formats a duration as hours, minutes and seconds, e.g. `1h2m3s`.
pub(crate) fn format_uptime(uptime: chrono::Duration) -> String {
    let total = uptime.num_seconds().max(0);
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);

    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}
