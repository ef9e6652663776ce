//! The user record held by the in-memory store.

use crate::Id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(as = entity::users::Model)]
pub struct Model {
    pub id: Id,

    pub name: String,

    pub email: String,

    /// Age in years, 0 through 150 inclusive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    pub active: bool,

    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTime<Utc>,

    #[schema(value_type = String, format = DateTime)]
    pub updated_at: DateTime<Utc>,
}
