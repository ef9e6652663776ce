use crate::error::{DomainErrorKind, Error, InternalErrorKind};
use crate::{users, Id};
use chrono::SecondsFormat;
use entity_api::mutate::IntoUpdateMap;
use entity_api::query::{ListParams, Page, SearchParams};
use entity_api::user::{Analytics, NewUser, UserStore};
use events::{DomainEvent, EventPublisher};
use log::*;

/// Creates a user and, once the record is committed, publishes
/// `DomainEvent::UserCreated` so connected clients are notified.
pub async fn create(
    store: &UserStore,
    event_publisher: &EventPublisher,
    new_user: NewUser,
) -> Result<users::Model, Error> {
    let user = store.create(new_user)?;
    info!("Created user {} <{}>", user.id, user.email);

    event_publisher
        .publish(DomainEvent::UserCreated { user: user.clone() })
        .await;

    Ok(user)
}

/// Creates every valid entry. Invalid entries are skipped and no
/// notifications are published for batch creation.
pub fn create_batch(store: &UserStore, new_users: Vec<NewUser>) -> Result<Vec<users::Model>, Error> {
    let requested = new_users.len();
    let created = store.create_batch(new_users)?;
    info!("Batch created {} of {requested} user(s)", created.len());
    Ok(created)
}

pub fn find_by_id(store: &UserStore, id: Id) -> Result<users::Model, Error> {
    Ok(store.find_by_id(id)?)
}

pub fn list(store: &UserStore, params: &ListParams) -> Page<users::Model> {
    store.list(params)
}

pub fn search(store: &UserStore, params: &SearchParams) -> Vec<users::Model> {
    store.search(params)
}

pub fn update(
    store: &UserStore,
    id: Id,
    params: impl IntoUpdateMap,
) -> Result<users::Model, Error> {
    Ok(store.update(id, params)?)
}

pub fn activate(store: &UserStore, id: Id) -> Result<users::Model, Error> {
    Ok(store.set_active(id, true)?)
}

pub fn deactivate(store: &UserStore, id: Id) -> Result<users::Model, Error> {
    Ok(store.set_active(id, false)?)
}

pub fn delete(store: &UserStore, id: Id) -> Result<(), Error> {
    store.delete(id)?;
    info!("Deleted user {id}");
    Ok(())
}

pub fn delete_batch(store: &UserStore, ids: &[Id]) -> Result<Vec<Id>, Error> {
    let deleted = store.delete_batch(ids)?;
    info!("Batch deleted {} of {} user(s)", deleted.len(), ids.len());
    Ok(deleted)
}

pub fn analytics(store: &UserStore) -> Analytics {
    store.analytics()
}

/// Formats supported by `export`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            ExportFormat::Json => "users.json",
            ExportFormat::Csv => "users.csv",
        }
    }
}

/// Renders every user, ordered by id, in the requested format.
pub fn export(store: &UserStore, format: ExportFormat) -> Result<String, Error> {
    let users = store.all();
    debug!("Exporting {} user(s) as {format:?}", users.len());

    match format {
        ExportFormat::Json => serde_json::to_string(&users).map_err(|err| Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(
                "Failed to encode users".to_string(),
            )),
        }),
        ExportFormat::Csv => Ok(to_csv(&users)),
    }
}

const CSV_HEADER: &str = "ID,Name,Email,Age,Country,Active,Created At,Updated At";

fn to_csv(users: &[users::Model]) -> String {
    let mut csv = String::from(CSV_HEADER);
    csv.push('\n');

    for user in users {
        let row = [
            user.id.to_string(),
            csv_field(&user.name),
            csv_field(&user.email),
            user.age.unwrap_or(0).to_string(),
            csv_field(user.country.as_deref().unwrap_or_default()),
            user.active.to_string(),
            user.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            user.updated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        ];
        csv.push_str(&row.join(","));
        csv.push('\n');
    }

    csv
}

// Quote fields that would otherwise break the row.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
