use super::error::{Error, ValidationErrorKind};
use crate::mutate::IntoUpdateMap;
use crate::query::{ListParams, Page, SearchParams};
use chrono::{DateTime, Duration, Utc};
use entity::users::Model;
use entity::Id;
use log::*;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use utoipa::ToSchema;

pub const MIN_AGE: i32 = 0;
pub const MAX_AGE: i32 = 150;
pub const MAX_BATCH_SIZE: usize = 100;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9._%+\-]+@[a-z0-9.\-]+\.[a-z]{2,}$").expect("email pattern is valid")
});

/// Input for creating a user. Shape is already checked by deserialization;
/// business rules are checked by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, ToSchema)]
pub struct NewUser {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub age: Option<i32>,
    pub country: Option<String>,
}

impl NewUser {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            ..Default::default()
        }
    }

    pub fn with_age(mut self, age: i32) -> Self {
        self.age = Some(age);
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    fn validate(&self) -> Result<(), Error> {
        if self.name.is_empty() || self.email.is_empty() {
            return Err(Error::validation(ValidationErrorKind::MissingRequiredFields));
        }
        validate_email(&self.email)?;
        if let Some(age) = self.age {
            validate_age(age)?;
        }
        Ok(())
    }
}

/// Aggregate figures over the whole table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Analytics {
    pub total_users: usize,
    pub active_users: usize,
    pub inactive_users: usize,
    pub users_by_country: BTreeMap<String, usize>,
    /// Integer mean over users with an age greater than zero
    pub average_age: i32,
}

#[derive(Debug)]
struct Table {
    users: HashMap<Id, Model>,
    next_id: Id,
}

impl Table {
    fn insert_new(&mut self, new_user: NewUser, now: DateTime<Utc>) -> Model {
        let user = Model {
            id: self.next_id,
            name: new_user.name,
            email: new_user.email,
            age: new_user.age,
            country: new_user.country.filter(|c| !c.is_empty()),
            active: true,
            created_at: now,
            updated_at: now,
        };
        self.users.insert(user.id, user.clone());
        self.next_id += 1;
        user
    }
}

/// The canonical, volatile user table.
///
/// One reader/writer lock guards the whole table: lookups, listings and
/// searches take the shared mode, every mutation takes the exclusive mode.
/// Nothing awaits while the lock is held, so every method is synchronous and
/// safe to call from async handlers. Records are copied out; callers never
/// hold a reference into the table.
#[derive(Debug)]
pub struct UserStore {
    table: RwLock<Table>,
}

impl Default for UserStore {
    fn default() -> Self {
        Self::new()
    }
}

impl UserStore {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(Table {
                users: HashMap::new(),
                next_id: 1,
            }),
        }
    }

    pub fn create(&self, new_user: NewUser) -> Result<Model, Error> {
        debug!("New User to be inserted: {new_user:?}");
        new_user.validate()?;

        let user = self.table.write().insert_new(new_user, Utc::now());
        Ok(user)
    }

    /// Inserts every valid entry under a single write lock, silently skipping
    /// entries that fail validation. Returns the records that were created.
    pub fn create_batch(&self, new_users: Vec<NewUser>) -> Result<Vec<Model>, Error> {
        if new_users.is_empty() {
            return Err(Error::validation(ValidationErrorKind::EmptyBatch));
        }
        if new_users.len() > MAX_BATCH_SIZE {
            return Err(Error::validation(ValidationErrorKind::BatchTooLarge));
        }

        let now = Utc::now();
        let mut table = self.table.write();
        let created = new_users
            .into_iter()
            .filter(|new_user| match new_user.validate() {
                Ok(()) => true,
                Err(e) => {
                    debug!("Skipping batch entry {new_user:?}: {e}");
                    false
                }
            })
            .map(|new_user| table.insert_new(new_user, now))
            .collect();

        Ok(created)
    }

    pub fn find_by_id(&self, id: Id) -> Result<Model, Error> {
        self.table
            .read()
            .users
            .get(&id)
            .cloned()
            .ok_or_else(Error::not_found)
    }

    /// Returns one page of users. Total and window are computed from a single
    /// snapshot so they are consistent with each other.
    pub fn list(&self, params: &ListParams) -> Page<Model> {
        let mut users = self.snapshot();
        params.sort(&mut users);
        params.window(users)
    }

    /// Every user ordered by id.
    pub fn all(&self) -> Vec<Model> {
        let mut users = self.snapshot();
        users.sort_by_key(|user| user.id);
        users
    }

    pub fn search(&self, params: &SearchParams) -> Vec<Model> {
        let mut results: Vec<Model> = self
            .table
            .read()
            .users
            .values()
            .filter(|user| params.matches(user))
            .cloned()
            .collect();
        results.sort_by_key(|user| user.id);
        results
    }

    /// Applies only the supplied fields. The whole update is validated before
    /// anything is written, so a rejected update leaves the record untouched.
    pub fn update(&self, id: Id, params: impl IntoUpdateMap) -> Result<Model, Error> {
        let update_map = params.into_update_map();
        debug!("Updating user {id} with {update_map:?}");

        let mut table = self.table.write();
        let user = table.users.get_mut(&id).ok_or_else(Error::not_found)?;

        if let Some(email) = update_map.email() {
            validate_email(email)?;
        }
        if let Some(age) = update_map.age() {
            validate_age(age)?;
        }

        let mut updated = user.clone();
        if let Some(name) = update_map.name() {
            updated.name = name.to_string();
        }
        if let Some(email) = update_map.email() {
            updated.email = email.to_string();
        }
        if let Some(age) = update_map.age() {
            updated.age = Some(age);
        }
        if let Some(country) = update_map.country() {
            updated.country = Some(country.to_string());
        }
        updated.updated_at = next_timestamp(user.updated_at);

        *user = updated.clone();
        Ok(updated)
    }

    pub fn set_active(&self, id: Id, active: bool) -> Result<Model, Error> {
        let mut table = self.table.write();
        let user = table.users.get_mut(&id).ok_or_else(Error::not_found)?;

        user.active = active;
        user.updated_at = next_timestamp(user.updated_at);
        Ok(user.clone())
    }

    pub fn delete(&self, id: Id) -> Result<(), Error> {
        match self.table.write().users.remove(&id) {
            Some(_) => Ok(()),
            None => Err(Error::not_found()),
        }
    }

    /// Removes every listed id that exists and returns those ids in request order.
    pub fn delete_batch(&self, ids: &[Id]) -> Result<Vec<Id>, Error> {
        if ids.is_empty() {
            return Err(Error::validation(ValidationErrorKind::EmptyIdList));
        }

        let mut table = self.table.write();
        Ok(ids
            .iter()
            .copied()
            .filter(|id| table.users.remove(id).is_some())
            .collect())
    }

    pub fn count(&self) -> usize {
        self.table.read().users.len()
    }

    pub fn active_count(&self) -> usize {
        self.table
            .read()
            .users
            .values()
            .filter(|user| user.active)
            .count()
    }

    pub fn analytics(&self) -> Analytics {
        let table = self.table.read();

        let total_users = table.users.len();
        let mut active_users = 0;
        let mut users_by_country = BTreeMap::new();
        let mut age_sum: i64 = 0;
        let mut age_count: i64 = 0;

        for user in table.users.values() {
            if user.active {
                active_users += 1;
            }
            if let Some(country) = user.country.as_deref().filter(|c| !c.is_empty()) {
                *users_by_country.entry(country.to_string()).or_insert(0) += 1;
            }
            if let Some(age) = user.age.filter(|age| *age > 0) {
                age_sum += i64::from(age);
                age_count += 1;
            }
        }

        let average_age = if age_count > 0 {
            (age_sum / age_count) as i32
        } else {
            0
        };

        Analytics {
            total_users,
            active_users,
            inactive_users: total_users - active_users,
            users_by_country,
            average_age,
        }
    }

    fn snapshot(&self) -> Vec<Model> {
        self.table.read().users.values().cloned().collect()
    }
}

fn validate_email(email: &str) -> Result<(), Error> {
    if EMAIL_REGEX.is_match(&email.to_lowercase()) {
        Ok(())
    } else {
        Err(Error::validation(ValidationErrorKind::InvalidEmail))
    }
}

fn validate_age(age: i32) -> Result<(), Error> {
    if (MIN_AGE..=MAX_AGE).contains(&age) {
        Ok(())
    } else {
        Err(Error::validation(ValidationErrorKind::AgeOutOfRange))
    }
}

/// The clock can repeat a reading between two fast mutations; every mutation
/// must still move `updated_at` strictly forward.
fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::nanoseconds(1)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::EntityApiErrorKind;
    use crate::mutate::UpdateMap;
    use crate::query::{SortField, SortOrder};
    use std::collections::HashSet;
    use std::sync::Arc;

    fn alice() -> NewUser {
        NewUser::new("Alice", "alice@example.com").with_age(28)
    }

    fn assert_validation(result: Result<Model, Error>, kind: ValidationErrorKind) {
        assert_eq!(
            result.unwrap_err().error_kind,
            EntityApiErrorKind::ValidationError(kind)
        );
    }

    #[test]
    fn create_assigns_first_id_and_equal_timestamps() {
        let store = UserStore::new();

        let user = store.create(alice()).unwrap();

        assert_eq!(user.id, 1);
        assert!(user.active);
        assert_eq!(user.age, Some(28));
        assert_eq!(user.created_at, user.updated_at);
    }

    #[test]
    fn find_by_id_after_create_returns_equal_record() {
        let store = UserStore::new();

        let created = store.create(alice()).unwrap();

        assert_eq!(store.find_by_id(created.id).unwrap(), created);
    }

    #[test]
    fn create_ids_are_strictly_increasing() {
        let store = UserStore::new();

        let ids: Vec<Id> = (0..10)
            .map(|i| {
                store
                    .create(NewUser::new(format!("User {i}"), format!("user{i}@example.com")))
                    .unwrap()
                    .id
            })
            .collect();

        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn create_rejects_invalid_input() {
        let store = UserStore::new();

        assert_validation(
            store.create(NewUser::new("", "a@example.com")),
            ValidationErrorKind::MissingRequiredFields,
        );
        assert_validation(
            store.create(NewUser::new("A", "")),
            ValidationErrorKind::MissingRequiredFields,
        );
        assert_validation(
            store.create(NewUser::new("A", "not-an-email")),
            ValidationErrorKind::InvalidEmail,
        );
        assert_validation(
            store.create(NewUser::new("A", "a@example.com").with_age(151)),
            ValidationErrorKind::AgeOutOfRange,
        );
        assert_validation(
            store.create(NewUser::new("A", "a@example.com").with_age(-1)),
            ValidationErrorKind::AgeOutOfRange,
        );
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn create_accepts_mixed_case_email_and_boundary_ages() {
        let store = UserStore::new();

        assert!(store
            .create(NewUser::new("A", "Alice.Smith@Example.COM").with_age(0))
            .is_ok());
        assert!(store
            .create(NewUser::new("B", "b@example.com").with_age(150))
            .is_ok());
    }

    #[test]
    fn ids_are_never_reused_after_delete() {
        let store = UserStore::new();
        let first = store.create(alice()).unwrap();
        store.delete(first.id).unwrap();

        let second = store.create(alice()).unwrap();

        assert_eq!(second.id, first.id + 1);
    }

    #[test]
    fn update_changes_only_supplied_fields() {
        let store = UserStore::new();
        let before = store
            .create(alice().with_country("Canada"))
            .unwrap();

        let mut update_map = UpdateMap::new();
        update_map.set_age(29);
        update_map.set_name("");
        let after = store.update(before.id, update_map).unwrap();

        assert_eq!(after.age, Some(29));
        assert_eq!(after.name, before.name);
        assert_eq!(after.email, before.email);
        assert_eq!(after.country, before.country);
        assert_eq!(after.active, before.active);
        assert_eq!(after.created_at, before.created_at);
        assert!(after.updated_at > before.updated_at);
    }

    #[test]
    fn update_always_moves_updated_at_forward() {
        let store = UserStore::new();
        let mut previous = store.create(alice()).unwrap();

        for _ in 0..50 {
            let current = store.update(previous.id, UpdateMap::new()).unwrap();
            assert!(current.updated_at > previous.updated_at);
            previous = current;
        }
    }

    #[test]
    fn rejected_update_leaves_record_untouched() {
        let store = UserStore::new();
        let before = store.create(alice()).unwrap();

        let mut update_map = UpdateMap::new();
        update_map.set_name("Mallory");
        update_map.set_email("broken");
        assert_validation(
            store.update(before.id, update_map),
            ValidationErrorKind::InvalidEmail,
        );

        let mut update_map = UpdateMap::new();
        update_map.set_age(200);
        assert_validation(
            store.update(before.id, update_map),
            ValidationErrorKind::AgeOutOfRange,
        );

        assert_eq!(store.find_by_id(before.id).unwrap(), before);
    }

    #[test]
    fn update_of_missing_user_is_not_found() {
        let store = UserStore::new();

        let result = store.update(42, UpdateMap::new());

        assert_eq!(result.unwrap_err(), Error::not_found());
    }

    #[test]
    fn delete_then_get_and_delete_again_are_not_found() {
        let store = UserStore::new();
        let user = store.create(alice()).unwrap();

        store.delete(user.id).unwrap();

        assert_eq!(store.find_by_id(user.id).unwrap_err(), Error::not_found());
        assert_eq!(store.delete(user.id).unwrap_err(), Error::not_found());
    }

    #[test]
    fn deactivate_sets_flag_and_advances_updated_at() {
        let store = UserStore::new();
        let created = store.create(alice()).unwrap();

        let deactivated = store.set_active(created.id, false).unwrap();

        assert!(!deactivated.active);
        assert!(deactivated.updated_at > deactivated.created_at);

        let reactivated = store.set_active(created.id, true).unwrap();
        assert!(reactivated.active);
        assert!(reactivated.updated_at > deactivated.updated_at);
    }

    #[test]
    fn set_active_on_missing_user_is_not_found() {
        let store = UserStore::new();

        assert_eq!(store.set_active(3, true).unwrap_err(), Error::not_found());
    }

    #[test]
    fn list_pages_through_the_table() {
        let store = UserStore::new();
        for i in 0..25 {
            store
                .create(NewUser::new(format!("User {i:02}"), format!("u{i}@example.com")))
                .unwrap();
        }

        let page = store.list(&ListParams::new(3, 10));

        assert_eq!(page.total, 25);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.data.len(), 5);
        assert!(store.list(&ListParams::new(4, 10)).data.is_empty());
    }

    #[test]
    fn list_sorted_by_created_descending_starts_with_newest() {
        let store = UserStore::new();
        store.create(NewUser::new("First", "first@example.com")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let newest = store
            .create(NewUser::new("Second", "second@example.com"))
            .unwrap();

        let page = store.list(
            &ListParams::default().sorted_by(SortField::Created, SortOrder::Desc),
        );

        assert_eq!(page.data[0].id, newest.id);
    }

    #[test]
    fn search_matches_name_or_email_case_insensitively() {
        let store = UserStore::new();
        store
            .create(NewUser::new("John Smith", "smith@example.com"))
            .unwrap();
        store
            .create(NewUser::new("Someone", "JOHNNY@example.com"))
            .unwrap();
        store
            .create(NewUser::new("Anna", "anna@example.com"))
            .unwrap();

        let results = store.search(&SearchParams {
            query: Some("john".to_string()),
            ..Default::default()
        });

        assert_eq!(results.iter().map(|u| u.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn search_by_country_and_active_returns_only_active_users_from_country() {
        let store = UserStore::new();
        store
            .create(NewUser::new("A", "a@example.com").with_country("USA"))
            .unwrap();
        let inactive = store
            .create(NewUser::new("B", "b@example.com").with_country("USA"))
            .unwrap();
        store.set_active(inactive.id, false).unwrap();
        store
            .create(NewUser::new("C", "c@example.com").with_country("Germany"))
            .unwrap();

        let results = store.search(&SearchParams {
            country: Some("USA".to_string()),
            active: Some(true),
            ..Default::default()
        });

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "A");
    }

    #[test]
    fn create_batch_skips_invalid_entries() {
        let store = UserStore::new();

        let created = store
            .create_batch(vec![
                NewUser::new("A", "a@example.com"),
                NewUser::new("", "b@example.com"),
                NewUser::new("C", "bad"),
                NewUser::new("D", "d@example.com"),
            ])
            .unwrap();

        assert_eq!(created.iter().map(|u| u.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn create_batch_rejects_empty_and_oversized_batches() {
        let store = UserStore::new();

        assert_eq!(
            store.create_batch(Vec::new()).unwrap_err(),
            Error::validation(ValidationErrorKind::EmptyBatch)
        );

        let oversized = (0..=MAX_BATCH_SIZE)
            .map(|i| NewUser::new(format!("U{i}"), format!("u{i}@example.com")))
            .collect();
        assert_eq!(
            store.create_batch(oversized).unwrap_err(),
            Error::validation(ValidationErrorKind::BatchTooLarge)
        );
    }

    #[test]
    fn delete_batch_reports_only_existing_ids() {
        let store = UserStore::new();
        store.create(NewUser::new("A", "a@example.com")).unwrap();
        store.create(NewUser::new("B", "b@example.com")).unwrap();

        let deleted = store.delete_batch(&[2, 99, 1]).unwrap();

        assert_eq!(deleted, vec![2, 1]);
        assert_eq!(store.count(), 0);
        assert_eq!(
            store.delete_batch(&[]).unwrap_err(),
            Error::validation(ValidationErrorKind::EmptyIdList)
        );
    }

    #[test]
    fn analytics_summarizes_table() {
        let store = UserStore::new();
        store
            .create(NewUser::new("A", "a@example.com").with_age(30).with_country("USA"))
            .unwrap();
        let b = store
            .create(NewUser::new("B", "b@example.com").with_age(21).with_country("USA"))
            .unwrap();
        store.create(NewUser::new("C", "c@example.com")).unwrap();
        store.set_active(b.id, false).unwrap();

        let analytics = store.analytics();

        assert_eq!(analytics.total_users, 3);
        assert_eq!(analytics.active_users, 2);
        assert_eq!(analytics.inactive_users, 1);
        assert_eq!(analytics.users_by_country.get("USA"), Some(&2));
        assert_eq!(analytics.average_age, 25);
        assert_eq!(store.active_count(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_creates_yield_distinct_gapless_ids() {
        let store = Arc::new(UserStore::new());

        let handles: Vec<_> = (0..100)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .create(NewUser::new(format!("User {i}"), format!("user{i}@example.com")))
                        .unwrap()
                        .id
                })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            assert!(ids.insert(handle.await.unwrap()));
        }

        assert_eq!(ids, (1..=100).collect::<HashSet<Id>>());
        assert_eq!(store.count(), 100);
    }
}
