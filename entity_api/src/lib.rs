use log::*;

pub use entity::{users, Id};

pub mod error;
pub mod mutate;
pub mod query;
pub mod user;

use user::{NewUser, UserStore};

/// Loads the demo users into an empty store. The third user is inactive so
/// that activity filters have something to exclude.
pub fn seed_database(store: &UserStore) {
    if store.count() > 0 {
        warn!("User store already holds data, skipping demo seed");
        return;
    }

    let demo_users = [
        NewUser::new("Ivan Petrov", "ivan@example.com")
            .with_age(30)
            .with_country("Russia"),
        NewUser::new("Maria Sidorova", "maria@example.com")
            .with_age(25)
            .with_country("Russia"),
        NewUser::new("Petr Ivanov", "petr@example.com")
            .with_age(35)
            .with_country("Ukraine"),
        NewUser::new("John Smith", "john@example.com")
            .with_age(28)
            .with_country("USA"),
        NewUser::new("Anna Schmidt", "anna@example.com")
            .with_age(32)
            .with_country("Germany"),
    ];

    for new_user in demo_users {
        if let Err(e) = store.create(new_user) {
            error!("Failed to seed demo user: {e}");
        }
    }

    if let Err(e) = store.set_active(3, false) {
        error!("Failed to deactivate demo user 3: {e}");
    }

    info!("Seeded user store with {} demo users", store.count());
}
