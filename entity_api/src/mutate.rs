/// The set of user fields a partial update will change.
///
/// Only supplied fields are recorded. An empty string is the "not supplied"
/// sentinel for the text fields, so setting one to `""` leaves the stored
/// value untouched.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UpdateMap {
    name: Option<String>,
    email: Option<String>,
    age: Option<i32>,
    country: Option<String>,
}

impl UpdateMap {
    /// Creates a new empty UpdateMap.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = non_empty(name.into());
    }

    pub fn set_email(&mut self, email: impl Into<String>) {
        self.email = non_empty(email.into());
    }

    pub fn set_age(&mut self, age: i32) {
        self.age = Some(age);
    }

    pub fn set_country(&mut self, country: impl Into<String>) {
        self.country = non_empty(country.into());
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn age(&self) -> Option<i32> {
        self.age
    }

    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }

    /// Returns true when no field would change.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.age.is_none() && self.country.is_none()
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// A trait that allows types to be converted into an UpdateMap.
///
/// Request parameter types implement this so the store never has to know
/// about the shape of the web layer's input.
pub trait IntoUpdateMap {
    /// Converts the implementing type into an UpdateMap.
    fn into_update_map(self) -> UpdateMap;
}

impl IntoUpdateMap for UpdateMap {
    fn into_update_map(self) -> UpdateMap {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_strings_are_not_recorded() {
        let mut update_map = UpdateMap::new();
        update_map.set_name("");
        update_map.set_email("");
        update_map.set_country("");

        assert!(update_map.is_empty());
    }

    #[test]
    fn supplied_fields_are_recorded() {
        let mut update_map = UpdateMap::new();
        update_map.set_name("Bob");
        update_map.set_age(0);

        assert_eq!(update_map.name(), Some("Bob"));
        assert_eq!(update_map.age(), Some(0));
        assert_eq!(update_map.email(), None);
        assert!(!update_map.is_empty());
    }
}
