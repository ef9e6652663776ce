use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use super::parse_bool;
use domain::{
    Id, IntoUpdateMap, ListParams, SearchParams, SortField, SortOrder, UpdateMap,
    DEFAULT_PAGE, DEFAULT_PER_PAGE,
};

const MAX_PER_PAGE: usize = 100;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct IndexParams {
    /// Page number, starting at 1
    pub(crate) page: Option<String>,
    /// Page size, between 1 and 100
    pub(crate) per_page: Option<String>,
    /// Sort field. Valid values: `name`, `age`, `created`
    pub(crate) sort: Option<String>,
    /// Sort order. Valid values: `asc`, `desc`
    pub(crate) order: Option<String>,
}

impl From<IndexParams> for ListParams {
    fn from(params: IndexParams) -> Self {
        let page = params
            .page
            .and_then(|p| p.parse::<usize>().ok())
            .filter(|p| *p > 0)
            .unwrap_or(DEFAULT_PAGE);
        let per_page = params
            .per_page
            .and_then(|p| p.parse::<usize>().ok())
            .filter(|p| (1..=MAX_PER_PAGE).contains(p))
            .unwrap_or(DEFAULT_PER_PAGE);

        let list_params = ListParams::new(page, per_page);
        let sort = match params.sort.as_deref() {
            Some("name") => Some(SortField::Name),
            Some("age") => Some(SortField::Age),
            Some("created") => Some(SortField::Created),
            _ => None,
        };
        let order = match params.order.as_deref() {
            Some("desc") => SortOrder::Desc,
            _ => SortOrder::Asc,
        };

        match sort {
            Some(field) => list_params.sorted_by(field, order),
            None => list_params,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct SearchQueryParams {
    /// Case-insensitive text matched against name and email
    pub(crate) q: Option<String>,
    /// Exact country
    pub(crate) country: Option<String>,
    /// Active flag
    pub(crate) active: Option<String>,
}

impl From<SearchQueryParams> for SearchParams {
    fn from(params: SearchQueryParams) -> Self {
        SearchParams {
            query: params.q.filter(|q| !q.is_empty()),
            country: params.country.filter(|c| !c.is_empty()),
            active: params
                .active
                .filter(|a| !a.is_empty())
                .map(|a| parse_bool(&a)),
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct ExportParams {
    /// Export format. Valid values: `json` (default), `csv`
    pub(crate) format: Option<String>,
}

/// Partial update of a user. Absent or empty fields are left unchanged.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateParams {
    pub name: Option<String>,
    pub email: Option<String>,
    pub age: Option<i32>,
    pub country: Option<String>,
}

impl IntoUpdateMap for UpdateParams {
    fn into_update_map(self) -> UpdateMap {
        let mut update_map = UpdateMap::new();
        if let Some(name) = self.name {
            update_map.set_name(name);
        }
        if let Some(email) = self.email {
            update_map.set_email(email);
        }
        if let Some(age) = self.age {
            update_map.set_age(age);
        }
        if let Some(country) = self.country {
            update_map.set_country(country);
        }
        update_map
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BatchCreateParams {
    #[serde(default)]
    pub users: Vec<domain::NewUser>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BatchDeleteParams {
    #[serde(default)]
    pub ids: Vec<Id>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_params_default_when_missing() {
        let list: ListParams = IndexParams::default().into();

        assert_eq!(list, ListParams::default());
    }

    #[test]
    fn index_params_fall_back_on_invalid_values() {
        let list: ListParams = IndexParams {
            page: Some("0".to_string()),
            per_page: Some("500".to_string()),
            sort: Some("email".to_string()),
            order: Some("desc".to_string()),
        }
        .into();

        assert_eq!(list, ListParams::default());
    }

    #[test]
    fn index_params_carry_sort_and_order() {
        let list: ListParams = IndexParams {
            page: Some("2".to_string()),
            per_page: Some("5".to_string()),
            sort: Some("age".to_string()),
            order: Some("desc".to_string()),
        }
        .into();

        assert_eq!(
            list,
            ListParams::new(2, 5).sorted_by(SortField::Age, SortOrder::Desc)
        );
    }

    #[test]
    fn search_params_ignore_empty_filters() {
        let search: SearchParams = SearchQueryParams {
            q: Some(String::new()),
            country: Some("USA".to_string()),
            active: Some("false".to_string()),
        }
        .into();

        assert_eq!(search.query, None);
        assert_eq!(search.country.as_deref(), Some("USA"));
        assert_eq!(search.active, Some(false));
    }

    #[test]
    fn update_params_skip_empty_strings() {
        let update_map = UpdateParams {
            name: Some(String::new()),
            email: Some("new@example.com".to_string()),
            age: None,
            country: None,
        }
        .into_update_map();

        assert_eq!(update_map.name(), None);
        assert_eq!(update_map.email(), Some("new@example.com"));
    }
}
