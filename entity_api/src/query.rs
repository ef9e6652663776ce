//! Listing, sorting and search filters over the user table.

use crate::users::Model;
use serde::Serialize;
use std::cmp::Ordering;
use utoipa::ToSchema;

pub const DEFAULT_PAGE: usize = 1;
pub const DEFAULT_PER_PAGE: usize = 10;

/// Fields a user listing can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Name,
    Age,
    Created,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Pagination window plus an optional sort applied before windowing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListParams {
    pub page: usize,
    pub per_page: usize,
    pub sort: Option<SortField>,
    pub order: SortOrder,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            per_page: DEFAULT_PER_PAGE,
            sort: None,
            order: SortOrder::Asc,
        }
    }
}

impl ListParams {
    pub fn new(page: usize, per_page: usize) -> Self {
        Self {
            page,
            per_page,
            ..Default::default()
        }
    }

    pub fn sorted_by(mut self, field: SortField, order: SortOrder) -> Self {
        self.sort = Some(field);
        self.order = order;
        self
    }

    /// Orders `users` in place. Without a sort field the listing is ordered by id.
    pub(crate) fn sort(&self, users: &mut [Model]) {
        users.sort_by_key(|user| user.id);

        let Some(field) = self.sort else {
            return;
        };

        users.sort_by(|a, b| {
            let ordering = compare(field, a, b);
            match self.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });
    }

    /// Applies the `[(page-1)*per_page, min(total, page*per_page))` window to an
    /// already ordered snapshot. Pages past the end yield an empty slice.
    pub(crate) fn window(&self, users: Vec<Model>) -> Page<Model> {
        let page = self.page.max(1);
        let per_page = self.per_page.max(1);
        let total = users.len();
        let total_pages = total.div_ceil(per_page);

        let start = (page - 1).saturating_mul(per_page);
        let data = if start >= total {
            Vec::new()
        } else {
            let end = total.min(start + per_page);
            users.into_iter().skip(start).take(end - start).collect()
        };

        Page {
            data,
            page,
            per_page,
            total,
            total_pages,
        }
    }
}

fn compare(field: SortField, a: &Model, b: &Model) -> Ordering {
    match field {
        SortField::Name => a.name.cmp(&b.name),
        SortField::Age => a.age.unwrap_or(0).cmp(&b.age.unwrap_or(0)),
        SortField::Created => a.created_at.cmp(&b.created_at),
    }
}

/// One page of a listing together with the totals it was cut from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub total_pages: usize,
}

/// Search filters. Every supplied filter must match (logical AND).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchParams {
    /// Case-insensitive substring matched against name and email
    pub query: Option<String>,
    /// Exact country match
    pub country: Option<String>,
    /// Exact active flag match
    pub active: Option<bool>,
}

impl SearchParams {
    pub(crate) fn matches(&self, user: &Model) -> bool {
        if let Some(query) = self.query.as_deref().filter(|q| !q.is_empty()) {
            let query = query.to_lowercase();
            if !user.name.to_lowercase().contains(&query)
                && !user.email.to_lowercase().contains(&query)
            {
                return false;
            }
        }

        if let Some(country) = self.country.as_deref().filter(|c| !c.is_empty()) {
            if user.country.as_deref() != Some(country) {
                return false;
            }
        }

        if let Some(active) = self.active {
            if user.active != active {
                return false;
            }
        }

        true
    }
}
