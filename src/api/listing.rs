use serde::{Deserialize, Serialize};

use crate::config::CONFIG;
use crate::error::ApiError;
use crate::filter::{escape_like, Filter, FilterOrder, FilterOrderInfo, Predicate, SortDirection};

/// Paging, sorting and search parameters shared by every list endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub search: Option<String>,
}

/// What a resource exposes to listing: its table, the columns a caller may
/// sort by and the text columns searched.
#[derive(Debug)]
pub struct ListSpec {
    pub table: &'static str,
    pub sortable: &'static [&'static str],
    pub searchable: &'static [&'static str],
    pub default_sort: &'static str,
    pub default_order: SortDirection,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub has_more: bool,
}

#[derive(Debug, Serialize)]
pub struct SortInfo {
    pub field: String,
    pub order: SortDirection,
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
    pub sort: SortInfo,
}

impl<T> Page<T> {
    /// Same window and sort with the items replaced, e.g. by per-row projections.
    pub fn with_items<U>(self, items: Vec<U>) -> Page<U> {
        Page { items, pagination: self.pagination, sort: self.sort }
    }
}

/// Validated list request for one resource.
#[derive(Debug)]
pub struct ListQuery {
    table: &'static str,
    limit: i64,
    offset: i64,
    sort_field: String,
    order: SortDirection,
    order_info: Option<FilterOrderInfo>,
    search: Predicate,
}

impl ListQuery {
    pub fn new(spec: &ListSpec, params: &ListParams) -> Result<Self, ApiError> {
        let offset = params.skip.unwrap_or(0);
        if offset < 0 {
            return Err(ApiError::bad_request("skip must be non-negative"));
        }
        let requested = params.limit.unwrap_or(CONFIG.filter.default_limit);
        if requested < 0 {
            return Err(ApiError::bad_request("limit must be non-negative"));
        }
        let limit = match CONFIG.filter.max_limit {
            Some(max) => requested.min(max),
            None => requested,
        };

        let sort_field = params
            .sort
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(spec.default_sort)
            .to_string();
        let order = match params.order.as_deref() {
            Some(o) => FilterOrder::parse_direction(o),
            None => spec.default_order,
        };
        let order_info = FilterOrder::resolve(&sort_field, order, spec.sortable);
        if order_info.is_none() {
            tracing::debug!(table = spec.table, sort = %sort_field, "ignoring unknown sort field");
        }

        Ok(Self {
            table: spec.table,
            limit,
            offset,
            sort_field,
            order,
            order_info,
            search: search_predicate(spec.searchable, params.search.as_deref()),
        })
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// The page query: visibility AND caller filters AND search.
    pub fn filter(&self, predicate: Predicate) -> Result<Filter, ApiError> {
        let mut filter = Filter::new(self.table);
        filter
            .where_clause(predicate)
            .where_clause(self.search.clone())
            .order(self.order_info.clone())
            .limit(self.limit, Some(self.offset))?;
        Ok(filter)
    }

    pub fn page<T>(&self, items: Vec<T>, total: i64) -> Page<T> {
        Page {
            items,
            pagination: Pagination {
                total,
                limit: self.limit,
                offset: self.offset,
                has_more: self.offset.saturating_add(self.limit) < total,
            },
            sort: SortInfo {
                field: self.sort_field.clone(),
                order: self.order,
            },
        }
    }
}

/// Case-insensitive substring match over any of the columns.
fn search_predicate(columns: &[&'static str], term: Option<&str>) -> Predicate {
    let term = match term.map(str::trim) {
        Some(t) if !t.is_empty() => t,
        _ => return Predicate::Always,
    };
    let pattern = format!("%{}%", escape_like(term));
    Predicate::any(columns.iter().map(|column| Predicate::ilike(*column, pattern.clone())))
}
