use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::{FilterWhere, Predicate};
use super::types::{FilterOrderInfo, SqlResult};

/// SELECT builder for one table: predicate, ordering, and a page window.
pub struct Filter {
    table_name: &'static str,
    where_data: Predicate,
    order_data: Vec<FilterOrderInfo>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl Filter {
    pub fn new(table_name: &'static str) -> Self {
        Self {
            table_name,
            where_data: Predicate::Always,
            order_data: vec![],
            limit: None,
            offset: None,
        }
    }

    /// Adds a predicate; repeated calls are conjoined.
    pub fn where_clause(&mut self, predicate: Predicate) -> &mut Self {
        let current = std::mem::replace(&mut self.where_data, Predicate::Always);
        self.where_data = current.and(predicate);
        self
    }

    pub fn order(&mut self, order: Option<FilterOrderInfo>) -> &mut Self {
        self.order_data = order.into_iter().collect();
        self
    }

    pub fn limit(&mut self, limit: i64, offset: Option<i64>) -> Result<&mut Self, FilterError> {
        if limit < 0 {
            return Err(FilterError::InvalidLimit("Limit must be non-negative".to_string()));
        }
        if let Some(off) = offset {
            if off < 0 {
                return Err(FilterError::InvalidOffset("Offset must be non-negative".to_string()));
            }
        }

        // Apply max limit from config
        let max_limit = crate::config::CONFIG.filter.max_limit.unwrap_or(i64::MAX);
        let applied_limit = if limit > max_limit {
            if crate::config::CONFIG.filter.debug_logging {
                tracing::warn!("Limit {} exceeds max {}, capping to max", limit, max_limit);
            }
            max_limit
        } else {
            limit
        };

        self.limit = Some(applied_limit);
        self.offset = offset;
        Ok(self)
    }

    pub fn applied_limit(&self) -> Option<i64> {
        self.limit
    }

    pub fn to_sql(&self) -> SqlResult {
        let (where_clause, params) = FilterWhere::generate(&self.where_data, 0);
        let query = [
            format!("SELECT * FROM \"{}\"", self.table_name),
            format!("WHERE {}", where_clause),
            FilterOrder::generate(&self.order_data),
            self.build_limit_clause(),
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        SqlResult { query, params }
    }

    pub fn to_count_sql(&self) -> SqlResult {
        let (where_clause, params) = FilterWhere::generate(&self.where_data, 0);
        let query = format!("SELECT COUNT(*) AS count FROM \"{}\" WHERE {}", self.table_name, where_clause);
        SqlResult { query, params }
    }

    fn build_limit_clause(&self) -> String {
        match (self.limit, self.offset) {
            (Some(l), Some(o)) => format!("LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!("LIMIT {}", l),
            (None, Some(o)) => format!("OFFSET {}", o),
            (None, None) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::types::SortDirection;

    #[test]
    fn select_with_window_and_order() {
        let mut filter = Filter::new("tasks");
        filter
            .where_clause(Predicate::eq("department_id", 2i64))
            .order(Some(FilterOrderInfo { column: "due_date", sort: SortDirection::Asc }))
            .limit(20, Some(40))
            .unwrap();
        let sql = filter.to_sql();
        assert_eq!(
            sql.query,
            "SELECT * FROM \"tasks\" WHERE \"department_id\" = $1 ORDER BY \"due_date\" ASC LIMIT 20 OFFSET 40"
        );
        assert_eq!(sql.params.len(), 1);
    }

    #[test]
    fn count_ignores_window() {
        let mut filter = Filter::new("complaints");
        filter.limit(5, Some(5)).unwrap();
        assert_eq!(filter.to_count_sql().query, "SELECT COUNT(*) AS count FROM \"complaints\" WHERE 1=1");
    }

    #[test]
    fn predicates_conjoin() {
        let mut filter = Filter::new("employees");
        filter
            .where_clause(Predicate::eq("department_id", 1i64))
            .where_clause(Predicate::eq("status", "active"));
        let sql = filter.to_count_sql();
        assert!(sql.query.ends_with("WHERE (\"department_id\" = $1) AND (\"status\" = $2)"));
    }

    #[test]
    fn negative_window_rejected() {
        assert!(Filter::new("tasks").limit(-1, None).is_err());
        assert!(Filter::new("tasks").limit(10, Some(-3)).is_err());
    }
}
