use super::types::{FilterOrderInfo, SortDirection};

pub struct FilterOrder;

impl FilterOrder {
    /// Resolves a caller-supplied sort field against the sortable columns.
    /// Unknown fields yield `None` and the query stays unordered.
    pub fn resolve(field: &str, order: SortDirection, sortable: &[&'static str]) -> Option<FilterOrderInfo> {
        let field = field.trim();
        sortable
            .iter()
            .find(|column| column.eq_ignore_ascii_case(field))
            .map(|column| FilterOrderInfo { column, sort: order })
    }

    /// `desc` in any case is descending; everything else is ascending.
    pub fn parse_direction(order: &str) -> SortDirection {
        if order.trim().eq_ignore_ascii_case("desc") {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }

    pub fn generate(infos: &[FilterOrderInfo]) -> String {
        if infos.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = infos
            .iter()
            .map(|i| format!("\"{}\" {}", i.column, i.sort.to_sql()))
            .collect();
        format!("ORDER BY {}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SORTABLE: &[&str] = &["id", "created_at", "title"];

    #[test]
    fn known_field_orders() {
        let info = FilterOrder::resolve("created_at", SortDirection::Desc, SORTABLE).unwrap();
        assert_eq!(FilterOrder::generate(&[info]), "ORDER BY \"created_at\" DESC");
    }

    #[test]
    fn unknown_field_is_ignored() {
        assert!(FilterOrder::resolve("password_hash", SortDirection::Asc, SORTABLE).is_none());
        assert!(FilterOrder::resolve("title; DROP TABLE tasks", SortDirection::Asc, SORTABLE).is_none());
        assert_eq!(FilterOrder::generate(&[]), "");
    }

    #[test]
    fn direction_defaults_to_ascending() {
        assert_eq!(FilterOrder::parse_direction("DESC"), SortDirection::Desc);
        assert_eq!(FilterOrder::parse_direction("sideways"), SortDirection::Asc);
    }
}
