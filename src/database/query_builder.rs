use sqlx::postgres::PgArguments;
use sqlx::Arguments;

use crate::filter::types::{Scalar, SqlResult};

/// Binds typed scalars positionally. A `None` payload binds a NULL carrying
/// the column's type so Postgres can still resolve the operator.
pub fn bind_params(params: Vec<Scalar>) -> PgArguments {
    let mut args = PgArguments::default();
    for param in params {
        match param {
            Scalar::Int(v) => args.add(v),
            Scalar::Float(v) => args.add(v),
            Scalar::Text(v) => args.add(v),
            Scalar::Bool(v) => args.add(v),
            Scalar::Time(v) => args.add(v),
            Scalar::Date(v) => args.add(v),
            Scalar::TextList(v) => args.add(v),
            Scalar::IntList(v) => args.add(v),
        }
    }
    args
}

/// Column/value pairs for INSERT and UPDATE statements. Column names are
/// static and never come from request input.
#[derive(Debug, Clone, Default)]
pub struct Changeset {
    fields: Vec<(&'static str, Scalar)>,
}

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always writes the column, binding NULL for `None` values.
    pub fn set(mut self, column: &'static str, value: impl Into<Scalar>) -> Self {
        self.push(column, value.into());
        self
    }

    /// Writes the column only when a value is supplied.
    pub fn set_opt<V: Into<Scalar>>(mut self, column: &'static str, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.push(column, v.into());
        }
        self
    }

    pub fn push(&mut self, column: &'static str, value: Scalar) {
        if let Some(existing) = self.fields.iter_mut().find(|(c, _)| *c == column) {
            existing.1 = value;
        } else {
            self.fields.push((column, value));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.fields.iter().any(|(c, _)| *c == column)
    }

    pub fn insert_sql(self, table: &str) -> SqlResult {
        if self.fields.is_empty() {
            return SqlResult {
                query: format!("INSERT INTO \"{}\" DEFAULT VALUES RETURNING *", table),
                params: vec![],
            };
        }
        let columns: Vec<String> = self.fields.iter().map(|(c, _)| format!("\"{}\"", c)).collect();
        let placeholders: Vec<String> = (1..=self.fields.len()).map(|i| format!("${}", i)).collect();
        SqlResult {
            query: format!(
                "INSERT INTO \"{}\" ({}) VALUES ({}) RETURNING *",
                table,
                columns.join(", "),
                placeholders.join(", ")
            ),
            params: self.fields.into_iter().map(|(_, v)| v).collect(),
        }
    }

    /// `SET` assignments starting at `$1`, plus `updated_at = now()` when the
    /// table tracks modification time.
    pub fn assignments(&self, touch: bool) -> String {
        let mut parts: Vec<String> = self
            .fields
            .iter()
            .enumerate()
            .map(|(i, (c, _))| format!("\"{}\" = ${}", c, i + 1))
            .collect();
        if touch {
            parts.push("\"updated_at\" = now()".to_string());
        }
        parts.join(", ")
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn into_params(self) -> Vec<Scalar> {
        self.fields.into_iter().map(|(_, v)| v).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_lists_columns_in_order() {
        let sql = Changeset::new()
            .set("name", "Bakery")
            .set_opt::<String>("description", None)
            .set("is_active", true)
            .insert_sql("departments");
        assert_eq!(
            sql.query,
            "INSERT INTO \"departments\" (\"name\", \"is_active\") VALUES ($1, $2) RETURNING *"
        );
        assert_eq!(sql.params.len(), 2);
    }

    #[test]
    fn later_set_replaces_earlier_value() {
        let changes = Changeset::new().set("status", "open").set("status", "resolved");
        assert_eq!(changes.len(), 1);
        assert_eq!(changes.into_params(), vec![Scalar::from("resolved")]);
    }

    #[test]
    fn assignments_touch_updated_at() {
        let changes = Changeset::new().set("title", "x").set("resolved_at", Scalar::Time(None));
        assert_eq!(changes.assignments(true), "\"title\" = $1, \"resolved_at\" = $2, \"updated_at\" = now()");
        assert_eq!(changes.assignments(false), "\"title\" = $1, \"resolved_at\" = $2");
    }
}
