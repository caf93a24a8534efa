use serde::Serialize;
use serde_json::{Map, Value};
use std::cmp::Ordering;

use super::types::{FilterOp, Scalar};

/// A composable row predicate over trusted column names.
///
/// The same value is compiled to a parametrised WHERE fragment for list
/// queries and evaluated against a serialized record for single-record
/// checks. Evaluation follows SQL three-valued logic so both paths agree on
/// rows holding NULLs.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Always,
    Never,
    Compare {
        column: &'static str,
        op: FilterOp,
        value: Scalar,
    },
    IsNull(&'static str),
    In {
        column: &'static str,
        values: Vec<Scalar>,
    },
    /// `value = ANY(column)` for array columns
    Contains {
        column: &'static str,
        value: Scalar,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn eq(column: &'static str, value: impl Into<Scalar>) -> Self {
        Self::compare(column, FilterOp::Eq, value)
    }

    pub fn ne(column: &'static str, value: impl Into<Scalar>) -> Self {
        Self::compare(column, FilterOp::Neq, value)
    }

    pub fn gt(column: &'static str, value: impl Into<Scalar>) -> Self {
        Self::compare(column, FilterOp::Gt, value)
    }

    pub fn gte(column: &'static str, value: impl Into<Scalar>) -> Self {
        Self::compare(column, FilterOp::Gte, value)
    }

    pub fn lt(column: &'static str, value: impl Into<Scalar>) -> Self {
        Self::compare(column, FilterOp::Lt, value)
    }

    pub fn lte(column: &'static str, value: impl Into<Scalar>) -> Self {
        Self::compare(column, FilterOp::Lte, value)
    }

    pub fn ilike(column: &'static str, pattern: impl Into<String>) -> Self {
        Self::compare(column, FilterOp::ILike, Scalar::Text(Some(pattern.into())))
    }

    pub fn is_null(column: &'static str) -> Self {
        Predicate::IsNull(column)
    }

    pub fn contains(column: &'static str, value: impl Into<Scalar>) -> Self {
        Predicate::Contains { column, value: value.into() }
    }

    pub fn one_of(column: &'static str, values: Vec<Scalar>) -> Self {
        Predicate::In { column, values }
    }

    pub fn not(inner: Predicate) -> Self {
        Predicate::Not(Box::new(inner))
    }

    /// Equality with a possibly absent value. `None` can never match, the
    /// same way `column = NULL` never does in SQL.
    pub fn eq_opt(column: &'static str, value: Option<i64>) -> Self {
        match value {
            Some(v) => Self::eq(column, v),
            None => Predicate::Never,
        }
    }

    /// Equality on an optional caller filter. An absent filter matches everything.
    pub fn eq_if<V: Into<Scalar>>(column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => Self::eq(column, v),
            None => Predicate::Always,
        }
    }

    fn compare(column: &'static str, op: FilterOp, value: impl Into<Scalar>) -> Self {
        Predicate::Compare { column, op, value: value.into() }
    }

    /// Conjunction that drops `Always` terms and collapses on `Never`.
    pub fn all(parts: impl IntoIterator<Item = Predicate>) -> Self {
        let mut kept = Vec::new();
        for part in parts {
            match part {
                Predicate::Always => {}
                Predicate::Never => return Predicate::Never,
                other => kept.push(other),
            }
        }
        match kept.len() {
            0 => Predicate::Always,
            1 => kept.remove(0),
            _ => Predicate::And(kept),
        }
    }

    /// Disjunction that drops `Never` terms and collapses on `Always`.
    pub fn any(parts: impl IntoIterator<Item = Predicate>) -> Self {
        let mut kept = Vec::new();
        for part in parts {
            match part {
                Predicate::Never => {}
                Predicate::Always => return Predicate::Always,
                other => kept.push(other),
            }
        }
        match kept.len() {
            0 => Predicate::Never,
            1 => kept.remove(0),
            _ => Predicate::Or(kept),
        }
    }

    pub fn and(self, other: Predicate) -> Self {
        Predicate::all([self, other])
    }

    /// True only when the record definitely satisfies the predicate.
    pub fn matches<R: Serialize>(&self, record: &R) -> bool {
        match serde_json::to_value(record) {
            Ok(Value::Object(map)) => self.eval(&map) == Some(true),
            Ok(_) | Err(_) => false,
        }
    }

    /// Three-valued evaluation: `None` is SQL's UNKNOWN.
    pub fn eval(&self, row: &Map<String, Value>) -> Option<bool> {
        match self {
            Predicate::Always => Some(true),
            Predicate::Never => Some(false),
            Predicate::Compare { column, op, value } => {
                let field = field(row, column);
                if value.is_null() {
                    return None;
                }
                match op {
                    FilterOp::ILike => match (field.as_str(), value) {
                        (Some(text), Scalar::Text(Some(pattern))) => Some(ilike_matches(text, pattern)),
                        _ => None,
                    },
                    _ => value.compare_json(field).map(|ord| match op {
                        FilterOp::Eq => ord == Ordering::Equal,
                        FilterOp::Neq => ord != Ordering::Equal,
                        FilterOp::Gt => ord == Ordering::Greater,
                        FilterOp::Gte => ord != Ordering::Less,
                        FilterOp::Lt => ord == Ordering::Less,
                        FilterOp::Lte => ord != Ordering::Greater,
                        FilterOp::ILike => false,
                    }),
                }
            }
            Predicate::IsNull(column) => Some(field(row, column).is_null()),
            Predicate::In { column, values } => {
                let field = field(row, column);
                if field.is_null() {
                    return None;
                }
                let mut unknown = false;
                for value in values {
                    match value.compare_json(field) {
                        Some(Ordering::Equal) => return Some(true),
                        Some(_) => {}
                        None => unknown = true,
                    }
                }
                if unknown { None } else { Some(false) }
            }
            Predicate::Contains { column, value } => {
                if value.is_null() {
                    return None;
                }
                value.element_of_json(field(row, column))
            }
            Predicate::And(parts) => {
                let mut unknown = false;
                for part in parts {
                    match part.eval(row) {
                        Some(false) => return Some(false),
                        None => unknown = true,
                        Some(true) => {}
                    }
                }
                if unknown { None } else { Some(true) }
            }
            Predicate::Or(parts) => {
                let mut unknown = false;
                for part in parts {
                    match part.eval(row) {
                        Some(true) => return Some(true),
                        None => unknown = true,
                        Some(false) => {}
                    }
                }
                if unknown { None } else { Some(false) }
            }
            Predicate::Not(inner) => inner.eval(row).map(|b| !b),
        }
    }
}

static NULL: Value = Value::Null;

fn field<'a>(row: &'a Map<String, Value>, column: &str) -> &'a Value {
    row.get(column).unwrap_or(&NULL)
}

/// Compiles predicates into `$n` parametrised SQL.
pub struct FilterWhere {
    param_values: Vec<Scalar>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    pub fn generate(predicate: &Predicate, starting_param_index: usize) -> (String, Vec<Scalar>) {
        let mut filter_where = Self::new(starting_param_index);
        let sql = filter_where.build(predicate);
        (sql, filter_where.param_values)
    }

    fn build(&mut self, predicate: &Predicate) -> String {
        match predicate {
            Predicate::Always => "1=1".to_string(),
            Predicate::Never => "1=0".to_string(),
            Predicate::Compare { column, op, value } => {
                format!("\"{}\" {} {}", column, op.to_sql(), self.param(value.clone()))
            }
            Predicate::IsNull(column) => format!("\"{}\" IS NULL", column),
            Predicate::In { column, values } => {
                if values.is_empty() {
                    return "1=0".to_string();
                }
                let params: Vec<String> = values.iter().map(|v| self.param(v.clone())).collect();
                format!("\"{}\" IN ({})", column, params.join(", "))
            }
            Predicate::Contains { column, value } => {
                format!("{} = ANY(\"{}\")", self.param(value.clone()), column)
            }
            Predicate::And(parts) => self.join(parts, " AND ", "1=1"),
            Predicate::Or(parts) => self.join(parts, " OR ", "1=0"),
            Predicate::Not(inner) => format!("NOT ({})", self.build(inner)),
        }
    }

    fn join(&mut self, parts: &[Predicate], joiner: &str, empty: &str) -> String {
        if parts.is_empty() {
            return empty.to_string();
        }
        let sql: Vec<String> = parts.iter().map(|p| format!("({})", self.build(p))).collect();
        sql.join(joiner)
    }

    fn param(&mut self, value: Scalar) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}

/// Escapes LIKE metacharacters so user text matches literally.
pub fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Case-insensitive LIKE with `%`, `_` and backslash escapes.
fn ilike_matches(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.to_lowercase().chars().collect();
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
    like_from(&text, &pattern)
}

fn like_from(text: &[char], pattern: &[char]) -> bool {
    match pattern.first() {
        None => text.is_empty(),
        Some('%') => (0..=text.len()).any(|skip| like_from(&text[skip..], &pattern[1..])),
        Some('_') => !text.is_empty() && like_from(&text[1..], &pattern[1..]),
        Some('\\') if pattern.len() > 1 => {
            text.first() == Some(&pattern[1]) && like_from(&text[1..], &pattern[2..])
        }
        Some(c) => text.first() == Some(c) && like_from(&text[1..], &pattern[1..]),
    }
}
