use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Comparison operators a predicate can apply to a single column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    ILike,
}

impl FilterOp {
    pub fn to_sql(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Neq => "<>",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
            FilterOp::ILike => "ILIKE",
        }
    }
}

/// A typed bind parameter. `None` inside a variant binds a typed SQL NULL.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Int(Option<i64>),
    Float(Option<f64>),
    Text(Option<String>),
    Bool(Option<bool>),
    Time(Option<DateTime<Utc>>),
    Date(Option<NaiveDate>),
    TextList(Option<Vec<String>>),
    IntList(Option<Vec<i64>>),
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        match self {
            Scalar::Int(v) => v.is_none(),
            Scalar::Float(v) => v.is_none(),
            Scalar::Text(v) => v.is_none(),
            Scalar::Bool(v) => v.is_none(),
            Scalar::Time(v) => v.is_none(),
            Scalar::Date(v) => v.is_none(),
            Scalar::TextList(v) => v.is_none(),
            Scalar::IntList(v) => v.is_none(),
        }
    }

    /// Orders a serialized record field against this value the way PostgreSQL
    /// would. `None` means the comparison is unknown (either side NULL or the
    /// types do not line up).
    pub fn compare_json(&self, field: &Value) -> Option<Ordering> {
        if field.is_null() {
            return None;
        }
        match self {
            Scalar::Int(Some(v)) => field.as_i64().map(|f| f.cmp(v)).or_else(|| {
                field.as_f64().and_then(|f| f.partial_cmp(&(*v as f64)))
            }),
            Scalar::Float(Some(v)) => field.as_f64().and_then(|f| f.partial_cmp(v)),
            Scalar::Text(Some(v)) => field.as_str().map(|f| f.cmp(v.as_str())),
            Scalar::Bool(Some(v)) => field.as_bool().map(|f| f.cmp(v)),
            Scalar::Time(Some(v)) => field
                .as_str()
                .and_then(|f| DateTime::parse_from_rfc3339(f).ok())
                .map(|f| f.with_timezone(&Utc).cmp(v)),
            Scalar::Date(Some(v)) => field
                .as_str()
                .and_then(|f| NaiveDate::parse_from_str(f, "%Y-%m-%d").ok())
                .map(|f| f.cmp(v)),
            _ => None,
        }
    }

    /// Whether this scalar equals one element of a serialized array field.
    pub fn element_of_json(&self, field: &Value) -> Option<bool> {
        let items = field.as_array()?;
        Some(items.iter().any(|item| self.compare_json(item) == Some(Ordering::Equal)))
    }
}

macro_rules! scalar_from {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for Scalar {
            fn from(value: $ty) -> Self {
                Scalar::$variant(Some(value.into()))
            }
        }

        impl From<Option<$ty>> for Scalar {
            fn from(value: Option<$ty>) -> Self {
                Scalar::$variant(value.map(Into::into))
            }
        }
    };
}

scalar_from!(i64, Int);
scalar_from!(i32, Int);
scalar_from!(f64, Float);
scalar_from!(String, Text);
scalar_from!(&str, Text);
scalar_from!(bool, Bool);
scalar_from!(DateTime<Utc>, Time);
scalar_from!(NaiveDate, Date);
scalar_from!(Vec<String>, TextList);
scalar_from!(Vec<i64>, IntList);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilterOrderInfo {
    pub column: &'static str,
    pub sort: SortDirection,
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<Scalar>,
}
