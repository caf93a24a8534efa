//! HTTP handlers in two tiers: public (no token) and protected (bearer
//! token plus a live, active user).

pub mod protected;
pub mod public;

use chrono::Duration;
use sqlx::{PgConnection, PgPool};

use crate::api::{Json, ListParams, ListQuery, ListSpec, Page};
use crate::database::{Changeset, DatabaseError, Repository, Table};
use crate::error::{ApiError, ApiResult};
use crate::filter::{Predicate, Scalar};

/// Runs one list request: the predicate (visibility AND caller filters) plus
/// the envelope's search, ordering and window.
pub(crate) async fn paginate<T: Table>(
    pool: &PgPool,
    spec: &ListSpec,
    params: &ListParams,
    predicate: Predicate,
) -> ApiResult<Json<Page<T>>> {
    let query = ListQuery::new(spec, params)?;
    let filter = query.filter(predicate)?;
    let (items, total) = Repository::<T>::page(pool, &filter).await?;
    Ok(Json(query.page(items, total)))
}

/// 400 when a referenced row is missing, so a dangling id in a request body
/// never reaches a foreign key error.
pub(crate) async fn ensure_exists<T: Table>(conn: &mut PgConnection, id: i64) -> ApiResult<()> {
    if !Repository::<T>::exists(&mut *conn, id).await? {
        return Err(ApiError::bad_request(format!(
            "{} with ID {} does not exist",
            T::LABEL,
            id
        )));
    }
    Ok(())
}

/// Nulls `column` on every row of `T` that references the given id.
pub(crate) async fn detach<T: Table>(conn: &mut PgConnection, column: &'static str, id: i64) -> Result<u64, DatabaseError> {
    let changes = Changeset::new().set(column, Scalar::Int(None));
    let touched = Repository::<T>::update_where(&mut *conn, Predicate::eq(column, id), changes).await?;
    if touched > 0 {
        tracing::debug!(table = T::TABLE, column, id, touched, "detached references");
    }
    Ok(touched)
}

/// A non-negative day count from the query string as a duration.
pub(crate) fn days_param(value: Option<i64>, default: i64, name: &str) -> ApiResult<Duration> {
    let days = value.unwrap_or(default);
    if days < 0 {
        return Err(ApiError::bad_request(format!("{} must be non-negative", name)));
    }
    Duration::try_days(days).ok_or_else(|| ApiError::bad_request(format!("{} is out of range", name)))
}
