use serde::Serialize;
use sqlx::{postgres::PgRow, FromRow, PgExecutor, PgPool, Row};

use crate::database::manager::DatabaseError;
use crate::database::query_builder::{bind_params, Changeset};
use crate::filter::{Filter, FilterWhere, Predicate};

/// A model stored in one table with a BIGSERIAL `id`.
pub trait Table: for<'r> FromRow<'r, PgRow> + Send + Unpin + Serialize {
    const TABLE: &'static str;
    /// Human-readable name used in not-found messages
    const LABEL: &'static str;
    const TOUCHES_UPDATED_AT: bool = true;
}

/// Typed access to one table. Every method runs a single statement against
/// whatever executor it is given, so callers choose between the pool and an
/// open transaction.
pub struct Repository<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T: Table> Repository<T> {
    /// Items for the filter's window plus the total count of matching rows.
    pub async fn page(pool: &PgPool, filter: &Filter) -> Result<(Vec<T>, i64), DatabaseError> {
        futures::try_join!(Self::select_all(pool, filter), Self::count(pool, filter))
    }

    pub async fn select_all<'e, E: PgExecutor<'e>>(executor: E, filter: &Filter) -> Result<Vec<T>, DatabaseError> {
        let sql = filter.to_sql();
        debug_sql(&sql.query);
        let rows = sqlx::query_as_with::<_, T, _>(&sql.query, bind_params(sql.params))
            .fetch_all(executor)
            .await?;
        Ok(rows)
    }

    pub async fn count<'e, E: PgExecutor<'e>>(executor: E, filter: &Filter) -> Result<i64, DatabaseError> {
        let sql = filter.to_count_sql();
        debug_sql(&sql.query);
        let row = sqlx::query_with(&sql.query, bind_params(sql.params))
            .fetch_one(executor)
            .await?;
        let count: i64 = row.try_get("count")?;
        Ok(count)
    }

    pub async fn select_where<'e, E: PgExecutor<'e>>(executor: E, predicate: Predicate) -> Result<Vec<T>, DatabaseError> {
        let mut filter = Filter::new(T::TABLE);
        filter.where_clause(predicate);
        Self::select_all(executor, &filter).await
    }

    pub async fn select_one<'e, E: PgExecutor<'e>>(executor: E, predicate: Predicate) -> Result<Option<T>, DatabaseError> {
        let mut filter = Filter::new(T::TABLE);
        filter.where_clause(predicate).limit(1, None).map_err(|e| DatabaseError::QueryError(e.to_string()))?;
        let sql = filter.to_sql();
        let row = sqlx::query_as_with::<_, T, _>(&sql.query, bind_params(sql.params))
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    pub async fn find<'e, E: PgExecutor<'e>>(executor: E, id: i64) -> Result<Option<T>, DatabaseError> {
        let query = format!("SELECT * FROM \"{}\" WHERE \"id\" = $1", T::TABLE);
        let row = sqlx::query_as::<_, T>(&query).bind(id).fetch_optional(executor).await?;
        Ok(row)
    }

    pub async fn find_404<'e, E: PgExecutor<'e>>(executor: E, id: i64) -> Result<T, DatabaseError> {
        Self::find(executor, id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("{} with ID {} not found", T::LABEL, id)))
    }

    pub async fn exists<'e, E: PgExecutor<'e>>(executor: E, id: i64) -> Result<bool, DatabaseError> {
        let query = format!("SELECT EXISTS (SELECT 1 FROM \"{}\" WHERE \"id\" = $1)", T::TABLE);
        let exists: bool = sqlx::query_scalar(&query).bind(id).fetch_one(executor).await?;
        Ok(exists)
    }

    pub async fn insert<'e, E: PgExecutor<'e>>(executor: E, changes: Changeset) -> Result<T, DatabaseError> {
        let sql = changes.insert_sql(T::TABLE);
        debug_sql(&sql.query);
        let row = sqlx::query_as_with::<_, T, _>(&sql.query, bind_params(sql.params))
            .fetch_one(executor)
            .await?;
        Ok(row)
    }

    pub async fn update<'e, E: PgExecutor<'e>>(executor: E, id: i64, changes: Changeset) -> Result<T, DatabaseError> {
        if changes.is_empty() && !T::TOUCHES_UPDATED_AT {
            return Self::find_404(executor, id).await;
        }
        let query = format!(
            "UPDATE \"{}\" SET {} WHERE \"id\" = ${} RETURNING *",
            T::TABLE,
            changes.assignments(T::TOUCHES_UPDATED_AT),
            changes.len() + 1
        );
        debug_sql(&query);
        let mut params = changes.into_params();
        params.push(id.into());
        sqlx::query_as_with::<_, T, _>(&query, bind_params(params))
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("{} with ID {} not found", T::LABEL, id)))
    }

    /// Applies the changeset to every matching row; returns the number touched.
    pub async fn update_where<'e, E: PgExecutor<'e>>(
        executor: E,
        predicate: Predicate,
        changes: Changeset,
    ) -> Result<u64, DatabaseError> {
        if changes.is_empty() {
            return Ok(0);
        }
        let (where_clause, where_params) = FilterWhere::generate(&predicate, changes.len());
        let query = format!(
            "UPDATE \"{}\" SET {} WHERE {}",
            T::TABLE,
            changes.assignments(T::TOUCHES_UPDATED_AT),
            where_clause
        );
        debug_sql(&query);
        let mut params = changes.into_params();
        params.extend(where_params);
        let result = sqlx::query_with(&query, bind_params(params)).execute(executor).await?;
        Ok(result.rows_affected())
    }

    pub async fn delete<'e, E: PgExecutor<'e>>(executor: E, id: i64) -> Result<u64, DatabaseError> {
        let query = format!("DELETE FROM \"{}\" WHERE \"id\" = $1", T::TABLE);
        let result = sqlx::query(&query).bind(id).execute(executor).await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_where<'e, E: PgExecutor<'e>>(executor: E, predicate: Predicate) -> Result<u64, DatabaseError> {
        let (where_clause, params) = FilterWhere::generate(&predicate, 0);
        let query = format!("DELETE FROM \"{}\" WHERE {}", T::TABLE, where_clause);
        debug_sql(&query);
        let result = sqlx::query_with(&query, bind_params(params)).execute(executor).await?;
        Ok(result.rows_affected())
    }

    pub async fn count_where<'e, E: PgExecutor<'e>>(executor: E, predicate: Predicate) -> Result<i64, DatabaseError> {
        let mut filter = Filter::new(T::TABLE);
        filter.where_clause(predicate);
        Self::count(executor, &filter).await
    }
}

fn debug_sql(query: &str) {
    if crate::config::CONFIG.filter.debug_logging {
        tracing::debug!(sql = %query, "executing");
    }
}
