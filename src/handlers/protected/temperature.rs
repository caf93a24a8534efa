use std::collections::HashMap;

use axum::extract::State;
use axum::routing::{get, put};
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{Json, ListParams, ListSpec, Page, Path, Query};
use crate::app::AppState;
use crate::database::models::{
    Department, Equipment, MonitoringPoint, Severity, TemperatureLog, TemperatureViolation, ViolationStatus,
    ViolationType,
};
use crate::database::{Changeset, Repository};
use crate::error::{ApiError, ApiResult};
use crate::filter::{Predicate, Scalar, SortDirection};
use crate::handlers::{ensure_exists, paginate};
use crate::middleware::{message, Message};
use crate::policy::Principal;
use crate::services::temperature::{evaluate, is_check_due, CHECK_FREQUENCY_HOURS};
use crate::services::{transition, Stamp};

const POINTS: ListSpec = ListSpec {
    table: "temperature_monitoring_points",
    sortable: &["id", "equipment_type", "check_frequency_hours", "is_active", "created_at"],
    searchable: &["equipment_type"],
    default_sort: "id",
    default_order: SortDirection::Asc,
};

const LOGS: ListSpec = ListSpec {
    table: "temperature_logs",
    sortable: &["id", "recorded_at", "recorded_temp_fahrenheit", "created_at"],
    searchable: &["notes", "shift"],
    default_sort: "recorded_at",
    default_order: SortDirection::Desc,
};

const VIOLATIONS: ListSpec = ListSpec {
    table: "temperature_violations",
    sortable: &["id", "severity", "status", "created_at", "resolved_at"],
    searchable: &["notes"],
    default_sort: "created_at",
    default_order: SortDirection::Desc,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/monitoring-points", get(list_points).post(create_point))
        .route("/monitoring-points/:id", get(show_point).put(update_point).delete(destroy_point))
        .route("/logs", get(list_logs).post(create_log))
        .route("/violations", get(list_violations))
        .route("/violations/:id", put(update_violation))
        .route("/due-checks", get(due_checks))
}

#[derive(Debug, Default, Deserialize)]
pub struct PointFilters {
    pub department_id: Option<i64>,
    pub is_active: Option<bool>,
    pub equipment_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PointCreate {
    pub equipment_type: String,
    pub department_id: Option<i64>,
    pub min_temp_fahrenheit: f64,
    pub max_temp_fahrenheit: f64,
    pub check_frequency_hours: Option<i64>,
    pub is_active: Option<bool>,
    pub equipment_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PointUpdate {
    pub equipment_type: Option<String>,
    pub department_id: Option<i64>,
    pub min_temp_fahrenheit: Option<f64>,
    pub max_temp_fahrenheit: Option<f64>,
    pub check_frequency_hours: Option<i64>,
    pub is_active: Option<bool>,
    pub equipment_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogFilters {
    pub monitoring_point_id: Option<i64>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_within_range: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct LogCreate {
    pub monitoring_point_id: i64,
    pub recorded_temp_fahrenheit: f64,
    pub notes: Option<String>,
    pub shift: Option<String>,
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ViolationFilters {
    pub monitoring_point_id: Option<i64>,
    pub status: Option<ViolationStatus>,
    pub violation_type: Option<ViolationType>,
    pub severity: Option<Severity>,
}

#[derive(Debug, Deserialize)]
pub struct ViolationUpdate {
    pub status: Option<ViolationStatus>,
    pub notes: Option<String>,
}

/// An active point whose next reading is due
#[derive(Debug, Serialize)]
pub struct DueCheck {
    #[serde(flatten)]
    pub point: MonitoringPoint,
    pub last_recorded_at: Option<DateTime<Utc>>,
}

fn ensure_range(min: f64, max: f64) -> ApiResult<()> {
    if min > max {
        return Err(ApiError::bad_request(
            "min_temp_fahrenheit must not be greater than max_temp_fahrenheit",
        ));
    }
    Ok(())
}

fn ensure_frequency(hours: Option<i64>) -> ApiResult<()> {
    match hours {
        Some(h) if !CHECK_FREQUENCY_HOURS.contains(&h) => Err(ApiError::bad_request(format!(
            "check_frequency_hours must be between {} and {}",
            CHECK_FREQUENCY_HOURS.start(),
            CHECK_FREQUENCY_HOURS.end()
        ))),
        _ => Ok(()),
    }
}

/// GET /temperature/monitoring-points
pub async fn list_points(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
    Query(filters): Query<PointFilters>,
) -> ApiResult<Json<Page<MonitoringPoint>>> {
    let predicate = Predicate::all([
        Predicate::eq_if("department_id", filters.department_id),
        Predicate::eq_if("is_active", filters.is_active),
        Predicate::eq_if("equipment_type", filters.equipment_type),
    ]);
    paginate(&state.pool, &POINTS, &params, predicate).await
}

/// GET /temperature/monitoring-points/:id
pub async fn show_point(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<MonitoringPoint>> {
    Ok(Json(Repository::<MonitoringPoint>::find_404(&state.pool, id).await?))
}

/// POST /temperature/monitoring-points
pub async fn create_point(
    State(state): State<AppState>,
    principal: Principal,
    Json(input): Json<PointCreate>,
) -> ApiResult<Json<MonitoringPoint>> {
    principal.require_admin_or_manager()?;
    ensure_range(input.min_temp_fahrenheit, input.max_temp_fahrenheit)?;
    ensure_frequency(input.check_frequency_hours)?;

    let mut tx = state.pool.begin().await?;
    if let Some(department_id) = input.department_id {
        ensure_exists::<Department>(&mut tx, department_id).await?;
    }
    if let Some(equipment_id) = input.equipment_id {
        ensure_exists::<Equipment>(&mut tx, equipment_id).await?;
    }
    let changes = Changeset::new()
        .set("equipment_type", input.equipment_type)
        .set_opt("department_id", input.department_id)
        .set("min_temp_fahrenheit", input.min_temp_fahrenheit)
        .set("max_temp_fahrenheit", input.max_temp_fahrenheit)
        .set_opt("check_frequency_hours", input.check_frequency_hours)
        .set_opt("is_active", input.is_active)
        .set_opt("equipment_id", input.equipment_id);
    let point = Repository::<MonitoringPoint>::insert(&mut *tx, changes).await?;
    tx.commit().await?;
    Ok(Json(point))
}

/// PUT /temperature/monitoring-points/:id
pub async fn update_point(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    Json(input): Json<PointUpdate>,
) -> ApiResult<Json<MonitoringPoint>> {
    principal.require_admin_or_manager()?;
    ensure_frequency(input.check_frequency_hours)?;

    let mut tx = state.pool.begin().await?;
    let current = Repository::<MonitoringPoint>::find_404(&mut *tx, id).await?;
    ensure_range(
        input.min_temp_fahrenheit.unwrap_or(current.min_temp_fahrenheit),
        input.max_temp_fahrenheit.unwrap_or(current.max_temp_fahrenheit),
    )?;
    let changes = Changeset::new()
        .set_opt("equipment_type", input.equipment_type)
        .set_opt("department_id", input.department_id)
        .set_opt("min_temp_fahrenheit", input.min_temp_fahrenheit)
        .set_opt("max_temp_fahrenheit", input.max_temp_fahrenheit)
        .set_opt("check_frequency_hours", input.check_frequency_hours)
        .set_opt("is_active", input.is_active)
        .set_opt("equipment_id", input.equipment_id);
    let point = Repository::<MonitoringPoint>::update(&mut *tx, id, changes).await?;
    tx.commit().await?;
    Ok(Json(point))
}

/// DELETE /temperature/monitoring-points/:id, with its logs and violations
pub async fn destroy_point(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> ApiResult<Json<Message>> {
    principal.require_admin()?;

    let mut tx = state.pool.begin().await?;
    Repository::<MonitoringPoint>::find_404(&mut *tx, id).await?;
    Repository::<TemperatureViolation>::delete_where(&mut *tx, Predicate::eq("monitoring_point_id", id)).await?;
    Repository::<TemperatureLog>::delete_where(&mut *tx, Predicate::eq("monitoring_point_id", id)).await?;
    Repository::<MonitoringPoint>::delete(&mut *tx, id).await?;
    tx.commit().await?;
    Ok(message("Monitoring point deleted successfully"))
}

/// GET /temperature/logs
pub async fn list_logs(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
    Query(filters): Query<LogFilters>,
) -> ApiResult<Json<Page<TemperatureLog>>> {
    let predicate = Predicate::all([
        Predicate::eq_if("monitoring_point_id", filters.monitoring_point_id),
        Predicate::eq_if("is_within_range", filters.is_within_range),
        filters.start_date.map_or(Predicate::Always, |t| Predicate::gte("recorded_at", t)),
        filters.end_date.map_or(Predicate::Always, |t| Predicate::lte("recorded_at", t)),
    ]);
    paginate(&state.pool, &LOGS, &params, predicate).await
}

/// POST /temperature/logs
///
/// The range check happens against the point's bounds at write time; an
/// out-of-range reading opens a violation in the same transaction.
pub async fn create_log(
    State(state): State<AppState>,
    principal: Principal,
    Json(input): Json<LogCreate>,
) -> ApiResult<Json<TemperatureLog>> {
    let mut tx = state.pool.begin().await?;
    let point = Repository::<MonitoringPoint>::find(&mut *tx, input.monitoring_point_id)
        .await?
        .ok_or_else(|| {
            ApiError::bad_request(format!(
                "Monitoring point with ID {} does not exist",
                input.monitoring_point_id
            ))
        })?;

    let reading = evaluate(&point, input.recorded_temp_fahrenheit);
    let changes = Changeset::new()
        .set("monitoring_point_id", point.id)
        .set("recorded_temp_fahrenheit", input.recorded_temp_fahrenheit)
        .set("recorded_by", principal.employee_id)
        .set("is_within_range", reading.is_within_range)
        .set_opt("notes", input.notes)
        .set_opt("shift", input.shift)
        .set_opt("recorded_at", input.recorded_at);
    let log = Repository::<TemperatureLog>::insert(&mut *tx, changes).await?;

    if let Some((violation_type, severity)) = reading.violation {
        let violation = Changeset::new()
            .set("log_id", log.id)
            .set("monitoring_point_id", point.id)
            .set("violation_type", violation_type)
            .set("severity", severity)
            .set("status", ViolationStatus::Open);
        let violation = Repository::<TemperatureViolation>::insert(&mut *tx, violation).await?;
        tracing::warn!(
            "Temperature violation {} at point {}: {}°F is {} ({} severity)",
            violation.id,
            point.id,
            input.recorded_temp_fahrenheit,
            violation_type,
            severity
        );
    }
    tx.commit().await?;
    Ok(Json(log))
}

/// GET /temperature/violations
pub async fn list_violations(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
    Query(filters): Query<ViolationFilters>,
) -> ApiResult<Json<Page<TemperatureViolation>>> {
    let predicate = Predicate::all([
        Predicate::eq_if("monitoring_point_id", filters.monitoring_point_id),
        Predicate::eq_if("status", filters.status),
        Predicate::eq_if("violation_type", filters.violation_type),
        Predicate::eq_if("severity", filters.severity),
    ]);
    paginate(&state.pool, &VIOLATIONS, &params, predicate).await
}

/// PUT /temperature/violations/:id
pub async fn update_violation(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    Json(input): Json<ViolationUpdate>,
) -> ApiResult<Json<TemperatureViolation>> {
    principal.require_admin_or_manager()?;

    let mut tx = state.pool.begin().await?;
    let current = Repository::<TemperatureViolation>::find_404(&mut *tx, id).await?;
    let mut changes = Changeset::new().set_opt("notes", input.notes);
    if let Some(status) = input.status {
        let stamp = transition(Some(current.status), status);
        changes = stamp.apply_time(changes.set("status", status), "resolved_at", Utc::now());
        changes = match stamp {
            Stamp::Set => changes.set("resolved_by", principal.employee_id),
            Stamp::Clear => changes.set("resolved_by", Scalar::Int(None)),
            Stamp::Keep => changes,
        };
    }
    let violation = Repository::<TemperatureViolation>::update(&mut *tx, id, changes).await?;
    tx.commit().await?;
    Ok(Json(violation))
}

/// GET /temperature/due-checks
pub async fn due_checks(State(state): State<AppState>) -> ApiResult<Json<Vec<DueCheck>>> {
    let points = Repository::<MonitoringPoint>::select_where(&state.pool, Predicate::eq("is_active", true)).await?;
    let last: HashMap<i64, DateTime<Utc>> = sqlx::query_as::<_, (i64, DateTime<Utc>)>(
        "SELECT monitoring_point_id, MAX(recorded_at) FROM temperature_logs GROUP BY monitoring_point_id",
    )
    .fetch_all(&state.pool)
    .await?
    .into_iter()
    .collect();

    let now = Utc::now();
    let mut due: Vec<DueCheck> = points
        .into_iter()
        .filter_map(|point| {
            let last_recorded_at = last.get(&point.id).copied();
            is_check_due(last_recorded_at, point.check_frequency_hours, now).then_some(DueCheck {
                point,
                last_recorded_at,
            })
        })
        .collect();
    // Never-logged points first, then the longest overdue
    due.sort_by_key(|check| (check.last_recorded_at.is_some(), check.last_recorded_at));
    Ok(Json(due))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequency_must_be_within_a_year_of_hours() {
        assert!(ensure_frequency(None).is_ok());
        assert!(ensure_frequency(Some(4)).is_ok());
        assert!(ensure_frequency(Some(0)).is_err());
        assert!(ensure_frequency(Some(-1)).is_err());
        assert!(ensure_frequency(Some(i64::MAX)).is_err());
    }

    #[test]
    fn inverted_range_is_rejected() {
        assert!(ensure_range(33.0, 41.0).is_ok());
        assert!(ensure_range(41.0, 41.0).is_ok());
        assert!(ensure_range(41.0, 33.0).is_err());
    }
}
