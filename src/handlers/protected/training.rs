use axum::extract::State;
use axum::routing::get;
use axum::Router;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{Json, ListParams, ListSpec, Page, Path, Query};
use crate::app::AppState;
use crate::database::models::{
    Employee, RequirementStatus, TrainingRecord, TrainingRecordStatus, TrainingRequirement, TrainingType,
};
use crate::database::{Changeset, Repository};
use crate::error::{ApiError, ApiResult};
use crate::filter::{Predicate, Scalar, SortDirection};
use crate::handlers::{days_param, ensure_exists, paginate};
use crate::middleware::{message, Message};
use crate::policy::{Principal, Visibility};
use crate::services::training::{requirement_due, required_employees, resolve_expiration, VALIDITY_MONTHS};

const TYPES: ListSpec = ListSpec {
    table: "training_types",
    sortable: &["id", "training_name", "validity_period_months", "is_mandatory", "created_at"],
    searchable: &["training_name", "description"],
    default_sort: "training_name",
    default_order: SortDirection::Asc,
};

const RECORDS: ListSpec = ListSpec {
    table: "training_records",
    sortable: &["id", "completed_date", "expiration_date", "status", "created_at"],
    searchable: &["instructor_name", "certificate_number", "notes"],
    default_sort: "completed_date",
    default_order: SortDirection::Desc,
};

const REQUIREMENTS: ListSpec = ListSpec {
    table: "training_requirements",
    sortable: &["id", "required_by_date", "status", "created_at"],
    searchable: &[],
    default_sort: "required_by_date",
    default_order: SortDirection::Asc,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/types", get(list_types).post(create_type))
        .route("/types/:id", get(show_type).put(update_type).delete(destroy_type))
        .route("/records", get(list_records).post(create_record))
        .route("/records/:id", get(show_record).put(update_record).delete(destroy_record))
        .route("/requirements", get(list_requirements).post(create_requirement))
        .route(
            "/requirements/:id",
            get(show_requirement).put(update_requirement).delete(destroy_requirement),
        )
        .route("/expiring", get(expiring))
}

#[derive(Debug, Default, Deserialize)]
pub struct TypeFilters {
    pub is_mandatory: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct TypeCreate {
    pub training_name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub required_for_departments: Vec<i64>,
    #[serde(default)]
    pub required_for_positions: Vec<String>,
    pub validity_period_months: Option<i64>,
    pub is_mandatory: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct TypeUpdate {
    pub training_name: Option<String>,
    pub description: Option<String>,
    pub required_for_departments: Option<Vec<i64>>,
    pub required_for_positions: Option<Vec<String>>,
    pub validity_period_months: Option<i64>,
    pub is_mandatory: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecordFilters {
    pub employee_id: Option<i64>,
    pub training_type_id: Option<i64>,
    pub status: Option<TrainingRecordStatus>,
}

#[derive(Debug, Deserialize)]
pub struct RecordCreate {
    pub employee_id: i64,
    pub training_type_id: i64,
    pub completed_date: NaiveDate,
    pub expiration_date: Option<NaiveDate>,
    pub instructor_name: Option<String>,
    pub certificate_number: Option<String>,
    pub training_score: Option<i64>,
    pub notes: Option<String>,
    pub status: Option<TrainingRecordStatus>,
}

#[derive(Debug, Deserialize)]
pub struct RecordUpdate {
    pub completed_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
    pub instructor_name: Option<String>,
    pub certificate_number: Option<String>,
    pub training_score: Option<i64>,
    pub notes: Option<String>,
    pub status: Option<TrainingRecordStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RequirementFilters {
    pub employee_id: Option<i64>,
    pub training_type_id: Option<i64>,
    pub status: Option<RequirementStatus>,
}

#[derive(Debug, Deserialize)]
pub struct RequirementCreate {
    pub employee_id: i64,
    pub training_type_id: i64,
    pub required_by_date: Option<NaiveDate>,
    pub status: Option<RequirementStatus>,
}

#[derive(Debug, Deserialize)]
pub struct RequirementUpdate {
    pub required_by_date: Option<NaiveDate>,
    pub status: Option<RequirementStatus>,
    pub completed_training_record_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ExpiringQuery {
    pub days_threshold: Option<i64>,
}

/// A training record about to lapse, with the names needed to chase it up
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ExpiringTraining {
    pub id: i64,
    pub employee_id: i64,
    pub employee_name: String,
    pub training_type_id: i64,
    pub training_name: String,
    pub completed_date: NaiveDate,
    pub expiration_date: NaiveDate,
}

fn ensure_validity(months: Option<i64>) -> ApiResult<()> {
    match months {
        Some(m) if !VALIDITY_MONTHS.contains(&m) => Err(ApiError::bad_request(format!(
            "validity_period_months must be between {} and {}",
            VALIDITY_MONTHS.start(),
            VALIDITY_MONTHS.end()
        ))),
        _ => Ok(()),
    }
}

/// GET /training/types
pub async fn list_types(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
    Query(filters): Query<TypeFilters>,
) -> ApiResult<Json<Page<TrainingType>>> {
    paginate(&state.pool, &TYPES, &params, Predicate::eq_if("is_mandatory", filters.is_mandatory)).await
}

/// GET /training/types/:id
pub async fn show_type(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<TrainingType>> {
    Ok(Json(Repository::<TrainingType>::find_404(&state.pool, id).await?))
}

/// POST /training/types
///
/// A mandatory type opens a pending requirement for every active employee
/// it targets.
pub async fn create_type(
    State(state): State<AppState>,
    principal: Principal,
    Json(input): Json<TypeCreate>,
) -> ApiResult<Json<TrainingType>> {
    principal.require_admin_or_manager()?;
    ensure_validity(input.validity_period_months)?;

    let mut tx = state.pool.begin().await?;
    let changes = Changeset::new()
        .set("training_name", input.training_name)
        .set_opt("description", input.description)
        .set("required_for_departments", input.required_for_departments)
        .set("required_for_positions", input.required_for_positions)
        .set_opt("validity_period_months", input.validity_period_months)
        .set_opt("is_mandatory", input.is_mandatory)
        .set("created_by", principal.employee_id);
    let training = Repository::<TrainingType>::insert(&mut *tx, changes).await?;

    if let Some(targets) = required_employees(&training) {
        let employees = Repository::<Employee>::select_where(&mut *tx, targets).await?;
        let due = requirement_due(Utc::now().date_naive());
        for employee in &employees {
            let requirement = Changeset::new()
                .set("employee_id", employee.id)
                .set("training_type_id", training.id)
                .set("required_by_date", due)
                .set("status", RequirementStatus::Pending)
                .set("assigned_by", principal.employee_id);
            Repository::<TrainingRequirement>::insert(&mut *tx, requirement).await?;
        }
        tracing::info!(
            "Training '{}' requires {} employees by {}",
            training.training_name,
            employees.len(),
            due
        );
    }
    tx.commit().await?;
    Ok(Json(training))
}

/// PUT /training/types/:id
pub async fn update_type(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    Json(input): Json<TypeUpdate>,
) -> ApiResult<Json<TrainingType>> {
    principal.require_admin_or_manager()?;
    ensure_validity(input.validity_period_months)?;

    let mut tx = state.pool.begin().await?;
    let changes = Changeset::new()
        .set_opt("training_name", input.training_name)
        .set_opt("description", input.description)
        .set_opt("required_for_departments", input.required_for_departments)
        .set_opt("required_for_positions", input.required_for_positions)
        .set_opt("validity_period_months", input.validity_period_months)
        .set_opt("is_mandatory", input.is_mandatory);
    let training = Repository::<TrainingType>::update(&mut *tx, id, changes).await?;
    tx.commit().await?;
    Ok(Json(training))
}

/// DELETE /training/types/:id
pub async fn destroy_type(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> ApiResult<Json<Message>> {
    principal.require_admin()?;

    let mut tx = state.pool.begin().await?;
    let training = Repository::<TrainingType>::find_404(&mut *tx, id).await?;
    Repository::<TrainingRequirement>::delete_where(&mut *tx, Predicate::eq("training_type_id", id)).await?;
    Repository::<TrainingRecord>::delete_where(&mut *tx, Predicate::eq("training_type_id", id)).await?;
    Repository::<TrainingType>::delete(&mut *tx, id).await?;
    tx.commit().await?;

    tracing::info!("Training type '{}' deleted by '{}'", training.training_name, principal.username);
    Ok(message("Training type deleted successfully"))
}

/// GET /training/records
pub async fn list_records(
    State(state): State<AppState>,
    principal: Principal,
    Query(params): Query<ListParams>,
    Query(filters): Query<RecordFilters>,
) -> ApiResult<Json<Page<TrainingRecord>>> {
    let predicate = Predicate::all([
        TrainingRecord::scope(&principal),
        Predicate::eq_if("employee_id", filters.employee_id),
        Predicate::eq_if("training_type_id", filters.training_type_id),
        Predicate::eq_if("status", filters.status),
    ]);
    paginate(&state.pool, &RECORDS, &params, predicate).await
}

/// GET /training/records/:id
pub async fn show_record(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> ApiResult<Json<TrainingRecord>> {
    let record = Repository::<TrainingRecord>::find_404(&state.pool, id).await?;
    record.ensure_visible(&principal)?;
    Ok(Json(record))
}

/// POST /training/records
///
/// Closes the employee's pending requirements for the same training.
pub async fn create_record(
    State(state): State<AppState>,
    principal: Principal,
    Json(input): Json<RecordCreate>,
) -> ApiResult<Json<TrainingRecord>> {
    principal.require_admin_or_manager()?;

    let mut tx = state.pool.begin().await?;
    ensure_exists::<Employee>(&mut tx, input.employee_id).await?;
    let training = Repository::<TrainingType>::find(&mut *tx, input.training_type_id)
        .await?
        .ok_or_else(|| {
            ApiError::bad_request(format!(
                "Training type with ID {} does not exist",
                input.training_type_id
            ))
        })?;

    let expiration = resolve_expiration(input.expiration_date, input.completed_date, training.validity_period_months);
    let changes = Changeset::new()
        .set("employee_id", input.employee_id)
        .set("training_type_id", training.id)
        .set("completed_date", input.completed_date)
        .set("expiration_date", expiration)
        .set_opt("instructor_name", input.instructor_name)
        .set_opt("certificate_number", input.certificate_number)
        .set_opt("training_score", input.training_score)
        .set_opt("notes", input.notes)
        .set_opt("status", input.status)
        .set("recorded_by", principal.employee_id);
    let record = Repository::<TrainingRecord>::insert(&mut *tx, changes).await?;

    let closed = Repository::<TrainingRequirement>::update_where(
        &mut *tx,
        Predicate::all([
            Predicate::eq("employee_id", record.employee_id),
            Predicate::eq("training_type_id", record.training_type_id),
            Predicate::eq("status", RequirementStatus::Pending),
        ]),
        Changeset::new()
            .set("status", RequirementStatus::Completed)
            .set("completed_training_record_id", record.id),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        "Training record {} for employee {} ({} requirements closed)",
        record.id,
        record.employee_id,
        closed
    );
    Ok(Json(record))
}

/// PUT /training/records/:id
pub async fn update_record(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    Json(input): Json<RecordUpdate>,
) -> ApiResult<Json<TrainingRecord>> {
    principal.require_admin_or_manager()?;

    let mut tx = state.pool.begin().await?;
    let current = Repository::<TrainingRecord>::find_404(&mut *tx, id).await?;
    let mut changes = Changeset::new()
        .set_opt("completed_date", input.completed_date)
        .set_opt("instructor_name", input.instructor_name)
        .set_opt("certificate_number", input.certificate_number)
        .set_opt("training_score", input.training_score)
        .set_opt("notes", input.notes)
        .set_opt("status", input.status);
    match (input.expiration_date, input.completed_date) {
        (Some(explicit), _) => changes = changes.set("expiration_date", explicit),
        (None, Some(completed)) if completed != current.completed_date => {
            let training = Repository::<TrainingType>::find_404(&mut *tx, current.training_type_id).await?;
            let expiration = resolve_expiration(None, completed, training.validity_period_months);
            changes = changes.set("expiration_date", expiration);
        }
        _ => {}
    }
    let record = Repository::<TrainingRecord>::update(&mut *tx, id, changes).await?;
    tx.commit().await?;
    Ok(Json(record))
}

/// DELETE /training/records/:id. Requirements it satisfied become pending again.
pub async fn destroy_record(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> ApiResult<Json<Message>> {
    principal.require_admin_or_manager()?;

    let mut tx = state.pool.begin().await?;
    Repository::<TrainingRecord>::find_404(&mut *tx, id).await?;
    Repository::<TrainingRequirement>::update_where(
        &mut *tx,
        Predicate::eq("completed_training_record_id", id),
        Changeset::new()
            .set("status", RequirementStatus::Pending)
            .set("completed_training_record_id", Scalar::Int(None)),
    )
    .await?;
    Repository::<TrainingRecord>::delete(&mut *tx, id).await?;
    tx.commit().await?;
    Ok(message("Training record deleted successfully"))
}

/// GET /training/requirements
pub async fn list_requirements(
    State(state): State<AppState>,
    principal: Principal,
    Query(params): Query<ListParams>,
    Query(filters): Query<RequirementFilters>,
) -> ApiResult<Json<Page<TrainingRequirement>>> {
    let predicate = Predicate::all([
        TrainingRequirement::scope(&principal),
        Predicate::eq_if("employee_id", filters.employee_id),
        Predicate::eq_if("training_type_id", filters.training_type_id),
        Predicate::eq_if("status", filters.status),
    ]);
    paginate(&state.pool, &REQUIREMENTS, &params, predicate).await
}

/// GET /training/requirements/:id
pub async fn show_requirement(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> ApiResult<Json<TrainingRequirement>> {
    let requirement = Repository::<TrainingRequirement>::find_404(&state.pool, id).await?;
    requirement.ensure_visible(&principal)?;
    Ok(Json(requirement))
}

/// POST /training/requirements
pub async fn create_requirement(
    State(state): State<AppState>,
    principal: Principal,
    Json(input): Json<RequirementCreate>,
) -> ApiResult<Json<TrainingRequirement>> {
    principal.require_admin_or_manager()?;

    let mut tx = state.pool.begin().await?;
    ensure_exists::<Employee>(&mut tx, input.employee_id).await?;
    ensure_exists::<TrainingType>(&mut tx, input.training_type_id).await?;
    let changes = Changeset::new()
        .set("employee_id", input.employee_id)
        .set("training_type_id", input.training_type_id)
        .set(
            "required_by_date",
            input.required_by_date.unwrap_or_else(|| requirement_due(Utc::now().date_naive())),
        )
        .set("status", input.status.unwrap_or(RequirementStatus::Pending))
        .set("assigned_by", principal.employee_id);
    let requirement = Repository::<TrainingRequirement>::insert(&mut *tx, changes).await?;
    tx.commit().await?;
    Ok(Json(requirement))
}

/// PUT /training/requirements/:id
pub async fn update_requirement(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    Json(input): Json<RequirementUpdate>,
) -> ApiResult<Json<TrainingRequirement>> {
    principal.require_admin_or_manager()?;

    let mut tx = state.pool.begin().await?;
    if let Some(record_id) = input.completed_training_record_id {
        ensure_exists::<TrainingRecord>(&mut tx, record_id).await?;
    }
    let changes = Changeset::new()
        .set_opt("required_by_date", input.required_by_date)
        .set_opt("status", input.status)
        .set_opt("completed_training_record_id", input.completed_training_record_id);
    let requirement = Repository::<TrainingRequirement>::update(&mut *tx, id, changes).await?;
    tx.commit().await?;
    Ok(Json(requirement))
}

/// DELETE /training/requirements/:id
pub async fn destroy_requirement(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> ApiResult<Json<Message>> {
    principal.require_admin_or_manager()?;

    let mut tx = state.pool.begin().await?;
    if Repository::<TrainingRequirement>::delete(&mut *tx, id).await? == 0 {
        return Err(ApiError::not_found(format!("Training requirement with ID {} not found", id)));
    }
    tx.commit().await?;
    Ok(message("Training requirement deleted successfully"))
}

/// `[today, today + days_threshold]`, thirty days by default.
fn expiring_window(today: NaiveDate, days_threshold: Option<i64>) -> ApiResult<(NaiveDate, NaiveDate)> {
    let span = days_param(days_threshold, 30, "days_threshold")?;
    let until = today
        .checked_add_signed(span)
        .ok_or_else(|| ApiError::bad_request("days_threshold is out of range"))?;
    Ok((today, until))
}

/// GET /training/expiring?days_threshold=30, soonest first
pub async fn expiring(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<ExpiringQuery>,
) -> ApiResult<Json<Vec<ExpiringTraining>>> {
    let (today, until) = expiring_window(Utc::now().date_naive(), query.days_threshold)?;
    // Staff only ever see their own records
    let own_employee = if principal.is_admin_or_manager() {
        None
    } else {
        Some(principal.employee_id.unwrap_or(-1))
    };

    let rows = sqlx::query_as::<_, ExpiringTraining>(
        "SELECT r.id, r.employee_id, e.first_name || ' ' || e.last_name AS employee_name, \
                r.training_type_id, t.training_name, r.completed_date, r.expiration_date \
         FROM training_records r \
         JOIN employees e ON e.id = r.employee_id \
         JOIN training_types t ON t.id = r.training_type_id \
         WHERE r.expiration_date BETWEEN $1 AND $2 \
           AND ($3::BIGINT IS NULL OR r.employee_id = $3) \
         ORDER BY r.expiration_date ASC, r.id ASC",
    )
    .bind(today)
    .bind(until)
    .bind(own_employee)
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn expiring_window_defaults_to_thirty_days() {
        let (from, until) = expiring_window(date(2026, 10, 14), None).unwrap();
        assert_eq!(from, date(2026, 10, 14));
        assert_eq!(until, date(2026, 11, 13));
    }

    #[test]
    fn expiring_window_rejects_unrepresentable_thresholds() {
        let today = date(2026, 10, 14);
        assert!(expiring_window(today, Some(-1)).is_err());
        assert!(expiring_window(today, Some(1_000_000_000_000)).is_err());
        assert!(expiring_window(today, Some(200_000_000)).is_err());
    }

    #[test]
    fn validity_period_is_bounded() {
        assert!(ensure_validity(None).is_ok());
        assert!(ensure_validity(Some(12)).is_ok());
        assert!(ensure_validity(Some(0)).is_err());
        assert!(ensure_validity(Some(i64::MAX)).is_err());
    }
}
