use axum::extract::State;
use axum::routing::get;
use axum::Router;
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::PgConnection;

use crate::api::{Json, ListParams, ListSpec, Page, Path, Query};
use crate::app::AppState;
use crate::database::models::{
    Announcement, Complaint, Department, Employee, EmployeeStatus, Equipment, EquipmentMaintenance, EquipmentRepair,
    InventoryRequest, InventoryRequestUpdate, PreOrder, Task, TemperatureLog, TemperatureViolation, TrainingRecord,
    TrainingRequirement, TrainingType, User,
};
use crate::database::{Changeset, Repository};
use crate::error::{ApiError, ApiResult};
use crate::filter::{Predicate, SortDirection};
use crate::handlers::{detach, ensure_exists, paginate};
use crate::middleware::{message, Message};
use crate::policy::{may_create_employee, require, Action, MutationGuard, Principal};

const LIST: ListSpec = ListSpec {
    table: "employees",
    sortable: &["id", "employee_id", "first_name", "last_name", "position", "status", "hire_date", "created_at"],
    searchable: &["first_name", "last_name", "email", "employee_id"],
    default_sort: "id",
    default_order: SortDirection::Asc,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(show).put(update).delete(destroy))
}

#[derive(Debug, Default, Deserialize)]
pub struct EmployeeFilters {
    pub department_id: Option<i64>,
    pub status: Option<EmployeeStatus>,
    pub position: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmployeeCreate {
    pub employee_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub department_id: Option<i64>,
    pub position: Option<String>,
    pub status: Option<EmployeeStatus>,
    pub hire_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct EmployeeUpdate {
    pub employee_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub department_id: Option<i64>,
    pub position: Option<String>,
    pub status: Option<EmployeeStatus>,
    pub hire_date: Option<NaiveDate>,
}

/// GET /employees
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
    Query(filters): Query<EmployeeFilters>,
) -> ApiResult<Json<Page<Employee>>> {
    let predicate = Predicate::all([
        Predicate::eq_if("department_id", filters.department_id),
        Predicate::eq_if("status", filters.status),
        Predicate::eq_if("position", filters.position),
    ]);
    paginate(&state.pool, &LIST, &params, predicate).await
}

/// GET /employees/:id
pub async fn show(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Employee>> {
    Ok(Json(Repository::<Employee>::find_404(&state.pool, id).await?))
}

/// POST /employees
pub async fn create(
    State(state): State<AppState>,
    principal: Principal,
    Json(input): Json<EmployeeCreate>,
) -> ApiResult<Json<Employee>> {
    require(
        may_create_employee(&principal, input.department_id),
        "Not authorized to create employees in this department",
    )?;

    let mut tx = state.pool.begin().await?;
    ensure_business_key_free(&mut tx, &input.employee_id).await?;
    if let Some(department_id) = input.department_id {
        ensure_exists::<Department>(&mut tx, department_id).await?;
    }

    let changes = Changeset::new()
        .set("employee_id", input.employee_id)
        .set("first_name", input.first_name)
        .set("last_name", input.last_name)
        .set_opt("email", input.email)
        .set_opt("phone", input.phone)
        .set_opt("department_id", input.department_id)
        .set_opt("position", input.position)
        .set_opt("status", input.status)
        .set_opt("hire_date", input.hire_date);
    let employee = Repository::<Employee>::insert(&mut *tx, changes).await?;
    tx.commit().await?;

    tracing::info!("Employee {} created by '{}'", employee.employee_id, principal.username);
    Ok(Json(employee))
}

/// PUT /employees/:id
pub async fn update(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    Json(input): Json<EmployeeUpdate>,
) -> ApiResult<Json<Employee>> {
    let mut tx = state.pool.begin().await?;
    let employee = Repository::<Employee>::find_404(&mut *tx, id).await?;
    employee.authorize(&principal, Action::Update)?;

    if let Some(business_key) = input.employee_id.as_deref() {
        if business_key != employee.employee_id {
            ensure_business_key_free(&mut tx, business_key).await?;
        }
    }
    if let Some(department_id) = input.department_id {
        // Moving someone requires authority over the destination as well
        require(
            may_create_employee(&principal, Some(department_id)),
            "Not authorized to move employees into this department",
        )?;
        ensure_exists::<Department>(&mut tx, department_id).await?;
    }

    let changes = Changeset::new()
        .set_opt("employee_id", input.employee_id)
        .set_opt("first_name", input.first_name)
        .set_opt("last_name", input.last_name)
        .set_opt("email", input.email)
        .set_opt("phone", input.phone)
        .set_opt("department_id", input.department_id)
        .set_opt("position", input.position)
        .set_opt("status", input.status)
        .set_opt("hire_date", input.hire_date);
    let employee = Repository::<Employee>::update(&mut *tx, id, changes).await?;
    tx.commit().await?;
    Ok(Json(employee))
}

/// DELETE /employees/:id
///
/// Refused while a user account is linked. Rows that merely mention the
/// employee are detached. Rows that belong to the employee (training, read
/// receipts) cascade.
pub async fn destroy(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> ApiResult<Json<Message>> {
    let mut tx = state.pool.begin().await?;
    let employee = Repository::<Employee>::find_404(&mut *tx, id).await?;
    employee.authorize(&principal, Action::Delete)?;

    let users = Repository::<User>::count_where(&mut *tx, Predicate::eq("employee_id", id)).await?;
    if users > 0 {
        return Err(ApiError::bad_request(format!(
            "Cannot delete employee with ID {} because it is linked to {} user account(s). \
             Unlink or delete the user first.",
            id, users
        )));
    }

    detach::<Department>(&mut tx, "manager_id", id).await?;
    detach::<Task>(&mut tx, "assigned_by", id).await?;
    detach::<Task>(&mut tx, "assigned_to", id).await?;
    detach::<Complaint>(&mut tx, "reported_by", id).await?;
    detach::<Complaint>(&mut tx, "assigned_to", id).await?;
    detach::<PreOrder>(&mut tx, "requested_by", id).await?;
    detach::<PreOrder>(&mut tx, "assigned_to", id).await?;
    detach::<InventoryRequest>(&mut tx, "requested_by", id).await?;
    detach::<InventoryRequest>(&mut tx, "assigned_to", id).await?;
    detach::<InventoryRequestUpdate>(&mut tx, "updated_by", id).await?;
    detach::<Equipment>(&mut tx, "assigned_to", id).await?;
    detach::<EquipmentMaintenance>(&mut tx, "performed_by", id).await?;
    detach::<EquipmentMaintenance>(&mut tx, "created_by", id).await?;
    detach::<EquipmentRepair>(&mut tx, "reported_by", id).await?;
    detach::<EquipmentRepair>(&mut tx, "assigned_to", id).await?;
    detach::<TemperatureLog>(&mut tx, "recorded_by", id).await?;
    detach::<TemperatureViolation>(&mut tx, "resolved_by", id).await?;
    detach::<TrainingType>(&mut tx, "created_by", id).await?;
    detach::<TrainingRecord>(&mut tx, "recorded_by", id).await?;
    detach::<TrainingRequirement>(&mut tx, "assigned_by", id).await?;
    detach::<Announcement>(&mut tx, "created_by", id).await?;

    Repository::<Employee>::delete(&mut *tx, id).await?;
    tx.commit().await?;

    tracing::info!("Employee {} deleted by '{}'", employee.employee_id, principal.username);
    Ok(message("Employee deleted successfully"))
}

async fn ensure_business_key_free(conn: &mut PgConnection, employee_id: &str) -> ApiResult<()> {
    let taken = Repository::<Employee>::count_where(&mut *conn, Predicate::eq("employee_id", employee_id)).await?;
    if taken > 0 {
        return Err(ApiError::bad_request(format!(
            "Employee with ID '{}' already exists",
            employee_id
        )));
    }
    Ok(())
}

