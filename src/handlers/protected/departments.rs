use axum::extract::State;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use crate::api::{Json, ListParams, ListSpec, Page, Path, Query};
use crate::app::AppState;
use crate::database::models::{
    Announcement, AnnouncementRead, Complaint, Department, Employee, Equipment, InventoryRequest, MonitoringPoint,
    PreOrder, Task, User,
};
use crate::database::{Changeset, Repository};
use crate::error::{ApiError, ApiResult};
use crate::filter::{Predicate, SortDirection};
use crate::handlers::{detach, ensure_exists, paginate};
use crate::middleware::{message, Message};
use crate::policy::{Action, MutationGuard, Principal};

const LIST: ListSpec = ListSpec {
    table: "departments",
    sortable: &["id", "name", "department_code", "is_active", "created_at"],
    searchable: &["name", "department_code", "description"],
    default_sort: "name",
    default_order: SortDirection::Asc,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(show).put(update).delete(destroy))
}

#[derive(Debug, Default, Deserialize)]
pub struct DepartmentFilters {
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct DepartmentCreate {
    pub name: String,
    pub department_code: Option<String>,
    pub description: Option<String>,
    pub manager_id: Option<i64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct DepartmentUpdate {
    pub name: Option<String>,
    pub department_code: Option<String>,
    pub description: Option<String>,
    pub manager_id: Option<i64>,
    pub is_active: Option<bool>,
}

/// GET /departments
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
    Query(filters): Query<DepartmentFilters>,
) -> ApiResult<Json<Page<Department>>> {
    paginate(&state.pool, &LIST, &params, Predicate::eq_if("is_active", filters.is_active)).await
}

/// GET /departments/:id
pub async fn show(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Department>> {
    Ok(Json(Repository::<Department>::find_404(&state.pool, id).await?))
}

/// POST /departments
pub async fn create(
    State(state): State<AppState>,
    principal: Principal,
    Json(input): Json<DepartmentCreate>,
) -> ApiResult<Json<Department>> {
    principal.require_admin()?;

    let mut tx = state.pool.begin().await?;
    if let Some(manager_id) = input.manager_id {
        ensure_exists::<Employee>(&mut tx, manager_id).await?;
    }
    let changes = Changeset::new()
        .set("name", input.name)
        .set_opt("department_code", input.department_code)
        .set_opt("description", input.description)
        .set_opt("manager_id", input.manager_id)
        .set_opt("is_active", input.is_active);
    let department = Repository::<Department>::insert(&mut *tx, changes).await?;
    tx.commit().await?;

    tracing::info!("Department '{}' created by '{}'", department.name, principal.username);
    Ok(Json(department))
}

/// PUT /departments/:id
pub async fn update(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    Json(input): Json<DepartmentUpdate>,
) -> ApiResult<Json<Department>> {
    let mut tx = state.pool.begin().await?;
    let department = Repository::<Department>::find_404(&mut *tx, id).await?;
    department.authorize(&principal, Action::Update)?;
    if let Some(manager_id) = input.manager_id {
        ensure_exists::<Employee>(&mut tx, manager_id).await?;
    }

    let changes = Changeset::new()
        .set_opt("name", input.name)
        .set_opt("department_code", input.department_code)
        .set_opt("description", input.description)
        .set_opt("manager_id", input.manager_id)
        .set_opt("is_active", input.is_active);
    let department = Repository::<Department>::update(&mut *tx, id, changes).await?;
    tx.commit().await?;
    Ok(Json(department))
}

/// DELETE /departments/:id
///
/// Refused while employees or users belong to the department. Everything
/// else that points at it is detached first.
pub async fn destroy(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> ApiResult<Json<Message>> {
    let mut tx = state.pool.begin().await?;
    let department = Repository::<Department>::find_404(&mut *tx, id).await?;
    department.authorize(&principal, Action::Delete)?;

    let employees = Repository::<Employee>::count_where(&mut *tx, Predicate::eq("department_id", id)).await?;
    if employees > 0 {
        return Err(ApiError::bad_request(format!(
            "Cannot delete department with ID {} because it has {} employees assigned to it. \
             Reassign or remove employees first.",
            id, employees
        )));
    }
    let users = Repository::<User>::count_where(&mut *tx, Predicate::eq("department_id", id)).await?;
    if users > 0 {
        return Err(ApiError::bad_request(format!(
            "Cannot delete department with ID {} because it has {} users assigned to it. \
             Reassign or remove users first.",
            id, users
        )));
    }

    detach::<Task>(&mut tx, "department_id", id).await?;
    detach::<Task>(&mut tx, "assigned_to_department", id).await?;
    detach::<Complaint>(&mut tx, "department_involved", id).await?;
    detach::<PreOrder>(&mut tx, "target_department", id).await?;
    detach::<InventoryRequest>(&mut tx, "requesting_department", id).await?;
    detach::<InventoryRequest>(&mut tx, "fulfilling_department", id).await?;
    detach::<Equipment>(&mut tx, "department_id", id).await?;
    detach::<MonitoringPoint>(&mut tx, "department_id", id).await?;
    detach::<Announcement>(&mut tx, "target_department", id).await?;
    detach::<AnnouncementRead>(&mut tx, "department_id", id).await?;

    Repository::<Department>::delete(&mut *tx, id).await?;
    tx.commit().await?;

    tracing::info!("Department '{}' deleted by '{}'", department.name, principal.username);
    Ok(message("Department deleted successfully"))
}
