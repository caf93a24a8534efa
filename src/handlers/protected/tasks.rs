use axum::extract::State;
use axum::routing::{get, patch};
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::api::{Json, ListParams, ListSpec, Page, Path, Query};
use crate::app::AppState;
use crate::database::models::{Department, Employee, Task, TaskStatus};
use crate::database::{Changeset, Repository};
use crate::error::{ApiError, ApiResult};
use crate::filter::{Predicate, SortDirection};
use crate::handlers::{ensure_exists, paginate};
use crate::middleware::{message, Message};
use crate::policy::{require, Action, MutationGuard, Principal};
use crate::services::{transition, Stamp};

const LIST: ListSpec = ListSpec {
    table: "tasks",
    sortable: &["id", "title", "status", "is_urgent", "due_date", "created_at", "updated_at"],
    searchable: &["title", "description"],
    default_sort: "created_at",
    default_order: SortDirection::Desc,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/department/:department_id", get(by_department))
        .route("/:id", get(show).put(update).delete(destroy))
        .route("/:id/status", patch(set_status))
}

#[derive(Debug, Default, Deserialize)]
pub struct TaskFilters {
    pub department_id: Option<i64>,
    pub assigned_to: Option<i64>,
    pub status: Option<TaskStatus>,
    pub is_urgent: Option<bool>,
}

impl TaskFilters {
    fn predicate(&self) -> Predicate {
        Predicate::all([
            Predicate::eq_if("department_id", self.department_id),
            Predicate::eq_if("assigned_to", self.assigned_to),
            Predicate::eq_if("status", self.status),
            Predicate::eq_if("is_urgent", self.is_urgent),
        ])
    }
}

#[derive(Debug, Deserialize)]
pub struct TaskCreate {
    pub title: String,
    pub description: Option<String>,
    pub department_id: Option<i64>,
    pub assigned_by: Option<i64>,
    pub assigned_to: Option<i64>,
    pub assigned_to_department: Option<i64>,
    pub is_urgent: Option<bool>,
    pub due_date: Option<DateTime<Utc>>,
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Deserialize)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub department_id: Option<i64>,
    pub assigned_to: Option<i64>,
    pub assigned_to_department: Option<i64>,
    pub is_urgent: Option<bool>,
    pub due_date: Option<DateTime<Utc>>,
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: Option<TaskStatus>,
}

/// Status plus the completion stamp and flag that follow it.
fn with_status(changes: Changeset, from: Option<TaskStatus>, to: TaskStatus) -> Changeset {
    let stamp = transition(from, to);
    let changes = stamp.apply_time(changes.set("status", to), "completed_at", Utc::now());
    match stamp {
        Stamp::Keep => changes,
        _ => changes.set("is_completed", stamp == Stamp::Set),
    }
}

/// GET /tasks
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
    Query(filters): Query<TaskFilters>,
) -> ApiResult<Json<Page<Task>>> {
    paginate(&state.pool, &LIST, &params, filters.predicate()).await
}

/// GET /tasks/department/:department_id
pub async fn by_department(
    State(state): State<AppState>,
    principal: Principal,
    Path(department_id): Path<i64>,
    Query(params): Query<ListParams>,
    Query(filters): Query<TaskFilters>,
) -> ApiResult<Json<Page<Task>>> {
    require(
        principal.is_admin_or_manager() || principal.in_department(Some(department_id)),
        "Not authorized to view tasks for this department",
    )?;
    let predicate = Predicate::all([
        Predicate::any([
            Predicate::eq("department_id", department_id),
            Predicate::eq("assigned_to_department", department_id),
        ]),
        Predicate::eq_if("assigned_to", filters.assigned_to),
        Predicate::eq_if("status", filters.status),
        Predicate::eq_if("is_urgent", filters.is_urgent),
    ]);
    paginate(&state.pool, &LIST, &params, predicate).await
}

/// GET /tasks/:id
pub async fn show(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Task>> {
    Ok(Json(Repository::<Task>::find_404(&state.pool, id).await?))
}

/// POST /tasks
pub async fn create(
    State(state): State<AppState>,
    principal: Principal,
    Json(input): Json<TaskCreate>,
) -> ApiResult<Json<Task>> {
    let mut tx = state.pool.begin().await?;
    for department_id in [input.department_id, input.assigned_to_department].into_iter().flatten() {
        ensure_exists::<Department>(&mut tx, department_id).await?;
    }
    if let Some(assignee) = input.assigned_to {
        ensure_exists::<Employee>(&mut tx, assignee).await?;
    }

    let status = input.status.unwrap_or(TaskStatus::Pending);
    let changes = Changeset::new()
        .set("title", input.title)
        .set_opt("description", input.description)
        .set_opt("department_id", input.department_id)
        .set("assigned_by", input.assigned_by.or(principal.employee_id))
        .set_opt("assigned_to", input.assigned_to)
        .set_opt("assigned_to_department", input.assigned_to_department)
        .set_opt("is_urgent", input.is_urgent)
        .set_opt("due_date", input.due_date);
    let task = Repository::<Task>::insert(&mut *tx, with_status(changes, None, status)).await?;
    tx.commit().await?;

    tracing::info!("Task {} created by '{}'", task.id, principal.username);
    Ok(Json(task))
}

/// PUT /tasks/:id
pub async fn update(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    Json(input): Json<TaskUpdate>,
) -> ApiResult<Json<Task>> {
    let mut tx = state.pool.begin().await?;
    let task = Repository::<Task>::find_404(&mut *tx, id).await?;
    task.authorize(&principal, Action::Update)?;

    let mut changes = Changeset::new()
        .set_opt("title", input.title)
        .set_opt("description", input.description)
        .set_opt("department_id", input.department_id)
        .set_opt("assigned_to", input.assigned_to)
        .set_opt("assigned_to_department", input.assigned_to_department)
        .set_opt("is_urgent", input.is_urgent)
        .set_opt("due_date", input.due_date);
    if let Some(status) = input.status {
        changes = with_status(changes, Some(task.status), status);
    }
    let task = Repository::<Task>::update(&mut *tx, id, changes).await?;
    tx.commit().await?;
    Ok(Json(task))
}

/// PATCH /tasks/:id/status
pub async fn set_status(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    Json(input): Json<StatusChange>,
) -> ApiResult<Json<Task>> {
    let status = input
        .status
        .ok_or_else(|| ApiError::bad_request("Status field is required"))?;

    let mut tx = state.pool.begin().await?;
    let task = Repository::<Task>::find_404(&mut *tx, id).await?;
    task.authorize(&principal, Action::Update)?;
    let task = Repository::<Task>::update(&mut *tx, id, with_status(Changeset::new(), Some(task.status), status)).await?;
    tx.commit().await?;

    tracing::debug!("Task {} moved to {}", id, status);
    Ok(Json(task))
}

/// DELETE /tasks/:id
pub async fn destroy(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> ApiResult<Json<Message>> {
    let mut tx = state.pool.begin().await?;
    let task = Repository::<Task>::find_404(&mut *tx, id).await?;
    task.authorize(&principal, Action::Delete)?;
    Repository::<Task>::delete(&mut *tx, id).await?;
    tx.commit().await?;
    Ok(message("Task deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Scalar;

    #[test]
    fn completing_sets_flag_and_stamp() {
        let changes = with_status(Changeset::new(), Some(TaskStatus::InProgress), TaskStatus::Completed);
        assert!(changes.contains("completed_at"));
        let params = changes.into_params();
        assert_eq!(params.last(), Some(&Scalar::Bool(Some(true))));
    }

    #[test]
    fn reopening_clears_flag_and_stamp() {
        let changes = with_status(Changeset::new(), Some(TaskStatus::Completed), TaskStatus::Pending);
        let params = changes.into_params();
        assert_eq!(
            params,
            vec![Scalar::from(TaskStatus::Pending), Scalar::Time(None), Scalar::Bool(Some(false))]
        );
    }

    #[test]
    fn unrelated_move_leaves_stamp_alone() {
        let changes = with_status(Changeset::new(), Some(TaskStatus::Pending), TaskStatus::InProgress);
        assert!(!changes.contains("completed_at"));
        assert!(!changes.contains("is_completed"));
    }
}
