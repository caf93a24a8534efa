use axum::extract::State;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;

use crate::api::{Json, ListParams, ListSpec, Page, Path, Query};
use crate::app::AppState;
use crate::database::models::{Complaint, ComplaintStatus, Department, Severity};
use crate::database::{Changeset, Repository};
use crate::error::ApiResult;
use crate::filter::{Predicate, SortDirection};
use crate::handlers::{ensure_exists, paginate};
use crate::middleware::{message, Message};
use crate::policy::{Action, MutationGuard, Principal, Visibility};
use crate::services::{transition, AssignmentService};

const LIST: ListSpec = ListSpec {
    table: "customer_complaints",
    sortable: &["id", "customer_name", "complaint_type", "severity", "status", "created_at", "updated_at"],
    searchable: &["customer_name", "complaint_type", "description"],
    default_sort: "created_at",
    default_order: SortDirection::Desc,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(show).put(update).delete(destroy))
}

#[derive(Debug, Default, Deserialize)]
pub struct ComplaintFilters {
    pub status: Option<ComplaintStatus>,
    pub severity: Option<Severity>,
    pub department_involved: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ComplaintCreate {
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub complaint_type: String,
    pub description: String,
    pub department_involved: Option<i64>,
    pub assigned_to: Option<i64>,
    pub severity: Option<Severity>,
    pub status: Option<ComplaintStatus>,
    pub resolution: Option<String>,
    pub is_private: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ComplaintUpdate {
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub complaint_type: Option<String>,
    pub description: Option<String>,
    pub department_involved: Option<i64>,
    pub assigned_to: Option<i64>,
    pub severity: Option<Severity>,
    pub status: Option<ComplaintStatus>,
    pub resolution: Option<String>,
    pub is_private: Option<bool>,
}

/// GET /complaints
pub async fn list(
    State(state): State<AppState>,
    principal: Principal,
    Query(params): Query<ListParams>,
    Query(filters): Query<ComplaintFilters>,
) -> ApiResult<Json<Page<Complaint>>> {
    let predicate = Predicate::all([
        Complaint::scope(&principal),
        Predicate::eq_if("status", filters.status),
        Predicate::eq_if("severity", filters.severity),
        Predicate::eq_if("department_involved", filters.department_involved),
    ]);
    paginate(&state.pool, &LIST, &params, predicate).await
}

/// GET /complaints/:id
pub async fn show(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> ApiResult<Json<Complaint>> {
    let complaint = Repository::<Complaint>::find_404(&state.pool, id).await?;
    complaint.ensure_visible(&principal)?;
    Ok(Json(complaint))
}

/// POST /complaints
///
/// Without an explicit assignee the complaint goes to the involved
/// department's manager or lead, when it has one.
pub async fn create(
    State(state): State<AppState>,
    principal: Principal,
    Json(input): Json<ComplaintCreate>,
) -> ApiResult<Json<Complaint>> {
    let mut tx = state.pool.begin().await?;
    if let Some(department_id) = input.department_involved {
        ensure_exists::<Department>(&mut tx, department_id).await?;
    }
    let assigned_to = match input.assigned_to {
        Some(id) => Some(id),
        None => AssignmentService::default_assignee(&mut *tx, input.department_involved).await?,
    };

    let status = input.status.unwrap_or(ComplaintStatus::Open);
    let changes = Changeset::new()
        .set_opt("customer_name", input.customer_name)
        .set_opt("customer_email", input.customer_email)
        .set_opt("customer_phone", input.customer_phone)
        .set("complaint_type", input.complaint_type)
        .set("description", input.description)
        .set_opt("department_involved", input.department_involved)
        .set("reported_by", principal.employee_id)
        .set("assigned_to", assigned_to)
        .set("severity", input.severity.unwrap_or(Severity::Medium))
        .set("status", status)
        .set_opt("resolution", input.resolution)
        .set_opt("is_private", input.is_private);
    let changes = transition(None, status).apply_time(changes, "resolved_at", Utc::now());
    let complaint = Repository::<Complaint>::insert(&mut *tx, changes).await?;
    tx.commit().await?;

    tracing::info!(
        "Complaint {} filed by '{}' (assigned to {:?})",
        complaint.id,
        principal.username,
        complaint.assigned_to
    );
    Ok(Json(complaint))
}

/// PUT /complaints/:id
pub async fn update(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    Json(input): Json<ComplaintUpdate>,
) -> ApiResult<Json<Complaint>> {
    let mut tx = state.pool.begin().await?;
    let complaint = Repository::<Complaint>::find_404(&mut *tx, id).await?;
    complaint.ensure_visible(&principal)?;
    complaint.authorize(&principal, Action::Update)?;

    let mut changes = Changeset::new()
        .set_opt("customer_name", input.customer_name)
        .set_opt("customer_email", input.customer_email)
        .set_opt("customer_phone", input.customer_phone)
        .set_opt("complaint_type", input.complaint_type)
        .set_opt("description", input.description)
        .set_opt("department_involved", input.department_involved)
        .set_opt("assigned_to", input.assigned_to)
        .set_opt("severity", input.severity)
        .set_opt("resolution", input.resolution)
        .set_opt("is_private", input.is_private);
    if let Some(status) = input.status {
        changes = transition(Some(complaint.status), status).apply_time(changes.set("status", status), "resolved_at", Utc::now());
    }
    let complaint = Repository::<Complaint>::update(&mut *tx, id, changes).await?;
    tx.commit().await?;
    Ok(Json(complaint))
}

/// DELETE /complaints/:id
pub async fn destroy(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> ApiResult<Json<Message>> {
    let mut tx = state.pool.begin().await?;
    let complaint = Repository::<Complaint>::find_404(&mut *tx, id).await?;
    complaint.ensure_visible(&principal)?;
    complaint.authorize(&principal, Action::Delete)?;
    Repository::<Complaint>::delete(&mut *tx, id).await?;
    tx.commit().await?;
    Ok(message("Complaint deleted successfully"))
}
