use axum::extract::State;
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::api::{Json, ListParams, ListSpec, Page, Path, Query};
use crate::app::AppState;
use crate::database::models::{Department, PreOrder, PreOrderStatus};
use crate::database::{Changeset, Repository};
use crate::error::ApiResult;
use crate::filter::{Predicate, SortDirection};
use crate::handlers::{ensure_exists, paginate};
use crate::middleware::{message, Message};
use crate::policy::{Action, MutationGuard, Principal, Visibility};
use crate::services::{transition, AssignmentService};

const LIST: ListSpec = ListSpec {
    table: "pre_orders",
    sortable: &["id", "customer_name", "order_type", "status", "pickup_date", "created_at", "updated_at"],
    searchable: &["customer_name", "order_type", "description"],
    default_sort: "created_at",
    default_order: SortDirection::Desc,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(show).put(update).delete(destroy))
}

#[derive(Debug, Default, Deserialize)]
pub struct PreOrderFilters {
    pub status: Option<PreOrderStatus>,
    pub target_department: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PreOrderCreate {
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub order_type: String,
    pub description: String,
    pub target_department: Option<i64>,
    pub assigned_to: Option<i64>,
    pub quantity: Option<i64>,
    pub estimated_price: Option<f64>,
    pub pickup_date: Option<DateTime<Utc>>,
    pub special_instructions: Option<String>,
    pub status: Option<PreOrderStatus>,
}

#[derive(Debug, Deserialize)]
pub struct PreOrderUpdate {
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub order_type: Option<String>,
    pub description: Option<String>,
    pub target_department: Option<i64>,
    pub assigned_to: Option<i64>,
    pub quantity: Option<i64>,
    pub estimated_price: Option<f64>,
    pub pickup_date: Option<DateTime<Utc>>,
    pub special_instructions: Option<String>,
    pub status: Option<PreOrderStatus>,
}

/// GET /preorders
pub async fn list(
    State(state): State<AppState>,
    principal: Principal,
    Query(params): Query<ListParams>,
    Query(filters): Query<PreOrderFilters>,
) -> ApiResult<Json<Page<PreOrder>>> {
    let predicate = Predicate::all([
        PreOrder::scope(&principal),
        Predicate::eq_if("status", filters.status),
        Predicate::eq_if("target_department", filters.target_department),
    ]);
    paginate(&state.pool, &LIST, &params, predicate).await
}

/// GET /preorders/:id
pub async fn show(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> ApiResult<Json<PreOrder>> {
    let order = Repository::<PreOrder>::find_404(&state.pool, id).await?;
    order.ensure_visible(&principal)?;
    Ok(Json(order))
}

/// POST /preorders
pub async fn create(
    State(state): State<AppState>,
    principal: Principal,
    Json(input): Json<PreOrderCreate>,
) -> ApiResult<Json<PreOrder>> {
    let mut tx = state.pool.begin().await?;
    if let Some(department_id) = input.target_department {
        ensure_exists::<Department>(&mut tx, department_id).await?;
    }
    let assigned_to = match input.assigned_to {
        Some(id) => Some(id),
        None => AssignmentService::default_assignee(&mut *tx, input.target_department).await?,
    };

    let status = input.status.unwrap_or(PreOrderStatus::Pending);
    let changes = Changeset::new()
        .set("customer_name", input.customer_name)
        .set_opt("customer_email", input.customer_email)
        .set_opt("customer_phone", input.customer_phone)
        .set("order_type", input.order_type)
        .set("description", input.description)
        .set_opt("target_department", input.target_department)
        .set("requested_by", principal.employee_id)
        .set("assigned_to", assigned_to)
        .set_opt("quantity", input.quantity)
        .set_opt("estimated_price", input.estimated_price)
        .set_opt("pickup_date", input.pickup_date)
        .set_opt("special_instructions", input.special_instructions)
        .set("status", status);
    let changes = transition(None, status).apply_time(changes, "completed_at", Utc::now());
    let order = Repository::<PreOrder>::insert(&mut *tx, changes).await?;
    tx.commit().await?;

    tracing::info!(
        "Pre-order {} for '{}' created by '{}' (assigned to {:?})",
        order.id,
        order.customer_name,
        principal.username,
        order.assigned_to
    );
    Ok(Json(order))
}

/// PUT /preorders/:id
pub async fn update(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    Json(input): Json<PreOrderUpdate>,
) -> ApiResult<Json<PreOrder>> {
    let mut tx = state.pool.begin().await?;
    let order = Repository::<PreOrder>::find_404(&mut *tx, id).await?;
    order.ensure_visible(&principal)?;
    order.authorize(&principal, Action::Update)?;

    let mut changes = Changeset::new()
        .set_opt("customer_name", input.customer_name)
        .set_opt("customer_email", input.customer_email)
        .set_opt("customer_phone", input.customer_phone)
        .set_opt("order_type", input.order_type)
        .set_opt("description", input.description)
        .set_opt("target_department", input.target_department)
        .set_opt("assigned_to", input.assigned_to)
        .set_opt("quantity", input.quantity)
        .set_opt("estimated_price", input.estimated_price)
        .set_opt("pickup_date", input.pickup_date)
        .set_opt("special_instructions", input.special_instructions);
    if let Some(status) = input.status {
        changes = transition(Some(order.status), status).apply_time(changes.set("status", status), "completed_at", Utc::now());
    }
    let order = Repository::<PreOrder>::update(&mut *tx, id, changes).await?;
    tx.commit().await?;
    Ok(Json(order))
}

/// DELETE /preorders/:id
pub async fn destroy(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> ApiResult<Json<Message>> {
    let mut tx = state.pool.begin().await?;
    let order = Repository::<PreOrder>::find_404(&mut *tx, id).await?;
    order.ensure_visible(&principal)?;
    order.authorize(&principal, Action::Delete)?;
    Repository::<PreOrder>::delete(&mut *tx, id).await?;
    tx.commit().await?;
    Ok(message("Pre-order deleted successfully"))
}
