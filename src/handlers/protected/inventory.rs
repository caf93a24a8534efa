use axum::extract::State;
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgConnection;

use crate::api::{Json, ListParams, ListSpec, Page, Path, Query};
use crate::app::AppState;
use crate::database::models::{Department, InventoryRequest, InventoryRequestUpdate, InventoryStatus, Priority};
use crate::database::{Changeset, DatabaseError, Repository};
use crate::error::{ApiError, ApiResult};
use crate::filter::{Predicate, SortDirection};
use crate::handlers::{ensure_exists, paginate};
use crate::middleware::{message, Message};
use crate::policy::{Action, MutationGuard, Principal};
use crate::services::transition;

const LIST: ListSpec = ListSpec {
    table: "inventory_requests",
    sortable: &["id", "request_title", "priority", "status", "needed_by_date", "requested_date", "created_at"],
    searchable: &["request_title", "description", "item_category"],
    default_sort: "created_at",
    default_order: SortDirection::Desc,
};

const UPDATES: ListSpec = ListSpec {
    table: "inventory_request_updates",
    sortable: &["id", "created_at"],
    searchable: &["update_message"],
    default_sort: "id",
    default_order: SortDirection::Asc,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/requests", get(list).post(create))
        .route("/requests/:id", get(show).put(update).delete(destroy))
        .route("/requests/:id/updates", get(list_updates).post(add_update))
}

#[derive(Debug, Default, Deserialize)]
pub struct InventoryFilters {
    pub status: Option<InventoryStatus>,
    pub priority: Option<Priority>,
    pub requesting_department: Option<i64>,
    pub fulfilling_department: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct InventoryCreate {
    pub request_title: String,
    pub description: String,
    pub requesting_department: Option<i64>,
    pub fulfilling_department: Option<i64>,
    pub assigned_to: Option<i64>,
    pub item_category: Option<String>,
    pub quantity_requested: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<InventoryStatus>,
    pub needed_by_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InventoryUpdate {
    pub request_title: Option<String>,
    pub description: Option<String>,
    pub requesting_department: Option<i64>,
    pub fulfilling_department: Option<i64>,
    pub assigned_to: Option<i64>,
    pub item_category: Option<String>,
    pub quantity_requested: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<InventoryStatus>,
    pub needed_by_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub new_status: InventoryStatus,
    pub message: Option<String>,
}

/// Appends one row to a request's status history.
async fn record_update(
    conn: &mut PgConnection,
    request_id: i64,
    updated_by: Option<i64>,
    old_status: Option<InventoryStatus>,
    new_status: InventoryStatus,
    message: String,
) -> Result<InventoryRequestUpdate, DatabaseError> {
    let changes = Changeset::new()
        .set("request_id", request_id)
        .set("updated_by", updated_by)
        .set("old_status", old_status)
        .set("new_status", new_status)
        .set("update_message", message);
    Repository::<InventoryRequestUpdate>::insert(&mut *conn, changes).await
}

fn status_change_message(from: InventoryStatus, to: InventoryStatus) -> String {
    format!("Status changed from {} to {}", from, to)
}

/// Status plus the fulfilment stamp that follows it.
fn with_status(changes: Changeset, from: Option<InventoryStatus>, to: InventoryStatus) -> Changeset {
    transition(from, to).apply_time(changes.set("status", to), "fulfilled_date", Utc::now())
}

/// GET /inventory/requests
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
    Query(filters): Query<InventoryFilters>,
) -> ApiResult<Json<Page<InventoryRequest>>> {
    let predicate = Predicate::all([
        Predicate::eq_if("status", filters.status),
        Predicate::eq_if("priority", filters.priority),
        Predicate::eq_if("requesting_department", filters.requesting_department),
        Predicate::eq_if("fulfilling_department", filters.fulfilling_department),
    ]);
    paginate(&state.pool, &LIST, &params, predicate).await
}

/// GET /inventory/requests/:id
pub async fn show(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<InventoryRequest>> {
    Ok(Json(Repository::<InventoryRequest>::find_404(&state.pool, id).await?))
}

/// POST /inventory/requests
pub async fn create(
    State(state): State<AppState>,
    principal: Principal,
    Json(input): Json<InventoryCreate>,
) -> ApiResult<Json<InventoryRequest>> {
    let mut tx = state.pool.begin().await?;
    for department_id in [input.requesting_department, input.fulfilling_department].into_iter().flatten() {
        ensure_exists::<Department>(&mut tx, department_id).await?;
    }

    let status = input.status.unwrap_or(InventoryStatus::Pending);
    let changes = Changeset::new()
        .set("request_title", input.request_title)
        .set("description", input.description)
        .set("requesting_department", input.requesting_department.or(principal.department_id))
        .set_opt("fulfilling_department", input.fulfilling_department)
        .set("requested_by", principal.employee_id)
        .set_opt("assigned_to", input.assigned_to)
        .set_opt("item_category", input.item_category)
        .set_opt("quantity_requested", input.quantity_requested)
        .set_opt("priority", input.priority)
        .set_opt("needed_by_date", input.needed_by_date)
        .set_opt("notes", input.notes);
    let request = Repository::<InventoryRequest>::insert(&mut *tx, with_status(changes, None, status)).await?;
    record_update(&mut tx, request.id, principal.employee_id, None, status, "Request created".to_string()).await?;
    tx.commit().await?;

    tracing::info!("Inventory request {} created by '{}'", request.id, principal.username);
    Ok(Json(request))
}

/// PUT /inventory/requests/:id
pub async fn update(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    Json(input): Json<InventoryUpdate>,
) -> ApiResult<Json<InventoryRequest>> {
    let mut tx = state.pool.begin().await?;
    let current = Repository::<InventoryRequest>::find_404(&mut *tx, id).await?;
    current.authorize(&principal, Action::Update)?;

    let mut changes = Changeset::new()
        .set_opt("request_title", input.request_title)
        .set_opt("description", input.description)
        .set_opt("requesting_department", input.requesting_department)
        .set_opt("fulfilling_department", input.fulfilling_department)
        .set_opt("assigned_to", input.assigned_to)
        .set_opt("item_category", input.item_category)
        .set_opt("quantity_requested", input.quantity_requested)
        .set_opt("priority", input.priority)
        .set_opt("needed_by_date", input.needed_by_date)
        .set_opt("notes", input.notes);
    let status_change = input.status.filter(|s| *s != current.status);
    if let Some(status) = status_change {
        changes = with_status(changes, Some(current.status), status);
    }
    let request = Repository::<InventoryRequest>::update(&mut *tx, id, changes).await?;
    if let Some(status) = status_change {
        let text = status_change_message(current.status, status);
        record_update(&mut tx, id, principal.employee_id, Some(current.status), status, text).await?;
    }
    tx.commit().await?;
    Ok(Json(request))
}

/// DELETE /inventory/requests/:id. The status history goes with it.
pub async fn destroy(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> ApiResult<Json<Message>> {
    let mut tx = state.pool.begin().await?;
    let request = Repository::<InventoryRequest>::find_404(&mut *tx, id).await?;
    request.authorize(&principal, Action::Delete)?;
    Repository::<InventoryRequestUpdate>::delete_where(&mut *tx, Predicate::eq("request_id", id)).await?;
    Repository::<InventoryRequest>::delete(&mut *tx, id).await?;
    tx.commit().await?;
    Ok(message("Inventory request deleted successfully"))
}

/// GET /inventory/requests/:id/updates, oldest first
pub async fn list_updates(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Page<InventoryRequestUpdate>>> {
    if !Repository::<InventoryRequest>::exists(&state.pool, id).await? {
        return Err(ApiError::not_found(format!("Inventory request with ID {} not found", id)));
    }
    paginate(&state.pool, &UPDATES, &params, Predicate::eq("request_id", id)).await
}

/// POST /inventory/requests/:id/updates
pub async fn add_update(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    Json(input): Json<StatusUpdate>,
) -> ApiResult<Json<InventoryRequestUpdate>> {
    let mut tx = state.pool.begin().await?;
    let request = Repository::<InventoryRequest>::find_404(&mut *tx, id).await?;
    request.authorize(&principal, Action::Update)?;

    Repository::<InventoryRequest>::update(&mut *tx, id, with_status(Changeset::new(), Some(request.status), input.new_status))
        .await?;
    let text = input.message.unwrap_or_else(|| "Status updated".to_string());
    let entry = record_update(&mut tx, id, principal.employee_id, Some(request.status), input.new_status, text).await?;
    tx.commit().await?;

    tracing::info!(
        "Inventory request {} moved {} -> {} by '{}'",
        id,
        request.status,
        input.new_status,
        principal.username
    );
    Ok(Json(entry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Scalar;

    #[test]
    fn fulfilment_stamps_date() {
        let changes = with_status(Changeset::new(), Some(InventoryStatus::InProgress), InventoryStatus::Fulfilled);
        assert!(changes.contains("fulfilled_date"));
        let changes = with_status(Changeset::new(), Some(InventoryStatus::Fulfilled), InventoryStatus::Approved);
        assert_eq!(changes.into_params()[1], Scalar::Time(None));
    }

    #[test]
    fn status_change_message_names_both_statuses() {
        assert_eq!(
            status_change_message(InventoryStatus::Pending, InventoryStatus::InProgress),
            "Status changed from pending to in_progress"
        );
    }

    #[test]
    fn status_update_requires_known_status() {
        assert!(serde_json::from_str::<StatusUpdate>(r#"{"new_status": "lost"}"#).is_err());
        let update: StatusUpdate = serde_json::from_str(r#"{"new_status": "approved"}"#).unwrap();
        assert_eq!(update.new_status, InventoryStatus::Approved);
        assert!(update.message.is_none());
    }
}
