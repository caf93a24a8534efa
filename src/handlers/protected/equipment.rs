use axum::extract::State;
use axum::routing::{get, put};
use axum::Router;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use sqlx::PgConnection;

use crate::api::{Json, ListParams, ListSpec, Page, Path, Query};
use crate::app::AppState;
use crate::database::models::{
    Department, Equipment, EquipmentMaintenance, EquipmentRepair, EquipmentStatus, MaintenanceStatus, RepairStatus,
    Urgency,
};
use crate::database::{Changeset, DatabaseError, Repository};
use crate::error::ApiResult;
use crate::filter::{Predicate, SortDirection};
use crate::handlers::{ensure_exists, paginate};
use crate::middleware::{message, Message};
use crate::policy::{may_create_equipment, require, Action, MutationGuard, Principal};
use crate::services::{maintenance, transition, Stamp};

const LIST: ListSpec = ListSpec {
    table: "equipment",
    sortable: &["id", "equipment_name", "equipment_type", "status", "next_maintenance_due", "created_at"],
    searchable: &["equipment_name", "equipment_type", "equipment_id", "location"],
    default_sort: "equipment_name",
    default_order: SortDirection::Asc,
};

const MAINTENANCE: ListSpec = ListSpec {
    table: "equipment_maintenance",
    sortable: &["id", "scheduled_date", "completed_date", "status", "created_at"],
    searchable: &["maintenance_type", "maintenance_notes"],
    default_sort: "scheduled_date",
    default_order: SortDirection::Desc,
};

const REPAIRS: ListSpec = ListSpec {
    table: "equipment_repair_requests",
    sortable: &["id", "urgency", "status", "completed_date", "created_at"],
    searchable: &["issue_description", "repair_notes"],
    default_sort: "created_at",
    default_order: SortDirection::Desc,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/maintenance", get(list_maintenance).post(create_maintenance))
        .route("/maintenance/:id", put(update_maintenance))
        .route("/repairs", get(list_repairs).post(create_repair))
        .route("/repairs/:id", put(update_repair))
        .route("/:id", get(show).put(update).delete(destroy))
}

#[derive(Debug, Default, Deserialize)]
pub struct EquipmentFilters {
    pub department_id: Option<i64>,
    pub status: Option<EquipmentStatus>,
    pub equipment_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EquipmentCreate {
    pub equipment_name: String,
    pub equipment_type: String,
    pub equipment_id: Option<String>,
    pub department_id: Option<i64>,
    pub location: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub warranty_expires: Option<NaiveDate>,
    pub assigned_to: Option<i64>,
    pub status: Option<EquipmentStatus>,
    pub next_maintenance_due: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EquipmentUpdate {
    pub equipment_name: Option<String>,
    pub equipment_type: Option<String>,
    pub equipment_id: Option<String>,
    pub department_id: Option<i64>,
    pub location: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub warranty_expires: Option<NaiveDate>,
    pub assigned_to: Option<i64>,
    pub status: Option<EquipmentStatus>,
    pub last_maintenance: Option<NaiveDate>,
    pub next_maintenance_due: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MaintenanceFilters {
    pub equipment_id: Option<i64>,
    pub status: Option<MaintenanceStatus>,
}

#[derive(Debug, Deserialize)]
pub struct MaintenanceCreate {
    pub equipment_id: i64,
    pub maintenance_type: String,
    pub scheduled_date: Option<NaiveDate>,
    pub completed_date: Option<NaiveDate>,
    pub performed_by: Option<i64>,
    pub maintenance_notes: Option<String>,
    pub status: Option<MaintenanceStatus>,
}

#[derive(Debug, Deserialize)]
pub struct MaintenanceUpdate {
    pub maintenance_type: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    pub completed_date: Option<NaiveDate>,
    pub performed_by: Option<i64>,
    pub maintenance_notes: Option<String>,
    pub status: Option<MaintenanceStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RepairFilters {
    pub equipment_id: Option<i64>,
    pub status: Option<RepairStatus>,
    pub urgency: Option<Urgency>,
}

#[derive(Debug, Deserialize)]
pub struct RepairCreate {
    pub equipment_id: i64,
    pub issue_description: String,
    pub urgency: Option<Urgency>,
    pub assigned_to: Option<i64>,
    pub estimated_cost: Option<f64>,
    pub repair_notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RepairUpdate {
    pub issue_description: Option<String>,
    pub urgency: Option<Urgency>,
    pub status: Option<RepairStatus>,
    pub assigned_to: Option<i64>,
    pub estimated_cost: Option<f64>,
    pub repair_notes: Option<String>,
}

/// GET /equipment
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
    Query(filters): Query<EquipmentFilters>,
) -> ApiResult<Json<Page<Equipment>>> {
    let predicate = Predicate::all([
        Predicate::eq_if("department_id", filters.department_id),
        Predicate::eq_if("status", filters.status),
        Predicate::eq_if("equipment_type", filters.equipment_type),
    ]);
    paginate(&state.pool, &LIST, &params, predicate).await
}

/// GET /equipment/:id
pub async fn show(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Equipment>> {
    Ok(Json(Repository::<Equipment>::find_404(&state.pool, id).await?))
}

/// POST /equipment
pub async fn create(
    State(state): State<AppState>,
    principal: Principal,
    Json(input): Json<EquipmentCreate>,
) -> ApiResult<Json<Equipment>> {
    require(
        may_create_equipment(&principal, input.department_id),
        "Not authorized to create equipment in this department",
    )?;

    let mut tx = state.pool.begin().await?;
    if let Some(department_id) = input.department_id {
        ensure_exists::<Department>(&mut tx, department_id).await?;
    }
    let changes = Changeset::new()
        .set("equipment_name", input.equipment_name)
        .set("equipment_type", input.equipment_type)
        .set_opt("equipment_id", input.equipment_id)
        .set_opt("department_id", input.department_id)
        .set_opt("location", input.location)
        .set_opt("purchase_date", input.purchase_date)
        .set_opt("warranty_expires", input.warranty_expires)
        .set_opt("assigned_to", input.assigned_to)
        .set_opt("status", input.status)
        .set_opt("next_maintenance_due", input.next_maintenance_due)
        .set_opt("notes", input.notes);
    let equipment = Repository::<Equipment>::insert(&mut *tx, changes).await?;
    tx.commit().await?;

    tracing::info!("Equipment '{}' registered by '{}'", equipment.equipment_name, principal.username);
    Ok(Json(equipment))
}

/// PUT /equipment/:id
pub async fn update(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    Json(input): Json<EquipmentUpdate>,
) -> ApiResult<Json<Equipment>> {
    let mut tx = state.pool.begin().await?;
    let equipment = Repository::<Equipment>::find_404(&mut *tx, id).await?;
    equipment.authorize(&principal, Action::Update)?;

    let changes = Changeset::new()
        .set_opt("equipment_name", input.equipment_name)
        .set_opt("equipment_type", input.equipment_type)
        .set_opt("equipment_id", input.equipment_id)
        .set_opt("department_id", input.department_id)
        .set_opt("location", input.location)
        .set_opt("purchase_date", input.purchase_date)
        .set_opt("warranty_expires", input.warranty_expires)
        .set_opt("assigned_to", input.assigned_to)
        .set_opt("status", input.status)
        .set_opt("last_maintenance", input.last_maintenance)
        .set_opt("next_maintenance_due", input.next_maintenance_due)
        .set_opt("notes", input.notes);
    let equipment = Repository::<Equipment>::update(&mut *tx, id, changes).await?;
    tx.commit().await?;
    Ok(Json(equipment))
}

/// DELETE /equipment/:id, with its maintenance and repair history
pub async fn destroy(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> ApiResult<Json<Message>> {
    let mut tx = state.pool.begin().await?;
    let equipment = Repository::<Equipment>::find_404(&mut *tx, id).await?;
    equipment.authorize(&principal, Action::Delete)?;
    Repository::<EquipmentMaintenance>::delete_where(&mut *tx, Predicate::eq("equipment_id", id)).await?;
    Repository::<EquipmentRepair>::delete_where(&mut *tx, Predicate::eq("equipment_id", id)).await?;
    Repository::<Equipment>::delete(&mut *tx, id).await?;
    tx.commit().await?;

    tracing::info!("Equipment '{}' deleted by '{}'", equipment.equipment_name, principal.username);
    Ok(message("Equipment deleted successfully"))
}

/// GET /equipment/maintenance
pub async fn list_maintenance(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
    Query(filters): Query<MaintenanceFilters>,
) -> ApiResult<Json<Page<EquipmentMaintenance>>> {
    let predicate = Predicate::all([
        Predicate::eq_if("equipment_id", filters.equipment_id),
        Predicate::eq_if("status", filters.status),
    ]);
    paginate(&state.pool, &MAINTENANCE, &params, predicate).await
}

/// Completion date of a maintenance record: the one supplied, else today.
fn maintenance_stamp(
    changes: Changeset,
    stamp: Stamp,
    supplied: Option<NaiveDate>,
    today: NaiveDate,
) -> (Changeset, Option<NaiveDate>) {
    match stamp {
        Stamp::Set => {
            let date = supplied.unwrap_or(today);
            (changes.set("completed_date", date), Some(date))
        }
        other => (other.apply_date(changes.set_opt("completed_date", supplied), "completed_date", today), None),
    }
}

/// Records the completed maintenance on the equipment itself.
async fn apply_completion(
    conn: &mut PgConnection,
    record: &EquipmentMaintenance,
    completed: NaiveDate,
) -> Result<(), DatabaseError> {
    let equipment = Repository::<Equipment>::find_404(&mut *conn, record.equipment_id).await?;
    let mut changes = Changeset::new().set("last_maintenance", completed);
    if record.maintenance_type == maintenance::REGULAR {
        changes = changes.set("next_maintenance_due", maintenance::next_due(&equipment.equipment_type, completed));
    }
    Repository::<Equipment>::update(&mut *conn, equipment.id, changes).await?;
    tracing::debug!("Equipment {} maintained on {}", equipment.id, completed);
    Ok(())
}

/// POST /equipment/maintenance
pub async fn create_maintenance(
    State(state): State<AppState>,
    principal: Principal,
    Json(input): Json<MaintenanceCreate>,
) -> ApiResult<Json<EquipmentMaintenance>> {
    principal.require_admin_or_manager()?;

    let mut tx = state.pool.begin().await?;
    ensure_exists::<Equipment>(&mut tx, input.equipment_id).await?;

    let status = input.status.unwrap_or(MaintenanceStatus::Scheduled);
    let changes = Changeset::new()
        .set("equipment_id", input.equipment_id)
        .set("maintenance_type", input.maintenance_type)
        .set_opt("scheduled_date", input.scheduled_date)
        .set_opt("performed_by", input.performed_by)
        .set_opt("maintenance_notes", input.maintenance_notes)
        .set("status", status)
        .set("created_by", principal.employee_id);
    let (changes, completed) =
        maintenance_stamp(changes, transition(None, status), input.completed_date, Utc::now().date_naive());
    let record = Repository::<EquipmentMaintenance>::insert(&mut *tx, changes).await?;
    if let Some(completed) = completed {
        apply_completion(&mut tx, &record, completed).await?;
    }
    tx.commit().await?;

    tracing::info!("Maintenance {} scheduled for equipment {}", record.id, record.equipment_id);
    Ok(Json(record))
}

/// PUT /equipment/maintenance/:id
pub async fn update_maintenance(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    Json(input): Json<MaintenanceUpdate>,
) -> ApiResult<Json<EquipmentMaintenance>> {
    let mut tx = state.pool.begin().await?;
    let current = Repository::<EquipmentMaintenance>::find_404(&mut *tx, id).await?;
    current.authorize(&principal, Action::Update)?;

    let mut changes = Changeset::new()
        .set_opt("maintenance_type", input.maintenance_type)
        .set_opt("scheduled_date", input.scheduled_date)
        .set_opt("performed_by", input.performed_by)
        .set_opt("maintenance_notes", input.maintenance_notes);
    let stamp = match input.status {
        Some(status) => {
            changes = changes.set("status", status);
            transition(Some(current.status), status)
        }
        None => Stamp::Keep,
    };
    let (changes, completed) = maintenance_stamp(changes, stamp, input.completed_date, Utc::now().date_naive());
    let record = Repository::<EquipmentMaintenance>::update(&mut *tx, id, changes).await?;
    if let Some(completed) = completed {
        apply_completion(&mut tx, &record, completed).await?;
    }
    tx.commit().await?;
    Ok(Json(record))
}

/// GET /equipment/repairs
pub async fn list_repairs(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
    Query(filters): Query<RepairFilters>,
) -> ApiResult<Json<Page<EquipmentRepair>>> {
    let predicate = Predicate::all([
        Predicate::eq_if("equipment_id", filters.equipment_id),
        Predicate::eq_if("status", filters.status),
        Predicate::eq_if("urgency", filters.urgency),
    ]);
    paginate(&state.pool, &REPAIRS, &params, predicate).await
}

/// POST /equipment/repairs. The equipment is flagged as needing repair.
pub async fn create_repair(
    State(state): State<AppState>,
    principal: Principal,
    Json(input): Json<RepairCreate>,
) -> ApiResult<Json<EquipmentRepair>> {
    let mut tx = state.pool.begin().await?;
    ensure_exists::<Equipment>(&mut tx, input.equipment_id).await?;

    let changes = Changeset::new()
        .set("equipment_id", input.equipment_id)
        .set("reported_by", principal.employee_id)
        .set("issue_description", input.issue_description)
        .set_opt("urgency", input.urgency)
        .set("status", RepairStatus::Reported)
        .set_opt("assigned_to", input.assigned_to)
        .set_opt("estimated_cost", input.estimated_cost)
        .set_opt("repair_notes", input.repair_notes);
    let repair = Repository::<EquipmentRepair>::insert(&mut *tx, changes).await?;
    Repository::<Equipment>::update(
        &mut *tx,
        input.equipment_id,
        Changeset::new().set("status", EquipmentStatus::NeedsRepair),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        "Repair {} reported for equipment {} by '{}'",
        repair.id,
        repair.equipment_id,
        principal.username
    );
    Ok(Json(repair))
}

/// PUT /equipment/repairs/:id. Completion returns the equipment to service.
pub async fn update_repair(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    Json(input): Json<RepairUpdate>,
) -> ApiResult<Json<EquipmentRepair>> {
    let mut tx = state.pool.begin().await?;
    let current = Repository::<EquipmentRepair>::find_404(&mut *tx, id).await?;
    current.authorize(&principal, Action::Update)?;

    let mut changes = Changeset::new()
        .set_opt("issue_description", input.issue_description)
        .set_opt("urgency", input.urgency)
        .set_opt("assigned_to", input.assigned_to)
        .set_opt("estimated_cost", input.estimated_cost)
        .set_opt("repair_notes", input.repair_notes);
    let mut stamp = Stamp::Keep;
    if let Some(status) = input.status {
        stamp = transition(Some(current.status), status);
        changes = stamp.apply_time(changes.set("status", status), "completed_date", Utc::now());
    }
    let repair = Repository::<EquipmentRepair>::update(&mut *tx, id, changes).await?;
    if stamp == Stamp::Set {
        Repository::<Equipment>::update(
            &mut *tx,
            repair.equipment_id,
            Changeset::new().set("status", EquipmentStatus::Operational),
        )
        .await?;
    }
    tx.commit().await?;
    Ok(Json(repair))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Scalar;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn completion_defaults_to_today() {
        let today = date(2026, 10, 14);
        let (changes, completed) = maintenance_stamp(Changeset::new(), Stamp::Set, None, today);
        assert_eq!(completed, Some(today));
        assert_eq!(changes.into_params(), vec![Scalar::from(today)]);
    }

    #[test]
    fn supplied_completion_date_wins() {
        let (_, completed) = maintenance_stamp(Changeset::new(), Stamp::Set, Some(date(2026, 10, 1)), date(2026, 10, 14));
        assert_eq!(completed, Some(date(2026, 10, 1)));
    }

    #[test]
    fn reopening_clears_completion() {
        let (changes, completed) = maintenance_stamp(Changeset::new(), Stamp::Clear, None, date(2026, 10, 14));
        assert_eq!(completed, None);
        assert_eq!(changes.into_params(), vec![Scalar::Date(None)]);
    }
}
