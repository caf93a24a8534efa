use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::FromRow;

use super::{table, EquipmentStatus, MaintenanceStatus, RepairStatus, Urgency};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Equipment {
    pub id: i64,
    pub equipment_name: String,
    pub equipment_type: String,
    /// Asset tag
    pub equipment_id: Option<String>,
    pub department_id: Option<i64>,
    pub location: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub warranty_expires: Option<NaiveDate>,
    pub assigned_to: Option<i64>,
    pub status: EquipmentStatus,
    pub last_maintenance: Option<NaiveDate>,
    pub next_maintenance_due: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

table!(Equipment, "equipment", "Equipment");

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EquipmentMaintenance {
    pub id: i64,
    pub equipment_id: i64,
    pub maintenance_type: String,
    pub scheduled_date: Option<NaiveDate>,
    pub completed_date: Option<NaiveDate>,
    pub performed_by: Option<i64>,
    pub maintenance_notes: Option<String>,
    pub status: MaintenanceStatus,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

table!(EquipmentMaintenance, "equipment_maintenance", "Maintenance record");

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EquipmentRepair {
    pub id: i64,
    pub equipment_id: i64,
    pub reported_by: Option<i64>,
    pub issue_description: String,
    pub urgency: Urgency,
    pub status: RepairStatus,
    pub assigned_to: Option<i64>,
    pub estimated_cost: Option<f64>,
    pub repair_notes: Option<String>,
    pub completed_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

table!(EquipmentRepair, "equipment_repair_requests", "Repair request");
