use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use super::{table, InventoryStatus, Priority};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct InventoryRequest {
    pub id: i64,
    pub request_title: String,
    pub description: String,
    pub requesting_department: Option<i64>,
    pub fulfilling_department: Option<i64>,
    pub requested_by: Option<i64>,
    pub assigned_to: Option<i64>,
    pub item_category: Option<String>,
    pub quantity_requested: Option<String>,
    pub priority: Priority,
    pub status: InventoryStatus,
    pub needed_by_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub requested_date: DateTime<Utc>,
    pub fulfilled_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

table!(InventoryRequest, "inventory_requests", "Inventory request");

/// Append-only status log entry for an inventory request.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct InventoryRequestUpdate {
    pub id: i64,
    pub request_id: i64,
    pub updated_by: Option<i64>,
    pub old_status: Option<InventoryStatus>,
    pub new_status: InventoryStatus,
    pub update_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

table!(InventoryRequestUpdate, "inventory_request_updates", "Inventory update", append_only);
