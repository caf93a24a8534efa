use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use super::{table, PreOrderStatus};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PreOrder {
    pub id: i64,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub order_type: String,
    pub description: String,
    pub target_department: Option<i64>,
    pub requested_by: Option<i64>,
    pub assigned_to: Option<i64>,
    pub quantity: Option<i64>,
    pub estimated_price: Option<f64>,
    pub pickup_date: Option<DateTime<Utc>>,
    pub special_instructions: Option<String>,
    pub status: PreOrderStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

table!(PreOrder, "pre_orders", "Pre-order");
