use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use super::{table, ComplaintStatus, Severity};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Complaint {
    pub id: i64,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub complaint_type: String,
    pub description: String,
    pub department_involved: Option<i64>,
    pub reported_by: Option<i64>,
    pub assigned_to: Option<i64>,
    pub severity: Severity,
    pub status: ComplaintStatus,
    pub resolution: Option<String>,
    pub is_private: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

table!(Complaint, "customer_complaints", "Complaint");
