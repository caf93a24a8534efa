use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use super::table;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Department {
    pub id: i64,
    pub name: String,
    pub department_code: Option<String>,
    pub description: Option<String>,
    pub manager_id: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

table!(Department, "departments", "Department");
