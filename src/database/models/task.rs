use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use super::{table, TaskStatus};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub department_id: Option<i64>,
    pub assigned_by: Option<i64>,
    pub assigned_to: Option<i64>,
    pub assigned_to_department: Option<i64>,
    pub is_urgent: bool,
    pub due_date: Option<DateTime<Utc>>,
    pub status: TaskStatus,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

table!(Task, "tasks", "Task");
