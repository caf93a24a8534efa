use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use super::{table, Priority};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Announcement {
    pub id: i64,
    pub title: String,
    pub message: String,
    pub announcement_type: Option<String>,
    /// NULL targets every department
    pub target_department: Option<i64>,
    pub created_by: Option<i64>,
    pub priority: Priority,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    /// NULL targets every role
    pub target_roles: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

table!(Announcement, "announcements", "Announcement");

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AnnouncementRead {
    pub id: i64,
    pub announcement_id: i64,
    pub employee_id: i64,
    pub department_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

table!(AnnouncementRead, "announcement_reads", "Announcement read", append_only);
