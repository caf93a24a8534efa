use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use super::{table, ReminderPriority, RepeatType};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Reminder {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub reminder_date: DateTime<Utc>,
    pub priority: ReminderPriority,
    pub is_completed: bool,
    pub repeat_type: RepeatType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

table!(Reminder, "reminders", "Reminder");
