use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use super::{table, Severity, ViolationStatus, ViolationType};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MonitoringPoint {
    pub id: i64,
    pub equipment_type: String,
    pub department_id: Option<i64>,
    pub min_temp_fahrenheit: f64,
    pub max_temp_fahrenheit: f64,
    pub check_frequency_hours: i64,
    pub is_active: bool,
    pub equipment_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

table!(MonitoringPoint, "temperature_monitoring_points", "Monitoring point");

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TemperatureLog {
    pub id: i64,
    pub monitoring_point_id: i64,
    pub recorded_temp_fahrenheit: f64,
    pub recorded_by: Option<i64>,
    pub is_within_range: bool,
    pub notes: Option<String>,
    pub shift: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

table!(TemperatureLog, "temperature_logs", "Temperature log", append_only);

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TemperatureViolation {
    pub id: i64,
    pub log_id: i64,
    pub monitoring_point_id: i64,
    pub violation_type: ViolationType,
    pub severity: Severity,
    pub status: ViolationStatus,
    pub notes: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

table!(TemperatureViolation, "temperature_violations", "Violation");
