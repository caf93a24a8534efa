use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::FromRow;

use super::{table, RequirementStatus, TrainingRecordStatus};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TrainingType {
    pub id: i64,
    pub training_name: String,
    pub description: Option<String>,
    pub required_for_departments: Vec<i64>,
    pub required_for_positions: Vec<String>,
    pub validity_period_months: Option<i64>,
    pub is_mandatory: bool,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

table!(TrainingType, "training_types", "Training type");

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TrainingRecord {
    pub id: i64,
    pub employee_id: i64,
    pub training_type_id: i64,
    pub completed_date: NaiveDate,
    pub expiration_date: Option<NaiveDate>,
    pub instructor_name: Option<String>,
    pub certificate_number: Option<String>,
    pub training_score: Option<i64>,
    pub notes: Option<String>,
    pub status: TrainingRecordStatus,
    pub recorded_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

table!(TrainingRecord, "training_records", "Training record");

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TrainingRequirement {
    pub id: i64,
    pub employee_id: i64,
    pub training_type_id: i64,
    pub required_by_date: Option<NaiveDate>,
    pub status: RequirementStatus,
    pub assigned_by: Option<i64>,
    pub completed_training_record_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

table!(TrainingRequirement, "training_requirements", "Training requirement");
