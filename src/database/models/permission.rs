use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use super::{table, Role};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Permission {
    pub id: i64,
    pub permission_name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

table!(Permission, "permissions", "Permission");

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RolePermission {
    pub id: i64,
    pub role: Role,
    pub permission_id: i64,
    pub can_view: bool,
    pub can_create: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

table!(RolePermission, "role_permissions", "Role permission");
