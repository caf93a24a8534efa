//! Administered catalogue of permissions and per-role grants.
//!
//! Access checks never consult these tables; they are kept for display
//! and administration.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::routing::{get, post, put};
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::api::{Json, ListParams, ListSpec, Page, Path, Query};
use crate::app::AppState;
use crate::database::models::{Permission, Role, RolePermission};
use crate::database::{Changeset, Repository};
use crate::error::{ApiError, ApiResult};
use crate::filter::{Predicate, SortDirection};
use crate::handlers::{ensure_exists, paginate};
use crate::middleware::{message, Message};
use crate::policy::Principal;

const LIST: ListSpec = ListSpec {
    table: "permissions",
    sortable: &["id", "permission_name", "category", "created_at"],
    searchable: &["permission_name", "description", "category"],
    default_sort: "id",
    default_order: SortDirection::Asc,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/permissions", get(by_role))
        .route("/roles", post(create_grant))
        .route("/roles/:id", put(update_grant).delete(destroy_grant))
        .route("/:id", put(update).delete(destroy))
}

#[derive(Debug, Default, Deserialize)]
pub struct PermissionFilters {
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PermissionCreate {
    pub permission_name: String,
    pub description: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PermissionUpdate {
    pub permission_name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GrantCreate {
    pub role: Role,
    pub permission_id: i64,
    #[serde(default)]
    pub can_view: bool,
    #[serde(default)]
    pub can_create: bool,
    #[serde(default)]
    pub can_edit: bool,
    #[serde(default)]
    pub can_delete: bool,
}

#[derive(Debug, Deserialize)]
pub struct GrantUpdate {
    pub can_view: Option<bool>,
    pub can_create: Option<bool>,
    pub can_edit: Option<bool>,
    pub can_delete: Option<bool>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RoleGrant {
    #[serde(skip)]
    pub role: Role,
    pub permission_id: i64,
    pub permission_name: String,
    pub can_view: bool,
    pub can_create: bool,
    pub can_edit: bool,
    pub can_delete: bool,
}

#[derive(Debug, Serialize)]
pub struct RolesResponse {
    pub roles: BTreeMap<String, Vec<RoleGrant>>,
}

fn group_by_role(grants: Vec<RoleGrant>) -> BTreeMap<String, Vec<RoleGrant>> {
    let mut roles: BTreeMap<String, Vec<RoleGrant>> = BTreeMap::new();
    for grant in grants {
        roles.entry(grant.role.to_string()).or_default().push(grant);
    }
    roles
}

/// GET /permissions
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
    Query(filters): Query<PermissionFilters>,
) -> ApiResult<Json<Page<Permission>>> {
    paginate(&state.pool, &LIST, &params, Predicate::eq_if("category", filters.category)).await
}

/// GET /permissions/permissions: every grant, grouped by role
pub async fn by_role(State(state): State<AppState>) -> ApiResult<Json<RolesResponse>> {
    let grants = sqlx::query_as::<_, RoleGrant>(
        "SELECT rp.role, rp.permission_id, p.permission_name, \
                rp.can_view, rp.can_create, rp.can_edit, rp.can_delete \
         FROM role_permissions rp \
         JOIN permissions p ON p.id = rp.permission_id \
         ORDER BY rp.role, p.permission_name",
    )
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(RolesResponse { roles: group_by_role(grants) }))
}

/// POST /permissions
pub async fn create(
    State(state): State<AppState>,
    principal: Principal,
    Json(input): Json<PermissionCreate>,
) -> ApiResult<Json<Permission>> {
    principal.require_admin()?;

    let mut tx = state.pool.begin().await?;
    let taken = Repository::<Permission>::count_where(
        &mut *tx,
        Predicate::eq("permission_name", input.permission_name.clone()),
    )
    .await?;
    if taken > 0 {
        return Err(ApiError::bad_request(format!(
            "Permission '{}' already exists",
            input.permission_name
        )));
    }
    let changes = Changeset::new()
        .set("permission_name", input.permission_name)
        .set_opt("description", input.description)
        .set_opt("category", input.category);
    let permission = Repository::<Permission>::insert(&mut *tx, changes).await?;
    tx.commit().await?;
    Ok(Json(permission))
}

/// PUT /permissions/:id
pub async fn update(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    Json(input): Json<PermissionUpdate>,
) -> ApiResult<Json<Permission>> {
    principal.require_admin()?;

    let mut tx = state.pool.begin().await?;
    let changes = Changeset::new()
        .set_opt("permission_name", input.permission_name)
        .set_opt("description", input.description)
        .set_opt("category", input.category);
    let permission = Repository::<Permission>::update(&mut *tx, id, changes).await?;
    tx.commit().await?;
    Ok(Json(permission))
}

/// DELETE /permissions/:id. Grants of the permission go with it.
pub async fn destroy(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> ApiResult<Json<Message>> {
    principal.require_admin()?;

    let mut tx = state.pool.begin().await?;
    Repository::<Permission>::find_404(&mut *tx, id).await?;
    Repository::<RolePermission>::delete_where(&mut *tx, Predicate::eq("permission_id", id)).await?;
    Repository::<Permission>::delete(&mut *tx, id).await?;
    tx.commit().await?;
    Ok(message("Permission deleted successfully"))
}

/// POST /permissions/roles
pub async fn create_grant(
    State(state): State<AppState>,
    principal: Principal,
    Json(input): Json<GrantCreate>,
) -> ApiResult<Json<RolePermission>> {
    principal.require_admin()?;

    let mut tx = state.pool.begin().await?;
    ensure_exists::<Permission>(&mut tx, input.permission_id).await?;
    let duplicate = Predicate::all([
        Predicate::eq("role", input.role),
        Predicate::eq("permission_id", input.permission_id),
    ]);
    if Repository::<RolePermission>::count_where(&mut *tx, duplicate).await? > 0 {
        return Err(ApiError::bad_request(format!(
            "Role '{}' already has a grant for permission {}",
            input.role, input.permission_id
        )));
    }
    let changes = Changeset::new()
        .set("role", input.role)
        .set("permission_id", input.permission_id)
        .set("can_view", input.can_view)
        .set("can_create", input.can_create)
        .set("can_edit", input.can_edit)
        .set("can_delete", input.can_delete);
    let grant = Repository::<RolePermission>::insert(&mut *tx, changes).await?;
    tx.commit().await?;

    tracing::info!("Granted permission {} to role '{}'", grant.permission_id, grant.role);
    Ok(Json(grant))
}

/// PUT /permissions/roles/:id
pub async fn update_grant(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    Json(input): Json<GrantUpdate>,
) -> ApiResult<Json<RolePermission>> {
    principal.require_admin()?;

    let mut tx = state.pool.begin().await?;
    let changes = Changeset::new()
        .set_opt("can_view", input.can_view)
        .set_opt("can_create", input.can_create)
        .set_opt("can_edit", input.can_edit)
        .set_opt("can_delete", input.can_delete);
    let grant = Repository::<RolePermission>::update(&mut *tx, id, changes).await?;
    tx.commit().await?;
    Ok(Json(grant))
}

/// DELETE /permissions/roles/:id
pub async fn destroy_grant(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> ApiResult<Json<Message>> {
    principal.require_admin()?;

    let mut tx = state.pool.begin().await?;
    Repository::<RolePermission>::find_404(&mut *tx, id).await?;
    Repository::<RolePermission>::delete(&mut *tx, id).await?;
    tx.commit().await?;
    Ok(message("Role permission deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(role: Role, permission_id: i64, name: &str) -> RoleGrant {
        RoleGrant {
            role,
            permission_id,
            permission_name: name.to_string(),
            can_view: true,
            can_create: false,
            can_edit: false,
            can_delete: false,
        }
    }

    #[test]
    fn grants_group_under_role_names() {
        let roles = group_by_role(vec![
            grant(Role::Admin, 1, "users"),
            grant(Role::Staff, 2, "tasks"),
            grant(Role::Admin, 2, "tasks"),
        ]);
        assert_eq!(roles.keys().collect::<Vec<_>>(), vec!["admin", "staff"]);
        assert_eq!(roles["admin"].len(), 2);

        let body = serde_json::to_value(RolesResponse { roles }).unwrap();
        assert_eq!(body["roles"]["staff"][0]["permission_name"], "tasks");
        assert!(body["roles"]["staff"][0].get("role").is_none());
    }
}
