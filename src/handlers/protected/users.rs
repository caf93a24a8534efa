use axum::extract::State;
use axum::routing::{delete, get, patch};
use axum::Router;
use serde::Deserialize;
use sqlx::PgConnection;

use crate::api::{Json, ListParams, ListSpec, Page, Path, Query};
use crate::app::AppState;
use crate::auth::hash_password;
use crate::database::models::{Department, Employee, Reminder, Role, User};
use crate::database::{Changeset, Repository};
use crate::error::{ApiError, ApiResult};
use crate::filter::{Predicate, SortDirection};
use crate::handlers::{ensure_exists, paginate};
use crate::middleware::{message, Message};
use crate::policy::{require, Action, MutationGuard, Principal, Visibility};

const LIST: ListSpec = ListSpec {
    table: "users",
    sortable: &["id", "username", "role", "user_type", "is_active", "created_at"],
    searchable: &["username", "user_type", "role"],
    default_sort: "username",
    default_order: SortDirection::Asc,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(show).put(update).delete(deactivate))
        .route("/:id/permanent", delete(destroy))
        .route("/:id/activate", patch(activate))
        .route("/:id/change-password", patch(change_password))
}

#[derive(Debug, Default, Deserialize)]
pub struct UserFilters {
    pub department_id: Option<i64>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub include_inactive: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UserCreate {
    pub username: String,
    pub password: String,
    pub email: Option<String>,
    pub user_type: Option<String>,
    pub role: Option<Role>,
    pub employee_id: Option<i64>,
    pub department_id: Option<i64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    pub user_type: Option<String>,
    pub role: Option<Role>,
    pub employee_id: Option<i64>,
    pub department_id: Option<i64>,
    pub is_active: Option<bool>,
}

impl UserUpdate {
    /// Fields only an admin may change, even on their own account
    fn touches_privileged(&self) -> bool {
        self.role.is_some() || self.is_active.is_some() || self.department_id.is_some() || self.employee_id.is_some()
    }
}

#[derive(Debug, Deserialize)]
pub struct PasswordChange {
    pub password: Option<String>,
}

/// GET /users
pub async fn list(
    State(state): State<AppState>,
    principal: Principal,
    Query(params): Query<ListParams>,
    Query(filters): Query<UserFilters>,
) -> ApiResult<Json<Page<User>>> {
    principal.require_admin_or_manager()?;

    let activity = match (filters.is_active, filters.include_inactive.unwrap_or(false)) {
        (Some(active), _) => Predicate::eq("is_active", active),
        (None, false) => Predicate::eq("is_active", true),
        (None, true) => Predicate::Always,
    };
    let predicate = Predicate::all([
        User::scope(&principal),
        Predicate::eq_if("department_id", filters.department_id),
        Predicate::eq_if("role", filters.role),
        activity,
    ]);
    paginate(&state.pool, &LIST, &params, predicate).await
}

/// GET /users/:id
pub async fn show(State(state): State<AppState>, principal: Principal, Path(id): Path<i64>) -> ApiResult<Json<User>> {
    let user = Repository::<User>::find_404(&state.pool, id).await?;
    user.ensure_visible(&principal)?;
    Ok(Json(user))
}

/// POST /users
pub async fn create(
    State(state): State<AppState>,
    principal: Principal,
    Json(input): Json<UserCreate>,
) -> ApiResult<Json<User>> {
    principal.require_admin()?;

    let mut tx = state.pool.begin().await?;
    ensure_username_free(&mut tx, &input.username).await?;
    if let Some(employee_id) = input.employee_id {
        ensure_employee_linkable(&mut tx, employee_id).await?;
    }
    if let Some(department_id) = input.department_id {
        ensure_exists::<Department>(&mut tx, department_id).await?;
    }

    let changes = Changeset::new()
        .set("username", input.username.as_str())
        .set("password_hash", hash_password(&input.password)?)
        .set_opt("email", input.email)
        .set_opt("user_type", input.user_type)
        .set("role", input.role.unwrap_or(Role::Staff))
        .set_opt("employee_id", input.employee_id)
        .set_opt("department_id", input.department_id)
        .set_opt("is_active", input.is_active);
    let user = Repository::<User>::insert(&mut *tx, changes).await?;
    tx.commit().await?;

    tracing::info!("User '{}' created by '{}'", user.username, principal.username);
    Ok(Json(user))
}

/// PUT /users/:id
pub async fn update(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    Json(input): Json<UserUpdate>,
) -> ApiResult<Json<User>> {
    let mut tx = state.pool.begin().await?;
    let user = Repository::<User>::find_404(&mut *tx, id).await?;
    require(user.may_update(&principal), "Not authorized to update this user")?;
    if !principal.is_admin() && input.touches_privileged() {
        return Err(ApiError::forbidden("Not authorized to change role or activation status"));
    }

    if let Some(username) = input.username.as_deref() {
        if username != user.username {
            ensure_username_free(&mut tx, username).await?;
        }
    }
    if let Some(employee_id) = input.employee_id {
        if user.employee_id != Some(employee_id) {
            ensure_employee_linkable(&mut tx, employee_id).await?;
        }
    }
    if let Some(department_id) = input.department_id {
        ensure_exists::<Department>(&mut tx, department_id).await?;
    }

    let password_hash = input.password.as_deref().map(hash_password).transpose()?;
    let changes = Changeset::new()
        .set_opt("username", input.username)
        .set_opt("password_hash", password_hash)
        .set_opt("email", input.email)
        .set_opt("user_type", input.user_type)
        .set_opt("role", input.role)
        .set_opt("employee_id", input.employee_id)
        .set_opt("department_id", input.department_id)
        .set_opt("is_active", input.is_active);
    let user = Repository::<User>::update(&mut *tx, id, changes).await?;
    tx.commit().await?;
    Ok(Json(user))
}

/// DELETE /users/:id deactivates the account.
pub async fn deactivate(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> ApiResult<Json<Message>> {
    principal.require_admin()?;
    if id == principal.id {
        return Err(ApiError::bad_request("Cannot delete your own account"));
    }

    let mut tx = state.pool.begin().await?;
    Repository::<User>::update(&mut *tx, id, Changeset::new().set("is_active", false)).await?;
    tx.commit().await?;

    tracing::info!("User {} deactivated by '{}'", id, principal.username);
    Ok(message("User deactivated successfully"))
}

/// DELETE /users/:id/permanent removes the row and what only it owns.
pub async fn destroy(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> ApiResult<Json<Message>> {
    principal.require_admin()?;
    if id == principal.id {
        return Err(ApiError::bad_request("Cannot delete your own account"));
    }

    let mut tx = state.pool.begin().await?;
    let user = Repository::<User>::find_404(&mut *tx, id).await?;
    user.authorize(&principal, Action::Delete)?;
    let reminders = Repository::<Reminder>::delete_where(&mut *tx, Predicate::eq("user_id", id)).await?;
    Repository::<User>::delete(&mut *tx, id).await?;
    tx.commit().await?;

    tracing::info!(
        "User '{}' permanently deleted by '{}' ({} reminders removed)",
        user.username,
        principal.username,
        reminders
    );
    Ok(message("User permanently deleted"))
}

/// PATCH /users/:id/activate
pub async fn activate(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> ApiResult<Json<User>> {
    principal.require_admin()?;
    let mut tx = state.pool.begin().await?;
    let user = Repository::<User>::update(&mut *tx, id, Changeset::new().set("is_active", true)).await?;
    tx.commit().await?;
    Ok(Json(user))
}

/// PATCH /users/:id/change-password
pub async fn change_password(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    Json(input): Json<PasswordChange>,
) -> ApiResult<Json<Message>> {
    let password = input
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::bad_request("Password field is required"))?;
    require(
        principal.is_admin() || principal.id == id,
        "Not authorized to change this user's password",
    )?;

    let mut tx = state.pool.begin().await?;
    Repository::<User>::update(&mut *tx, id, Changeset::new().set("password_hash", hash_password(&password)?)).await?;
    tx.commit().await?;
    Ok(message("Password updated successfully"))
}

async fn ensure_username_free(conn: &mut PgConnection, username: &str) -> ApiResult<()> {
    let taken = Repository::<User>::count_where(&mut *conn, Predicate::eq("username", username)).await?;
    if taken > 0 {
        return Err(ApiError::bad_request(format!("Username '{}' already exists", username)));
    }
    Ok(())
}

async fn ensure_employee_linkable(conn: &mut PgConnection, employee_id: i64) -> ApiResult<()> {
    if !Repository::<Employee>::exists(&mut *conn, employee_id).await? {
        return Err(ApiError::bad_request(format!("Employee with ID {} does not exist", employee_id)));
    }
    let linked = Repository::<User>::count_where(&mut *conn, Predicate::eq("employee_id", employee_id)).await?;
    if linked > 0 {
        return Err(ApiError::bad_request(format!(
            "Employee with ID {} already has a user account",
            employee_id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn privileged_fields_are_detected() {
        let update: UserUpdate = serde_json::from_str(r#"{"email": "a@b.c"}"#).unwrap();
        assert!(!update.touches_privileged());
        let update: UserUpdate = serde_json::from_str(r#"{"role": "admin"}"#).unwrap();
        assert!(update.touches_privileged());
        let update: UserUpdate = serde_json::from_str(r#"{"department_id": 2}"#).unwrap();
        assert!(update.touches_privileged());
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!(serde_json::from_str::<UserCreate>(r#"{"username": "x", "password": "y", "role": "owner"}"#).is_err());
    }
}
