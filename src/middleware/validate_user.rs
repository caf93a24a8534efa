use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};

use super::auth::AuthUser;
use crate::app::AppState;
use crate::database::models::User;
use crate::database::Repository;
use crate::error::ApiError;
use crate::filter::Predicate;
use crate::policy::Principal;

/// Middleware that resolves the token subject to a live user row.
/// Unknown users are unauthenticated; deactivated users are forbidden.
pub async fn validate_user_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // Get AuthUser from JWT middleware
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("JWT authentication required before user validation"))?;

    let user = Repository::<User>::select_one(&state.pool, Predicate::eq("username", auth_user.username.as_str()))
        .await?
        .ok_or_else(|| {
            tracing::warn!("User validation failed: '{}' no longer exists", auth_user.username);
            ApiError::unauthorized("Could not validate credentials")
        })?;

    if !user.is_active {
        tracing::warn!("User validation failed: '{}' is inactive", user.username);
        return Err(ApiError::forbidden("Inactive user"));
    }

    let principal = Principal::from(&user);
    tracing::debug!(
        "User validation successful: {} ({}) department {:?}",
        principal.username,
        principal.role,
        principal.department_id
    );

    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Not authenticated"))
    }
}
