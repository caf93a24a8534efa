use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;

use crate::api::Json;
use crate::app::AppState;
use crate::database::models::User;
use crate::database::Repository;
use crate::error::ApiResult;
use crate::middleware::{message, Message};
use crate::policy::Principal;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/logout", post(logout))
}

/// GET /auth/me
pub async fn me(State(state): State<AppState>, principal: Principal) -> ApiResult<Json<User>> {
    let user = Repository::<User>::find_404(&state.pool, principal.id).await?;
    Ok(Json(user))
}

/// POST /auth/logout. Tokens are stateless; the client discards its copy.
pub async fn logout(principal: Principal) -> Json<Message> {
    tracing::info!("User '{}' logged out", principal.username);
    message("Logged out successfully")
}
