use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::api::{Form, Json};
use crate::app::AppState;
use crate::auth::{generate_jwt, verify_password, Claims};
use crate::database::models::User;
use crate::database::Repository;
use crate::error::{ApiError, ApiResult};
use crate::filter::Predicate;

/// OAuth2 password grant form
#[derive(Debug, Deserialize)]
pub struct TokenForm {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub grant_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

/// POST /auth/token
pub async fn token(State(state): State<AppState>, Form(form): Form<TokenForm>) -> ApiResult<Json<TokenResponse>> {
    let user = Repository::<User>::select_one(&state.pool, Predicate::eq("username", form.username.as_str())).await?;

    let user = match user {
        Some(user) if verify_password(&form.password, &user.password_hash) => user,
        _ => {
            tracing::warn!("Login failed for '{}'", form.username);
            return Err(ApiError::unauthorized("Incorrect username or password"));
        }
    };

    if !user.is_active {
        tracing::warn!("Login refused for inactive user '{}'", user.username);
        return Err(ApiError::forbidden("Inactive user"));
    }

    let access_token = generate_jwt(&Claims::new(user.username.as_str(), user.role.as_str()))?;
    tracing::info!("Issued token for '{}' ({})", user.username, user.role);

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
    }))
}
