use axum::routing::{get, post};
use axum::Router;

use crate::app::AppState;

pub mod auth;
pub mod root;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root::root))
        .route("/health", get(root::health))
        .route("/auth/token", post(auth::token))
}
