use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::{json, Value};

use crate::api::Json;
use crate::app::AppState;
use crate::database::DatabaseManager;

pub async fn root() -> Json<Value> {
    Json(json!({
        "name": "Store Back Office API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "auth": "/auth/token (public), /auth/me, /auth/logout",
            "staff": "/users, /departments, /employees",
            "operations": "/tasks, /complaints, /preorders, /inventory",
            "facilities": "/equipment, /temperature",
            "people": "/training, /announcements, /reminders, /permissions",
            "health": "/health (public)"
        }
    }))
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({"status": "ok", "timestamp": now, "database": "ok"})),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"status": "degraded", "timestamp": now, "database": "unavailable"})),
            )
        }
    }
}
