use axum::http::HeaderValue;
use axum::{middleware, Router};
use sqlx::PgPool;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::{Environment, CONFIG};
use crate::handlers::{protected, public};
use crate::middleware::{jwt_auth_middleware, validate_user_middleware};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub fn router(state: AppState) -> Router {
    let protected = protected::routes()
        // Layers run outside-in: the token is verified before the user lookup
        .route_layer(middleware::from_fn_with_state(state.clone(), validate_user_middleware))
        .route_layer(middleware::from_fn(jwt_auth_middleware));

    let mut app = Router::new().merge(public::routes()).merge(protected).with_state(state);

    if CONFIG.security.enable_cors {
        app = app.layer(cors_layer());
    }
    if CONFIG.api.enable_request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }
    app
}

fn cors_layer() -> CorsLayer {
    if matches!(CONFIG.environment, Environment::Development) {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = CONFIG
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}
