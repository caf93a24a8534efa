//! In-process checks that need no running database.

use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use store_backoffice::app::{router, AppState};
use store_backoffice::config::CONFIG;
use store_backoffice::database::DatabaseManager;

fn app() -> Result<axum::Router> {
    // Never connected: every request below is answered before a query runs
    let pool = DatabaseManager::connect_lazy("postgres://unused@127.0.0.1:1/unused", &CONFIG.database)?;
    Ok(router(AppState::new(pool)))
}

async fn body_json(response: axum::response::Response) -> Result<Value> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[tokio::test]
async fn protected_route_without_token_is_401() -> Result<()> {
    let response = app()?
        .oneshot(Request::builder().uri("/departments").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await?;
    assert_eq!(body["error"], true);
    assert_eq!(body["code"], "UNAUTHORIZED");
    Ok(())
}

#[tokio::test]
async fn garbage_token_is_401() -> Result<()> {
    let request = Request::builder()
        .uri("/tasks")
        .header(header::AUTHORIZATION, "Bearer not-a-jwt")
        .body(Body::empty())?;
    let response = app()?.oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await?["message"], "Could not validate credentials");
    Ok(())
}

#[tokio::test]
async fn root_lists_endpoints_without_auth() -> Result<()> {
    let response = app()?.oneshot(Request::builder().uri("/").body(Body::empty())?).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_json(response).await?["endpoints"].is_object());
    Ok(())
}
