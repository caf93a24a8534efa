mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::Value;

use common::{Api, PASSWORD};

#[tokio::test]
async fn health_reports_database() -> Result<()> {
    let Some(server) = common::server_or_skip().await? else {
        return Ok(());
    };
    let res = reqwest::get(format!("{}/health", server.base_url)).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["database"], "ok");
    Ok(())
}

#[tokio::test]
async fn wrong_password_is_401() -> Result<()> {
    let Some(server) = common::server_or_skip().await? else {
        return Ok(());
    };
    let admin = Api::admin(server).await?;
    let me: Value = admin.get("/auth/me").await?.json().await?;
    let username = me["username"].as_str().unwrap_or_default().to_string();

    let res = reqwest::Client::new()
        .post(format!("{}/auth/token", server.base_url))
        .form(&[("username", username.as_str()), ("password", "nope")])
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await?;
    assert_eq!(body["message"], "Incorrect username or password");
    Ok(())
}

#[tokio::test]
async fn token_identifies_caller() -> Result<()> {
    let Some(server) = common::server_or_skip().await? else {
        return Ok(());
    };
    let admin = Api::admin(server).await?;

    let me: Value = admin.get("/auth/me").await?.json().await?;
    assert_eq!(me["role"], "admin");
    assert!(me.get("password_hash").is_none());

    let username = me["username"].as_str().unwrap_or_default();
    let again = Api::login(server, username, PASSWORD).await?;
    assert!(!again.token.is_empty());

    let res = admin.post("/auth/logout", &Value::Null).await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn deactivated_user_cannot_log_in() -> Result<()> {
    let Some(server) = common::server_or_skip().await? else {
        return Ok(());
    };
    let admin = Api::admin(server).await?;
    let staff = admin.user(server, "staff", None, None).await?;
    let me: Value = staff.get("/auth/me").await?.json().await?;
    let id = me["id"].as_i64().unwrap_or_default();
    let username = me["username"].as_str().unwrap_or_default().to_string();

    let res = admin.delete(&format!("/users/{}", id)).await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = reqwest::Client::new()
        .post(format!("{}/auth/token", server.base_url))
        .form(&[("username", username.as_str()), ("password", PASSWORD)])
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    Ok(())
}
