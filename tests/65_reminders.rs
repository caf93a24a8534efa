mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::Api;

#[tokio::test]
async fn someone_elses_reminder_reads_as_missing() -> Result<()> {
    let Some(server) = common::server_or_skip().await? else {
        return Ok(());
    };
    let admin = Api::admin(server).await?;
    let owner = admin.user(server, "staff", None, None).await?;
    let other = admin.user(server, "staff", None, None).await?;

    let reminder = owner
        .create("/reminders", &json!({ "title": "Order flour", "reminder_date": "2030-01-01T09:00:00Z" }))
        .await?;
    let path = format!("/reminders/{}", reminder["id"]);

    assert_eq!(other.get(&path).await?.status(), StatusCode::NOT_FOUND);
    assert_eq!(other.put(&path, &json!({ "title": "Mine now" })).await?.status(), StatusCode::NOT_FOUND);
    let res = other.patch(&format!("{}/complete", path)).await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(other.delete(&path).await?.status(), StatusCode::NOT_FOUND);
    assert_eq!(admin.delete(&path).await?.status(), StatusCode::NOT_FOUND);

    let res = owner.patch(&format!("{}/complete", path)).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["is_completed"], true);
    assert_eq!(body["title"], "Order flour");
    Ok(())
}

#[tokio::test]
async fn upcoming_rejects_unrepresentable_windows() -> Result<()> {
    let Some(server) = common::server_or_skip().await? else {
        return Ok(());
    };
    let admin = Api::admin(server).await?;
    for days in ["-1", "1000000000000", "9223372036854775807"] {
        let res = admin.get(&format!("/reminders/upcoming?days={}", days)).await?;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "days={}", days);
    }
    assert_eq!(admin.get("/reminders/upcoming?days=30").await?.status(), StatusCode::OK);

    let res = admin.get("/training/expiring?days_threshold=1000000000000").await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}
