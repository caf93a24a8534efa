mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::Api;

async fn history(admin: &Api, request: &Value) -> Result<Value> {
    let res = admin.get(&format!("/inventory/requests/{}/updates", request["id"])).await?;
    anyhow::ensure!(res.status() == StatusCode::OK, "history failed: {}", res.status());
    Ok(res.json().await?)
}

#[tokio::test]
async fn every_status_change_appends_one_audit_row() -> Result<()> {
    let Some(server) = common::server_or_skip().await? else {
        return Ok(());
    };
    let admin = Api::admin(server).await?;
    let department = common::create_department(&admin, "Grocery").await?;
    let request = admin
        .create(
            "/inventory/requests",
            &json!({
                "request_title": "Restock flour",
                "description": "Twenty sacks of bread flour",
                "requesting_department": department,
            }),
        )
        .await?;
    assert_eq!(request["status"], "pending");

    let page = history(&admin, &request).await?;
    assert_eq!(page["pagination"]["total"], 1);
    assert!(page["items"][0]["old_status"].is_null());
    assert_eq!(page["items"][0]["new_status"], "pending");
    assert_eq!(page["items"][0]["update_message"], "Request created");

    let path = format!("/inventory/requests/{}", request["id"]);
    let res = admin.put(&path, &json!({ "status": "approved" })).await?;
    assert_eq!(res.status(), StatusCode::OK);

    // Same status again, or no status at all, leaves the trail alone
    admin.put(&path, &json!({ "status": "approved", "notes": "call supplier" })).await?;
    admin.put(&path, &json!({ "notes": "supplier confirmed" })).await?;

    let page = history(&admin, &request).await?;
    assert_eq!(page["pagination"]["total"], 2);
    assert_eq!(page["items"][1]["old_status"], "pending");
    assert_eq!(page["items"][1]["new_status"], "approved");
    assert_eq!(page["items"][1]["update_message"], "Status changed from pending to approved");

    let entry = admin
        .create(&format!("{}/updates", path), &json!({ "new_status": "in_progress" }))
        .await?;
    assert_eq!(entry["update_message"], "Status updated");
    let entry = admin
        .create(&format!("{}/updates", path), &json!({ "new_status": "fulfilled", "message": "Delivered to aisle 4" }))
        .await?;
    assert_eq!(entry["old_status"], "in_progress");

    let page = history(&admin, &request).await?;
    assert_eq!(page["pagination"]["total"], 4);
    assert_eq!(page["items"][3]["update_message"], "Delivered to aisle 4");

    let current: Value = admin.get(&path).await?.json().await?;
    assert_eq!(current["status"], "fulfilled");
    assert!(!current["fulfilled_date"].is_null());
    Ok(())
}

#[tokio::test]
async fn history_of_unknown_request_is_404() -> Result<()> {
    let Some(server) = common::server_or_skip().await? else {
        return Ok(());
    };
    let admin = Api::admin(server).await?;
    let res = admin.get(&format!("/inventory/requests/{}/updates", i64::MAX)).await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}
