mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::Api;

#[tokio::test]
async fn new_complaint_goes_to_department_manager() -> Result<()> {
    let Some(server) = common::server_or_skip().await? else {
        return Ok(());
    };
    let admin = Api::admin(server).await?;
    let department = common::create_department(&admin, "Produce").await?;
    common::create_employee(&admin, department, "Clerk").await?;
    let manager = common::create_employee(&admin, department, "Produce Manager").await?;

    let complaint = admin
        .create(
            "/complaints",
            &json!({
                "complaint_type": "quality",
                "description": "Bruised apples",
                "department_involved": department,
            }),
        )
        .await?;
    assert_eq!(complaint["assigned_to"], manager);
    assert_eq!(complaint["status"], "open");

    // No candidate in an empty department leaves it unassigned
    let empty = common::create_department(&admin, "Empty").await?;
    let complaint = admin
        .create(
            "/complaints",
            &json!({ "complaint_type": "quality", "description": "Nobody home", "department_involved": empty }),
        )
        .await?;
    assert!(complaint["assigned_to"].is_null());
    Ok(())
}

#[tokio::test]
async fn staff_never_see_high_severity_or_private() -> Result<()> {
    let Some(server) = common::server_or_skip().await? else {
        return Ok(());
    };
    let admin = Api::admin(server).await?;
    let department = common::create_department(&admin, "Dairy").await?;
    let employee = common::create_employee(&admin, department, "Clerk").await?;
    let staff = admin.user(server, "staff", Some(department), Some(employee)).await?;

    let visible = admin
        .create(
            "/complaints",
            &json!({ "complaint_type": "service", "description": "Slow", "department_involved": department, "severity": "low" }),
        )
        .await?;
    let severe = admin
        .create(
            "/complaints",
            &json!({ "complaint_type": "safety", "description": "Spill", "department_involved": department, "severity": "high" }),
        )
        .await?;
    let private = admin
        .create(
            "/complaints",
            &json!({ "complaint_type": "staff", "description": "HR", "department_involved": department, "is_private": true }),
        )
        .await?;

    let page: Value = staff.get("/complaints?limit=100").await?.json().await?;
    let ids: Vec<i64> = page["items"]
        .as_array()
        .map(|items| items.iter().filter_map(|c| c["id"].as_i64()).collect())
        .unwrap_or_default();
    assert!(ids.contains(&visible["id"].as_i64().unwrap_or_default()));
    assert!(!ids.contains(&severe["id"].as_i64().unwrap_or_default()));
    assert!(!ids.contains(&private["id"].as_i64().unwrap_or_default()));

    let res = staff.get(&format!("/complaints/{}", severe["id"])).await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let res = staff.get(&format!("/complaints/{}", visible["id"])).await?;
    assert_eq!(res.status(), StatusCode::OK);

    // The department's manager sees everything in it
    let manager = admin.user(server, "manager", Some(department), None).await?;
    let res = manager.get(&format!("/complaints/{}", severe["id"])).await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn resolving_stamps_and_reopening_clears() -> Result<()> {
    let Some(server) = common::server_or_skip().await? else {
        return Ok(());
    };
    let admin = Api::admin(server).await?;
    let complaint = admin
        .create("/complaints", &json!({ "complaint_type": "billing", "description": "Double charge" }))
        .await?;
    let path = format!("/complaints/{}", complaint["id"]);

    let resolved: Value = admin.put(&path, &json!({ "status": "resolved" })).await?.json().await?;
    assert!(resolved["resolved_at"].is_string());

    let reopened: Value = admin.put(&path, &json!({ "status": "in_progress" })).await?.json().await?;
    assert!(reopened["resolved_at"].is_null());
    Ok(())
}
