mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::Api;

#[tokio::test]
async fn envelope_tracks_window() -> Result<()> {
    let Some(server) = common::server_or_skip().await? else {
        return Ok(());
    };
    let admin = Api::admin(server).await?;
    let department = common::create_department(&admin, "Pharmacy").await?;
    for title in ["Count pills", "Restock shelves", "Call supplier"] {
        admin.create("/tasks", &json!({ "title": title, "department_id": department })).await?;
    }
    let base = format!("/tasks?department_id={}&sort=title&order=asc", department);

    let page: Value = admin.get(&format!("{}&limit=2&skip=0", base)).await?.json().await?;
    assert_eq!(page["items"].as_array().map(Vec::len), Some(2));
    assert_eq!(page["pagination"]["total"], 3);
    assert_eq!(page["pagination"]["has_more"], true);
    assert_eq!(page["sort"], json!({ "field": "title", "order": "asc" }));
    assert_eq!(page["items"][0]["title"], "Call supplier");

    let page: Value = admin.get(&format!("{}&limit=2&skip=2", base)).await?.json().await?;
    assert_eq!(page["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(page["pagination"]["has_more"], false);

    let page: Value = admin.get(&format!("{}&limit=2&skip=5", base)).await?.json().await?;
    assert_eq!(page["items"].as_array().map(Vec::len), Some(0));
    assert_eq!(page["pagination"]["has_more"], false);
    Ok(())
}

#[tokio::test]
async fn search_matches_title() -> Result<()> {
    let Some(server) = common::server_or_skip().await? else {
        return Ok(());
    };
    let admin = Api::admin(server).await?;
    let department = common::create_department(&admin, "Seafood").await?;
    let marker = common::unique("lobster");
    admin
        .create("/tasks", &json!({ "title": format!("Check {} tank", marker), "department_id": department }))
        .await?;
    admin.create("/tasks", &json!({ "title": "Mop floor", "department_id": department })).await?;

    let page: Value = admin.get(&format!("/tasks?search={}", marker)).await?.json().await?;
    assert_eq!(page["pagination"]["total"], 1);
    Ok(())
}

#[tokio::test]
async fn negative_skip_is_400() -> Result<()> {
    let Some(server) = common::server_or_skip().await? else {
        return Ok(());
    };
    let admin = Api::admin(server).await?;
    let res = admin.get("/tasks?skip=-1").await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}
