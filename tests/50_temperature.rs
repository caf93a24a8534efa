mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::Api;

async fn violations_for(admin: &Api, point: i64) -> Result<Value> {
    let page: Value = admin
        .get(&format!("/temperature/violations?monitoring_point_id={}", point))
        .await?
        .json()
        .await?;
    Ok(page)
}

#[tokio::test]
async fn out_of_range_reading_opens_one_violation() -> Result<()> {
    let Some(server) = common::server_or_skip().await? else {
        return Ok(());
    };
    let admin = Api::admin(server).await?;
    let department = common::create_department(&admin, "Frozen").await?;
    let point = admin
        .create(
            "/temperature/monitoring-points",
            &json!({
                "equipment_type": "walk-in cooler",
                "department_id": department,
                "min_temp_fahrenheit": 33.0,
                "max_temp_fahrenheit": 40.0,
            }),
        )
        .await?;
    let point_id = point["id"].as_i64().unwrap_or_default();

    let ok = admin
        .create("/temperature/logs", &json!({ "monitoring_point_id": point_id, "recorded_temp_fahrenheit": 40.0 }))
        .await?;
    assert_eq!(ok["is_within_range"], true);
    assert_eq!(violations_for(&admin, point_id).await?["pagination"]["total"], 0);

    let hot = admin
        .create("/temperature/logs", &json!({ "monitoring_point_id": point_id, "recorded_temp_fahrenheit": 55.0 }))
        .await?;
    assert_eq!(hot["is_within_range"], false);

    let page = violations_for(&admin, point_id).await?;
    assert_eq!(page["pagination"]["total"], 1);
    let violation = &page["items"][0];
    assert_eq!(violation["violation_type"], "too_hot");
    assert_eq!(violation["severity"], "high");
    assert_eq!(violation["log_id"], hot["id"]);
    Ok(())
}

#[tokio::test]
async fn inverted_range_and_unknown_point_are_400() -> Result<()> {
    let Some(server) = common::server_or_skip().await? else {
        return Ok(());
    };
    let admin = Api::admin(server).await?;
    let res = admin
        .post(
            "/temperature/monitoring-points",
            &json!({ "equipment_type": "freezer", "min_temp_fahrenheit": 10.0, "max_temp_fahrenheit": -5.0 }),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = admin
        .post("/temperature/logs", &json!({ "monitoring_point_id": i64::MAX, "recorded_temp_fahrenheit": 1.0 }))
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn check_frequency_outside_bounds_is_400() -> Result<()> {
    let Some(server) = common::server_or_skip().await? else {
        return Ok(());
    };
    let admin = Api::admin(server).await?;
    for hours in [0, -4, i64::MAX] {
        let res = admin
            .post(
                "/temperature/monitoring-points",
                &json!({
                    "equipment_type": "freezer",
                    "min_temp_fahrenheit": -10.0,
                    "max_temp_fahrenheit": 0.0,
                    "check_frequency_hours": hours,
                }),
            )
            .await?;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "frequency {}", hours);
    }

    let point = admin
        .create(
            "/temperature/monitoring-points",
            &json!({ "equipment_type": "freezer", "min_temp_fahrenheit": -10.0, "max_temp_fahrenheit": 0.0 }),
        )
        .await?;
    let res = admin
        .put(
            &format!("/temperature/monitoring-points/{}", point["id"]),
            &json!({ "check_frequency_hours": i64::MAX }),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = admin.get("/temperature/due-checks").await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}
