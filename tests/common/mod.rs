#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::{Response, StatusCode};
use serde_json::{json, Value};

static SERVER: OnceLock<TestServer> = OnceLock::new();

pub const PASSWORD: &str = "correct horse battery staple";

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        // Spawn the already-built binary to keep start fast during tests
        // Assumes debug profile; adjust if you run tests with --release
        let mut cmd = Command::new("target/debug/store-backoffice");
        cmd.env("STORE_API_PORT", port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

/// The shared server, or `None` when no database is configured.
pub async fn server_or_skip() -> Result<Option<&'static TestServer>> {
    let _ = dotenvy::dotenv();
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("DATABASE_URL not set; skipping");
        return Ok(None);
    }
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(15)).await?;
    Ok(Some(server))
}

/// Short unique suffix so repeated runs never collide on unique columns.
pub fn unique(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &id[..8])
}

/// Authenticated JSON client bound to one user
pub struct Api {
    pub base_url: String,
    pub token: String,
    client: reqwest::Client,
}

impl Api {
    pub async fn login(server: &TestServer, username: &str, password: &str) -> Result<Self> {
        let client = reqwest::Client::new();
        let res = client
            .post(format!("{}/auth/token", server.base_url))
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;
        anyhow::ensure!(res.status() == StatusCode::OK, "login for {} failed: {}", username, res.status());
        let body: Value = res.json().await?;
        let token = body["access_token"].as_str().context("no access_token")?.to_string();
        Ok(Self { base_url: server.base_url.clone(), token, client })
    }

    /// Creates a fresh administrator through the CLI and logs in as it.
    pub async fn admin(server: &TestServer) -> Result<Self> {
        let username = unique("admin");
        let status = Command::new("target/debug/backoffice")
            .args(["create-admin", "--username", &username, "--password", PASSWORD])
            .stdout(Stdio::null())
            .status()
            .context("failed to run backoffice create-admin")?;
        anyhow::ensure!(status.success(), "create-admin exited with {}", status);
        Self::login(server, &username, PASSWORD).await
    }

    /// Creates a user through this (admin) client and logs in as it.
    pub async fn user(&self, server: &TestServer, role: &str, department_id: Option<i64>, employee_id: Option<i64>) -> Result<Self> {
        let username = unique(role);
        let res = self
            .post(
                "/users",
                &json!({
                    "username": username,
                    "password": PASSWORD,
                    "role": role,
                    "department_id": department_id,
                    "employee_id": employee_id,
                }),
            )
            .await?;
        anyhow::ensure!(res.status() == StatusCode::OK, "user create failed: {}", res.text().await?);
        Self::login(server, &username, PASSWORD).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get(&self, path: &str) -> Result<Response> {
        Ok(self.client.get(self.url(path)).bearer_auth(&self.token).send().await?)
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Response> {
        Ok(self.client.post(self.url(path)).bearer_auth(&self.token).json(body).send().await?)
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<Response> {
        Ok(self.client.put(self.url(path)).bearer_auth(&self.token).json(body).send().await?)
    }

    pub async fn patch(&self, path: &str) -> Result<Response> {
        Ok(self.client.patch(self.url(path)).bearer_auth(&self.token).send().await?)
    }

    pub async fn delete(&self, path: &str) -> Result<Response> {
        Ok(self.client.delete(self.url(path)).bearer_auth(&self.token).send().await?)
    }

    /// POST that must succeed; returns the body.
    pub async fn create(&self, path: &str, body: &Value) -> Result<Value> {
        let res = self.post(path, body).await?;
        let status = res.status();
        let body: Value = res.json().await?;
        anyhow::ensure!(status == StatusCode::OK, "POST {} failed with {}: {}", path, status, body);
        Ok(body)
    }
}

pub async fn create_department(admin: &Api, name: &str) -> Result<i64> {
    let body = admin.create("/departments", &json!({ "name": unique(name) })).await?;
    body["id"].as_i64().context("department id")
}

pub async fn create_employee(admin: &Api, department_id: i64, position: &str) -> Result<i64> {
    let body = admin
        .create(
            "/employees",
            &json!({
                "employee_id": unique("E"),
                "first_name": "Test",
                "last_name": position,
                "department_id": department_id,
                "position": position,
                "status": "active",
            }),
        )
        .await?;
    body["id"].as_i64().context("employee id")
}
