use clap::Args;
use serde_json::json;

use crate::auth::hash_password;
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::CONFIG;
use crate::database::models::{Role, User};
use crate::database::{Changeset, DatabaseManager, Repository};
use crate::filter::Predicate;

#[derive(Debug, Args)]
pub struct CreateAdminArgs {
    #[arg(long, help = "Login name")]
    pub username: String,

    #[arg(long, help = "Plain-text password, stored as an argon2 hash")]
    pub password: String,

    #[arg(long, help = "Contact email")]
    pub email: Option<String>,

    #[arg(long, help = "Row id of the employee this account belongs to")]
    pub employee_id: Option<i64>,
}

pub async fn handle(args: CreateAdminArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let pool = DatabaseManager::connect(&CONFIG.database).await?;
    let mut tx = pool.begin().await?;

    let taken = Repository::<User>::count_where(&mut *tx, Predicate::eq("username", args.username.clone())).await?;
    if taken > 0 {
        anyhow::bail!("Username '{}' already registered", args.username);
    }

    let changes = Changeset::new()
        .set("username", args.username)
        .set("password_hash", hash_password(&args.password)?)
        .set_opt("email", args.email)
        .set("role", Role::Admin)
        .set_opt("employee_id", args.employee_id)
        .set("is_active", true);
    let user = Repository::<User>::insert(&mut *tx, changes).await?;
    tx.commit().await?;

    tracing::info!("Administrator '{}' created", user.username);
    output_success(
        &output_format,
        &format!("Administrator '{}' created", user.username),
        Some(json!({ "id": user.id, "username": user.username })),
    )
}
