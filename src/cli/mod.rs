//! Command line entry: serve the API or run one-off admin tasks against the database.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sqlx::{Pool, Sqlite};

use crate::config::AppConfig;
use crate::database::db::queries::users;
use crate::{backend, database::db::migrate};

#[derive(Parser, Debug)]
#[command(name = "budget-planner")]
#[command(version, about = "Corporate budget planning service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
    /// Create a login
    CreateUser {
        username: String,
        /// Plain password, hashed with bcrypt before it is stored
        #[arg(long, env = "BUDGET_USER_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        /// Grant the "edit any work" permission
        #[arg(long)]
        admin: bool,
    },
    /// Grant or revoke the "edit any work" permission
    Grant {
        username: String,
        #[arg(long)]
        revoke: bool,
    },
}

pub async fn run(cli: Cli, pool: Pool<Sqlite>, config: &AppConfig) -> Result<()> {
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            migrate::run_migrations(&pool).await?;
            backend::run_server(pool, config).await
        }
        Command::Migrate => migrate::run_migrations(&pool).await,
        Command::CreateUser {
            username,
            password,
            first_name,
            last_name,
            admin,
        } => {
            migrate::run_migrations(&pool).await?;
            create_user(&pool, &username, password, &first_name, &last_name, admin).await
        }
        Command::Grant { username, revoke } => {
            migrate::run_migrations(&pool).await?;
            if !users::set_edit_any_work(&pool, &username, !revoke).await? {
                bail!("no such user: {username}");
            }
            tracing::info!(%username, allowed = !revoke, "permission updated");
            Ok(())
        }
    }
}

async fn create_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: String,
    first_name: &str,
    last_name: &str,
    admin: bool,
) -> Result<()> {
    let username = username.trim();
    if username.is_empty() {
        bail!("username must not be blank");
    }
    if password.is_empty() {
        bail!("password must not be blank");
    }

    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await?
        .context("hashing password")?;
    let id = users::create_user(pool, username, &hash, first_name, last_name, admin)
        .await
        .with_context(|| format!("creating user {username}"))?;

    tracing::info!(user = id, %username, admin, "user created");
    Ok(())
}
