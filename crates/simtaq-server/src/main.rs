//! # SIMTAQ Server
//!
//! Main binary: runs the REST API, applies migrations, and bootstraps the
//! first administrator account.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use simtaq_api::{auth, build_router, AppState};
use simtaq_common::{config::AppConfig, ids::generate_id, models::user::Role};
use simtaq_db::{repository::users, Database};
use std::net::SocketAddr;

#[derive(Parser)]
#[command(name = "simtaq", version, about = "Tahfidz Al-Qur'an school management service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run migrations, then serve the API (default).
    Serve,
    /// Apply pending migrations and exit.
    Migrate,
    /// Create an ADMIN account.
    CreateAdmin {
        #[arg(long)]
        username: String,
        #[arg(long)]
        name: String,
        #[arg(long, env = "SIMTAQ_ADMIN_PASSWORD")]
        password: String,
        #[arg(long)]
        email: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = simtaq_common::config::init()?;
    init_tracing(config);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Migrate => {
            let db = Database::connect(config).await?;
            db.migrate().await
        }
        Command::CreateAdmin {
            username,
            name,
            password,
            email,
        } => create_admin(config, &username, &name, &password, email.as_deref()).await,
    }
}

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "simtaq=debug,tower_http=info".into());

    if config.server.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    }
}

async fn serve(config: &'static AppConfig) -> anyhow::Result<()> {
    if config.auth.jwt_secret.trim().is_empty() {
        bail!("SIMTAQ__AUTH__JWT_SECRET must be set");
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), school = %config.school.name, "Starting SIMTAQ");

    let db = Database::connect(config).await?;
    db.migrate().await?;

    let state = AppState::new(db, config)?;
    state.storage.ensure_root().await?;
    tracing::info!(dir = %state.storage.root().display(), "Upload storage ready");

    let router = build_router(state);
    let addr = SocketAddr::new(
        config.server.host.parse().context("invalid server.host")?,
        config.server.port,
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("REST API listening on http://{addr}");
    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

async fn create_admin(
    config: &AppConfig,
    username: &str,
    name: &str,
    password: &str,
    email: Option<&str>,
) -> anyhow::Result<()> {
    if password.len() < 8 {
        bail!("password must be at least 8 characters");
    }

    let db = Database::connect(config).await?;
    db.migrate().await?;

    if users::username_taken(&db.pg, username, Role::Admin).await? {
        bail!("admin username '{username}' already exists");
    }

    let password_hash = auth::hash_password_async(password.to_string()).await?;
    let user = users::create_user(
        &db.pg,
        users::NewUser {
            id: generate_id(),
            username,
            name,
            email,
            password_hash: &password_hash,
            role: Role::Admin,
            is_active: true,
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, username = %user.username, "Admin account created");
    Ok(())
}
