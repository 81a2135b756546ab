//! Identity service binary
//!
//! Loads configuration (file, environment, then CLI flags), wires the core
//! service and serves the RPC listener until interrupted.

use anyhow::Context;
use clap::Parser;
use identity_core::api::{self, ApiState};
use identity_core::ServiceConfig;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "identity-server", version, about = "User identity service")]
struct Cli {
    /// Path to a configuration file.
    #[arg(long)]
    config: Option<String>,

    /// Address to bind the RPC listener to.
    #[arg(long)]
    bind: Option<String>,

    /// Environment (development|staging|production).
    #[arg(long)]
    env: Option<String>,

    /// SQLite database URL for the users store.
    #[arg(long)]
    database_url: Option<String>,

    /// Base URL of the authentication service.
    #[arg(long)]
    authentication_service_url: Option<String>,

    /// Base URL of the notification service.
    #[arg(long)]
    notification_service_url: Option<String>,
}

impl Cli {
    fn apply(&self, config: &mut ServiceConfig) {
        if let Some(bind) = &self.bind {
            config.bind_address = bind.clone();
        }
        if let Some(env) = &self.env {
            config.environment = env.clone();
        }
        if let Some(database_url) = &self.database_url {
            config.database_url = database_url.clone();
        }
        if let Some(url) = &self.authentication_service_url {
            config.authentication_service_url = url.clone();
        }
        if let Some(url) = &self.notification_service_url {
            config.notification_service_url = url.clone();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("identity_core=info,identity_server=info,tower_http=info")
        }))
        .init();

    let mut config = ServiceConfig::load(cli.config.as_deref())?;
    cli.apply(&mut config);

    let service = identity_core::init(&config).await?;
    let app = api::router(ApiState {
        service,
        environment: config.environment.clone(),
    });

    let listener = TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address))?;
    info!(
        "listening on {} ({})",
        listener.local_addr()?,
        config.environment
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {}", err);
        return;
    }

    info!("shutting down");
}
