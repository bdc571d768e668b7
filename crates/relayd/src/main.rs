//! relayd — the relay messaging hub server binary.
//!
//! Wires together config, the SQLite store, the session authenticator, and
//! the WebSocket server, then runs until SIGINT.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use relay_auth::SessionAuthenticator;
use relay_core::logging::init_subscriber;
use relay_server::config::RelayConfig;
use relay_server::server::RelayServer;
use relay_store::pool::{ConnectionConfig, new_file, new_in_memory};
use relay_store::{ChatStore, run_migrations};
use tracing::{info, warn};

/// Real-time presence and messaging hub.
#[derive(Parser)]
#[command(name = "relayd", version, about)]
struct Args {
    /// Path to a JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind, overriding the configured value.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, overriding the configured value.
    #[arg(long)]
    port: Option<u16>,

    /// SQLite database path. Omit to run on a non-durable in-memory store.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Create three demo users with session tokens and log their credentials.
    #[arg(long)]
    seed_demo_users: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config =
        RelayConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    init_subscriber(&config.log_level);

    let pool_config = ConnectionConfig::default();
    let pool = match &args.db_path {
        Some(path) => {
            let path = path.to_str().context("database path is not valid UTF-8")?;
            info!(path, "opening database");
            new_file(path, &pool_config).context("opening database")?
        }
        None => {
            warn!("no --db-path given, data will not survive a restart");
            new_in_memory(&pool_config).context("opening in-memory database")?
        }
    };
    {
        let conn = pool.get().context("acquiring connection for migrations")?;
        let applied = run_migrations(&conn).context("running migrations")?;
        if applied > 0 {
            info!(applied, "schema migrations applied");
        }
    }

    let store = ChatStore::new(pool.clone());
    if args.seed_demo_users {
        seed_demo_users(&store)?;
    }
    let auth = SessionAuthenticator::new(Arc::new(ChatStore::new(pool)));

    let server = RelayServer::new(config, store, auth);
    let shutdown = server.shutdown_token();
    drop(tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            shutdown.cancel();
        }
    }));

    server.listen().await.context("serving")?;
    Ok(())
}

/// Create a few users with day-long sessions so a fresh instance can be
/// exercised immediately; the tokens are logged for copy-paste.
fn seed_demo_users(store: &ChatStore) -> anyhow::Result<()> {
    for (username, display_name) in [("alice", "Alice"), ("bob", "Bob"), ("carol", "Carol")] {
        let user = store
            .create_user(username, display_name, "demo")
            .with_context(|| format!("seeding user {username}"))?;
        let session = store
            .create_session(user.id, chrono::Duration::hours(24))
            .with_context(|| format!("seeding session for {username}"))?;
        info!(user_id = user.id, username, token = %session.token, "demo user ready");
    }
    Ok(())
}
