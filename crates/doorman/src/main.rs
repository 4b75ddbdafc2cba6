//! Doorman - Authentication service with LDAP SSO and admin user management

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

use config::{parse_duration_secs, Config};
use doorman_api::{create_router, AppState};
use doorman_auth::{AuthService, JwtManager, LdapProvider, SsoChain};
use doorman_db::{Database, NewUser, UserRole};
use doorman_mail::{Mailer, NullMailer, SmtpMailer};

/// Doorman - Authentication service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Bind address
    #[arg(long, env = "DOORMAN_BIND")]
    bind: Option<String>,

    /// Port
    #[arg(short, long, env = "DOORMAN_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;

    init_logging(&config.logging.level);

    info!("Starting Doorman v{}", env!("CARGO_PKG_VERSION"));
    config.sanity_check();

    // Create the data directory for the SQLite file
    if let Some(parent) = Path::new(&config.database.path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let db_path = format!("sqlite:{}?mode=rwc", config.database.path);
    let db = Database::new(&db_path).await?;

    // Bootstrap a super user so a fresh install is reachable
    if !db.has_users().await? {
        info!("Creating default super user");
        let password_hash = doorman_auth::hash_password("admin")?;
        db.insert_user(NewUser {
            email: "admin@localhost".to_string(),
            username: "admin".to_string(),
            password_hash: Some(password_hash),
            role: Some(UserRole::SuperUser),
            is_verified: true,
            ..Default::default()
        })
        .await?;
        info!("Default super user created (username: admin, password: admin)");
    }

    // SSO chain; a bad LDAP field map fails startup here
    let mut sso = SsoChain::new();
    if config.ldap.enabled {
        let provider = LdapProvider::new(config.ldap.clone())?;
        sso.register(Arc::new(provider));
        info!("LDAP SSO enabled against {}", config.ldap.server);
    }
    let sso = Arc::new(sso);

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpMailer::new(smtp)?),
        None => Arc::new(NullMailer),
    };

    let jwt = Arc::new(JwtManager::new(
        &config.auth.jwt_secret,
        parse_duration_secs(&config.auth.access_token_ttl)?,
        parse_duration_secs(&config.auth.refresh_token_ttl)?,
    ));

    let auth = Arc::new(AuthService::new(
        db.clone(),
        jwt.clone(),
        sso.clone(),
        mailer,
        config.auth.frontend_url.clone(),
    ));

    let state = AppState::new(db, auth, jwt, sso);

    let app = create_router(state).layer(TraceLayer::new_for_http());

    let bind_addr = args.bind.unwrap_or(config.server.bind_address);
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", bind_addr, port).parse()?;

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Initialize logging
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    info!("Shutdown signal received");
}
