use crate::{
    api::{self, AuthConfig},
    attendance::Attendance,
    identity::IdentityToolkit,
    store::{MemoryStore, PgStore, Store},
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Option<String>,
    pub identity_url: String,
    pub identity_api_key: SecretString,
    pub federated_timeout_seconds: u64,
    pub frontend_base_url: String,
    pub session_ttl_seconds: i64,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable, the identity client cannot be built, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let store = connect_store(args.dsn.as_deref()).await?;

    let identity = IdentityToolkit::new(
        &args.identity_url,
        args.identity_api_key,
        args.frontend_base_url.clone(),
    )?;

    let attendance = Attendance::new(store, Arc::new(identity))
        .with_federated_timeout(Duration::from_secs(args.federated_timeout_seconds));

    let auth_config =
        AuthConfig::new(args.frontend_base_url).with_session_ttl_seconds(args.session_ttl_seconds);

    api::new(args.port, attendance, auth_config).await
}

async fn connect_store(dsn: Option<&str>) -> Result<Arc<dyn Store>> {
    let Some(dsn) = dsn else {
        warn!("No DSN configured, using the in-memory store");
        return Ok(Arc::new(MemoryStore::new()));
    };

    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(dsn)
        .await
        .context("Failed to connect to database")?;

    let store = PgStore::new(pool);
    store
        .apply_schema()
        .await
        .context("Failed to apply database schema")?;

    info!("Connected to database");

    Ok(Arc::new(store))
}

fn log_startup_args(args: &Args) {
    // Never log credentials embedded in the DSN.
    let database = args.dsn.as_deref().map_or_else(
        || "memory".to_string(),
        |dsn| {
            Url::parse(dsn).map_or_else(
                |_| "postgres (unparsable DSN)".to_string(),
                |url| {
                    format!(
                        "{}://{}{}",
                        url.scheme(),
                        url.host_str().unwrap_or("localhost"),
                        url.path()
                    )
                },
            )
        },
    );

    debug!(
        port = args.port,
        database = %database,
        identity_url = %args.identity_url,
        frontend_base_url = %args.frontend_base_url,
        session_ttl_seconds = args.session_ttl_seconds,
        federated_timeout_seconds = args.federated_timeout_seconds,
        "Starting rollcall"
    );
}
