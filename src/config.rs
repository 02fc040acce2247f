use anyhow::{Context, Result};
use config::{Config, Environment, File};
use sea_orm::{ConnectOptions, Database};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::auth::AuthKeys;
use crate::schemas::AppState;

/// Runtime settings.
///
/// Read from built-in defaults, then an optional `finledger.toml` in the
/// working directory, then `FINLEDGER_*` environment variables. The plain
/// `DATABASE_URL`, `BIND_ADDRESS` and `JWT_SECRET` variables are honoured too.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database_url: String,
    pub bind_address: String,
    pub jwt_secret: String,
    pub token_ttl_minutes: i64,
    pub request_timeout_secs: u64,
}

impl Settings {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = Config::builder()
            .set_default("database_url", "sqlite://finledger.db?mode=rwc")?
            .set_default("bind_address", "0.0.0.0:3000")?
            .set_default("jwt_secret", "change-me")?
            .set_default("token_ttl_minutes", 30)?
            .set_default("request_timeout_secs", 30)?
            .add_source(File::with_name("finledger").required(false))
            .add_source(Environment::with_prefix("FINLEDGER"));

        for (key, var) in [
            ("database_url", "DATABASE_URL"),
            ("bind_address", "BIND_ADDRESS"),
            ("jwt_secret", "JWT_SECRET"),
        ] {
            if let Ok(value) = std::env::var(var) {
                builder = builder.set_override(key, value)?;
            }
        }

        let settings: Settings = builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;
        debug!(
            "Loaded settings: database_url={}, bind_address={}, token_ttl_minutes={}",
            settings.database_url, settings.bind_address, settings.token_ttl_minutes
        );
        Ok(settings)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Connect to the database and build the application state
pub async fn initialize_app_state(settings: &Settings) -> Result<AppState> {
    info!("Connecting to database: {}", settings.database_url);
    let mut options = ConnectOptions::new(settings.database_url.clone());
    options.sqlx_logging(false);

    let db = Database::connect(options)
        .await
        .with_context(|| format!("Failed to connect to database '{}'", settings.database_url))?;

    Ok(AppState {
        db,
        auth: AuthKeys::new(&settings.jwt_secret, settings.token_ttl_minutes),
        request_timeout: settings.request_timeout(),
    })
}
