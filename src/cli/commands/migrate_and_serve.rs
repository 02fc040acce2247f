use anyhow::Result;
use tracing::{info, trace};

use super::initdb::run_migrations;
use super::serve::serve;
use crate::config::Settings;

pub async fn migrate_and_serve(settings: &Settings) -> Result<()> {
    trace!("Entering migrate_and_serve function");
    info!("Applying database migrations and starting server");

    // The migration connection is dropped before the server opens its own pool
    let db = run_migrations(&settings.database_url).await?;
    db.close().await?;

    serve(settings).await
}
