use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{debug, error, info, trace};

use crate::config::{Settings, initialize_app_state};
use crate::router::create_router;

pub async fn serve(settings: &Settings) -> Result<()> {
    trace!("Entering serve function");
    info!("FinLedger application starting up");
    debug!("Bind address: {}", settings.bind_address);

    let state = initialize_app_state(settings).await?;
    debug!("Application state initialized successfully");

    let app = create_router(state);

    let listener = TcpListener::bind(&settings.bind_address)
        .await
        .with_context(|| format!("Failed to bind to address {}", settings.bind_address))?;

    info!("FinLedger API server running on http://{}", settings.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        settings.bind_address
    );

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server shutdown gracefully");
    Ok(())
}
