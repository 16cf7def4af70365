//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own.
//!
//! ## Intended use
//! This binary is useful for development and debugging when you only want the REST server (with
//! OpenAPI/Swagger UI) and no `.env` handling or API key enforcement. The workspace's main
//! `cpm-run` binary is the production entry point.

use api_rest::{router, AppState};
use cpm_core::{constants::DEFAULT_CLINIC_DATA_DIR, CoreConfig, DischargePolicy};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("cpm=debug".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let clinic_data_dir = std::env::var("CLINIC_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CLINIC_DATA_DIR));
    let rest_addr = std::env::var("CPM_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let policy = DischargePolicy::from_env_values(
        std::env::var("CPM_INACTIVITY_WINDOW_DAYS").ok(),
        std::env::var("CPM_MIN_ATTENDED_SESSIONS").ok(),
    )?;
    let cfg = Arc::new(CoreConfig::new(clinic_data_dir, policy)?);

    tracing::info!("++ Starting CPM REST (dev) on {}", rest_addr);

    let app = router(AppState::new(cfg, None));
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
