use api_rest::{router, AppState};
use cpm_core::{constants::DEFAULT_CLINIC_DATA_DIR, CoreConfig, DischargePolicy};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the CPM application
///
/// Starts the REST server (with OpenAPI/Swagger UI) serving the patient
/// lifecycle and discharge workflow API.
///
/// When `API_KEY` is set, mutating endpoints require a matching `x-api-key`
/// header; read-only endpoints stay open for dashboards.
///
/// # Environment Variables
/// - `CPM_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `CLINIC_DATA_DIR`: Directory for clinic data storage (default: "clinic_data")
/// - `API_KEY`: Optional API key for mutating REST endpoints
/// - `CPM_INACTIVITY_WINDOW_DAYS`: Discharge policy override (default: 30)
/// - `CPM_MIN_ATTENDED_SESSIONS`: Discharge policy override (default: 3)
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration or startup fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("cpm=info".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let clinic_data_dir = std::env::var("CLINIC_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CLINIC_DATA_DIR));
    let rest_addr = std::env::var("CPM_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let api_key = std::env::var("API_KEY").ok().filter(|k| !k.is_empty());

    let policy = DischargePolicy::from_env_values(
        std::env::var("CPM_INACTIVITY_WINDOW_DAYS").ok(),
        std::env::var("CPM_MIN_ATTENDED_SESSIONS").ok(),
    )?;
    let cfg = Arc::new(CoreConfig::new(clinic_data_dir, policy)?);

    tracing::info!("++ Starting CPM REST on {}", rest_addr);
    if api_key.is_none() {
        tracing::warn!("API_KEY not set; mutating endpoints are open");
    }

    let app = router(AppState::new(cfg, api_key));
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
