//! Campaign wizard service entry point.
//!
//! Hosts one wizard session backed by a SQLite draft store and exposes it
//! over a small Axum REST API. Finished campaigns are forwarded to the
//! create-donation-event service.

use std::sync::Arc;

use reqwest::Client;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use campaign_wizard::api::{self, ApiState};
use campaign_wizard::config::Config;
use campaign_wizard::notify::{NoticeBuffer, RouteRecorder};
use campaign_wizard::store::{sqlite, DraftStore, SqliteStore};
use campaign_wizard::submit::HttpCampaignApi;
use campaign_wizard::{WizardController, WizardDeps, WizardSettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    // Draft store: SQLite pool plus migrations.
    let pool = sqlite::init_pool(&config.database_url).await?;
    let drafts = DraftStore::new(Arc::new(SqliteStore::new(
        pool,
        config.storage_quota_bytes,
    )));

    let client = Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?;
    let campaign_api = HttpCampaignApi::new(
        client,
        config.create_event_url.clone(),
        config.api_token.clone(),
    );

    // ─── Wizard session ───────────────────────────────────
    let notices = Arc::new(NoticeBuffer::default());
    let routes = Arc::new(RouteRecorder::default());
    let mut wizard = WizardController::new(
        WizardDeps {
            drafts,
            api: Arc::new(campaign_api),
            notifier: notices.clone(),
            navigator: routes.clone(),
        },
        WizardSettings::from(&config),
    );
    if wizard.mount().await {
        info!("Resuming saved campaign draft");
    }

    // ─── REST API ─────────────────────────────────────────
    let api_state = Arc::new(ApiState {
        wizard: Arc::new(Mutex::new(wizard)),
        notices,
        routes,
    });

    let app = api::router(api_state.clone())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    api_state.wizard.lock().await.unmount();
    Ok(())
}
