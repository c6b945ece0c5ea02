use std::sync::Arc;

use tokio::time::{interval, Duration};

use whalewatch::alerts::notifier::Notifier;
use whalewatch::api::router::create_router;
use whalewatch::config::AppConfig;
use whalewatch::ingestion::fetcher;
use whalewatch::polymarket::{DataClient, GammaClient};
use whalewatch::resolution::sync::{self, SyncMode};
use whalewatch::{db, metrics, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    let addr = format!("{}:{}", config.host, config.port);

    let metrics_handle = metrics::init_metrics();

    tracing::info!("Connecting to database...");
    let db = db::init_pool(&config.database_url).await?;
    tracing::info!("Database connected");

    let http = reqwest::Client::new();
    let data_client = DataClient::new(http.clone());
    let gamma_client = GammaClient::new(http);

    let notifier = if config.has_telegram() {
        Some(Arc::new(Notifier::new(
            config.telegram_bot_token.clone().unwrap_or_default(),
            config.telegram_chat_id.clone().unwrap_or_default(),
        )))
    } else {
        tracing::warn!("Telegram not configured — alert notifications disabled");
        None
    };

    // --- Ingestion scheduler ---
    if config.ingest_interval_secs > 0 {
        let data_client = data_client.clone();
        let pool = db.clone();
        let notifier = notifier.clone();
        let cfg = config.clone();

        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(cfg.ingest_interval_secs));
            loop {
                ticker.tick().await;
                match fetcher::run_ingestion(&data_client, &pool, notifier.as_deref(), &cfg).await {
                    Ok(report) => {
                        tracing::debug!(
                            stored = report.stored,
                            alerts = report.alerts_created,
                            "Scheduled ingestion run complete"
                        );
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Scheduled ingestion run failed");
                    }
                }
            }
        });
        tracing::info!(
            interval_secs = config.ingest_interval_secs,
            "Ingestion scheduler spawned"
        );
    } else {
        tracing::info!("Ingestion scheduler disabled (INGEST_INTERVAL_SECS=0)");
    }

    // --- Resolution scheduler (due-queue rotation) ---
    if config.resolution_interval_secs > 0 {
        let gamma_client = gamma_client.clone();
        let pool = db.clone();
        let cfg = config.clone();

        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(cfg.resolution_interval_secs));
            loop {
                ticker.tick().await;
                if let Err(e) =
                    sync::run_resolution_sync(&gamma_client, &pool, SyncMode::Due, &cfg).await
                {
                    tracing::error!(error = %e, "Scheduled resolution sync failed");
                }
            }
        });
        tracing::info!(
            interval_secs = config.resolution_interval_secs,
            "Resolution scheduler spawned"
        );
    } else {
        tracing::info!("Resolution scheduler disabled (RESOLUTION_INTERVAL_SECS=0)");
    }

    let state = AppState {
        db,
        config,
        data_client,
        gamma_client,
        metrics_handle,
        notifier,
    };
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {addr}");
    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();
}
