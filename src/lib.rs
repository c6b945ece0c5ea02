pub mod alerts;
pub mod api;
pub mod config;
pub mod db;
pub mod errors;
pub mod ingestion;
pub mod metrics;
pub mod models;
pub mod polymarket;
pub mod resolution;

use std::sync::Arc;

use crate::alerts::notifier::Notifier;
use crate::config::AppConfig;
use crate::polymarket::{DataClient, GammaClient};

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: AppConfig,
    pub data_client: DataClient,
    pub gamma_client: GammaClient,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
    pub notifier: Option<Arc<Notifier>>,
}
