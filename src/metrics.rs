use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus exporter and register all application metrics.
/// Returns a `PrometheusHandle` whose `render()` method produces the
/// text/plain Prometheus scrape payload.
pub fn init_metrics() -> PrometheusHandle {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // Pre-register counters so they appear even before the first increment.
    counter!("ingest_runs_total").absolute(0);
    counter!("ingest_hard_failures_total").absolute(0);
    counter!("trades_fetched_total").absolute(0);
    counter!("trades_stored_total").absolute(0);
    counter!("trade_rows_dropped_total").absolute(0);
    counter!("alerts_created_total").absolute(0);
    counter!("resolution_runs_total").absolute(0);
    counter!("markets_resolved_total").absolute(0);

    // Histograms are lazily created on first record; force creation.
    histogram!("ingest_run_seconds").record(0.0);
    histogram!("resolution_run_seconds").record(0.0);

    handle
}
