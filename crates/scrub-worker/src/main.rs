//! Thumbnail pipeline worker binary.

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use scrub_worker::{init_tracing, metrics, Runtime, WorkerConfig};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting scrub-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if let Some(port) = config.metrics_port {
        match metrics::init_metrics(port) {
            Ok(()) => info!("Prometheus metrics on port {}", port),
            Err(e) => error!("Failed to start metrics exporter: {}", e),
        }
    }

    let runtime = match Runtime::from_config(&config) {
        Ok(r) => r,
        Err(e) => {
            error!("Failed to create worker: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.repository.ensure_dirs().await {
        error!("Failed to create data directories: {}", e);
        std::process::exit(1);
    }

    if config.backfill_on_start {
        if let Err(e) = runtime.service.backfill_missing().await {
            error!("Backfill failed: {}", e);
        }
    }

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        shutdown.cancel();
    });

    runtime.worker.run(cancel).await;

    info!("Worker shutdown complete");
}
