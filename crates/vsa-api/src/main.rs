//! Axum API server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vsa_api::middleware::spawn_limiter_cleanup;
use vsa_api::{create_router, metrics, ApiConfig, AppState, StoreBackend};
use vsa_db::{run_migrations, DbConfig, MemoryStore, PgStore, QuotaLedger, QuotaStore, VideoStore};
use vsa_ml_client::{build_backend, InferenceBackend, MlClientConfig};
use vsa_models::ApiQuota;
use vsa_queue::{JobQueue, QueueConfig};
use vsa_storage::S3Client;
use vsa_worker::{
    recover_stale_claims, spawn_stale_claim_sweeper, JobExecutor, ProcessingContext, WorkerConfig,
};

const DEV_USER_ID: &str = "dev-user";
const DEV_MAX_REQUESTS: i32 = 100;

fn init_tracing() {
    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,vsa=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

fn split_store<S>(store: Arc<S>) -> (Arc<dyn VideoStore>, Arc<dyn QuotaStore>)
where
    S: VideoStore + QuotaStore + 'static,
{
    (store.clone(), store)
}

async fn build_stores(config: &ApiConfig) -> anyhow::Result<(Arc<dyn VideoStore>, Arc<dyn QuotaStore>)> {
    match config.store_backend {
        StoreBackend::Postgres => {
            let db_config = DbConfig::from_env()?;
            let pool = db_config.connect().await?;
            run_migrations(&pool).await.context("running migrations")?;
            info!("Connected to Postgres");
            Ok(split_store(Arc::new(PgStore::new(pool))))
        }
        StoreBackend::Memory => {
            if config.is_production() {
                warn!("Memory store in production: data is lost on restart");
            }
            let quotas = config
                .dev_api_key
                .iter()
                .map(|key| ApiQuota::new(DEV_USER_ID, key.as_str(), DEV_MAX_REQUESTS));
            let store = MemoryStore::with_quotas(quotas);
            info!(seeded_dev_key = config.dev_api_key.is_some(), "Using in-memory store");
            Ok(split_store(Arc::new(store)))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Install rustls crypto provider (required for rustls 0.23+)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    init_tracing();
    info!("Starting vsa-api");

    let config = ApiConfig::from_env();
    info!(host = %config.host, port = config.port, environment = %config.environment, "API config loaded");

    let metrics_handle = if config.metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics().context("installing metrics recorder")?)
    } else {
        None
    };

    let (videos, quotas) = build_stores(&config).await?;
    let worker_config = WorkerConfig::from_env();
    recover_stale_claims(
        videos.as_ref(),
        worker_config.stale_after(),
        "interrupted by a service restart",
    )
    .await?;
    let ledger = QuotaLedger::new(quotas);

    let storage = Arc::new(S3Client::from_env().await?);
    info!(bucket = storage.bucket(), "Object store ready");

    let ml_config = MlClientConfig::from_env()?;
    let inference = build_backend(&ml_config).await?;
    info!(backend = inference.name(), "Inference backend ready");

    let (queue, receiver) = JobQueue::new(QueueConfig::from_env());

    let sweeper = spawn_stale_claim_sweeper(
        Arc::clone(&videos),
        worker_config.stale_after(),
        worker_config.sweep_interval,
    );
    let ctx = ProcessingContext {
        videos: Arc::clone(&videos),
        ledger: ledger.clone(),
        inference,
        retry: ml_config.retry.clone(),
        job_timeout: worker_config.job_timeout,
    };
    let executor = Arc::new(JobExecutor::new(worker_config, ctx));
    let worker = {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move {
            if let Err(e) = executor.run(receiver).await {
                error!("Job executor stopped with error: {}", e);
            }
        })
    };

    let state = AppState::new(config.clone(), storage, videos, ledger, queue);
    let cleanup = spawn_limiter_cleanup(Arc::clone(&state.rate_limiter));
    let app = create_router(state, metrics_handle);

    // Bind and serve
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("HTTP server stopped, draining worker pool");
    cleanup.abort();
    sweeper.abort();
    executor.shutdown();
    if let Err(e) = worker.await {
        error!("Worker task panicked: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for CTRL+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Received shutdown signal");
}
