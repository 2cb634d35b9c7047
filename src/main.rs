use paylink_backend::api::orders::{self, OrdersState};
use paylink_backend::config::AppConfig;
use paylink_backend::database::{self, job_repository::JobRepository, payment_repository::PaymentRepository};
use paylink_backend::health::{HealthChecker, HealthState, HealthStatus};
use paylink_backend::logging::init_tracing;
use paylink_backend::middleware::logging::{request_logging_middleware, UuidRequestId};
use paylink_backend::payments::registry::ProviderRegistry;
use paylink_backend::scheduler::JobScheduler;
use paylink_backend::services::fanout::FanOutOrchestrator;
use paylink_backend::services::order_intake::OrderIntakeService;
use paylink_backend::services::order_token::OrderTokenSigner;
use paylink_backend::services::reconciliation::ReconciliationService;
use paylink_backend::workers::job_runner::spawn_runners;

use axum::routing::get;
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::{error, info};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

async fn shutdown_signal_with_notify(shutdown_tx: watch::Sender<bool>) {
    shutdown_signal().await;
    let _ = shutdown_tx.send(true);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::from_env()?;
    config.validate()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.server.host,
        port = config.server.port,
        "starting paylink backend"
    );

    let pool = database::connect(&config.database).await.map_err(|e| {
        error!(error = %e, "failed to initialize database pool");
        anyhow::anyhow!(e)
    })?;

    let registry = Arc::new(ProviderRegistry::from_env().map_err(|e| {
        error!(error = %e, "failed to initialize payment providers");
        anyhow::anyhow!(e)
    })?);
    info!(providers = ?registry.enabled(), "payment providers ready");

    let scheduler = JobScheduler::new(
        JobRepository::new(pool.clone()),
        config.scheduler.clone(),
    );
    let fanout = Arc::new(FanOutOrchestrator::new(
        registry.clone(),
        PaymentRepository::new(pool.clone()),
        scheduler,
    ));

    let signer = OrderTokenSigner::new(
        config.orders.token_secret.clone().into_bytes(),
        config.orders.token_ttl,
    );
    let intake = Arc::new(OrderIntakeService::new(
        pool.clone(),
        signer,
        config.orders.clone(),
        fanout,
    ));
    let reconciliation = Arc::new(ReconciliationService::new(
        registry.clone(),
        PaymentRepository::new(pool.clone()),
    ));

    // Delayed-job worker pool
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_handles = spawn_runners(
        pool.clone(),
        reconciliation.clone(),
        config.scheduler.clone(),
        shutdown_rx,
    );
    info!(workers = worker_handles.len(), "job runners started");

    let health_checker = HealthChecker::new(pool.clone());

    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .route("/health/live", get(liveness))
        .with_state(health_checker)
        .merge(orders::router(OrdersState {
            intake,
            reconciliation,
        }))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(axum::middleware::from_fn(request_logging_middleware))
                .layer(PropagateRequestIdLayer::x_request_id()),
        );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!(error = %e, address = %addr, "failed to bind server address");
        e
    })?;

    info!(address = %addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_with_notify(shutdown_tx.clone()))
        .await?;

    let _ = shutdown_tx.send(true);
    for handle in worker_handles {
        if let Err(e) = tokio::time::timeout(std::time::Duration::from_secs(5), handle).await {
            error!(error = %e, "timed out waiting for job runner shutdown");
        }
    }

    info!("server shutdown complete");
    Ok(())
}

async fn root() -> &'static str {
    "paylink backend"
}

async fn health(
    axum::extract::State(checker): axum::extract::State<HealthChecker>,
) -> Result<Json<HealthStatus>, (axum::http::StatusCode, String)> {
    let status = checker.check_health().await;
    if status.status == HealthState::Unhealthy {
        return Err((
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            "Service Unavailable".to_string(),
        ));
    }
    Ok(Json(status))
}

/// Readiness probe - checks if the service is ready to accept traffic
async fn readiness(
    state: axum::extract::State<HealthChecker>,
) -> Result<Json<HealthStatus>, (axum::http::StatusCode, String)> {
    health(state).await
}

/// Liveness probe - checks if the service is alive
async fn liveness() -> &'static str {
    "OK"
}
