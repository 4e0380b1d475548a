use crate::cli::ServeArgs;
use crate::infra::{AppState, EnrollmentStack};
use crate::routes::with_enrollment_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use enrollment_intake::config::AppConfig;
use enrollment_intake::error::AppError;
use enrollment_intake::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let stack = EnrollmentStack::in_memory(&config.brackets, &config.processing);
    if config.auth.credentials.is_none() {
        warn!("basic auth disabled; API routes are open");
    }

    let app = with_enrollment_routes(stack.api, config.auth.credentials.clone())
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer = stack.consumer.clone();
    let consumer_task = tokio::spawn(async move { consumer.run(shutdown_rx).await });

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        cache_policy = ?config.brackets.cache_policy,
        "enrollment intake service ready"
    );

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    readiness_flag.store(false, Ordering::Release);
    let _ = shutdown_tx.send(true);
    if let Err(err) = consumer_task.await {
        warn!(error = %err, "enrollment consumer task ended abnormally");
    }

    served?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
