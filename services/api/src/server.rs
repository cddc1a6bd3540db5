use crate::cli::ServeArgs;
use crate::infra::{
    run_queue_worker, AppState, BlueprintMapper, InMemoryJobRepository, LocalBridge, TokioJobQueue,
};
use crate::routes::gateway_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use fiskus::config::AppConfig;
use fiskus::error::AppError;
use fiskus::jobs::JobService;
use fiskus::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

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

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let service = Arc::new(JobService::new(
        Arc::new(InMemoryJobRepository::default()),
        Arc::new(TokioJobQueue::new(tx)),
        Arc::new(LocalBridge::default()),
        Arc::new(BlueprintMapper),
        config.processor.clone(),
        config.retry,
    ));
    tokio::spawn(run_queue_worker(rx, service.clone()));

    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        jobs: service,
    };

    let app = gateway_routes()
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "tax filing gateway ready");

    axum::serve(listener, app).await?;
    Ok(())
}
