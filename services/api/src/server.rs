use crate::cli::ServeArgs;
use crate::infra::{
    default_engine_settings, AppState, InMemoryAlertFeed, InMemoryEngineRepository,
};
use crate::routes::with_engine_routes;
use adhera::config::AppConfig;
use adhera::engine::RiskEngineService;
use adhera::error::AppError;
use adhera::telemetry;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
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
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let repository = Arc::new(InMemoryEngineRepository::default());
    let feed = Arc::new(InMemoryAlertFeed::default());
    let engine_service = Arc::new(RiskEngineService::new(
        repository,
        feed,
        default_engine_settings(),
    ));

    let app = with_engine_routes(engine_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "adherence risk engine ready");

    axum::serve(listener, app).await?;
    Ok(())
}
