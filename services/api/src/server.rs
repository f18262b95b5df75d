use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryComplianceRepository};
use crate::routes::with_compliance_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use bio_conformity::ai::ConfiguredAiClient;
use bio_conformity::config::AppConfig;
use bio_conformity::error::AppError;
use bio_conformity::registry::HttpRegistryClient;
use bio_conformity::service::{ComplianceService, ServiceConfig};
use bio_conformity::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
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

    if !config.ai.enabled() {
        warn!("AI_API_KEY is not set; every line without a decisive rule goes to manual review");
    }
    let ai = Arc::new(ConfiguredAiClient::from_config(&config.ai)?);
    let registry = Arc::new(HttpRegistryClient::from_config(&config.registry)?);
    let repository = Arc::new(InMemoryComplianceRepository::default());
    let compliance_service = Arc::new(ComplianceService::new(
        repository,
        ai,
        registry,
        ServiceConfig::from_app_config(&config),
    ));

    let app = with_compliance_routes(compliance_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "organic conformity service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
