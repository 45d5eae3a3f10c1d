use crate::cli::ServeArgs;
use crate::infra::{build_service, AppState, DocumentBackend, OfflineDocuments};
use crate::model::ModelDocuments;
use crate::routes::with_origination_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use mortgage_ai::config::{AppConfig, ModelConfig};
use mortgage_ai::error::AppError;
use mortgage_ai::origination::OriginationServiceError;
use mortgage_ai::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
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
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let documents = document_backend(&config.model).await?;
    let backend = documents.label();
    let service = Arc::new(build_service(config.origination.clone(), documents)?);

    let app = with_origination_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        default_owner = %config.origination.default_owner,
        documents = backend,
        "mortgage origination service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

async fn document_backend(config: &ModelConfig) -> Result<DocumentBackend, AppError> {
    let Some(api_key) = config.api_key.clone() else {
        warn!("APP_MODEL_API_KEY not set; uploads must carry model JSON answers");
        return Ok(DocumentBackend::Offline(OfflineDocuments));
    };

    // The blocking client owns a runtime of its own and cannot be built on an async worker.
    let config = config.clone();
    let documents = tokio::task::spawn_blocking(move || ModelDocuments::new(&config, api_key))
        .await
        .map_err(|err| AppError::Io(std::io::Error::other(err)))?
        .map_err(OriginationServiceError::from)?;
    Ok(DocumentBackend::Model(documents))
}
