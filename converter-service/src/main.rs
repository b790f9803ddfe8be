use converter_service::config::ConverterConfig;
use converter_service::handlers::health::SERVICE_NAME;
use converter_service::services::init_metrics;
use converter_service::Application;
use service_core::observability::init_tracing;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Metrics recorder must exist before anything records
    init_metrics().map_err(|e| std::io::Error::other(format!("Metrics error: {}", e)))?;

    let otlp_endpoint = std::env::var("OTLP_ENDPOINT").ok();
    init_tracing(SERVICE_NAME, "info", otlp_endpoint.as_deref())
        .map_err(|e| std::io::Error::other(format!("Tracing error: {}", e)))?;

    let config = ConverterConfig::load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    for line in config.minio.diagnostics() {
        println!("{}", line);
    }
    tracing::info!(
        endpoint = %config.minio.endpoint,
        access_key = %config.minio.access_key,
        bucket = %config.minio.bucket,
        workers = config.worker.worker_count,
        "Starting file converter"
    );

    let application = Application::build(config).await.map_err(|e| {
        tracing::error!("Failed to start application: {}", e);
        std::io::Error::other(format!("Startup error: {}", e))
    })?;

    application.run_until_stopped().await
}
