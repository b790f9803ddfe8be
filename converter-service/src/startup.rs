use crate::config::ConverterConfig;
use crate::handlers;
use crate::services::{S3Storage, Storage, TaskRegistry};
use crate::workers::{Housekeeper, JobQueue, WorkerOrchestrator};
use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    security_headers::security_headers_middleware,
    tracing::{make_request_span, request_id_middleware},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

const HOUSEKEEPING_GRACE: Duration = Duration::from_secs(5);
/// Added to the conversion timeout when waiting for running jobs at shutdown.
const WORKER_GRACE_MARGIN: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct AppState {
    pub config: ConverterConfig,
    pub registry: TaskRegistry,
    /// `None` when object storage is disabled or was unreachable at startup.
    pub storage: Option<Arc<dyn Storage>>,
    pub jobs: JobQueue,
}

pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
    state: AppState,
    shutdown: CancellationToken,
    workers: Vec<JoinHandle<()>>,
    worker_grace: Duration,
    housekeeping: JoinHandle<()>,
}

impl Application {
    pub async fn build(config: ConverterConfig) -> Result<Self, AppError> {
        let storage: Option<Arc<dyn Storage>> = if config.minio.enabled {
            match S3Storage::connect(&config.minio).await {
                Ok(storage) => {
                    tracing::info!(
                        endpoint = %config.minio.endpoint_url(),
                        bucket = %config.minio.bucket,
                        "Object storage connected"
                    );
                    let storage: Arc<dyn Storage> = Arc::new(storage);
                    Some(storage)
                }
                Err(e) => {
                    tracing::warn!(
                        endpoint = %config.minio.endpoint_url(),
                        error = %e,
                        "Object storage unavailable, converted files stay local"
                    );
                    None
                }
            }
        } else {
            tracing::info!("Object storage disabled");
            None
        };

        Self::build_with_storage(config, storage).await
    }

    pub async fn build_with_storage(
        config: ConverterConfig,
        storage: Option<Arc<dyn Storage>>,
    ) -> Result<Self, AppError> {
        for dir in [
            &config.files.upload_dir,
            &config.files.converted_dir,
            &config.worker.profile_root,
        ] {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                tracing::error!("Failed to create directory {}: {}", dir.display(), e);
                AppError::from(e)
            })?;
        }

        let registry = TaskRegistry::new();
        let shutdown = CancellationToken::new();

        let (orchestrator, jobs) = WorkerOrchestrator::new(
            config.worker.clone(),
            &config.office,
            registry.clone(),
            storage.clone(),
            shutdown.clone(),
        );
        let workers = orchestrator.start();
        let worker_grace = config.office.timeout + WORKER_GRACE_MARGIN;

        let housekeeper = Housekeeper::new(registry.clone(), &config.files);
        let housekeeping = tokio::spawn(housekeeper.run(shutdown.clone()));

        let state = AppState {
            config: config.clone(),
            registry,
            storage,
            jobs,
        };

        let router = router(state.clone());

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        Ok(Self {
            port,
            listener,
            router,
            state,
            shutdown,
            workers,
            worker_grace,
            housekeeping,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.state.registry
    }

    /// Cancelling this token stops the server, the workers and the housekeeper.
    pub fn shutdown_handle(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let shutdown = self.shutdown.clone();

        let result = axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
            .await;

        shutdown.cancel();

        // Workers stop taking jobs; a conversion already running finishes
        let deadline = tokio::time::Instant::now() + self.worker_grace;
        for mut worker in self.workers {
            if tokio::time::timeout_at(deadline, &mut worker).await.is_err() {
                tracing::warn!("Conversion worker did not stop in time, aborting");
                worker.abort();
            }
        }

        let mut housekeeping = self.housekeeping;
        if tokio::time::timeout(HOUSEKEEPING_GRACE, &mut housekeeping)
            .await
            .is_err()
        {
            tracing::warn!("Background cleanup did not stop in time, aborting");
            housekeeping.abort();
        }

        tracing::info!("Server stopped");
        result
    }
}

pub fn router(state: AppState) -> Router {
    let static_dir = ServeDir::new(&state.config.static_dir);
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/convert", post(handlers::convert_file))
        .route("/status/:task_id", get(handlers::get_status))
        .route("/download/:task_id", get(handlers::download_file))
        .route("/share/:task_id", get(handlers::get_share_link))
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route("/docs", get(handlers::swagger_ui))
        .route("/openapi.json", get(handlers::openapi_json))
        .nest_service("/static", static_dir)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span::<Body>))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(CorsLayer::very_permissive())
}

async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = token.cancelled() => {},
    }

    tracing::info!("Shutdown signal received");
}
