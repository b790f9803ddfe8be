use crate::config::{OfficeConfig, WorkerConfig};
use crate::models::ConversionKind;
use crate::services::{Storage, TaskRegistry};
use crate::workers::housekeeping;
use crate::workers::office::OfficeConverter;
use service_core::error::AppError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub task_id: Uuid,
    pub kind: ConversionKind,
    pub input: PathBuf,
    pub output_dir: PathBuf,
}

/// Sending half of the worker queue, held by the HTTP handlers.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<ConversionJob>,
}

impl JobQueue {
    pub fn enqueue(&self, job: ConversionJob) -> Result<(), AppError> {
        self.tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                AppError::ServiceUnavailable("Conversion queue is full, retry later".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => {
                AppError::ServiceUnavailable("Conversion workers are shutting down".to_string())
            }
        })
    }

    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

pub struct WorkerOrchestrator {
    config: WorkerConfig,
    registry: TaskRegistry,
    storage: Option<Arc<dyn Storage>>,
    converter: OfficeConverter,
    job_rx: mpsc::Receiver<ConversionJob>,
    shutdown_token: CancellationToken,
}

impl WorkerOrchestrator {
    pub fn new(
        config: WorkerConfig,
        office: &OfficeConfig,
        registry: TaskRegistry,
        storage: Option<Arc<dyn Storage>>,
        shutdown_token: CancellationToken,
    ) -> (Self, JobQueue) {
        let (tx, job_rx) = mpsc::channel(config.queue_size);

        let orchestrator = Self {
            converter: OfficeConverter::new(office.binary.clone(), office.timeout),
            config,
            registry,
            storage,
            job_rx,
            shutdown_token,
        };

        (orchestrator, JobQueue { tx })
    }

    /// Spawns the workers. Each owns a distinct office profile directory, so at
    /// most `worker_count` office processes run and none share a profile.
    pub fn start(self) -> Vec<JoinHandle<()>> {
        tracing::info!(
            worker_count = self.config.worker_count,
            queue_size = self.config.queue_size,
            "Starting conversion workers"
        );

        let job_rx = Arc::new(Mutex::new(self.job_rx));

        (0..self.config.worker_count)
            .map(|id| {
                let worker = Worker {
                    id,
                    registry: self.registry.clone(),
                    storage: self.storage.clone(),
                    converter: self.converter.clone(),
                    profile_dir: self
                        .config
                        .profile_root
                        .join(format!("libreoffice_userprofile_{}", id)),
                };
                let job_rx = job_rx.clone();
                let shutdown = self.shutdown_token.clone();
                tokio::spawn(worker.run(job_rx, shutdown))
            })
            .collect()
    }
}

struct Worker {
    id: usize,
    registry: TaskRegistry,
    storage: Option<Arc<dyn Storage>>,
    converter: OfficeConverter,
    profile_dir: PathBuf,
}

impl Worker {
    async fn run(
        self,
        job_rx: Arc<Mutex<mpsc::Receiver<ConversionJob>>>,
        shutdown: CancellationToken,
    ) {
        loop {
            let job = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                job = async { job_rx.lock().await.recv().await } => job,
            };

            match job {
                Some(job) => self.process_job(job).await,
                None => break,
            }
        }

        tracing::info!(worker_id = self.id, "Conversion worker stopped");
    }

    async fn process_job(&self, job: ConversionJob) {
        let start = Instant::now();
        let kind = job.kind.as_str();

        tracing::info!(
            worker_id = self.id,
            task_id = %job.task_id,
            kind = %kind,
            "Conversion started"
        );

        metrics::counter!("conversion_jobs_total", "kind" => kind).increment(1);

        let result = self
            .converter
            .convert(&job.input, &job.output_dir, job.kind, &self.profile_dir)
            .await;

        match result {
            Ok(converted) => {
                self.registry
                    .update(&job.task_id, |task| task.complete(converted.clone()));

                metrics::counter!("conversion_jobs_succeeded", "kind" => kind).increment(1);
                metrics::histogram!("conversion_duration_seconds", "kind" => kind)
                    .record(start.elapsed().as_secs_f64());

                tracing::info!(
                    worker_id = self.id,
                    task_id = %job.task_id,
                    output = %converted.display(),
                    duration_ms = start.elapsed().as_millis(),
                    "Conversion succeeded"
                );

                self.publish(&job.task_id, &converted).await;
            }
            Err(e) => {
                self.registry
                    .update(&job.task_id, |task| task.fail(e.to_string()));

                metrics::counter!("conversion_jobs_failed", "kind" => kind).increment(1);

                tracing::error!(
                    worker_id = self.id,
                    task_id = %job.task_id,
                    error = %e,
                    "Conversion failed"
                );
            }
        }
    }

    /// Stages the result in object storage. Upload failures leave the task
    /// completed with its local file so `/download` still serves it.
    async fn publish(&self, task_id: &Uuid, converted: &Path) {
        let Some(storage) = &self.storage else {
            return;
        };
        let Some(task) = self.registry.get(task_id) else {
            return;
        };

        let object_key = task.object_key_for_upload();

        if let Err(e) = storage.put_file(&object_key, converted).await {
            metrics::counter!("storage_uploads_failed").increment(1);
            tracing::error!(
                task_id = %task_id,
                object_key = %object_key,
                error = %e,
                "Failed to upload converted file"
            );
            return;
        }

        let bucket = storage.bucket().to_string();
        self.registry
            .update(task_id, |task| task.record_upload(bucket, object_key.clone()));

        if !task.keep_local {
            if let Err(e) = housekeeping::cleanup_task_files(&self.registry, task_id).await {
                tracing::error!(task_id = %task_id, error = %e, "Failed to clean up local files");
            }
        }
    }
}
