use secrecy::{ExposeSecret, Secret};
use service_core::config::{self as core_config, env_or, env_parse, Environment};
use service_core::error::AppError;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BUCKET: &str = "converted-files";

#[derive(Debug, Clone)]
pub struct ConverterConfig {
    pub common: core_config::Config,
    pub minio: MinioConfig,
    pub office: OfficeConfig,
    pub worker: WorkerConfig,
    pub files: FileConfig,
    pub static_dir: PathBuf,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct MinioConfig {
    /// When false the service starts without object storage.
    pub enabled: bool,
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: Secret<String>,
    pub bucket: String,
    pub region: String,
    pub secure: bool,
}

#[derive(Debug, Clone)]
pub struct OfficeConfig {
    pub binary: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub worker_count: usize,
    pub queue_size: usize,
    /// Parent of the per-worker office user profiles.
    pub profile_root: PathBuf,
}

#[derive(Debug, Clone)]
pub struct FileConfig {
    pub upload_dir: PathBuf,
    pub converted_dir: PathBuf,
    pub keep_local: bool,
    pub ttl: Duration,
    pub cleanup_interval: Duration,
}

impl ConverterConfig {
    pub fn load() -> Result<Self, AppError> {
        // Load common config (handles .env and APP__ prefix)
        let common = core_config::Config::load()?;
        let environment = common.environment;

        let worker_count: usize = env_parse("MAX_LIBREOFFICE_PROCESSES", 3)?;
        let queue_size: usize = env_parse("WORKER_QUEUE_SIZE", 100)?;

        Ok(ConverterConfig {
            common,
            minio: MinioConfig::load(environment)?,
            office: OfficeConfig {
                binary: env_parse("LIBRE_OFFICE_PATH", "soffice".to_string())?,
                timeout: Duration::from_secs(env_parse("CONVERSION_TIMEOUT_SECS", 300)?),
            },
            worker: WorkerConfig {
                worker_count: worker_count.max(1),
                queue_size: queue_size.max(1),
                profile_root: env_parse("PROFILE_ROOT", std::env::temp_dir())?,
            },
            files: FileConfig {
                upload_dir: env_parse("UPLOAD_DIR", PathBuf::from("uploads"))?,
                converted_dir: env_parse("CONVERTED_DIR", PathBuf::from("converted"))?,
                keep_local: env_parse("KEEP_LOCAL_FILES", false)?,
                ttl: Duration::from_secs(env_parse("LOCAL_FILE_TTL_SECS", 24 * 60 * 60)?),
                cleanup_interval: Duration::from_secs(env_parse("CLEANUP_INTERVAL_SECS", 60 * 60)?),
            },
            static_dir: env_parse("STATIC_DIR", PathBuf::from("static"))?,
            max_upload_bytes: env_parse("MAX_UPLOAD_BYTES", 100 * 1024 * 1024)?,
        })
    }
}

impl MinioConfig {
    fn load(environment: Environment) -> Result<Self, AppError> {
        Ok(MinioConfig {
            enabled: env_parse("MINIO_ENABLED", true)?,
            endpoint: env_or("MINIO_ENDPOINT", Some("localhost:9000"), environment)?,
            access_key: env_or("MINIO_ACCESS_KEY", Some("minio"), environment)?,
            secret_key: Secret::new(env_or(
                "MINIO_SECRET_KEY",
                Some("minio"),
                environment,
            )?),
            bucket: env_parse("MINIO_BUCKET", DEFAULT_BUCKET.to_string())?,
            region: env_parse("MINIO_REGION", "us-east-1".to_string())?,
            secure: env_parse("MINIO_SECURE", false)?,
        })
    }

    /// Endpoint URL with scheme; bare `host:port` values get one from `secure`.
    pub fn endpoint_url(&self) -> String {
        if self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://") {
            self.endpoint.clone()
        } else {
            let scheme = if self.secure { "https" } else { "http" };
            format!("{}://{}", scheme, self.endpoint)
        }
    }

    /// Lines the launcher prints before serving. The secret key is never included.
    pub fn diagnostics(&self) -> Vec<String> {
        vec![
            format!("MINIO_ENDPOINT={}", self.endpoint),
            format!("MINIO_ACCESS_KEY={}", self.access_key),
        ]
    }

    pub fn secret_key(&self) -> &str {
        self.secret_key.expose_secret()
    }
}
