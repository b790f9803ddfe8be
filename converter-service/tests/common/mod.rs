#![allow(dead_code)]

use async_trait::async_trait;
use converter_service::config::{
    ConverterConfig, FileConfig, MinioConfig, OfficeConfig, WorkerConfig, DEFAULT_BUCKET,
};
use converter_service::services::{init_metrics, Storage, TaskRegistry};
use converter_service::Application;
use secrecy::Secret;
use service_core::config::{Config as CoreConfig, Environment};
use service_core::error::AppError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Once, OnceLock};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Stand-ins for `soffice`, written once per test binary so no script is
/// still open for writing while another test spawns one.
#[derive(Debug, Clone, Copy)]
pub enum FakeOffice {
    /// Writes `converted:<input bytes>` to `<outdir>/<stem>.<format>`.
    Converts,
    /// Exits non-zero with a message on stderr.
    Fails,
    /// Exits zero without writing anything.
    NoOutput,
    /// Converts after sleeping for two seconds.
    Slow,
}

const CONVERT_BODY: &str = r#"
fmt=""; outdir=""; input=""
while [ $# -gt 0 ]; do
  case "$1" in
    --convert-to) fmt="$2"; shift 2 ;;
    --outdir) outdir="$2"; shift 2 ;;
    -*) shift ;;
    *) input="$1"; shift ;;
  esac
done
name=$(basename "$input")
stem="${name%.*}"
printf 'converted:' > "$outdir/$stem.$fmt"
cat "$input" >> "$outdir/$stem.$fmt"
"#;

struct OfficeScripts {
    converts: PathBuf,
    fails: PathBuf,
    no_output: PathBuf,
    slow: PathBuf,
}

fn office_scripts() -> &'static OfficeScripts {
    static SCRIPTS: OnceLock<OfficeScripts> = OnceLock::new();
    SCRIPTS.get_or_init(|| {
        let dir = tempfile::Builder::new()
            .prefix("fake-office")
            .tempdir()
            .expect("Failed to create script directory")
            .into_path();

        OfficeScripts {
            converts: write_script(&dir, "converts", CONVERT_BODY),
            fails: write_script(
                &dir,
                "fails",
                "echo 'Error: source file could not be loaded' >&2\nexit 1\n",
            ),
            no_output: write_script(&dir, "no-output", "exit 0\n"),
            slow: write_script(&dir, "slow", &format!("sleep 2\n{}", CONVERT_BODY)),
        }
    })
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    {
        let mut file = std::fs::File::create(&path).expect("Failed to create script");
        write!(file, "#!/bin/sh\n{}", body).expect("Failed to write script");
        file.sync_all().expect("Failed to sync script");
    }
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("Failed to make script executable");
    path
}

impl FakeOffice {
    pub fn path(self) -> PathBuf {
        let scripts = office_scripts();
        match self {
            FakeOffice::Converts => scripts.converts.clone(),
            FakeOffice::Fails => scripts.fails.clone(),
            FakeOffice::NoOutput => scripts.no_output.clone(),
            FakeOffice::Slow => scripts.slow.clone(),
        }
    }
}

/// In-memory object store.
pub struct MemoryStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    fail_uploads: bool,
}

impl MemoryStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            objects: Mutex::new(HashMap::new()),
            fail_uploads: false,
        })
    }

    /// A store whose uploads always fail.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            objects: Mutex::new(HashMap::new()),
            fail_uploads: true,
        })
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    fn bucket(&self) -> &str {
        DEFAULT_BUCKET
    }

    async fn put_file(&self, key: &str, path: &Path) -> Result<(), AppError> {
        if self.fail_uploads {
            return Err(AppError::StorageError(anyhow::anyhow!("bucket unreachable")));
        }
        let data = tokio::fs::read(path).await?;
        self.objects.lock().unwrap().insert(key.to_string(), data);
        Ok(())
    }

    async fn share_url(&self, key: &str, expires_in: Duration) -> Result<String, AppError> {
        Ok(format!(
            "http://minio.test/{}/{}?expires={}",
            DEFAULT_BUCKET,
            key,
            expires_in.as_secs()
        ))
    }
}

pub struct TestOptions {
    pub office: FakeOffice,
    pub storage: Option<Arc<dyn Storage>>,
    pub keep_local: bool,
    pub worker_count: usize,
    pub queue_size: usize,
    pub timeout: Duration,
    pub max_upload_bytes: usize,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            office: FakeOffice::Converts,
            storage: None,
            keep_local: false,
            worker_count: 2,
            queue_size: 16,
            timeout: Duration::from_secs(10),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub registry: TaskRegistry,
    pub upload_dir: PathBuf,
    pub converted_dir: PathBuf,
    pub static_dir: PathBuf,
    pub client: reqwest::Client,
    shutdown: CancellationToken,
    _root: TempDir,
}

pub fn test_config(root: &Path, options: &TestOptions) -> ConverterConfig {
    ConverterConfig {
        common: CoreConfig {
            port: 0,
            environment: Environment::Dev,
        },
        minio: MinioConfig {
            enabled: false,
            endpoint: "localhost:9000".to_string(),
            access_key: "minio".to_string(),
            secret_key: Secret::new("minio".to_string()),
            bucket: DEFAULT_BUCKET.to_string(),
            region: "us-east-1".to_string(),
            secure: false,
        },
        office: OfficeConfig {
            binary: options.office.path().to_string_lossy().into_owned(),
            timeout: options.timeout,
        },
        worker: WorkerConfig {
            worker_count: options.worker_count,
            queue_size: options.queue_size,
            profile_root: root.join("profiles"),
        },
        files: FileConfig {
            upload_dir: root.join("uploads"),
            converted_dir: root.join("converted"),
            keep_local: options.keep_local,
            ttl: Duration::from_secs(24 * 60 * 60),
            cleanup_interval: Duration::from_secs(60 * 60),
        },
        static_dir: root.join("static"),
        max_upload_bytes: options.max_upload_bytes,
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(TestOptions::default()).await
    }

    pub async fn spawn_with(options: TestOptions) -> Self {
        static METRICS: Once = Once::new();
        METRICS.call_once(|| init_metrics().expect("Failed to install metrics recorder"));

        let root = TempDir::new().expect("Failed to create temp dir");
        let config = test_config(root.path(), &options);

        let static_dir = config.static_dir.clone();
        std::fs::create_dir_all(&static_dir).expect("Failed to create static dir");
        std::fs::write(static_dir.join("hello.txt"), "hello").expect("Failed to write asset");

        let upload_dir = config.files.upload_dir.clone();
        let converted_dir = config.files.converted_dir.clone();

        let app = Application::build_with_storage(config, options.storage)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let registry = app.registry().clone();
        let shutdown = app.shutdown_handle();

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        let address = format!("http://127.0.0.1:{}", port);
        let client = reqwest::Client::new();
        for _ in 0..50 {
            if client.get(format!("{}/health", address)).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            registry,
            upload_dir,
            converted_dir,
            static_dir,
            client,
            shutdown,
            _root: root,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn upload(&self, filename: &str, data: &[u8]) -> reqwest::Response {
        self.upload_to("/convert", filename, data).await
    }

    pub async fn upload_to(&self, path: &str, filename: &str, data: &[u8]) -> reqwest::Response {
        let part = reqwest::multipart::Part::bytes(data.to_vec()).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        self.client
            .post(self.url(path))
            .multipart(form)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Uploads a file and returns the task id from the 200 response.
    pub async fn submit(&self, filename: &str, data: &[u8]) -> String {
        let response = self.upload(filename, data).await;
        assert_eq!(response.status().as_u16(), 200);
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["status"], "processing");
        body["task_id"]
            .as_str()
            .expect("task_id missing")
            .to_string()
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn status(&self, task_id: &str) -> serde_json::Value {
        self.get(&format!("/status/{}", task_id))
            .await
            .json()
            .await
            .expect("Failed to parse JSON")
    }

    /// Polls `/status` until the task leaves `processing`.
    pub async fn wait_for_finish(&self, task_id: &str) -> serde_json::Value {
        self.wait_until(task_id, |status| status["status"] != "processing")
            .await
    }

    /// Polls `/status` until `done` accepts the task state.
    pub async fn wait_until(
        &self,
        task_id: &str,
        done: impl Fn(&serde_json::Value) -> bool,
    ) -> serde_json::Value {
        for _ in 0..200 {
            let status = self.status(task_id).await;
            if done(&status) {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("Task {} did not reach the expected state in time", task_id);
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
