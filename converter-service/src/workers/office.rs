use crate::models::ConversionKind;
use crate::workers::executor::{CommandError, CommandExecutor};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("conversion finished but output file was not found: {}", .0.display())]
    MissingOutput(PathBuf),

    #[error("input file has no usable name: {}", .0.display())]
    InvalidInput(PathBuf),

    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
}

/// Drives a headless office suite (`soffice`) to convert one file at a time.
#[derive(Clone)]
pub struct OfficeConverter {
    binary: String,
    executor: CommandExecutor,
}

impl OfficeConverter {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            executor: CommandExecutor::new(timeout),
        }
    }

    /// Converts `input` into `output_dir` and returns the produced file.
    ///
    /// `profile_dir` must not be shared with a concurrently running
    /// conversion: the office suite locks its user installation.
    pub async fn convert(
        &self,
        input: &Path,
        output_dir: &Path,
        kind: ConversionKind,
        profile_dir: &Path,
    ) -> Result<PathBuf, ConversionError> {
        let expected = expected_output(input, output_dir, kind)?;

        tokio::fs::create_dir_all(profile_dir).await?;
        tokio::fs::create_dir_all(output_dir).await?;
        let profile_dir = std::path::absolute(profile_dir)?;

        let args = conversion_args(input, output_dir, kind, &profile_dir);

        tracing::info!(
            input = %input.display(),
            kind = %kind,
            profile = %profile_dir.display(),
            "Starting office conversion"
        );

        self.executor.execute(&self.binary, &args, None).await?;

        if !tokio::fs::try_exists(&expected).await? {
            return Err(ConversionError::MissingOutput(expected));
        }

        Ok(expected)
    }
}

fn conversion_args(
    input: &Path,
    output_dir: &Path,
    kind: ConversionKind,
    profile_dir: &Path,
) -> Vec<OsString> {
    vec![
        OsString::from(format!(
            "-env:UserInstallation=file://{}",
            profile_dir.display()
        )),
        OsString::from("--headless"),
        OsString::from("--nofirststartwizard"),
        OsString::from("--convert-to"),
        OsString::from(kind.target_format()),
        OsString::from("--outdir"),
        output_dir.as_os_str().to_owned(),
        input.as_os_str().to_owned(),
    ]
}

/// The office suite names its output `<input stem>.<target format>` inside `--outdir`.
fn expected_output(
    input: &Path,
    output_dir: &Path,
    kind: ConversionKind,
) -> Result<PathBuf, ConversionError> {
    let stem = input
        .file_stem()
        .ok_or_else(|| ConversionError::InvalidInput(input.to_path_buf()))?;

    let mut name = stem.to_os_string();
    name.push(".");
    name.push(kind.target_format());
    Ok(output_dir.join(name))
}
