//! Single-product download with bounded retry.
//!
//! Each attempt authenticates, resolves the product identifier, and streams the
//! archive into `<output>.partial`. The partial file is renamed to its final
//! name only once the whole stream has been written, so a completed file in the
//! destination directory always means a completed download.
use crate::error::FetchError;
use crate::progress::TransferProgress;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const ARCHIVE_EXTENSION: &str = "zip";
const PARTIAL_SUFFIX: &str = ".partial";

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Bearer token valid for a single download attempt.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub value: String,
    pub obtained_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(value: &str) -> Self {
        Self {
            value: value.to_string(),
            obtained_at: Utc::now(),
        }
    }
}

pub trait TokenProvider {
    async fn obtain_token(&self, credentials: &Credentials) -> Result<AccessToken, FetchError>;
}

pub trait ProductCatalog {
    /// Look up the opaque identifier of the product with exactly this name.
    async fn resolve_id(&self, product_name: &str) -> Result<String, FetchError>;
}

pub struct ProductStream {
    pub content_length: Option<u64>,
    pub body: BoxStream<'static, Result<Bytes, FetchError>>,
}

pub trait Transfer {
    async fn open(&self, token: &AccessToken, product_id: &str)
        -> Result<ProductStream, FetchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    Requesting,
    Streaming,
    RetryPending,
    Complete,
}

impl fmt::Display for DownloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Requesting => "requesting",
            Self::Streaming => "streaming",
            Self::RetryPending => "retry-pending",
            Self::Complete => "complete",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct DownloadTask {
    pub product_name: String,
    pub destination_path: PathBuf,
    pub attempt: u32,
}

pub fn archive_file_name(product_name: &str) -> String {
    format!("{product_name}.{ARCHIVE_EXTENSION}")
}

pub fn partial_path(path: &Path) -> PathBuf {
    let mut partial = path.as_os_str().to_owned();
    partial.push(PARTIAL_SUFFIX);
    PathBuf::from(partial)
}

pub struct Downloader<'a, P> {
    provider: &'a P,
    retry: RetryPolicy,
    show_progress: bool,
}

impl<'a, P> Downloader<'a, P>
where
    P: TokenProvider + ProductCatalog + Transfer,
{
    pub fn new(provider: &'a P) -> Self {
        Self {
            provider,
            retry: RetryPolicy::default(),
            show_progress: false,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Download `product_name` into `destination_dir`, retrying transient failures.
    ///
    /// The file is named `output_name` when given, `<product_name>.zip` otherwise.
    pub async fn fetch(
        &self,
        credentials: &Credentials,
        product_name: &str,
        destination_dir: &Path,
        output_name: Option<&str>,
    ) -> Result<PathBuf, FetchError> {
        let file_name = output_name
            .map(str::to_string)
            .unwrap_or_else(|| archive_file_name(product_name));
        let mut task = DownloadTask {
            product_name: product_name.to_string(),
            destination_path: destination_dir.join(file_name),
            attempt: 1,
        };

        loop {
            let err = match self.attempt(credentials, &task).await {
                Ok(bytes) => {
                    info!(
                        product = %task.product_name,
                        bytes,
                        path = ?task.destination_path,
                        "Download complete"
                    );
                    return Ok(task.destination_path);
                }
                Err(err) => err,
            };

            if !err.is_retryable() {
                error!(product = %task.product_name, "Download failed, not retrying: {err}");
                return Err(err);
            }
            if task.attempt >= self.retry.max_attempts {
                error!(
                    product = %task.product_name,
                    attempts = task.attempt,
                    "Download failed, retries exhausted: {err}"
                );
                return Err(err);
            }

            warn!(
                product = %task.product_name,
                attempt = task.attempt,
                max_attempts = self.retry.max_attempts,
                state = %DownloadState::RetryPending,
                "Download attempt failed: {err}"
            );
            tokio::time::sleep(self.retry.delay).await;
            task.attempt += 1;
        }
    }

    async fn attempt(&self, credentials: &Credentials, task: &DownloadTask) -> Result<u64, FetchError> {
        debug!(product = %task.product_name, attempt = task.attempt, state = %DownloadState::Requesting, "Download state");
        let token = self.provider.obtain_token(credentials).await?;
        let product_id = self.provider.resolve_id(&task.product_name).await?;
        let stream = self.provider.open(&token, &product_id).await?;

        debug!(product = %task.product_name, attempt = task.attempt, state = %DownloadState::Streaming, "Download state");
        if let Some(parent) = task.destination_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let partial = partial_path(&task.destination_path);
        let label = task
            .destination_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| task.product_name.clone());
        let progress = TransferProgress::new(&label, stream.content_length, self.show_progress);

        let bytes = match write_stream(stream, &partial, &progress).await {
            Ok(bytes) => bytes,
            Err(err) => {
                progress.abandon();
                debug!(product = %task.product_name, received = progress.position(), "Transfer abandoned");
                if let Err(remove_err) = fs::remove_file(&partial) {
                    debug!(path = ?partial, "Partial file not removed: {remove_err}");
                }
                return Err(err);
            }
        };
        progress.finish();

        fs::rename(&partial, &task.destination_path)?;
        debug!(product = %task.product_name, attempt = task.attempt, state = %DownloadState::Complete, "Download state");
        Ok(bytes)
    }
}

async fn write_stream(
    mut stream: ProductStream,
    path: &Path,
    progress: &TransferProgress,
) -> Result<u64, FetchError> {
    let mut file = File::create(path)?;
    let mut byte_count = 0_u64;
    while let Some(chunk) = stream.body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)?;
        byte_count += chunk.len() as u64;
        progress.advance(chunk.len() as u64);
    }
    file.flush()?;

    if let Some(expected) = stream.content_length {
        if byte_count != expected {
            return Err(FetchError::Transport(format!(
                "Stream ended after {byte_count} of {expected} bytes"
            )));
        }
    }
    Ok(byte_count)
}
