//! Dataset download with an explicit retry policy.
//!
//! The pipeline performs a single read-only GET. Retries are opt-in and
//! configured by the caller; nothing is retried by default.

use crate::config::SourceConfig;
use crate::error::PipelineError;
use anyhow::{Context, Result};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where the raw CSV comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetSource {
    /// Download over HTTP(S).
    Url(String),
    /// Read from the local filesystem.
    File(PathBuf),
}

impl fmt::Display for DatasetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetSource::Url(url) => write!(f, "{}", url),
            DatasetSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// How many times to retry a failed download and how long to wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub retries: u32,
    /// Delay before the first retry.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 0,
            backoff: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based): `backoff * 2^(retry - 1)`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.backoff.saturating_mul(1u32 << exponent)
    }

    /// Total number of attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

/// Options for fetching the dataset.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retry policy for failed downloads.
    pub retry: RetryPolicy,
    /// Whether to show a download progress bar.
    pub show_progress: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            retry: RetryPolicy::default(),
            show_progress: true,
        }
    }
}

impl From<&SourceConfig> for FetchOptions {
    fn from(config: &SourceConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_seconds),
            retry: RetryPolicy {
                retries: config.retries,
                backoff: Duration::from_millis(config.retry_backoff_ms),
            },
            show_progress: true,
        }
    }
}

/// Read the raw CSV bytes from the given source.
pub async fn load_source(source: &DatasetSource, options: &FetchOptions) -> Result<Vec<u8>> {
    match source {
        DatasetSource::File(path) => {
            info!("Reading dataset from: {}", path.display());
            tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read dataset file: {}", path.display()))
        }
        DatasetSource::Url(url) => Ok(fetch_dataset(url, options).await?),
    }
}

/// Download the dataset, retrying according to `options.retry`.
pub async fn fetch_dataset(url: &str, options: &FetchOptions) -> Result<Vec<u8>, PipelineError> {
    let client = reqwest::Client::builder()
        .timeout(options.timeout)
        .build()
        .map_err(|e| PipelineError::Fetch {
            url: url.to_string(),
            message: format!("failed to create HTTP client: {}", e),
        })?;

    let max_attempts = options.retry.max_attempts();
    let mut attempt = 1;

    loop {
        debug!("Fetch attempt {}/{} for {}", attempt, max_attempts, url);

        match fetch_once(&client, url, options).await {
            Ok(bytes) => {
                info!("Downloaded {} bytes from {}", bytes.len(), url);
                return Ok(bytes);
            }
            Err(e) if attempt < max_attempts && is_retryable(&e) => {
                let delay = options.retry.delay_for(attempt);
                warn!(
                    "Fetch attempt {}/{} failed: {}. Retrying in {:?}",
                    attempt, max_attempts, e, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Client errors (4xx) will not change on retry; everything else might.
fn is_retryable(error: &PipelineError) -> bool {
    match error {
        PipelineError::HttpStatus { status, .. } => !(400..500).contains(status),
        _ => true,
    }
}

async fn fetch_once(
    client: &reqwest::Client,
    url: &str,
    options: &FetchOptions,
) -> Result<Vec<u8>, PipelineError> {
    let transport_error = |e: reqwest::Error| {
        let message = if e.is_timeout() {
            format!("request timed out after {}s", options.timeout.as_secs())
        } else if e.is_connect() {
            "cannot connect to server".to_string()
        } else {
            e.to_string()
        };
        PipelineError::Fetch {
            url: url.to_string(),
            message,
        }
    };

    let response = client.get(url).send().await.map_err(transport_error)?;

    if !response.status().is_success() {
        return Err(PipelineError::HttpStatus {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }

    let progress_bar = if options.show_progress {
        Some(download_progress_bar(response.content_length()))
    } else {
        None
    };

    let result = read_body(response, progress_bar.as_ref()).await;

    if let Some(pb) = progress_bar {
        match &result {
            Ok(_) => pb.finish_with_message("Download complete"),
            Err(_) => pb.abandon_with_message("Download failed"),
        }
    }

    result.map_err(transport_error)
}

/// Upper bound on the buffer reserved up front from `Content-Length`.
const MAX_PREALLOCATION: u64 = 64 << 20;

async fn read_body(
    response: reqwest::Response,
    progress_bar: Option<&ProgressBar>,
) -> Result<Vec<u8>, reqwest::Error> {
    let capacity = response.content_length().unwrap_or(0).min(MAX_PREALLOCATION);
    let mut body = Vec::with_capacity(capacity as usize);
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        body.extend_from_slice(&chunk);
        if let Some(pb) = progress_bar {
            pb.inc(chunk.len() as u64);
        }
    }

    Ok(body)
}

fn download_progress_bar(total: Option<u64>) -> ProgressBar {
    match total {
        Some(len) => {
            let pb = ProgressBar::new(len);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {bytes} downloaded")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const OK_BODY: &str = "HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\na,b\n1";

    fn http_status(code: u16, reason: &str) -> String {
        format!(
            "HTTP/1.1 {} {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            code, reason
        )
    }

    /// Serve each canned response to one connection, in order, then stop
    /// listening. Returns the URL and a count of accepted connections.
    async fn serve(responses: Vec<String>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&accepted);

        tokio::spawn(async move {
            for response in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                let mut request = [0u8; 4096];
                let _ = socket.read(&mut request).await;
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{}/rows.csv", addr), accepted)
    }

    fn quick_options(retries: u32) -> FetchOptions {
        FetchOptions {
            timeout: Duration::from_secs(5),
            retry: RetryPolicy {
                retries,
                backoff: Duration::from_millis(1),
            },
            show_progress: false,
        }
    }

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.retries, 0);
        assert_eq!(policy.max_attempts(), 1);
    }

    #[test]
    fn test_retry_delay_doubles() {
        let policy = RetryPolicy {
            retries: 4,
            backoff: Duration::from_millis(250),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(250));
        assert_eq!(policy.delay_for(2), Duration::from_millis(500));
        assert_eq!(policy.delay_for(3), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(4), Duration::from_millis(2000));
    }

    #[test]
    fn test_fetch_options_from_config() {
        let config = SourceConfig {
            url: "https://example.com/data.csv".to_string(),
            timeout_seconds: 30,
            retries: 2,
            retry_backoff_ms: 500,
        };
        let options = FetchOptions::from(&config);
        assert_eq!(options.timeout, Duration::from_secs(30));
        assert_eq!(options.retry.retries, 2);
        assert_eq!(options.retry.backoff, Duration::from_millis(500));
    }

    #[test]
    fn test_client_errors_are_not_retried() {
        let not_found = PipelineError::HttpStatus {
            url: "https://example.com".to_string(),
            status: 404,
        };
        let unavailable = PipelineError::HttpStatus {
            url: "https://example.com".to_string(),
            status: 503,
        };
        assert!(!is_retryable(&not_found));
        assert!(is_retryable(&unavailable));
    }

    #[test]
    fn test_load_source_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("incidents.csv");
        std::fs::write(&path, "INCIDENT_KEY\n1\n").unwrap();

        let source = DatasetSource::File(path);
        let bytes = tokio_test::block_on(load_source(&source, &FetchOptions::default())).unwrap();
        assert_eq!(bytes, b"INCIDENT_KEY\n1\n");
    }

    #[test]
    fn test_load_source_missing_file() {
        let source = DatasetSource::File(PathBuf::from("/definitely/not/here.csv"));
        let result = tokio_test::block_on(load_source(&source, &FetchOptions::default()));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_fetch_connection_refused_is_fetch_error() {
        let options = FetchOptions {
            timeout: Duration::from_secs(5),
            retry: RetryPolicy {
                retries: 0,
                backoff: Duration::from_millis(1),
            },
            show_progress: false,
        };
        let result = fetch_dataset("http://127.0.0.1:1/rows.csv", &options).await;
        assert!(matches!(result, Err(PipelineError::Fetch { .. })));
    }

    #[tokio::test]
    async fn test_fetch_retries_server_error_then_succeeds() {
        let (url, accepted) = serve(vec![
            http_status(503, "Service Unavailable"),
            OK_BODY.to_string(),
        ])
        .await;

        let body = fetch_dataset(&url, &quick_options(1)).await.unwrap();
        assert_eq!(body, b"a,b\n1");
        assert_eq!(accepted.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fetch_does_not_retry_not_found() {
        let (url, accepted) = serve(vec![
            http_status(404, "Not Found"),
            OK_BODY.to_string(),
        ])
        .await;

        let result = fetch_dataset(&url, &quick_options(3)).await;
        assert!(matches!(
            result,
            Err(PipelineError::HttpStatus { status: 404, .. })
        ));
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_server_error_without_retries() {
        let (url, accepted) = serve(vec![http_status(500, "Internal Server Error")]).await;

        let result = fetch_dataset(&url, &quick_options(0)).await;
        assert!(matches!(
            result,
            Err(PipelineError::HttpStatus { status: 500, .. })
        ));
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_oversized_content_length_is_fetch_error() {
        let response =
            "HTTP/1.1 200 OK\r\nContent-Length: 999999999999999\r\nConnection: close\r\n\r\nabc";
        let (url, _) = serve(vec![response.to_string()]).await;

        let result = fetch_dataset(&url, &quick_options(0)).await;
        assert!(matches!(result, Err(PipelineError::Fetch { .. })));
    }

    #[tokio::test]
    async fn test_fetch_truncated_body_with_progress_is_fetch_error() {
        let response =
            "HTTP/1.1 200 OK\r\nContent-Length: 10\r\nConnection: close\r\n\r\nabc";
        let (url, _) = serve(vec![response.to_string()]).await;
        let mut options = quick_options(0);
        options.show_progress = true;

        let result = fetch_dataset(&url, &options).await;
        assert!(matches!(result, Err(PipelineError::Fetch { .. })));
    }

    #[test]
    fn test_source_display() {
        let url = DatasetSource::Url("https://example.com/a.csv".to_string());
        assert_eq!(url.to_string(), "https://example.com/a.csv");
    }
}
