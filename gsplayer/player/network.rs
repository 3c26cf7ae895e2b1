use crate::config::Config;
use crate::error::App;
use futures_util::stream::StreamExt;
use log::{error, info};
use reqwest::{Client, Url};
use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tokio::runtime::Runtime;
use tokio::time::{sleep, timeout, Duration};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Turns a media URI into a file the worker can read tags from.
pub trait Retriever {
    fn fetch(&mut self, uri: &str) -> Result<PathBuf, App>;

    /// Deletes every temporary file handed out so far.
    fn cleanup(&mut self);
}

/// Resolves local URIs in place and downloads `http(s)` ones into temp files.
///
/// A download gives up after `fetch_timeout` or `fetch_max_bytes`, so an
/// endless stream is a retrieval failure rather than a stuck worker.
pub struct HttpRetriever {
    client: Client,
    runtime: Runtime,
    attempts: u32,
    retry_delay: Duration,
    fetch_timeout: Duration,
    max_bytes: u64,
    temp_files: Vec<TempPath>,
}

impl HttpRetriever {
    pub fn new(config: &Config) -> Result<Self, App> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(config.fetch_timeout()))
            .build()?;
        Self::with_client(client, config)
    }

    pub fn with_client(client: Client, config: &Config) -> Result<Self, App> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            client,
            runtime,
            attempts: config.fetch_attempts.max(1),
            retry_delay: config.fetch_retry_delay(),
            fetch_timeout: config.fetch_timeout(),
            max_bytes: config.fetch_max_bytes,
            temp_files: Vec::new(),
        })
    }

    async fn download(&self, url: &Url) -> Result<TempPath, App> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?;

        let suffix = Path::new(url.path())
            .extension()
            .and_then(OsStr::to_str)
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();
        let mut file = tempfile::Builder::new()
            .prefix("gsplayer-")
            .suffix(&suffix)
            .tempfile()?;

        let mut written = 0u64;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;
            if written > self.max_bytes {
                return Err(App::Fetch(format!(
                    "{url} is larger than {} bytes",
                    self.max_bytes
                )));
            }
            file.write_all(&chunk)?;
        }
        file.flush()?;
        Ok(file.into_temp_path())
    }

    async fn download_with_retries(&self, url: &Url) -> Result<TempPath, App> {
        let mut retry_delay = self.retry_delay;

        for attempt in 1..=self.attempts {
            match timeout(self.fetch_timeout, self.download(url)).await {
                Ok(Ok(path)) => return Ok(path),
                // Size cap: another attempt would hit it again.
                Ok(Err(e @ App::Fetch(_))) => return Err(e),
                Ok(Err(e)) => error!("Error downloading {}: {}", url, e),
                Err(_) => {
                    return Err(App::Fetch(format!(
                        "{url} did not finish within {:?}",
                        self.fetch_timeout
                    )));
                }
            }
            if attempt < self.attempts {
                info!("Retrying... Attempt {}/{}", attempt, self.attempts);
                sleep(retry_delay).await;
                // Exponential backoff
                retry_delay *= 2;
            }
        }

        Err(App::Fetch(format!("Max retries reached for downloading {url}")))
    }
}

impl Retriever for HttpRetriever {
    fn fetch(&mut self, uri: &str) -> Result<PathBuf, App> {
        if let Ok(url) = Url::parse(uri) {
            return match url.scheme() {
                "file" => url
                    .to_file_path()
                    .map_err(|()| App::Fetch(format!("Not a local file URI: {uri}"))),
                "http" | "https" => {
                    let temp = self.runtime.block_on(self.download_with_retries(&url))?;
                    let path = temp.to_path_buf();
                    self.temp_files.push(temp);
                    Ok(path)
                }
                scheme => Err(App::Fetch(format!("Unsupported scheme '{scheme}' in {uri}"))),
            };
        }

        let path = Path::new(uri);
        if path.is_file() {
            Ok(path.canonicalize()?)
        } else {
            Err(App::Fetch(format!("No such file: {uri}")))
        }
    }

    fn cleanup(&mut self) {
        for temp in self.temp_files.drain(..) {
            if let Err(e) = temp.close() {
                error!("Failed to remove temporary file: {}", e);
            }
        }
    }
}

impl Drop for HttpRetriever {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// `file://` URI for an absolute local path.
pub fn path_to_uri(path: &Path) -> Option<String> {
    Url::from_file_path(path).ok().map(String::from)
}
