use crate::error::App;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Runtime settings for the player, read from `config.toml`.
///
/// Every field is optional in the file; anything missing takes its default.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Pipeline description used as playbin's audio sink, e.g.
    /// `"audioconvert ! pulsesink"`.
    pub audio_sink: Option<String>,
    /// How long a getter waits for its matching update.
    pub wait_timeout_ms: u64,
    /// Skipped updates a single read may put back before it starts dropping stale ones.
    pub max_requeue: usize,
    /// Longest time the worker waits on the command queue per iteration.
    pub tick_ms: u64,
    /// Publish a position update this often while playing.
    pub position_interval_ms: Option<u64>,
    pub fetch_attempts: u32,
    pub fetch_retry_delay_ms: u64,
    /// Upper bound on one download attempt, body included.
    pub fetch_timeout_ms: u64,
    /// Downloads larger than this are abandoned and the URI is played directly.
    pub fetch_max_bytes: u64,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            audio_sink: None,
            wait_timeout_ms: 1000,
            max_requeue: 100,
            tick_ms: 10,
            position_interval_ms: None,
            fetch_attempts: 2,
            fetch_retry_delay_ms: 500,
            fetch_timeout_ms: 20_000,
            fetch_max_bytes: 200 * 1024 * 1024,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self, App> {
        Ok(toml::from_str(content)?)
    }

    /// Loads the config at `file_path`, falling back to defaults when the file does not exist.
    pub async fn load(file_path: &Path) -> Result<Self, App> {
        if !tokio::fs::try_exists(file_path).await? {
            log::info!("No config at {}, using defaults", file_path.display());
            return Ok(Self::default());
        }
        log::info!("Loading config");
        let content = tokio::fs::read_to_string(file_path).await?;
        Self::from_toml_str(&content)
    }

    pub fn config_dir() -> Result<PathBuf, App> {
        let home_dir = std::env::var("HOME")
            .map_err(|e| App::Io(format!("Failed to get HOME environment variable: {e}")))?;
        Ok(PathBuf::from(home_dir).join(".config").join("gsplayer"))
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn position_interval(&self) -> Option<Duration> {
        self.position_interval_ms.map(Duration::from_millis)
    }

    pub fn fetch_retry_delay(&self) -> Duration {
        Duration::from_millis(self.fetch_retry_delay_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}
