//! Runner configuration
//!
//! Defaults, optionally overlaid by a TOML file, then by command-line flags.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{E2eError, E2eResult};
use crate::playwright::PlaywrightConfig;
use crate::server::ServerConfig;
use crate::wait::{Backoff, Poller};

/// Configuration for the test runner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Origin serving the app under test
    pub base_url: String,

    /// How long a step may keep retrying before it fails
    pub command_timeout_ms: u64,

    /// Retry pacing
    pub poll: PollConfig,

    /// Directory for `test-results.json` and failure screenshots
    pub output_dir: PathBuf,

    /// Capture the page when a scenario fails
    pub screenshot_on_failure: bool,

    pub playwright: PlaywrightConfig,

    pub server: ServerConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            command_timeout_ms: 4000,
            poll: PollConfig::default(),
            output_dir: PathBuf::from("test-results"),
            screenshot_on_failure: true,
            playwright: PlaywrightConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_ms: u64,
    pub backoff: Backoff,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 50,
            backoff: Backoff::Fixed,
        }
    }
}

impl RunnerConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| E2eError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> E2eResult<Self> {
        let config: RunnerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> E2eResult<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(E2eError::Config(format!(
                "base_url must be an http(s) URL: {}",
                self.base_url
            )));
        }
        if self.poll.interval_ms == 0 {
            return Err(E2eError::Config("poll.interval_ms must be positive".to_string()));
        }
        if let Backoff::Exponential { factor, .. } = self.poll.backoff {
            if !(factor >= 1.0) {
                return Err(E2eError::Config(format!(
                    "poll.backoff.factor must be at least 1.0, got {}",
                    factor
                )));
            }
        }
        Ok(())
    }

    /// Full URL of a page path on the target
    pub fn page_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    pub fn poller(&self) -> Poller {
        Poller::new(
            Duration::from_millis(self.command_timeout_ms),
            Duration::from_millis(self.poll.interval_ms),
            self.poll.backoff.clone(),
        )
    }
}
