//! Playwright browser automation
//!
//! Playwright runs inside a long-lived Node process started from an embedded
//! bridge script. The browser, its context and the page survive between
//! requests, so a scenario's state carries from one step to the next.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::str::FromStr;
use std::time::Duration;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tracing::{debug, info, warn};

use crate::driver::{ActionOutcome, Driver, ElementSnapshot, Interaction};
use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;

const BRIDGE_JS: &str = include_str!("bridge.js");

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" => Ok(Browser::Webkit),
            other => Err(E2eError::Config(format!("unknown browser: {}", other))),
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaywrightConfig {
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Attribute that `test_id` locators match on
    pub test_id_attribute: String,

    /// Directory whose `node_modules` provides `playwright`
    pub project_dir: PathBuf,

    /// Node executable
    pub node_binary: PathBuf,

    /// Upper bound for a single Playwright action (click, type, ...)
    pub action_timeout_ms: u64,

    /// Upper bound for page navigation
    pub navigation_timeout_ms: u64,

    /// Upper bound for the bridge to answer any request
    pub reply_timeout_ms: u64,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            test_id_attribute: "data-test".to_string(),
            project_dir: PathBuf::from("."),
            node_binary: PathBuf::from("node"),
            action_timeout_ms: 4000,
            navigation_timeout_ms: 30_000,
            reply_timeout_ms: 60_000,
        }
    }
}

#[derive(Serialize)]
struct Viewport {
    width: u32,
    height: u32,
}

#[derive(Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum BridgeRequest<'a> {
    Launch {
        browser: &'static str,
        headless: bool,
        viewport: Viewport,
        test_id_attribute: &'a str,
        action_timeout_ms: u64,
        navigation_timeout_ms: u64,
    },
    Open {
        url: &'a str,
    },
    Query {
        locator: &'a Locator,
    },
    Perform {
        locator: &'a Locator,
        interaction: &'a Interaction,
    },
    Screenshot {
        path: &'a Path,
    },
    Close,
}

impl BridgeRequest<'_> {
    fn op(&self) -> &'static str {
        match self {
            BridgeRequest::Launch { .. } => "launch",
            BridgeRequest::Open { .. } => "open",
            BridgeRequest::Query { .. } => "query",
            BridgeRequest::Perform { .. } => "perform",
            BridgeRequest::Screenshot { .. } => "screenshot",
            BridgeRequest::Close => "close",
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    id: u64,
    #[serde(flatten)]
    request: &'a BridgeRequest<'a>,
}

#[derive(Debug, Deserialize)]
struct BridgeReply {
    id: u64,
    ok: bool,
    #[serde(default)]
    result: serde_json::Value,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl BridgeReply {
    fn into_result(self, op: &str) -> E2eResult<serde_json::Value> {
        if self.ok {
            return Ok(self.result);
        }
        let message = self.message.unwrap_or_else(|| "no message".to_string());
        Err(match self.kind.as_deref() {
            Some("unreachable") => E2eError::TargetUnreachable(message),
            Some("action") => E2eError::StepFailed {
                step: op.to_string(),
                reason: message,
                elapsed_ms: 0,
            },
            _ => E2eError::Bridge(format!("{} failed: {}", op, message)),
        })
    }
}

#[derive(Deserialize)]
struct PerformReply {
    matched: usize,
}

/// Playwright browser handle
pub struct PlaywrightDriver {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    reply_timeout: Duration,

    /// Holds the bridge script for the lifetime of the process
    _script_dir: TempDir,
}

impl PlaywrightDriver {
    /// Start the bridge and launch the configured browser
    pub async fn launch(config: PlaywrightConfig) -> E2eResult<Self> {
        Self::check_playwright_installed(&config.project_dir)?;

        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("bridge.js");
        std::fs::write(&script_path, BRIDGE_JS)?;

        debug!("Starting Playwright bridge: {}", script_path.display());

        let mut child = TokioCommand::new(&config.node_binary)
            .arg(&script_path)
            .current_dir(&config.project_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                E2eError::Bridge(format!(
                    "failed to spawn {}: {}",
                    config.node_binary.display(),
                    e
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Bridge("bridge stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Bridge("bridge stdout unavailable".to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "playwright", "{}", line);
                }
            });
        }

        let mut driver = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 0,
            reply_timeout: Duration::from_millis(config.reply_timeout_ms),
            _script_dir: script_dir,
        };

        driver
            .request(&BridgeRequest::Launch {
                browser: config.browser.as_str(),
                headless: config.headless,
                viewport: Viewport {
                    width: config.viewport_width,
                    height: config.viewport_height,
                },
                test_id_attribute: &config.test_id_attribute,
                action_timeout_ms: config.action_timeout_ms,
                navigation_timeout_ms: config.navigation_timeout_ms,
            })
            .await?;

        info!("Launched {} (headless: {})", config.browser.as_str(), config.headless);
        Ok(driver)
    }

    /// Check if Playwright is installed
    fn check_playwright_installed(project_dir: &Path) -> E2eResult<()> {
        let output = Command::new("npx")
            .args(["playwright", "--version"])
            .current_dir(project_dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match output {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    async fn request(&mut self, request: &BridgeRequest<'_>) -> E2eResult<serde_json::Value> {
        self.next_id += 1;
        let id = self.next_id;
        let op = request.op();

        let mut line = serde_json::to_string(&Envelope { id, request })?;
        line.push('\n');

        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| E2eError::Bridge(format!("write to bridge failed: {}", e)))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| E2eError::Bridge(format!("write to bridge failed: {}", e)))?;

        let reply_timeout = self.reply_timeout;
        let reply = tokio::time::timeout(reply_timeout, self.read_reply(id))
            .await
            .map_err(|_| {
                E2eError::Bridge(format!(
                    "no reply to {} within {} ms",
                    op,
                    reply_timeout.as_millis()
                ))
            })??;

        reply.into_result(op)
    }

    async fn read_reply(&mut self, id: u64) -> E2eResult<BridgeReply> {
        loop {
            let line = self
                .stdout
                .next_line()
                .await?
                .ok_or_else(|| E2eError::Bridge("bridge exited".to_string()))?;

            match serde_json::from_str::<BridgeReply>(&line) {
                Ok(reply) if reply.id == id => return Ok(reply),
                Ok(reply) => warn!("Discarding stale bridge reply {}", reply.id),
                Err(_) => debug!(target: "playwright", "{}", line),
            }
        }
    }
}

#[async_trait]
impl Driver for PlaywrightDriver {
    async fn open(&mut self, url: &str) -> E2eResult<()> {
        self.request(&BridgeRequest::Open { url }).await?;
        Ok(())
    }

    async fn query(&mut self, locator: &Locator) -> E2eResult<Vec<ElementSnapshot>> {
        let result = self.request(&BridgeRequest::Query { locator }).await?;
        Ok(serde_json::from_value(result)?)
    }

    async fn perform(&mut self, locator: &Locator, interaction: &Interaction) -> E2eResult<ActionOutcome> {
        let result = self
            .request(&BridgeRequest::Perform { locator, interaction })
            .await?;
        let reply: PerformReply = serde_json::from_value(result)?;
        Ok(match reply.matched {
            1 => ActionOutcome::Done,
            matched => ActionOutcome::Unresolved { matched },
        })
    }

    async fn screenshot(&mut self, path: &Path) -> E2eResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.request(&BridgeRequest::Screenshot { path }).await?;
        Ok(())
    }

    async fn close(&mut self) -> E2eResult<()> {
        let closed = self.request(&BridgeRequest::Close).await;
        match tokio::time::timeout(Duration::from_secs(5), self.child.wait()).await {
            Ok(Ok(status)) => debug!("Playwright bridge exited: {}", status),
            _ => {
                warn!("Playwright bridge did not exit, killing it");
                let _ = self.child.kill().await;
            }
        }
        closed.map(|_| ())
    }
}
