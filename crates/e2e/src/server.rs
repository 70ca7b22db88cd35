//! Target application management
//!
//! The to-do app is normally already running. When a launch command is
//! configured it is spawned first. Either way the page must answer before any
//! scenario runs; an unreachable target aborts the whole run.

use std::process::Stdio;
use std::time::{Duration, Instant};
use serde::{Deserialize, Serialize};
use tokio::process::{Child, Command};
use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use crate::error::{E2eError, E2eResult};

/// Configuration for reaching (and optionally spawning) the app under test
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Command line that starts the app, e.g. `["npm", "start"]`
    pub command: Option<Vec<String>>,

    /// How long to wait for the page to answer
    pub startup_timeout_ms: u64,

    /// Delay between reachability attempts
    pub probe_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            command: None,
            startup_timeout_ms: 30_000,
            probe_interval_ms: 250,
        }
    }
}

/// How long a SIGTERM'd app gets to exit before it is killed
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Handle to a spawned app process
pub struct ServerHandle {
    /// `None` once stopped
    child: Option<Child>,
}

impl ServerHandle {
    /// Spawn the configured command, if any
    pub fn spawn(config: &ServerConfig) -> E2eResult<Option<Self>> {
        let Some(command) = config.command.as_ref() else {
            return Ok(None);
        };
        let (program, args) = command
            .split_first()
            .ok_or_else(|| E2eError::Config("server command is empty".to_string()))?;

        info!("Spawning target app: {}", command.join(" "));

        let child = Command::new(program)
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| E2eError::ServerStartup(format!("failed to spawn {}: {}", program, e)))?;

        Ok(Some(Self { child: Some(child) }))
    }

    /// Process id, while the app has not been stopped or reaped
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Stop the app. Later calls do nothing.
    pub async fn stop(&mut self) -> E2eResult<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        info!("Stopping target app (pid: {:?})", child.id());

        // Try graceful shutdown first
        #[cfg(unix)]
        if let Some(id) = child.id() {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if kill(Pid::from_raw(id as i32), Signal::SIGTERM).is_ok()
                && matches!(timeout(SHUTDOWN_GRACE, child.wait()).await, Ok(Ok(_)))
            {
                return Ok(());
            }
        }

        // Force kill if still running
        child.kill().await?;
        Ok(())
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            let _ = child.start_kill();
        }
    }
}

/// Wait until `url` answers with a success status
pub async fn wait_until_reachable(url: &str, config: &ServerConfig) -> E2eResult<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()?;

    let timeout = Duration::from_millis(config.startup_timeout_ms);
    let start = Instant::now();
    let mut attempts = 0;
    let mut last_problem = String::from("no attempt made");

    loop {
        attempts += 1;

        match client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!("Target app is reachable at {}", url);
                return Ok(());
            }
            Ok(resp) => {
                last_problem = format!("HTTP {}", resp.status());
                warn!("Reachability check returned {}", resp.status());
            }
            Err(e) => {
                if attempts == 1 {
                    info!("Waiting for {} to answer...", url);
                }
                // Connection refused is expected while the app is starting
                if !e.is_connect() {
                    warn!("Reachability check error: {}", e);
                }
                last_problem = e.to_string();
            }
        }

        if start.elapsed() >= timeout {
            break;
        }
        sleep(Duration::from_millis(config.probe_interval_ms)).await;
    }

    Err(E2eError::TargetUnreachable(format!(
        "{} after {} attempts: {}",
        url, attempts, last_problem
    )))
}
