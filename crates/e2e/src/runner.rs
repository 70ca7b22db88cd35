//! Main test runner that orchestrates the target app, the browser driver and the scenarios

use std::path::PathBuf;
use std::time::Instant;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::RunnerConfig;
use crate::driver::{ActionOutcome, Driver, Interaction};
use crate::error::{E2eError, E2eResult};
use crate::expect::{Expectation, Verdict};
use crate::locator::Locator;
use crate::server::{self, ServerHandle};
use crate::spec::{PlannedScenario, Suite, TestStep};
use crate::wait::Poller;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Passed,
    Failed,
    Skipped,
}

/// Whether a step came from a `before_each` block or the scenario itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Setup,
    Scenario,
}

/// Result of executing a test step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step: String,
    pub phase: Phase,
    pub status: Status,
    pub duration_ms: u64,
    pub probes: u32,
}

/// Structured description of why a scenario failed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Failure {
    pub kind: String,
    pub step: String,
    pub message: String,
    pub selector: Option<String>,
    pub expected: Option<String>,
    pub actual: Option<String>,
    pub elapsed_ms: Option<u64>,
}

impl Failure {
    fn from_error(step: &TestStep, err: &E2eError) -> Self {
        let mut failure = Failure {
            kind: err.kind().to_string(),
            step: step.to_string(),
            message: err.to_string(),
            selector: None,
            expected: None,
            actual: None,
            elapsed_ms: None,
        };
        match err {
            E2eError::ElementNotFound { selector, elapsed_ms } => {
                failure.selector = Some(selector.clone());
                failure.elapsed_ms = Some(*elapsed_ms);
            }
            E2eError::AssertionMismatch { selector, expected, actual, elapsed_ms } => {
                failure.selector = Some(selector.clone());
                failure.expected = Some(expected.clone());
                failure.actual = Some(actual.clone());
                failure.elapsed_ms = Some(*elapsed_ms);
            }
            E2eError::AmbiguousTarget { selector, matched, elapsed_ms } => {
                failure.selector = Some(selector.clone());
                failure.expected = Some("exactly 1 element".to_string());
                failure.actual = Some(format!("{} elements", matched));
                failure.elapsed_ms = Some(*elapsed_ms);
            }
            E2eError::StepFailed { elapsed_ms, .. } => {
                failure.elapsed_ms = Some(*elapsed_ms);
            }
            _ => {}
        }
        failure
    }
}

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub path: Vec<String>,
    pub status: Status,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub failure: Option<Failure>,
    pub screenshot: Option<PathBuf>,
}

impl ScenarioResult {
    pub fn success(&self) -> bool {
        self.status != Status::Failed
    }
}

/// Result of running all scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

impl TestSuiteResult {
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Main E2E test runner
pub struct TestRunner {
    config: RunnerConfig,
    poller: Poller,

    /// Spawned target app (if any)
    server: Option<ServerHandle>,
}

impl TestRunner {
    /// Create a new test runner with default configuration
    pub fn new() -> Self {
        Self::with_config(RunnerConfig::default())
    }

    /// Create a test runner with custom configuration
    pub fn with_config(config: RunnerConfig) -> Self {
        let poller = config.poller();
        Self {
            config,
            poller,
            server: None,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Spawn the target app if configured, then wait for `path` to answer
    pub async fn start_server(&mut self, path: &str) -> E2eResult<()> {
        if self.server.is_none() {
            self.server = ServerHandle::spawn(&self.config.server)?;
        }
        server::wait_until_reachable(&self.config.page_url(path), &self.config.server).await
    }

    /// Stop the spawned app
    pub async fn stop_server(&mut self) -> E2eResult<()> {
        if let Some(mut server) = self.server.take() {
            server.stop().await?;
        }
        Ok(())
    }

    /// Run every scenario of `suites` whose title contains `grep`
    ///
    /// Scenario failures are recorded in the result; only environment-level
    /// errors abort the run and come back as `Err`.
    pub async fn run_suites<D: Driver>(
        &self,
        driver: &mut D,
        suites: &[Suite],
        grep: Option<&str>,
    ) -> E2eResult<TestSuiteResult> {
        let started_at = Utc::now();
        let start = Instant::now();

        let planned: Vec<(&Suite, PlannedScenario)> = suites
            .iter()
            .flat_map(|suite| suite.plan().into_iter().map(move |s| (suite, s)))
            .filter(|(_, s)| grep.map_or(true, |g| s.title().contains(g)))
            .collect();

        if planned.is_empty() {
            return Err(E2eError::Config(match grep {
                Some(g) => format!("no scenario matches {:?}", g),
                None => "no scenarios to run".to_string(),
            }));
        }

        info!("Running {} scenario(s)...", planned.len());

        let mut results = Vec::with_capacity(planned.len());
        for (suite, scenario) in &planned {
            let url = self.config.page_url(&suite.visit);
            let result = self.run_scenario(driver, &url, scenario).await?;

            match result.status {
                Status::Passed => info!("✓ {} ({} ms)", result.name, result.duration_ms),
                Status::Skipped => info!("- {} (skipped)", result.name),
                Status::Failed => error!(
                    "✗ {} - {}",
                    result.name,
                    result
                        .failure
                        .as_ref()
                        .map(|f| f.message.as_str())
                        .unwrap_or("unknown error")
                ),
            }
            results.push(result);
        }

        let count = |status: Status| results.iter().filter(|r| r.status == status).count();
        let passed = count(Status::Passed);
        let failed = count(Status::Failed);
        let skipped = count(Status::Skipped);
        let duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Test Results: {} passed, {} failed, {} skipped ({} ms)",
            passed, failed, skipped, duration_ms
        );

        Ok(TestSuiteResult {
            started_at,
            total: results.len(),
            passed,
            failed,
            skipped,
            duration_ms,
            results,
        })
    }

    /// Run a single planned scenario in a fresh page at `url`
    pub async fn run_scenario<D: Driver>(
        &self,
        driver: &mut D,
        url: &str,
        scenario: &PlannedScenario,
    ) -> E2eResult<ScenarioResult> {
        let start = Instant::now();
        let name = scenario.title();
        let all_steps = scenario
            .setup
            .iter()
            .map(|s| (Phase::Setup, s))
            .chain(scenario.steps.iter().map(|s| (Phase::Scenario, s)));

        if scenario.skip {
            return Ok(ScenarioResult {
                name,
                path: scenario.path.clone(),
                status: Status::Skipped,
                duration_ms: 0,
                steps: all_steps.map(|(phase, s)| skipped(phase, s)).collect(),
                failure: None,
                screenshot: None,
            });
        }

        debug!("Running scenario: {}", name);
        driver.open(url).await?;

        let mut steps = Vec::new();
        let mut failure: Option<Failure> = None;

        for (phase, step) in all_steps {
            if failure.is_some() {
                steps.push(skipped(phase, step));
                continue;
            }

            let step_start = Instant::now();
            let outcome = self.run_step(driver, step).await;
            let duration_ms = step_start.elapsed().as_millis() as u64;

            match outcome {
                Ok(probes) => {
                    debug!("  ✓ {} ({} probes)", step, probes);
                    steps.push(StepResult {
                        step: step.to_string(),
                        phase,
                        status: Status::Passed,
                        duration_ms,
                        probes,
                    });
                }
                Err(e) if e.is_scenario_local() => {
                    debug!("  ✗ {}: {}", step, e);
                    failure = Some(Failure::from_error(step, &e));
                    steps.push(StepResult {
                        step: step.to_string(),
                        phase,
                        status: Status::Failed,
                        duration_ms,
                        probes: 0,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        let screenshot = match &failure {
            Some(_) if self.config.screenshot_on_failure => self.capture(driver, &name).await?,
            _ => None,
        };

        Ok(ScenarioResult {
            name,
            path: scenario.path.clone(),
            status: if failure.is_some() { Status::Failed } else { Status::Passed },
            duration_ms: start.elapsed().as_millis() as u64,
            steps,
            failure,
            screenshot,
        })
    }

    /// Execute one step, returning the number of probes it took
    async fn run_step<D: Driver>(&self, driver: &mut D, step: &TestStep) -> E2eResult<u32> {
        let result = match step {
            TestStep::Type { locator, text, submit } => {
                let interaction = Interaction::Type {
                    text: text.clone(),
                    submit: *submit,
                };
                self.interact(driver, locator, &interaction).await
            }
            TestStep::Click { locator } => self.interact(driver, locator, &Interaction::Click).await,
            TestStep::Check { locator } => self.interact(driver, locator, &Interaction::Check).await,
            TestStep::Uncheck { locator } => {
                self.interact(driver, locator, &Interaction::Uncheck).await
            }
            TestStep::Assert { locator, expect } => self.assert(driver, locator, expect).await,
            TestStep::Log { message } => {
                info!("[TEST LOG] {}", message);
                Ok(1)
            }
        };

        // Name the step the scenario author wrote, not the bridge op
        result.map_err(|e| match e {
            E2eError::StepFailed { reason, elapsed_ms, .. } => E2eError::StepFailed {
                step: step.to_string(),
                reason,
                elapsed_ms,
            },
            other => other,
        })
    }

    async fn interact<D: Driver>(
        &self,
        driver: &mut D,
        locator: &Locator,
        interaction: &Interaction,
    ) -> E2eResult<u32> {
        let mut wait = self.poller.start();
        loop {
            let miss = match driver.perform(locator, interaction).await {
                Ok(ActionOutcome::Done) => return Ok(wait.probes()),
                Ok(ActionOutcome::Unresolved { matched }) => Miss::Unresolved(matched),
                Err(E2eError::StepFailed { reason, .. }) => Miss::Rejected(reason),
                Err(e) => return Err(e),
            };

            if !wait.retry().await {
                let selector = locator.to_string();
                let elapsed_ms = wait.elapsed().as_millis() as u64;
                return Err(match miss {
                    Miss::Unresolved(0) => E2eError::ElementNotFound { selector, elapsed_ms },
                    Miss::Unresolved(matched) => {
                        E2eError::AmbiguousTarget { selector, matched, elapsed_ms }
                    }
                    Miss::Rejected(reason) | Miss::Mismatch(reason) => E2eError::StepFailed {
                        step: selector,
                        reason,
                        elapsed_ms,
                    },
                });
            }
            if let Miss::Rejected(reason) = &miss {
                debug!("  retrying {} after rejection: {}", locator, reason);
            }
        }
    }

    async fn assert<D: Driver>(
        &self,
        driver: &mut D,
        locator: &Locator,
        expectation: &Expectation,
    ) -> E2eResult<u32> {
        let mut wait = self.poller.start();
        loop {
            let miss = match driver.query(locator).await {
                Ok(elements) => match expectation.evaluate(&elements) {
                    Verdict::Pass => return Ok(wait.probes()),
                    Verdict::Missing => Miss::Unresolved(0),
                    Verdict::Mismatch(actual) => Miss::Mismatch(actual),
                },
                Err(E2eError::StepFailed { reason, .. }) => Miss::Rejected(reason),
                Err(e) => return Err(e),
            };

            if !wait.retry().await {
                let selector = locator.to_string();
                let elapsed_ms = wait.elapsed().as_millis() as u64;
                return Err(match miss {
                    Miss::Mismatch(actual) => E2eError::AssertionMismatch {
                        selector,
                        expected: expectation.describe(),
                        actual,
                        elapsed_ms,
                    },
                    Miss::Rejected(reason) => E2eError::StepFailed {
                        step: selector,
                        reason,
                        elapsed_ms,
                    },
                    Miss::Unresolved(_) => E2eError::ElementNotFound { selector, elapsed_ms },
                });
            }
        }
    }

    async fn capture<D: Driver>(&self, driver: &mut D, name: &str) -> E2eResult<Option<PathBuf>> {
        let path = self
            .config
            .output_dir
            .join("screenshots")
            .join(format!("{}.png", slug(name)));

        match driver.screenshot(&path).await {
            Ok(()) => Ok(Some(path)),
            Err(e) if e.is_scenario_local() || matches!(e, E2eError::Io(_)) => {
                warn!("Could not capture screenshot for '{}': {}", name, e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Write test results to JSON file
    pub fn write_results(&self, results: &TestSuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

impl Default for TestRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// Last unsuccessful probe of a step; only the final one is reported
enum Miss {
    /// Locator matched this many elements where one (or any) was needed
    Unresolved(usize),
    Mismatch(String),
    /// The browser refused the probe, e.g. the element detached mid re-render
    Rejected(String),
}

fn skipped(phase: Phase, step: &TestStep) -> StepResult {
    StepResult {
        step: step.to_string(),
        phase,
        status: Status::Skipped,
        duration_ms: 0,
        probes: 0,
    }
}

fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}
