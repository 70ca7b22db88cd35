//! Error types for E2E testing

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Element not found: {selector} (waited {elapsed_ms} ms)")]
    ElementNotFound { selector: String, elapsed_ms: u64 },

    #[error("Assertion failed on {selector}: expected {expected}, got {actual} (waited {elapsed_ms} ms)")]
    AssertionMismatch {
        selector: String,
        expected: String,
        actual: String,
        elapsed_ms: u64,
    },

    #[error("Ambiguous target: {selector} matched {matched} elements, expected exactly 1 (waited {elapsed_ms} ms)")]
    AmbiguousTarget {
        selector: String,
        matched: usize,
        elapsed_ms: u64,
    },

    #[error("Step failed: {step} - {reason} (waited {elapsed_ms} ms)")]
    StepFailed {
        step: String,
        reason: String,
        elapsed_ms: u64,
    },

    #[error("Target application unreachable: {0}")]
    TargetUnreachable(String),

    #[error("Server failed to start: {0}")]
    ServerStartup(String),

    #[error("Playwright not found. Install with: npm install playwright && npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright bridge error: {0}")]
    Bridge(String),

    #[error("Test spec parse error: {0}")]
    SpecParse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl E2eError {
    /// Errors that fail only the current scenario. Everything else aborts the run.
    pub fn is_scenario_local(&self) -> bool {
        matches!(
            self,
            E2eError::ElementNotFound { .. }
                | E2eError::AssertionMismatch { .. }
                | E2eError::AmbiguousTarget { .. }
                | E2eError::StepFailed { .. }
        )
    }

    /// Short machine-readable name used in the results report
    pub fn kind(&self) -> &'static str {
        match self {
            E2eError::ElementNotFound { .. } => "element_not_found",
            E2eError::AssertionMismatch { .. } => "assertion_mismatch",
            E2eError::AmbiguousTarget { .. } => "ambiguous_target",
            E2eError::StepFailed { .. } => "step_failed",
            E2eError::TargetUnreachable(_) => "target_unreachable",
            E2eError::ServerStartup(_) => "server_startup",
            E2eError::PlaywrightNotFound => "playwright_not_found",
            E2eError::Bridge(_) => "bridge",
            E2eError::SpecParse(_) => "spec_parse",
            E2eError::Config(_) => "config",
            E2eError::Io(_) => "io",
            E2eError::Json(_) => "json",
            E2eError::Yaml(_) => "yaml",
            E2eError::Toml(_) => "toml",
            E2eError::Http(_) => "http",
        }
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
