//! To-do app E2E scenario runner
//!
//! This crate drives the example to-do application through Playwright and
//! checks its behavior against declarative YAML scenarios:
//! - Probes (and optionally spawns) the app under test
//! - Controls a browser through a long-lived Playwright bridge process
//! - Retries every action and assertion until it holds or times out
//! - Reports each scenario independently and writes a JSON summary
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  E2E Scenario Runner (Rust)                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── start_server() -> reachability probe                 │
//! │    ├── run_suites(driver, suites) -> TestSuiteResult        │
//! │    └── run_scenario(driver, url, planned) -> ScenarioResult │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Driver (trait)            PlaywrightDriver (node bridge)   │
//! │    ├── open(url)             launch / open / query /        │
//! │    ├── query(locator)        perform / screenshot / close   │
//! │    └── perform(locator, interaction)                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Suite (YAML)                                               │
//! │    ├── name, visit, before_each                             │
//! │    ├── scenarios: [Scenario { name, skip?, steps }]         │
//! │    │     ├── type   { locator, text, submit? }              │
//! │    │     ├── click / check / uncheck { locator }            │
//! │    │     └── assert { locator, expect }                     │
//! │    └── groups: [Group { name, before_each, scenarios }]     │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod expect;
pub mod locator;
pub mod playwright;
pub mod runner;
pub mod server;
pub mod spec;
pub mod wait;

pub use config::RunnerConfig;
pub use driver::{ActionOutcome, Driver, ElementSnapshot, Interaction};
pub use error::{E2eError, E2eResult};
pub use expect::Expectation;
pub use locator::Locator;
pub use runner::{ScenarioResult, Status, TestRunner, TestSuiteResult};
pub use spec::{Suite, TestStep};
