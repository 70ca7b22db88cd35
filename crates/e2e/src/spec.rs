//! Declarative YAML scenario suites
//!
//! A suite is a tree: groups hold scenarios and nested groups, and every level
//! may declare `before_each` steps. Planning flattens the tree so each
//! scenario carries the setup of all its enclosing groups, outermost first.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use crate::error::{E2eError, E2eResult};
use crate::expect::Expectation;
use crate::locator::Locator;

const BUILTIN_SUITE: &str = include_str!("../specs/todo.yaml");

/// A complete suite parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suite {
    /// Suite title, prefixed to every scenario name
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Page path opened at the start of every scenario
    #[serde(default = "default_visit")]
    pub visit: String,

    /// Steps run before every scenario in the suite
    #[serde(default)]
    pub before_each: Vec<TestStep>,

    #[serde(default)]
    pub scenarios: Vec<Scenario>,

    #[serde(default)]
    pub groups: Vec<Group>,
}

fn default_visit() -> String {
    "/".to_string()
}

/// Scenarios sharing extra setup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub name: String,

    /// Runs after the enclosing levels' `before_each`
    #[serde(default)]
    pub before_each: Vec<TestStep>,

    #[serde(default)]
    pub scenarios: Vec<Scenario>,

    #[serde(default)]
    pub groups: Vec<Group>,
}

/// One independent test case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,

    /// Reported as skipped without touching the browser
    #[serde(default)]
    pub skip: bool,

    pub steps: Vec<TestStep>,
}

/// A single step in a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TestStep {
    /// Type text into an element, optionally pressing Enter afterwards
    Type {
        locator: Locator,
        text: String,
        #[serde(default)]
        submit: bool,
    },

    /// Click an element
    Click { locator: Locator },

    /// Check a checkbox
    Check { locator: Locator },

    /// Uncheck a checkbox
    Uncheck { locator: Locator },

    /// Assert something about the elements a locator resolves to
    Assert {
        locator: Locator,
        expect: Expectation,
    },

    /// Log a message (for debugging)
    Log { message: String },
}

impl fmt::Display for TestStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestStep::Type { locator, text, submit } => {
                write!(f, "type {:?} into {}", text, locator)?;
                if *submit {
                    write!(f, " + enter")?;
                }
                Ok(())
            }
            TestStep::Click { locator } => write!(f, "click {}", locator),
            TestStep::Check { locator } => write!(f, "check {}", locator),
            TestStep::Uncheck { locator } => write!(f, "uncheck {}", locator),
            TestStep::Assert { locator, expect } => {
                write!(f, "assert {} has {}", locator, expect.describe())
            }
            TestStep::Log { message } => write!(f, "log {:?}", message),
        }
    }
}

/// A scenario with its inherited setup resolved
#[derive(Debug, Clone)]
pub struct PlannedScenario {
    /// Suite, group and scenario names, outermost first
    pub path: Vec<String>,
    pub skip: bool,
    pub setup: Vec<TestStep>,
    pub steps: Vec<TestStep>,
}

impl PlannedScenario {
    pub fn title(&self) -> String {
        self.path.join(" > ")
    }
}

impl Suite {
    /// Parse a suite from a YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let suite: Suite = serde_yaml::from_str(yaml)?;
        suite.validate()?;
        Ok(suite)
    }

    /// Parse a suite from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::SpecParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all suites from a directory, ordered by path
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut paths: Vec<_> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
            .map(|e| e.into_path())
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(E2eError::SpecParse(format!(
                "no .yaml suites under {}",
                dir.display()
            )));
        }

        paths.iter().map(|p| Self::from_file(p)).collect()
    }

    /// The to-do app suite compiled into the binary
    pub fn builtin() -> E2eResult<Self> {
        Self::from_yaml(BUILTIN_SUITE)
    }

    /// Flatten groups into scenarios in declaration order
    pub fn plan(&self) -> Vec<PlannedScenario> {
        let mut planned = Vec::new();
        let root = vec![self.name.clone()];
        collect(&root, &self.before_each, &self.scenarios, &self.groups, &mut planned);
        planned
    }

    fn validate(&self) -> E2eResult<()> {
        if !self.visit.starts_with('/') {
            return Err(E2eError::SpecParse(format!(
                "visit path must start with '/': {}",
                self.visit
            )));
        }

        let planned = self.plan();
        if planned.is_empty() {
            return Err(E2eError::SpecParse(format!("suite '{}' has no scenarios", self.name)));
        }

        let mut titles = HashSet::new();
        for scenario in &planned {
            if scenario.path.iter().any(|name| name.trim().is_empty()) {
                return Err(E2eError::SpecParse(format!(
                    "empty name in '{}'",
                    scenario.title()
                )));
            }
            if scenario.steps.is_empty() {
                return Err(E2eError::SpecParse(format!(
                    "scenario '{}' has no steps",
                    scenario.title()
                )));
            }
            if !titles.insert(scenario.title()) {
                return Err(E2eError::SpecParse(format!(
                    "duplicate scenario '{}'",
                    scenario.title()
                )));
            }
        }
        Ok(())
    }
}

fn collect(
    path: &[String],
    setup: &[TestStep],
    scenarios: &[Scenario],
    groups: &[Group],
    out: &mut Vec<PlannedScenario>,
) {
    for scenario in scenarios {
        let mut full = path.to_vec();
        full.push(scenario.name.clone());
        out.push(PlannedScenario {
            path: full,
            skip: scenario.skip,
            setup: setup.to_vec(),
            steps: scenario.steps.clone(),
        });
    }

    for group in groups {
        let mut group_path = path.to_vec();
        group_path.push(group.name.clone());
        let mut group_setup = setup.to_vec();
        group_setup.extend(group.before_each.iter().cloned());
        collect(&group_path, &group_setup, &group.scenarios, &group.groups, out);
    }
}
