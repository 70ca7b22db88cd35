//! Browser driver abstraction
//!
//! The runner talks to the page only through [`Driver`]. Every call is a
//! single attempt: waiting and retrying belong to the runner, so a driver
//! reports "zero or several elements matched" as a normal outcome rather than
//! an error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::E2eResult;
use crate::locator::Locator;

/// Observable state of one element at query time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    /// Lower-case tag name
    pub tag: String,

    /// `textContent`, trimmed
    pub text: String,

    #[serde(default)]
    pub classes: Vec<String>,

    /// Checked state for checkboxes and radios, `None` otherwise
    #[serde(default)]
    pub checked: Option<bool>,

    /// Has a layout box; read by `visible` expectations
    #[serde(default)]
    pub visible: bool,
}

impl ElementSnapshot {
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }
}

/// A user interaction performed on exactly one element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Interaction {
    Click,
    Check,
    Uncheck,
    /// Type into an input, optionally pressing Enter afterwards
    Type { text: String, submit: bool },
}

/// Result of a single attempt at an interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The interaction was performed
    Done,
    /// The locator did not resolve to exactly one element; nothing happened
    Unresolved { matched: usize },
}

#[async_trait]
pub trait Driver: Send {
    /// Open `url` in a fresh browsing context, discarding any previous page state.
    async fn open(&mut self, url: &str) -> E2eResult<()>;

    /// Snapshot every element the locator currently resolves to.
    async fn query(&mut self, locator: &Locator) -> E2eResult<Vec<ElementSnapshot>>;

    /// Perform `interaction` if the locator resolves to exactly one element.
    async fn perform(&mut self, locator: &Locator, interaction: &Interaction) -> E2eResult<ActionOutcome>;

    /// Save a screenshot of the current page.
    async fn screenshot(&mut self, path: &Path) -> E2eResult<()>;

    /// Release the browser.
    async fn close(&mut self) -> E2eResult<()>;
}
