//! Element locators
//!
//! A locator is a root selector followed by a chain of DOM traversals, e.g.
//! "the element containing `Pay electric bill`, its parent, then the checkbox
//! inside it". Locators are plain data: resolving them is the driver's job.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Root selector of a locator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    /// CSS selector (e.g. `.todo-list li`)
    Css(String),

    /// Deepest elements whose text content contains the given string
    Contains(String),

    /// Element carrying the stable test attribute with this value
    TestId(String),
}

/// One traversal step applied to the current element set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Traverse {
    /// Direct parent of each element
    Parent,
    /// Nearest ancestor matching a CSS selector (the element itself excluded)
    Closest(String),
    /// Descendants matching a CSS selector
    Find(String),
    /// First element of the set
    First,
    /// Last element of the set
    Last,
    /// Element at a zero-based index
    Nth(usize),
}

/// A selector plus its traversal chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    #[serde(flatten)]
    pub root: Selector,

    #[serde(default)]
    pub then: Vec<Traverse>,
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::from(Selector::Css(selector.into()))
    }

    pub fn contains(text: impl Into<String>) -> Self {
        Self::from(Selector::Contains(text.into()))
    }

    pub fn test_id(id: impl Into<String>) -> Self {
        Self::from(Selector::TestId(id.into()))
    }

    #[must_use]
    pub fn parent(self) -> Self {
        self.push(Traverse::Parent)
    }

    #[must_use]
    pub fn closest(self, selector: impl Into<String>) -> Self {
        self.push(Traverse::Closest(selector.into()))
    }

    #[must_use]
    pub fn find(self, selector: impl Into<String>) -> Self {
        self.push(Traverse::Find(selector.into()))
    }

    #[must_use]
    pub fn first(self) -> Self {
        self.push(Traverse::First)
    }

    #[must_use]
    pub fn last(self) -> Self {
        self.push(Traverse::Last)
    }

    #[must_use]
    pub fn nth(self, index: usize) -> Self {
        self.push(Traverse::Nth(index))
    }

    fn push(mut self, step: Traverse) -> Self {
        self.then.push(step);
        self
    }
}

impl From<Selector> for Locator {
    fn from(root: Selector) -> Self {
        Self { root, then: Vec::new() }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Css(css) => write!(f, "{}", css),
            Selector::Contains(text) => write!(f, "contains({:?})", text),
            Selector::TestId(id) => write!(f, "test_id({})", id),
        }
    }
}

impl fmt::Display for Traverse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Traverse::Parent => write!(f, "parent"),
            Traverse::Closest(css) => write!(f, "closest({})", css),
            Traverse::Find(css) => write!(f, "find({})", css),
            Traverse::First => write!(f, "first"),
            Traverse::Last => write!(f, "last"),
            Traverse::Nth(i) => write!(f, "nth({})", i),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)?;
        for step in &self.then {
            write!(f, " > {}", step)?;
        }
        Ok(())
    }
}
