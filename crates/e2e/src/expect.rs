//! Assertion predicates over element snapshots

use serde::{Deserialize, Serialize};

use crate::driver::ElementSnapshot;

/// What an `assert` step expects of the elements its locator resolves to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    /// Exactly this many elements match
    Count(usize),

    /// Combined text content equals the string
    Text(String),

    /// Combined text content differs from the string
    NotText(String),

    /// Every matched element carries the class
    HasClass(String),

    /// No matched element carries the class
    LacksClass(String),

    /// Every matched checkbox has this checked state
    Checked(bool),

    /// Every matched element is rendered (`true`) or hidden (`false`)
    Visible(bool),

    /// At least one element matches
    Exists,

    /// No element matches
    NotExist,
}

/// Outcome of evaluating an expectation once
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    /// The expectation needs an element and none matched
    Missing,
    /// Elements matched but disagree; carries the observed value
    Mismatch(String),
}

impl Expectation {
    pub fn evaluate(&self, elements: &[ElementSnapshot]) -> Verdict {
        match self {
            Expectation::Count(n) => check(elements.len() == *n, || count(elements)),
            Expectation::Exists => {
                if elements.is_empty() {
                    Verdict::Missing
                } else {
                    Verdict::Pass
                }
            }
            Expectation::NotExist => check(elements.is_empty(), || count(elements)),
            _ if elements.is_empty() => Verdict::Missing,
            Expectation::Text(expected) => {
                let actual = combined_text(elements);
                check(&actual == expected, || format!("text {:?}", actual))
            }
            Expectation::NotText(unexpected) => {
                let actual = combined_text(elements);
                check(&actual != unexpected, || format!("text {:?}", actual))
            }
            Expectation::HasClass(class) => check(
                elements.iter().all(|e| e.has_class(class)),
                || classes(elements),
            ),
            Expectation::LacksClass(class) => check(
                !elements.iter().any(|e| e.has_class(class)),
                || classes(elements),
            ),
            Expectation::Checked(state) => check(
                elements.iter().all(|e| e.checked == Some(*state)),
                || {
                    let states: Vec<String> = elements
                        .iter()
                        .map(|e| match e.checked {
                            Some(true) => "checked".to_string(),
                            Some(false) => "unchecked".to_string(),
                            None => format!("<{}> not a checkbox", e.tag),
                        })
                        .collect();
                    states.join(", ")
                },
            ),
            Expectation::Visible(state) => check(
                elements.iter().all(|e| e.visible == *state),
                || {
                    let states: Vec<&str> = elements
                        .iter()
                        .map(|e| if e.visible { "visible" } else { "hidden" })
                        .collect();
                    states.join(", ")
                },
            ),
        }
    }

    /// Human-readable form used as the "expected" side of a mismatch
    pub fn describe(&self) -> String {
        match self {
            Expectation::Count(n) => format!("count {}", n),
            Expectation::Text(t) => format!("text {:?}", t),
            Expectation::NotText(t) => format!("text other than {:?}", t),
            Expectation::HasClass(c) => format!("class {:?}", c),
            Expectation::LacksClass(c) => format!("no class {:?}", c),
            Expectation::Checked(true) => "checked".to_string(),
            Expectation::Checked(false) => "unchecked".to_string(),
            Expectation::Visible(true) => "visible".to_string(),
            Expectation::Visible(false) => "hidden".to_string(),
            Expectation::Exists => "at least one element".to_string(),
            Expectation::NotExist => "count 0".to_string(),
        }
    }
}

fn check(ok: bool, actual: impl FnOnce() -> String) -> Verdict {
    if ok {
        Verdict::Pass
    } else {
        Verdict::Mismatch(actual())
    }
}

fn count(elements: &[ElementSnapshot]) -> String {
    format!("count {}", elements.len())
}

// Multiple matches read as one string, the way jQuery's `.text()` does
fn combined_text(elements: &[ElementSnapshot]) -> String {
    elements.iter().map(|e| e.text.as_str()).collect()
}

fn classes(elements: &[ElementSnapshot]) -> String {
    let sets: Vec<String> = elements
        .iter()
        .map(|e| format!("class {:?}", e.classes.join(" ")))
        .collect();
    sets.join(", ")
}
