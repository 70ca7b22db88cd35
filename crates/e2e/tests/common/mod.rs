//! In-memory stand-in for the to-do app and its browser
//!
//! Renders the app state into a small element tree on every call and resolves
//! locators against it the same way the Playwright bridge does in a real page.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use async_trait::async_trait;

use todo_e2e::driver::{ActionOutcome, Driver, ElementSnapshot, Interaction};
use todo_e2e::locator::{Locator, Selector, Traverse};
use todo_e2e::{E2eError, E2eResult, RunnerConfig};

pub const SEED: [&str; 2] = ["Pay electric bill", "Walk the dog"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    All,
    Active,
    Completed,
}

/// Deliberate bugs the app can be started with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Defect {
    /// "Active" keeps showing completed items
    ActiveFilterShowsAll,
    /// "Clear completed" stays on screen after clearing
    ClearButtonNeverHides,
    /// The first seeded item and every added item start out completed
    StartsCompleted,
}

#[derive(Debug, Clone)]
struct Item {
    text: String,
    completed: bool,
}

#[derive(Debug, Clone, Copy)]
enum Hook {
    NewTodo,
    Toggle(usize),
    Filter(Filter),
    ClearCompleted,
}

#[derive(Debug)]
struct Node {
    tag: &'static str,
    classes: Vec<&'static str>,
    attrs: Vec<(&'static str, String)>,
    text: String,
    checked: Option<bool>,
    hook: Option<Hook>,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// Element tree in document order
struct Dom {
    nodes: Vec<Node>,
}

impl Dom {
    fn new() -> Self {
        let body = Node {
            tag: "body",
            classes: vec![],
            attrs: vec![],
            text: String::new(),
            checked: None,
            hook: None,
            parent: None,
            children: vec![],
        };
        Self { nodes: vec![body] }
    }

    fn add(&mut self, parent: usize, tag: &'static str, classes: &[&'static str]) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node {
            tag,
            classes: classes.to_vec(),
            attrs: vec![],
            text: String::new(),
            checked: None,
            hook: None,
            parent: Some(parent),
            children: vec![],
        });
        self.nodes[parent].children.push(id);
        id
    }

    fn text_content(&self, id: usize) -> String {
        let node = &self.nodes[id];
        let mut text = node.text.clone();
        for &child in &node.children {
            text.push_str(&self.text_content(child));
        }
        text
    }

    fn descendants(&self, id: usize, out: &mut Vec<usize>) {
        for &child in &self.nodes[id].children {
            out.push(child);
            self.descendants(child, out);
        }
    }

    fn matches_css(&self, id: usize, css: &str) -> bool {
        let parts: Vec<Compound> = css.split_whitespace().map(Compound::parse).collect();
        let Some((last, ancestors)) = parts.split_last() else {
            return false;
        };
        if !last.matches(&self.nodes[id]) {
            return false;
        }
        let mut cursor = self.nodes[id].parent;
        for compound in ancestors.iter().rev() {
            loop {
                let Some(current) = cursor else {
                    return false;
                };
                cursor = self.nodes[current].parent;
                if compound.matches(&self.nodes[current]) {
                    break;
                }
            }
        }
        true
    }

    fn resolve(&self, locator: &Locator) -> Vec<usize> {
        let mut all = Vec::new();
        self.descendants(0, &mut all);

        let mut set: Vec<usize> = match &locator.root {
            Selector::Css(css) => all.into_iter().filter(|&id| self.matches_css(id, css)).collect(),
            Selector::TestId(value) => all
                .into_iter()
                .filter(|&id| {
                    self.nodes[id]
                        .attrs
                        .iter()
                        .any(|(k, v)| *k == "data-test" && v == value)
                })
                .collect(),
            Selector::Contains(text) => {
                let holds = |id: usize| self.text_content(id).contains(text.as_str());
                all.into_iter()
                    .filter(|&id| holds(id))
                    .filter(|&id| !self.nodes[id].children.iter().any(|&c| holds(c)))
                    .collect()
            }
        };

        for step in &locator.then {
            set = match step {
                Traverse::Parent => dedup(set.iter().filter_map(|&id| self.nodes[id].parent)),
                Traverse::Closest(css) => dedup(set.iter().filter_map(|&id| {
                    let mut cursor = self.nodes[id].parent;
                    while let Some(current) = cursor {
                        if self.matches_css(current, css) {
                            return Some(current);
                        }
                        cursor = self.nodes[current].parent;
                    }
                    None
                })),
                Traverse::Find(css) => dedup(set.iter().flat_map(|&id| {
                    let mut inner = Vec::new();
                    self.descendants(id, &mut inner);
                    inner.into_iter().filter(|&d| self.matches_css(d, css)).collect::<Vec<_>>()
                })),
                Traverse::First => set.into_iter().take(1).collect(),
                Traverse::Last => set.last().copied().into_iter().collect(),
                Traverse::Nth(i) => set.get(*i).copied().into_iter().collect(),
            };
        }
        set
    }

    fn snapshot(&self, id: usize) -> ElementSnapshot {
        let node = &self.nodes[id];
        ElementSnapshot {
            tag: node.tag.to_string(),
            text: self.text_content(id).trim().to_string(),
            classes: node.classes.iter().map(|c| c.to_string()).collect(),
            checked: node.checked,
            visible: true,
        }
    }
}

fn dedup(ids: impl Iterator<Item = usize>) -> Vec<usize> {
    let mut out: Vec<usize> = Vec::new();
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

/// `tag.class[attr=value]` without combinators
struct Compound {
    tag: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, String)>,
}

impl Compound {
    fn parse(s: &str) -> Self {
        let mut compound = Compound {
            tag: None,
            classes: vec![],
            attrs: vec![],
        };
        let mut rest = s;
        let tag_end = rest.find(|c: char| c == '.' || c == '[').unwrap_or(rest.len());
        if tag_end > 0 {
            compound.tag = Some(rest[..tag_end].to_string());
        }
        rest = &rest[tag_end..];
        while !rest.is_empty() {
            if let Some(stripped) = rest.strip_prefix('.') {
                let end = stripped.find(|c: char| c == '.' || c == '[').unwrap_or(stripped.len());
                compound.classes.push(stripped[..end].to_string());
                rest = &stripped[end..];
            } else if let Some(stripped) = rest.strip_prefix('[') {
                let end = stripped.find(']').expect("unterminated attribute selector");
                let (key, value) = stripped[..end].split_once('=').expect("attribute needs a value");
                compound
                    .attrs
                    .push((key.to_string(), value.trim_matches('"').to_string()));
                rest = &stripped[end + 1..];
            } else {
                panic!("unsupported selector: {}", s);
            }
        }
        compound
    }

    fn matches(&self, node: &Node) -> bool {
        self.tag.as_deref().map_or(true, |t| t == node.tag)
            && self.classes.iter().all(|c| node.classes.iter().any(|n| *n == c.as_str()))
            && self
                .attrs
                .iter()
                .all(|(k, v)| node.attrs.iter().any(|(nk, nv)| *nk == k.as_str() && nv == v))
    }
}

/// The to-do app as the browser would see it
#[derive(Debug, Clone)]
pub struct TodoApp {
    items: Vec<Item>,
    filter: Filter,
    defects: Vec<Defect>,
    render_delay: u32,
    stale: u32,
}

impl TodoApp {
    fn new(seed: &[String], defects: &[Defect], render_delay: u32) -> Self {
        let starts_completed = defects.contains(&Defect::StartsCompleted);
        Self {
            items: seed
                .iter()
                .enumerate()
                .map(|(index, text)| Item {
                    text: text.clone(),
                    completed: starts_completed && index == 0,
                })
                .collect(),
            filter: Filter::All,
            defects: defects.to_vec(),
            render_delay,
            stale: render_delay,
        }
    }

    fn has(&self, defect: Defect) -> bool {
        self.defects.contains(&defect)
    }

    fn changed(&mut self) {
        self.stale = self.render_delay;
    }

    fn render(&mut self) -> Dom {
        let mut dom = Dom::new();
        let app = dom.add(0, "section", &["todoapp"]);

        let header = dom.add(app, "header", &["header"]);
        let title = dom.add(header, "h1", &[]);
        dom.nodes[title].text = "todos".to_string();
        let input = dom.add(header, "input", &["new-todo"]);
        dom.nodes[input].attrs = vec![("data-test", "new-todo".to_string())];
        dom.nodes[input].hook = Some(Hook::NewTodo);

        let main = dom.add(app, "section", &["main"]);
        let list = dom.add(main, "ul", &["todo-list"]);

        // Still rendering: the list is empty for a few calls after every change
        if self.stale > 0 {
            self.stale -= 1;
        } else {
            for (index, item) in self.items.iter().enumerate() {
                let shown = match self.filter {
                    Filter::All => true,
                    Filter::Active => !item.completed || self.has(Defect::ActiveFilterShowsAll),
                    Filter::Completed => item.completed,
                };
                if !shown {
                    continue;
                }
                let classes: &[&'static str] = if item.completed { &["completed"] } else { &[] };
                let li = dom.add(list, "li", classes);
                let view = dom.add(li, "div", &["view"]);
                let toggle = dom.add(view, "input", &["toggle"]);
                dom.nodes[toggle].attrs = vec![("type", "checkbox".to_string())];
                dom.nodes[toggle].checked = Some(item.completed);
                dom.nodes[toggle].hook = Some(Hook::Toggle(index));
                let label = dom.add(view, "label", &[]);
                dom.nodes[label].text = item.text.clone();
            }
        }

        let footer = dom.add(app, "footer", &["footer"]);
        let left = self.items.iter().filter(|i| !i.completed).count();
        let count = dom.add(footer, "span", &["todo-count"]);
        dom.nodes[count].text = format!("{} item{} left", left, if left == 1 { "" } else { "s" });

        let filters = dom.add(footer, "ul", &["filters"]);
        for (label, filter) in [("All", Filter::All), ("Active", Filter::Active), ("Completed", Filter::Completed)] {
            let li = dom.add(filters, "li", &[]);
            let classes: &[&'static str] = if self.filter == filter { &["selected"] } else { &[] };
            let link = dom.add(li, "a", classes);
            dom.nodes[link].text = label.to_string();
            dom.nodes[link].hook = Some(Hook::Filter(filter));
        }

        let any_completed = self.items.iter().any(|i| i.completed);
        if any_completed || self.has(Defect::ClearButtonNeverHides) {
            let button = dom.add(footer, "button", &["clear-completed"]);
            dom.nodes[button].text = "Clear completed".to_string();
            dom.nodes[button].hook = Some(Hook::ClearCompleted);
        }

        dom
    }

    fn apply(&mut self, hook: Option<Hook>, tag: &str, interaction: &Interaction) -> E2eResult<()> {
        match (interaction, hook) {
            (Interaction::Click, Some(Hook::Filter(filter))) => self.filter = filter,
            (Interaction::Click, Some(Hook::ClearCompleted)) => {
                self.items.retain(|i| !i.completed);
            }
            (Interaction::Click | Interaction::Check, Some(Hook::Toggle(i))) if !self.items[i].completed => {
                self.items[i].completed = true;
            }
            (Interaction::Click | Interaction::Uncheck, Some(Hook::Toggle(i))) if self.items[i].completed => {
                self.items[i].completed = false;
            }
            (Interaction::Check | Interaction::Uncheck, Some(Hook::Toggle(_))) => {}
            (Interaction::Click, _) => {}
            (Interaction::Type { text, submit }, Some(Hook::NewTodo)) => {
                if *submit && !text.trim().is_empty() {
                    let completed = self.has(Defect::StartsCompleted);
                    self.items.push(Item {
                        text: text.trim().to_string(),
                        completed,
                    });
                }
            }
            (Interaction::Check | Interaction::Uncheck, _) => {
                return Err(E2eError::StepFailed {
                    step: "perform".to_string(),
                    reason: format!("<{}> is not a checkbox", tag),
                    elapsed_ms: 0,
                })
            }
            (Interaction::Type { .. }, _) => {
                return Err(E2eError::StepFailed {
                    step: "perform".to_string(),
                    reason: format!("<{}> is not editable", tag),
                    elapsed_ms: 0,
                })
            }
        }
        self.changed();
        Ok(())
    }
}

/// Browser session over a fresh [`TodoApp`] per `open`
pub struct FakeBrowser {
    seed: Vec<String>,
    defects: Vec<Defect>,
    render_delay: u32,
    flaky_calls: u32,
    rejections_left: u32,
    reachable: bool,
    page: Option<TodoApp>,
    pub opened: Vec<String>,
    pub screenshots: Vec<PathBuf>,
    pub closed: bool,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self {
            seed: SEED.iter().map(|s| s.to_string()).collect(),
            defects: vec![],
            render_delay: 0,
            flaky_calls: 0,
            rejections_left: 0,
            reachable: true,
            page: None,
            opened: vec![],
            screenshots: vec![],
            closed: false,
        }
    }

    pub fn with_seed(mut self, seed: &[&str]) -> Self {
        self.seed = seed.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_defect(mut self, defect: Defect) -> Self {
        self.defects.push(defect);
        self
    }

    /// Every change takes `calls` driver calls to show up
    pub fn with_render_delay(mut self, calls: u32) -> Self {
        self.render_delay = calls;
        self
    }

    /// The first `calls` queries or actions on every page are refused the
    /// way Playwright refuses a handle that detached during a re-render
    pub fn with_flaky_calls(mut self, calls: u32) -> Self {
        self.flaky_calls = calls;
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.reachable = false;
        self
    }

    fn reject_if_flaky(&mut self) -> E2eResult<()> {
        if self.rejections_left == 0 {
            return Ok(());
        }
        self.rejections_left -= 1;
        Err(E2eError::StepFailed {
            step: "perform".to_string(),
            reason: "Element is not attached to the DOM".to_string(),
            elapsed_ms: 0,
        })
    }

    fn page(&mut self) -> E2eResult<&mut TodoApp> {
        self.page
            .as_mut()
            .ok_or_else(|| E2eError::Bridge("no page open".to_string()))
    }
}

#[async_trait]
impl Driver for FakeBrowser {
    async fn open(&mut self, url: &str) -> E2eResult<()> {
        if !self.reachable {
            return Err(E2eError::TargetUnreachable(format!(
                "{}: net::ERR_CONNECTION_REFUSED",
                url
            )));
        }
        self.opened.push(url.to_string());
        self.page = Some(TodoApp::new(&self.seed, &self.defects, self.render_delay));
        self.rejections_left = self.flaky_calls;
        Ok(())
    }

    async fn query(&mut self, locator: &Locator) -> E2eResult<Vec<ElementSnapshot>> {
        self.reject_if_flaky()?;
        let dom = self.page()?.render();
        Ok(dom.resolve(locator).into_iter().map(|id| dom.snapshot(id)).collect())
    }

    async fn perform(&mut self, locator: &Locator, interaction: &Interaction) -> E2eResult<ActionOutcome> {
        self.reject_if_flaky()?;
        let page = self.page()?;
        let dom = page.render();
        let targets = dom.resolve(locator);
        if targets.len() != 1 {
            return Ok(ActionOutcome::Unresolved { matched: targets.len() });
        }
        let node = &dom.nodes[targets[0]];
        page.apply(node.hook, node.tag, interaction)?;
        Ok(ActionOutcome::Done)
    }

    async fn screenshot(&mut self, path: &Path) -> E2eResult<()> {
        self.screenshots.push(path.to_path_buf());
        Ok(())
    }

    async fn close(&mut self) -> E2eResult<()> {
        self.closed = true;
        Ok(())
    }
}

/// Short timeouts so failing scenarios finish quickly
pub fn fast_config() -> RunnerConfig {
    let mut config = RunnerConfig {
        base_url: "http://localhost:8080".to_string(),
        command_timeout_ms: 300,
        ..Default::default()
    };
    config.poll.interval_ms = 10;
    config
}
