//! In-memory [`BrowserDriver`] for tests
//!
//! Models a page as a flat list of elements with snapshots, visibility and
//! optional parents. Clicks, submits and key presses can trigger scripted
//! effects (URL changes, revealed elements, popups). Every interaction is
//! recorded so tests can assert what was, and was not, touched.
//!
//! Raw CSS (`Query::Generic`) matches an element when it equals the
//! element's tag or one of its declared aliases.

use async_trait::async_trait;
use flowcheck_core::{ElementSnapshot, FlowError, LoadSignal, Query, Result};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::driver::{BrowserDriver, ContextId, ElementHandle, SearchScope};

/// Page change triggered by an interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    SetUrl(String),
    SetContent(String),
    Reveal(String),
    Hide(String),
    /// Open this many extra browsing contexts
    OpenContexts(usize),
}

/// One element on the scripted page
#[derive(Debug, Clone)]
pub struct FakeElement {
    pub id: String,
    pub snapshot: ElementSnapshot,
    pub aliases: Vec<String>,
    pub parent: Option<String>,
    pub on_click: Vec<Effect>,
    pub on_submit: Vec<Effect>,
    pub on_press: Vec<Effect>,
}

impl FakeElement {
    pub fn new(id: impl Into<String>, snapshot: ElementSnapshot) -> Self {
        Self {
            id: id.into(),
            snapshot,
            aliases: Vec::new(),
            parent: None,
            on_click: Vec::new(),
            on_submit: Vec::new(),
            on_press: Vec::new(),
        }
    }

    /// Raw CSS this element answers to
    pub fn alias(mut self, css: impl Into<String>) -> Self {
        self.aliases.push(css.into());
        self
    }

    pub fn within(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn on_click(mut self, effect: Effect) -> Self {
        self.on_click.push(effect);
        self
    }

    pub fn on_submit(mut self, effect: Effect) -> Self {
        self.on_submit.push(effect);
        self
    }

    pub fn on_press(mut self, effect: Effect) -> Self {
        self.on_press.push(effect);
        self
    }

    fn answers(&self, query: &Query) -> bool {
        match query {
            Query::Generic(css) => self.snapshot.tag == *css || self.aliases.iter().any(|a| a == css),
            other => other.matches(&self.snapshot),
        }
    }

    fn handle(&self) -> ElementHandle {
        let description = if self.snapshot.text.is_empty() {
            format!("<{}#{}>", self.snapshot.tag, self.id)
        } else {
            format!("<{}#{}> '{}'", self.snapshot.tag, self.id, self.snapshot.text)
        };
        ElementHandle::new(self.id.clone(), description)
    }
}

/// Recorded driver call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Navigate(String),
    Fill { target: String, value: String },
    Click(String),
    Hover(String),
    PressKey { target: String, key: String },
    Submit(String),
    CloseContext(String),
    Screenshot(PathBuf),
    Delay(Duration),
    Query(String),
}

impl Call {
    /// Calls that change page state
    pub fn is_interaction(&self) -> bool {
        matches!(
            self,
            Call::Fill { .. } | Call::Click(_) | Call::Hover(_) | Call::PressKey { .. } | Call::Submit(_)
        )
    }
}

#[derive(Debug, Default)]
struct ScriptState {
    url: String,
    content: String,
    elements: Vec<FakeElement>,
    contexts: Vec<String>,
    next_context: usize,
    failing_loads: HashSet<LoadSignal>,
    failing_queries: HashSet<String>,
    navigate_error: Option<String>,
    screenshot_error: Option<String>,
    vanishing_contexts: HashSet<String>,
    failing_closes: HashMap<String, String>,
    video: Option<PathBuf>,
    calls: Vec<Call>,
}

/// Cloneable handle to a scripted page; clones share state
#[derive(Debug, Clone, Default)]
pub struct ScriptedDriver {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedDriver {
    pub fn new(url: impl Into<String>) -> Self {
        let driver = Self::default();
        {
            let mut state = driver.lock();
            state.url = url.into();
            state.contexts.push("page-0".to_string());
            state.next_context = 1;
        }
        driver
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        // a test that panicked mid-call must not hide the original failure
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add(&self, element: FakeElement) {
        self.lock().elements.push(element);
    }

    pub fn set_url(&self, url: impl Into<String>) {
        self.lock().url = url.into();
    }

    pub fn set_content(&self, content: impl Into<String>) {
        self.lock().content = content.into();
    }

    pub fn open_contexts(&self, count: usize) {
        let mut state = self.lock();
        open_contexts(&mut state, count);
    }

    pub fn fail_load(&self, signal: LoadSignal) {
        self.lock().failing_loads.insert(signal);
    }

    /// Raw CSS that errors when queried
    pub fn fail_query(&self, css: impl Into<String>) {
        self.lock().failing_queries.insert(css.into());
    }

    pub fn fail_navigation(&self, message: impl Into<String>) {
        self.lock().navigate_error = Some(message.into());
    }

    pub fn fail_screenshots(&self, message: impl Into<String>) {
        self.lock().screenshot_error = Some(message.into());
    }

    /// The context closes itself after it has been listed, before anyone closes it
    pub fn vanish_context(&self, id: impl Into<String>) {
        self.lock().vanishing_contexts.insert(id.into());
    }

    pub fn fail_context_close(&self, id: impl Into<String>, message: impl Into<String>) {
        self.lock().failing_closes.insert(id.into(), message.into());
    }

    pub fn record_video(&self, path: impl Into<PathBuf>) {
        self.lock().video = Some(path.into());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn interactions(&self) -> Vec<Call> {
        self.lock().calls.iter().filter(|c| c.is_interaction()).cloned().collect()
    }

    pub fn clicked(&self, id: &str) -> bool {
        self.lock().calls.iter().any(|c| matches!(c, Call::Click(t) if t == id))
    }

    pub fn filled(&self) -> Vec<(String, String)> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Fill { target, value } => Some((target.clone(), value.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn closed_contexts(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::CloseContext(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn context_count(&self) -> usize {
        self.lock().contexts.len()
    }

    /// Every query evaluated, in order
    pub fn queries(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Query(q) => Some(q.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn screenshots(&self) -> Vec<PathBuf> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Screenshot(p) => Some(p.clone()),
                _ => None,
            })
            .collect()
    }

    fn element(&self, target: &ElementHandle) -> Result<FakeElement> {
        self.lock()
            .elements
            .iter()
            .find(|e| e.id == target.id)
            .cloned()
            .ok_or_else(|| FlowError::Browser(format!("Stale element: {}", target)))
    }

    fn interact(&self, call: Call, effects: &[Effect]) {
        let mut state = self.lock();
        state.calls.push(call);
        for effect in effects {
            apply(&mut state, effect);
        }
    }
}

fn open_contexts(state: &mut ScriptState, count: usize) {
    for _ in 0..count {
        let id = format!("page-{}", state.next_context);
        state.next_context += 1;
        state.contexts.push(id);
    }
}

fn apply(state: &mut ScriptState, effect: &Effect) {
    match effect {
        Effect::SetUrl(url) => state.url = url.clone(),
        Effect::SetContent(content) => state.content = content.clone(),
        Effect::Reveal(id) | Effect::Hide(id) => {
            let visible = matches!(effect, Effect::Reveal(_));
            for element in state.elements.iter_mut().filter(|e| e.id == *id) {
                element.snapshot.visible = visible;
            }
        }
        Effect::OpenContexts(count) => open_contexts(state, *count),
    }
}

fn is_within(elements: &[FakeElement], element: &FakeElement, ancestor: &str) -> bool {
    let mut parent = element.parent.as_deref();
    while let Some(id) = parent {
        if id == ancestor {
            return true;
        }
        parent = elements.iter().find(|e| e.id == id).and_then(|e| e.parent.as_deref());
    }
    false
}

#[async_trait]
impl BrowserDriver for ScriptedDriver {
    async fn navigate(&self, url: &str) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(Call::Navigate(url.to_string()));
        if let Some(message) = &state.navigate_error {
            return Err(FlowError::Navigation(format!("{}: {}", url, message)));
        }
        state.url = url.to_string();
        Ok(())
    }

    async fn wait_for_load_signal(&self, signal: LoadSignal, timeout: Duration) -> Result<()> {
        if self.lock().failing_loads.contains(&signal) {
            return Err(FlowError::NavigationTimeout {
                signal: signal.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            });
        }
        Ok(())
    }

    async fn delay(&self, duration: Duration) {
        self.lock().calls.push(Call::Delay(duration));
    }

    async fn query_visible(&self, query: &Query, scope: &SearchScope) -> Result<Vec<ElementHandle>> {
        let mut state = self.lock();
        state.calls.push(Call::Query(query.to_string()));
        if let Query::Generic(css) = query {
            if state.failing_queries.contains(css) {
                return Err(FlowError::InvalidSelector(css.clone()));
            }
        }
        Ok(state
            .elements
            .iter()
            .filter(|e| e.snapshot.visible)
            .filter(|e| match scope {
                SearchScope::Page => true,
                SearchScope::Within(root) => is_within(&state.elements, e, &root.id),
            })
            .filter(|e| e.answers(query))
            .map(FakeElement::handle)
            .collect())
    }

    async fn fill_text(&self, target: &ElementHandle, value: &str) -> Result<()> {
        let element = self.element(target)?;
        let mut state = self.lock();
        state.calls.push(Call::Fill {
            target: element.id.clone(),
            value: value.to_string(),
        });
        if let Some(e) = state.elements.iter_mut().find(|e| e.id == element.id) {
            e.snapshot.attributes.insert("value".to_string(), value.to_string());
        }
        Ok(())
    }

    async fn click(&self, target: &ElementHandle) -> Result<()> {
        let element = self.element(target)?;
        self.interact(Call::Click(element.id.clone()), &element.on_click);
        Ok(())
    }

    async fn hover(&self, target: &ElementHandle) -> Result<()> {
        let element = self.element(target)?;
        self.interact(Call::Hover(element.id.clone()), &[]);
        Ok(())
    }

    async fn press_key(&self, target: &ElementHandle, key: &str) -> Result<()> {
        let element = self.element(target)?;
        self.interact(
            Call::PressKey {
                target: element.id.clone(),
                key: key.to_string(),
            },
            &element.on_press,
        );
        Ok(())
    }

    async fn submit_form(&self, target: &ElementHandle) -> Result<()> {
        let element = self.element(target)?;
        if element.snapshot.tag != "form" {
            return Err(FlowError::Browser(format!("{} is not a form", target)));
        }
        self.interact(Call::Submit(element.id.clone()), &element.on_submit);
        Ok(())
    }

    async fn get_attribute(&self, target: &ElementHandle, name: &str) -> Result<Option<String>> {
        Ok(self.element(target)?.snapshot.attr(name).map(str::to_string))
    }

    async fn get_text(&self, target: &ElementHandle) -> Result<String> {
        Ok(self.element(target)?.snapshot.text)
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.lock().url.clone())
    }

    async fn page_content(&self) -> Result<String> {
        let state = self.lock();
        let mut content = state.content.clone();
        for element in state.elements.iter().filter(|e| e.snapshot.visible) {
            content.push(' ');
            content.push_str(&element.snapshot.text);
        }
        Ok(content)
    }

    async fn list_open_contexts(&self) -> Result<Vec<ContextId>> {
        Ok(self.lock().contexts.iter().cloned().map(ContextId).collect())
    }

    async fn close_context(&self, context: &ContextId) -> Result<()> {
        let mut state = self.lock();
        if let Some(message) = state.failing_closes.get(&context.0) {
            return Err(FlowError::Browser(message.clone()));
        }
        if state.vanishing_contexts.remove(&context.0) {
            state.contexts.retain(|c| *c != context.0);
        }
        let before = state.contexts.len();
        state.contexts.retain(|c| *c != context.0);
        if state.contexts.len() == before {
            return Err(FlowError::ContextGone(context.to_string()));
        }
        state.calls.push(Call::CloseContext(context.0.clone()));
        Ok(())
    }

    async fn screenshot(&self, path: &Path, _full_page: bool) -> Result<()> {
        let error = {
            let mut state = self.lock();
            state.calls.push(Call::Screenshot(path.to_path_buf()));
            state.screenshot_error.clone()
        };
        if let Some(message) = error {
            return Err(FlowError::Browser(format!("Screenshot failed: {}", message)));
        }
        // PNG signature is enough for a file that exists
        tokio::fs::write(path, b"\x89PNG\r\n\x1a\n").await?;
        Ok(())
    }

    fn video_path(&self) -> Option<PathBuf> {
        self.lock().video.clone()
    }
}
