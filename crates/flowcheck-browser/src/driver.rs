//! The narrow browser interface flows are written against

use async_trait::async_trait;
use flowcheck_core::{LoadSignal, Query, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Opaque reference to one element on the page
///
/// Only meaningful to the driver that produced it; `description` is for logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle {
    pub id: String,
    pub description: String,
}

impl ElementHandle {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
        }
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description)
    }
}

/// A browsing context (tab or popup window)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextId(pub String);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a query is evaluated
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SearchScope {
    #[default]
    Page,
    Within(ElementHandle),
}

/// Browser operations consumed by the resolver, the recorder and the flows
///
/// Every method that waits on the page is bounded by the caller's timeout or
/// by the driver's own navigation timeout. Implementations must be usable
/// from a single task at a time; [`crate::Session`] enforces that.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Wait for `signal`; `Err(FlowError::NavigationTimeout)` when it does not arrive in time
    async fn wait_for_load_signal(&self, signal: LoadSignal, timeout: Duration) -> Result<()>;

    async fn delay(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    /// Visible elements matching `query`, in document order
    async fn query_visible(&self, query: &Query, scope: &SearchScope) -> Result<Vec<ElementHandle>>;

    async fn fill_text(&self, target: &ElementHandle, value: &str) -> Result<()>;

    async fn click(&self, target: &ElementHandle) -> Result<()>;

    async fn hover(&self, target: &ElementHandle) -> Result<()>;

    async fn press_key(&self, target: &ElementHandle, key: &str) -> Result<()>;

    /// Submit a form element directly, bypassing its submit button
    async fn submit_form(&self, target: &ElementHandle) -> Result<()>;

    async fn get_attribute(&self, target: &ElementHandle, name: &str) -> Result<Option<String>>;

    async fn get_text(&self, target: &ElementHandle) -> Result<String>;

    async fn current_url(&self) -> Result<String>;

    async fn page_content(&self) -> Result<String>;

    /// Open contexts, primary first
    async fn list_open_contexts(&self) -> Result<Vec<ContextId>>;

    async fn close_context(&self, context: &ContextId) -> Result<()>;

    async fn screenshot(&self, path: &Path, full_page: bool) -> Result<()>;

    /// Recording of the session, when the driver records one
    fn video_path(&self) -> Option<PathBuf> {
        None
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}
