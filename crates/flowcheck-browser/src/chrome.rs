//! [`BrowserDriver`] over Chrome DevTools Protocol
//!
//! `headless_chrome` is blocking, so every call runs on the blocking pool.
//! Element queries snapshot candidate nodes with one script, tag them with a
//! `data-flowcheck-ref` attribute, and evaluate the typed [`Query`] in Rust.
//! Actions then re-find the node by that attribute.

use async_trait::async_trait;
use flowcheck_core::config::BrowserSettings;
use flowcheck_core::{ElementSnapshot, FlowError, LoadSignal, Query, Result};
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use serde::Deserialize;
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::driver::{BrowserDriver, ContextId, ElementHandle, SearchScope};
use crate::session::{Session, SessionFactory};

const REF_ATTR: &str = "data-flowcheck-ref";
const LOAD_POLL: Duration = Duration::from_millis(250);
/// Resource count must hold still this long to count as network idle
const NETWORK_QUIET: Duration = Duration::from_millis(500);

fn browser_error(context: &str, e: impl std::fmt::Display) -> FlowError {
    FlowError::Browser(format!("{}: {}", context, e))
}

/// Chrome/Chromium driven through CDP
pub struct ChromeDriver {
    /// Kept alive for the lifetime of the tabs
    browser: Browser,
    primary: Arc<Tab>,
}

impl ChromeDriver {
    /// Launch a new browser instance
    pub async fn launch(settings: BrowserSettings, navigation_timeout: Duration) -> Result<Self> {
        tokio::task::spawn_blocking(move || Self::launch_blocking(&settings, navigation_timeout))
            .await
            .map_err(|e| browser_error("Browser launch task failed", e))?
    }

    fn launch_blocking(settings: &BrowserSettings, navigation_timeout: Duration) -> Result<Self> {
        info!(
            "Launching browser (headless: {}, size: {}x{})",
            settings.headless, settings.window_width, settings.window_height
        );

        let mut launch_options = LaunchOptions::default_builder()
            .headless(settings.headless)
            .window_size(Some((settings.window_width, settings.window_height)))
            .idle_browser_timeout(Duration::from_secs(settings.launch_timeout_secs))
            .build()
            .map_err(|e| browser_error("Failed to launch browser", e))?;

        let user_agent_arg: Option<String> =
            settings.user_agent.as_ref().map(|ua| format!("--user-agent={}", ua));
        if let Some(ref ua_arg) = user_agent_arg {
            launch_options.args.push(OsStr::new(ua_arg));
        }

        let browser =
            Browser::new(launch_options).map_err(|e| browser_error("Failed to launch browser", e))?;
        let primary = browser
            .wait_for_initial_tab()
            .map_err(|e| browser_error("Failed to open initial tab", e))?;
        primary.set_default_timeout(navigation_timeout);

        info!("Browser launched successfully");
        Ok(Self { browser, primary })
    }

    async fn with_tab<T, F>(&self, what: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&Tab) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let tab = Arc::clone(&self.primary);
        tokio::task::spawn_blocking(move || f(&tab))
            .await
            .map_err(|e| browser_error(what, e))?
    }

    async fn with_element<T, F>(&self, target: &ElementHandle, what: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&Element<'_>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let css = format!("[{}='{}']", REF_ATTR, target.id);
        let description = target.description.clone();
        self.with_tab(what, move |tab| {
            let element = tab
                .find_element(&css)
                .map_err(|e| browser_error(&format!("Element {} is gone", description), e))?;
            f(&element)
        })
        .await
    }

    async fn evaluate(&self, script: String) -> Result<serde_json::Value> {
        self.with_tab("evaluate", move |tab| {
            let result = tab
                .evaluate(&script, false)
                .map_err(|e| browser_error("JavaScript evaluation failed", e))?;
            Ok(result.value.unwrap_or(serde_json::Value::Null))
        })
        .await
    }

    async fn load_state(&self) -> Option<LoadState> {
        let value = self.evaluate(LOAD_STATE_SCRIPT.to_string()).await.ok()?;
        serde_json::from_str(value.as_str()?).ok()
    }
}

const LOAD_STATE_SCRIPT: &str =
    "JSON.stringify({ ready: document.readyState, resources: performance.getEntriesByType('resource').length })";

#[derive(Debug, Deserialize)]
struct LoadState {
    ready: String,
    resources: u64,
}

fn snapshot_script(css: &str, scope: Option<&str>) -> Result<String> {
    let css = serde_json::to_string(css)?;
    let scope = serde_json::to_string(&scope)?;
    Ok(format!(
        r#"(() => {{
  const scope = {scope};
  const root = scope === null ? document : document.querySelector('[{attr}="' + scope + '"]');
  if (!root) return '[]';
  window.__flowcheckNextRef = window.__flowcheckNextRef || 1;
  const out = [];
  for (const el of root.querySelectorAll({css})) {{
    if (!el.hasAttribute('{attr}')) el.setAttribute('{attr}', String(window.__flowcheckNextRef++));
    const rect = el.getBoundingClientRect();
    const style = window.getComputedStyle(el);
    const visible = rect.width > 0 && rect.height > 0 && style.visibility !== 'hidden' && style.display !== 'none';
    const attributes = {{}};
    for (const a of el.attributes) attributes[a.name] = a.value;
    const text = (el.innerText || el.value || '').trim().slice(0, 500);
    out.push({{ tag: el.tagName.toLowerCase(), attributes, text, visible }});
  }}
  return JSON.stringify(out);
}})()"#,
        scope = scope,
        css = css,
        attr = REF_ATTR
    ))
}

fn describe(snapshot: &ElementSnapshot) -> String {
    let mut description = format!("<{}", snapshot.tag);
    for name in ["id", "name", "type"] {
        if let Some(value) = snapshot.attr(name) {
            description.push_str(&format!(" {}='{}'", name, value));
        }
    }
    description.push('>');
    if !snapshot.text.is_empty() {
        let text: String = snapshot.text.chars().take(40).collect();
        description.push_str(&format!(" '{}'", text));
    }
    description
}

#[async_trait]
impl BrowserDriver for ChromeDriver {
    async fn navigate(&self, url: &str) -> Result<()> {
        debug!("Navigating to {}", url);
        let target = url.to_string();
        self.with_tab("navigate", move |tab| {
            tab.navigate_to(&target)
                .map_err(|e| FlowError::Navigation(format!("Failed to navigate to {}: {}", target, e)))?;
            tab.wait_until_navigated()
                .map_err(|e| FlowError::Navigation(format!("Navigation timeout for {}: {}", target, e)))?;
            Ok(())
        })
        .await?;
        info!("Successfully navigated to {}", url);
        Ok(())
    }

    async fn wait_for_load_signal(&self, signal: LoadSignal, timeout: Duration) -> Result<()> {
        let started = Instant::now();
        let mut last_resources = None;
        let mut quiet_since = Instant::now();

        loop {
            // evaluation fails while the document is being replaced; keep polling
            if let Some(state) = self.load_state().await {
                if last_resources != Some(state.resources) {
                    last_resources = Some(state.resources);
                    quiet_since = Instant::now();
                }
                let reached = match signal {
                    LoadSignal::DomContentLoaded => state.ready != "loading",
                    LoadSignal::Load => state.ready == "complete",
                    LoadSignal::NetworkIdle => {
                        state.ready == "complete" && quiet_since.elapsed() >= NETWORK_QUIET
                    }
                };
                if reached {
                    debug!("Load signal {} reached after {:?}", signal, started.elapsed());
                    return Ok(());
                }
            }

            if started.elapsed() >= timeout {
                return Err(FlowError::NavigationTimeout {
                    signal: signal.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(LOAD_POLL).await;
        }
    }

    async fn query_visible(&self, query: &Query, scope: &SearchScope) -> Result<Vec<ElementHandle>> {
        let scope_ref = match scope {
            SearchScope::Page => None,
            SearchScope::Within(root) => Some(root.id.as_str()),
        };
        let script = snapshot_script(&query.css_prefilter(), scope_ref)?;
        let raw = self.evaluate(script).await?;
        let json = raw
            .as_str()
            .ok_or_else(|| FlowError::Browser(format!("Query {} returned no snapshot", query)))?;
        let snapshots: Vec<ElementSnapshot> = serde_json::from_str(json)?;

        Ok(snapshots
            .iter()
            .filter(|s| s.visible && query.matches(s))
            .filter_map(|s| {
                s.attr(REF_ATTR)
                    .map(|id| ElementHandle::new(id.to_string(), describe(s)))
            })
            .collect())
    }

    async fn fill_text(&self, target: &ElementHandle, value: &str) -> Result<()> {
        let value = value.to_string();
        self.with_element(target, "fill", move |el| {
            el.click().map_err(|e| browser_error("Failed to focus field", e))?;
            el.call_js_fn("function() { this.value = ''; }", vec![], false)
                .map_err(|e| browser_error("Failed to clear field", e))?;
            el.type_into(&value)
                .map_err(|e| browser_error("Failed to type into field", e))?;
            Ok(())
        })
        .await
    }

    async fn click(&self, target: &ElementHandle) -> Result<()> {
        self.with_element(target, "click", |el| {
            el.click().map_err(|e| browser_error("Click failed", e))?;
            Ok(())
        })
        .await
    }

    async fn hover(&self, target: &ElementHandle) -> Result<()> {
        self.with_element(target, "hover", |el| {
            el.move_mouse_over().map_err(|e| browser_error("Hover failed", e))?;
            Ok(())
        })
        .await
    }

    async fn press_key(&self, target: &ElementHandle, key: &str) -> Result<()> {
        let key = key.to_string();
        let css = format!("[{}='{}']", REF_ATTR, target.id);
        self.with_tab("press_key", move |tab| {
            let el = tab
                .find_element(&css)
                .map_err(|e| browser_error("Element is gone", e))?;
            el.focus().map_err(|e| browser_error("Focus failed", e))?;
            tab.press_key(&key)
                .map_err(|e| browser_error(&format!("Key press '{}' failed", key), e))?;
            Ok(())
        })
        .await
    }

    async fn submit_form(&self, target: &ElementHandle) -> Result<()> {
        self.with_element(target, "submit_form", |el| {
            el.call_js_fn(
                "function() { HTMLFormElement.prototype.submit.call(this); }",
                vec![],
                false,
            )
            .map_err(|e| FlowError::SubmissionFailure(format!("form.submit() failed: {}", e)))?;
            Ok(())
        })
        .await
    }

    async fn get_attribute(&self, target: &ElementHandle, name: &str) -> Result<Option<String>> {
        let name = name.to_string();
        self.with_element(target, "get_attribute", move |el| {
            el.get_attribute_value(&name)
                .map_err(|e| browser_error("Attribute read failed", e))
        })
        .await
    }

    async fn get_text(&self, target: &ElementHandle) -> Result<String> {
        self.with_element(target, "get_text", |el| {
            el.get_inner_text()
                .map(|t| t.trim().to_string())
                .map_err(|e| browser_error("Text read failed", e))
        })
        .await
    }

    async fn current_url(&self) -> Result<String> {
        self.with_tab("current_url", |tab| Ok(tab.get_url())).await
    }

    async fn page_content(&self) -> Result<String> {
        self.with_tab("page_content", |tab| {
            tab.get_content().map_err(|e| browser_error("Failed to read page content", e))
        })
        .await
    }

    async fn list_open_contexts(&self) -> Result<Vec<ContextId>> {
        let primary_id = self.primary.get_target_id().clone();
        let tabs = self
            .browser
            .get_tabs()
            .lock()
            .map_err(|e| browser_error("Tab list unavailable", e))?
            .clone();

        let mut contexts = vec![ContextId(primary_id.clone())];
        contexts.extend(
            tabs.iter()
                .map(|t| t.get_target_id().clone())
                .filter(|id| *id != primary_id)
                .map(ContextId),
        );
        Ok(contexts)
    }

    async fn close_context(&self, context: &ContextId) -> Result<()> {
        if *self.primary.get_target_id() == context.0 {
            return Err(FlowError::Browser("Refusing to close the primary context".to_string()));
        }
        let tab = self
            .browser
            .get_tabs()
            .lock()
            .map_err(|e| browser_error("Tab list unavailable", e))?
            .iter()
            .find(|t| *t.get_target_id() == context.0)
            .cloned()
            .ok_or_else(|| FlowError::ContextGone(context.to_string()))?;

        tokio::task::spawn_blocking(move || {
            tab.close(true)
                .map(|_| ())
                .map_err(|e| browser_error("Failed to close context", e))
        })
        .await
        .map_err(|e| browser_error("close_context", e))?
    }

    async fn screenshot(&self, path: &Path, full_page: bool) -> Result<()> {
        let data = self
            .with_tab("screenshot", move |tab| {
                tab.capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, full_page)
                    .map_err(|e| browser_error("CDP capture failed", e))
            })
            .await?;
        tokio::fs::write(path, &data).await?;
        debug!("Screenshot written: {} ({} bytes)", path.display(), data.len());
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        info!("Closing browser");
        // Browser process is torn down when the last handle drops
        Ok(())
    }
}

/// Opens one Chrome session per call
#[derive(Debug, Clone)]
pub struct ChromeSessionFactory {
    pub settings: BrowserSettings,
    pub navigation_timeout: Duration,
}

#[async_trait]
impl SessionFactory for ChromeSessionFactory {
    async fn open(&self) -> Result<Session> {
        let driver = ChromeDriver::launch(self.settings.clone(), self.navigation_timeout).await?;
        Ok(Session::new(driver))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_script_escapes_selector() {
        let script = snapshot_script("input[placeholder*='Where to?']", None).unwrap();
        assert!(script.contains(r#""input[placeholder*='Where to?']""#));
        assert!(script.contains("const scope = null;"));

        let scoped = snapshot_script("input", Some("7")).unwrap();
        assert!(scoped.contains(r#"const scope = "7";"#));
    }

    #[test]
    fn test_describe_element() {
        let snapshot = ElementSnapshot::new("input")
            .with_attr("type", "email")
            .with_attr("name", "email");
        assert_eq!(describe(&snapshot), "<input name='email' type='email'>");

        let button = ElementSnapshot::new("button").with_text("Accept All");
        assert_eq!(describe(&button), "<button> 'Accept All'");
    }

    #[test]
    fn test_prefilter_feeds_snapshot_script() {
        let query = Query::parse("a:has-text('Sign In'):not(:has-text('Facebook'))").unwrap();
        let script = snapshot_script(&query.css_prefilter(), None).unwrap();
        assert!(script.contains(r#"querySelectorAll("a")"#));
    }
}
