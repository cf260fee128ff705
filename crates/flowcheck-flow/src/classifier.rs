//! Final page state to verdict
//!
//! Indicators are checked lazily in a fixed order and the first hit decides:
//!
//! 1. success URL marker, success DOM marker, result scan, expected content
//! 2. visible error indicator, giving `Failure(text)`
//! 3. pre-authentication URL, giving `Failure("still on login page")`
//! 4. nothing, giving `Ambiguous` after an expired success wait or `Timeout` on direct inspection
//!
//! A later check is never evaluated once an earlier one matched, so a
//! success URL wins over an error banner on the same page.

use flowcheck_browser::{BrowserDriver, SelectorResolver};
use flowcheck_core::config::{LoginParams, NavigationParams, SearchParams};
use flowcheck_core::{Outcome, ScanSpec, SelectorCandidates};
use std::time::Duration;
use tracing::debug;

/// Why classification was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The bounded wait for a success indicator expired
    SuccessWaitExpired,
    /// The flow inspects the page once, without waiting
    DirectInspection,
}

/// Which indicator decided the verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Indicator {
    SuccessUrl { marker: String },
    SuccessMarker { candidate: String },
    ResultScan { element: String },
    ExpectedContent { keyword: String },
    ErrorIndicator { text: String },
    PreAuthUrl { marker: String },
    Nothing,
}

impl std::fmt::Display for Indicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Indicator::SuccessUrl { marker } => write!(f, "URL contains '{}'", marker),
            Indicator::SuccessMarker { candidate } => write!(f, "success marker {}", candidate),
            Indicator::ResultScan { element } => write!(f, "heuristic result match {}", element),
            Indicator::ExpectedContent { keyword } => write!(f, "page mentions '{}'", keyword),
            Indicator::ErrorIndicator { text } => write!(f, "error indicator '{}'", text),
            Indicator::PreAuthUrl { marker } => write!(f, "URL still contains '{}'", marker),
            Indicator::Nothing => write!(f, "no indicator"),
        }
    }
}

/// Outcome plus the evidence for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub outcome: Outcome,
    pub message: String,
    pub indicator: Indicator,
}

/// Indicators a flow type is judged by
#[derive(Debug, Clone)]
pub struct OutcomeRules {
    /// Prefix for failure messages ("Login failed: ...")
    pub label: String,
    pub success_url_markers: Vec<String>,
    pub success_markers: Option<SelectorCandidates>,
    pub success_scan: Option<ScanSpec>,
    pub expected_content: Vec<String>,
    pub error_indicators: Option<SelectorCandidates>,
    pub pre_auth_url_markers: Vec<String>,
    pub success_message: String,
    /// Message when no indicator matched
    pub fallthrough_message: String,
}

impl OutcomeRules {
    pub fn login(params: &LoginParams) -> Self {
        Self {
            label: "Login".to_string(),
            success_url_markers: params.success_url_markers.clone(),
            success_markers: Some(params.success_markers.clone()),
            success_scan: None,
            expected_content: Vec::new(),
            error_indicators: Some(params.error_indicators.clone()),
            pre_auth_url_markers: params.login_url_markers.clone(),
            success_message: "Login successful - account area reached".to_string(),
            fallthrough_message: "timeout — account area not reached".to_string(),
        }
    }

    pub fn navigation(params: &NavigationParams) -> Self {
        Self {
            label: "Navigation".to_string(),
            success_url_markers: params.expected_keywords.clone(),
            success_markers: None,
            success_scan: None,
            expected_content: params.expected_keywords.clone(),
            error_indicators: None,
            pre_auth_url_markers: Vec::new(),
            success_message: "Navigation reached the expected page".to_string(),
            fallthrough_message: format!(
                "Expected content not reached ({})",
                params.expected_keywords.join(", ")
            ),
        }
    }

    pub fn search(params: &SearchParams) -> Self {
        let mut url_markers = params.result_url_keywords.clone();
        let query = params.query.trim().to_lowercase();
        if !query.is_empty() {
            url_markers.push(query.replace(' ', "+"));
            url_markers.push(query.replace(' ', "%20"));
        }
        Self {
            label: "Search".to_string(),
            success_url_markers: url_markers,
            success_markers: Some(params.result_markers.clone()),
            success_scan: Some(params.result_scan.clone()),
            expected_content: Vec::new(),
            error_indicators: None,
            pre_auth_url_markers: Vec::new(),
            success_message: format!("Search results displayed for '{}'", params.query),
            fallthrough_message: "No search results detected".to_string(),
        }
    }
}

fn url_marker(url: &str, markers: &[String]) -> Option<String> {
    let url = url.to_lowercase();
    markers
        .iter()
        .find(|m| !m.is_empty() && url.contains(&m.to_lowercase()))
        .cloned()
}

pub struct OutcomeClassifier {
    rules: OutcomeRules,
}

impl OutcomeClassifier {
    pub fn new(rules: OutcomeRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &OutcomeRules {
        &self.rules
    }

    /// Success URL marker contained in `url`
    pub fn success_url(&self, url: &str) -> Option<Indicator> {
        url_marker(url, &self.rules.success_url_markers).map(|marker| Indicator::SuccessUrl { marker })
    }

    /// Success evidence in the page itself, ignoring the URL
    pub async fn success_in_page(&self, driver: &dyn BrowserDriver) -> Option<Indicator> {
        let resolver = SelectorResolver::new(driver);

        if let Some(markers) = &self.rules.success_markers {
            if let Ok(found) = resolver.resolve(markers, &Default::default()).await {
                return Some(Indicator::SuccessMarker {
                    candidate: found.candidate.to_string(),
                });
            }
        }

        if let Some(scan) = &self.rules.success_scan {
            if let Ok(found) = resolver.scan(scan).await {
                debug!("{}", found.describe("results"));
                return Some(Indicator::ResultScan {
                    element: found.target.to_string(),
                });
            }
        }

        if !self.rules.expected_content.is_empty() {
            if let Ok(content) = driver.page_content().await {
                let content = content.to_lowercase();
                if let Some(keyword) = self
                    .rules
                    .expected_content
                    .iter()
                    .find(|k| content.contains(&k.to_lowercase()))
                {
                    return Some(Indicator::ExpectedContent {
                        keyword: keyword.clone(),
                    });
                }
            }
        }

        None
    }

    /// Step 1 of the decision tree: URL first, then page markers
    pub async fn success_indicator(&self, driver: &dyn BrowserDriver) -> Option<Indicator> {
        if let Ok(url) = driver.current_url().await {
            if let Some(indicator) = self.success_url(&url) {
                return Some(indicator);
            }
        }
        self.success_in_page(driver).await
    }

    /// Poll for a success indicator for up to `timeout`
    ///
    /// Pass count is capped at `timeout / poll` so drivers with virtual delays terminate.
    pub async fn wait_for_success(
        &self,
        driver: &dyn BrowserDriver,
        timeout: Duration,
        poll: Duration,
    ) -> Option<Indicator> {
        let started = std::time::Instant::now();
        let max_passes = (timeout.as_millis() / poll.as_millis().max(1)).max(1);
        let mut passes = 0u128;
        loop {
            if let Some(indicator) = self.success_indicator(driver).await {
                return Some(indicator);
            }
            passes += 1;
            if passes >= max_passes || started.elapsed() >= timeout {
                return None;
            }
            driver.delay(poll).await;
        }
    }

    pub fn success_verdict(&self, indicator: Indicator) -> Verdict {
        Verdict {
            outcome: Outcome::Success,
            message: self.rules.success_message.clone(),
            indicator,
        }
    }

    /// Full decision tree
    pub async fn classify(&self, driver: &dyn BrowserDriver, trigger: Trigger) -> Verdict {
        if let Some(indicator) = self.success_indicator(driver).await {
            return self.success_verdict(indicator);
        }

        if let Some(errors) = &self.rules.error_indicators {
            let resolver = SelectorResolver::new(driver);
            if let Ok(found) = resolver.resolve(errors, &Default::default()).await {
                let text = driver
                    .get_text(&found.target)
                    .await
                    .ok()
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| "error indicator present".to_string());
                return Verdict {
                    outcome: Outcome::failure(text.clone()),
                    message: format!("{} failed: {}", self.rules.label, text),
                    indicator: Indicator::ErrorIndicator { text },
                };
            }
        }

        if let Ok(url) = driver.current_url().await {
            if let Some(marker) = url_marker(&url, &self.rules.pre_auth_url_markers) {
                return Verdict {
                    outcome: Outcome::failure("still on login page"),
                    message: format!("{} failed - still on login page", self.rules.label),
                    indicator: Indicator::PreAuthUrl { marker },
                };
            }
        }

        let outcome = match trigger {
            Trigger::SuccessWaitExpired => Outcome::Ambiguous,
            Trigger::DirectInspection => Outcome::Timeout,
        };
        Verdict {
            outcome,
            message: self.rules.fallthrough_message.clone(),
            indicator: Indicator::Nothing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowcheck_browser::scripted::{FakeElement, ScriptedDriver};
    use flowcheck_core::ElementSnapshot;

    fn login_classifier() -> OutcomeClassifier {
        OutcomeClassifier::new(OutcomeRules::login(&LoginParams::new("me@example.com")))
    }

    fn error_banner(visible: bool) -> FakeElement {
        let snapshot = ElementSnapshot::new("div")
            .with_attr("role", "alert")
            .with_text("Incorrect email or password");
        FakeElement::new("err", if visible { snapshot } else { snapshot.hidden() })
    }

    #[tokio::test]
    async fn test_success_beats_error_indicator() {
        let driver = ScriptedDriver::new("https://shop.test/account/dashboard");
        driver.add(error_banner(true));

        let verdict = login_classifier().classify(&driver, Trigger::SuccessWaitExpired).await;
        assert_eq!(verdict.outcome, Outcome::Success);
        assert_eq!(
            verdict.indicator,
            Indicator::SuccessUrl {
                marker: "dashboard".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_success_url_short_circuits() {
        let driver = ScriptedDriver::new("https://shop.test/dashboard");
        driver.add(error_banner(false));

        let verdict = login_classifier().classify(&driver, Trigger::SuccessWaitExpired).await;
        assert_eq!(verdict.outcome, Outcome::Success);
        // no DOM query was needed
        assert!(driver.queries().is_empty());
    }

    #[tokio::test]
    async fn test_error_indicator_text_is_reported() {
        let driver = ScriptedDriver::new("https://shop.test/checkout");
        driver.add(error_banner(true));

        let verdict = login_classifier().classify(&driver, Trigger::SuccessWaitExpired).await;
        assert_eq!(verdict.outcome, Outcome::failure("Incorrect email or password"));
        assert_eq!(verdict.message, "Login failed: Incorrect email or password");
    }

    #[tokio::test]
    async fn test_still_on_login_page() {
        let driver = ScriptedDriver::new("https://shop.test/login?next=/");
        driver.add(error_banner(false));

        let verdict = login_classifier().classify(&driver, Trigger::SuccessWaitExpired).await;
        assert_eq!(verdict.outcome, Outcome::failure("still on login page"));
        assert!(verdict.message.contains("still on login page"));
    }

    #[tokio::test]
    async fn test_fallthrough_depends_on_trigger() {
        let driver = ScriptedDriver::new("https://shop.test/welcome");
        let classifier = login_classifier();

        let expired = classifier.classify(&driver, Trigger::SuccessWaitExpired).await;
        assert_eq!(expired.outcome, Outcome::Ambiguous);
        assert_eq!(expired.message, "timeout — account area not reached");

        let inspected = classifier.classify(&driver, Trigger::DirectInspection).await;
        assert_eq!(inspected.outcome, Outcome::Timeout);
    }

    #[tokio::test]
    async fn test_navigation_content_keywords() {
        let params = NavigationParams {
            consent: Default::default(),
            menu_path: vec![SelectorCandidates::parse(&["a:has-text('Furniture')"]).unwrap()],
            expected_keywords: vec!["sofa".to_string(), "couch".to_string()],
        };
        let classifier = OutcomeClassifier::new(OutcomeRules::navigation(&params));

        let driver = ScriptedDriver::new("https://shop.test/c/living-room");
        driver.set_content("<h1>Comfortable Couches</h1>");
        let verdict = classifier.classify(&driver, Trigger::DirectInspection).await;
        assert_eq!(verdict.outcome, Outcome::Success);
        assert_eq!(
            verdict.indicator,
            Indicator::ExpectedContent {
                keyword: "couch".to_string()
            }
        );

        let elsewhere = ScriptedDriver::new("https://shop.test/c/kitchen");
        let verdict = classifier.classify(&elsewhere, Trigger::DirectInspection).await;
        assert_eq!(verdict.outcome, Outcome::Timeout);
    }

    #[tokio::test]
    async fn test_search_url_contains_query() {
        let classifier = OutcomeClassifier::new(OutcomeRules::search(&SearchParams::new("Poole Quay")));
        let driver = ScriptedDriver::new("https://travel.test/Tourism?q=poole+quay");
        let verdict = classifier.classify(&driver, Trigger::DirectInspection).await;
        assert!(verdict.outcome.is_success());
    }

    #[tokio::test]
    async fn test_wait_for_success_polls_until_budget() {
        let driver = ScriptedDriver::new("https://shop.test/welcome");
        let found = login_classifier()
            .wait_for_success(&driver, Duration::from_millis(1000), Duration::from_millis(250))
            .await;
        assert!(found.is_none());
        let delays = driver
            .calls()
            .into_iter()
            .filter(|c| matches!(c, flowcheck_browser::scripted::Call::Delay(_)))
            .count();
        assert_eq!(delays, 3);
    }
}
