//! Ordered-fallback element resolution
//!
//! Candidates are tried strictly in list order. The first candidate with at
//! least one visible match wins, even if a later one would also match. A
//! candidate that errors (bad CSS, stale scope) counts as no match. Only when
//! every candidate comes up empty does resolution fail, and nothing on the
//! page is touched along the way.
//!
//! [`SelectorResolver::scan`] is the last-resort heuristic: score every
//! element of a broad kind against keyword hints. Its results carry
//! [`Strategy::Heuristic`] so logs never mistake them for a declared match.

use flowcheck_core::{FlowError, Query, Result, ScanSpec, SelectorCandidates};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::driver::{BrowserDriver, ElementHandle, SearchScope};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// How a target was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// A declared candidate matched
    Declared,
    /// Best-scoring element of a heuristic scan
    Heuristic { score: usize },
}

/// A resolved target plus what resolved it
#[derive(Debug, Clone)]
pub struct Resolution {
    pub target: ElementHandle,
    /// 0-based index of the winning candidate (scan position for heuristics)
    pub candidate_index: usize,
    pub candidate: Query,
    /// Visible matches the winning candidate had
    pub match_count: usize,
    pub strategy: Strategy,
}

impl Resolution {
    pub fn is_heuristic(&self) -> bool {
        matches!(self.strategy, Strategy::Heuristic { .. })
    }

    /// One log line describing the match
    pub fn describe(&self, label: &str) -> String {
        match self.strategy {
            Strategy::Declared => format!(
                "Resolved {} via candidate {} ({}), {} visible match(es)",
                label, self.candidate_index, self.candidate, self.match_count
            ),
            Strategy::Heuristic { score } => format!(
                "Heuristic scan picked {} for {} (element {} of {}, score {})",
                self.target, label, self.candidate_index, self.candidate, score
            ),
        }
    }
}

pub struct SelectorResolver<'a> {
    driver: &'a dyn BrowserDriver,
    poll_interval: Duration,
}

impl<'a> SelectorResolver<'a> {
    pub fn new(driver: &'a dyn BrowserDriver) -> Self {
        Self {
            driver,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Single pass over the candidates
    pub async fn resolve(
        &self,
        candidates: &SelectorCandidates,
        scope: &SearchScope,
    ) -> Result<Resolution> {
        for (index, query) in candidates.iter().enumerate() {
            let matches = match self.driver.query_visible(query, scope).await {
                Ok(m) => m,
                Err(e) => {
                    debug!("Candidate {} ({}) errored, skipping: {}", index, query, e);
                    continue;
                }
            };
            if let Some(target) = matches.first() {
                debug!("Candidate {} ({}) matched {} element(s)", index, query, matches.len());
                return Ok(Resolution {
                    target: target.clone(),
                    candidate_index: index,
                    candidate: query.clone(),
                    match_count: matches.len(),
                    strategy: Strategy::Declared,
                });
            }
        }

        Err(FlowError::ElementNotFound {
            candidates: candidates.len(),
        })
    }

    /// Repeat [`Self::resolve`] until a candidate matches or `timeout` elapses
    ///
    /// Always makes at least one pass. The number of passes is also capped at
    /// `timeout / poll_interval` so drivers with virtual delays terminate.
    pub async fn resolve_within(
        &self,
        candidates: &SelectorCandidates,
        scope: &SearchScope,
        timeout: Duration,
    ) -> Result<Resolution> {
        let started = Instant::now();
        let max_passes = (timeout.as_millis() / self.poll_interval.as_millis().max(1)).max(1);
        let mut passes = 0u128;

        loop {
            match self.resolve(candidates, scope).await {
                Ok(resolution) => return Ok(resolution),
                Err(e) => {
                    passes += 1;
                    if passes >= max_passes || started.elapsed() >= timeout {
                        return Err(e);
                    }
                }
            }
            self.driver.delay(self.poll_interval).await;
        }
    }

    /// Heuristic scan: highest keyword score wins, ties go to document order
    pub async fn scan(&self, spec: &ScanSpec) -> Result<Resolution> {
        let kind = Query::Generic(spec.tag.clone());
        let elements = self
            .driver
            .query_visible(&kind, &SearchScope::Page)
            .await
            .unwrap_or_default();
        let inspected = elements.len().min(spec.limit);

        let mut best: Option<(usize, usize, &ElementHandle)> = None;
        for (index, element) in elements.iter().take(spec.limit).enumerate() {
            let values = self.inspect(element, &spec.attributes).await;
            let score = spec.score(values.iter().map(String::as_str));
            if score > 0 && best.map_or(true, |(_, s, _)| score > s) {
                best = Some((index, score, element));
            }
        }

        match best {
            Some((index, score, element)) => {
                debug!(
                    "Heuristic scan over {} {} element(s) picked {} (score {})",
                    inspected, spec.tag, element, score
                );
                Ok(Resolution {
                    target: element.clone(),
                    candidate_index: index,
                    candidate: kind,
                    match_count: inspected,
                    strategy: Strategy::Heuristic { score },
                })
            }
            None => Err(FlowError::ElementNotFound { candidates: 1 }),
        }
    }

    /// Declared candidates first, heuristic scan only once they are exhausted
    pub async fn resolve_or_scan(
        &self,
        candidates: &SelectorCandidates,
        spec: Option<&ScanSpec>,
    ) -> Result<Resolution> {
        match self.resolve(candidates, &SearchScope::Page).await {
            Ok(resolution) => Ok(resolution),
            Err(e) => match spec {
                Some(spec) => self.scan(spec).await,
                None => Err(e),
            },
        }
    }

    async fn inspect(&self, element: &ElementHandle, attributes: &[String]) -> Vec<String> {
        let mut values = Vec::with_capacity(attributes.len());
        for name in attributes {
            let value = if name == "text" {
                self.driver.get_text(element).await.ok()
            } else {
                self.driver.get_attribute(element, name).await.ok().flatten()
            };
            if let Some(v) = value {
                values.push(v);
            }
        }
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::{FakeElement, ScriptedDriver};
    use flowcheck_core::ElementSnapshot;

    fn email_input() -> FakeElement {
        FakeElement::new("email", ElementSnapshot::new("input").with_attr("type", "email"))
    }

    #[tokio::test]
    async fn test_scenario_email_fallback_candidate() {
        let driver = ScriptedDriver::new("https://shop.test/myaccount");
        driver.add(email_input());

        let candidates = SelectorCandidates::parse(&["#login-email", "input[type=email]"]).unwrap();
        let resolution = SelectorResolver::new(&driver)
            .resolve(&candidates, &SearchScope::Page)
            .await
            .unwrap();

        assert_eq!(resolution.target.id, "email");
        assert_eq!(resolution.candidate_index, 1);
        assert_eq!(resolution.match_count, 1);
        assert!(resolution.describe("identifier field").contains("candidate 1"));
    }

    #[tokio::test]
    async fn test_first_matching_candidate_wins() {
        let driver = ScriptedDriver::new("https://shop.test/");
        driver.add(FakeElement::new(
            "by-id",
            ElementSnapshot::new("input").with_attr("id", "login-email").with_attr("type", "email"),
        ));
        driver.add(email_input());

        let candidates = SelectorCandidates::parse(&["input[type=email]", "#login-email"]).unwrap();
        let resolution = SelectorResolver::new(&driver)
            .resolve(&candidates, &SearchScope::Page)
            .await
            .unwrap();

        // later candidate also matches but list order decides
        assert_eq!(resolution.candidate_index, 0);
        assert_eq!(resolution.match_count, 2);
        assert_eq!(resolution.target.id, "by-id");
    }

    #[tokio::test]
    async fn test_hidden_elements_do_not_count() {
        let driver = ScriptedDriver::new("https://shop.test/");
        driver.add(FakeElement::new(
            "hidden",
            ElementSnapshot::new("input").with_attr("id", "login-email").hidden(),
        ));
        driver.add(email_input());

        let candidates = SelectorCandidates::parse(&["#login-email", "input[type=email]"]).unwrap();
        let resolution = SelectorResolver::new(&driver)
            .resolve(&candidates, &SearchScope::Page)
            .await
            .unwrap();
        assert_eq!(resolution.candidate_index, 1);
    }

    #[tokio::test]
    async fn test_erroring_candidate_is_skipped() {
        let driver = ScriptedDriver::new("https://shop.test/");
        driver.fail_query("div >>> broken");
        driver.add(email_input());

        let candidates = SelectorCandidates::parse(&["div >>> broken", "input[type=email]"]).unwrap();
        let resolution = SelectorResolver::new(&driver)
            .resolve(&candidates, &SearchScope::Page)
            .await
            .unwrap();
        assert_eq!(resolution.candidate_index, 1);
    }

    #[tokio::test]
    async fn test_exhaustion_has_no_side_effects() {
        let driver = ScriptedDriver::new("https://shop.test/");
        driver.add(FakeElement::new("btn", ElementSnapshot::new("button").with_text("Continue")));

        let candidates = SelectorCandidates::parse(&["#login-email", "input[type=email]"]).unwrap();
        let err = SelectorResolver::new(&driver)
            .resolve_within(&candidates, &SearchScope::Page, Duration::from_secs(1))
            .await
            .unwrap_err();

        assert!(matches!(err, FlowError::ElementNotFound { candidates: 2 }));
        assert!(driver.interactions().is_empty());
    }

    #[tokio::test]
    async fn test_scope_limits_matches() {
        let driver = ScriptedDriver::new("https://shop.test/");
        driver.add(FakeElement::new("form-a", ElementSnapshot::new("form")));
        driver.add(email_input());
        driver.add(
            FakeElement::new("inner", ElementSnapshot::new("input").with_attr("type", "email"))
                .within("form-a"),
        );

        let candidates = SelectorCandidates::parse(&["input[type=email]"]).unwrap();
        let scope = SearchScope::Within(ElementHandle::new("form-a", "form"));
        let resolution = SelectorResolver::new(&driver).resolve(&candidates, &scope).await.unwrap();
        assert_eq!(resolution.target.id, "inner");
        assert_eq!(resolution.match_count, 1);
    }

    #[tokio::test]
    async fn test_scan_only_after_declared_candidates_fail() {
        let driver = ScriptedDriver::new("https://travel.test/");
        driver.add(FakeElement::new(
            "plain",
            ElementSnapshot::new("input").with_attr("name", "email"),
        ));
        driver.add(FakeElement::new(
            "where",
            ElementSnapshot::new("input").with_attr("placeholder", "Where to?"),
        ));

        let spec = ScanSpec {
            tag: "input".to_string(),
            attributes: vec!["placeholder".to_string(), "name".to_string()],
            keywords: vec!["search".to_string(), "where".to_string()],
            limit: 50,
        };
        let declared = SelectorCandidates::parse(&["input[type='search']"]).unwrap();
        let resolver = SelectorResolver::new(&driver);
        let resolution = resolver.resolve_or_scan(&declared, Some(&spec)).await.unwrap();

        assert_eq!(resolution.target.id, "where");
        assert!(resolution.is_heuristic());
        assert!(resolution.describe("search input").starts_with("Heuristic scan"));

        // a declared match never reaches the scan
        driver.add(FakeElement::new(
            "search",
            ElementSnapshot::new("input").with_attr("type", "search"),
        ));
        let resolution = resolver.resolve_or_scan(&declared, Some(&spec)).await.unwrap();
        assert_eq!(resolution.strategy, Strategy::Declared);
    }

    #[tokio::test]
    async fn test_scan_without_hits_is_not_found() {
        let driver = ScriptedDriver::new("https://travel.test/");
        driver.add(FakeElement::new("plain", ElementSnapshot::new("div").with_attr("class", "hero")));
        let spec = ScanSpec {
            tag: "div".to_string(),
            attributes: vec!["class".to_string()],
            keywords: vec!["result".to_string()],
            limit: 50,
        };
        assert!(SelectorResolver::new(&driver).scan(&spec).await.is_err());
    }
}
