//! Flow execution against a live session
//!
//! [`FlowEngine::run_flow`] builds the fixed step list for the flow kind,
//! executes each step, feeds the result into [`transition`], and performs the
//! actions that come back. Step-local problems (nothing to click, no form)
//! are absorbed inside the step. A bounded wait the step depends on becomes
//! `StepFailed`. Any other error is a fault, caught once here and turned into
//! a Failure record with an `Exception` screenshot.

use flowcheck_browser::{
    BrowserDriver, DiagnosticsRecorder, Resolution, SearchScope, SelectorResolver, Session,
};
use flowcheck_core::config::{
    ConsentSettings, FlowParams, FlowSpec, LoginParams, NavigationParams, SearchParams, Timeouts,
};
use flowcheck_core::{
    Fallback, FlowError, FlowStep, LoadSignal, Outcome, Result, RunRecord, RunRecorder,
    SelectorCandidates, StepAction,
};
use std::time::Duration;
use tracing::debug;

use crate::classifier::{Indicator, OutcomeClassifier, OutcomeRules, Trigger, Verdict};
use crate::state_machine::{transition, FlowAction, FlowEvent, FlowState};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// What one step did
#[derive(Debug)]
enum StepReport {
    Completed,
    FellBack(String),
    Skipped(String),
    Failed(String),
    Decided(Verdict),
}

impl StepReport {
    fn into_event(self, action: StepAction) -> FlowEvent {
        match self {
            StepReport::Completed => FlowEvent::StepCompleted { action },
            StepReport::FellBack(detail) => FlowEvent::StepFellBack { action, detail },
            StepReport::Skipped(reason) => FlowEvent::StepSkipped { action, reason },
            StepReport::Failed(reason) => FlowEvent::StepFailed { action, reason },
            StepReport::Decided(verdict) => FlowEvent::OutcomeReached {
                outcome: verdict.outcome,
                message: verdict.message,
            },
        }
    }
}

/// Executes flows; one engine serves any number of sequential runs
#[derive(Debug, Clone)]
pub struct FlowEngine {
    timeouts: Timeouts,
    diagnostics: DiagnosticsRecorder,
    poll_interval: Duration,
}

impl FlowEngine {
    pub fn new(timeouts: Timeouts, diagnostics: DiagnosticsRecorder) -> Self {
        Self {
            timeouts,
            diagnostics,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    /// The fixed step sequence for this flow, with budgets and fallbacks filled in
    pub fn steps(&self, spec: &FlowSpec) -> Vec<FlowStep> {
        let t = &self.timeouts;
        let mut steps = vec![
            FlowStep::new(StepAction::Navigate, ms(t.navigation_ms)),
            FlowStep::new(StepAction::Stabilize, ms(t.load_primary_ms)).with_fallback(
                Fallback::WeakerLoadSignal {
                    signal: LoadSignal::DomContentLoaded,
                    timeout_ms: t.load_fallback_ms,
                },
            ),
        ];

        let mut consent = FlowStep::new(StepAction::HandleConsent, ms(t.consent_pause_ms));
        if let Some(scan) = &consent_settings(spec).scan {
            consent = consent.with_fallback(Fallback::HeuristicScan { scan: scan.clone() });
        }
        steps.push(consent);

        match &spec.params {
            FlowParams::Login(p) => steps.extend([
                FlowStep::new(StepAction::SuppressPopups, ms(t.popup_settle_ms)),
                FlowStep::new(StepAction::LocateCredentialSurface, ms(t.sign_in_reveal_ms))
                    .with_fallback(Fallback::ActivateControl {
                        controls: p.sign_in_controls.clone(),
                    }),
                FlowStep::new(StepAction::SubmitCredentials, ms(t.field_ms)).with_fallback(
                    Fallback::AlternateForm {
                        forms: p.fallback_form.clone(),
                    },
                ),
                FlowStep::new(StepAction::AwaitOutcome, ms(t.outcome_ms)),
            ]),
            FlowParams::Navigation(_) => steps.extend([
                FlowStep::new(StepAction::FollowMenuPath, ms(t.field_ms)),
                FlowStep::new(StepAction::AwaitOutcome, ms(t.results_settle_ms)),
            ]),
            FlowParams::Search(p) => steps.extend([
                FlowStep::new(StepAction::SubmitSearch, ms(t.field_ms)).with_fallback(
                    Fallback::ActivateControl {
                        controls: p.search_openers.clone(),
                    },
                ),
                FlowStep::new(StepAction::AwaitOutcome, ms(t.results_settle_ms)),
            ]),
        }
        steps
    }

    /// Run one flow to completion; always returns a complete record
    pub async fn run_flow(&self, session: &mut Session, spec: &FlowSpec) -> RunRecord {
        session.begin_run();
        let session: &Session = session;
        let mut run = FlowRun::new(self, session, spec);
        run.log_configuration();

        for step in self.steps(spec) {
            if run.state.is_terminal() {
                break;
            }
            debug!(flow = %spec.name, "Executing step {}", step.name);
            let event = match run.execute(&step).await {
                Ok(report) => report.into_event(step.action),
                Err(e) => FlowEvent::Fault {
                    message: e.to_string(),
                },
            };
            run.apply(event).await;
        }

        if !run.state.is_terminal() {
            run.apply(FlowEvent::Fault {
                message: "flow ended without an outcome".to_string(),
            })
            .await;
        }
        run.finish()
    }
}

fn consent_settings(spec: &FlowSpec) -> &ConsentSettings {
    match &spec.params {
        FlowParams::Login(p) => &p.consent,
        FlowParams::Navigation(p) => &p.consent,
        FlowParams::Search(p) => &p.consent,
    }
}

fn rules_for(spec: &FlowSpec) -> OutcomeRules {
    match &spec.params {
        FlowParams::Login(p) => OutcomeRules::login(p),
        FlowParams::Navigation(p) => OutcomeRules::navigation(p),
        FlowParams::Search(p) => OutcomeRules::search(p),
    }
}

/// State of one run; owns the recorder, borrows the session
struct FlowRun<'a> {
    engine: &'a FlowEngine,
    session: &'a Session,
    spec: &'a FlowSpec,
    classifier: OutcomeClassifier,
    recorder: RunRecorder,
    state: FlowState,
    /// Explicit submission was skipped because the URL already looked authenticated
    submission_skipped: bool,
}

impl<'a> FlowRun<'a> {
    fn new(engine: &'a FlowEngine, session: &'a Session, spec: &'a FlowSpec) -> Self {
        Self {
            engine,
            session,
            spec,
            classifier: OutcomeClassifier::new(rules_for(spec)),
            recorder: RunRecorder::start(spec.name.clone(), spec.kind()),
            state: FlowState::Start,
            submission_skipped: false,
        }
    }

    fn driver(&self) -> &'a dyn BrowserDriver {
        self.session.driver()
    }

    fn resolver(&self) -> SelectorResolver<'a> {
        SelectorResolver::new(self.driver()).with_poll_interval(self.engine.poll_interval)
    }

    fn log_configuration(&mut self) {
        let t = &self.engine.timeouts;
        self.recorder.info(format!(
            "Starting {} flow '{}' (run {}) at {}",
            self.spec.kind(),
            self.spec.name,
            self.recorder.run_id(),
            self.spec.url
        ));
        self.recorder.info(format!(
            "Timeouts: load {}ms/{}ms, fields {}ms, outcome {}ms; session run #{}",
            t.load_primary_ms,
            t.load_fallback_ms,
            t.field_ms,
            t.outcome_ms,
            self.session.runs()
        ));
        if let FlowParams::Login(p) = &self.spec.params {
            self.recorder.info(format!("Identity: {}", p.identity));
        }
    }

    async fn apply(&mut self, event: FlowEvent) {
        let state = std::mem::replace(&mut self.state, FlowState::Start);
        let (next, actions) = transition(state, event);
        self.state = next;

        for action in actions {
            match action {
                FlowAction::Log { level, message } => self.recorder.log(level, message),
                FlowAction::Capture { cause } => {
                    let driver = self.driver();
                    self.engine
                        .diagnostics
                        .capture_for_run(driver, &mut self.recorder, cause)
                        .await;
                }
            }
        }
    }

    fn finish(mut self) -> RunRecord {
        if let Some(video) = self.driver().video_path() {
            self.recorder.info(format!("Video saved: {}", video.display()));
            self.recorder.attach_video(video);
        }
        let (outcome, message) = match self.state {
            FlowState::OutcomeDetermined { outcome, message } => (outcome, message),
            other => (
                Outcome::failure("incomplete"),
                format!("Run ended in state {:?}", other),
            ),
        };
        self.recorder.finish(outcome, message)
    }

    async fn execute(&mut self, step: &FlowStep) -> Result<StepReport> {
        match step.action {
            StepAction::Navigate => self.navigate().await,
            StepAction::Stabilize => self.stabilize(step).await,
            StepAction::HandleConsent => self.handle_consent(step).await,
            StepAction::SuppressPopups => self.suppress_popups(step).await,
            StepAction::LocateCredentialSurface => self.locate_credential_surface(step).await,
            StepAction::SubmitCredentials => self.submit_credentials(step).await,
            StepAction::FollowMenuPath => self.follow_menu_path(step).await,
            StepAction::SubmitSearch => self.submit_search(step).await,
            StepAction::AwaitOutcome => self.await_outcome(step).await,
        }
    }

    fn login(&self) -> Result<&'a LoginParams> {
        match &self.spec.params {
            FlowParams::Login(p) => Ok(p),
            _ => Err(FlowError::Config(format!(
                "{} flow has no credential parameters",
                self.spec.kind()
            ))),
        }
    }

    fn navigation(&self) -> Result<&'a NavigationParams> {
        match &self.spec.params {
            FlowParams::Navigation(p) => Ok(p),
            _ => Err(FlowError::Config(format!(
                "{} flow has no menu path",
                self.spec.kind()
            ))),
        }
    }

    fn search(&self) -> Result<&'a SearchParams> {
        match &self.spec.params {
            FlowParams::Search(p) => Ok(p),
            _ => Err(FlowError::Config(format!(
                "{} flow has no search parameters",
                self.spec.kind()
            ))),
        }
    }

    /// Wait for network idle, then the weaker signal; never fails on timeout
    ///
    /// Returns what was settled for when the primary signal did not arrive.
    async fn settle(
        &mut self,
        primary: Duration,
        fallback: Option<(LoadSignal, Duration)>,
    ) -> Result<Option<String>> {
        let driver = self.driver();
        match driver.wait_for_load_signal(LoadSignal::NetworkIdle, primary).await {
            Ok(()) => Ok(None),
            Err(e) if e.is_timeout() => {
                if let Some((signal, timeout)) = fallback {
                    self.recorder.warn(format!("{}; waiting for {}", e, signal));
                    match driver.wait_for_load_signal(signal, timeout).await {
                        Ok(()) => return Ok(Some(format!("{} reached", signal))),
                        Err(e) if e.is_timeout() => {}
                        Err(e) => return Err(e),
                    }
                }
                self.recorder.warn("Page load timeout, continuing");
                Ok(Some("page load timeout, continuing".to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn close_popups(&mut self) -> Result<usize> {
        let contexts = self.driver().list_open_contexts().await?;
        if contexts.len() <= 1 {
            return Ok(0);
        }
        let closed = self.session.close_secondary_contexts().await?;
        if !closed.is_empty() {
            self.recorder
                .info(format!("Closed {} popup window(s)", closed.len()));
        }
        let stuck = (contexts.len() - 1).saturating_sub(closed.len());
        if stuck > 0 {
            self.recorder
                .warn(format!("{} popup window(s) could not be closed", stuck));
        }
        Ok(closed.len())
    }

    async fn navigate(&mut self) -> Result<StepReport> {
        self.recorder.info(format!("Navigating to {}", self.spec.url));
        self.driver().navigate(&self.spec.url).await?;
        Ok(StepReport::Completed)
    }

    async fn stabilize(&mut self, step: &FlowStep) -> Result<StepReport> {
        let fallback = match &step.fallback {
            Some(Fallback::WeakerLoadSignal { signal, timeout_ms }) => Some((*signal, ms(*timeout_ms))),
            _ => None,
        };
        let settled = self.settle(step.timeout, fallback).await?;
        self.driver()
            .delay(ms(self.engine.timeouts.stabilize_pause_ms))
            .await;
        Ok(match settled {
            None => StepReport::Completed,
            Some(detail) => StepReport::FellBack(detail),
        })
    }

    async fn handle_consent(&mut self, step: &FlowStep) -> Result<StepReport> {
        let consent = consent_settings(self.spec);
        if !consent.enabled {
            return Ok(StepReport::Skipped("consent handling disabled".to_string()));
        }
        let scan = match &step.fallback {
            Some(Fallback::HeuristicScan { scan }) => Some(scan),
            _ => None,
        };

        let found = match self.resolver().resolve_or_scan(&consent.controls, scan).await {
            Ok(found) => found,
            Err(_) => return Ok(StepReport::Skipped("no consent dialog found".to_string())),
        };
        self.recorder.info(found.describe("consent control"));
        if let Err(e) = self.driver().click(&found.target).await {
            self.recorder
                .warn(format!("Consent control could not be clicked: {}", e));
            return Ok(StepReport::Skipped("consent control not clickable".to_string()));
        }
        self.recorder.info("Accepted cookies");
        self.driver().delay(step.timeout).await;

        Ok(if found.is_heuristic() {
            StepReport::FellBack("consent control found by heuristic scan".to_string())
        } else {
            StepReport::Completed
        })
    }

    async fn suppress_popups(&mut self, step: &FlowStep) -> Result<StepReport> {
        if self.close_popups().await? == 0 {
            return Ok(StepReport::Skipped("single browsing context".to_string()));
        }
        self.driver().delay(step.timeout).await;
        Ok(StepReport::Completed)
    }

    async fn locate_credential_surface(&mut self, step: &FlowStep) -> Result<StepReport> {
        let p = self.login()?;
        let resolver = self.resolver();

        if let Ok(found) = resolver.resolve(&p.identifier_field, &SearchScope::Page).await {
            self.recorder.info(found.describe("identifier field"));
            return Ok(StepReport::Completed);
        }
        self.recorder
            .info("Identifier field not visible; looking for a sign-in control");

        let controls = match &step.fallback {
            Some(Fallback::ActivateControl { controls }) => controls,
            _ => &p.sign_in_controls,
        };
        match resolver.resolve(controls, &SearchScope::Page).await {
            Ok(control) => {
                self.recorder.info(control.describe("sign-in control"));
                self.driver().click(&control.target).await?;
                self.settle(ms(self.engine.timeouts.load_fallback_ms), None)
                    .await?;
            }
            Err(_) => self.recorder.warn("No sign-in control found"),
        }

        // a sign-in control may open an auth popup; close it before any field is filled
        if self.close_popups().await? > 0 {
            self.driver()
                .delay(ms(self.engine.timeouts.popup_settle_ms))
                .await;
        }

        match resolver
            .resolve_within(&p.identifier_field, &SearchScope::Page, step.timeout)
            .await
        {
            Ok(found) => {
                self.recorder.info(found.describe("identifier field"));
                Ok(StepReport::FellBack("sign-in control activated".to_string()))
            }
            Err(e) => Ok(StepReport::Failed(format!(
                "Identifier field not found within {}ms ({})",
                step.timeout.as_millis(),
                e
            ))),
        }
    }

    async fn fill_field(
        &mut self,
        candidates: &SelectorCandidates,
        label: &str,
        value: &str,
        timeout: Duration,
    ) -> Result<Option<Resolution>> {
        let found = match self
            .resolver()
            .resolve_within(candidates, &SearchScope::Page, timeout)
            .await
        {
            Ok(found) => found,
            Err(_) => return Ok(None),
        };
        self.recorder.info(found.describe(label));
        self.driver().fill_text(&found.target, value).await?;
        self.recorder.info(format!("Filled {}", label));
        Ok(Some(found))
    }

    /// Resolve a form and submit it; submission errors are logged and absorbed
    async fn try_submit(&mut self, forms: &SelectorCandidates, label: &str) -> Option<Resolution> {
        let form = self
            .resolver()
            .resolve(forms, &SearchScope::Page)
            .await
            .ok()?;
        match self.driver().submit_form(&form.target).await {
            Ok(()) => {
                self.recorder
                    .info(format!("Submitted {} via {}", label, form.candidate));
                Some(form)
            }
            Err(e) => {
                let e = FlowError::SubmissionFailure(format!("{} {}: {}", label, form.target, e));
                self.recorder.warn(e.to_string());
                None
            }
        }
    }

    async fn settle_after_submit(&mut self) -> Result<()> {
        let t = &self.engine.timeouts;
        let (settle, processing) = (ms(t.submit_settle_ms), ms(t.login_processing_ms));
        self.settle(settle, None).await?;
        self.driver().delay(processing).await;
        Ok(())
    }

    async fn submit_credentials(&mut self, step: &FlowStep) -> Result<StepReport> {
        let p = self.login()?;

        if self
            .fill_field(&p.identifier_field, "identifier field", &p.identity, step.timeout)
            .await?
            .is_none()
        {
            return Ok(StepReport::Failed(format!(
                "Identifier field not visible within {}ms",
                step.timeout.as_millis()
            )));
        }
        if self
            .fill_field(&p.secret_field, "secret field", p.secret.expose(), step.timeout)
            .await?
            .is_none()
        {
            return Ok(StepReport::Failed(format!(
                "Secret field not visible within {}ms",
                step.timeout.as_millis()
            )));
        }

        let url = self.driver().current_url().await?;
        if let Some(Indicator::SuccessUrl { marker }) = self.classifier.success_url(&url) {
            self.recorder.info(format!(
                "URL already contains '{}'; skipping explicit submission",
                marker
            ));
            self.submission_skipped = true;
            self.settle_after_submit().await?;
            return Ok(StepReport::Skipped("auto-submit detected".to_string()));
        }

        let report = if self.try_submit(&p.login_form, "login form").await.is_some() {
            StepReport::Completed
        } else {
            let alternate = match &step.fallback {
                Some(Fallback::AlternateForm { forms }) => self.try_submit(forms, "generic form").await,
                _ => None,
            };
            match alternate {
                Some(form) => StepReport::FellBack(format!("generic form {}", form.candidate)),
                None => {
                    self.recorder
                        .warn("No form found - login may have happened automatically");
                    StepReport::FellBack("no submittable form found".to_string())
                }
            }
        };

        self.settle_after_submit().await?;
        Ok(report)
    }

    async fn follow_menu_path(&mut self, step: &FlowStep) -> Result<StepReport> {
        let p = self.navigation()?;
        let t = self.engine.timeouts.clone();
        let Some(last) = p.menu_path.len().checked_sub(1) else {
            return Ok(StepReport::Failed("menu path is empty".to_string()));
        };

        for (level, candidates) in p.menu_path.iter().enumerate() {
            let found = match self
                .resolver()
                .resolve_within(candidates, &SearchScope::Page, step.timeout)
                .await
            {
                Ok(found) => found,
                Err(_) => {
                    return Ok(StepReport::Failed(format!(
                        "Menu level {} not found within {}ms",
                        level,
                        step.timeout.as_millis()
                    )))
                }
            };
            self.recorder
                .info(found.describe(&format!("menu level {}", level)));
            if level < last {
                self.driver().hover(&found.target).await?;
                self.recorder.info(format!("Hovered {}", found.target));
                self.driver().delay(ms(t.menu_pause_ms)).await;
            } else {
                self.driver().click(&found.target).await?;
                self.recorder.info(format!("Clicked {}", found.target));
            }
        }

        let settled = self
            .settle(
                ms(t.load_primary_ms),
                Some((LoadSignal::DomContentLoaded, ms(t.load_fallback_ms))),
            )
            .await?;
        self.driver().delay(ms(t.results_settle_ms)).await;
        Ok(match settled {
            None => StepReport::Completed,
            Some(detail) => StepReport::FellBack(detail),
        })
    }

    async fn submit_search(&mut self, step: &FlowStep) -> Result<StepReport> {
        let p = self.search()?;
        let t = self.engine.timeouts.clone();
        let resolver = self.resolver();
        let mut fell_back = None;

        let input = match resolver.resolve(&p.search_input, &SearchScope::Page).await {
            Ok(found) => found,
            Err(_) => {
                let openers = match &step.fallback {
                    Some(Fallback::ActivateControl { controls }) => controls,
                    _ => &p.search_openers,
                };
                let revealed = match resolver.resolve(openers, &SearchScope::Page).await {
                    Ok(opener) => {
                        self.recorder.info(opener.describe("search opener"));
                        self.driver().click(&opener.target).await?;
                        self.driver().delay(ms(t.menu_pause_ms)).await;
                        resolver
                            .resolve_within(&p.search_input, &SearchScope::Page, ms(t.sign_in_reveal_ms))
                            .await
                            .ok()
                    }
                    Err(_) => None,
                };
                match revealed {
                    Some(found) => {
                        fell_back = Some("search opener activated".to_string());
                        found
                    }
                    None => match resolver.scan(&p.input_scan).await {
                        Ok(found) => {
                            fell_back = Some("search input found by heuristic scan".to_string());
                            found
                        }
                        Err(_) => return Ok(StepReport::Failed("Search input not found".to_string())),
                    },
                }
            }
        };

        self.recorder.info(input.describe("search input"));
        self.driver().fill_text(&input.target, &p.query).await?;
        self.driver().press_key(&input.target, "Enter").await?;
        self.recorder.info(format!("Submitted search for '{}'", p.query));

        let settled = self
            .settle(
                ms(t.load_fallback_ms),
                Some((LoadSignal::DomContentLoaded, ms(t.load_fallback_ms / 2))),
            )
            .await?;
        self.driver().delay(ms(t.results_settle_ms)).await;

        Ok(match fell_back.or(settled) {
            None => StepReport::Completed,
            Some(detail) => StepReport::FellBack(detail),
        })
    }

    async fn await_outcome(&mut self, step: &FlowStep) -> Result<StepReport> {
        let driver = self.driver();
        if !matches!(self.spec.params, FlowParams::Login(_)) {
            let verdict = self.classifier.classify(driver, Trigger::DirectInspection).await;
            self.recorder.info(format!("Decided by {}", verdict.indicator));
            return Ok(StepReport::Decided(verdict));
        }

        let verdict = match self
            .classifier
            .wait_for_success(driver, step.timeout, self.engine.poll_interval)
            .await
        {
            Some(indicator) => self.classifier.success_verdict(indicator),
            None => {
                self.recorder.info(format!(
                    "No success indicator within {}ms; classifying page",
                    step.timeout.as_millis()
                ));
                self.classifier
                    .classify(driver, Trigger::SuccessWaitExpired)
                    .await
            }
        };

        // A URL that looked authenticated before anything was submitted proves nothing
        let url_only = matches!(verdict.indicator, Indicator::SuccessUrl { .. });
        let verdict = if url_only && self.submission_skipped {
            match self.classifier.success_in_page(driver).await {
                Some(indicator) => self.classifier.success_verdict(indicator),
                None => Verdict {
                    outcome: Outcome::Ambiguous,
                    message: "authenticated-looking URL reached without explicit submission"
                        .to_string(),
                    indicator: verdict.indicator,
                },
            }
        } else {
            verdict
        };

        self.recorder.info(format!("Decided by {}", verdict.indicator));
        match (&verdict.outcome, &verdict.indicator) {
            (Outcome::Failure { reason }, Indicator::ErrorIndicator { .. }) => self
                .recorder
                .warn(FlowError::AuthenticationRejected(reason.clone()).to_string()),
            (Outcome::Ambiguous, _) => self
                .recorder
                .warn(FlowError::AmbiguousOutcome(verdict.message.clone()).to_string()),
            _ => {}
        }
        Ok(StepReport::Decided(verdict))
    }
}
