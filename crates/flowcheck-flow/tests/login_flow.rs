use flowcheck_browser::scripted::{Call, Effect, FakeElement, ScriptedDriver};
use flowcheck_browser::{DiagnosticsRecorder, ScreenshotOptions, Session};
use flowcheck_core::config::{FlowParams, LoginParams, Secret};
use flowcheck_core::{CaptureCause, ElementSnapshot, FlowSpec, Outcome, Timeouts};
use flowcheck_flow::FlowEngine;
use std::path::Path;

const LOGIN_URL: &str = "https://shop.test/myaccount";
const SECRET: &str = "hunter2-very-secret";

fn engine(dir: &Path) -> FlowEngine {
    FlowEngine::new(
        Timeouts::default(),
        DiagnosticsRecorder::new(ScreenshotOptions {
            directory: dir.to_path_buf(),
            full_page: false,
            enabled: true,
        }),
    )
}

fn login_spec(url: &str) -> FlowSpec {
    FlowSpec {
        name: "account-login".to_string(),
        url: url.to_string(),
        params: FlowParams::Login(
            LoginParams::new("me@example.com").with_secret(Secret::new(SECRET)),
        ),
    }
}

fn email_field() -> FakeElement {
    FakeElement::new("email", ElementSnapshot::new("input").with_attr("type", "email"))
}

fn password_field() -> FakeElement {
    FakeElement::new(
        "password",
        ElementSnapshot::new("input").with_attr("type", "password"),
    )
}

fn login_form(effect: Effect) -> FakeElement {
    FakeElement::new("form", ElementSnapshot::new("form").with_attr("name", "login")).on_submit(effect)
}

/// Login page whose form lands on the dashboard
fn login_page() -> ScriptedDriver {
    let driver = ScriptedDriver::new("about:blank");
    driver.add(email_field());
    driver.add(password_field());
    driver.add(login_form(Effect::SetUrl(
        "https://shop.test/account/dashboard".to_string(),
    )));
    driver
}

async fn run(driver: &ScriptedDriver, spec: &FlowSpec, dir: &Path) -> flowcheck_core::RunRecord {
    let mut session = Session::new(driver.clone());
    engine(dir).run_flow(&mut session, spec).await
}

fn position(calls: &[Call], pred: impl Fn(&Call) -> bool) -> Option<usize> {
    calls.iter().position(pred)
}

#[tokio::test]
async fn test_successful_login_fills_in_order_and_captures_success() {
    let dir = tempfile::tempdir().unwrap();
    let driver = login_page();

    let record = run(&driver, &login_spec(LOGIN_URL), dir.path()).await;

    assert_eq!(record.outcome, Outcome::Success);
    assert!(record.passed);
    assert_eq!(record.message, "Login successful - account area reached");
    assert_eq!(
        driver.filled(),
        vec![
            ("email".to_string(), "me@example.com".to_string()),
            ("password".to_string(), SECRET.to_string()),
        ]
    );
    assert!(driver.calls().contains(&Call::Submit("form".to_string())));

    // the email field matched the second candidate
    assert!(record.logged("identifier field via candidate 1"));

    let shot = record.screenshot.as_ref().expect("success screenshot");
    assert_eq!(shot.cause, CaptureCause::Success);
    assert!(shot.path.exists());
    assert!(record.logged("Run completed in"));
    assert!(record.ended_at >= record.execution_time);
}

#[tokio::test]
async fn test_secret_never_reaches_the_log() {
    let dir = tempfile::tempdir().unwrap();
    let driver = login_page();

    let record = run(&driver, &login_spec(LOGIN_URL), dir.path()).await;

    assert!(!record.logged(SECRET));
    assert!(record.logged("me@example.com"));
    assert!(!format!("{:?}", login_spec(LOGIN_URL)).contains(SECRET));
}

#[tokio::test]
async fn test_missing_form_ends_ambiguous() {
    let dir = tempfile::tempdir().unwrap();
    let driver = ScriptedDriver::new("about:blank");
    driver.add(email_field());
    driver.add(password_field());

    let record = run(&driver, &login_spec(LOGIN_URL), dir.path()).await;

    assert!(record.logged("No form found"));
    assert_eq!(record.outcome, Outcome::Ambiguous);
    assert_eq!(record.message, "timeout — account area not reached");
    assert!(!record.passed);
    assert_eq!(
        record.screenshot.as_ref().map(|s| s.cause),
        Some(CaptureCause::Timeout)
    );
}

#[tokio::test]
async fn test_popups_are_closed_before_any_field_is_filled() {
    let dir = tempfile::tempdir().unwrap();
    let driver = login_page();
    driver.add(
        FakeElement::new("consent", ElementSnapshot::new("button").with_text("Accept All"))
            .on_click(Effect::OpenContexts(2)),
    );

    let record = run(&driver, &login_spec(LOGIN_URL), dir.path()).await;

    assert!(driver.clicked("consent"));
    assert_eq!(driver.closed_contexts(), vec!["page-1", "page-2"]);
    assert_eq!(driver.context_count(), 1);

    let calls = driver.calls();
    let last_close = calls
        .iter()
        .rposition(|c| matches!(c, Call::CloseContext(_)))
        .unwrap();
    let first_fill = position(&calls, |c| matches!(c, Call::Fill { .. })).unwrap();
    assert!(last_close < first_fill);

    assert!(record.logged("Accepted cookies"));
    assert!(record.logged("Closed 2 popup window(s)"));
    assert_eq!(record.outcome, Outcome::Success);
}

#[tokio::test]
async fn test_screenshot_failure_only_adds_a_warning() {
    let healthy_dir = tempfile::tempdir().unwrap();
    let healthy = run(&login_page(), &login_spec(LOGIN_URL), healthy_dir.path()).await;

    let dir = tempfile::tempdir().unwrap();
    let driver = login_page();
    driver.fail_screenshots("target closed");
    let record = run(&driver, &login_spec(LOGIN_URL), dir.path()).await;

    assert_eq!(record.outcome, healthy.outcome);
    assert_eq!(record.message, healthy.message);
    assert!(record.screenshot.is_none());
    assert!(record.logged("Failed to capture Success screenshot"));
    assert_eq!(record.logs.len(), healthy.logs.len());
}

#[tokio::test]
async fn test_field_timeout_fails_early_without_submitting() {
    let dir = tempfile::tempdir().unwrap();
    let driver = ScriptedDriver::new("about:blank");
    driver.add(email_field());
    driver.add(login_form(Effect::SetUrl(
        "https://shop.test/dashboard".to_string(),
    )));

    let record = run(&driver, &login_spec(LOGIN_URL), dir.path()).await;

    assert_eq!(
        record.outcome,
        Outcome::failure("Secret field not visible within 30000ms")
    );
    assert_eq!(
        driver.interactions(),
        vec![Call::Fill {
            target: "email".to_string(),
            value: "me@example.com".to_string(),
        }]
    );
    assert_eq!(
        record.screenshot.as_ref().map(|s| s.cause),
        Some(CaptureCause::Error)
    );
    assert!(!record.logged("Step await_outcome"));
}

#[tokio::test]
async fn test_navigation_error_becomes_exception_failure() {
    let dir = tempfile::tempdir().unwrap();
    let driver = login_page();
    driver.fail_navigation("net::ERR_NAME_NOT_RESOLVED");

    let record = run(&driver, &login_spec(LOGIN_URL), dir.path()).await;

    assert_eq!(record.outcome, Outcome::failure("exception"));
    assert!(record.message.starts_with("Test failed with exception"));
    assert!(record.message.contains("ERR_NAME_NOT_RESOLVED"));
    assert!(driver.interactions().is_empty());
    assert_eq!(
        record.screenshot.as_ref().map(|s| s.cause),
        Some(CaptureCause::Exception)
    );
    assert!(record.logged("Run completed in"));
}

#[tokio::test]
async fn test_sign_in_control_reveals_fields_and_skips_oauth() {
    let dir = tempfile::tempdir().unwrap();
    let driver = ScriptedDriver::new("about:blank");
    driver.add(
        FakeElement::new(
            "facebook",
            ElementSnapshot::new("button").with_text("Sign In with Facebook"),
        )
        .on_click(Effect::OpenContexts(1)),
    );
    driver.add(
        FakeElement::new("sign-in", ElementSnapshot::new("button").with_text("Sign In"))
            .on_click(Effect::Reveal("email".to_string()))
            .on_click(Effect::Reveal("password".to_string()))
            .on_click(Effect::OpenContexts(1)),
    );
    driver.add(FakeElement::new(
        "email",
        ElementSnapshot::new("input").with_attr("type", "email").hidden(),
    ));
    driver.add(FakeElement::new(
        "password",
        ElementSnapshot::new("input").with_attr("type", "password").hidden(),
    ));
    driver.add(login_form(Effect::SetUrl(
        "https://shop.test/profile".to_string(),
    )));

    // "Facebook" contains "ok", which the default consent list would click
    let mut spec = login_spec(LOGIN_URL);
    if let FlowParams::Login(params) = &mut spec.params {
        params.consent.enabled = false;
    }
    let record = run(&driver, &spec, dir.path()).await;

    assert!(driver.clicked("sign-in"));
    assert!(!driver.clicked("facebook"));
    assert_eq!(driver.closed_contexts(), vec!["page-1"]);
    assert!(record.logged("used fallback: sign-in control activated"));
    assert_eq!(record.outcome, Outcome::Success);
}

#[tokio::test]
async fn test_visible_error_indicator_is_an_authentication_failure() {
    let dir = tempfile::tempdir().unwrap();
    let driver = login_page_rejecting();

    let record = run(&driver, &login_spec(LOGIN_URL), dir.path()).await;

    assert_eq!(record.outcome, Outcome::failure("Incorrect email or password"));
    assert_eq!(record.message, "Login failed: Incorrect email or password");
    assert_eq!(
        record.screenshot.as_ref().map(|s| s.cause),
        Some(CaptureCause::Error)
    );
}

fn login_page_rejecting() -> ScriptedDriver {
    let driver = ScriptedDriver::new("about:blank");
    driver.add(email_field());
    driver.add(password_field());
    driver.add(FakeElement::new(
        "err",
        ElementSnapshot::new("div")
            .with_attr("role", "alert")
            .with_text("Incorrect email or password")
            .hidden(),
    ));
    driver.add(login_form(Effect::Reveal("err".to_string())));
    driver
}

#[tokio::test]
async fn test_authenticated_url_without_submission_is_ambiguous() {
    let dir = tempfile::tempdir().unwrap();
    let driver = login_page();

    let record = run(&driver, &login_spec("https://shop.test/profile/edit"), dir.path()).await;

    assert!(!driver.calls().iter().any(|c| matches!(c, Call::Submit(_))));
    assert!(record.logged("skipping explicit submission"));
    assert_eq!(record.outcome, Outcome::Ambiguous);
    assert_eq!(
        record.message,
        "authenticated-looking URL reached without explicit submission"
    );
}

#[tokio::test]
async fn test_authenticated_page_without_submission_is_success() {
    let dir = tempfile::tempdir().unwrap();
    let driver = login_page();
    driver.add(FakeElement::new(
        "account-area",
        ElementSnapshot::new("div").with_attr("class", "profile-header"),
    ));

    let record = run(&driver, &login_spec("https://shop.test/profile/edit"), dir.path()).await;

    assert_eq!(record.outcome, Outcome::Success);
}

#[tokio::test]
async fn test_load_timeouts_fall_back_and_continue() {
    let dir = tempfile::tempdir().unwrap();
    let driver = login_page();
    driver.fail_load(flowcheck_core::LoadSignal::NetworkIdle);
    driver.fail_load(flowcheck_core::LoadSignal::DomContentLoaded);

    let record = run(&driver, &login_spec(LOGIN_URL), dir.path()).await;

    assert!(record.logged("Page load timeout, continuing"));
    assert_eq!(record.outcome, Outcome::Success);
}

#[tokio::test]
async fn test_rejected_login_on_page_with_main_region_fails() {
    let dir = tempfile::tempdir().unwrap();
    let driver = login_page_rejecting();
    driver.add(FakeElement::new(
        "layout",
        ElementSnapshot::new("div").with_attr("role", "main"),
    ));

    let record = run(&driver, &login_spec(LOGIN_URL), dir.path()).await;

    assert_eq!(record.outcome, Outcome::failure("Incorrect email or password"));
    assert!(!record.passed);
}

#[tokio::test]
async fn test_popup_that_closes_itself_does_not_fault_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let driver = login_page();
    driver.add(
        FakeElement::new("consent", ElementSnapshot::new("button").with_text("Accept All"))
            .on_click(Effect::OpenContexts(2)),
    );
    driver.vanish_context("page-1");

    let record = run(&driver, &login_spec(LOGIN_URL), dir.path()).await;

    assert_eq!(driver.closed_contexts(), vec!["page-2"]);
    assert_eq!(driver.context_count(), 1);
    assert!(record.logged("Closed 2 popup window(s)"));
    assert_eq!(record.outcome, Outcome::Success);
}

#[tokio::test]
async fn test_popup_that_refuses_to_close_does_not_fault_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let driver = login_page();
    driver.add(
        FakeElement::new("consent", ElementSnapshot::new("button").with_text("Accept All"))
            .on_click(Effect::OpenContexts(2)),
    );
    driver.fail_context_close("page-1", "target crashed");

    let record = run(&driver, &login_spec(LOGIN_URL), dir.path()).await;

    assert_eq!(driver.closed_contexts(), vec!["page-2"]);
    assert!(record.logged("Closed 1 popup window(s)"));
    assert!(record.logged("1 popup window(s) could not be closed"));
    assert_eq!(record.outcome, Outcome::Success);
}
