use flowcheck_browser::scripted::{Call, ScriptedDriver};
use flowcheck_browser::{BrowserDriver, Session};
use std::time::Duration;

#[tokio::test]
async fn test_handoff_closes_stray_contexts_and_pauses() {
    let driver = ScriptedDriver::new("https://shop.test/");
    driver.open_contexts(2);
    let mut session = Session::new(driver.clone());
    session.begin_run();

    session.handoff(Duration::from_millis(3000)).await;

    assert_eq!(driver.closed_contexts(), vec!["page-1", "page-2"]);
    assert_eq!(driver.context_count(), 1);
    assert!(driver
        .calls()
        .contains(&Call::Delay(Duration::from_millis(3000))));
    assert_eq!(session.runs(), 1);
}

#[tokio::test]
async fn test_primary_context_survives() {
    let driver = ScriptedDriver::new("https://shop.test/");
    let session = Session::new(driver.clone());

    let closed = session.close_secondary_contexts().await.unwrap();
    assert!(closed.is_empty());

    let contexts = session.driver().list_open_contexts().await.unwrap();
    assert_eq!(contexts.len(), 1);
    assert_eq!(contexts[0].0, "page-0");
}

#[tokio::test]
async fn test_zero_pause_handoff_does_not_delay() {
    let driver = ScriptedDriver::new("https://shop.test/");
    let mut session = Session::new(driver.clone());

    session.handoff(Duration::ZERO).await;
    assert!(driver.calls().is_empty());
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_context_that_closed_itself_counts_as_closed() {
    let driver = ScriptedDriver::new("https://shop.test/");
    driver.open_contexts(2);
    driver.vanish_context("page-1");
    let session = Session::new(driver.clone());

    let closed = session.close_secondary_contexts().await.unwrap();

    let ids: Vec<&str> = closed.iter().map(|c| c.0.as_str()).collect();
    assert_eq!(ids, vec!["page-1", "page-2"]);
    assert_eq!(driver.closed_contexts(), vec!["page-2"]);
    assert_eq!(driver.context_count(), 1);
}

#[tokio::test]
async fn test_close_failure_does_not_stop_the_rest() {
    let driver = ScriptedDriver::new("https://shop.test/");
    driver.open_contexts(3);
    driver.fail_context_close("page-1", "target crashed");
    let session = Session::new(driver.clone());

    let closed = session.close_secondary_contexts().await.unwrap();

    let ids: Vec<&str> = closed.iter().map(|c| c.0.as_str()).collect();
    assert_eq!(ids, vec!["page-2", "page-3"]);
    assert_eq!(driver.context_count(), 2);
}
