//! Fail-open utilities for graceful degradation
//!
//! Diagnostic capture, stray-context cleanup and similar infrastructure work
//! must never change the verdict of the run that asked for it. Wrap such
//! operations in [`fail_open`] so a failure degrades to a warning.
//!
//! DO NOT use fail-open for:
//! - Element resolution (drives the verdict)
//! - Navigation (fatal by contract)
//! - Outcome classification

use std::future::Future;
use tracing::warn;

use crate::Result;

/// Execute an operation that should fail open
///
/// Logs the error via `tracing::warn!` on failure and returns `None`.
///
/// # Usage
///
/// ```no_run
/// use flowcheck_core::fail_open::fail_open;
/// use flowcheck_core::Result;
///
/// async fn close_stray_tab() -> Result<()> {
///     Ok(())
/// }
///
/// async fn example() {
///     let closed = fail_open("session::close_stray_tab", || close_stray_tab()).await;
///     // closed is None if the tab could not be closed
/// }
/// ```
pub async fn fail_open<F, Fut, T>(operation_name: &str, f: F) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match f().await {
        Ok(val) => Some(val),
        Err(e) => {
            warn!("{} failed (fail-open): {}", operation_name, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FlowError;

    #[tokio::test]
    async fn test_fail_open_success() {
        let result = fail_open("test_op", || async { Ok::<_, FlowError>(42) }).await;
        assert_eq!(result, Some(42));
    }

    #[tokio::test]
    async fn test_fail_open_failure() {
        let result = fail_open("test_op", || async {
            Err::<i32, _>(FlowError::Capture("disk full".to_string()))
        })
        .await;
        assert_eq!(result, None);
    }
}
