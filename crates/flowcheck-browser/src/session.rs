//! Exclusive ownership of a live browser between flow runs
//!
//! A [`Session`] is passed by `&mut` into every run, so no two runs can hold
//! the page at once. Between shared-session runs, [`Session::handoff`] closes
//! whatever the previous run left open and hands the primary page on.

use async_trait::async_trait;
use flowcheck_core::fail_open::fail_open;
use flowcheck_core::{FlowError, Result};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::driver::{BrowserDriver, ContextId};

/// A live browsing session owned by the running flow
pub struct Session {
    driver: Box<dyn BrowserDriver>,
    runs: usize,
}

impl Session {
    pub fn new(driver: impl BrowserDriver + 'static) -> Self {
        Self::from_boxed(Box::new(driver))
    }

    pub fn from_boxed(driver: Box<dyn BrowserDriver>) -> Self {
        Self { driver, runs: 0 }
    }

    pub fn driver(&self) -> &dyn BrowserDriver {
        self.driver.as_ref()
    }

    /// How many runs this session has been handed to
    pub fn runs(&self) -> usize {
        self.runs
    }

    /// Mark the start of a run on this session
    pub fn begin_run(&mut self) {
        self.runs += 1;
    }

    /// Close every context except the primary; returns the ids now gone
    ///
    /// A context that disappeared on its own counts as closed. Any other
    /// close failure is logged and the remaining contexts are still closed.
    pub async fn close_secondary_contexts(&self) -> Result<Vec<ContextId>> {
        let contexts = self.driver.list_open_contexts().await?;
        let mut closed = Vec::new();
        for context in contexts.into_iter().skip(1) {
            debug!("Closing secondary context {}", context);
            match self.driver.close_context(&context).await {
                Ok(()) => closed.push(context),
                Err(FlowError::ContextGone(_)) => {
                    debug!("Context {} already closed", context);
                    closed.push(context);
                }
                Err(e) => warn!("Could not close context {}: {}", context, e),
            }
        }
        Ok(closed)
    }

    /// Prepare the session for the next run
    ///
    /// Stray contexts are closed fail-open; the pause lets the primary page
    /// settle before the next run navigates it.
    pub async fn handoff(&mut self, pause: Duration) {
        let closed = fail_open("session::handoff", || self.close_secondary_contexts())
            .await
            .map(|c| c.len())
            .unwrap_or(0);
        if closed > 0 {
            info!("Handoff closed {} stray context(s)", closed);
        }
        if !pause.is_zero() {
            self.driver.delay(pause).await;
        }
    }

    /// Shut the browser down
    pub async fn close(self) -> Result<()> {
        info!("Closing browser session after {} run(s)", self.runs);
        self.driver.shutdown().await
    }
}

/// Opens sessions for per-flow execution
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Session>;
}
