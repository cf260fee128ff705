//! Sequential execution of a suite of flows

use flowcheck_browser::{Session, SessionFactory};
use flowcheck_core::config::{RunSettings, SessionMode};
use flowcheck_core::fail_open::fail_open;
use flowcheck_core::{FlowError, FlowSpec, Outcome, RunRecord, RunRecorder};
use flowcheck_metrics::AggregateSummary;
use std::time::Duration;
use tracing::{info, warn};

use crate::engine::FlowEngine;

/// Runs flow specs one after another and collects their records
pub struct ResultAggregator {
    engine: FlowEngine,
    settings: RunSettings,
}

impl ResultAggregator {
    pub fn new(engine: FlowEngine, settings: RunSettings) -> Self {
        Self { engine, settings }
    }

    pub fn engine(&self) -> &FlowEngine {
        &self.engine
    }

    /// Run every flow in order; yields exactly one record per flow
    pub async fn run_all(&self, factory: &dyn SessionFactory, specs: &[FlowSpec]) -> Vec<RunRecord> {
        info!(
            "Running {} flow(s), session mode {:?}",
            specs.len(),
            self.settings.session_mode
        );
        if specs.is_empty() {
            return Vec::new();
        }
        match self.settings.session_mode {
            SessionMode::Shared => match factory.open().await {
                Ok(mut session) => {
                    let records = self.run_shared(&mut session, specs).await;
                    fail_open("session::close", || session.close()).await;
                    records
                }
                Err(e) => specs.iter().map(|spec| unstarted(spec, &e)).collect(),
            },
            SessionMode::PerFlow => {
                let mut records = Vec::with_capacity(specs.len());
                for spec in specs {
                    let record = match factory.open().await {
                        Ok(mut session) => {
                            let record = self.engine.run_flow(&mut session, spec).await;
                            fail_open("session::close", || session.close()).await;
                            record
                        }
                        Err(e) => unstarted(spec, &e),
                    };
                    records.push(record);
                }
                records
            }
        }
    }

    /// Run every flow on one session, handing it off between runs
    pub async fn run_shared(&self, session: &mut Session, specs: &[FlowSpec]) -> Vec<RunRecord> {
        let pause = Duration::from_millis(self.settings.pause_between_runs_ms);
        let mut records = Vec::with_capacity(specs.len());

        for (index, spec) in specs.iter().enumerate() {
            if index > 0 {
                session.handoff(pause).await;
            }
            info!("Flow {}/{}: {}", index + 1, specs.len(), spec.name);
            let record = self.engine.run_flow(session, spec).await;
            info!("Flow '{}' finished: {}", record.name, record.outcome);
            records.push(record);
        }
        records
    }

    pub fn summarize(records: &[RunRecord]) -> AggregateSummary {
        flowcheck_metrics::summarize(records)
    }
}

/// Record for a flow that never got a session
fn unstarted(spec: &FlowSpec, error: &FlowError) -> RunRecord {
    warn!("No session for flow '{}': {}", spec.name, error);
    let mut recorder = RunRecorder::start(spec.name.clone(), spec.kind());
    recorder.error(format!("Could not open browser session: {}", error));
    recorder.finish(
        Outcome::failure("session unavailable"),
        format!("Test failed with exception: {}", error),
    )
}
