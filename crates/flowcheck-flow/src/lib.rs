//! # flowcheck-flow
//!
//! Flow orchestration for flowcheck.
//!
//! This crate provides:
//! - A pure state machine that owns every flow decision
//! - Outcome classification from the final page state
//! - The engine that runs login, navigation and search flows on a session
//! - Sequential suite execution over shared or per-flow sessions

mod classifier;
mod engine;
mod runner;
mod state_machine;

pub use classifier::{Indicator, OutcomeClassifier, OutcomeRules, Trigger, Verdict};
pub use engine::FlowEngine;
pub use runner::ResultAggregator;
pub use state_machine::{capture_cause, transition, FlowAction, FlowEvent, FlowState};
