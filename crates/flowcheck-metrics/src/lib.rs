//! # flowcheck-metrics
//!
//! Reporting over finished flow runs.
//!
//! This crate provides:
//! - A pure summary reduction over run records
//! - A plain-text rendering for terminals
//! - JSON results files for external report renderers

mod store;
mod summary;

pub use store::{read_records, write_records};
pub use summary::{render_text, summarize, AggregateSummary};
