//! # flowcheck-core
//!
//! Core types for flowcheck, an unattended end-to-end checker for login,
//! menu-navigation and site-search flows on third-party sites.
//!
//! Live pages are unreliable: selectors drift, consent banners and popups
//! appear at random, load signals never settle. flowcheck treats every element
//! lookup as an ordered list of fallbacks and every run as a state machine that
//! ends in exactly one verdict.
//!
//! ## Core Paradigm
//!
//! - Every element is located through [`SelectorCandidates`], most specific first
//! - Every run produces one immutable [`RunRecord`]
//! - Diagnostics never change a verdict ([`fail_open`])

pub mod config;
pub mod fail_open;
pub mod selector;

mod error;
mod types;

pub use config::{FlowParams, FlowSpec, FlowcheckConfig, SessionMode, Timeouts};
pub use error::{FlowError, Result};
pub use selector::{ElementSnapshot, Query, ScanSpec, SelectorCandidates};
pub use types::*;
