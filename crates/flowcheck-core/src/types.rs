//! Core type definitions for flowcheck runs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::selector::{ScanSpec, SelectorCandidates};

/// Which fixed step sequence a flow follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    Login,
    Navigation,
    Search,
}

impl std::fmt::Display for FlowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Login => write!(f, "login"),
            Self::Navigation => write!(f, "navigation"),
            Self::Search => write!(f, "search"),
        }
    }
}

impl std::str::FromStr for FlowKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "login" => Ok(Self::Login),
            "navigation" | "nav" => Ok(Self::Navigation),
            "search" => Ok(Self::Search),
            _ => Err(format!("Invalid flow kind: {}", s)),
        }
    }
}

/// Terminal verdict of a flow run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure { reason: String },
    Timeout,
    Ambiguous,
}

/// Outcome without its payload, for counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    Failure,
    Timeout,
    Ambiguous,
}

impl Outcome {
    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            Outcome::Success => OutcomeKind::Success,
            Outcome::Failure { .. } => OutcomeKind::Failure,
            Outcome::Timeout => OutcomeKind::Timeout,
            Outcome::Ambiguous => OutcomeKind::Ambiguous,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Success => write!(f, "success"),
            Outcome::Failure { reason } => write!(f, "failure ({})", reason),
            Outcome::Timeout => write!(f, "timeout"),
            Outcome::Ambiguous => write!(f, "ambiguous"),
        }
    }
}

/// Why a diagnostic artifact was captured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaptureCause {
    Success,
    Error,
    Timeout,
    Exception,
    Debug,
}

impl std::fmt::Display for CaptureCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "Success"),
            Self::Error => write!(f, "Error"),
            Self::Timeout => write!(f, "Timeout"),
            Self::Exception => write!(f, "Exception"),
            Self::Debug => write!(f, "Debug"),
        }
    }
}

/// A diagnostic artifact written to disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub path: PathBuf,
    pub label: String,
    pub cause: CaptureCause,
    pub captured_at: DateTime<Utc>,
}

/// Browser load-completion signals, strongest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadSignal {
    NetworkIdle,
    Load,
    DomContentLoaded,
}

impl std::fmt::Display for LoadSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NetworkIdle => write!(f, "NetworkIdle"),
            Self::Load => write!(f, "Load"),
            Self::DomContentLoaded => write!(f, "DOMContentLoaded"),
        }
    }
}

/// What a flow step does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    Navigate,
    Stabilize,
    HandleConsent,
    SuppressPopups,
    LocateCredentialSurface,
    SubmitCredentials,
    FollowMenuPath,
    SubmitSearch,
    AwaitOutcome,
}

impl std::fmt::Display for StepAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Navigate => "navigate",
            Self::Stabilize => "stabilize",
            Self::HandleConsent => "handle_consent",
            Self::SuppressPopups => "suppress_popups",
            Self::LocateCredentialSurface => "locate_credential_surface",
            Self::SubmitCredentials => "submit_credentials",
            Self::FollowMenuPath => "follow_menu_path",
            Self::SubmitSearch => "submit_search",
            Self::AwaitOutcome => "await_outcome",
        };
        write!(f, "{}", name)
    }
}

/// Alternate path a step takes when its primary path comes up empty
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fallback {
    /// Wait for a weaker load signal
    WeakerLoadSignal { signal: LoadSignal, timeout_ms: u64 },
    /// Activate a control that reveals the target, then re-resolve
    ActivateControl { controls: SelectorCandidates },
    /// Submit a differently-located form
    AlternateForm { forms: SelectorCandidates },
    /// Score every element of a broad kind against keyword hints
    HeuristicScan { scan: ScanSpec },
}

/// One step of a flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowStep {
    pub name: String,
    pub action: StepAction,
    #[serde(with = "duration_ms")]
    pub timeout: Duration,
    pub fallback: Option<Fallback>,
}

impl FlowStep {
    pub fn new(action: StepAction, timeout: Duration) -> Self {
        Self {
            name: action.to_string(),
            action,
            timeout,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

/// Severity of a run log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// One chronological log line of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// Durable record of one flow execution
///
/// Produced once by [`RunRecorder::finish`]; nothing mutates it afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub name: String,
    pub flow: FlowKind,
    pub outcome: Outcome,
    pub passed: bool,
    pub message: String,
    /// Run start
    pub execution_time: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    pub logs: Vec<LogEntry>,
    pub screenshot: Option<ArtifactRef>,
    pub video: Option<PathBuf>,
}

impl RunRecord {
    /// Messages only, in order
    pub fn log_messages(&self) -> impl Iterator<Item = &str> {
        self.logs.iter().map(|l| l.message.as_str())
    }

    /// Whether any log line contains `needle`
    pub fn logged(&self, needle: &str) -> bool {
        self.log_messages().any(|m| m.contains(needle))
    }
}

/// Single-writer builder for a [`RunRecord`]
///
/// Owned by the flow run that created it. Log entries are append-only and
/// every entry is mirrored to `tracing`.
#[derive(Debug)]
pub struct RunRecorder {
    run_id: Uuid,
    name: String,
    flow: FlowKind,
    execution_time: DateTime<Utc>,
    started: Instant,
    logs: Vec<LogEntry>,
    screenshot: Option<ArtifactRef>,
    video: Option<PathBuf>,
}

impl RunRecorder {
    pub fn start(name: impl Into<String>, flow: FlowKind) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            name: name.into(),
            flow,
            execution_time: Utc::now(),
            started: Instant::now(),
            logs: Vec::new(),
            screenshot: None,
            video: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Info => info!(flow = %self.name, "{}", message),
            LogLevel::Warn => warn!(flow = %self.name, "{}", message),
            LogLevel::Error => error!(flow = %self.name, "{}", message),
        }
        self.logs.push(LogEntry {
            at: Utc::now(),
            level,
            message,
        });
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    pub fn log_count(&self) -> usize {
        self.logs.len()
    }

    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    /// Latest artifact wins; earlier ones stay referenced in the log
    pub fn attach_screenshot(&mut self, artifact: ArtifactRef) {
        self.screenshot = Some(artifact);
    }

    pub fn attach_video(&mut self, path: PathBuf) {
        self.video = Some(path);
    }

    /// Freeze the record; duration is measured on a monotonic clock
    pub fn finish(mut self, outcome: Outcome, message: impl Into<String>) -> RunRecord {
        let duration = self.started.elapsed();
        let ended_at = self.execution_time
            + chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero());
        self.info(format!(
            "Run completed in {:.2} seconds",
            duration.as_secs_f64()
        ));

        RunRecord {
            run_id: self.run_id,
            name: self.name,
            flow: self.flow,
            passed: outcome.is_success(),
            outcome,
            message: message.into(),
            execution_time: self.execution_time,
            ended_at,
            duration,
            logs: self.logs,
            screenshot: self.screenshot,
            video: self.video,
        }
    }
}

/// Serialize `Duration` as integer milliseconds
pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_passed_consistency() {
        let ok = RunRecorder::start("ok", FlowKind::Login).finish(Outcome::Success, "done");
        assert!(ok.passed);

        for outcome in [Outcome::failure("bad"), Outcome::Timeout, Outcome::Ambiguous] {
            let r = RunRecorder::start("x", FlowKind::Login).finish(outcome.clone(), "m");
            assert!(!r.passed, "{:?} must not pass", outcome);
        }
    }

    #[test]
    fn test_duration_matches_end_minus_start() {
        let mut rec = RunRecorder::start("timed", FlowKind::Navigation);
        rec.info("step");
        std::thread::sleep(Duration::from_millis(5));
        let record = rec.finish(Outcome::Timeout, "slow");

        assert!(record.duration >= Duration::from_millis(5));
        assert!(record.ended_at >= record.execution_time);
        let diff = (record.ended_at - record.execution_time).to_std().unwrap();
        assert_eq!(diff, record.duration);
    }

    #[test]
    fn test_logs_are_chronological_and_counted() {
        let mut rec = RunRecorder::start("logs", FlowKind::Search);
        rec.info("one");
        rec.warn("two");
        rec.error("two");
        assert_eq!(rec.log_count(), 3);

        let record = rec.finish(Outcome::Ambiguous, "m");
        // completion line is appended last
        assert_eq!(record.logs.len(), 4);
        let messages: Vec<_> = record.log_messages().collect();
        assert_eq!(&messages[..3], &["one", "two", "two"]);
        assert!(messages[3].starts_with("Run completed in"));
        assert!(record.logs.windows(2).all(|w| w[0].at <= w[1].at));
    }

    #[test]
    fn test_record_serializes_duration_as_millis() {
        let record = RunRecorder::start("json", FlowKind::Login).finish(Outcome::Success, "ok");
        let value = serde_json::to_value(&record).unwrap();
        assert!(value["duration"].is_u64());
        assert_eq!(value["outcome"]["kind"], "success");

        let back: RunRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back.name, "json");
        assert!(back.passed);
    }

    #[test]
    fn test_flow_kind_from_str() {
        assert_eq!("LOGIN".parse::<FlowKind>().unwrap(), FlowKind::Login);
        assert_eq!("nav".parse::<FlowKind>().unwrap(), FlowKind::Navigation);
        assert!("checkout".parse::<FlowKind>().is_err());
    }
}
