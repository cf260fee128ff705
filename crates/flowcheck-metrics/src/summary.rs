//! Aggregate statistics over finished runs

use flowcheck_core::{OutcomeKind, RunRecord};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::time::Duration;

/// Counts and rates over a set of [`RunRecord`]s
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSummary {
    pub total_runs: usize,
    pub passed: usize,
    pub failed: usize,
    pub success: usize,
    pub failure: usize,
    pub timeout: usize,
    pub ambiguous: usize,
    #[serde(with = "flowcheck_core::duration_ms")]
    pub total_duration: Duration,
    /// None when there were no runs
    #[serde(default, with = "optional_ms")]
    pub mean_duration: Option<Duration>,
    /// None when there were no runs
    pub success_rate: Option<f64>,
}

impl AggregateSummary {
    /// Success rate, NaN for an empty input
    pub fn success_rate_or_nan(&self) -> f64 {
        self.success_rate.unwrap_or(f64::NAN)
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    pub fn count(&self, kind: OutcomeKind) -> usize {
        match kind {
            OutcomeKind::Success => self.success,
            OutcomeKind::Failure => self.failure,
            OutcomeKind::Timeout => self.timeout,
            OutcomeKind::Ambiguous => self.ambiguous,
        }
    }
}

/// Pure reduction; an empty input yields zero counts and no rate
pub fn summarize(records: &[RunRecord]) -> AggregateSummary {
    let mut summary = AggregateSummary {
        total_runs: records.len(),
        passed: 0,
        failed: 0,
        success: 0,
        failure: 0,
        timeout: 0,
        ambiguous: 0,
        total_duration: Duration::ZERO,
        mean_duration: None,
        success_rate: None,
    };

    for record in records {
        if record.passed {
            summary.passed += 1;
        } else {
            summary.failed += 1;
        }
        match record.outcome.kind() {
            OutcomeKind::Success => summary.success += 1,
            OutcomeKind::Failure => summary.failure += 1,
            OutcomeKind::Timeout => summary.timeout += 1,
            OutcomeKind::Ambiguous => summary.ambiguous += 1,
        }
        summary.total_duration += record.duration;
    }

    if let Ok(n) = u32::try_from(records.len()) {
        if n > 0 {
            summary.mean_duration = Some(summary.total_duration / n);
            summary.success_rate = Some(summary.passed as f64 / n as f64);
        }
    }
    summary
}

/// Plain-text report: one line per run, then the totals
pub fn render_text(records: &[RunRecord], summary: &AggregateSummary) -> String {
    let mut out = String::new();
    for record in records {
        let _ = writeln!(
            out,
            "[{}] {} ({}) {:.2}s - {}",
            if record.passed { "PASS" } else { "FAIL" },
            record.name,
            record.outcome,
            record.duration.as_secs_f64(),
            record.message
        );
        if let Some(shot) = &record.screenshot {
            let _ = writeln!(out, "       screenshot: {}", shot.path.display());
        }
    }

    let rate = match summary.success_rate {
        Some(rate) => format!("{:.1}%", rate * 100.0),
        None => "n/a".to_string(),
    };
    let mean = match summary.mean_duration {
        Some(mean) => format!("{:.2}s", mean.as_secs_f64()),
        None => "n/a".to_string(),
    };
    let _ = writeln!(
        out,
        "{} run(s): {} passed, {} failed (success {}, failure {}, timeout {}, ambiguous {})",
        summary.total_runs,
        summary.passed,
        summary.failed,
        summary.success,
        summary.failure,
        summary.timeout,
        summary.ambiguous
    );
    let _ = write!(
        out,
        "Success rate: {} | total {:.2}s | mean {}",
        rate,
        summary.total_duration.as_secs_f64(),
        mean
    );
    out
}

mod optional_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowcheck_core::{FlowKind, Outcome, RunRecorder};

    fn record(name: &str, outcome: Outcome, millis: u64) -> RunRecord {
        let mut record = RunRecorder::start(name, FlowKind::Login).finish(outcome, "done");
        record.duration = Duration::from_millis(millis);
        record
    }

    #[test]
    fn test_empty_input_has_no_rate() {
        let summary = summarize(&[]);
        assert_eq!(summary.total_runs, 0);
        assert_eq!(summary.success_rate, None);
        assert_eq!(summary.mean_duration, None);
        assert!(summary.success_rate_or_nan().is_nan());
        assert!(summary.all_passed());
    }

    #[test]
    fn test_counts_and_rate() {
        let records = vec![
            record("a", Outcome::Success, 1000),
            record("b", Outcome::failure("still on login page"), 2000),
            record("c", Outcome::Ambiguous, 3000),
            record("d", Outcome::Success, 2000),
        ];
        let summary = summarize(&records);

        assert_eq!(summary.total_runs, 4);
        assert_eq!(summary.passed, 2);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.count(OutcomeKind::Success), 2);
        assert_eq!(summary.count(OutcomeKind::Failure), 1);
        assert_eq!(summary.count(OutcomeKind::Ambiguous), 1);
        assert_eq!(summary.count(OutcomeKind::Timeout), 0);
        assert_eq!(summary.total_duration, Duration::from_millis(8000));
        assert_eq!(summary.mean_duration, Some(Duration::from_millis(2000)));
        assert_eq!(summary.success_rate, Some(0.5));
        assert!(!summary.all_passed());
    }

    #[test]
    fn test_render_text_guards_empty_rate() {
        let text = render_text(&[], &summarize(&[]));
        assert!(text.contains("0 run(s)"));
        assert!(text.contains("Success rate: n/a"));

        let records = vec![record("account-login", Outcome::Timeout, 1500)];
        let text = render_text(&records, &summarize(&records));
        assert!(text.contains("[FAIL] account-login (timeout)"));
        assert!(text.contains("Success rate: 0.0%"));
    }

    #[test]
    fn test_summary_serializes_missing_rate_as_null() {
        let json = serde_json::to_value(summarize(&[])).unwrap();
        assert!(json["success_rate"].is_null());
        assert!(json["mean_duration"].is_null());
    }
}
