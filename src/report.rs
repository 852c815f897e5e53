//! Run summaries and reports.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::runner::{ExecStatus, ExecutionResult};
use crate::sampler::Candidate;

/// Aggregate tally over a batch of candidates.
///
/// Counts always sum to the number of candidates fully processed; a
/// candidate in flight when the run is aborted is not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Candidates whose interpreter exited with status zero.
    pub success: usize,
    /// Candidates whose interpreter reported an error.
    pub runtime_error: usize,
    /// Candidates terminated at the time budget.
    pub timeout: usize,
}

impl RunSummary {
    /// Records one execution outcome.
    pub fn record(&mut self, status: ExecStatus) {
        match status {
            ExecStatus::Success => self.success += 1,
            ExecStatus::RuntimeError => self.runtime_error += 1,
            ExecStatus::Timeout => self.timeout += 1,
        }
    }

    /// Total candidates processed.
    pub fn total(&self) -> usize {
        self.success + self.runtime_error + self.timeout
    }

    /// Percentage of processed candidates that were runnable.
    ///
    /// An empty batch is 0% runnable: nothing ran, so nothing is runnable.
    pub fn runnable_percentage(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.success as f64 / total as f64) * 100.0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} sampled: {} runnable ({:.2}%), {} runtime errors, {} timeouts",
            self.total(),
            self.success,
            self.runnable_percentage(),
            self.runtime_error,
            self.timeout
        )
    }
}

/// A runnable candidate retained for the record.
///
/// Carries everything needed to re-materialize and re-judge the candidate:
/// the address recovers the text, the rest is the observed outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitRecord {
    /// Babel address of the candidate text.
    pub address: String,
    /// Generation index within the run.
    pub index: usize,
    /// Process exit code.
    pub exit_code: Option<i32>,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
    /// Wall-clock duration in seconds.
    pub duration_secs: f64,
}

impl HitRecord {
    /// Builds a record from a candidate and its execution result.
    pub fn new(candidate: &Candidate, result: &ExecutionResult) -> Self {
        Self {
            address: candidate.address().to_string(),
            index: candidate.index(),
            exit_code: result.exit_code,
            stdout: result.stdout.clone(),
            stderr: result.stderr.clone(),
            duration_secs: result.duration.as_secs_f64(),
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The full batch was processed.
    Completed,
    /// The isolation layer failed; the batch was aborted.
    SandboxFailure(String),
    /// The operator interrupted the run.
    Interrupted,
}

/// Full outcome of one experiment run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique identifier for this run.
    pub run_id: String,
    /// Aggregate tally.
    pub summary: RunSummary,
    /// Retained runnable candidates.
    pub hits: Vec<HitRecord>,
    /// How the run ended.
    pub termination: Termination,
    /// Total wall-clock duration of the batch.
    pub duration: Duration,
}

impl RunReport {
    /// Whether the full batch was processed.
    pub fn completed(&self) -> bool {
        self.termination == Termination::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_starts_empty() {
        let summary = RunSummary::default();
        assert_eq!(summary.total(), 0);
        assert_eq!(summary.runnable_percentage(), 0.0);
    }

    #[test]
    fn summary_records_each_status() {
        let mut summary = RunSummary::default();
        summary.record(ExecStatus::Success);
        summary.record(ExecStatus::RuntimeError);
        summary.record(ExecStatus::RuntimeError);
        summary.record(ExecStatus::Timeout);

        assert_eq!(summary.success, 1);
        assert_eq!(summary.runtime_error, 2);
        assert_eq!(summary.timeout, 1);
        assert_eq!(summary.total(), 4);
        assert_eq!(summary.runnable_percentage(), 25.0);
    }

    #[test]
    fn summary_display_is_human_readable() {
        let mut summary = RunSummary::default();
        summary.record(ExecStatus::Success);
        summary.record(ExecStatus::Timeout);

        let text = summary.to_string();
        assert!(text.contains("2 sampled"));
        assert!(text.contains("1 runnable"));
        assert!(text.contains("50.00%"));
        assert!(text.contains("1 timeouts"));
    }

    #[test]
    fn hit_record_serializes_expected_fields() {
        let record = HitRecord {
            address: "e13".to_string(),
            index: 7,
            exit_code: Some(0),
            stdout: "out".to_string(),
            stderr: String::new(),
            duration_secs: 0.25,
        };

        let json: serde_json::Value = serde_json::to_value(&record).unwrap();
        let object = json.as_object().unwrap();

        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "address",
                "duration_secs",
                "exit_code",
                "index",
                "stderr",
                "stdout"
            ]
        );
        assert_eq!(object["address"], "e13");
        assert_eq!(object["index"], 7);
    }

    #[test]
    fn termination_serializes_correctly() {
        assert_eq!(
            serde_json::to_string(&Termination::Completed).unwrap(),
            "\"completed\""
        );
        assert_eq!(
            serde_json::to_string(&Termination::Interrupted).unwrap(),
            "\"interrupted\""
        );
        assert_eq!(
            serde_json::to_string(&Termination::SandboxFailure("bwrap died".to_string())).unwrap(),
            "{\"sandbox_failure\":\"bwrap died\"}"
        );
    }

    #[test]
    fn report_completed_tracks_termination() {
        let report = RunReport {
            run_id: "test".to_string(),
            summary: RunSummary::default(),
            hits: vec![],
            termination: Termination::Completed,
            duration: Duration::from_secs(1),
        };
        assert!(report.completed());

        let aborted = RunReport {
            termination: Termination::SandboxFailure("gone".to_string()),
            ..report
        };
        assert!(!aborted.completed());
    }
}
