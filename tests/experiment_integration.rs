//! Integration tests for the experiment loop and artifact output.
//!
//! These tests use a scripted in-process runner, suitable for CI.

use std::collections::VecDeque;
use std::io;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;

use babelbox::error::Result;
use babelbox::{
    address, Alphabet, BabelConfig, Error, ExecStatus, ExecutionResult, Experiment,
    ExperimentConfig, GeneratorConfig, OutputConfig, OutputRecorder, Sampler, SandboxRunner,
    Termination,
};

/// Outcome the scripted runner produces for one execution.
enum Outcome {
    Status(ExecStatus),
    Fail(String),
    /// Signal that the execution started, then never complete.
    Hang(oneshot::Sender<()>),
}

/// Runner that replays a fixed script of outcomes.
///
/// Executions beyond the end of the script report a runtime error.
struct ScriptedRunner {
    script: Mutex<VecDeque<Outcome>>,
}

impl ScriptedRunner {
    fn new(script: Vec<Outcome>) -> Self {
        Self {
            script: Mutex::new(script.into()),
        }
    }
}

#[async_trait]
impl SandboxRunner for ScriptedRunner {
    async fn execute(&self, _program: &str) -> Result<ExecutionResult> {
        let outcome = self.script.lock().expect("script lock poisoned").pop_front();

        match outcome {
            Some(Outcome::Fail(reason)) => Err(Error::Sandbox(reason)),
            Some(Outcome::Status(status)) => Ok(result_with(status)),
            Some(Outcome::Hang(started)) => {
                let _ = started.send(());
                std::future::pending().await
            }
            None => Ok(result_with(ExecStatus::RuntimeError)),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn result_with(status: ExecStatus) -> ExecutionResult {
    let exit_code = match status {
        ExecStatus::Success => Some(0),
        ExecStatus::RuntimeError => Some(1),
        ExecStatus::Timeout => None,
    };
    ExecutionResult {
        status,
        exit_code,
        stdout: String::new(),
        stderr: String::new(),
        duration: Duration::from_millis(1),
    }
}

/// Four-character binary programs keep addresses short and decodable by hand.
fn tiny_generator() -> GeneratorConfig {
    GeneratorConfig::new()
        .with_line_length(4)
        .with_total_lines(1)
        .with_alphabet("01")
        .with_seed(7)
}

#[tokio::test]
async fn report_counts_every_outcome() {
    let runner = ScriptedRunner::new(vec![
        Outcome::Status(ExecStatus::Success),
        Outcome::Status(ExecStatus::RuntimeError),
        Outcome::Status(ExecStatus::Timeout),
        Outcome::Status(ExecStatus::RuntimeError),
    ]);
    let experiment = Experiment::new(ExperimentConfig { samples: 4 }, tiny_generator(), runner);

    let report = experiment.run().await.expect("run failed");

    assert_eq!(report.termination, Termination::Completed);
    assert!(report.completed());
    assert_eq!(report.summary.success, 1);
    assert_eq!(report.summary.runtime_error, 2);
    assert_eq!(report.summary.timeout, 1);
    assert_eq!(report.summary.total(), 4);
    assert_eq!(report.hits.len(), 1);
}

#[tokio::test]
async fn hit_addresses_reconstruct_program_text() {
    let runner = ScriptedRunner::new(vec![
        Outcome::Status(ExecStatus::Success),
        Outcome::Status(ExecStatus::Success),
    ]);
    let generator = tiny_generator();
    let experiment = Experiment::new(ExperimentConfig { samples: 2 }, generator.clone(), runner);

    let report = experiment.run().await.expect("run failed");
    assert_eq!(report.hits.len(), 2);

    // A fresh sampler with the same seed yields the texts the addresses encode
    let expected: Vec<String> = Sampler::new(&generator, 2)
        .expect("sampler")
        .map(|c| c.text().to_string())
        .collect();

    let alphabet = Alphabet::from_chars("01").expect("alphabet");
    for (hit, text) in report.hits.iter().zip(&expected) {
        let decoded = address::decode(&hit.address, 4, &alphabet).expect("decode failed");
        assert_eq!(&decoded, text);
    }
}

#[tokio::test]
async fn sandbox_failure_aborts_batch() {
    let runner = ScriptedRunner::new(vec![
        Outcome::Status(ExecStatus::RuntimeError),
        Outcome::Fail("bwrap exploded".to_string()),
    ]);
    let experiment = Experiment::new(ExperimentConfig { samples: 10 }, tiny_generator(), runner);

    let report = experiment.run().await.expect("run failed");

    assert!(!report.completed());
    assert_eq!(
        report.termination,
        Termination::SandboxFailure("sandbox failure: bwrap exploded".to_string())
    );
    // Only the candidate processed before the failure is counted
    assert_eq!(report.summary.total(), 1);
    assert_eq!(report.summary.runtime_error, 1);
}

#[tokio::test]
async fn seeded_runs_reproduce_hit_addresses() {
    let mut runs = Vec::new();
    for _ in 0..2 {
        let runner = ScriptedRunner::new(vec![
            Outcome::Status(ExecStatus::Success),
            Outcome::Status(ExecStatus::Success),
            Outcome::Status(ExecStatus::Success),
        ]);
        let experiment = Experiment::new(ExperimentConfig { samples: 3 }, tiny_generator(), runner);
        let report = experiment.run().await.expect("run failed");
        let addresses: Vec<String> = report.hits.iter().map(|h| h.address.clone()).collect();
        runs.push(addresses);
    }

    assert_eq!(runs[0].len(), 3);
    assert_eq!(runs[0], runs[1]);
}

#[tokio::test]
async fn interrupt_ends_batch_with_partial_report() {
    let (started, hung) = oneshot::channel();
    let runner = ScriptedRunner::new(vec![
        Outcome::Status(ExecStatus::Success),
        Outcome::Hang(started),
    ]);
    let experiment = Experiment::new(ExperimentConfig { samples: 5 }, tiny_generator(), runner);

    // Fires once the second execution is in flight
    let interrupt = async move {
        hung.await.expect("hanging execution never started");
        Ok::<(), io::Error>(())
    };
    let report = experiment
        .run_with_interrupt(interrupt)
        .await
        .expect("run failed");

    assert_eq!(report.termination, Termination::Interrupted);
    assert!(!report.completed());
    // Only the candidate finished before the interrupt is counted
    assert_eq!(report.summary.total(), 1);
    assert_eq!(report.summary.success, 1);
    assert_eq!(report.hits.len(), 1);
}

#[tokio::test]
async fn failed_interrupt_install_does_not_stop_batch() {
    let runner = ScriptedRunner::new(vec![
        Outcome::Status(ExecStatus::Success),
        Outcome::Status(ExecStatus::RuntimeError),
        Outcome::Status(ExecStatus::Success),
    ]);
    let experiment = Experiment::new(ExperimentConfig { samples: 3 }, tiny_generator(), runner);

    // A source that cannot install reads as "no interrupt", not an instant one
    let interrupt: std::future::Ready<io::Result<()>> = std::future::ready(Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "signal handler unavailable",
    )));
    let report = experiment
        .run_with_interrupt(interrupt)
        .await
        .expect("run failed");

    assert_eq!(report.termination, Termination::Completed);
    assert_eq!(report.summary.total(), 3);
    assert_eq!(report.summary.success, 2);
}

#[tokio::test]
async fn zero_samples_completes_empty() {
    let runner = ScriptedRunner::new(Vec::new());
    let experiment = Experiment::new(ExperimentConfig { samples: 0 }, tiny_generator(), runner);

    let report = experiment.run().await.expect("run failed");

    assert!(report.completed());
    assert_eq!(report.summary.total(), 0);
    assert_eq!(report.summary.runnable_percentage(), 0.0);
    assert!(report.hits.is_empty());
}

#[tokio::test]
async fn recorder_persists_run_artifacts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = BabelConfig::default();
    config.generator = tiny_generator();
    config.experiment.samples = 2;
    config.output = OutputConfig {
        dir: Some(dir.path().to_path_buf()),
        versioned: false,
    };

    let runner = ScriptedRunner::new(vec![
        Outcome::Status(ExecStatus::Success),
        Outcome::Status(ExecStatus::RuntimeError),
    ]);
    let experiment = Experiment::new(config.experiment.clone(), config.generator.clone(), runner);
    let report = experiment.run().await.expect("run failed");

    let recorder = OutputRecorder::create(&config.output)
        .expect("recorder")
        .expect("dir configured");
    recorder.write_results(&report).expect("write results");
    recorder.write_config(&config).expect("write config");
    recorder.write_rerun(&config).expect("write rerun");

    let results = std::fs::read_to_string(dir.path().join("results.jsonl")).expect("read results");
    let lines: Vec<&str> = results.lines().collect();
    assert_eq!(lines.len(), 1);
    let hit: serde_json::Value = serde_json::from_str(lines[0]).expect("parse hit");
    assert!(hit.get("address").is_some());
    assert_eq!(hit.get("exit_code").and_then(|v| v.as_i64()), Some(0));

    let config_json = std::fs::read_to_string(dir.path().join("config.json")).expect("read config");
    let parsed: serde_json::Value = serde_json::from_str(&config_json).expect("parse config");
    assert_eq!(
        parsed.pointer("/experiment/samples").and_then(|v| v.as_u64()),
        Some(2)
    );

    let rerun = std::fs::read_to_string(dir.path().join("rerun.txt")).expect("read rerun");
    assert!(rerun.starts_with("babelbox run "));
    assert!(rerun.contains("--samples 2"));
    assert!(rerun.contains("--alphabet 01"));
    assert!(rerun.contains("--seed 7"));
    assert!(rerun.ends_with('\n'));
}
