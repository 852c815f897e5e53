//! The sampling experiment loop.
//!
//! Drives a batch sequentially: sample a candidate, execute it in the
//! sandbox, tally the outcome, retain runnable hits. One candidate's
//! execution completes before the next starts.

use std::future::Future;
use std::io;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::report::{HitRecord, RunReport, RunSummary, Termination};
use crate::runner::SandboxRunner;
use crate::sampler::{GeneratorConfig, Sampler};

/// Configuration for an experiment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Number of random programs to sample.
    #[serde(default = "default_samples")]
    pub samples: usize,
}

fn default_samples() -> usize {
    100
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            samples: default_samples(),
        }
    }
}

/// Drives a batch of sandboxed executions over sampled candidates.
pub struct Experiment<R: SandboxRunner> {
    config: ExperimentConfig,
    generator: GeneratorConfig,
    runner: R,
}

impl<R: SandboxRunner> Experiment<R> {
    /// Creates an experiment.
    pub fn new(config: ExperimentConfig, generator: GeneratorConfig, runner: R) -> Self {
        Self {
            config,
            generator,
            runner,
        }
    }

    /// Runs the batch to completion, sandbox-failure abort, or ctrl-c.
    pub async fn run(&self) -> Result<RunReport> {
        self.run_with_interrupt(tokio::signal::ctrl_c()).await
    }

    /// Runs the batch, stopping early when `interrupt` resolves.
    ///
    /// [`run`](Self::run) passes ctrl-c here; embedders can supply their own
    /// shutdown signal. An interrupt stops the batch between candidates; the
    /// in-flight execution is dropped, which kills its sandbox process. An
    /// interrupt source that fails to install is logged and disarmed, and
    /// the batch runs to completion. Any runner error aborts the batch and
    /// is reported as the termination cause. In every case the returned
    /// report covers exactly the candidates fully processed.
    pub async fn run_with_interrupt<F>(&self, interrupt: F) -> Result<RunReport>
    where
        F: Future<Output = io::Result<()>>,
    {
        let run_id = uuid::Uuid::new_v4().to_string();
        let sampler = Sampler::new(&self.generator, self.config.samples)?;

        tracing::info!(
            run_id = %run_id,
            samples = self.config.samples,
            program_length = sampler.program_length(),
            alphabet_size = sampler.alphabet().len(),
            runner = self.runner.name(),
            "starting experiment"
        );

        let bar = progress_bar(self.config.samples as u64);
        let start = Instant::now();

        let mut summary = RunSummary::default();
        let mut hits = Vec::new();
        let mut termination = Termination::Completed;

        let interrupt = interrupt_signal(interrupt);
        tokio::pin!(interrupt);

        for candidate in sampler {
            let outcome = tokio::select! {
                outcome = self.runner.execute(candidate.text()) => outcome,
                _ = &mut interrupt => {
                    tracing::warn!(processed = summary.total(), "interrupted; stopping batch");
                    termination = Termination::Interrupted;
                    break;
                }
            };

            match outcome {
                Ok(result) => {
                    summary.record(result.status);
                    if result.is_runnable() {
                        tracing::info!(
                            address = %candidate.address(),
                            index = candidate.index(),
                            "found runnable candidate"
                        );
                        hits.push(HitRecord::new(&candidate, &result));
                    }
                    bar.inc(1);
                }
                Err(e) => {
                    tracing::error!(error = %e, "sandbox failure; aborting batch");
                    termination = Termination::SandboxFailure(e.to_string());
                    break;
                }
            }
        }

        bar.finish_and_clear();
        let duration = start.elapsed();

        tracing::info!(
            run_id = %run_id,
            processed = summary.total(),
            hits = hits.len(),
            duration_secs = duration.as_secs_f64(),
            "experiment finished"
        );

        Ok(RunReport {
            run_id,
            summary,
            hits,
            termination,
            duration,
        })
    }

    /// The experiment configuration.
    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }
}

/// Batch progress bar; hidden automatically when stderr is not a terminal.
fn progress_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap(),
    );
    bar
}

/// Resolves only on a real interrupt. A source that fails to install is
/// logged once and never resolves, so the batch runs without interrupt
/// support instead of stopping instantly on the error.
async fn interrupt_signal<F>(interrupt: F)
where
    F: Future<Output = io::Result<()>>,
{
    if let Err(e) = interrupt.await {
        tracing::warn!(error = %e, "interrupt handler unavailable; batch cannot be stopped early");
        std::future::pending::<()>().await;
    }
}
