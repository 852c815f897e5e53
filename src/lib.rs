//! Babelbox - sampling the Library of Babel for runnable programs
//!
//! This library generates random candidate programs from a configurable
//! alphabet, executes each one in a bubblewrap sandbox under a time budget,
//! and reports how many of them an interpreter accepts. Every candidate
//! carries a babel address from which its text can be reconstructed.

pub mod address;
pub mod alphabet;
pub mod config;
pub mod error;
pub mod experiment;
pub mod recorder;
pub mod report;
pub mod runner;
pub mod sampler;

pub use error::Error;
pub use alphabet::Alphabet;
pub use experiment::{Experiment, ExperimentConfig};
pub use recorder::{rerun_command, OutputConfig, OutputRecorder};
pub use report::{HitRecord, RunReport, RunSummary, Termination};
pub use runner::{BubblewrapRunner, ExecStatus, ExecutionResult, RunnerConfig, SandboxRunner};
pub use sampler::{Candidate, GeneratorConfig, Sampler};

pub use config::{validate_run_operation, BabelConfig, Validate, ValidationResult};
