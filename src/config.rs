//! Configuration loading and validation for run operations.
//!
//! Validates configuration before a run starts to catch errors early.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::experiment::ExperimentConfig;
use crate::recorder::OutputConfig;
use crate::runner::RunnerConfig;
use crate::sampler::GeneratorConfig;

/// Program lengths above this draw a slow-run warning.
const LARGE_PROGRAM_LENGTH: usize = 100_000;

/// Batch sizes above this draw a slow-run warning.
const LARGE_BATCH: usize = 100_000;

/// Validation result containing all found issues.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// List of validation errors (fatal).
    pub errors: Vec<String>,
    /// List of validation warnings (non-fatal).
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Adds an error to the result.
    pub fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    /// Adds a warning to the result.
    pub fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    /// Merges another validation result into this one.
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Converts to a Result, failing if there are errors.
    pub fn into_result(self) -> Result<Vec<String>> {
        if self.is_valid() {
            Ok(self.warnings)
        } else {
            Err(Error::Config(self.errors.join("; ")))
        }
    }
}

/// Trait for validatable configuration types.
pub trait Validate {
    /// Validates the configuration and returns any issues found.
    fn validate(&self) -> ValidationResult;
}

impl Validate for GeneratorConfig {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.line_length == 0 {
            result.add_error("line_length must be at least 1");
        }

        if self.total_lines == 0 {
            result.add_error("total_lines must be at least 1");
        }

        // An explicit alphabet overrides the ASCII range entirely
        match &self.alphabet {
            Some(alphabet) => {
                if alphabet.is_empty() {
                    result.add_error("alphabet cannot be empty");
                }
            }
            None => {
                if self.ascii_min > self.ascii_max {
                    result.add_error(format!(
                        "ascii_min ({}) must not exceed ascii_max ({})",
                        self.ascii_min, self.ascii_max
                    ));
                }
            }
        }

        match self.program_length() {
            Some(length) if length > LARGE_PROGRAM_LENGTH => {
                result.add_warning(format!(
                    "program length over {} characters may make runs very slow",
                    LARGE_PROGRAM_LENGTH
                ));
            }
            None => {
                result.add_error(format!(
                    "program length overflows: {} lines of {} characters each",
                    self.total_lines, self.line_length
                ));
            }
            Some(_) => {}
        }

        result
    }
}

impl Validate for RunnerConfig {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.interpreter.trim().is_empty() {
            result.add_error("interpreter cannot be empty");
        }

        if self.time_budget_secs == 0 {
            result.add_error("time_budget_secs must be at least 1");
        }

        // Warn if the budget is very long
        if self.time_budget_secs > 300 {
            result.add_warning("time_budget_secs over 5 minutes may make large batches very slow");
        }

        if self.max_output_bytes == 0 {
            result.add_warning("max_output_bytes = 0 discards all captured output");
        }

        result
    }
}

impl Validate for ExperimentConfig {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        // Zero samples is a legal empty batch
        if self.samples > LARGE_BATCH {
            result.add_warning(format!(
                "samples over {} may take a very long time",
                LARGE_BATCH
            ));
        }

        result
    }
}

/// Complete configuration for a run, as loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BabelConfig {
    /// Candidate generation settings.
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Sandbox execution settings.
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Batch settings.
    #[serde(default)]
    pub experiment: ExperimentConfig,

    /// Artifact output settings.
    #[serde(default)]
    pub output: OutputConfig,
}

impl BabelConfig {
    /// Loads configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(Error::Io)?;

        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))
    }
}

/// Validates all configuration for a run operation.
pub fn validate_run_operation(config: &BabelConfig) -> ValidationResult {
    let mut result = ValidationResult::default();
    result.merge(config.generator.validate());
    result.merge(config.runner.validate());
    result.merge(config.experiment.validate());
    result
}
