//! Run artifact output.
//!
//! A run can persist three artifacts into its output directory: the
//! runnable hits (`results.jsonl`), the effective configuration
//! (`config.json`), and a shell command reproducing the run
//! (`rerun.txt`).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::BabelConfig;
use crate::error::{Error, Result};
use crate::report::RunReport;

/// Configuration for run artifact output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Base directory for run artifacts. Nothing is written when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Place each run's artifacts in a timestamped subdirectory.
    #[serde(default = "default_versioned")]
    pub versioned: bool,
}

fn default_versioned() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: None,
            versioned: default_versioned(),
        }
    }
}

/// Writes run artifacts into a per-run directory.
pub struct OutputRecorder {
    dir: PathBuf,
}

impl OutputRecorder {
    /// Creates the output directory for a run.
    ///
    /// Returns `None` when no base directory is configured. With versioning
    /// enabled each run writes into a timestamped subdirectory of the base,
    /// so repeated runs never clobber each other's artifacts.
    pub fn create(config: &OutputConfig) -> Result<Option<Self>> {
        let Some(base) = &config.dir else {
            return Ok(None);
        };

        let dir = if config.versioned {
            let stamp = chrono::Local::now().format("%Y-%m-%dT%H.%M.%S").to_string();
            base.join(stamp)
        } else {
            base.clone()
        };
        fs::create_dir_all(&dir)?;

        Ok(Some(Self { dir }))
    }

    /// The directory artifacts are written into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes the runnable hits to `results.jsonl`, one JSON object per line.
    pub fn write_results(&self, report: &RunReport) -> Result<()> {
        let mut lines = String::new();
        for hit in &report.hits {
            let line = serde_json::to_string(hit)
                .map_err(|e| Error::Config(format!("failed to serialize hit record: {}", e)))?;
            lines.push_str(&line);
            lines.push('\n');
        }

        let path = self.dir.join("results.jsonl");
        fs::write(&path, lines)?;
        tracing::info!(path = %path.display(), hits = report.hits.len(), "wrote results");
        Ok(())
    }

    /// Writes the effective run configuration to `config.json`.
    pub fn write_config(&self, config: &BabelConfig) -> Result<()> {
        let json = serde_json::to_string_pretty(config)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        let path = self.dir.join("config.json");
        fs::write(&path, json)?;
        tracing::info!(path = %path.display(), "wrote config");
        Ok(())
    }

    /// Writes a command line reproducing the run to `rerun.txt`.
    pub fn write_rerun(&self, config: &BabelConfig) -> Result<()> {
        let path = self.dir.join("rerun.txt");
        fs::write(&path, format!("{}\n", rerun_command(config)))?;
        tracing::info!(path = %path.display(), "wrote rerun command");
        Ok(())
    }
}

/// Builds a `babelbox run` invocation equivalent to the given configuration.
///
/// The seed is always stated explicitly (`--seed N` or `--no-seed`) so the
/// command reproduces the run byte for byte when it was seeded.
pub fn rerun_command(config: &BabelConfig) -> String {
    let mut parts: Vec<String> = vec!["babelbox".into(), "run".into()];

    parts.push("--samples".into());
    parts.push(config.experiment.samples.to_string());
    parts.push("--line-length".into());
    parts.push(config.generator.line_length.to_string());
    parts.push("--total-lines".into());
    parts.push(config.generator.total_lines.to_string());

    if let Some(alphabet) = &config.generator.alphabet {
        parts.push("--alphabet".into());
        parts.push(shell_quote(alphabet));
    } else {
        parts.push("--ascii-min".into());
        parts.push(config.generator.ascii_min.to_string());
        parts.push("--ascii-max".into());
        parts.push(config.generator.ascii_max.to_string());
    }

    parts.push("--interpreter".into());
    parts.push(shell_quote(&config.runner.interpreter));
    if config.runner.interpreter_args.is_empty() {
        parts.push("--no-interpreter-args".into());
    } else {
        for arg in &config.runner.interpreter_args {
            parts.push("--interpreter-arg".into());
            parts.push(shell_quote(arg));
        }
    }
    parts.push("--time-budget-secs".into());
    parts.push(config.runner.time_budget_secs.to_string());
    parts.push("--max-output-bytes".into());
    parts.push(config.runner.max_output_bytes.to_string());

    if let Some(dir) = &config.output.dir {
        parts.push("--output-dir".into());
        parts.push(shell_quote(&dir.display().to_string()));
        let versioned = if config.output.versioned {
            "--versioned"
        } else {
            "--no-versioned"
        };
        parts.push(versioned.into());
    }

    match config.generator.seed {
        Some(seed) => {
            parts.push("--seed".into());
            parts.push(seed.to_string());
        }
        None => parts.push("--no-seed".into()),
    }

    parts.join(" ")
}

/// Quotes a string for POSIX shells. Strings of safe characters pass
/// through unchanged; anything else is single-quoted.
fn shell_quote(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }
    let safe = s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "@%+=:,./_-".contains(c));
    if safe {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r#"'"'"'"#))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_config_has_sensible_defaults() {
        let config = OutputConfig::default();
        assert!(config.dir.is_none());
        assert!(config.versioned);
    }

    #[test]
    fn create_returns_none_without_dir() {
        let recorder = OutputRecorder::create(&OutputConfig::default()).unwrap();
        assert!(recorder.is_none());
    }

    #[test]
    fn unversioned_recorder_writes_into_base_dir() {
        let base = tempfile::tempdir().unwrap();
        let config = OutputConfig {
            dir: Some(base.path().to_path_buf()),
            versioned: false,
        };

        let recorder = OutputRecorder::create(&config).unwrap().unwrap();
        assert_eq!(recorder.dir(), base.path());
    }

    #[test]
    fn versioned_recorder_creates_timestamped_subdirectory() {
        let base = tempfile::tempdir().unwrap();
        let config = OutputConfig {
            dir: Some(base.path().to_path_buf()),
            versioned: true,
        };

        let recorder = OutputRecorder::create(&config).unwrap().unwrap();
        assert_eq!(recorder.dir().parent(), Some(base.path()));
        assert!(recorder.dir().is_dir());
    }

    #[test]
    fn rerun_command_states_every_knob() {
        let command = rerun_command(&BabelConfig::default());

        assert!(command.starts_with("babelbox run "));
        assert!(command.contains("--samples 100"));
        assert!(command.contains("--line-length 79"));
        assert!(command.contains("--total-lines 100"));
        assert!(command.contains("--ascii-min 32"));
        assert!(command.contains("--ascii-max 126"));
        assert!(command.contains("--interpreter python3"));
        assert!(command.contains("--interpreter-arg -I --interpreter-arg -S --interpreter-arg -B"));
        assert!(command.contains("--time-budget-secs 1"));
        assert!(command.contains("--max-output-bytes 65536"));
        assert!(command.contains("--no-seed"));
        assert!(!command.contains("--output-dir"));
    }

    #[test]
    fn rerun_command_reproduces_custom_interpreter_args() {
        let mut config = BabelConfig::default();
        config.runner.interpreter_args = vec!["-X".to_string(), "utf8".to_string()];

        let command = rerun_command(&config);
        assert!(command.contains("--interpreter-arg -X --interpreter-arg utf8"));
        assert!(!command.contains("--interpreter-arg -I"));

        config.runner.interpreter_args.clear();
        let command = rerun_command(&config);
        assert!(command.contains("--no-interpreter-args"));
        assert!(!command.contains("--interpreter-arg "));
    }

    #[test]
    fn rerun_command_prefers_explicit_alphabet() {
        let mut config = BabelConfig::default();
        config.generator.alphabet = Some("ab c".to_string());
        config.generator.seed = Some(42);

        let command = rerun_command(&config);
        assert!(command.contains("--alphabet 'ab c'"));
        assert!(!command.contains("--ascii-min"));
        assert!(command.contains("--seed 42"));
        assert!(!command.contains("--no-seed"));
    }

    #[test]
    fn rerun_command_includes_output_dir() {
        let mut config = BabelConfig::default();
        config.output.dir = Some(PathBuf::from("runs/out dir"));
        config.output.versioned = false;

        let command = rerun_command(&config);
        assert!(command.contains("--output-dir 'runs/out dir'"));
        assert!(command.contains("--no-versioned"));
    }

    #[test]
    fn shell_quote_passes_safe_strings_through() {
        assert_eq!(shell_quote("python3"), "python3");
        assert_eq!(shell_quote("/usr/bin/python3"), "/usr/bin/python3");
    }

    #[test]
    fn shell_quote_wraps_unsafe_strings() {
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), r#"'it'"'"'s'"#);
    }
}
