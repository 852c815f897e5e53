//! Babelbox CLI
//!
//! CLI tool for sampling random programs and executing them in a
//! bubblewrap sandbox.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use babelbox::error::{Error, Result};
use babelbox::{
    address, validate_run_operation, Alphabet, BabelConfig, BubblewrapRunner, Experiment,
    OutputRecorder, Termination,
};

/// Seed applied when neither a flag nor a config file sets one.
const DEFAULT_SEED: u64 = 1234;

#[derive(Parser)]
#[command(name = "babelbox")]
#[command(about = "Sample the Library of Babel for runnable programs", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample random programs and execute each in a sandbox
    Run(RunArgs),

    /// Reconstruct a program text from its babel address
    Decode(DecodeArgs),
}

/// Flags override config file values, which override built-in defaults.
#[derive(Args)]
struct RunArgs {
    /// Number of programs to sample [default: 100]
    #[arg(long, env = "BABELBOX_SAMPLES")]
    samples: Option<usize>,

    /// Characters per line [default: 79]
    #[arg(long)]
    line_length: Option<usize>,

    /// Total lines per program [default: 100]
    #[arg(long)]
    total_lines: Option<usize>,

    /// Minimum ASCII value, inclusive [default: 32]
    #[arg(long)]
    ascii_min: Option<u8>,

    /// Maximum ASCII value, inclusive [default: 126]
    #[arg(long)]
    ascii_max: Option<u8>,

    /// Explicit alphabet, overriding the ASCII range
    #[arg(long)]
    alphabet: Option<String>,

    /// Seed for deterministic sampling [default: 1234]
    #[arg(long)]
    seed: Option<u64>,

    /// Draw the seed from entropy instead
    #[arg(long, conflicts_with = "seed")]
    no_seed: bool,

    /// Interpreter executed inside the sandbox [default: python3]
    #[arg(long)]
    interpreter: Option<String>,

    /// Extra interpreter argument, repeatable [default: -I -S -B]
    #[arg(long, value_name = "ARG", allow_hyphen_values = true)]
    interpreter_arg: Option<Vec<String>>,

    /// Invoke the interpreter with no extra arguments
    #[arg(long, conflicts_with = "interpreter_arg")]
    no_interpreter_args: bool,

    /// Per-candidate time budget in seconds [default: 1]
    #[arg(long)]
    time_budget_secs: Option<u64>,

    /// Cap on captured bytes per output stream [default: 65536]
    #[arg(long)]
    max_output_bytes: Option<usize>,

    /// Directory for run artifacts; nothing is written when unset
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Write artifacts into a timestamped subdirectory (the default)
    #[arg(long, overrides_with = "no_versioned")]
    versioned: bool,

    /// Write artifacts directly into the output directory
    #[arg(long, overrides_with = "versioned")]
    no_versioned: bool,

    /// TOML configuration file
    #[arg(short, long, env = "BABELBOX_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct DecodeArgs {
    /// Hex babel address to decode
    address: String,

    /// Characters per line of the encoded program
    #[arg(long, default_value_t = 79)]
    line_length: usize,

    /// Total lines of the encoded program
    #[arg(long, default_value_t = 100)]
    total_lines: usize,

    /// Minimum ASCII value, inclusive
    #[arg(long, default_value_t = 32)]
    ascii_min: u8,

    /// Maximum ASCII value, inclusive
    #[arg(long, default_value_t = 126)]
    ascii_max: u8,

    /// Explicit alphabet, overriding the ASCII range
    #[arg(long)]
    alphabet: Option<String>,

    /// Print the raw text without line breaks
    #[arg(long)]
    raw: bool,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Decode(args) => decode(args),
    };

    match outcome {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Builds the effective configuration for a run.
fn effective_config(args: &RunArgs) -> Result<BabelConfig> {
    let mut config = match &args.config {
        Some(path) => BabelConfig::load(path)?,
        None => BabelConfig::default(),
    };

    if let Some(samples) = args.samples {
        config.experiment.samples = samples;
    }
    if let Some(line_length) = args.line_length {
        config.generator.line_length = line_length;
    }
    if let Some(total_lines) = args.total_lines {
        config.generator.total_lines = total_lines;
    }
    if let Some(ascii_min) = args.ascii_min {
        config.generator.ascii_min = ascii_min;
    }
    if let Some(ascii_max) = args.ascii_max {
        config.generator.ascii_max = ascii_max;
    }
    if let Some(alphabet) = &args.alphabet {
        config.generator.alphabet = Some(alphabet.clone());
    }
    if let Some(interpreter) = &args.interpreter {
        config.runner.interpreter = interpreter.clone();
    }
    if args.no_interpreter_args {
        config.runner.interpreter_args = Vec::new();
    } else if let Some(interpreter_args) = &args.interpreter_arg {
        config.runner.interpreter_args = interpreter_args.clone();
    }
    if let Some(budget) = args.time_budget_secs {
        config.runner.time_budget_secs = budget;
    }
    if let Some(cap) = args.max_output_bytes {
        config.runner.max_output_bytes = cap;
    }
    if let Some(dir) = &args.output_dir {
        config.output.dir = Some(dir.clone());
    }
    if args.no_versioned {
        config.output.versioned = false;
    } else if args.versioned {
        config.output.versioned = true;
    }

    // Runs are seeded unless --no-seed asks for entropy
    if args.no_seed {
        config.generator.seed = None;
    } else if let Some(seed) = args.seed {
        config.generator.seed = Some(seed);
    } else if config.generator.seed.is_none() {
        config.generator.seed = Some(DEFAULT_SEED);
    }

    Ok(config)
}

async fn run(args: RunArgs) -> Result<i32> {
    let config = effective_config(&args)?;

    let warnings = validate_run_operation(&config).into_result()?;
    for warning in warnings {
        tracing::warn!(warning = %warning, "configuration warning");
    }

    let recorder = OutputRecorder::create(&config.output)?;
    if let Some(recorder) = &recorder {
        tracing::info!(dir = %recorder.dir().display(), "writing artifacts");
    }

    let runner = BubblewrapRunner::new(config.runner.clone())?;
    let experiment = Experiment::new(config.experiment.clone(), config.generator.clone(), runner);

    let report = experiment.run().await?;

    if let Some(recorder) = &recorder {
        recorder.write_results(&report)?;
        recorder.write_config(&config)?;
        recorder.write_rerun(&config)?;
    }

    let heading = match &report.termination {
        Termination::Completed => "Run Complete",
        Termination::SandboxFailure(_) => "Run Aborted (sandbox failure)",
        Termination::Interrupted => "Run Interrupted",
    };

    println!("\n{}", "=".repeat(60));
    println!("{}: {}", heading, report.run_id);
    println!("{}", "=".repeat(60));
    println!();
    if let Termination::SandboxFailure(reason) = &report.termination {
        println!("Failure: {}", reason);
        println!();
    }
    println!("Summary:");
    println!("  {}", report.summary);
    println!("Duration: {:?}", report.duration);

    if !report.hits.is_empty() {
        println!();
        println!("Runnable addresses:");
        for hit in &report.hits {
            println!("  {}", hit.address);
        }
    }

    if let Some(recorder) = &recorder {
        println!();
        println!("Artifacts: {}", recorder.dir().display());
    }

    Ok(if report.completed() { 0 } else { 1 })
}

fn decode(args: DecodeArgs) -> Result<i32> {
    let alphabet = match &args.alphabet {
        Some(chars) => Alphabet::from_chars(chars)?,
        None => Alphabet::ascii_range(args.ascii_min, args.ascii_max)?,
    };

    let length = args.line_length.checked_mul(args.total_lines).ok_or_else(|| {
        Error::Config(format!(
            "program length overflows: {} lines of {} characters each",
            args.total_lines, args.line_length
        ))
    })?;
    if length == 0 {
        return Err(Error::Config(
            "line_length and total_lines must both be at least 1".to_string(),
        ));
    }

    let text = address::decode(&args.address, length, &alphabet)?;
    if args.raw {
        println!("{}", text);
    } else {
        println!("{}", address::format_lines(&text, args.line_length));
    }

    Ok(0)
}
