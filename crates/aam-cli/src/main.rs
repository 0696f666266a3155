//! `aam-synth`: synthesize one instance of a persisted active appearance
//! model and write a JSON report (and optionally a PNG).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};

use aam::{run_synthesis, AamIoError, CallableRegistry, SynthesisConfig};

#[cfg(not(feature = "tracing"))]
use log::LevelFilter;

#[derive(Parser, Debug)]
#[command(name = "aam-synth", version, about = "Synthesize an AAM instance")]
struct Cli {
    /// JSON synthesis request.
    #[arg(long)]
    config: PathBuf,
    /// Pyramid level; negative values count from the finest level.
    #[arg(long, allow_negative_numbers = true)]
    level: Option<isize>,
    /// Draw random weights instead of the configured ones.
    #[arg(long)]
    random: bool,
    /// Seed for `--random`.
    #[arg(long)]
    seed: Option<u64>,
    /// Write the instance as an 8-bit image.
    #[arg(long)]
    image: Option<PathBuf>,
    /// Report path (overrides the config).
    #[arg(long)]
    report: Option<PathBuf>,
    /// More logging; repeat for debug and trace.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Io(#[from] AamIoError),
    #[error("synthesis failed: {0}")]
    Synthesis(String),
}

impl Cli {
    fn apply_overrides(&self, cfg: &mut SynthesisConfig) {
        if let Some(level) = self.level {
            cfg.level = level;
        }
        if self.random {
            cfg.random = true;
        }
        if self.seed.is_some() {
            cfg.seed = self.seed;
        }
        if let Some(image) = &self.image {
            cfg.image_path = Some(image.to_string_lossy().into_owned());
        }
        if let Some(report) = &self.report {
            cfg.report_path = Some(report.to_string_lossy().into_owned());
        }
    }
}

fn init_logging(verbose: u8) {
    #[cfg(not(feature = "tracing"))]
    {
        let level = match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };
        if let Err(err) = aam_core::init_with_level(level) {
            eprintln!("logger already installed: {err}");
        }
    }

    #[cfg(feature = "tracing")]
    {
        let _ = verbose;
        aam_core::init_tracing(false);
    }
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let mut cfg = SynthesisConfig::load_json(&cli.config)?;
    cli.apply_overrides(&mut cfg);

    #[cfg(not(feature = "image"))]
    if cfg.image_path.take().is_some() {
        log::warn!("built without the `image` feature, not writing an image");
    }

    let outcome = run_synthesis(&cfg, &CallableRegistry::default())?;
    let report_path = cfg.report_path();
    outcome.report.write_json(&report_path)?;
    log::info!("wrote report to {}", report_path.display());

    match serde_json::to_string_pretty(&outcome.report) {
        Ok(json) => println!("{json}"),
        Err(err) => log::warn!("cannot print report: {err}"),
    }

    match outcome.report.error {
        Some(msg) => Err(CliError::Synthesis(msg)),
        None => Ok(()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
