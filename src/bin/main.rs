//! Marginalia CLI - keep schema annotation blocks in model files current
//!
//! Usage:
//!   marginalia annotate [--config <file>] [--model <name>]... [--jobs <n>]
//!   marginalia check [--config <file>] [--model <name>]...
//!   marginalia remove [--config <file>] [--model <name>]...
//!   marginalia config [--config <file>]
//!
//! Examples:
//!   marginalia annotate --config marginalia.toml
//!   marginalia annotate --model User --model Order --jobs 4
//!   marginalia check

use clap::{Parser, Subcommand};
use marginalia::config::{Settings, SettingsError};
use marginalia::report::BatchReport;
use marginalia::runner::BatchRunner;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "marginalia")]
#[command(about = "Marginalia - schema annotation blocks for model source files")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write annotation blocks into every model file
    Annotate {
        /// Path to the configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Annotate only the named model (repeatable)
        #[arg(short, long)]
        model: Vec<String>,

        /// Worker threads (overrides the configured value)
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Stop on the first provider or introspection failure
        #[arg(long)]
        fail_fast: bool,
    },

    /// Report which files are out of date without writing anything
    Check {
        /// Path to the configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Check only the named model (repeatable)
        #[arg(short, long)]
        model: Vec<String>,

        /// Worker threads (overrides the configured value)
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Strip annotation blocks from every model file
    Remove {
        /// Path to the configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Strip only the named model (repeatable)
        #[arg(short, long)]
        model: Vec<String>,
    },

    /// Print the resolved configuration with connection URLs redacted
    Config {
        /// Path to the configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Annotate {
            config,
            model,
            jobs,
            fail_fast,
        } => cmd_annotate(config, model, jobs, fail_fast),
        Commands::Check {
            config,
            model,
            jobs,
        } => cmd_check(config, model, jobs),
        Commands::Remove { config, model } => cmd_remove(config, model),
        Commands::Config { config } => cmd_config(config),
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn load_settings(config: Option<PathBuf>) -> Result<Settings, SettingsError> {
    match config {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    }
}

fn cmd_annotate(
    config: Option<PathBuf>,
    models: Vec<String>,
    jobs: Option<usize>,
    fail_fast: bool,
) -> ExitCode {
    let mut settings = match load_settings(config) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if fail_fast {
        settings.annotation.fail_fast = true;
    }

    let mut runner = BatchRunner::new(settings).only_models(models);
    if let Some(jobs) = jobs {
        runner = runner.jobs(jobs);
    }

    match runner.annotate_all() {
        Ok(report) => {
            print_report(&report);
            if report.has_failures() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_check(config: Option<PathBuf>, models: Vec<String>, jobs: Option<usize>) -> ExitCode {
    let settings = match load_settings(config) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut runner = BatchRunner::new(settings).only_models(models);
    if let Some(jobs) = jobs {
        runner = runner.jobs(jobs);
    }

    match runner.check_all() {
        Ok(report) => {
            print_report(&report);
            if report.has_failures() || report.would_change() > 0 {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_remove(config: Option<PathBuf>, models: Vec<String>) -> ExitCode {
    let settings = match load_settings(config) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match BatchRunner::new(settings).only_models(models).remove_all() {
        Ok(report) => {
            print_report(&report);
            if report.has_failures() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_config(config: Option<PathBuf>) -> ExitCode {
    let settings = match load_settings(config) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match toml::to_string_pretty(&settings.redacted()) {
        Ok(rendered) => {
            println!("{}", rendered);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to render configuration: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_report(report: &BatchReport) {
    for run in &report.runs {
        match run.outcome.detail() {
            Some(detail) => println!("{:<12} {} ({})", run.outcome.label(), run.model, detail),
            None => println!("{:<12} {}", run.outcome.label(), run.model),
        }
        for failure in &run.provider_failures {
            println!("             provider degraded: {}", failure);
        }
    }
    for failure in &report.introspection_failures {
        println!("             introspection degraded: {}", failure);
    }
    if !report.runs.is_empty() {
        println!();
    }
    println!("{}", report.summary());
}
