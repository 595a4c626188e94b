//! Command-line interface for dailybatch.
//!
//! Provides commands for running the day's catalog, listing configured
//! profiles, and showing the resolved configuration.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use crate::adapters::CommandWorker;
use crate::config::{EnvOverrides, ResolvedConfig, ENV_CONFIG};
use crate::core::{BatchRunner, DailyLog, RunLock};
use crate::domain::{Catalog, ProcessType, RunContext, RunResult, TargetDate};

/// Exit status for configuration, lock and log I/O problems
pub const SETUP_ERROR_EXIT: u8 = 2;

/// dailybatch - Fail-fast sequencer for daily batch jobs
#[derive(Parser, Debug)]
#[command(name = "dailybatch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to .dailybatch/config.yaml in this or a parent directory)
    #[arg(short, long, global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run every process type of a catalog in order, stopping at the first failure
    Run(RunArgs),

    /// List configured profiles and their process types
    Profiles,

    /// Show resolved configuration as JSON
    Config,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Date to process, YYYYMMDD or YYYY-MM-DD (defaults to today)
    #[arg(short = 'd', long)]
    pub target_date: Option<TargetDate>,

    /// Profile whose catalog to run
    #[arg(short, long, conflicts_with = "process_types")]
    pub profile: Option<String>,

    /// Explicit comma-separated process types, bypassing profiles
    #[arg(long, value_delimiter = ',')]
    pub process_types: Vec<String>,

    /// Skip process types before this one (resume after a failure)
    #[arg(long)]
    pub start_from: Option<ProcessType>,

    /// Override the log directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Print the plan without invoking the worker
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    /// Execute the CLI command, returning the process exit status
    pub async fn execute(self) -> Result<ExitCode> {
        let env = EnvOverrides::from_env();
        let config = ResolvedConfig::load(self.config.as_deref(), &env)?;

        match self.command {
            Commands::Run(args) => run_batch(&config, args).await,
            Commands::Profiles => {
                list_profiles(&config);
                Ok(ExitCode::SUCCESS)
            }
            Commands::Config => {
                show_config(&config)?;
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

/// Resolve the catalog a run should execute
pub fn resolve_catalog(config: &ResolvedConfig, args: &RunArgs) -> Result<Catalog> {
    let catalog = if args.process_types.is_empty() {
        let (name, catalog) = config.select_catalog(args.profile.as_deref())?;
        info!(profile = name, "Using profile");
        catalog.clone()
    } else {
        Catalog::from_names(&args.process_types).context("Invalid --process-types")?
    };

    match args.start_from {
        Some(ref start) => catalog
            .starting_from(start)
            .context("Invalid --start-from"),
        None => Ok(catalog),
    }
}

/// Run the catalog for one date
async fn run_batch(config: &ResolvedConfig, args: RunArgs) -> Result<ExitCode> {
    let catalog = resolve_catalog(config, &args)?;
    let target_date = args.target_date.unwrap_or_else(TargetDate::today);
    let log_dir = args.log_dir.clone().unwrap_or_else(|| config.log_dir.clone());
    let context = RunContext::new(target_date, catalog);

    if args.dry_run {
        print_plan(config, &context, &log_dir);
        return Ok(ExitCode::SUCCESS);
    }

    let _lock = RunLock::acquire(&log_dir, &context.target_date)?;
    let log = DailyLog::open(&log_dir, &context.target_date).await?;
    let log_path = log.path().to_path_buf();

    let worker = CommandWorker::new(config.worker.clone());
    let mut runner = BatchRunner::new(worker, log);
    let result = runner.run(&context).await?;

    match &result {
        RunResult::CompletedAll => {
            eprintln!(
                "[Batch {} completed: {} process types, log {}]",
                context.target_date,
                context.catalog.len(),
                log_path.display()
            );
        }
        RunResult::AbortedAt { .. } => {
            eprintln!(
                "[Batch {} {} (exit code {}), log {}]",
                context.target_date,
                result,
                result.exit_code(),
                log_path.display()
            );
        }
    }

    Ok(ExitCode::from(result.process_exit_code()))
}

fn print_plan(config: &ResolvedConfig, context: &RunContext, log_dir: &Path) {
    println!("Target date: {}", context.target_date);
    println!(
        "Log file:    {}",
        log_dir.join(DailyLog::file_name(&context.target_date)).display()
    );
    println!("Worker:      {}", config.worker.program);
    println!();
    for (idx, process_type) in context.catalog.iter().enumerate() {
        let args = config.worker.render_args(&context.target_date, process_type);
        println!(
            "  {}. {:<20} {} {}",
            idx + 1,
            process_type.as_str(),
            config.worker.program,
            args.join(" ")
        );
    }
}

fn list_profiles(config: &ResolvedConfig) {
    if config.profiles.is_empty() {
        println!("No profiles configured");
        return;
    }

    for (name, catalog) in &config.profiles {
        let marker = if config.default_profile.as_deref() == Some(name.as_str()) {
            " (default)"
        } else {
            ""
        };
        println!("{}{}", name, marker);
        for (idx, process_type) in catalog.iter().enumerate() {
            println!("  {}. {}", idx + 1, process_type);
        }
    }
}

fn show_config(config: &ResolvedConfig) -> Result<()> {
    let json = serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;
    println!("{}", json);
    Ok(())
}
