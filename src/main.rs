use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use arbor::config::CONFIG_FILE;
use arbor::{ActionList, ArborConfig, Context, DryRunSink, FsHost, Host, HostSink, Sink};
use clap::{Args, Parser, Subcommand};

/// Preview and commit serialized action logs
///
/// An action log is the JSON array a tree's `actions()` serializes to:
/// `[{"id":1,"parent":0,"kind":"c","path":"/a","content":"<base64>"}, ...]`.
/// Logs are checked against the target directory before anything is
/// written, and a log that does not fit is rejected as a whole.
#[derive(Parser)]
#[command(name = "arbor")]
#[command(version, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print what committing a log would do, one JSON event per line
    ///
    /// Exits non-zero if any action would fail.
    Preview(Target),

    /// Apply a log to a directory
    Commit(Target),

    /// Print the net effect of a log as a new log
    Optimize {
        /// Action log (JSON)
        log: PathBuf,
    },
}

#[derive(Args)]
struct Target {
    /// Action log (JSON)
    log: PathBuf,

    /// Directory the log is committed to
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Configuration file [default: ROOT/arbor.toml]
    #[arg(long, env = "ARBOR_CONFIG")]
    config: Option<PathBuf>,

    /// Let creates replace existing files
    #[arg(long)]
    force: bool,
}

impl Target {
    fn load(&self) -> Result<(ArborConfig, ActionList, Arc<dyn Host>)> {
        let config_path = self
            .config
            .clone()
            .unwrap_or_else(|| self.root.join(CONFIG_FILE));
        let config = ArborConfig::load(&config_path)?;
        let mut log = read_log(&self.log)?;
        if config.commit.optimize {
            log = log.optimize(&Context::after(log.max_id()));
        }
        let host = FsHost::open(&self.root)
            .with_context(|| format!("cannot open {}", self.root.display()))?;
        Ok((config, log, Arc::new(host)))
    }
}

fn read_log(path: &Path) -> Result<ActionList> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    ActionList::from_json(&text).with_context(|| format!("invalid action log {}", path.display()))
}

fn preview(target: &Target) -> Result<ExitCode> {
    let (config, log, host) = target.load()?;
    let report = DryRunSink::new(host)
        .force(target.force || config.commit.force)
        .commit_actions(&log)?;
    print!("{}", report.to_json_lines()?);
    if report.has_errors() {
        eprintln!("{} action(s) would fail", report.errors().count());
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn commit(target: &Target) -> Result<ExitCode> {
    let (config, log, host) = target.load()?;
    if config.commit.dry_run {
        eprintln!("dry_run is set in the configuration; previewing instead");
        return preview(target);
    }
    let summary = HostSink::new(host)
        .force(target.force || config.commit.force)
        .commit_actions(&log)
        .with_context(|| format!("commit to {} failed", target.root.display()))?;
    println!("{summary}");
    Ok(ExitCode::SUCCESS)
}

fn optimize(log: &Path) -> Result<ExitCode> {
    let log = read_log(log)?;
    let optimized = log.optimize(&Context::after(log.max_id()));
    println!("{}", optimized.to_json()?);
    Ok(ExitCode::SUCCESS)
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    arbor::telemetry::init();

    match cli.command {
        Commands::Preview(ref target) => preview(target),
        Commands::Commit(ref target) => commit(target),
        Commands::Optimize { ref log } => optimize(log),
    }
}
