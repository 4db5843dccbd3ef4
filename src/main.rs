use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info};

use pilot_core::artifacts::DirSink;
use pilot_core::catalog::{self, SCENARIOS};
use pilot_core::model::HttpModel;
use pilot_core::platform::create_platform;
use pilot_core::settings::Settings;
use pilot_core::{logger, Agent, AgentConfig, StopReason};

/// Let a vision model drive the desktop until a task is done.
#[derive(Parser, Debug)]
#[command(name = "pilot", version)]
struct Cli {
    /// Task to perform, in plain language.
    task: Option<String>,

    /// Run a built-in scenario (1-based) instead of a task.
    #[arg(long, conflicts_with = "task")]
    scenario: Option<usize>,

    /// JSON settings file; missing fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use the headless stub platform.
    #[arg(long)]
    stub: bool,

    #[arg(long)]
    max_steps: Option<usize>,

    /// Debug-level logs, including redacted model exchanges.
    #[arg(short, long)]
    verbose: bool,

    /// List built-in scenarios and exit.
    #[arg(long)]
    list: bool,

    /// Write the resolved settings to this file and exit.
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,
}

fn settings(cli: &Cli) -> Result<Settings> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => Settings::default(),
    };
    settings.apply_env().context("reading PILOT_* environment")?;
    if let Some(n) = cli.max_steps {
        settings.max_steps = n;
    }
    Ok(settings)
}

fn task(cli: &Cli) -> Result<String> {
    if let Some(n) = cli.scenario {
        let scenario = catalog::scenario(n).with_context(|| format!("no scenario {} (have 1..={})", n, SCENARIOS.len()))?;
        return Ok(scenario.task.to_string());
    }
    match cli.task.as_deref().map(str::trim) {
        Some(t) if !t.is_empty() => Ok(t.to_string()),
        _ => bail!("give a task or --scenario N"),
    }
}

fn run(cli: Cli) -> Result<()> {
    if cli.list {
        for (i, s) in SCENARIOS.iter().enumerate() {
            println!("{:>2}. {}: {}", i + 1, s.name, s.task);
        }
        return Ok(());
    }

    let settings = settings(&cli)?;
    if let Some(path) = &cli.write_config {
        settings.save(path).with_context(|| format!("writing {}", path.display()))?;
        println!("wrote {}", path.display());
        return Ok(());
    }
    let task = task(&cli)?;

    let logs_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")).join("logs");
    let log = logger::init(&logs_dir, cli.verbose)?;
    info!(target: "agent", "endpoint {} model {}", settings.endpoint, settings.model);

    let mut platform = create_platform(cli.stub);
    let mut model = HttpModel::new(&settings)?;
    let mut sink = DirSink::new(&settings.dump_dir, settings.dump_prefix.clone(), settings.dump_start);

    let mut agent = Agent::new(platform.as_mut(), &mut model, &mut sink, AgentConfig::from(&settings));
    let outcome = agent.run(catalog::SYSTEM_PROMPT, &task);

    println!("log: {}", log.path.display());
    match outcome {
        Ok(outcome) => {
            if outcome.reason == StopReason::StepLimit {
                println!("(stopped after {} steps)", outcome.steps);
            }
            println!("{}", outcome.text);
            Ok(())
        }
        Err(e) => {
            error!(target: "agent", "run failed: {}", e);
            Err(e.into())
        }
    }
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("pilot: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
