//! `reversal-agents`: run simulated reversal-learning sessions.
//!
//! # Usage
//!
//! ```bash
//! # Three groups with the default roster, artifacts under ./out
//! reversal-agents run --groups 3 --out out
//!
//! # Print the schedule group 2 would get
//! reversal-agents --config session.toml schedule --group 2
//!
//! # Validate a config and print it fully resolved
//! REVERSAL_SEED=42 reversal-agents --config session.toml check-config
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use coordination::sequence::generate;
use coordination::{EventBus, SessionEvent, SessionRunner, SharedEventBus};
use reversal_agents::telemetry::{append_session_summary, init_tracing, write_group_artifacts, SessionSummary};
use reversal_agents::{AgentFactory, AppConfig};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML config file (defaults apply when omitted)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, default_value_t = false, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Simulate groups with every seat played by its configured agent
    Run {
        /// Number of groups to run in parallel
        #[arg(long, default_value_t = 1)]
        groups: u32,

        /// Directory for schedule, outcome and report artifacts
        #[arg(long, default_value = "out")]
        out: PathBuf,

        /// Session seed (overrides config and REVERSAL_SEED)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print or write the reversal schedule of one group
    Schedule {
        /// Zero-based group index
        #[arg(long, default_value_t = 0)]
        group: u32,

        /// Write the CSV here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Validate the configuration and print it resolved
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    let mut config = AppConfig::load(args.config.as_deref())?;

    match args.command {
        Command::Run { groups, out, seed } => {
            if let Some(seed) = seed {
                config.session.seed = seed;
            }
            run(config, groups, out).await
        }
        Command::Schedule { group, out } => schedule(&config, group, out),
        Command::CheckConfig => check_config(config),
    }
}

async fn run(config: AppConfig, groups: u32, out: PathBuf) -> Result<()> {
    let factory = AgentFactory::from_config(&config)?;
    let bus = EventBus::new().shared();
    let logger = log_events(bus.clone());

    let runner = SessionRunner::new(config.session.clone(), bus).context("Invalid session configuration")?;
    info!(
        session = %config.session.session_id,
        groups,
        rounds = config.session.rounds(),
        seed = config.session.seed,
        "Session starting"
    );

    let reports = runner.run_unattended(groups, &factory).await;
    logger.abort();
    let reports = reports.context("Session failed")?;

    for report in &reports {
        write_group_artifacts(report, &out)?;
        let points: Vec<i32> = report
            .outcome
            .players
            .iter()
            .map(|p| p.first_stage_total + p.second_stage_total)
            .collect();
        info!(
            group = report.group,
            reversals = ?report.schedule.reversal_rounds(),
            fallbacks = report.aggregates.fallbacks(),
            ?points,
            "Group finished"
        );
    }

    let summary = SessionSummary::new(&config.session.session_id, config.session.seed, &reports);
    append_session_summary(&summary, &out);
    Ok(())
}

/// Surface substitutions and completions while groups run.
fn log_events(bus: SharedEventBus) -> JoinHandle<()> {
    let mut events = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SessionEvent::RoundClosed { group, round, .. }) => {
                    debug!(group, round, "Round closed");
                }
                Ok(SessionEvent::GroupCompleted { group, rounds, .. }) => {
                    info!(group, rounds, "Group completed");
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "Event log lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn schedule(config: &AppConfig, group: u32, out: Option<PathBuf>) -> Result<()> {
    let schedule = generate(&config.session.schedule_config(group)).context("Cannot build schedule")?;
    match out {
        Some(path) => {
            schedule
                .write_csv(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), reversals = ?schedule.reversal_rounds(), "Schedule written");
        }
        None => print!("{}", schedule.to_csv()),
    }
    Ok(())
}

fn check_config(mut config: AppConfig) -> Result<()> {
    if config.provider.api_key.is_some() {
        config.provider.api_key = Some("<redacted>".to_string());
    }
    let text = toml::to_string_pretty(&config).context("Failed to render config")?;
    println!("{text}");
    info!(
        rounds = config.session.rounds(),
        block_bounds = ?config.session.block_bounds(),
        deadline_ms = config.session.phase_deadline().as_millis() as u64,
        provider = config.session.needs_provider(),
        "Configuration is valid"
    );
    Ok(())
}
