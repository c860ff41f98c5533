//! Logging setup and session artifacts.
//!
//! Per group, a run writes into the output directory:
//! - `group-<id>-schedule.csv`: the reversal schedule
//! - `group-<id>-outcome.json`: bonus draws and stage totals per player
//! - `group-<id>-report.json`: every round record plus aggregates
//!
//! `sessions.jsonl` gets one summary line per run, append-only.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use coordination::group::GroupReport;
use coordination::{DecisionPhase, ResponseOrigin};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Initialise the global subscriber. `RUST_LOG` wins over the default
/// `info` level.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub group: u32,
    pub rounds: u32,
    pub reversal_rounds: Vec<u32>,
    pub fallbacks: u32,
    pub origin_counts: BTreeMap<ResponseOrigin, u32>,
    pub mean_latency_ms: BTreeMap<DecisionPhase, f64>,
    /// Bonus delta per slot, in slot order.
    pub bonus_deltas: Vec<Option<i32>>,
}

impl From<&GroupReport> for GroupSummary {
    fn from(report: &GroupReport) -> Self {
        Self {
            group: report.group,
            rounds: report.records.len() as u32,
            reversal_rounds: report.schedule.reversal_rounds(),
            fallbacks: report.aggregates.fallbacks(),
            origin_counts: report.aggregates.origin_counts.clone(),
            mean_latency_ms: report.aggregates.mean_latency_ms.clone(),
            bonus_deltas: report
                .outcome
                .players
                .iter()
                .map(|p| p.bonus.map(|b| b.bonus_delta))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub seed: u64,
    pub groups: Vec<GroupSummary>,
    pub timestamp: String,
}

impl SessionSummary {
    pub fn new(session_id: &str, seed: u64, reports: &[GroupReport]) -> Self {
        Self {
            session_id: session_id.to_string(),
            seed,
            groups: reports.iter().map(GroupSummary::from).collect(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

/// Write one group's artifacts and return their paths.
pub fn write_group_artifacts(report: &GroupReport, out_dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let schedule = out_dir.join(format!("group-{}-schedule.csv", report.group));
    report
        .schedule
        .write_csv(&schedule)
        .with_context(|| format!("Failed to write {}", schedule.display()))?;

    let outcome = out_dir.join(format!("group-{}-outcome.json", report.group));
    write_json(&outcome, &report.outcome)?;

    let full = out_dir.join(format!("group-{}-report.json", report.group));
    write_json(&full, report)?;

    info!(group = report.group, dir = %out_dir.display(), "Wrote group artifacts");
    Ok(vec![schedule, outcome, full])
}

/// Append a session summary to `sessions.jsonl` in `out_dir`.
///
/// Failures are logged, not returned; the per-group artifacts are what
/// matter.
pub fn append_session_summary(summary: &SessionSummary, out_dir: &Path) {
    let path = out_dir.join("sessions.jsonl");
    match serde_json::to_string(summary) {
        Ok(json) => {
            use std::io::Write;
            match std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
            {
                Ok(mut file) => {
                    if let Err(e) = writeln!(file, "{json}") {
                        warn!("Failed to append session summary: {e}");
                    } else {
                        info!(path = %path.display(), "Appended session summary");
                    }
                }
                Err(e) => warn!("Failed to open session summary file: {e}"),
            }
        }
        Err(e) => warn!("Failed to serialize session summary: {e}"),
    }
}
