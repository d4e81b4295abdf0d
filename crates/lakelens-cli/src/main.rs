mod display;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use lakelens_core::model::Snapshot;
use lakelens_core::{analyzer, AnalysisConfig, AnalysisWindow};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "lakelens",
    version,
    about = "LakeLens — Databricks Cost & Performance Analyzer",
    long_about = "Turn a collected usage snapshot into classified findings and ranked,\ndollar-quantified savings recommendations. All analysis is offline: point it\nat a snapshot file, no workspace access required."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a usage snapshot for cost waste and performance problems
    Analyze {
        /// Path to the snapshot JSON file produced by the collector
        snapshot: PathBuf,

        /// Path to a YAML config with the analysis window and thresholds
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Analysis window start (YYYY-MM-DD); overrides the config file
        #[arg(long)]
        start_date: Option<NaiveDate>,

        /// Analysis window end (YYYY-MM-DD); overrides the config file
        #[arg(long)]
        end_date: Option<NaiveDate>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show the spend breakdown for a snapshot without running detectors
    Cost {
        /// Path to the snapshot JSON file
        snapshot: PathBuf,

        /// Path to a YAML config with the analysis window
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Analysis window start (YYYY-MM-DD)
        #[arg(long)]
        start_date: Option<NaiveDate>,

        /// Analysis window end (YYYY-MM-DD)
        #[arg(long)]
        end_date: Option<NaiveDate>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            snapshot,
            config,
            start_date,
            end_date,
            format,
        } => cmd_analyze(&snapshot, config.as_deref(), start_date, end_date, &format),
        Commands::Cost {
            snapshot,
            config,
            start_date,
            end_date,
        } => cmd_cost(&snapshot, config.as_deref(), start_date, end_date),
    }
}

fn load_snapshot(path: &Path) -> Result<Snapshot> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot '{}'", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse snapshot '{}'", path.display()))
}

fn env_date(name: &str) -> Result<Option<NaiveDate>> {
    match std::env::var(name) {
        Ok(value) => {
            let date = value
                .parse()
                .with_context(|| format!("Invalid {name} '{value}', expected YYYY-MM-DD"))?;
            Ok(Some(date))
        }
        Err(_) => Ok(None),
    }
}

fn load_config(
    path: Option<&Path>,
    start_flag: Option<NaiveDate>,
    end_flag: Option<NaiveDate>,
) -> Result<AnalysisConfig> {
    // Flags beat environment, environment beats the config file.
    let start_date = match start_flag {
        Some(date) => Some(date),
        None => env_date("START_DATE")?,
    };
    let end_date = match end_flag {
        Some(date) => Some(date),
        None => env_date("END_DATE")?,
    };

    let mut config = match path {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config '{}'", path.display()))?;
            AnalysisConfig::from_yaml(&contents)
                .with_context(|| format!("Failed to parse config '{}'", path.display()))?
        }
        None => {
            let (start, end) = match (start_date, end_date) {
                (Some(s), Some(e)) => (s, e),
                _ => anyhow::bail!(
                    "No config file given; --start-date and --end-date are required"
                ),
            };
            AnalysisConfig::new(AnalysisWindow::new(start, end))
        }
    };

    if let Some(start) = start_date {
        config.window.start_date = start;
    }
    if let Some(end) = end_date {
        config.window.end_date = end;
    }

    Ok(config)
}

fn cmd_analyze(
    snapshot_path: &Path,
    config_path: Option<&Path>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    format: &str,
) -> Result<()> {
    let snapshot = load_snapshot(snapshot_path)?;
    let config = load_config(config_path, start_date, end_date)?;

    let report = analyzer::analyze(&snapshot, &config)
        .with_context(|| format!("Analysis of '{}' failed", snapshot_path.display()))?;

    match format {
        "json" => {
            let json = serde_json::to_string_pretty(&report)?;
            println!("{}", json);
        }
        _ => {
            display::print_analysis_report(&report);
        }
    }

    Ok(())
}

fn cmd_cost(
    snapshot_path: &Path,
    config_path: Option<&Path>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> Result<()> {
    let snapshot = load_snapshot(snapshot_path)?;
    let config = load_config(config_path, start_date, end_date)?;

    let report = analyzer::analyze(&snapshot, &config)
        .with_context(|| format!("Analysis of '{}' failed", snapshot_path.display()))?;

    display::print_cost_breakdown(&report);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn snapshot_round_trips_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"usage": [{{"usage_date": "2025-06-02", "cluster_id": "c1", "sku_category": "JOBS", "dbu_quantity": 12.5}}]}}"#
        )
        .unwrap();

        let snapshot = load_snapshot(file.path()).unwrap();
        assert_eq!(snapshot.usage.len(), 1);
        assert_eq!(snapshot.usage[0].cluster_id.as_deref(), Some("c1"));
        assert!(snapshot.clusters.is_empty());
    }

    #[test]
    fn config_loads_with_flag_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "window:\n  start_date: 2025-06-01\n  end_date: 2025-06-30\ndbu_unit_price: 0.62\n"
        )
        .unwrap();

        let end = "2025-06-15".parse().unwrap();
        let config = load_config(Some(file.path()), None, Some(end)).unwrap();
        assert_eq!(config.window.end_date, end);
        assert!((config.dbu_unit_price - 0.62).abs() < 1e-9);
    }

    #[test]
    fn missing_window_without_config_is_an_error() {
        assert!(load_config(None, None, None).is_err());
    }

    #[test]
    fn malformed_snapshot_reports_the_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = load_snapshot(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }
}
