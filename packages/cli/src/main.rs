#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `patrol`: zone routing, urgency triage and dispatch SLA reporting from
//! the command line.
//!
//! Inputs and outputs are JSON files. Log output goes through
//! [`patrol_cli_utils::init_logger`], so it never tears progress bars.

mod commands;
mod error;
mod io;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use patrol_cli_utils::IndicatifProgress;
use patrol_config::PatrolConfig;
use patrol_dispatch_models::Dispatch;
use patrol_jurisdiction::ZoneTable;
use patrol_report_models::{NewReport, Report};
use patrol_urgency::{SortOrder, recalculate_all};

use crate::error::CliError;

#[derive(Parser)]
#[command(name = "patrol", about = "Patrol dispatch toolchain")]
struct Cli {
    /// TOML config file; built-in defaults when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a zone catalog and list its zones
    Zones {
        /// Catalog file (`.json` or `.toml`)
        #[arg(long)]
        catalog: PathBuf,
    },
    /// Route and score new report submissions
    Intake {
        /// Catalog file (`.json` or `.toml`)
        #[arg(long)]
        catalog: PathBuf,
        /// JSON array of submissions
        #[arg(long)]
        reports: PathBuf,
        /// Scoring time (RFC 3339); defaults to now
        #[arg(long)]
        now: Option<DateTime<Utc>>,
        /// Output file; stdout when omitted
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Score stored reports and print them in triage order
    Score {
        /// JSON array of reports
        #[arg(long)]
        reports: PathBuf,
        /// Triage order
        #[arg(long, default_value_t = SortOrder::MostUrgent, value_parser = parse_sort_order)]
        sort: SortOrder,
        /// Scoring time (RFC 3339); defaults to now
        #[arg(long)]
        now: Option<DateTime<Utc>>,
    },
    /// Recompute stored urgency fields for every report
    Recalculate {
        /// JSON array of reports
        #[arg(long)]
        reports: PathBuf,
        /// Output file; stdout when omitted
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// SLA snapshots and response analytics for a dispatch log
    Sla {
        /// JSON array of dispatches
        #[arg(long)]
        dispatches: PathBuf,
        /// Evaluation time (RFC 3339); defaults to now
        #[arg(long)]
        now: Option<DateTime<Utc>>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = patrol_cli_utils::init_logger();
    run(Cli::parse(), &multi)?;
    Ok(())
}

fn run(cli: Cli, multi: &patrol_cli_utils::MultiProgress) -> Result<(), CliError> {
    let config = PatrolConfig::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Zones { catalog } => {
            let table = ZoneTable::load(&catalog)?;
            for line in commands::zone_table(&table, table.rejected()) {
                println!("{line}");
            }
        }
        Commands::Intake {
            catalog,
            reports,
            now,
            output,
        } => {
            let table = ZoneTable::load(&catalog)?;
            let submissions: Vec<NewReport> = io::read_json(&reports)?;
            let routed = commands::intake(
                &table,
                &config.resolver(),
                &config.scorer(),
                submissions,
                now.unwrap_or_else(Utc::now),
            );
            io::write_json(output.as_deref(), &routed)?;
        }
        Commands::Score { reports, sort, now } => {
            let mut reports: Vec<Report> = io::read_json(&reports)?;
            commands::score(
                &config.scorer(),
                &mut reports,
                sort,
                now.unwrap_or_else(Utc::now),
            );
            io::write_json(None, &reports)?;
        }
        Commands::Recalculate { reports, output } => {
            recalculate(&config, multi, &reports, output.as_deref())?;
        }
        Commands::Sla { dispatches, now } => {
            let dispatches: Vec<Dispatch> = io::read_json(&dispatches)?;
            let report = commands::sla(
                &dispatches,
                now.unwrap_or_else(Utc::now),
                config.dispatch.sla_seconds,
            );
            io::write_json(None, &report)?;
        }
    }

    Ok(())
}

fn parse_sort_order(value: &str) -> Result<SortOrder, String> {
    value.parse().map_err(|_| {
        let known: Vec<&str> = SortOrder::all().iter().map(AsRef::as_ref).collect();
        format!("unknown sort order '{value}', expected one of: {}", known.join(", "))
    })
}

fn recalculate(
    config: &PatrolConfig,
    multi: &patrol_cli_utils::MultiProgress,
    input: &Path,
    output: Option<&Path>,
) -> Result<(), CliError> {
    let mut reports: Vec<Report> = io::read_json(input)?;
    let progress = IndicatifProgress::reports_bar(multi, "Loading reports");

    let summary = recalculate_all(
        &config.scorer(),
        &mut reports,
        Utc::now(),
        progress.as_ref(),
    );
    log::info!(
        "Rescored {} report(s), {} changed",
        summary.processed,
        summary.changed
    );

    io::write_json(output, &reports)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_failures_surface_as_cli_errors() {
        let cli = Cli {
            config: Some(PathBuf::from("/nonexistent/patrol.toml")),
            command: Commands::Zones {
                catalog: PathBuf::from("/nonexistent/zones.json"),
            },
        };

        let err = run(cli, &patrol_cli_utils::MultiProgress::new()).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn missing_catalog_is_a_jurisdiction_error() {
        let cli = Cli::parse_from(["patrol", "zones", "--catalog", "/nonexistent/zones.json"]);

        let err = run(cli, &patrol_cli_utils::MultiProgress::new()).unwrap_err();
        assert!(matches!(err, CliError::Jurisdiction(_)));
    }
}
