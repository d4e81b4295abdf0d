//! The analysis pipeline: scrub the snapshot, aggregate cost, run every
//! detector, then fold findings into ranked recommendations.

pub mod cost;
pub mod jobs;
pub mod queries;
pub mod report;
pub mod rightsizing;
pub mod warehouse;

use tracing::{debug, info};

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::model::{self, Snapshot};
use crate::recommend;
use self::report::AnalysisReport;

/// Run the full analysis over one collected snapshot. Pure: the same
/// snapshot and config always produce an identical report.
pub fn analyze(snapshot: &Snapshot, config: &AnalysisConfig) -> Result<AnalysisReport, AnalysisError> {
    config.window.validate()?;

    let (clean, scrub_report) = model::scrub(snapshot);
    scrub_report.check(config.malformed_fraction_threshold)?;
    if scrub_report.skipped() > 0 {
        info!(
            skipped = scrub_report.skipped(),
            total = scrub_report.total,
            "dropped malformed records"
        );
    }
    let mut notes = scrub_report.notes();

    let summary = cost::aggregate(&clean.usage, &config.window, config.dbu_unit_price);
    debug!(
        total_spend = summary.total_spend,
        projected_monthly = summary.projected_monthly_spend,
        "aggregated usage"
    );

    let mut findings = Vec::new();

    let (f, n) = rightsizing::analyze(&clean.utilization, &clean.clusters, &summary, config);
    findings.extend(f);
    notes.extend(n);

    let (f, n) = warehouse::analyze(&clean.warehouse_events, &summary, config);
    findings.extend(f);
    notes.extend(n);

    let (f, n) = jobs::analyze(&clean.job_runs, &summary, config);
    findings.extend(f);
    notes.extend(n);

    let (f, n) = queries::analyze(&clean.queries, &summary, config);
    findings.extend(f);
    notes.extend(n);

    findings.extend(cost::detect_governance(&summary, &config.thresholds));

    let recommendations = recommend::build(&findings);
    info!(
        findings = findings.len(),
        recommendations = recommendations.len(),
        "analysis complete"
    );

    Ok(AnalysisReport {
        period_start: config.window.start_date,
        period_end: config.window.end_date,
        total_period_spend: summary.total_spend,
        projected_monthly_spend: summary.projected_monthly_spend,
        cost: summary,
        findings,
        recommendations,
        completeness_notes: notes,
    })
}
