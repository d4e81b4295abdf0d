//! Job run analysis: failure-rate waste and short-run startup overhead.

use std::collections::BTreeMap;

use crate::analyzer::cost::CostSummary;
use crate::analyzer::report::{Evidence, Finding, FindingCategory, Severity};
use crate::config::AnalysisConfig;
use crate::model::{JobRunRecord, RunState};
use crate::stats::percentile;

/// Per-job run tallies for the window.
#[derive(Debug, Clone, Default)]
struct JobRunStats {
    total_runs: usize,
    failed_runs: usize,
    durations_secs: Vec<f64>,
}

pub fn analyze(
    runs: &[JobRunRecord],
    cost: &CostSummary,
    config: &AnalysisConfig,
) -> (Vec<Finding>, Vec<String>) {
    let mut findings = Vec::new();
    let mut notes = Vec::new();
    let factor = config.window.monthly_factor();

    let mut by_job: BTreeMap<&str, JobRunStats> = BTreeMap::new();
    for run in runs {
        let stats = by_job.entry(run.job_id.as_str()).or_default();
        stats.total_runs += 1;
        if run.state == RunState::Failed {
            stats.failed_runs += 1;
        }
        stats.durations_secs.push(run.duration_secs);
    }

    for (job_id, stats) in &by_job {
        let job_spend = cost.job_spend(job_id);

        if stats.total_runs < config.thresholds.job_min_sample_size {
            notes.push(format!(
                "job {job_id}: {} run(s) in window, below the minimum of {}; failure analysis skipped",
                stats.total_runs, config.thresholds.job_min_sample_size
            ));
        } else {
            let failure_rate_pct = stats.failed_runs as f64 / stats.total_runs as f64 * 100.0;
            if failure_rate_pct > config.thresholds.job_failure_rate_pct {
                // Failed runs burn compute without producing output; their
                // spend share is waste recoverable by fixing the job.
                let avg_run_spend = job_spend / stats.total_runs as f64;
                let wasted_monthly = stats.failed_runs as f64 * avg_run_spend * factor;
                findings.push(Finding {
                    category: FindingCategory::HighFailureJob,
                    resource_id: (*job_id).to_string(),
                    severity: if failure_rate_pct > 50.0 {
                        Severity::High
                    } else {
                        Severity::Medium
                    },
                    summary: format!(
                        "{} of {} runs failed ({failure_rate_pct:.0}%); each failed run burns compute without output",
                        stats.failed_runs, stats.total_runs
                    ),
                    evidence: vec![
                        Evidence::new("failure_rate_pct", failure_rate_pct),
                        Evidence::new("failed_runs", stats.failed_runs as f64),
                        Evidence::new("avg_run_spend", avg_run_spend),
                    ],
                    confidence: 0.9,
                    estimated_monthly_savings: wasted_monthly,
                });
            }
        }

        if stats.total_runs >= config.thresholds.short_run_min_runs {
            let median_secs = percentile(&stats.durations_secs, 50.0);
            if median_secs < config.thresholds.short_run_floor_secs {
                // Runs shorter than cluster spin-up are mostly overhead;
                // batching or serverless recovers a large share of it.
                findings.push(Finding {
                    category: FindingCategory::ShortRunOverhead,
                    resource_id: (*job_id).to_string(),
                    severity: Severity::Medium,
                    summary: format!(
                        "median run lasts {median_secs:.0}s over {} runs; cluster startup dominates the bill",
                        stats.total_runs
                    ),
                    evidence: vec![
                        Evidence::new("median_run_secs", median_secs),
                        Evidence::new("total_runs", stats.total_runs as f64),
                    ],
                    confidence: 0.7,
                    estimated_monthly_savings: job_spend * factor * 0.3,
                });
            }
        }
    }

    (findings, notes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::cost;
    use crate::config::AnalysisWindow;
    use crate::model::UsageRecord;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use std::collections::BTreeMap;

    fn config() -> AnalysisConfig {
        AnalysisConfig::new(AnalysisWindow::new(
            NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(),
        ))
    }

    fn run(job_id: &str, i: i64, state: RunState, duration_secs: f64) -> JobRunRecord {
        let start = Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap() + Duration::hours(i);
        JobRunRecord {
            job_id: job_id.into(),
            run_id: format!("r{i}"),
            start_time: start,
            end_time: start + Duration::seconds(duration_secs as i64),
            state,
            duration_secs,
        }
    }

    fn job_usage(job_id: &str, dbus: f64) -> UsageRecord {
        UsageRecord {
            usage_date: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            cluster_id: None,
            job_id: Some(job_id.into()),
            warehouse_id: None,
            user: None,
            sku_category: "JOBS".into(),
            dbu_quantity: dbus,
            tags: BTreeMap::new(),
        }
    }

    #[test]
    fn failure_waste_scales_to_monthly() {
        // 10 runs, 3 failed, $50 total spend: avg $5/run, 3 x $5 = $15 wasted
        // in a 10-day window, so $45/month.
        let cfg = config();
        let runs: Vec<_> = (0..10)
            .map(|i| {
                let state = if i < 3 { RunState::Failed } else { RunState::Success };
                run("job-1", i, state, 600.0)
            })
            .collect();
        let usage = vec![job_usage("job-1", 100.0)];
        let summary = cost::aggregate(&usage, &cfg.window, cfg.dbu_unit_price);
        let (findings, notes) = analyze(&runs, &summary, &cfg);
        assert!(notes.is_empty());
        let f = findings
            .iter()
            .find(|f| f.category == FindingCategory::HighFailureJob)
            .unwrap();
        assert_eq!(f.severity, Severity::Medium);
        assert!((f.estimated_monthly_savings - 45.0).abs() < 1e-9);
    }

    #[test]
    fn failure_rate_threshold_is_strict() {
        // Exactly 20% does not fire.
        let cfg = config();
        let runs: Vec<_> = (0..10)
            .map(|i| {
                let state = if i < 2 { RunState::Failed } else { RunState::Success };
                run("job-1", i, state, 600.0)
            })
            .collect();
        let summary = cost::aggregate(&[], &cfg.window, cfg.dbu_unit_price);
        let (findings, _) = analyze(&runs, &summary, &cfg);
        assert!(findings.is_empty());
    }

    #[test]
    fn small_samples_note_instead_of_flagging() {
        let cfg = config();
        let runs = vec![
            run("job-2", 0, RunState::Failed, 600.0),
            run("job-2", 1, RunState::Failed, 600.0),
        ];
        let summary = cost::aggregate(&[], &cfg.window, cfg.dbu_unit_price);
        let (findings, notes) = analyze(&runs, &summary, &cfg);
        assert!(findings.is_empty());
        assert_eq!(notes.len(), 1);
        assert!(notes[0].contains("job-2"));
    }

    #[test]
    fn canceled_runs_do_not_count_as_failures() {
        let cfg = config();
        let runs: Vec<_> = (0..10)
            .map(|i| {
                let state = if i < 4 { RunState::Canceled } else { RunState::Success };
                run("job-3", i, state, 600.0)
            })
            .collect();
        let summary = cost::aggregate(&[], &cfg.window, cfg.dbu_unit_price);
        let (findings, _) = analyze(&runs, &summary, &cfg);
        assert!(!findings
            .iter()
            .any(|f| f.category == FindingCategory::HighFailureJob));
    }

    #[test]
    fn short_median_runs_flag_overhead() {
        let cfg = config();
        let runs: Vec<_> = (0..12).map(|i| run("job-4", i, RunState::Success, 20.0)).collect();
        let usage = vec![job_usage("job-4", 40.0)];
        let summary = cost::aggregate(&usage, &cfg.window, cfg.dbu_unit_price);
        let (findings, _) = analyze(&runs, &summary, &cfg);
        let f = findings
            .iter()
            .find(|f| f.category == FindingCategory::ShortRunOverhead)
            .unwrap();
        // $20 window spend x 3 monthly factor x 0.3.
        assert!((f.estimated_monthly_savings - 18.0).abs() < 1e-9);
    }

    #[test]
    fn few_short_runs_stay_quiet() {
        let cfg = config();
        let runs: Vec<_> = (0..5).map(|i| run("job-5", i, RunState::Success, 20.0)).collect();
        let summary = cost::aggregate(&[], &cfg.window, cfg.dbu_unit_price);
        let (findings, _) = analyze(&runs, &summary, &cfg);
        assert!(!findings
            .iter()
            .any(|f| f.category == FindingCategory::ShortRunOverhead));
    }
}
