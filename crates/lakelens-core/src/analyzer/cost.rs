//! Cost aggregation: groups usage records along every billing dimension and
//! projects the observed window to a month. Pure; every map is ordered so the
//! output is byte-identical across runs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::analyzer::report::{Evidence, Finding, FindingCategory, Severity};
use crate::config::{AnalysisWindow, Thresholds};
use crate::model::UsageRecord;

/// DBUs and spend attributed to one grouping key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpendLine {
    pub dbus: f64,
    pub spend: f64,
}

impl SpendLine {
    fn add(&mut self, dbus: f64, spend: f64) {
        self.dbus += dbus;
        self.spend += spend;
    }
}

/// Aggregated cost picture for the analysis window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostSummary {
    pub window_days: i64,
    pub total_dbus: f64,
    pub total_spend: f64,
    pub projected_monthly_dbus: f64,
    pub projected_monthly_spend: f64,
    pub by_product: BTreeMap<String, SpendLine>,
    pub by_cluster: BTreeMap<String, SpendLine>,
    pub by_job: BTreeMap<String, SpendLine>,
    pub by_warehouse: BTreeMap<String, SpendLine>,
    pub by_user: BTreeMap<String, SpendLine>,
    pub tagged_spend: f64,
    /// Spend on records carrying at least one non-empty tag, over total spend.
    pub tag_compliance_ratio: f64,
    pub weekend_spend: f64,
    /// Spend on Saturday/Sunday dates, over total spend.
    pub weekend_ratio: f64,
    /// Average weekend day spend over average weekday spend. Values near 1.0
    /// mean the platform never rests.
    pub weekend_to_weekday_avg_ratio: f64,
}

impl CostSummary {
    pub fn cluster_spend(&self, cluster_id: &str) -> f64 {
        self.by_cluster.get(cluster_id).map_or(0.0, |l| l.spend)
    }

    pub fn cluster_dbus(&self, cluster_id: &str) -> f64 {
        self.by_cluster.get(cluster_id).map_or(0.0, |l| l.dbus)
    }

    pub fn job_spend(&self, job_id: &str) -> f64 {
        self.by_job.get(job_id).map_or(0.0, |l| l.spend)
    }

    pub fn warehouse_spend(&self, warehouse_id: &str) -> f64 {
        self.by_warehouse.get(warehouse_id).map_or(0.0, |l| l.spend)
    }

    pub fn monthly_factor(&self) -> f64 {
        30.0 / self.window_days as f64
    }
}

/// Aggregate usage into the window's cost summary. The caller validates the
/// window before calling; a degenerate range never reaches this point.
pub fn aggregate(usage: &[UsageRecord], window: &AnalysisWindow, dbu_unit_price: f64) -> CostSummary {
    let days = window.days();
    let factor = window.monthly_factor();

    let mut summary = CostSummary {
        window_days: days,
        total_dbus: 0.0,
        total_spend: 0.0,
        projected_monthly_dbus: 0.0,
        projected_monthly_spend: 0.0,
        by_product: BTreeMap::new(),
        by_cluster: BTreeMap::new(),
        by_job: BTreeMap::new(),
        by_warehouse: BTreeMap::new(),
        by_user: BTreeMap::new(),
        tagged_spend: 0.0,
        tag_compliance_ratio: 0.0,
        weekend_spend: 0.0,
        weekend_ratio: 0.0,
        weekend_to_weekday_avg_ratio: 0.0,
    };
    let mut weekday_spend = 0.0;

    for record in usage {
        let dbus = record.dbu_quantity;
        let spend = dbus * dbu_unit_price;

        summary.total_dbus += dbus;
        summary.total_spend += spend;

        summary
            .by_product
            .entry(record.sku_category.clone())
            .or_default()
            .add(dbus, spend);
        if let Some(cluster_id) = &record.cluster_id {
            summary
                .by_cluster
                .entry(cluster_id.clone())
                .or_default()
                .add(dbus, spend);
        }
        if let Some(job_id) = &record.job_id {
            summary
                .by_job
                .entry(job_id.clone())
                .or_default()
                .add(dbus, spend);
        }
        if let Some(warehouse_id) = &record.warehouse_id {
            summary
                .by_warehouse
                .entry(warehouse_id.clone())
                .or_default()
                .add(dbus, spend);
        }
        if let Some(user) = &record.user {
            summary
                .by_user
                .entry(user.clone())
                .or_default()
                .add(dbus, spend);
        }

        if record.is_tagged() {
            summary.tagged_spend += spend;
        }
        if record.is_weekend() {
            summary.weekend_spend += spend;
        } else {
            weekday_spend += spend;
        }
    }

    summary.projected_monthly_dbus = summary.total_dbus * factor;
    summary.projected_monthly_spend = summary.total_spend * factor;
    if summary.total_spend > 0.0 {
        summary.tag_compliance_ratio = summary.tagged_spend / summary.total_spend;
        summary.weekend_ratio = summary.weekend_spend / summary.total_spend;
    }
    let weekday_avg = weekday_spend / 5.0;
    if weekday_avg > 0.0 {
        summary.weekend_to_weekday_avg_ratio = (summary.weekend_spend / 2.0) / weekday_avg;
    }

    summary
}

/// Governance detectors over the aggregated spend: untagged attribution gaps
/// and weekend/off-hours waste.
pub fn detect_governance(summary: &CostSummary, thresholds: &Thresholds) -> Vec<Finding> {
    let mut findings = Vec::new();
    if summary.total_spend <= 0.0 {
        return findings;
    }
    let factor = summary.monthly_factor();

    let untagged_pct = (1.0 - summary.tag_compliance_ratio) * 100.0;
    if untagged_pct > thresholds.untagged_spend_threshold_pct {
        let untagged_monthly = (summary.total_spend - summary.tagged_spend) * factor;
        findings.push(Finding {
            category: FindingCategory::TaggingGap,
            resource_id: "workspace".into(),
            severity: if untagged_pct > 50.0 {
                Severity::High
            } else {
                Severity::Medium
            },
            summary: format!(
                "{untagged_pct:.0}% of spend carries no custom tags and cannot be attributed to a team or project"
            ),
            evidence: vec![
                Evidence::new("untagged_spend_pct", untagged_pct),
                Evidence::new("untagged_monthly_spend", untagged_monthly),
            ],
            confidence: 0.9,
            // Attribution alone does not save money; the payoff is the waste
            // it exposes, estimated at 10% of the unattributed spend.
            estimated_monthly_savings: untagged_monthly * 0.1,
        });
    }

    let ratio = summary.weekend_to_weekday_avg_ratio;
    if ratio > thresholds.weekend_ratio_threshold && summary.weekend_spend > 0.0 {
        let weekend_monthly = summary.weekend_spend * factor;
        let wasted = weekend_monthly * 0.7;
        findings.push(Finding {
            category: FindingCategory::WeekendWaste,
            resource_id: "workspace".into(),
            severity: if wasted > 50.0 {
                Severity::High
            } else {
                Severity::Medium
            },
            summary: format!(
                "weekend usage runs at {:.0}% of weekday levels; likely forgotten clusters or notebooks",
                ratio * 100.0
            ),
            evidence: vec![
                Evidence::new("weekend_to_weekday_ratio", ratio),
                Evidence::new("weekend_monthly_spend", weekend_monthly),
            ],
            confidence: 0.7,
            estimated_monthly_savings: wasted,
        });
    }

    findings
}
