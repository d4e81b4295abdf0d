use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::analyzer::cost::CostSummary;

/// Severity level for findings and recommendations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn priority(&self) -> u8 {
        match self {
            Severity::High => 3,
            Severity::Medium => 2,
            Severity::Low => 1,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
        }
    }
}

/// One detection rule. Each finding belongs to exactly one category, and
/// categories address independent cost dimensions - savings are never merged
/// across them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FindingCategory {
    IdleCluster,
    OverProvisioned,
    UnderProvisioned,
    DriverImbalance,
    AutoscaleRangeNarrow,
    NoAutoTermination,
    LongRunningWarehouse,
    UpscaledWarehouse,
    HighFailureJob,
    ShortRunOverhead,
    SelectStar,
    MissingWhere,
    ExcessiveJoins,
    DiskSpill,
    ShuffleHeavy,
    TaggingGap,
    WeekendWaste,
}

impl FindingCategory {
    pub fn label(&self) -> &str {
        match self {
            FindingCategory::IdleCluster => "Idle Cluster",
            FindingCategory::OverProvisioned => "Over-Provisioned Cluster",
            FindingCategory::UnderProvisioned => "Under-Provisioned Cluster",
            FindingCategory::DriverImbalance => "Driver/Worker Imbalance",
            FindingCategory::AutoscaleRangeNarrow => "Autoscale Range Too Narrow",
            FindingCategory::NoAutoTermination => "Missing Auto-Termination",
            FindingCategory::LongRunningWarehouse => "Long-Running Warehouse",
            FindingCategory::UpscaledWarehouse => "Warehouse Stuck Scaled Up",
            FindingCategory::HighFailureJob => "High Job Failure Rate",
            FindingCategory::ShortRunOverhead => "Short-Run Startup Overhead",
            FindingCategory::SelectStar => "SELECT * Queries",
            FindingCategory::MissingWhere => "Unfiltered Queries",
            FindingCategory::ExcessiveJoins => "Join-Heavy Queries",
            FindingCategory::DiskSpill => "Disk Spill",
            FindingCategory::ShuffleHeavy => "Shuffle-Heavy Queries",
            FindingCategory::TaggingGap => "Untagged Spend",
            FindingCategory::WeekendWaste => "Weekend Waste",
        }
    }
}

/// One labeled numeric value supporting a classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub label: String,
    pub value: f64,
}

impl Evidence {
    pub fn new(label: impl Into<String>, value: f64) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

/// A single detected anomaly tied to one resource and one detection rule.
/// Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub category: FindingCategory,
    pub resource_id: String,
    pub severity: Severity,
    pub summary: String,
    pub evidence: Vec<Evidence>,
    /// 0.0..=1.0; heuristics report lower values.
    pub confidence: f64,
    /// Dollar impact per month derived from the evidence above. Negative when
    /// the remediation trades money for performance.
    pub estimated_monthly_savings: f64,
}

/// A user-facing, dollar-quantified action derived from one or more findings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub title: String,
    pub severity: Severity,
    /// Signed: negative values represent a deliberate cost increase,
    /// presented as a performance trade-off rather than dropped.
    pub estimated_monthly_savings: f64,
    pub rationale: String,
    pub remediation_steps: Vec<String>,
    pub affected_resource_ids: BTreeSet<String>,
}

/// The complete, fully resolved output of one analysis run. The rendering
/// layer formats this without further computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub total_period_spend: f64,
    pub projected_monthly_spend: f64,
    pub cost: CostSummary,
    pub findings: Vec<Finding>,
    pub recommendations: Vec<Recommendation>,
    /// Gaps in the input data: skipped records, resources with too few
    /// samples for a detector to classify.
    pub completeness_notes: Vec<String>,
}

impl AnalysisReport {
    pub fn high_count(&self) -> usize {
        self.recommendations
            .iter()
            .filter(|r| r.severity == Severity::High)
            .count()
    }

    pub fn medium_count(&self) -> usize {
        self.recommendations
            .iter()
            .filter(|r| r.severity == Severity::Medium)
            .count()
    }

    pub fn low_count(&self) -> usize {
        self.recommendations
            .iter()
            .filter(|r| r.severity == Severity::Low)
            .count()
    }

    /// Net of positive and negative estimates.
    pub fn total_estimated_savings(&self) -> f64 {
        self.recommendations
            .iter()
            .map(|r| r.estimated_monthly_savings)
            .sum()
    }
}

/// Format a dollar amount with thousands separators, e.g. `$12,345.67`.
pub fn format_currency(amount: f64) -> String {
    let negative = amount < 0.0;
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = cents / 100;
    let frac = cents % 100;

    let digits = whole.to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    if negative {
        format!("-${grouped}.{frac:02}")
    } else {
        format!("${grouped}.{frac:02}")
    }
}
