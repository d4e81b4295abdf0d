use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::AnalysisError;

/// One billing line from the platform's usage table. Immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub usage_date: NaiveDate,
    #[serde(default)]
    pub cluster_id: Option<String>,
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub warehouse_id: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    /// Billing origin product, e.g. "JOBS", "SQL", "ALL_PURPOSE".
    pub sku_category: String,
    pub dbu_quantity: f64,
    /// Custom tags attached to the billing line. Often empty.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl UsageRecord {
    /// A record counts as tagged when at least one tag has a non-empty value.
    pub fn is_tagged(&self) -> bool {
        self.tags.values().any(|v| !v.trim().is_empty())
    }

    pub fn is_weekend(&self) -> bool {
        use chrono::Datelike;
        matches!(
            self.usage_date.weekday(),
            chrono::Weekday::Sat | chrono::Weekday::Sun
        )
    }
}

/// Static cluster configuration. Describes how a cluster was set up, not how
/// it was used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub cluster_id: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub autoscale_min: Option<u32>,
    #[serde(default)]
    pub autoscale_max: Option<u32>,
    /// None or Some(0) both mean the cluster never terminates on its own.
    #[serde(default)]
    pub auto_termination_minutes: Option<u32>,
    /// Where the cluster definition came from, e.g. "UI", "JOB", "API".
    #[serde(default)]
    pub source_type: String,
}

impl ClusterConfig {
    pub fn has_autoscale(&self) -> bool {
        self.autoscale_min.is_some() && self.autoscale_max.is_some()
    }

    pub fn has_auto_termination(&self) -> bool {
        matches!(self.auto_termination_minutes, Some(m) if m > 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    Driver,
    Worker,
}

/// One node-level utilization sample. Many per cluster, ordered by timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtilizationSample {
    pub cluster_id: String,
    pub timestamp: DateTime<Utc>,
    pub component: Component,
    /// Combined user+system CPU, 0..=100.
    pub cpu_percent: f64,
    pub memory_used: f64,
    pub memory_total: f64,
}

impl UtilizationSample {
    pub fn memory_percent(&self) -> f64 {
        if self.memory_total > 0.0 {
            self.memory_used / self.memory_total * 100.0
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarehouseEventType {
    Starting,
    Running,
    ScaledUp,
    ScaledDown,
    Stopped,
}

/// A warehouse lifecycle event. Streams may be incomplete: a warehouse that
/// is still running has no terminal STOPPED event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseEvent {
    pub warehouse_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: WarehouseEventType,
    #[serde(default)]
    pub cluster_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Success,
    Failed,
    Canceled,
}

/// One finished job run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRunRecord {
    pub job_id: String,
    pub run_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub state: RunState,
    pub duration_secs: f64,
}

/// One statement from SQL query history. `statement_preview` is a free-text
/// fragment, treated as an opaque payload for token-level heuristics only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRecord {
    pub statement_id: String,
    pub warehouse_id: String,
    #[serde(default)]
    pub user: Option<String>,
    pub duration_ms: u64,
    #[serde(default)]
    pub read_bytes: u64,
    #[serde(default)]
    pub spilled_bytes: u64,
    #[serde(default)]
    pub shuffle_bytes: u64,
    #[serde(default)]
    pub statement_preview: String,
    /// e.g. "SELECT", "INSERT", "CREATE_TABLE".
    #[serde(default)]
    pub statement_type: String,
}

/// The Collector's complete output for one analysis window: one homogeneous,
/// already-deduplicated collection per record kind. The engine treats this as
/// an immutable input and never re-queries the platform.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub usage: Vec<UsageRecord>,
    #[serde(default)]
    pub clusters: Vec<ClusterConfig>,
    #[serde(default)]
    pub utilization: Vec<UtilizationSample>,
    #[serde(default)]
    pub warehouse_events: Vec<WarehouseEvent>,
    #[serde(default)]
    pub job_runs: Vec<JobRunRecord>,
    #[serde(default)]
    pub queries: Vec<QueryRecord>,
}

/// Counts of records dropped by shape checks, per kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrubReport {
    pub total: usize,
    pub skipped_usage: usize,
    pub skipped_utilization: usize,
    pub skipped_warehouse_events: usize,
    pub skipped_job_runs: usize,
    pub skipped_queries: usize,
}

impl ScrubReport {
    pub fn skipped(&self) -> usize {
        self.skipped_usage
            + self.skipped_utilization
            + self.skipped_warehouse_events
            + self.skipped_job_runs
            + self.skipped_queries
    }

    /// Escalates to a fatal error when the skipped fraction crosses the
    /// configured safety threshold.
    pub fn check(&self, max_fraction: f64) -> Result<(), AnalysisError> {
        let skipped = self.skipped();
        if self.total > 0 && (skipped as f64 / self.total as f64) > max_fraction {
            return Err(AnalysisError::ExcessiveMalformed {
                skipped,
                total: self.total,
                limit_pct: max_fraction * 100.0,
            });
        }
        Ok(())
    }

    /// Human-readable gaps for the report's completeness notes.
    pub fn notes(&self) -> Vec<String> {
        let mut notes = Vec::new();
        let mut push = |n: usize, kind: &str| {
            if n > 0 {
                notes.push(format!("skipped {n} malformed {kind} record(s)"));
            }
        };
        push(self.skipped_usage, "usage");
        push(self.skipped_utilization, "utilization");
        push(self.skipped_warehouse_events, "warehouse event");
        push(self.skipped_job_runs, "job run");
        push(self.skipped_queries, "query");
        notes
    }
}

fn finite_nonneg(v: f64) -> bool {
    v.is_finite() && v >= 0.0
}

/// Drop records failing basic shape checks and count what was dropped. The
/// Collector already validates wire formats; this only guards against values
/// the analysis math cannot tolerate.
pub fn scrub(snapshot: &Snapshot) -> (Snapshot, ScrubReport) {
    let mut report = ScrubReport {
        total: snapshot.usage.len()
            + snapshot.utilization.len()
            + snapshot.warehouse_events.len()
            + snapshot.job_runs.len()
            + snapshot.queries.len(),
        ..ScrubReport::default()
    };

    let usage: Vec<_> = snapshot
        .usage
        .iter()
        .filter(|r| {
            let ok = finite_nonneg(r.dbu_quantity) && !r.sku_category.is_empty();
            if !ok {
                report.skipped_usage += 1;
            }
            ok
        })
        .cloned()
        .collect();

    let utilization: Vec<_> = snapshot
        .utilization
        .iter()
        .filter(|s| {
            let ok = !s.cluster_id.is_empty()
                && s.cpu_percent.is_finite()
                && (0.0..=100.0).contains(&s.cpu_percent)
                && s.memory_total > 0.0
                && finite_nonneg(s.memory_used)
                && s.memory_used <= s.memory_total;
            if !ok {
                report.skipped_utilization += 1;
            }
            ok
        })
        .cloned()
        .collect();

    let warehouse_events: Vec<_> = snapshot
        .warehouse_events
        .iter()
        .filter(|e| {
            let ok = !e.warehouse_id.is_empty();
            if !ok {
                report.skipped_warehouse_events += 1;
            }
            ok
        })
        .cloned()
        .collect();

    let job_runs: Vec<_> = snapshot
        .job_runs
        .iter()
        .filter(|r| {
            let ok =
                !r.job_id.is_empty() && r.end_time >= r.start_time && finite_nonneg(r.duration_secs);
            if !ok {
                report.skipped_job_runs += 1;
            }
            ok
        })
        .cloned()
        .collect();

    let queries: Vec<_> = snapshot
        .queries
        .iter()
        .filter(|q| {
            let ok = !q.warehouse_id.is_empty() && !q.statement_id.is_empty();
            if !ok {
                report.skipped_queries += 1;
            }
            ok
        })
        .cloned()
        .collect();

    (
        Snapshot {
            usage,
            clusters: snapshot.clusters.clone(),
            utilization,
            warehouse_events,
            job_runs,
            queries,
        },
        report,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(cpu: f64, used: f64, total: f64) -> UtilizationSample {
        UtilizationSample {
            cluster_id: "c1".into(),
            timestamp: Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
            component: Component::Worker,
            cpu_percent: cpu,
            memory_used: used,
            memory_total: total,
        }
    }

    #[test]
    fn scrub_drops_out_of_range_cpu() {
        let snapshot = Snapshot {
            utilization: vec![sample(50.0, 1.0, 2.0), sample(120.0, 1.0, 2.0)],
            ..Snapshot::default()
        };
        let (clean, report) = scrub(&snapshot);
        assert_eq!(clean.utilization.len(), 1);
        assert_eq!(report.skipped_utilization, 1);
        assert_eq!(report.total, 2);
    }

    #[test]
    fn scrub_drops_zero_memory_total() {
        let snapshot = Snapshot {
            utilization: vec![sample(10.0, 0.0, 0.0)],
            ..Snapshot::default()
        };
        let (clean, report) = scrub(&snapshot);
        assert!(clean.utilization.is_empty());
        assert_eq!(report.skipped(), 1);
    }

    #[test]
    fn excessive_malformed_escalates() {
        let report = ScrubReport {
            total: 10,
            skipped_usage: 6,
            ..ScrubReport::default()
        };
        assert!(report.check(0.5).is_err());
        assert!(report.check(0.6).is_ok());
    }

    #[test]
    fn tagged_requires_non_empty_value() {
        let mut rec = UsageRecord {
            usage_date: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            cluster_id: None,
            job_id: None,
            warehouse_id: None,
            user: None,
            sku_category: "JOBS".into(),
            dbu_quantity: 1.0,
            tags: BTreeMap::new(),
        };
        assert!(!rec.is_tagged());
        rec.tags.insert("team".into(), "".into());
        assert!(!rec.is_tagged());
        rec.tags.insert("team".into(), "data-eng".into());
        assert!(rec.is_tagged());
    }
}
