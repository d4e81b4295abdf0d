//! Cluster rightsizing from node-level utilization samples, plus the static
//! configuration checks (auto-termination, autoscale effectiveness).
//!
//! Classification precedence is fixed: Idle, then Under-provisioned, then
//! Over-provisioned, then Right-sized - first match wins. The over-provision
//! CPU bound is inclusive (a worker sitting exactly on the P50 CPU threshold
//! still classifies as over-provisioned).

use std::collections::BTreeMap;

use crate::analyzer::cost::CostSummary;
use crate::analyzer::report::{Evidence, Finding, FindingCategory, Severity};
use crate::config::AnalysisConfig;
use crate::model::{ClusterConfig, Component, UtilizationSample};
use crate::stats::{mean, percentile};

/// Percentile and time-fraction statistics for one cluster component.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ComponentStats {
    pub cpu_mean: f64,
    pub cpu_p50: f64,
    pub cpu_p90: f64,
    pub mem_p50: f64,
    pub mem_p95: f64,
    /// Fraction of time-weighted duration below the idle CPU threshold.
    pub idle_time_fraction: f64,
    /// Fraction of time-weighted duration above the under-provision CPU
    /// threshold.
    pub hot_time_fraction: f64,
    pub sample_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizingClass {
    Idle,
    UnderProvisioned,
    OverProvisioned,
    RightSized,
}

/// Weight each sample by the gap to the next sample from the same series;
/// the last sample reuses the preceding gap (or 1s for singletons) so it
/// still carries weight.
fn time_weights(samples: &[&UtilizationSample]) -> Vec<f64> {
    let n = samples.len();
    let mut weights = vec![1.0; n];
    for i in 0..n.saturating_sub(1) {
        let gap = (samples[i + 1].timestamp - samples[i].timestamp)
            .num_seconds()
            .max(0) as f64;
        weights[i] = gap.max(1.0);
    }
    if n >= 2 {
        weights[n - 1] = weights[n - 2];
    }
    weights
}

/// Compute stats over one component's samples, already sorted by timestamp.
pub fn component_stats(samples: &[&UtilizationSample], config: &AnalysisConfig) -> ComponentStats {
    if samples.is_empty() {
        return ComponentStats::default();
    }
    let cpu: Vec<f64> = samples.iter().map(|s| s.cpu_percent).collect();
    let mem: Vec<f64> = samples.iter().map(|s| s.memory_percent()).collect();

    let weights = time_weights(samples);
    let total_weight: f64 = weights.iter().sum();
    let mut idle_weight = 0.0;
    let mut hot_weight = 0.0;
    for (sample, weight) in samples.iter().zip(&weights) {
        if sample.cpu_percent < config.thresholds.idle_cpu_threshold_pct {
            idle_weight += weight;
        }
        if sample.cpu_percent > config.thresholds.under_provision_cpu_pct {
            hot_weight += weight;
        }
    }

    ComponentStats {
        cpu_mean: mean(&cpu),
        cpu_p50: percentile(&cpu, 50.0),
        cpu_p90: percentile(&cpu, 90.0),
        mem_p50: percentile(&mem, 50.0),
        mem_p95: percentile(&mem, 95.0),
        idle_time_fraction: idle_weight / total_weight,
        hot_time_fraction: hot_weight / total_weight,
        sample_count: samples.len(),
    }
}

/// First-match-wins classification of the worker component.
pub fn classify(worker: &ComponentStats, config: &AnalysisConfig) -> SizingClass {
    let t = &config.thresholds;
    if worker.idle_time_fraction >= t.idle_time_fraction {
        return SizingClass::Idle;
    }
    if worker.cpu_p90 > t.under_provision_cpu_pct || worker.mem_p95 > t.under_provision_memory_pct {
        return SizingClass::UnderProvisioned;
    }
    if worker.cpu_p50 <= t.over_provision_cpu_pct && worker.mem_p50 < t.over_provision_memory_pct {
        return SizingClass::OverProvisioned;
    }
    SizingClass::RightSized
}

/// Run the rightsizing detectors over all clusters with utilization data,
/// plus configuration checks for every known cluster.
pub fn analyze(
    samples: &[UtilizationSample],
    clusters: &[ClusterConfig],
    cost: &CostSummary,
    config: &AnalysisConfig,
) -> (Vec<Finding>, Vec<String>) {
    let mut findings = Vec::new();
    let mut notes = Vec::new();
    let factor = config.window.monthly_factor();

    let configs: BTreeMap<&str, &ClusterConfig> = clusters
        .iter()
        .map(|c| (c.cluster_id.as_str(), c))
        .collect();

    // Group by cluster, then split per component sorted by timestamp.
    let mut by_cluster: BTreeMap<&str, Vec<&UtilizationSample>> = BTreeMap::new();
    for sample in samples {
        by_cluster
            .entry(sample.cluster_id.as_str())
            .or_default()
            .push(sample);
    }

    for (cluster_id, cluster_samples) in &by_cluster {
        let mut workers: Vec<&UtilizationSample> = cluster_samples
            .iter()
            .copied()
            .filter(|s| s.component == Component::Worker)
            .collect();
        let mut drivers: Vec<&UtilizationSample> = cluster_samples
            .iter()
            .copied()
            .filter(|s| s.component == Component::Driver)
            .collect();
        workers.sort_by_key(|s| s.timestamp);
        drivers.sort_by_key(|s| s.timestamp);

        if workers.len() < config.thresholds.utilization_min_samples {
            notes.push(format!(
                "cluster {cluster_id}: {} worker utilization sample(s), below the minimum of {}; rightsizing skipped",
                workers.len(),
                config.thresholds.utilization_min_samples
            ));
            continue;
        }

        let worker = component_stats(&workers, config);
        let monthly_spend = cost.cluster_spend(cluster_id) * factor;
        let cluster_dbus = cost.cluster_dbus(cluster_id);

        match classify(&worker, config) {
            SizingClass::Idle => {
                let wasted = monthly_spend * worker.idle_time_fraction;
                findings.push(Finding {
                    category: FindingCategory::IdleCluster,
                    resource_id: (*cluster_id).to_string(),
                    severity: Severity::High,
                    summary: format!(
                        "cluster spends {:.0}% of its runtime below {:.0}% CPU; likely a forgotten or misconfigured cluster",
                        worker.idle_time_fraction * 100.0,
                        config.thresholds.idle_cpu_threshold_pct
                    ),
                    evidence: vec![
                        Evidence::new("idle_time_fraction", worker.idle_time_fraction),
                        Evidence::new("worker_cpu_mean", worker.cpu_mean),
                        Evidence::new("worker_cpu_p50", worker.cpu_p50),
                        Evidence::new("window_dbus", cluster_dbus),
                    ],
                    confidence: 0.85,
                    estimated_monthly_savings: wasted,
                });
            }
            SizingClass::UnderProvisioned => {
                findings.push(Finding {
                    category: FindingCategory::UnderProvisioned,
                    resource_id: (*cluster_id).to_string(),
                    severity: Severity::Medium,
                    summary: format!(
                        "worker P90 CPU {:.0}% / P95 memory {:.0}%; sustained pressure risks slow jobs and OOM failures",
                        worker.cpu_p90, worker.mem_p95
                    ),
                    evidence: vec![
                        Evidence::new("worker_cpu_p90", worker.cpu_p90),
                        Evidence::new("worker_mem_p95", worker.mem_p95),
                        Evidence::new("hot_time_fraction", worker.hot_time_fraction),
                    ],
                    confidence: 0.75,
                    // Upsizing costs more; flagged for reliability, not savings.
                    estimated_monthly_savings: 0.0,
                });

                // Autoscale was configured yet sustained saturation persisted:
                // the range never stretched far enough. Best-effort signal.
                if let Some(cluster_config) = configs.get(cluster_id) {
                    if cluster_config.has_autoscale()
                        && worker.hot_time_fraction >= config.thresholds.hot_time_fraction
                    {
                        findings.push(Finding {
                            category: FindingCategory::AutoscaleRangeNarrow,
                            resource_id: (*cluster_id).to_string(),
                            severity: Severity::Low,
                            summary: format!(
                                "autoscale range {}..{} never relieved sustained >{:.0}% CPU",
                                cluster_config.autoscale_min.unwrap_or(0),
                                cluster_config.autoscale_max.unwrap_or(0),
                                config.thresholds.under_provision_cpu_pct
                            ),
                            evidence: vec![
                                Evidence::new("hot_time_fraction", worker.hot_time_fraction),
                                Evidence::new(
                                    "autoscale_max",
                                    f64::from(cluster_config.autoscale_max.unwrap_or(0)),
                                ),
                            ],
                            confidence: 0.5,
                            estimated_monthly_savings: 0.0,
                        });
                    }
                }
            }
            SizingClass::OverProvisioned => {
                // Rightsizing savings are a policy assumption applied to the
                // observed DBU rate, labeled as an estimate.
                let savings = cluster_dbus
                    * factor
                    * config.dbu_unit_price
                    * config.rightsizing_reduction_factor;
                findings.push(Finding {
                    category: FindingCategory::OverProvisioned,
                    resource_id: (*cluster_id).to_string(),
                    severity: Severity::Medium,
                    summary: format!(
                        "worker P50 CPU {:.0}% and P50 memory {:.0}%; estimated {:.0}% reduction from downsizing",
                        worker.cpu_p50,
                        worker.mem_p50,
                        config.rightsizing_reduction_factor * 100.0
                    ),
                    evidence: vec![
                        Evidence::new("worker_cpu_p50", worker.cpu_p50),
                        Evidence::new("worker_mem_p50", worker.mem_p50),
                        Evidence::new("window_dbus", cluster_dbus),
                        Evidence::new("reduction_factor", config.rightsizing_reduction_factor),
                    ],
                    confidence: 0.7,
                    estimated_monthly_savings: savings,
                });
            }
            SizingClass::RightSized => {}
        }

        // Driver bottleneck check, independent of the primary classification.
        if drivers.len() >= config.thresholds.utilization_min_samples {
            let driver = component_stats(&drivers, config);
            let gap = driver.cpu_p50 - worker.cpu_p50;
            if gap > 30.0 {
                findings.push(Finding {
                    category: FindingCategory::DriverImbalance,
                    resource_id: (*cluster_id).to_string(),
                    severity: Severity::Medium,
                    summary: format!(
                        "driver P50 CPU {:.0}% vs worker {:.0}%; work is concentrating on the driver while workers sit paid and idle",
                        driver.cpu_p50, worker.cpu_p50
                    ),
                    evidence: vec![
                        Evidence::new("driver_cpu_p50", driver.cpu_p50),
                        Evidence::new("worker_cpu_p50", worker.cpu_p50),
                        Evidence::new("cpu_gap_points", gap),
                    ],
                    confidence: 0.6,
                    estimated_monthly_savings: monthly_spend * 0.15,
                });
            }
        }
    }

    // Configured clusters with no utilization at all never yield a sizing
    // finding; record the gap instead.
    for cluster in clusters {
        if !by_cluster.contains_key(cluster.cluster_id.as_str()) {
            notes.push(format!(
                "cluster {}: no utilization samples in window; rightsizing skipped",
                cluster.cluster_id
            ));
        }

        if !cluster.has_auto_termination() {
            let monthly_spend = cost.cluster_spend(&cluster.cluster_id) * factor;
            findings.push(Finding {
                category: FindingCategory::NoAutoTermination,
                resource_id: cluster.cluster_id.clone(),
                severity: Severity::High,
                summary: "cluster has no auto-termination; once started it runs until someone remembers to stop it".into(),
                evidence: vec![Evidence::new("monthly_spend", monthly_spend)],
                confidence: 0.9,
                estimated_monthly_savings: monthly_spend * 0.4,
            });
        }
    }

    (findings, notes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::cost;
    use crate::config::AnalysisWindow;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    fn config() -> AnalysisConfig {
        AnalysisConfig::new(AnalysisWindow::new(
            NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
        ))
    }

    fn samples(cluster: &str, component: Component, cpu_mem: &[(f64, f64)]) -> Vec<UtilizationSample> {
        let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        cpu_mem
            .iter()
            .enumerate()
            .map(|(i, &(cpu, mem))| UtilizationSample {
                cluster_id: cluster.into(),
                timestamp: t0 + Duration::minutes(i as i64),
                component,
                cpu_percent: cpu,
                memory_used: mem,
                memory_total: 100.0,
            })
            .collect()
    }

    fn stats_for(cpu_mem: &[(f64, f64)]) -> ComponentStats {
        let owned = samples("c1", Component::Worker, cpu_mem);
        let refs: Vec<&UtilizationSample> = owned.iter().collect();
        component_stats(&refs, &config())
    }

    #[test]
    fn boundary_exactly_on_thresholds_is_over_provisioned() {
        // P50 CPU exactly 40 and P50 memory 69: the CPU bound is inclusive.
        let stats = ComponentStats {
            cpu_p50: 40.0,
            cpu_p90: 60.0,
            mem_p50: 69.0,
            mem_p95: 80.0,
            idle_time_fraction: 0.0,
            hot_time_fraction: 0.0,
            ..ComponentStats::default()
        };
        assert_eq!(classify(&stats, &config()), SizingClass::OverProvisioned);
    }

    #[test]
    fn memory_on_threshold_is_right_sized() {
        let stats = ComponentStats {
            cpu_p50: 40.0,
            cpu_p90: 60.0,
            mem_p50: 70.0,
            mem_p95: 80.0,
            ..ComponentStats::default()
        };
        assert_eq!(classify(&stats, &config()), SizingClass::RightSized);
    }

    #[test]
    fn idle_takes_precedence_over_over_provisioned() {
        let stats = ComponentStats {
            cpu_p50: 2.0,
            cpu_p90: 4.0,
            mem_p50: 10.0,
            mem_p95: 20.0,
            idle_time_fraction: 0.9,
            hot_time_fraction: 0.0,
            ..ComponentStats::default()
        };
        assert_eq!(classify(&stats, &config()), SizingClass::Idle);
    }

    #[test]
    fn high_p90_cpu_is_under_provisioned() {
        let stats = ComponentStats {
            cpu_p50: 60.0,
            cpu_p90: 92.0,
            mem_p50: 50.0,
            mem_p95: 70.0,
            ..ComponentStats::default()
        };
        assert_eq!(classify(&stats, &config()), SizingClass::UnderProvisioned);
    }

    #[test]
    fn stats_percentiles_are_monotone() {
        let data: Vec<(f64, f64)> = (0..50).map(|i| ((i * 2) as f64, (i % 30) as f64)).collect();
        let stats = stats_for(&data);
        assert!(stats.cpu_p50 <= stats.cpu_p90);
        assert!(stats.mem_p50 <= stats.mem_p95);
    }

    #[test]
    fn cluster_without_samples_notes_not_findings() {
        let clusters = vec![ClusterConfig {
            cluster_id: "ghost".into(),
            owner: None,
            autoscale_min: None,
            autoscale_max: None,
            auto_termination_minutes: Some(30),
            source_type: "UI".into(),
        }];
        let cfg = config();
        let summary = cost::aggregate(&[], &cfg.window, cfg.dbu_unit_price);
        let (findings, notes) = analyze(&[], &clusters, &summary, &cfg);
        assert!(findings.is_empty());
        assert_eq!(notes.len(), 1);
        assert!(notes[0].contains("ghost"));
    }

    #[test]
    fn missing_auto_termination_is_flagged() {
        let clusters = vec![ClusterConfig {
            cluster_id: "dev".into(),
            owner: Some("bob@example.com".into()),
            autoscale_min: None,
            autoscale_max: None,
            auto_termination_minutes: Some(0),
            source_type: "UI".into(),
        }];
        let cfg = config();
        let summary = cost::aggregate(&[], &cfg.window, cfg.dbu_unit_price);
        let (findings, _) = analyze(&[], &clusters, &summary, &cfg);
        assert!(findings
            .iter()
            .any(|f| f.category == FindingCategory::NoAutoTermination && f.resource_id == "dev"));
    }

    #[test]
    fn driver_bottleneck_is_independent_of_classification() {
        let mut all = samples(
            "c1",
            Component::Worker,
            &vec![(50.0, 75.0); 20],
        );
        all.extend(samples("c1", Component::Driver, &vec![(90.0, 40.0); 20]));
        let cfg = config();
        let summary = cost::aggregate(&[], &cfg.window, cfg.dbu_unit_price);
        let (findings, _) = analyze(&all, &[], &summary, &cfg);
        assert!(findings
            .iter()
            .any(|f| f.category == FindingCategory::DriverImbalance));
        // Right-sized worker: no sizing finding.
        assert!(!findings.iter().any(|f| matches!(
            f.category,
            FindingCategory::IdleCluster
                | FindingCategory::OverProvisioned
                | FindingCategory::UnderProvisioned
        )));
    }
}
