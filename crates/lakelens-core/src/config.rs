use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// The closed analysis window, as an inclusive date range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AnalysisWindow {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl AnalysisWindow {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
        }
    }

    /// Number of days covered, counting both endpoints.
    pub fn days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.days() <= 0 {
            return Err(AnalysisError::InvalidWindow {
                start: self.start_date,
                end: self.end_date,
            });
        }
        Ok(())
    }

    /// Linear scaling factor from the observed window to one month. This is
    /// the only extrapolation the engine performs.
    pub fn monthly_factor(&self) -> f64 {
        30.0 / self.days() as f64
    }

    /// First instant inside the window (UTC midnight on the start date).
    pub fn start_at(&self) -> DateTime<Utc> {
        self.start_date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .unwrap_or_else(Utc::now)
    }

    /// First instant after the window; open intervals are clipped here.
    pub fn end_at(&self) -> DateTime<Utc> {
        (self.end_date + Duration::days(1))
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .unwrap_or_else(Utc::now)
    }
}

fn d_idle_cpu() -> f64 {
    5.0
}
fn d_idle_time_fraction() -> f64 {
    0.5
}
fn d_over_cpu() -> f64 {
    40.0
}
fn d_over_mem() -> f64 {
    70.0
}
fn d_under_cpu() -> f64 {
    85.0
}
fn d_under_mem() -> f64 {
    95.0
}
fn d_hot_time_fraction() -> f64 {
    0.2
}
fn d_long_running_hours() -> f64 {
    4.0
}
fn d_upscale_hours() -> f64 {
    1.0
}
fn d_job_failure_rate() -> f64 {
    20.0
}
fn d_job_min_sample() -> usize {
    5
}
fn d_short_run_floor() -> f64 {
    60.0
}
fn d_short_run_min_runs() -> usize {
    10
}
fn d_spill_bytes() -> u64 {
    1 << 30 // 1 GiB
}
fn d_shuffle_bytes() -> u64 {
    10 << 30 // 10 GiB
}
fn d_join_count() -> usize {
    5
}
fn d_untagged_pct() -> f64 {
    20.0
}
fn d_weekend_ratio() -> f64 {
    0.15
}
fn d_util_min_samples() -> usize {
    10
}

/// Every numeric rule threshold, externalized so the decision logic stays a
/// pure function of (data, config). Defaults match the documented contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thresholds {
    /// Mean CPU below this counts a moment as idle.
    #[serde(default = "d_idle_cpu")]
    pub idle_cpu_threshold_pct: f64,
    /// Fraction of time-weighted samples that must be idle to flag a cluster.
    #[serde(default = "d_idle_time_fraction")]
    pub idle_time_fraction: f64,
    #[serde(default = "d_over_cpu")]
    pub over_provision_cpu_pct: f64,
    #[serde(default = "d_over_mem")]
    pub over_provision_memory_pct: f64,
    #[serde(default = "d_under_cpu")]
    pub under_provision_cpu_pct: f64,
    #[serde(default = "d_under_mem")]
    pub under_provision_memory_pct: f64,
    /// Sustained saturation: fraction of time above the under-provision CPU
    /// threshold that should have triggered autoscaling.
    #[serde(default = "d_hot_time_fraction")]
    pub hot_time_fraction: f64,
    #[serde(default = "d_long_running_hours")]
    pub long_running_hours: f64,
    #[serde(default = "d_upscale_hours")]
    pub upscale_hours: f64,
    #[serde(default = "d_job_failure_rate")]
    pub job_failure_rate_pct: f64,
    #[serde(default = "d_job_min_sample")]
    pub job_min_sample_size: usize,
    #[serde(default = "d_short_run_floor")]
    pub short_run_floor_secs: f64,
    #[serde(default = "d_short_run_min_runs")]
    pub short_run_min_runs: usize,
    #[serde(default = "d_spill_bytes")]
    pub spill_bytes_threshold: u64,
    #[serde(default = "d_shuffle_bytes")]
    pub shuffle_bytes_threshold: u64,
    #[serde(default = "d_join_count")]
    pub excessive_join_count: usize,
    #[serde(default = "d_untagged_pct")]
    pub untagged_spend_threshold_pct: f64,
    #[serde(default = "d_weekend_ratio")]
    pub weekend_ratio_threshold: f64,
    /// Minimum utilization samples per component before classifying.
    #[serde(default = "d_util_min_samples")]
    pub utilization_min_samples: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            idle_cpu_threshold_pct: d_idle_cpu(),
            idle_time_fraction: d_idle_time_fraction(),
            over_provision_cpu_pct: d_over_cpu(),
            over_provision_memory_pct: d_over_mem(),
            under_provision_cpu_pct: d_under_cpu(),
            under_provision_memory_pct: d_under_mem(),
            hot_time_fraction: d_hot_time_fraction(),
            long_running_hours: d_long_running_hours(),
            upscale_hours: d_upscale_hours(),
            job_failure_rate_pct: d_job_failure_rate(),
            job_min_sample_size: d_job_min_sample(),
            short_run_floor_secs: d_short_run_floor(),
            short_run_min_runs: d_short_run_min_runs(),
            spill_bytes_threshold: d_spill_bytes(),
            shuffle_bytes_threshold: d_shuffle_bytes(),
            excessive_join_count: d_join_count(),
            untagged_spend_threshold_pct: d_untagged_pct(),
            weekend_ratio_threshold: d_weekend_ratio(),
            utilization_min_samples: d_util_min_samples(),
        }
    }
}

fn d_dbu_unit_price() -> f64 {
    0.50
}
fn d_reduction_factor() -> f64 {
    0.25
}
fn d_upsize_factor() -> f64 {
    0.2
}
fn d_malformed_fraction() -> f64 {
    0.5
}

/// Complete engine configuration. Only the window is mandatory; everything
/// else has a documented default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub window: AnalysisWindow,
    #[serde(default)]
    pub thresholds: Thresholds,
    /// Average currency-per-DBU rate, normally taken from the pricing table.
    #[serde(default = "d_dbu_unit_price")]
    pub dbu_unit_price: f64,
    /// Assumed cost reduction from downsizing an over-provisioned cluster.
    /// A policy assumption, not a measurement; savings built from it are
    /// labeled as estimates.
    #[serde(default = "d_reduction_factor")]
    pub rightsizing_reduction_factor: f64,
    /// Assumed cost increase from upsizing a warehouse out of disk spill.
    #[serde(default = "d_upsize_factor")]
    pub warehouse_upsize_cost_factor: f64,
    /// Skipped-record fraction above which the run is escalated to fatal.
    #[serde(default = "d_malformed_fraction")]
    pub malformed_fraction_threshold: f64,
}

impl AnalysisConfig {
    pub fn new(window: AnalysisWindow) -> Self {
        Self {
            window,
            thresholds: Thresholds::default(),
            dbu_unit_price: d_dbu_unit_price(),
            rightsizing_reduction_factor: d_reduction_factor(),
            warehouse_upsize_cost_factor: d_upsize_factor(),
            malformed_fraction_threshold: d_malformed_fraction(),
        }
    }

    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn window_days_are_inclusive() {
        let w = AnalysisWindow::new(date(2025, 6, 1), date(2025, 6, 10));
        assert_eq!(w.days(), 10);
        assert!((w.monthly_factor() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn degenerate_window_is_invalid() {
        let w = AnalysisWindow::new(date(2025, 6, 10), date(2025, 6, 1));
        assert!(w.validate().is_err());
        let single = AnalysisWindow::new(date(2025, 6, 1), date(2025, 6, 1));
        assert!(single.validate().is_ok());
        assert_eq!(single.days(), 1);
    }

    #[test]
    fn config_defaults_from_minimal_yaml() {
        let cfg = AnalysisConfig::from_yaml(
            "window:\n  start_date: 2025-06-01\n  end_date: 2025-06-30\n",
        )
        .unwrap();
        assert_eq!(cfg.thresholds.job_min_sample_size, 5);
        assert_eq!(cfg.thresholds.spill_bytes_threshold, 1 << 30);
        assert!((cfg.dbu_unit_price - 0.50).abs() < 1e-9);
        assert!((cfg.thresholds.long_running_hours - 4.0).abs() < 1e-9);
    }

    #[test]
    fn config_overrides_apply() {
        let cfg = AnalysisConfig::from_yaml(
            "window:\n  start_date: 2025-06-01\n  end_date: 2025-06-30\nthresholds:\n  job_failure_rate_pct: 10\ndbu_unit_price: 0.62\n",
        )
        .unwrap();
        assert!((cfg.thresholds.job_failure_rate_pct - 10.0).abs() < 1e-9);
        assert!((cfg.dbu_unit_price - 0.62).abs() < 1e-9);
    }
}
