//! SQL warehouse lifecycle replay. Folds the event stream per warehouse into
//! time spent in each state, then flags warehouses that stay up or stay
//! scaled up far longer than interactive use explains.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::analyzer::cost::CostSummary;
use crate::analyzer::report::{Evidence, Finding, FindingCategory, Severity};
use crate::config::AnalysisConfig;
use crate::model::{WarehouseEvent, WarehouseEventType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WarehouseState {
    Stopped,
    Running,
    ScaledUp,
}

/// Seconds spent in each state over the window, plus the longest continuous
/// span spent active (running or scaled up) without stopping.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StateDurations {
    pub running_secs: f64,
    pub scaled_up_secs: f64,
    pub stopped_secs: f64,
    pub longest_active_span_secs: f64,
}

impl StateDurations {
    pub fn active_secs(&self) -> f64 {
        self.running_secs + self.scaled_up_secs
    }
}

fn transition(event: &WarehouseEvent) -> WarehouseState {
    match event.event_type {
        WarehouseEventType::Starting | WarehouseEventType::Running => WarehouseState::Running,
        // A scale-up event with the baseline cluster count is a no-op blip;
        // only a genuinely widened fleet counts as scaled up.
        WarehouseEventType::ScaledUp if event.cluster_count > 2 => WarehouseState::ScaledUp,
        WarehouseEventType::ScaledUp | WarehouseEventType::ScaledDown => WarehouseState::Running,
        WarehouseEventType::Stopped => WarehouseState::Stopped,
    }
}

/// Replay one warehouse's events, sorted by timestamp, accumulating state
/// durations. The open interval after the last event is clipped at the
/// window end; a warehouse with no STOPPED event is charged as active until
/// then.
pub fn replay(
    events: &[&WarehouseEvent],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> StateDurations {
    let mut durations = StateDurations::default();
    let mut state = WarehouseState::Stopped;
    let mut state_since = window_start;
    let mut active_span = 0.0_f64;

    fn close_segment(
        durations: &mut StateDurations,
        state: WarehouseState,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> f64 {
        let secs = (to - from).num_seconds().max(0) as f64;
        match state {
            WarehouseState::Running => durations.running_secs += secs,
            WarehouseState::ScaledUp => durations.scaled_up_secs += secs,
            WarehouseState::Stopped => durations.stopped_secs += secs,
        }
        secs
    }

    for event in events {
        let at = event.timestamp.clamp(window_start, window_end);
        let secs = close_segment(&mut durations, state, state_since, at);
        if state == WarehouseState::Stopped {
            active_span = 0.0;
        } else {
            active_span += secs;
        }
        let next = transition(event);
        if next == WarehouseState::Stopped && state != WarehouseState::Stopped {
            durations.longest_active_span_secs = durations.longest_active_span_secs.max(active_span);
            active_span = 0.0;
        }
        state = next;
        state_since = at;
    }

    let secs = close_segment(&mut durations, state, state_since, window_end);
    if state != WarehouseState::Stopped {
        active_span += secs;
        durations.longest_active_span_secs = durations.longest_active_span_secs.max(active_span);
    }

    durations
}

/// Run the warehouse detectors over all event streams.
pub fn analyze(
    events: &[WarehouseEvent],
    cost: &CostSummary,
    config: &AnalysisConfig,
) -> (Vec<Finding>, Vec<String>) {
    let mut findings = Vec::new();
    let notes = Vec::new();
    let factor = config.window.monthly_factor();
    let window_start = config.window.start_at();
    let window_end = config.window.end_at();

    let mut by_warehouse: BTreeMap<&str, Vec<&WarehouseEvent>> = BTreeMap::new();
    for event in events {
        by_warehouse
            .entry(event.warehouse_id.as_str())
            .or_default()
            .push(event);
    }

    for (warehouse_id, mut stream) in by_warehouse {
        stream.sort_by_key(|e| e.timestamp);
        let durations = replay(&stream, window_start, window_end);
        let monthly_spend = cost.warehouse_spend(warehouse_id) * factor;

        let longest_hours = durations.longest_active_span_secs / 3600.0;
        let threshold_hours = config.thresholds.long_running_hours;
        if longest_hours > threshold_hours {
            findings.push(Finding {
                category: FindingCategory::LongRunningWarehouse,
                resource_id: warehouse_id.to_string(),
                severity: if longest_hours > threshold_hours * 2.0 {
                    Severity::High
                } else {
                    Severity::Medium
                },
                summary: format!(
                    "warehouse stayed up {longest_hours:.1}h without stopping; interactive use rarely needs more than {threshold_hours:.0}h"
                ),
                evidence: vec![
                    Evidence::new("longest_active_span_hours", longest_hours),
                    Evidence::new("total_active_hours", durations.active_secs() / 3600.0),
                ],
                confidence: 0.8,
                estimated_monthly_savings: monthly_spend * 0.3,
            });
        }

        let scaled_hours = durations.scaled_up_secs / 3600.0;
        if scaled_hours > config.thresholds.upscale_hours {
            findings.push(Finding {
                category: FindingCategory::UpscaledWarehouse,
                resource_id: warehouse_id.to_string(),
                severity: Severity::Medium,
                summary: format!(
                    "warehouse ran scaled up for {scaled_hours:.1}h; check whether max clusters or query queueing limits need tuning"
                ),
                evidence: vec![
                    Evidence::new("scaled_up_hours", scaled_hours),
                    Evidence::new("running_hours", durations.running_secs / 3600.0),
                ],
                confidence: 0.6,
                estimated_monthly_savings: monthly_spend * 0.2,
            });
        }
    }

    (findings, notes)
}
