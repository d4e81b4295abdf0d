//! Turns findings into ranked, dollar-quantified recommendations.
//!
//! One recommendation per finding category: findings for the same category
//! are merged (savings summed, resource ids collected, highest severity
//! kept), then mapped through a fixed per-category template. Ranking is
//! stable: estimated savings descending, severity as the tie-breaker, input
//! order preserved beyond that.

use std::collections::{BTreeMap, BTreeSet};

use crate::analyzer::report::{Finding, FindingCategory, Recommendation, Severity};

struct Template {
    title: &'static str,
    rationale: &'static str,
    steps: &'static [&'static str],
}

fn template(category: FindingCategory) -> Template {
    match category {
        FindingCategory::IdleCluster => Template {
            title: "Stop or downsize idle clusters",
            rationale: "These clusters sit below the idle CPU threshold for most of their billed runtime.",
            steps: &[
                "Confirm with the owner that the cluster is not reserved for ad-hoc work",
                "Terminate the cluster, or lower auto-termination to 15-30 minutes",
                "Move intermittent workloads to job clusters that start on demand",
            ],
        },
        FindingCategory::OverProvisioned => Template {
            title: "Downsize over-provisioned clusters",
            rationale: "Median CPU and memory both run well under capacity; a smaller node type or fewer workers covers the same load.",
            steps: &[
                "Step the worker count or node size down one notch and re-check utilization",
                "Prefer autoscaling with a lower minimum over a fixed large size",
            ],
        },
        FindingCategory::UnderProvisioned => Template {
            title: "Relieve resource pressure on hot clusters",
            rationale: "Sustained high CPU or memory pressure slows jobs and risks OOM restarts that cost more than the hardware saved.",
            steps: &[
                "Raise the autoscale maximum or move to a larger node type",
                "Check for skewed partitions before scaling hardware",
            ],
        },
        FindingCategory::DriverImbalance => Template {
            title: "Push work off busy drivers",
            rationale: "The driver works far harder than the workers, which means collected data or driver-side loops while paid workers idle.",
            steps: &[
                "Replace collect()/toPandas() on large frames with distributed operations",
                "Audit driver-side loops over rows or files",
            ],
        },
        FindingCategory::AutoscaleRangeNarrow => Template {
            title: "Widen autoscale ranges that never relieve pressure",
            rationale: "Autoscaling is enabled but the cluster still saturates for long stretches, so the configured maximum is doing nothing.",
            steps: &[
                "Raise the autoscale maximum and observe whether saturation drops",
            ],
        },
        FindingCategory::NoAutoTermination => Template {
            title: "Enable auto-termination everywhere",
            rationale: "Clusters without auto-termination keep billing after the last command until a human stops them.",
            steps: &[
                "Set auto-termination to 30-60 minutes on every all-purpose cluster",
                "Enforce it with a cluster policy so new clusters inherit it",
            ],
        },
        FindingCategory::LongRunningWarehouse => Template {
            title: "Cut warehouse auto-stop timers",
            rationale: "Warehouses stayed up for long unbroken stretches that interactive usage does not explain.",
            steps: &[
                "Reduce the warehouse auto-stop to 10-15 minutes",
                "Split always-on workloads onto a dedicated warehouse sized for them",
            ],
        },
        FindingCategory::UpscaledWarehouse => Template {
            title: "Tune warehouse scaling bounds",
            rationale: "Extended time spent scaled up means the extra clusters became the steady state rather than a burst response.",
            steps: &[
                "Lower max clusters, or raise the base size if the load is constant",
                "Review query queueing before allowing more clusters",
            ],
        },
        FindingCategory::HighFailureJob => Template {
            title: "Fix jobs that fail repeatedly",
            rationale: "Failed runs consume full compute without producing output; their spend is pure waste.",
            steps: &[
                "Inspect the failing runs' error output and fix the root cause",
                "Add retry limits so broken jobs stop re-running unattended",
            ],
        },
        FindingCategory::ShortRunOverhead => Template {
            title: "Batch short job runs or go serverless",
            rationale: "When the median run is shorter than cluster spin-up, most of the bill is startup overhead.",
            steps: &[
                "Consolidate frequent short runs into fewer batched runs",
                "Move the job to serverless or a warm cluster pool",
            ],
        },
        FindingCategory::SelectStar => Template {
            title: "Replace SELECT * with explicit columns",
            rationale: "Reading every column defeats column pruning on wide tables and inflates scan cost.",
            steps: &[
                "List the needed columns in the hottest queries first",
            ],
        },
        FindingCategory::MissingWhere => Template {
            title: "Add filters to full-table statements",
            rationale: "Statements without a WHERE clause scan or rewrite entire tables on every execution.",
            steps: &[
                "Add partition or date filters to the unfiltered statements",
                "Verify DELETE and UPDATE statements really intend to touch every row",
            ],
        },
        FindingCategory::ExcessiveJoins => Template {
            title: "Pre-join heavily joined tables",
            rationale: "Queries chaining many joins re-pay the same join cost on every run.",
            steps: &[
                "Materialize a pre-joined intermediate table for the common join spine",
            ],
        },
        FindingCategory::DiskSpill => Template {
            title: "Upsize warehouses that spill to disk",
            rationale: "Disk spill multiplies query runtime; a larger warehouse costs more per hour but finishes far sooner. This is a deliberate spend increase.",
            steps: &[
                "Move the spilling workload one warehouse size up and re-measure",
                "Check for exploding joins before accepting the larger size",
            ],
        },
        FindingCategory::ShuffleHeavy => Template {
            title: "Reduce shuffle volume",
            rationale: "Very large shuffles dominate query time and network cost.",
            steps: &[
                "Cluster or partition the involved tables on the join keys",
            ],
        },
        FindingCategory::TaggingGap => Template {
            title: "Close the cost attribution gap",
            rationale: "Untagged spend cannot be attributed to a team, which hides exactly the waste this report estimates elsewhere.",
            steps: &[
                "Apply team/project tags through cluster and warehouse policies",
                "Make tags mandatory for new compute via policy enforcement",
            ],
        },
        FindingCategory::WeekendWaste => Template {
            title: "Shut down weekend compute",
            rationale: "Weekend usage tracks weekday levels even though little scheduled work runs then.",
            steps: &[
                "Schedule cluster and warehouse shutdown for Friday evening",
                "Audit jobs scheduled on weekends for business need",
            ],
        },
    }
}

#[derive(Default)]
struct MergedGroup {
    severity: Option<Severity>,
    savings: f64,
    resources: BTreeSet<String>,
    count: usize,
}

/// Build the ranked recommendation list from the full finding set.
pub fn build(findings: &[Finding]) -> Vec<Recommendation> {
    let mut groups: BTreeMap<FindingCategory, MergedGroup> = BTreeMap::new();
    for finding in findings {
        let group = groups.entry(finding.category).or_default();
        group.savings += finding.estimated_monthly_savings;
        group.resources.insert(finding.resource_id.clone());
        group.count += 1;
        group.severity = Some(match group.severity {
            Some(s) if s.priority() >= finding.severity.priority() => s,
            _ => finding.severity,
        });
    }

    let mut recommendations: Vec<Recommendation> = groups
        .into_iter()
        .map(|(category, group)| {
            let t = template(category);
            let rationale = if group.count == 1 {
                t.rationale.to_string()
            } else {
                format!("{} ({} resources affected)", t.rationale, group.resources.len())
            };
            Recommendation {
                title: t.title.to_string(),
                severity: group.severity.unwrap_or(Severity::Low),
                estimated_monthly_savings: group.savings,
                rationale,
                remediation_steps: t.steps.iter().map(|s| (*s).to_string()).collect(),
                affected_resource_ids: group.resources,
            }
        })
        .collect();

    // Stable: equal savings and severity keep category order.
    recommendations.sort_by(|a, b| {
        b.estimated_monthly_savings
            .partial_cmp(&a.estimated_monthly_savings)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.severity.priority().cmp(&a.severity.priority()))
    });

    recommendations
}
