//! SQL query history heuristics. Statement previews are free-text fragments,
//! so every check here is a token-level regex scan, never a parse.

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;

use crate::analyzer::cost::CostSummary;
use crate::analyzer::report::{Evidence, Finding, FindingCategory, Severity};
use crate::config::AnalysisConfig;
use crate::model::QueryRecord;

/// Statement types where a missing WHERE clause means a full-table scan or a
/// full-table write.
const FILTERABLE_TYPES: [&str; 4] = ["SELECT", "UPDATE", "DELETE", "MERGE"];

struct SqlPatterns {
    select_star: Regex,
    where_clause: Regex,
    join: Regex,
}

impl SqlPatterns {
    fn new() -> Self {
        Self {
            select_star: Regex::new(r"(?i)select\s+\*").unwrap(),
            where_clause: Regex::new(r"(?i)\bwhere\b").unwrap(),
            join: Regex::new(r"(?i)\bjoin\b").unwrap(),
        }
    }
}

/// Per-warehouse pattern tallies.
#[derive(Debug, Default)]
struct WarehousePatterns {
    total_queries: usize,
    select_star: usize,
    missing_where: usize,
    join_heavy: usize,
    spilling: usize,
    spilled_bytes: u64,
    shuffle_heavy: usize,
    shuffle_bytes: u64,
    users: BTreeSet<String>,
}

pub fn analyze(
    queries: &[QueryRecord],
    cost: &CostSummary,
    config: &AnalysisConfig,
) -> (Vec<Finding>, Vec<String>) {
    let mut findings = Vec::new();
    let notes = Vec::new();
    let factor = config.window.monthly_factor();
    let patterns = SqlPatterns::new();

    let mut by_warehouse: BTreeMap<&str, WarehousePatterns> = BTreeMap::new();
    for query in queries {
        let tally = by_warehouse.entry(query.warehouse_id.as_str()).or_default();
        tally.total_queries += 1;
        if let Some(user) = &query.user {
            tally.users.insert(user.clone());
        }

        let preview = &query.statement_preview;
        if patterns.select_star.is_match(preview) {
            tally.select_star += 1;
        }
        let statement_type = query.statement_type.to_ascii_uppercase();
        if FILTERABLE_TYPES.contains(&statement_type.as_str())
            && !preview.trim().is_empty()
            && !patterns.where_clause.is_match(preview)
        {
            tally.missing_where += 1;
        }
        if patterns.join.find_iter(preview).count() >= config.thresholds.excessive_join_count {
            tally.join_heavy += 1;
        }
        if query.spilled_bytes > config.thresholds.spill_bytes_threshold {
            tally.spilling += 1;
            tally.spilled_bytes += query.spilled_bytes;
        }
        if query.shuffle_bytes > config.thresholds.shuffle_bytes_threshold {
            tally.shuffle_heavy += 1;
            tally.shuffle_bytes += query.shuffle_bytes;
        }
    }

    for (warehouse_id, tally) in &by_warehouse {
        let monthly_spend = cost.warehouse_spend(warehouse_id) * factor;
        let resource_id = (*warehouse_id).to_string();

        if tally.select_star > 0 {
            findings.push(Finding {
                category: FindingCategory::SelectStar,
                resource_id: resource_id.clone(),
                severity: Severity::Medium,
                summary: format!(
                    "{} of {} queries use SELECT *; column pruning never kicks in",
                    tally.select_star, tally.total_queries
                ),
                evidence: vec![
                    Evidence::new("select_star_queries", tally.select_star as f64),
                    Evidence::new("total_queries", tally.total_queries as f64),
                ],
                confidence: 0.8,
                estimated_monthly_savings: monthly_spend * 0.05,
            });
        }

        if tally.missing_where > 0 {
            findings.push(Finding {
                category: FindingCategory::MissingWhere,
                resource_id: resource_id.clone(),
                severity: Severity::High,
                summary: format!(
                    "{} filterable statement(s) scan or rewrite whole tables with no WHERE clause",
                    tally.missing_where
                ),
                evidence: vec![Evidence::new(
                    "unfiltered_statements",
                    tally.missing_where as f64,
                )],
                confidence: 0.7,
                estimated_monthly_savings: monthly_spend * 0.1,
            });
        }

        if tally.join_heavy > 0 {
            findings.push(Finding {
                category: FindingCategory::ExcessiveJoins,
                resource_id: resource_id.clone(),
                severity: Severity::Medium,
                summary: format!(
                    "{} queries chain {} or more joins; consider pre-joined intermediate tables",
                    tally.join_heavy, config.thresholds.excessive_join_count
                ),
                evidence: vec![Evidence::new("join_heavy_queries", tally.join_heavy as f64)],
                confidence: 0.6,
                estimated_monthly_savings: 0.0,
            });
        }

        if tally.spilling > 0 {
            // Fixing spill means paying for a bigger warehouse. The estimate
            // is negative: a cost increase traded for faster queries.
            let upsize_cost = monthly_spend * config.warehouse_upsize_cost_factor;
            findings.push(Finding {
                category: FindingCategory::DiskSpill,
                resource_id: resource_id.clone(),
                severity: Severity::Medium,
                summary: format!(
                    "{} queries spilled {:.1} GiB to disk; memory is undersized for this workload",
                    tally.spilling,
                    tally.spilled_bytes as f64 / (1u64 << 30) as f64
                ),
                evidence: vec![
                    Evidence::new("spilling_queries", tally.spilling as f64),
                    Evidence::new("spilled_bytes", tally.spilled_bytes as f64),
                ],
                confidence: 0.85,
                estimated_monthly_savings: -upsize_cost,
            });
        }

        if tally.shuffle_heavy > 0 {
            findings.push(Finding {
                category: FindingCategory::ShuffleHeavy,
                resource_id: resource_id.clone(),
                severity: Severity::Low,
                summary: format!(
                    "{} queries shuffle {:.1} GiB or more each; look at join keys and clustering",
                    tally.shuffle_heavy,
                    config.thresholds.shuffle_bytes_threshold as f64 / (1u64 << 30) as f64
                ),
                evidence: vec![
                    Evidence::new("shuffle_heavy_queries", tally.shuffle_heavy as f64),
                    Evidence::new("shuffle_bytes", tally.shuffle_bytes as f64),
                ],
                confidence: 0.6,
                estimated_monthly_savings: 0.0,
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
    use crate::model::UsageRecord;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn config() -> AnalysisConfig {
        AnalysisConfig::new(AnalysisWindow::new(
            NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(),
        ))
    }

    fn query(id: &str, preview: &str, statement_type: &str) -> QueryRecord {
        QueryRecord {
            statement_id: id.into(),
            warehouse_id: "wh1".into(),
            user: Some("alice@example.com".into()),
            duration_ms: 1200,
            read_bytes: 0,
            spilled_bytes: 0,
            shuffle_bytes: 0,
            statement_preview: preview.into(),
            statement_type: statement_type.into(),
        }
    }

    fn wh_usage(dbus: f64) -> UsageRecord {
        UsageRecord {
            usage_date: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            cluster_id: None,
            job_id: None,
            warehouse_id: Some("wh1".into()),
            user: None,
            sku_category: "SQL".into(),
            dbu_quantity: dbus,
            tags: BTreeMap::new(),
        }
    }

    fn summary() -> CostSummary {
        let cfg = config();
        cost::aggregate(&[wh_usage(200.0)], &cfg.window, cfg.dbu_unit_price)
    }

    #[test]
    fn select_star_is_case_insensitive() {
        let queries = vec![
            query("q1", "Select  *  from events", "SELECT"),
            query("q2", "select id from events where id = 1", "SELECT"),
        ];
        let (findings, _) = analyze(&queries, &summary(), &config());
        let f = findings
            .iter()
            .find(|f| f.category == FindingCategory::SelectStar)
            .unwrap();
        assert_eq!(f.evidence[0].value, 1.0);
    }

    #[test]
    fn missing_where_only_applies_to_filterable_types() {
        let queries = vec![
            query("q1", "DELETE FROM staging_events", "DELETE"),
            query("q2", "INSERT INTO t VALUES (1)", "INSERT"),
            query("q3", "SELECT a FROM t WHERE a > 0", "SELECT"),
        ];
        let (findings, _) = analyze(&queries, &summary(), &config());
        let f = findings
            .iter()
            .find(|f| f.category == FindingCategory::MissingWhere)
            .unwrap();
        assert_eq!(f.severity, Severity::High);
        assert_eq!(f.evidence[0].value, 1.0);
    }

    #[test]
    fn join_count_uses_word_boundaries() {
        // "joined_at" must not count as a JOIN token.
        let many_joins = "select * from a join b on 1=1 join c on 1=1 left join d on 1=1 \
                          inner join e on 1=1 cross join f where joined_at > now()";
        let queries = vec![query("q1", many_joins, "SELECT")];
        let (findings, _) = analyze(&queries, &summary(), &config());
        assert!(findings
            .iter()
            .any(|f| f.category == FindingCategory::ExcessiveJoins));

        let few = vec![query("q2", "select joined_at from a join b on 1=1", "SELECT")];
        let (findings, _) = analyze(&few, &summary(), &config());
        assert!(!findings
            .iter()
            .any(|f| f.category == FindingCategory::ExcessiveJoins));
    }

    #[test]
    fn disk_spill_reports_negative_savings() {
        let mut q = query("q1", "select a from t where a > 0", "SELECT");
        q.spilled_bytes = 5 << 30;
        let (findings, _) = analyze(&[q], &summary(), &config());
        let f = findings
            .iter()
            .find(|f| f.category == FindingCategory::DiskSpill)
            .unwrap();
        assert_eq!(f.severity, Severity::Medium);
        // $100 window spend x 3 monthly factor x 0.2 upsize factor, negated.
        assert!((f.estimated_monthly_savings + 60.0).abs() < 1e-9);
    }

    #[test]
    fn empty_previews_are_not_unfiltered() {
        let queries = vec![query("q1", "", "SELECT")];
        let (findings, _) = analyze(&queries, &summary(), &config());
        assert!(!findings
            .iter()
            .any(|f| f.category == FindingCategory::MissingWhere));
    }
}
