use colored::*;
use lakelens_core::analyzer::report::{format_currency, AnalysisReport, Recommendation, Severity};

/// Print a full analysis report to the terminal.
pub fn print_analysis_report(report: &AnalysisReport) {
    println!();
    println!(
        "{}",
        format!(
            " LakeLens v{} — {} to {}",
            env!("CARGO_PKG_VERSION"),
            report.period_start,
            report.period_end
        )
        .bold()
    );
    println!();

    println!(" {}", "Spend".bold().underline());
    println!(
        " {} Window spend:          {}",
        "|-".dimmed(),
        format_currency(report.total_period_spend)
    );
    println!(
        " {} Projected monthly:     {}",
        "|-".dimmed(),
        format_currency(report.projected_monthly_spend)
    );
    println!(
        " {} Tag compliance:        {:.0}%",
        "|-".dimmed(),
        report.cost.tag_compliance_ratio * 100.0
    );
    println!();

    println!(" {}", "=".repeat(60).dimmed());
    println!();

    if report.recommendations.is_empty() {
        println!(
            " {} No significant waste detected. Your workspace looks lean!",
            "OK".green().bold()
        );
    } else {
        for rec in &report.recommendations {
            print_recommendation(rec);
            println!();
        }
    }

    println!(" {}", "=".repeat(60).dimmed());
    println!();

    println!(" {}", "Summary".bold().underline());
    println!(
        " {} Estimated monthly savings:     {}",
        "|-".dimmed(),
        format_currency(report.total_estimated_savings()).green()
    );

    let high = report.high_count();
    let medium = report.medium_count();
    let low = report.low_count();
    println!(
        " {} Recommendations: {} high, {} medium, {} low",
        "|-".dimmed(),
        if high > 0 {
            high.to_string().red().bold().to_string()
        } else {
            "0".to_string()
        },
        if medium > 0 {
            medium.to_string().yellow().bold().to_string()
        } else {
            "0".to_string()
        },
        low,
    );
    println!();

    if !report.completeness_notes.is_empty() {
        println!(" {}", "Data gaps".bold().underline());
        for note in &report.completeness_notes {
            println!(" {} {}", "|-".dimmed(), note.dimmed());
        }
        println!();
    }
}

fn print_recommendation(rec: &Recommendation) {
    let severity_tag = match rec.severity {
        Severity::High => format!(" {} ", rec.severity.symbol())
            .on_red()
            .white()
            .bold()
            .to_string(),
        Severity::Medium => format!(" {} ", rec.severity.symbol())
            .on_yellow()
            .black()
            .bold()
            .to_string(),
        Severity::Low => format!(" {} ", rec.severity.symbol()).dimmed().to_string(),
    };

    println!(" {} {}", severity_tag, rec.title.bold());
    println!("   {} {}", "|".dimmed(), rec.rationale);

    let savings = rec.estimated_monthly_savings;
    if savings >= 0.0 {
        println!(
            "   {} Estimated savings: {}/month",
            "|".dimmed(),
            format_currency(savings).green()
        );
    } else {
        println!(
            "   {} Estimated cost increase: {}/month (performance trade-off)",
            "|".dimmed(),
            format_currency(-savings).yellow()
        );
    }

    for step in &rec.remediation_steps {
        println!("   {} {}", "|".dimmed(), step.dimmed());
    }

    if !rec.affected_resource_ids.is_empty() {
        let ids: Vec<&str> = rec.affected_resource_ids.iter().map(String::as_str).collect();
        println!("   {} Affected: {}", "|".dimmed(), ids.join(", ").cyan());
    }
}

/// Print the spend breakdown tables from the cost summary.
pub fn print_cost_breakdown(report: &AnalysisReport) {
    println!();
    println!(
        "{}",
        format!(
            " LakeLens v{} — Spend {} to {}",
            env!("CARGO_PKG_VERSION"),
            report.period_start,
            report.period_end
        )
        .bold()
    );
    println!();

    println!(
        " Window spend: {}   Projected monthly: {}",
        format_currency(report.total_period_spend).bold(),
        format_currency(report.projected_monthly_spend).bold()
    );
    println!();

    print_spend_table("By product", &report.cost.by_product);
    print_spend_table("By cluster", &report.cost.by_cluster);
    print_spend_table("By warehouse", &report.cost.by_warehouse);
    print_spend_table("By job", &report.cost.by_job);
    print_spend_table("By user", &report.cost.by_user);
}

fn print_spend_table(
    title: &str,
    lines: &std::collections::BTreeMap<String, lakelens_core::analyzer::cost::SpendLine>,
) {
    if lines.is_empty() {
        return;
    }
    println!(" {}", title.bold().underline());

    // Largest spenders first.
    let mut sorted: Vec<_> = lines.iter().collect();
    sorted.sort_by(|a, b| {
        b.1.spend
            .partial_cmp(&a.1.spend)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    for (key, line) in sorted {
        println!(
            " {} {:<40} {:>14}  ({:.1} DBU)",
            "|-".dimmed(),
            key,
            format_currency(line.spend),
            line.dbus
        );
    }
    println!();
}
