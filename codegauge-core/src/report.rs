//! Report rendering for aggregate and duplicate statistics.
//!
//! Pure projections: nothing here mutates the input data. Presentation
//! knobs travel in an explicit [`RenderOptions`] instead of process-global
//! state.

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::classify::AggregateReport;
use crate::duplicate::DuplicateStats;

/// Presentation options threaded through every renderer.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// How many entries ranked tables display.
    pub top_n: usize,
    /// Character width of proportional bars.
    pub bar_width: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            top_n: 20,
            bar_width: 40,
        }
    }
}

const MAX_ERRORS_SHOWN: usize = 10;

/// Sort a counter map by descending count. Ties keep the map's key order,
/// so equal counts rank alphabetically and reruns are stable.
pub fn ranked_counts(counts: &BTreeMap<String, u64>) -> Vec<(&str, u64)> {
    let mut entries: Vec<(&str, u64)> = counts
        .iter()
        .map(|(key, value)| (key.as_str(), *value))
        .collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    entries
}

/// A proportional bar of fixed character width; the filled part is
/// `value / total` of the width.
fn bar(value: u64, total: u64, width: usize) -> String {
    let percentage = if total == 0 {
        0.0
    } else {
        value as f64 / total as f64 * 100.0
    };
    let filled = ((percentage / 100.0) * width as f64) as usize;
    let filled = filled.min(width);
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

fn chart_line(label: &str, value: u64, total: u64, width: usize) -> String {
    let percentage = if total == 0 {
        0.0
    } else {
        value as f64 / total as f64 * 100.0
    };
    format!(
        "{label:<32} | {} | {value:>6} ({percentage:>5.1}%)",
        bar(value, total, width)
    )
}

fn append_distribution(
    output: &mut String,
    title: &str,
    counts: &BTreeMap<String, u64>,
    top_n: Option<usize>,
    width: usize,
) {
    let total: u64 = counts.values().sum();
    match top_n {
        Some(limit) => {
            let _ = writeln!(output, "## {title} (Top {limit})");
        }
        None => {
            let _ = writeln!(output, "## {title}");
        }
    }
    if total == 0 {
        let _ = writeln!(output, "No data.\n");
        return;
    }
    let entries = ranked_counts(counts);
    let limit = top_n.unwrap_or(entries.len());
    for (rank, (label, count)) in entries.iter().take(limit).enumerate() {
        let numbered = format!("{:>2}. {label}", rank + 1);
        let _ = writeln!(output, "{}", chart_line(&numbered, *count, total, width));
    }
    let _ = writeln!(output);
}

/// Record counts per type within each severity, for the cross-dimension
/// section.
fn severity_type_breakdown(report: &AggregateReport) -> BTreeMap<String, BTreeMap<String, u64>> {
    let mut breakdown: BTreeMap<String, BTreeMap<String, u64>> = BTreeMap::new();
    for record in &report.all_records {
        *breakdown
            .entry(record.severity())
            .or_default()
            .entry(record.kind())
            .or_insert(0) += 1;
    }
    breakdown
}

/// Render the aggregate report as console text with proportional bar charts
/// and ranked tables.
pub fn render_text_report(report: &AggregateReport, options: &RenderOptions) -> String {
    let mut output = String::new();
    let rule = "=".repeat(80);
    let _ = writeln!(output, "{rule}");
    let _ = writeln!(output, "CodeGauge Uncommented Functions Report");
    let _ = writeln!(
        output,
        "Generated: {}",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(output, "{rule}\n");

    let summary = &report.summary;
    let _ = writeln!(output, "## Summary");
    let _ = writeln!(output, "- Total projects: {}", summary.total_projects);
    let _ = writeln!(
        output,
        "- Successful projects: {}",
        summary.successful_projects
    );
    let _ = writeln!(output, "- Failed projects: {}", summary.failed_projects);
    let _ = writeln!(
        output,
        "- Flagged functions: {}",
        summary.total_function_count
    );
    let _ = writeln!(output, "- Fetch success rate: {:.1}%", report.success_rate());
    if summary.successful_projects > 0 {
        let _ = writeln!(
            output,
            "- Average per successful project: {:.1}",
            summary.total_function_count as f64 / summary.successful_projects as f64
        );
    }
    let _ = writeln!(output);

    append_distribution(
        &mut output,
        "Severity distribution",
        &report.by_severity,
        None,
        options.bar_width,
    );
    append_distribution(
        &mut output,
        "Type distribution",
        &report.by_type,
        Some(options.top_n),
        options.bar_width,
    );
    append_distribution(
        &mut output,
        "Rule distribution",
        &report.by_rule,
        Some(options.top_n),
        options.bar_width,
    );

    append_project_rankings(&mut output, report, options.top_n);
    append_cross_dimension(&mut output, report);
    append_failures(&mut output, report);

    let _ = writeln!(output, "{rule}");
    output
}

fn append_project_rankings(output: &mut String, report: &AggregateReport, top_n: usize) {
    let _ = writeln!(output, "## Projects with most flagged functions (Top {top_n})");
    if report.by_project.is_empty() {
        let _ = writeln!(output, "No project data.\n");
        return;
    }
    let ranked = ranked_counts(&report.by_project);
    for (rank, (project, count)) in ranked.iter().take(top_n).enumerate() {
        let _ = writeln!(output, "{:>3}. {project:<48} {count:>8}", rank + 1);
    }
    let _ = writeln!(output);

    let _ = writeln!(output, "## Projects with fewest flagged functions (Top 10)");
    let mut fewest = ranked;
    fewest.reverse();
    for (rank, (project, count)) in fewest.iter().take(10).enumerate() {
        let _ = writeln!(output, "{:>3}. {project:<48} {count:>8}", rank + 1);
    }
    let _ = writeln!(output);
}

fn append_cross_dimension(output: &mut String, report: &AggregateReport) {
    let breakdown = severity_type_breakdown(report);
    if breakdown.is_empty() {
        return;
    }
    let _ = writeln!(output, "## Top types per severity");
    for (severity, types) in &breakdown {
        let _ = writeln!(output, "{severity}:");
        for (rank, (kind, count)) in ranked_counts(types).iter().take(5).enumerate() {
            let _ = writeln!(output, "  {}. {kind}: {count}", rank + 1);
        }
    }
    let _ = writeln!(output);
}

fn append_failures(output: &mut String, report: &AggregateReport) {
    if report.errors.is_empty() {
        return;
    }
    let _ = writeln!(output, "## Failed projects ({})", report.errors.len());
    for failure in report.errors.iter().take(MAX_ERRORS_SHOWN) {
        let _ = writeln!(output, "- {}: {}", failure.project_id, failure.error);
    }
    if report.errors.len() > MAX_ERRORS_SHOWN {
        let _ = writeln!(
            output,
            "... and {} more",
            report.errors.len() - MAX_ERRORS_SHOWN
        );
    }
    let _ = writeln!(output);
}

/// Render the duplicate statistics as console text.
pub fn render_duplicate_text(stats: &DuplicateStats, options: &RenderOptions) -> String {
    let mut output = String::new();
    let rule = "=".repeat(80);
    let _ = writeln!(output, "{rule}");
    let _ = writeln!(output, "CodeGauge Duplicate Functions Report");
    let _ = writeln!(output, "{rule}\n");

    let _ = writeln!(output, "## Summary");
    let _ = writeln!(output, "- Projects analyzed: {}", stats.total_projects);
    let _ = writeln!(output, "- Successful projects: {}", stats.successful_projects);
    let _ = writeln!(output, "- Failed projects: {}", stats.failed_projects);
    let _ = writeln!(
        output,
        "- Projects with duplicates: {}",
        stats.projects_with_duplicates
    );
    let _ = writeln!(output, "- Duplicate groups: {}", stats.total_groups);
    let _ = writeln!(output, "- Duplicate functions: {}", stats.total_functions);
    let _ = writeln!(output, "- Files affected: {}", stats.total_files);
    let _ = writeln!(output, "- Authors involved: {}", stats.distinct_authors);
    let _ = writeln!(output);

    append_distribution(
        &mut output,
        "Language distribution",
        &stats.language_distribution,
        None,
        options.bar_width,
    );

    let _ = writeln!(output, "## Complexity distribution");
    let complexity_total =
        stats.complexity.low + stats.complexity.medium + stats.complexity.high;
    for (label, value) in [
        ("low (1-3)", stats.complexity.low),
        ("medium (4-7)", stats.complexity.medium),
        ("high (8+)", stats.complexity.high),
    ] {
        let _ = writeln!(
            output,
            "{}",
            chart_line(label, value, complexity_total, options.bar_width)
        );
    }
    let _ = writeln!(output);

    if !stats.top_groups.is_empty() {
        let _ = writeln!(output, "## Top duplicate groups");
        let _ = writeln!(
            output,
            "{:>3}  {:<40} {:<28} {:>6} {:>6} {:>6}",
            "#", "project", "function", "funcs", "files", "cyclo"
        );
        for (rank, group) in stats.top_groups.iter().take(10).enumerate() {
            let _ = writeln!(
                output,
                "{:>3}  {:<40} {:<28} {:>6} {:>6} {:>6}",
                rank + 1,
                truncate(&group.project_id, 40),
                truncate(&group.group_name, 28),
                group.num_functions,
                group.num_files,
                group.max_complexity
            );
        }
        let _ = writeln!(output);
    }

    let _ = writeln!(output, "{rule}");
    output
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

const HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>__TITLE__</title>
<script src="https://cdn.jsdelivr.net/npm/chart.js"></script>
<style>
body { font-family: -apple-system, "Segoe UI", sans-serif; margin: 2rem; color: #1f2937; }
h1 { font-size: 1.5rem; }
.meta { color: #6b7280; margin-bottom: 1.5rem; }
.cards { display: flex; gap: 1rem; flex-wrap: wrap; margin-bottom: 2rem; }
.card { background: #f3f4f6; border-radius: 8px; padding: 1rem 1.5rem; min-width: 10rem; }
.card .value { font-size: 1.8rem; font-weight: 700; }
.card .label { color: #6b7280; font-size: 0.85rem; }
.charts { display: flex; gap: 2rem; flex-wrap: wrap; }
.chart { width: 480px; }
table { border-collapse: collapse; margin-top: 2rem; }
th, td { border-bottom: 1px solid #e5e7eb; padding: 0.4rem 1rem; text-align: left; }
th { background: #f9fafb; }
</style>
</head>
<body>
<h1>__TITLE__</h1>
<div class="meta">Generated: __GENERATED__</div>
<div class="cards">__CARDS__</div>
<div class="charts">
<div class="chart"><canvas id="primaryChart"></canvas></div>
<div class="chart"><canvas id="secondaryChart"></canvas></div>
</div>
__TABLE__
<script>
new Chart(document.getElementById("primaryChart"), {
  type: "doughnut",
  data: {
    labels: __PRIMARY_LABELS__,
    datasets: [{ data: __PRIMARY_VALUES__, backgroundColor: __PRIMARY_COLORS__ }]
  },
  options: { plugins: { title: { display: true, text: "__PRIMARY_TITLE__" } } }
});
new Chart(document.getElementById("secondaryChart"), {
  type: "bar",
  data: {
    labels: __SECONDARY_LABELS__,
    datasets: [{ data: __SECONDARY_VALUES__, backgroundColor: "#3b82f6" }]
  },
  options: {
    indexAxis: "y",
    plugins: { legend: { display: false }, title: { display: true, text: "__SECONDARY_TITLE__" } }
  }
});
</script>
</body>
</html>
"#;

fn severity_color(severity: &str) -> &'static str {
    match severity.to_ascii_lowercase().as_str() {
        "critical" => "#dc2626",
        "high" => "#ef4444",
        "medium" => "#f59e0b",
        "low" => "#10b981",
        "info" => "#3b82f6",
        _ => "#6b7280",
    }
}

fn card(label: &str, value: &str) -> String {
    format!(r#"<div class="card"><div class="value">{value}</div><div class="label">{label}</div></div>"#)
}

fn json_labels(labels: &[&str]) -> String {
    serde_json::to_string(labels).unwrap_or_else(|_| "[]".to_string())
}

fn json_values(values: &[u64]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Render the aggregate report as a static HTML document with precomputed
/// chart data.
pub fn render_html_report(report: &AggregateReport, options: &RenderOptions) -> String {
    let severity = ranked_counts(&report.by_severity);
    let severity_labels: Vec<&str> = severity.iter().map(|(label, _)| *label).collect();
    let severity_values: Vec<u64> = severity.iter().map(|(_, count)| *count).collect();
    let severity_colors: Vec<&str> = severity_labels
        .iter()
        .map(|label| severity_color(label))
        .collect();

    let types = ranked_counts(&report.by_type);
    let type_labels: Vec<&str> = types
        .iter()
        .take(options.top_n)
        .map(|(label, _)| *label)
        .collect();
    let type_values: Vec<u64> = types
        .iter()
        .take(options.top_n)
        .map(|(_, count)| *count)
        .collect();

    let cards = [
        card("Total projects", &report.summary.total_projects.to_string()),
        card(
            "Successful",
            &report.summary.successful_projects.to_string(),
        ),
        card("Failed", &report.summary.failed_projects.to_string()),
        card(
            "Flagged functions",
            &report.summary.total_function_count.to_string(),
        ),
    ]
    .join("");

    let mut table = String::from(
        "<table><thead><tr><th>#</th><th>Project</th><th>Flagged functions</th></tr></thead><tbody>",
    );
    for (rank, (project, count)) in ranked_counts(&report.by_project)
        .iter()
        .take(options.top_n)
        .enumerate()
    {
        let _ = write!(
            table,
            "<tr><td>{}</td><td>{}</td><td>{count}</td></tr>",
            rank + 1,
            escape_html(project)
        );
    }
    table.push_str("</tbody></table>");

    HTML_TEMPLATE
        .replace("__TITLE__", "CodeGauge Uncommented Functions Report")
        .replace(
            "__GENERATED__",
            &report
                .generated_at
                .format("%Y-%m-%d %H:%M:%S UTC")
                .to_string(),
        )
        .replace("__CARDS__", &cards)
        .replace("__TABLE__", &table)
        .replace("__PRIMARY_TITLE__", "By severity")
        .replace("__PRIMARY_LABELS__", &json_labels(&severity_labels))
        .replace("__PRIMARY_VALUES__", &json_values(&severity_values))
        .replace("__PRIMARY_COLORS__", &json_labels(&severity_colors))
        .replace("__SECONDARY_TITLE__", "Top types")
        .replace("__SECONDARY_LABELS__", &json_labels(&type_labels))
        .replace("__SECONDARY_VALUES__", &json_values(&type_values))
}

/// Render the duplicate statistics as a static HTML document.
pub fn render_duplicate_html(stats: &DuplicateStats, options: &RenderOptions) -> String {
    let languages = ranked_counts(&stats.language_distribution);
    let language_labels: Vec<&str> = languages.iter().map(|(label, _)| *label).collect();
    let language_values: Vec<u64> = languages.iter().map(|(_, count)| *count).collect();
    let language_colors: Vec<&str> = language_labels
        .iter()
        .map(|_| "#3b82f6")
        .collect();

    let complexity_labels = vec!["low (1-3)", "medium (4-7)", "high (8+)"];
    let complexity_values = vec![
        stats.complexity.low,
        stats.complexity.medium,
        stats.complexity.high,
    ];

    let cards = [
        card("Projects analyzed", &stats.total_projects.to_string()),
        card(
            "With duplicates",
            &stats.projects_with_duplicates.to_string(),
        ),
        card("Duplicate groups", &stats.total_groups.to_string()),
        card("Duplicate functions", &stats.total_functions.to_string()),
        card("Authors involved", &stats.distinct_authors.to_string()),
    ]
    .join("");

    let mut table = String::from(
        "<table><thead><tr><th>#</th><th>Project</th><th>Function</th><th>Copies</th><th>Files</th><th>Max complexity</th></tr></thead><tbody>",
    );
    for (rank, group) in stats.top_groups.iter().take(options.top_n).enumerate() {
        let _ = write!(
            table,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            rank + 1,
            escape_html(&group.project_id),
            escape_html(&group.group_name),
            group.num_functions,
            group.num_files,
            group.max_complexity
        );
    }
    table.push_str("</tbody></table>");

    HTML_TEMPLATE
        .replace("__TITLE__", "CodeGauge Duplicate Functions Report")
        .replace(
            "__GENERATED__",
            &chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        )
        .replace("__CARDS__", &cards)
        .replace("__TABLE__", &table)
        .replace("__PRIMARY_TITLE__", "By language")
        .replace("__PRIMARY_LABELS__", &json_labels(&language_labels))
        .replace("__PRIMARY_VALUES__", &json_values(&language_values))
        .replace("__PRIMARY_COLORS__", &json_labels(&language_colors))
        .replace("__SECONDARY_TITLE__", "By max complexity")
        .replace("__SECONDARY_LABELS__", &json_labels(&complexity_labels))
        .replace("__SECONDARY_VALUES__", &json_values(&complexity_values))
}

#[cfg(test)]
mod tests {
    use super::{RenderOptions, bar, ranked_counts, render_duplicate_text, render_html_report, render_text_report};
    use crate::classify::classify;
    use crate::duplicate::summarize_duplicates;
    use crate::fetch::FetchResult;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn sample_report() -> crate::classify::AggregateReport {
        classify(&[
            FetchResult::success(
                "proj-a",
                json!({"data": [
                    {"severity": "high", "type": "api", "rule": "doc-missing"},
                    {"severity": "high", "type": "helper", "rule": "doc-missing"},
                    {"severity": "low", "type": "api", "rule": "doc-short"}
                ]}),
            ),
            FetchResult::failure("proj-b", "timeout"),
        ])
    }

    #[test]
    fn bar_length_is_proportional() {
        assert_eq!(bar(1, 2, 40).chars().filter(|c| *c == '█').count(), 20);
        assert_eq!(bar(0, 2, 40).chars().filter(|c| *c == '█').count(), 0);
        assert_eq!(bar(2, 2, 40).chars().filter(|c| *c == '█').count(), 40);
        assert_eq!(bar(5, 0, 40).chars().count(), 40);
    }

    #[test]
    fn ranked_counts_breaks_ties_by_key_order() {
        let mut counts = BTreeMap::new();
        counts.insert("zeta".to_string(), 3);
        counts.insert("alpha".to_string(), 3);
        counts.insert("mid".to_string(), 7);

        let ranked = ranked_counts(&counts);
        assert_eq!(ranked[0].0, "mid");
        assert_eq!(ranked[1].0, "alpha");
        assert_eq!(ranked[2].0, "zeta");
    }

    #[test]
    fn text_report_covers_all_sections() {
        let report = sample_report();
        let text = render_text_report(&report, &RenderOptions::default());

        assert!(text.contains("CodeGauge Uncommented Functions Report"));
        assert!(text.contains("- Total projects: 2"));
        assert!(text.contains("- Fetch success rate: 50.0%"));
        assert!(text.contains("## Severity distribution"));
        assert!(text.contains("high"));
        assert!(text.contains("## Type distribution (Top 20)"));
        assert!(text.contains("## Projects with most flagged functions"));
        assert!(text.contains("## Top types per severity"));
        assert!(text.contains("## Failed projects (1)"));
        assert!(text.contains("- proj-b: timeout"));
    }

    #[test]
    fn text_report_honors_top_n() {
        let records: Vec<serde_json::Value> = (0..30)
            .map(|i| json!({"type": format!("type-{i:02}")}))
            .collect();
        let report = classify(&[FetchResult::success("p", json!({"data": records}))]);

        let options = RenderOptions {
            top_n: 5,
            ..RenderOptions::default()
        };
        let text = render_text_report(&report, &options);

        assert!(text.contains("## Type distribution (Top 5)"));
        assert!(text.contains("type-00"));
        assert!(!text.contains("type-06"));
    }

    #[test]
    fn html_report_embeds_chart_data() {
        let report = sample_report();
        let html = render_html_report(&report, &RenderOptions::default());

        assert!(html.contains("[\"high\",\"low\"]"));
        assert!(html.contains("[2,1]"));
        assert!(html.contains("chart.js"));
        assert!(html.contains("proj-a"));
        assert!(!html.contains("__PRIMARY_LABELS__"));
    }

    #[test]
    fn duplicate_text_lists_top_groups() {
        let stats = summarize_duplicates(&[FetchResult::success(
            "proj-a",
            json!({"total": 1, "data": [{
                "groupName": "parse_config",
                "numFunctions": 4,
                "numFiles": 2,
                "maxComplexity": 9,
                "language": "Java",
                "emails": ["dev@example.com"]
            }]}),
        )]);
        let text = render_duplicate_text(&stats, &RenderOptions::default());

        assert!(text.contains("CodeGauge Duplicate Functions Report"));
        assert!(text.contains("- Duplicate groups: 1"));
        assert!(text.contains("parse_config"));
        assert!(text.contains("## Language distribution"));
        assert!(text.contains("high (8+)"));
    }
}
