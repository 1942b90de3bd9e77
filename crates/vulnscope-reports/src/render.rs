//! Markdown rendering of collected report data.

use std::fmt::Write;

use serde_json::Value;

use crate::catalog::section;
use crate::fanout::ReportData;

const NO_DATA: &str = "_No data available._";

/// Display form of a warehouse value.
pub fn cell(value: &Value) -> String {
    match value {
        Value::Null => "N/A".to_string(),
        Value::String(s) => s.replace('|', "\\|"),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() => format!("{:.1}", f),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

fn heading(column: &str) -> String {
    column
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render a section as a Markdown table.
pub fn table(data: &ReportData, key: &str) -> String {
    let Some(result) = data.get(key).filter(|r| !r.is_empty()) else {
        return format!("{NO_DATA}\n");
    };

    let mut out = String::new();
    let headers: Vec<String> = result.columns.iter().map(|c| heading(c)).collect();
    let _ = writeln!(out, "| {} |", headers.join(" | "));
    let _ = writeln!(
        out,
        "|{}",
        headers.iter().map(|_| " --- |").collect::<String>()
    );
    for row in &result.rows {
        let cells: Vec<String> = row.iter().map(cell).collect();
        let _ = writeln!(out, "| {} |", cells.join(" | "));
    }
    out
}

/// Render the first row of a section as a bullet list.
pub fn key_values(data: &ReportData, key: &str) -> String {
    let pairs = data.first_row(key);
    if pairs.is_empty() {
        return format!("{NO_DATA}\n");
    }
    pairs
        .into_iter()
        .map(|(column, value)| format!("- **{}:** {}\n", heading(column), cell(value)))
        .collect()
}

/// Render a monthly series with running totals of the given value columns.
///
/// Column 0 holds the month; `value_columns` index the counted columns.
pub fn cumulative(data: &ReportData, key: &str, value_columns: &[(usize, &str)]) -> String {
    let rows = data.rows(key);
    if rows.is_empty() {
        return format!("{NO_DATA}\n");
    }

    let mut out = String::new();
    let labels: Vec<&str> = value_columns.iter().map(|(_, label)| *label).collect();
    let _ = writeln!(out, "| Month | {} |", labels.join(" | "));
    let _ = writeln!(
        out,
        "| --- |{}",
        labels.iter().map(|_| " --- |").collect::<String>()
    );

    let mut totals = vec![0i64; value_columns.len()];
    for row in rows {
        let month = row.first().map(cell).unwrap_or_default();
        for (total, (idx, _)) in totals.iter_mut().zip(value_columns) {
            *total += row.get(*idx).and_then(as_count).unwrap_or(0);
        }
        let cells: Vec<String> = totals.iter().map(|t| t.to_string()).collect();
        let _ = writeln!(out, "| {} | {} |", month, cells.join(" | "));
    }
    out
}

fn as_count(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

/// Date portion of the last refresh timestamp, or `N/A`.
pub fn last_update(data: &ReportData) -> String {
    match data.scalar(section::LAST_UPDATE) {
        Some(Value::String(s)) => s.chars().take(10).collect(),
        Some(Value::Null) | None => "N/A".to_string(),
        Some(other) => cell(other),
    }
}

fn count(data: &ReportData, key: &str) -> String {
    data.scalar(key).map(cell).unwrap_or_else(|| "0".to_string())
}

/// Full Markdown report for a market, or all markets when `global`.
pub fn market_report(market: &str, global: bool, generated_at: &str, data: &ReportData) -> String {
    let scope = if global { "Global" } else { market };
    let mut out = String::new();

    let _ = writeln!(out, "# Vulnerability Overview: {}\n", scope);
    let _ = writeln!(
        out,
        "_Generated {} · data as of {}_\n",
        generated_at,
        last_update(data)
    );

    out.push_str("## Key Figures\n\n");
    let _ = writeln!(out, "- **Total Vulnerabilities:** {}", count(data, section::TOTAL_COUNT));
    let _ = writeln!(
        out,
        "- **Critical/High Open:** {}",
        count(data, section::CRITICAL_HIGH_OPEN_COUNT)
    );
    let _ = writeln!(
        out,
        "- **Close to Overdue:** {}\n",
        count(data, section::CLOSE_TO_OVERDUE_COUNT)
    );

    out.push_str("### Open vs Closed\n\n");
    out.push_str(&key_values(data, section::OPEN_CLOSED_COUNT));
    out.push_str("\n### By Severity\n\n");
    out.push_str(&key_values(data, section::SEVERITY_COUNT));
    out.push_str("\n### Open by Severity\n\n");
    out.push_str(&key_values(data, section::SEVERITY_OPEN_COUNT));

    out.push_str("\n## KPI Summary\n\n### Best Performing\n\n");
    out.push_str(&key_values(data, section::HIGH_KPI));
    out.push_str("\n### Needs Attention\n\n");
    out.push_str(&key_values(data, section::LOW_KPI));

    let _ = writeln!(
        out,
        "\n## Most Affected {}\n",
        if global { "Markets" } else { "Assets" }
    );
    out.push_str(&table(data, section::TOP_AFFECTED));

    out.push_str("\n## Current Risk\n\n");
    out.push_str(&table(data, section::RISK_SUMMARY));

    out.push_str("\n## Vulnerabilities Close to Overdue\n\n");
    out.push_str(&table(data, section::CLOSE_TO_OVERDUE));

    out.push_str("\n## Critical and High Open Vulnerabilities\n\n");
    out.push_str(&table(data, section::CRITICAL_HIGH_OPEN));

    out.push_str("\n## Vulnerabilities Discovered per Month (cumulative)\n\n");
    out.push_str(&cumulative(data, section::MONTHLY_TREND, &[(2, "Discovered")]));

    out.push_str("\n## Services Engagement Over Time (cumulative)\n\n");
    out.push_str(&cumulative(
        data,
        section::SERVICE_MONTHLY_TREND,
        &[(2, "Black Box"), (3, "White Box"), (4, "Adversary Simulation")],
    ));

    out.push_str("\n## Vulnerability Types\n\n");
    out.push_str(&table(data, section::VULN_TYPES));

    out.push_str("\n## Average Time to Remediate (closed)\n\n");
    out.push_str(&table(data, section::AVG_TIME_CLOSED));

    out.push_str("\n## Average Age of Open Vulnerabilities\n\n");
    out.push_str(&table(data, section::AVG_TIME_OPEN));

    out
}

/// Full Markdown report for applications.
pub fn application_report(generated_at: &str, data: &ReportData) -> String {
    let mut out = String::new();

    out.push_str("# Application Vulnerability Report\n\n");
    let _ = writeln!(
        out,
        "_Generated {} · data as of {}_\n",
        generated_at,
        last_update(data)
    );

    let _ = writeln!(
        out,
        "- **Total Vulnerabilities:** {}\n",
        count(data, section::TOTAL_COUNT)
    );

    out.push_str("## By Severity\n\n");
    out.push_str(&key_values(data, section::APP_SEVERITY_COUNT));
    out.push_str("\n## By Service and Severity\n\n");
    out.push_str(&table(data, section::APP_SEVERITY_SERVICE_COUNT));

    out.push_str("\n## Current Risk\n\n");
    out.push_str(&table(data, section::APP_CURRENT_RISK));
    out.push_str("\n### Black Box\n\n");
    out.push_str(&table(data, section::BLACKBOX_CURRENT_RISK));
    out.push_str("\n### White Box\n\n");
    out.push_str(&table(data, section::WHITEBOX_CURRENT_RISK));
    out.push_str("\n### All States\n\n");
    out.push_str(&table(data, section::APP_TOTAL_CURRENT_RISK));

    out.push_str("\n## Vulnerability Types\n\n");
    out.push_str(&table(data, section::VULN_TYPES));
    out.push_str("\n## Risk by Vulnerability Type\n\n");
    out.push_str(&table(data, section::APP_VULN_TYPES_RISK));

    out.push_str("\n## Recommendations\n\n");
    out.push_str(&table(data, section::RECOMMENDATIONS));

    out
}

/// Document written in place of a report whose pipeline failed.
pub fn error_report(title: &str, error: &str) -> String {
    format!("# Failed to generate {}\n\n```\n{}\n```\n", title, error)
}
