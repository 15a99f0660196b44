use std::fmt::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::StrainError;
use crate::models::{HistoryRecord, KillSwitchPlan, ScoreResult, TrendSummary};

pub fn build_report(
    label: Option<&str>,
    results: &ScoreResult,
    trend: &TrendSummary,
    plan: &KillSwitchPlan,
    history: &[HistoryRecord],
) -> String {
    let mut output = String::new();
    let label = label.filter(|l| !l.trim().is_empty()).unwrap_or("unlabelled run");

    let _ = writeln!(output, "# Capacity & Strain Report");
    let _ = writeln!(
        output,
        "Generated for {} at {}",
        label,
        results.ts.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Result");
    let _ = writeln!(output, "**{}**: {}", results.band, results.band_note);
    let _ = writeln!(
        output,
        "- Total: {}/{}",
        results.total_points, results.max_points
    );
    let _ = writeln!(output, "- Ratio: {:.3}", results.ratio);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Domain Strain (highest first)");
    if results.domain_report.is_empty() {
        let _ = writeln!(output, "No questions answered.");
    } else {
        for entry in &results.domain_report {
            let _ = writeln!(
                output,
                "- {}: {}/{} (ratio {:.3})",
                entry.domain, entry.points, entry.max_points, entry.ratio
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Trend");
    write_trend(&mut output, trend);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Kill Switch");
    write_plan(&mut output, plan);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Runs");
    if history.is_empty() {
        let _ = writeln!(output, "No history yet.");
    } else {
        for record in history.iter().rev().take(10) {
            let _ = writeln!(output, "- {}", history_line(record));
        }
    }

    output
}

pub fn write_trend(output: &mut String, trend: &TrendSummary) {
    match trend {
        TrendSummary::Insufficient { note } => {
            let _ = writeln!(output, "{note}");
        }
        TrendSummary::Ok {
            last_ratio,
            prev_mean_ratio,
            delta_vs_mean,
            last3_pattern,
        } => {
            let _ = writeln!(output, "- Last ratio: {last_ratio:.3}");
            let _ = writeln!(output, "- Baseline mean (prior): {prev_mean_ratio:.3}");
            let _ = writeln!(output, "- Delta vs baseline: {delta_vs_mean:+.3}");
            let _ = writeln!(output, "- Last-3 pattern: {last3_pattern}");
        }
    }
}

pub fn write_plan(output: &mut String, plan: &KillSwitchPlan) {
    if !plan.triggered {
        let _ = writeln!(output, "Not triggered (yet).");
        return;
    }

    let _ = writeln!(output, "TRIGGERED");
    for reason in &plan.reasons {
        let _ = writeln!(output, "- {reason}");
    }
    for focus in &plan.focus_domains {
        let _ = writeln!(output);
        let _ = writeln!(output, "**{}** (ratio {:.3})", focus.domain, focus.ratio);
        for step in &focus.steps {
            let _ = writeln!(output, "  - {step}");
        }
    }
}

pub fn history_line(record: &HistoryRecord) -> String {
    let mut line = format!(
        "{} {} ratio {:.3} ({}/{})",
        record.ts.format("%Y-%m-%d %H:%M"),
        record.band,
        record.ratio,
        record.total_points,
        record.max_points
    );
    if !record.label.is_empty() {
        let _ = write!(line, " [{}]", record.label);
    }
    if !record.context.is_empty() {
        let _ = write!(line, " {}", record.context);
    }
    line
}

#[derive(Debug, Serialize)]
struct HistoryCsvRow<'a> {
    ts: DateTime<Utc>,
    label: &'a str,
    context: &'a str,
    ratio: f64,
    band: String,
    total_points: i64,
    max_points: i64,
    top_domain: Option<&'a str>,
    top_domain_ratio: Option<f64>,
}

/// Writes `history` as CSV, oldest first. Returns the number of rows.
pub fn export_csv(history: &[HistoryRecord], out: &Path) -> Result<usize, StrainError> {
    let mut writer = csv::Writer::from_path(out)?;
    for record in history {
        let top = record.domain_report.first();
        writer.serialize(HistoryCsvRow {
            ts: record.ts,
            label: &record.label,
            context: &record.context,
            ratio: record.ratio,
            band: record.band.to_string(),
            total_points: record.total_points,
            max_points: record.max_points,
            top_domain: top.map(|d| d.domain.as_str()),
            top_domain_ratio: top.map(|d| d.ratio),
        })?;
    }
    writer.flush()?;
    Ok(history.len())
}
