use crate::orchestrator::BatchSummary;
use std::fmt::Write;

pub fn print_summary(summary: &BatchSummary) {
    print!("{}", render_summary(summary));
}

/// Human-readable batch summary
pub fn render_summary(summary: &BatchSummary) -> String {
    let mut out = String::new();

    let width = summary
        .reports
        .iter()
        .map(|r| r.target.len())
        .chain(summary.not_attempted.iter().map(String::len))
        .max()
        .unwrap_or(10)
        .max(10);

    let _ = writeln!(out);
    let _ = writeln!(out, "{:<width$}  RESULT", "REPOSITORY", width = width);
    for report in &summary.reports {
        let _ = writeln!(out, "{:<width$}  {}", report.target, report.outcome, width = width);
        for warning in &report.warnings {
            let _ = writeln!(out, "{:<width$}    ⚠ {}", "", warning, width = width);
        }
    }
    for target in &summary.not_attempted {
        let _ = writeln!(out, "{:<width$}  not attempted", target, width = width);
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{} configured, {} skipped, {} removed, {} failed, {} warning(s)",
        summary.configured(),
        summary.skipped(),
        summary.removed(),
        summary.failed(),
        summary.warnings()
    );
    if let Some(reason) = &summary.aborted {
        let _ = writeln!(out, "Batch aborted: {}", reason);
    }

    out
}
