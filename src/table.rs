//! Plain-text rendering of profiles and datasets for the terminal.

use std::{borrow::Cow, fmt::Write as _};

use itertools::Itertools;

use crate::{
    data::format_number, dataset::Dataset, profile::DatasetProfile, stats::ColumnStatistics,
};

pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(widths.len()) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }
    widths.iter_mut().for_each(|w| *w = (*w).max(3));

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers.iter().copied(), &widths));
    let _ = writeln!(
        output,
        "{}",
        format_row(widths.iter().map(|w| "-".repeat(*w)), &widths)
    );
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row.iter(), &widths));
    }
    output
}

/// The first `limit` rows of a dataset.
pub fn render_preview(dataset: &Dataset, limit: usize) -> String {
    let headers = dataset.headers().iter().map(String::as_str).collect::<Vec<_>>();
    let rows = dataset
        .rows()
        .iter()
        .take(limit)
        .map(|row| row.iter().map(|v| v.as_display().into_owned()).collect())
        .collect::<Vec<_>>();
    render_table(&headers, &rows)
}

pub fn render_statistics(statistics: &[ColumnStatistics]) -> String {
    let rows = statistics
        .iter()
        .map(|stat| {
            let numeric = |pick: fn(&crate::stats::NumericSummary) -> f64| {
                stat.numeric
                    .as_ref()
                    .map(|summary| format_number(pick(summary)))
                    .unwrap_or_default()
            };
            let top = stat
                .top_values
                .as_ref()
                .map(|values| {
                    values
                        .iter()
                        .map(|v| format!("{} ({})", v.value, v.count))
                        .join(", ")
                })
                .unwrap_or_default();
            vec![
                stat.column.clone(),
                stat.kind.to_string(),
                stat.count.to_string(),
                stat.missing.to_string(),
                numeric(|s| s.min),
                numeric(|s| s.max),
                numeric(|s| s.mean),
                numeric(|s| s.median),
                stat.unique_values.map(|u| u.to_string()).unwrap_or_default(),
                top,
            ]
        })
        .collect::<Vec<_>>();
    render_table(
        &[
            "column", "type", "count", "missing", "min", "max", "mean", "median", "unique", "top",
        ],
        &rows,
    )
}

pub fn render_profile(profile: &DatasetProfile) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "{} row(s), {} column(s)\n",
        profile.rows, profile.columns
    );
    output.push_str(&render_statistics(&profile.statistics));

    let _ = writeln!(
        output,
        "\nQuality score: {:.1} (grade {})",
        profile.quality.score, profile.quality.grade
    );
    for issue in &profile.quality.issues {
        let _ = writeln!(
            output,
            "  - [{}] {} (-{:.1})",
            format!("{:?}", issue.severity).to_lowercase(),
            issue.message,
            issue.penalty
        );
    }

    if !profile.anomalies.is_empty() {
        let _ = writeln!(output, "\nAnomalies:");
        let rows = profile
            .anomalies
            .iter()
            .map(|a| {
                vec![
                    a.id.clone(),
                    format!("{:?}", a.severity).to_lowercase(),
                    a.message.clone(),
                ]
            })
            .collect::<Vec<_>>();
        output.push_str(&render_table(&["id", "severity", "message"], &rows));
    }

    if !profile.relationships.is_empty() {
        let _ = writeln!(output, "\nRelationships:");
        for relationship in &profile.relationships {
            let _ = writeln!(
                output,
                "  {} ({:.1}% of rows, {:?} confidence)",
                relationship.formula,
                relationship.support * 100.0,
                relationship.confidence
            );
        }
    }
    output
}

fn format_row<I, S>(values: I, widths: &[usize]) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut line = values
        .into_iter()
        .zip(widths)
        .map(|(value, width)| {
            let sanitized = sanitize_cell(value.as_ref());
            let padding = width.saturating_sub(display_width(&sanitized));
            format!("{sanitized}{}", " ".repeat(padding))
        })
        .join("  ");
    while line.ends_with(' ') {
        line.pop();
    }
    line
}

fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            // ANSI escape, e.g. \x1b[31m
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }
    width
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_columns_and_trims_trailing_space() {
        let rendered = render_table(
            &["name", "n"],
            &[vec!["alpha".to_string(), "1".to_string()], vec!["b".to_string(), String::new()]],
        );
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "name   n");
        assert_eq!(lines[1], "-----  ---");
        assert_eq!(lines[2], "alpha  1");
        assert_eq!(lines[3], "b");
    }
}
