//! Plain-text tables for the command line.

use std::fmt::Write as _;

use crate::data::filter::FilteredView;
use crate::data::insights::{CorrelatedPair, GroupMean, KeyMetrics};
use crate::data::normalize::BoxStats;
use crate::data::stats::{ColumnInfo, CorrelationMatrix, NullCount, SummaryAggregates};

fn cell(v: Option<f64>, precision: usize) -> String {
    match v {
        Some(x) => format!("{x:.precision$}"),
        None => "-".to_string(),
    }
}

/// `describe()`-style table: one row per numeric column.
pub fn describe_table(agg: &SummaryAggregates) -> String {
    let mut out = format!(
        "{:<16}{:>8}{:>10}{:>10}{:>10}{:>10}{:>10}{:>10}{:>10}\n",
        "column", "count", "mean", "std", "min", "25%", "50%", "75%", "max"
    );
    for s in &agg.describe {
        let _ = writeln!(
            out,
            "{:<16}{:>8}{:>10}{:>10}{:>10}{:>10}{:>10}{:>10}{:>10}",
            s.column,
            s.count,
            cell(s.mean, 3),
            cell(s.std, 3),
            cell(s.min, 2),
            cell(s.p25, 2),
            cell(s.p50, 2),
            cell(s.p75, 2),
            cell(s.max, 2),
        );
    }
    out
}

pub fn correlation_table(matrix: &CorrelationMatrix) -> String {
    let mut out = format!("{:<16}", "");
    for c in &matrix.columns {
        let _ = write!(out, "{:>10}", truncate(c, 9));
    }
    out.push('\n');
    for (name, row) in matrix.columns.iter().zip(&matrix.values) {
        let _ = write!(out, "{:<16}", truncate(name, 15));
        for v in row {
            let _ = write!(out, "{:>10}", cell(*v, 2));
        }
        out.push('\n');
    }
    out
}

pub fn strong_pairs_table(pairs: &[CorrelatedPair], threshold: f64) -> String {
    if pairs.is_empty() {
        return format!("no pairs with |r| > {threshold}\n");
    }
    let mut out = String::new();
    for p in pairs {
        let _ = writeln!(out, "{} <-> {}: {:.3}", p.a, p.b, p.r);
    }
    out
}

/// Column names, types, non-null and null counts.
pub fn info_table(info: &[ColumnInfo], nulls: &[NullCount], rows: usize) -> String {
    let mut out = format!("{rows} records, {} columns\n", info.len());
    let _ = writeln!(out, "{:<16}{:<14}{:>10}{:>8}", "column", "type", "non-null", "null");
    for (c, n) in info.iter().zip(nulls) {
        let _ = writeln!(
            out,
            "{:<16}{:<14}{:>10}{:>8}",
            c.column,
            c.kind.to_string(),
            c.non_null,
            n.nulls
        );
    }
    out
}

/// First `n` rows of the view, `;`-separated with a header.
pub fn head_table(view: &FilteredView<'_>, n: usize) -> String {
    let header: Vec<&str> = view.dataset().schema().names().collect();
    let mut out = header.join(";");
    out.push('\n');
    for record in view.head(n) {
        let row: Vec<String> = record.values().iter().map(|v| v.to_string()).collect();
        out.push_str(&row.join(";"));
        out.push('\n');
    }
    out
}

pub fn key_metrics_text(metrics: &KeyMetrics) -> String {
    let split: Vec<String> = metrics
        .school_split
        .iter()
        .map(|c| format!("{}={}", c.value, c.count))
        .collect();
    format!(
        "Total students: {} / {}\nAverage grade: {} / {}\nSchool split: {}\n",
        metrics.filtered_rows,
        metrics.total_rows,
        cell(metrics.mean_average_grade, 2),
        cell(metrics.max_grade, 2),
        split.join(" : ")
    )
}

pub fn group_means_text(title: &str, means: &[GroupMean]) -> String {
    let mut out = format!("{title}\n");
    for g in means {
        let _ = writeln!(out, "  {:<12}{:>6}{:>10}", g.group.to_string(), g.count, cell(g.mean, 2));
    }
    out
}

pub fn box_table(stats: &[BoxStats]) -> String {
    let mut out = format!(
        "{:<16}{:>9}{:>9}{:>9}{:>9}{:>9}{:>10}\n",
        "column", "low", "q1", "median", "q3", "high", "outliers"
    );
    for b in stats {
        let _ = writeln!(
            out,
            "{:<16}{:>9.3}{:>9.3}{:>9.3}{:>9.3}{:>9.3}{:>10}",
            b.column,
            b.lower_whisker,
            b.q1,
            b.median,
            b.q3,
            b.upper_whisker,
            b.outliers.len()
        );
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
