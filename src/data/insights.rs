use std::collections::BTreeMap;

use serde::Serialize;

use super::derive::{AVERAGE_GRADE, GRADE_COLUMNS};
use super::filter::FilteredView;
use super::model::Value;
use super::stats::{mean, pearson, quantile, CorrelationMatrix};
use crate::error::Result;

/// Correlation magnitude above which a pair is reported as strong.
pub const STRONG_CORRELATION: f64 = 0.5;

/// Headline figures of the overview tab.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyMetrics {
    pub filtered_rows: usize,
    pub total_rows: usize,
    /// Mean `Average_Grade` of the view.
    pub mean_average_grade: Option<f64>,
    /// Highest `G1`/`G2`/`G3` grade in the full dataset (the grading scale).
    pub max_grade: Option<f64>,
    /// Rows per school in the view.
    pub school_split: Vec<CategoryCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub value: Value,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupMean {
    pub group: Value,
    pub count: usize,
    pub mean: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelatedPair {
    pub a: String,
    pub b: String,
    pub r: f64,
}

pub fn key_metrics(view: &FilteredView<'_>) -> Result<KeyMetrics> {
    let averages: Vec<f64> = view
        .numeric_column(AVERAGE_GRADE)?
        .into_iter()
        .flatten()
        .collect();

    let full = FilteredView::all(view.dataset());
    let mut max_grade: Option<f64> = None;
    for column in GRADE_COLUMNS {
        for v in full.numeric_column(column)?.into_iter().flatten() {
            max_grade = Some(max_grade.map_or(v, |m| m.max(v)));
        }
    }

    Ok(KeyMetrics {
        filtered_rows: view.len(),
        total_rows: view.dataset().len(),
        mean_average_grade: mean(&averages),
        max_grade,
        school_split: category_counts(view, "school")?,
    })
}

/// Rows per distinct value of `column`, in value order. Categories present in
/// the dataset but filtered out of the view are reported with a zero count.
pub fn category_counts(view: &FilteredView<'_>, column: &str) -> Result<Vec<CategoryCount>> {
    let mut counts: BTreeMap<Value, usize> = view
        .dataset()
        .unique_values(column)
        .map(|set| set.iter().map(|v| (v.clone(), 0)).collect())
        .unwrap_or_default();
    for value in view.column(column)? {
        *counts.entry(value.clone()).or_default() += 1;
    }
    Ok(counts
        .into_iter()
        .map(|(value, count)| CategoryCount { value, count })
        .collect())
}

/// Mean of `value_column` for each category of `group_column` in the view.
pub fn group_means(
    view: &FilteredView<'_>,
    group_column: &str,
    value_column: &str,
) -> Result<Vec<GroupMean>> {
    let groups = view.column(group_column)?;
    let values = view.numeric_column(value_column)?;

    let mut buckets: BTreeMap<Value, (usize, Vec<f64>)> = BTreeMap::new();
    for (group, value) in groups.into_iter().zip(values) {
        let bucket = buckets.entry(group.clone()).or_default();
        bucket.0 += 1;
        bucket.1.extend(value);
    }

    Ok(buckets
        .into_iter()
        .map(|(group, (count, vals))| GroupMean {
            group,
            count,
            mean: mean(&vals),
        })
        .collect())
}

/// Pearson correlation of two columns of the view.
pub fn column_correlation(view: &FilteredView<'_>, a: &str, b: &str) -> Result<Option<f64>> {
    Ok(pearson(&view.numeric_column(a)?, &view.numeric_column(b)?))
}

/// Linearly interpolated quantile of one column of the view.
pub fn column_quantile(view: &FilteredView<'_>, column: &str, q: f64) -> Result<Option<f64>> {
    Ok(quantile(&view.numeric_column(column)?, q))
}

/// Distinct column pairs whose |r| exceeds `threshold`, in matrix order.
pub fn strong_correlations(matrix: &CorrelationMatrix, threshold: f64) -> Vec<CorrelatedPair> {
    let mut pairs = Vec::new();
    for (i, a) in matrix.columns.iter().enumerate() {
        for (j, b) in matrix.columns.iter().enumerate().skip(i + 1) {
            if let Some(r) = matrix.values[i][j] {
                if r.abs() > threshold {
                    pairs.push(CorrelatedPair {
                        a: a.clone(),
                        b: b.clone(),
                        r,
                    });
                }
            }
        }
    }
    pairs
}
