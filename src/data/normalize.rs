//! Min-max normalisation of numeric columns and the box statistics drawn
//! from them, so columns with different units share one comparative scale.

use serde::Serialize;

use super::filter::FilteredView;
use super::stats::{finite_sorted, numeric_columns, quantile_sorted};

/// Tukey fence multiplier for whiskers.
const WHISKER_IQR: f64 = 1.5;

/// A numeric column rescaled to `[0, 1]`. Nulls stay null.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedColumn {
    pub column: String,
    pub values: Vec<Option<f64>>,
}

/// Five-number box summary with Tukey whiskers and outliers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxStats {
    pub column: String,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    /// Smallest value not below `q1 - 1.5 * IQR`.
    pub lower_whisker: f64,
    /// Largest value not above `q3 + 1.5 * IQR`.
    pub upper_whisker: f64,
    pub outliers: Vec<f64>,
}

/// Rescale `(x - min) / (max - min)`; a constant column maps to zeros.
/// Non-finite values are treated as missing.
pub fn min_max_normalize(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let present = values.iter().flatten().filter(|v| v.is_finite());
    let min = present.clone().copied().fold(f64::INFINITY, f64::min);
    let max = present.copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;

    values
        .iter()
        .map(|v| {
            v.filter(|x| x.is_finite()).map(|x| {
                if span > 0.0 {
                    (x - min) / span
                } else {
                    0.0
                }
            })
        })
        .collect()
}

/// Normalise every numeric column of the view.
pub fn normalize_view(view: &FilteredView<'_>) -> Vec<NormalizedColumn> {
    numeric_columns(view)
        .into_iter()
        .map(|(column, values)| NormalizedColumn {
            values: min_max_normalize(&values),
            column,
        })
        .collect()
}

/// Box statistics of a column; `None` when it has no values.
pub fn box_stats(column: &str, values: &[Option<f64>]) -> Option<BoxStats> {
    let sorted = finite_sorted(values);

    let q1 = quantile_sorted(&sorted, 0.25)?;
    let median = quantile_sorted(&sorted, 0.5)?;
    let q3 = quantile_sorted(&sorted, 0.75)?;
    let iqr = q3 - q1;
    let (lo_fence, hi_fence) = (q1 - WHISKER_IQR * iqr, q3 + WHISKER_IQR * iqr);

    let inside = sorted.iter().copied().filter(|v| (lo_fence..=hi_fence).contains(v));
    let lower_whisker = inside.clone().next().unwrap_or(q1);
    let upper_whisker = inside.last().unwrap_or(q3);
    let outliers = sorted
        .iter()
        .copied()
        .filter(|v| !(lo_fence..=hi_fence).contains(v))
        .collect();

    Some(BoxStats {
        column: column.to_string(),
        q1,
        median,
        q3,
        lower_whisker,
        upper_whisker,
        outliers,
    })
}

/// Box statistics for every normalised numeric column of the view.
pub fn normalized_box_stats(view: &FilteredView<'_>) -> Vec<BoxStats> {
    normalize_view(view)
        .iter()
        .filter_map(|col| box_stats(&col.column, &col.values))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_to_unit_interval() {
        let out = min_max_normalize(&[Some(2.0), None, Some(6.0), Some(4.0)]);
        assert_eq!(out, vec![Some(0.0), None, Some(1.0), Some(0.5)]);
    }

    #[test]
    fn constant_column_maps_to_zero() {
        let out = min_max_normalize(&[Some(3.0), Some(3.0), None]);
        assert_eq!(out, vec![Some(0.0), Some(0.0), None]);
    }

    #[test]
    fn empty_column_stays_empty() {
        assert!(min_max_normalize(&[]).is_empty());
        assert_eq!(box_stats("x", &[None, None]), None);
    }

    #[test]
    fn infinite_values_are_skipped() {
        let out = min_max_normalize(&[Some(2.0), Some(f64::INFINITY), Some(4.0), Some(f64::NAN)]);
        assert_eq!(out, vec![Some(0.0), None, Some(1.0), None]);

        let stats = box_stats("x", &[Some(1.0), Some(f64::NEG_INFINITY), Some(3.0)]).unwrap();
        assert_eq!(stats.median, 2.0);
        assert!(stats.outliers.is_empty());
    }

    #[test]
    fn box_stats_flag_outliers() {
        let values: Vec<Option<f64>> = [1.0, 2.0, 3.0, 4.0, 5.0, 100.0]
            .into_iter()
            .map(Some)
            .collect();
        let stats = box_stats("absences", &values).unwrap();
        // positions 1.25, 2.5, 3.75
        assert_eq!(stats.q1, 2.25);
        assert_eq!(stats.median, 3.5);
        assert_eq!(stats.q3, 4.75);
        assert_eq!(stats.lower_whisker, 1.0);
        assert_eq!(stats.upper_whisker, 5.0);
        assert_eq!(stats.outliers, vec![100.0]);
    }
}
