use serde::Serialize;

use super::filter::FilteredView;
use super::model::ColumnType;

// ---------------------------------------------------------------------------
// Aggregate types
// ---------------------------------------------------------------------------

/// Descriptive statistics of one numeric column.
///
/// Every statistic is `None` when it is undefined for the available values
/// (no values at all; `std` with a single value).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub column: String,
    /// Non-null values.
    pub count: usize,
    pub mean: Option<f64>,
    /// Sample standard deviation (n - 1).
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub p25: Option<f64>,
    pub p50: Option<f64>,
    pub p75: Option<f64>,
    pub max: Option<f64>,
}

/// Symmetric Pearson correlation matrix over the numeric columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        self.values[i][j]
    }
}

/// Null cell count of a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NullCount {
    pub column: String,
    pub nulls: usize,
}

/// Name, type and non-null count of a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub column: String,
    pub kind: ColumnType,
    pub non_null: usize,
}

/// Everything the dashboard displays about a filtered view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryAggregates {
    /// Rows in the view.
    pub row_count: usize,
    /// Rows in the unfiltered dataset.
    pub total_rows: usize,
    pub describe: Vec<ColumnSummary>,
    pub null_counts: Vec<NullCount>,
    pub correlation: CorrelationMatrix,
}

// ---------------------------------------------------------------------------
// computeSummaryAggregates
// ---------------------------------------------------------------------------

/// Compute describe-style statistics, null counts and the correlation matrix.
///
/// Never fails: an empty view yields `None` statistics throughout.
pub fn compute_summary_aggregates(view: &FilteredView<'_>) -> SummaryAggregates {
    let numeric = numeric_columns(view);

    let describe = numeric
        .iter()
        .map(|(name, values)| describe_column(name, values))
        .collect();

    SummaryAggregates {
        row_count: view.len(),
        total_rows: view.dataset().len(),
        describe,
        null_counts: null_counts(view),
        correlation: correlation_matrix(&numeric),
    }
}

/// Numeric columns of the view, in schema order, as optional floats.
///
/// Null, NaN and infinite cells all come out as `None`.
pub fn numeric_columns(view: &FilteredView<'_>) -> Vec<(String, Vec<Option<f64>>)> {
    let schema = view.dataset().schema();
    schema
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, f)| f.kind == ColumnType::Numeric)
        .map(|(idx, f)| {
            let values = view
                .records()
                .map(|r| r.get(idx).as_finite())
                .collect();
            (f.name.clone(), values)
        })
        .collect()
}

pub fn describe_column(name: &str, values: &[Option<f64>]) -> ColumnSummary {
    let present = finite_sorted(values);

    let count = present.len();
    let mean = mean(&present);
    let std = mean.and_then(|m| sample_std(&present, m));

    ColumnSummary {
        column: name.to_string(),
        count,
        mean,
        std,
        min: present.first().copied(),
        p25: quantile_sorted(&present, 0.25),
        p50: quantile_sorted(&present, 0.5),
        p75: quantile_sorted(&present, 0.75),
        max: present.last().copied(),
    }
}

/// Null cells per column, for every column in the schema.
pub fn null_counts(view: &FilteredView<'_>) -> Vec<NullCount> {
    dataset_info(view)
        .into_iter()
        .map(|info| NullCount {
            nulls: view.len() - info.non_null,
            column: info.column,
        })
        .collect()
}

/// Column names, types and non-null counts of the view.
pub fn dataset_info(view: &FilteredView<'_>) -> Vec<ColumnInfo> {
    view.dataset()
        .schema()
        .fields()
        .iter()
        .enumerate()
        .map(|(idx, f)| ColumnInfo {
            column: f.name.clone(),
            kind: f.kind,
            non_null: view.records().filter(|r| !r.get(idx).is_missing()).count(),
        })
        .collect()
}

pub fn correlation_matrix(columns: &[(String, Vec<Option<f64>>)]) -> CorrelationMatrix {
    let n = columns.len();
    let mut values = vec![vec![None; n]; n];
    for i in 0..n {
        for j in i..n {
            let r = pearson(&columns[i].1, &columns[j].1);
            // exact 1 on the diagonal whenever it is defined
            let r = if i == j { r.map(|_| 1.0) } else { r };
            values[i][j] = r;
            values[j][i] = r;
        }
    }
    CorrelationMatrix {
        columns: columns.iter().map(|(name, _)| name.clone()).collect(),
        values,
    }
}

// ---------------------------------------------------------------------------
// Numeric routines
// ---------------------------------------------------------------------------

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn sample_std(values: &[f64], mean: f64) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

/// Finite values of an optional column, ascending.
pub(crate) fn finite_sorted(values: &[Option<f64>]) -> Vec<f64> {
    let mut present: Vec<f64> = values
        .iter()
        .flatten()
        .copied()
        .filter(|v| v.is_finite())
        .collect();
    present.sort_by(f64::total_cmp);
    present
}

/// Linearly interpolated quantile of ascending `sorted` at position `q * (n - 1)`.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        return Some(sorted[lo]);
    }
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Quantile of unsorted optional values, ignoring nulls.
pub fn quantile(values: &[Option<f64>], q: f64) -> Option<f64> {
    let present = finite_sorted(values);
    quantile_sorted(&present, q)
}

/// Pearson correlation over pairwise-complete observations.
///
/// `None` with fewer than two complete pairs or when either side is constant.
/// Constancy is checked on the values themselves, not on the accumulated
/// variance, which rounding can leave slightly above zero.
pub fn pearson(x: &[Option<f64>], y: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .collect();
    if pairs.len() < 2
        || is_constant(pairs.iter().map(|p| p.0))
        || is_constant(pairs.iter().map(|p| p.1))
    {
        return None;
    }

    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in &pairs {
        let (dx, dy) = (a - mx, b - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

fn is_constant(mut values: impl Iterator<Item = f64>) -> bool {
    match values.next() {
        Some(first) => values.all(|v| v == first),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::filter::{apply_filter, Constraint, FilterSpec};
    use crate::data::model::{Dataset, Field, Record, Schema, Value};

    fn assert_close(a: Option<f64>, b: f64) {
        let a = a.expect("value should be defined");
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    fn fixture() -> Dataset {
        let schema = Schema::new(vec![
            Field::new("school", ColumnType::Categorical),
            Field::new("age", ColumnType::Numeric),
            Field::new("G3", ColumnType::Numeric),
            Field::new("level", ColumnType::Numeric),
        ])
        .unwrap();
        let rows = [
            ("GP", 15, 10, 1),
            ("GP", 16, 12, 1),
            ("MS", 17, 11, 1),
            ("MS", 18, 15, 1),
        ];
        Dataset::new(
            schema,
            rows.iter()
                .map(|&(s, a, g, l)| {
                    Record::new(vec![
                        s.into(),
                        Value::Integer(a),
                        Value::Integer(g),
                        Value::Integer(l),
                    ])
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn describe_pins_exact_values() {
        let ds = fixture();
        let agg = compute_summary_aggregates(&FilteredView::all(&ds));
        assert_eq!(agg.row_count, 4);
        assert_eq!(agg.describe.len(), 3);

        let age = &agg.describe[0];
        assert_eq!(age.column, "age");
        assert_eq!(age.count, 4);
        assert_close(age.mean, 16.5);
        assert_close(age.std, (5.0f64 / 3.0).sqrt());
        assert_eq!(age.min, Some(15.0));
        assert_close(age.p25, 15.75);
        assert_close(age.p50, 16.5);
        assert_close(age.p75, 17.25);
        assert_eq!(age.max, Some(18.0));

        let g3 = &agg.describe[1];
        // sorted 10, 11, 12, 15
        assert_close(g3.p25, 10.75);
        assert_close(g3.p50, 11.5);
        assert_close(g3.p75, 12.75);
    }

    #[test]
    fn correlation_pins_exact_values() {
        let ds = fixture();
        let agg = compute_summary_aggregates(&FilteredView::all(&ds));
        let corr = &agg.correlation;
        assert_eq!(corr.columns, vec!["age", "G3", "level"]);
        // dx = -1.5,-0.5,0.5,1.5; dy = -2,0,-1,3 → sxy = 7, sxx = 5, syy = 14
        assert_close(corr.get("age", "G3"), 7.0 / (5.0f64 * 14.0).sqrt());
        assert_eq!(corr.get("age", "G3"), corr.get("G3", "age"));
    }

    #[test]
    fn diagonal_is_exactly_one_and_constant_column_is_null() {
        let ds = fixture();
        let corr = compute_summary_aggregates(&FilteredView::all(&ds)).correlation;
        assert_eq!(corr.get("age", "age"), Some(1.0));
        assert_eq!(corr.get("G3", "G3"), Some(1.0));
        assert_eq!(corr.get("level", "level"), None);
        assert_eq!(corr.get("level", "age"), None);
        assert_eq!(corr.get("G3", "level"), None);
    }

    #[test]
    fn empty_view_reports_nulls_without_panicking() {
        let ds = fixture();
        let spec = FilterSpec::new().with(
            "school",
            Constraint::Categorical {
                allowed: Default::default(),
            },
        );
        let view = apply_filter(&ds, &spec).unwrap();
        let agg = compute_summary_aggregates(&view);
        assert_eq!(agg.row_count, 0);
        assert_eq!(agg.total_rows, 4);
        for col in &agg.describe {
            assert_eq!(col.count, 0);
            assert!(col.mean.is_none() && col.std.is_none());
            assert!(col.min.is_none() && col.p50.is_none() && col.max.is_none());
        }
        assert!(agg
            .correlation
            .values
            .iter()
            .flatten()
            .all(Option::is_none));
        assert!(agg.null_counts.iter().all(|n| n.nulls == 0));
    }

    #[test]
    fn single_row_has_no_std_or_correlation() {
        let ds = fixture();
        let spec = FilterSpec::new().with("age", Constraint::range(15.0, 15.0));
        let agg = compute_summary_aggregates(&apply_filter(&ds, &spec).unwrap());
        assert_eq!(agg.describe[0].mean, Some(15.0));
        assert_eq!(agg.describe[0].std, None);
        assert_eq!(agg.correlation.get("age", "age"), None);
    }

    #[test]
    fn nulls_are_counted_and_skipped() {
        let schema = Schema::new(vec![
            Field::new("x", ColumnType::Numeric),
            Field::new("y", ColumnType::Numeric),
        ])
        .unwrap();
        let ds = Dataset::new(
            schema,
            vec![
                Record::new(vec![Value::Integer(1), Value::Integer(2)]),
                Record::new(vec![Value::Null, Value::Integer(9)]),
                Record::new(vec![Value::Integer(2), Value::Integer(4)]),
                Record::new(vec![Value::Integer(3), Value::Integer(6)]),
            ],
        )
        .unwrap();
        let agg = compute_summary_aggregates(&FilteredView::all(&ds));
        assert_eq!(agg.describe[0].count, 3);
        assert_eq!(agg.null_counts[0], NullCount { column: "x".into(), nulls: 1 });
        assert_eq!(agg.null_counts[1].nulls, 0);
        // the (null, 9) row is dropped pairwise, leaving a perfect line
        assert_close(agg.correlation.get("x", "y"), 1.0);
    }

    #[test]
    fn constant_rounded_average_has_no_correlation() {
        use crate::data::derive::{compute_derived_columns, AVERAGE_GRADE};

        let schema = Schema::new(vec![
            Field::new("age", ColumnType::Numeric),
            Field::new("G1", ColumnType::Numeric),
            Field::new("G2", ColumnType::Numeric),
            Field::new("G3", ColumnType::Numeric),
        ])
        .unwrap();
        // every row averages to 5.67
        let rows = [(15, 5, 6, 6), (16, 6, 5, 6), (18, 6, 6, 5)];
        let raw = Dataset::new(
            schema,
            rows.iter()
                .map(|&(a, g1, g2, g3)| {
                    Record::new(vec![
                        Value::Integer(a),
                        Value::Integer(g1),
                        Value::Integer(g2),
                        Value::Integer(g3),
                    ])
                })
                .collect(),
        )
        .unwrap();
        let ds = compute_derived_columns(&raw).unwrap();
        assert!(ds
            .column(AVERAGE_GRADE)
            .unwrap()
            .iter()
            .all(|v| **v == Value::Float(5.67)));

        let corr = compute_summary_aggregates(&FilteredView::all(&ds)).correlation;
        assert_eq!(corr.get("age", AVERAGE_GRADE), None);
        assert_eq!(corr.get(AVERAGE_GRADE, AVERAGE_GRADE), None);
        assert_eq!(corr.get("age", "age"), Some(1.0));
        assert_eq!(pearson(&[Some(5.67); 3], &[Some(1.0), Some(2.0), Some(4.0)]), None);
    }

    #[test]
    fn non_finite_cells_are_excluded_from_statistics() {
        let schema = Schema::new(vec![
            Field::new("x", ColumnType::Numeric),
            Field::new("y", ColumnType::Numeric),
        ])
        .unwrap();
        let ds = Dataset::new(
            schema,
            vec![
                Record::new(vec![Value::Float(1.0), Value::Float(2.0)]),
                Record::new(vec![Value::Float(f64::INFINITY), Value::Float(3.0)]),
                Record::new(vec![Value::Float(2.0), Value::Float(f64::NAN)]),
                Record::new(vec![Value::Float(3.0), Value::Float(6.0)]),
                Record::new(vec![Value::Float(4.0), Value::Float(8.0)]),
            ],
        )
        .unwrap();
        let agg = compute_summary_aggregates(&FilteredView::all(&ds));

        let x = &agg.describe[0];
        assert_eq!(x.count, 4);
        assert_close(x.mean, 2.5);
        assert_eq!(x.max, Some(4.0));
        assert_eq!(agg.null_counts[0].nulls, 1);
        assert_eq!(agg.null_counts[1].nulls, 1);
        // complete finite pairs: (1, 2), (3, 6), (4, 8)
        let r = agg.correlation.get("x", "y").expect("correlation should be defined");
        assert!(r.is_finite() && r > 0.99);
    }

    #[test]
    fn quantile_edges() {
        assert_eq!(quantile_sorted(&[], 0.5), None);
        assert_eq!(quantile_sorted(&[4.0], 0.75), Some(4.0));
        assert_eq!(quantile_sorted(&[1.0, 2.0], 1.5), None);
        assert_eq!(quantile(&[Some(3.0), None, Some(1.0), Some(2.0)], 0.5), Some(2.0));
    }

    #[test]
    fn dataset_info_lists_every_column() {
        let ds = fixture();
        let info = dataset_info(&FilteredView::all(&ds));
        assert_eq!(info.len(), 4);
        assert_eq!(info[0].kind, ColumnType::Categorical);
        assert!(info.iter().all(|c| c.non_null == 4));
    }
}
