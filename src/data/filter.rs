use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::model::{ColumnType, Dataset, Record, Value};
use crate::error::{PipelineError, Result};

/// Categorical columns exposed as multiselect filters on the dashboard.
pub const CATEGORICAL_FILTER_COLUMNS: [&str; 3] = ["school", "sex", "address"];

/// Numeric columns exposed as range sliders on the dashboard.
pub const RANGE_FILTER_COLUMNS: [&str; 4] = ["age", "studytime", "failures", "absences"];

// ---------------------------------------------------------------------------
// Constraint / FilterSpec
// ---------------------------------------------------------------------------

/// An inclusion constraint on a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Constraint {
    /// Keep a row iff its value is in `allowed`. An empty set keeps nothing.
    Categorical { allowed: BTreeSet<Value> },
    /// Keep a row iff `min <= value <= max`. Missing cells (null, NaN, ±inf)
    /// pass only with `keep_nulls`.
    Range {
        min: f64,
        max: f64,
        #[serde(default)]
        keep_nulls: bool,
    },
}

impl Constraint {
    pub fn categorical<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Constraint::Categorical {
            allowed: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn range(min: f64, max: f64) -> Self {
        Constraint::Range {
            min,
            max,
            keep_nulls: false,
        }
    }

    /// Whether a single cell satisfies the constraint.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Constraint::Categorical { allowed } => allowed.contains(value),
            Constraint::Range {
                min,
                max,
                keep_nulls,
            } => match value.as_finite() {
                Some(v) => *min <= v && v <= *max,
                None => *keep_nulls && value.is_missing(),
            },
        }
    }

    fn validate(&self, column: &str, kind: ColumnType) -> Result<()> {
        if let Constraint::Range { min, max, .. } = self {
            if kind != ColumnType::Numeric {
                return Err(PipelineError::InvalidType {
                    column: column.to_string(),
                    row: None,
                    expected: "numeric",
                });
            }
            // `!(min <= max)` also rejects NaN bounds.
            if !(min <= max) {
                return Err(PipelineError::InvalidRange {
                    column: column.to_string(),
                    min: *min,
                    max: *max,
                });
            }
        }
        Ok(())
    }
}

/// Per-column constraints, combined with logical AND.
///
/// A column without a constraint is unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSpec {
    constraints: BTreeMap<String, Constraint>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, column: impl Into<String>, constraint: Constraint) -> Self {
        self.constraints.insert(column.into(), constraint);
        self
    }

    /// Insert or replace the constraint for `column`, returning the old one.
    pub fn set(&mut self, column: impl Into<String>, constraint: Constraint) -> Option<Constraint> {
        self.constraints.insert(column.into(), constraint)
    }

    pub fn remove(&mut self, column: &str) -> Option<Constraint> {
        self.constraints.remove(column)
    }

    pub fn get(&self, column: &str) -> Option<&Constraint> {
        self.constraints.get(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Constraint)> {
        self.constraints.iter().map(|(c, k)| (c.as_str(), k))
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Check every constraint against the dataset schema without touching rows.
    pub fn validate(&self, dataset: &Dataset) -> Result<()> {
        for (column, constraint) in &self.constraints {
            let (_, kind) = dataset.schema().require(column)?;
            constraint.validate(column, kind)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Default filters for the dashboard's sidebar columns: every observed
/// category selected, every range spanning the observed min/max.
pub fn derive_default_filter_spec(dataset: &Dataset) -> Result<FilterSpec> {
    let columns: Vec<&str> = CATEGORICAL_FILTER_COLUMNS
        .iter()
        .chain(RANGE_FILTER_COLUMNS.iter())
        .copied()
        .collect();
    derive_filter_spec_for(dataset, &columns)
}

/// Default (no-op) filters for an arbitrary set of columns.
///
/// Numeric columns get a range constraint; categorical and boolean columns
/// get a membership constraint over their distinct values.
pub fn derive_filter_spec_for(dataset: &Dataset, columns: &[&str]) -> Result<FilterSpec> {
    if dataset.is_empty() {
        return Err(PipelineError::EmptyDataset);
    }

    let mut spec = FilterSpec::new();
    for &column in columns {
        let (_, kind) = dataset.schema().require(column)?;
        let observed = dataset
            .unique_values(column)
            .ok_or_else(|| PipelineError::MissingColumn {
                column: column.to_string(),
            })?;

        let constraint = match kind {
            ColumnType::Numeric => {
                // unique values are sorted, with null first
                let mut numbers = observed.iter().filter_map(Value::as_finite);
                let Some(first) = numbers.next() else {
                    warn!("column '{column}' has no numeric values; leaving it unfiltered");
                    continue;
                };
                let last = numbers.last().unwrap_or(first);
                Constraint::Range {
                    min: first,
                    max: last,
                    keep_nulls: observed.iter().any(Value::is_missing),
                }
            }
            ColumnType::Categorical | ColumnType::Boolean => Constraint::Categorical {
                allowed: observed.clone(),
            },
        };
        spec.set(column, constraint);
    }
    Ok(spec)
}

// ---------------------------------------------------------------------------
// FilteredView
// ---------------------------------------------------------------------------

/// The rows of a dataset that pass a filter, in original order.
///
/// Borrows the dataset; never copies or mutates it.
#[derive(Debug, Clone)]
pub struct FilteredView<'a> {
    dataset: &'a Dataset,
    indices: Vec<usize>,
}

impl<'a> FilteredView<'a> {
    /// A view containing every row.
    pub fn all(dataset: &'a Dataset) -> Self {
        Self {
            dataset,
            indices: (0..dataset.len()).collect(),
        }
    }

    /// A view over pre-computed row indices (ascending, in range).
    pub(crate) fn from_indices(dataset: &'a Dataset, indices: Vec<usize>) -> Self {
        Self { dataset, indices }
    }

    pub fn dataset(&self) -> &'a Dataset {
        self.dataset
    }

    /// Row indices into the underlying dataset.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &'a Record> + '_ {
        let records = self.dataset.records();
        self.indices.iter().map(move |&i| &records[i])
    }

    /// Values of one column across the visible rows.
    pub fn column(&self, column: &str) -> Result<Vec<&'a Value>> {
        let (idx, _) = self.dataset.schema().require(column)?;
        Ok(self.records().map(|r| r.get(idx)).collect())
    }

    /// Numeric values of one column; missing and non-numeric cells become `None`.
    pub fn numeric_column(&self, column: &str) -> Result<Vec<Option<f64>>> {
        Ok(self
            .column(column)?
            .into_iter()
            .map(Value::as_finite)
            .collect())
    }

    /// First `n` visible records.
    pub fn head(&self, n: usize) -> Vec<&'a Record> {
        self.records().take(n).collect()
    }

    /// Materialise the view into an owned dataset with the same schema.
    pub fn to_dataset(&self) -> Result<Dataset> {
        Dataset::new(
            self.dataset.schema().clone(),
            self.records().cloned().collect(),
        )
    }
}

// ---------------------------------------------------------------------------
// applyFilter
// ---------------------------------------------------------------------------

/// Keep the rows that satisfy every constraint, preserving order.
///
/// The whole filter spec is validated before any row is examined.
pub fn apply_filter<'a>(dataset: &'a Dataset, spec: &FilterSpec) -> Result<FilteredView<'a>> {
    spec.validate(dataset)?;

    let mut active: Vec<(usize, &Constraint)> = Vec::with_capacity(spec.len());
    for (column, constraint) in spec.iter() {
        let (idx, _) = dataset.schema().require(column)?;
        // Everything observed is selected → no effective filter.
        if let (Constraint::Categorical { allowed }, Some(observed)) =
            (constraint, dataset.unique_values(column))
        {
            if allowed.is_superset(observed) {
                continue;
            }
        }
        active.push((idx, constraint));
    }

    let indices: Vec<usize> = dataset
        .records()
        .iter()
        .enumerate()
        .filter(|(_, record)| {
            active
                .iter()
                .all(|(idx, constraint)| constraint.matches(record.get(*idx)))
        })
        .map(|(i, _)| i)
        .collect();

    debug!(
        "filter kept {} of {} records ({} active constraints)",
        indices.len(),
        dataset.len(),
        active.len()
    );

    Ok(FilteredView::from_indices(dataset, indices))
}
