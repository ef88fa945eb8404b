use std::collections::BTreeSet;

use crate::data::derive::compute_derived_columns;
use crate::data::filter::{
    apply_filter, derive_default_filter_spec, Constraint, FilterSpec, FilteredView,
};
use crate::data::model::{Dataset, Value};
use crate::data::stats::{compute_summary_aggregates, SummaryAggregates};
use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// Interaction state, independent of any rendering: the loaded dataset, the
/// current filters and the rows they keep.
///
/// Every mutation revalidates the filters and recomputes the visible rows. A
/// rejected change leaves the previous filters and rows in place.
#[derive(Debug, Clone)]
pub struct Session {
    /// Loaded dataset with `Average_Grade` derived.
    dataset: Dataset,

    /// Per-column filter selections.
    filters: FilterSpec,

    /// Indices of records passing the current filters (cached).
    visible_indices: Vec<usize>,
}

impl Session {
    /// Ingest a newly loaded dataset: derive columns, initialise filters.
    pub fn new(dataset: Dataset) -> Result<Self> {
        let dataset = compute_derived_columns(&dataset)?;
        let filters = derive_default_filter_spec(&dataset)?;
        Ok(Self {
            visible_indices: (0..dataset.len()).collect(),
            dataset,
            filters,
        })
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn filters(&self) -> &FilterSpec {
        &self.filters
    }

    pub fn visible_indices(&self) -> &[usize] {
        &self.visible_indices
    }

    /// The current filtered view.
    pub fn view(&self) -> FilteredView<'_> {
        FilteredView::from_indices(&self.dataset, self.visible_indices.clone())
    }

    /// Aggregates over the current view.
    pub fn summary(&self) -> SummaryAggregates {
        compute_summary_aggregates(&self.view())
    }

    /// Replace the whole filter spec.
    pub fn replace_filters(&mut self, filters: FilterSpec) -> Result<()> {
        let indices = apply_filter(&self.dataset, &filters)?.indices().to_vec();
        self.filters = filters;
        self.visible_indices = indices;
        Ok(())
    }

    /// Back to the defaults: everything selected, full ranges.
    pub fn reset_filters(&mut self) -> Result<()> {
        let defaults = derive_default_filter_spec(&self.dataset)?;
        self.replace_filters(defaults)
    }

    /// Toggle a single value in a column's categorical filter.
    pub fn toggle_value(&mut self, column: &str, value: &Value) -> Result<()> {
        let mut filters = self.filters.clone();
        let mut selected = match filters.remove(column) {
            Some(Constraint::Categorical { allowed }) => allowed,
            Some(Constraint::Range { .. }) => {
                return Err(PipelineError::InvalidType {
                    column: column.to_string(),
                    row: None,
                    expected: "categorical",
                })
            }
            // no constraint yet → everything was selected
            None => self.observed(column)?,
        };
        if !selected.remove(value) {
            selected.insert(value.clone());
        }
        filters.set(column, Constraint::Categorical { allowed: selected });
        self.replace_filters(filters)
    }

    /// Select all values in a column.
    pub fn select_all(&mut self, column: &str) -> Result<()> {
        let allowed = self.observed(column)?;
        self.set_constraint(column, Constraint::Categorical { allowed })
    }

    /// Deselect all values in a column.
    pub fn select_none(&mut self, column: &str) -> Result<()> {
        self.set_constraint(
            column,
            Constraint::Categorical {
                allowed: BTreeSet::new(),
            },
        )
    }

    /// Move a range slider.
    pub fn set_range(&mut self, column: &str, min: f64, max: f64) -> Result<()> {
        let keep_nulls = matches!(
            self.filters.get(column),
            Some(Constraint::Range { keep_nulls: true, .. })
        );
        self.set_constraint(
            column,
            Constraint::Range {
                min,
                max,
                keep_nulls,
            },
        )
    }

    /// Insert or replace one column's constraint.
    pub fn set_constraint(&mut self, column: &str, constraint: Constraint) -> Result<()> {
        let mut filters = self.filters.clone();
        filters.set(column, constraint);
        self.replace_filters(filters)
    }

    fn observed(&self, column: &str) -> Result<BTreeSet<Value>> {
        self.dataset
            .unique_values(column)
            .cloned()
            .ok_or_else(|| PipelineError::MissingColumn {
                column: column.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoadOptions;
    use crate::data::loader::parse_csv;

    const STUDENTS: &str = "\
school;sex;age;address;studytime;failures;absences;G1;G2;G3
GP;F;15;U;2;0;4;10;12;14
MS;M;22;R;1;3;20;5;5;5
GP;M;18;U;3;0;0;15;16;17
MS;F;17;U;4;1;7;12;12;12
";

    fn session() -> Session {
        Session::new(parse_csv(STUDENTS, &LoadOptions::default()).unwrap()).unwrap()
    }

    #[test]
    fn starts_with_everything_visible() {
        let s = session();
        assert_eq!(s.visible_indices(), &[0, 1, 2, 3]);
        assert!(s.dataset().schema().index_of("Average_Grade").is_some());
        assert_eq!(s.summary().row_count, 4);
    }

    #[test]
    fn toggling_a_school_hides_its_rows() {
        let mut s = session();
        s.toggle_value("school", &Value::from("MS")).unwrap();
        assert_eq!(s.visible_indices(), &[0, 2]);
        s.toggle_value("school", &Value::from("MS")).unwrap();
        assert_eq!(s.visible_indices(), &[0, 1, 2, 3]);
    }

    #[test]
    fn select_none_then_all() {
        let mut s = session();
        s.select_none("sex").unwrap();
        assert!(s.view().is_empty());
        assert_eq!(s.summary().describe[0].mean, None);
        s.select_all("sex").unwrap();
        assert_eq!(s.view().len(), 4);
    }

    #[test]
    fn rejected_range_keeps_previous_state() {
        let mut s = session();
        s.set_range("age", 15.0, 18.0).unwrap();
        assert_eq!(s.visible_indices(), &[0, 2, 3]);

        let err = s.set_range("age", 10.0, 2.0).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidRange { .. }));
        assert_eq!(s.visible_indices(), &[0, 2, 3]);
        assert_eq!(s.filters().get("age"), Some(&Constraint::range(15.0, 18.0)));
    }

    #[test]
    fn toggling_a_range_column_is_a_type_error() {
        let mut s = session();
        assert!(matches!(
            s.toggle_value("age", &Value::Integer(15)),
            Err(PipelineError::InvalidType { .. })
        ));
    }

    #[test]
    fn reset_restores_defaults() {
        let mut s = session();
        s.select_none("school").unwrap();
        s.reset_filters().unwrap();
        assert_eq!(s.view().len(), 4);
    }

    #[test]
    fn missing_grade_columns_are_reported() {
        let ds = parse_csv("school;age\nGP;15\n", &LoadOptions::default()).unwrap();
        assert_eq!(
            Session::new(ds).unwrap_err(),
            PipelineError::MissingColumn {
                column: "G1".into()
            }
        );
    }
}
