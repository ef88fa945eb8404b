use log::{debug, warn};

use super::model::{ColumnType, Dataset, Value};
use crate::error::{PipelineError, Result};

/// Period grades averaged into [`AVERAGE_GRADE`].
pub const GRADE_COLUMNS: [&str; 3] = ["G1", "G2", "G3"];

/// Name of the derived mean-grade column.
pub const AVERAGE_GRADE: &str = "Average_Grade";

/// Add (or overwrite) `Average_Grade = round((G1 + G2 + G3) / 3, 2)`.
///
/// A record whose grade cells are null, non-finite or non-numeric gets a null average
/// instead of failing the whole dataset.
pub fn compute_derived_columns(dataset: &Dataset) -> Result<Dataset> {
    let mut indices = [0usize; 3];
    for (slot, name) in indices.iter_mut().zip(GRADE_COLUMNS) {
        *slot = dataset.schema().require(name)?.0;
    }

    let mut nulled = 0usize;
    let averages: Vec<Value> = dataset
        .records()
        .iter()
        .enumerate()
        .map(|(row, record)| {
            let grades: Result<Vec<f64>> = indices
                .iter()
                .zip(GRADE_COLUMNS)
                .map(|(&idx, name)| numeric_cell(record.get(idx), name, row))
                .collect();
            match grades {
                Ok(g) => Value::Float(round2(g.iter().sum::<f64>() / 3.0)),
                Err(err) => {
                    debug!("{AVERAGE_GRADE} is null: {err}");
                    nulled += 1;
                    Value::Null
                }
            }
        })
        .collect();

    if nulled > 0 {
        warn!(
            "{nulled} of {} records have a null {AVERAGE_GRADE} (missing or non-numeric grades)",
            dataset.len()
        );
    }

    dataset.with_column(AVERAGE_GRADE, ColumnType::Numeric, averages)
}

fn numeric_cell(value: &Value, column: &str, row: usize) -> Result<f64> {
    value.as_finite().ok_or_else(|| PipelineError::InvalidType {
            column: column.to_string(),
            row: Some(row),
            expected: "numeric",
        })
}

/// Round half away from zero to two decimals.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Field, Record, Schema};

    fn grades(rows: Vec<[Value; 3]>) -> Dataset {
        let schema = Schema::new(
            GRADE_COLUMNS
                .iter()
                .map(|n| Field::new(*n, ColumnType::Numeric))
                .collect(),
        )
        .unwrap();
        Dataset::new(
            schema,
            rows.into_iter().map(|r| Record::new(r.to_vec())).collect(),
        )
        .unwrap()
    }

    #[test]
    fn average_of_ten_twelve_fourteen_is_twelve() {
        let ds = grades(vec![[Value::Integer(10), Value::Integer(12), Value::Integer(14)]]);
        let out = compute_derived_columns(&ds).unwrap();
        assert_eq!(out.column(AVERAGE_GRADE).unwrap(), vec![&Value::Float(12.0)]);
    }

    #[test]
    fn average_rounds_to_two_decimals() {
        let ds = grades(vec![
            [Value::Integer(10), Value::Integer(10), Value::Integer(11)],
            [Value::Integer(5), Value::Integer(6), Value::Integer(6)],
        ]);
        let out = compute_derived_columns(&ds).unwrap();
        let avg: Vec<f64> = out
            .column(AVERAGE_GRADE)
            .unwrap()
            .iter()
            .filter_map(|v| v.as_f64())
            .collect();
        assert_eq!(avg, vec![10.33, 5.67]);
    }

    #[test]
    fn null_grade_propagates_to_null_average() {
        let ds = grades(vec![
            [Value::Integer(10), Value::Null, Value::Integer(14)],
            [Value::Integer(8), Value::Integer(8), Value::Integer(8)],
        ]);
        let out = compute_derived_columns(&ds).unwrap();
        let avg = out.column(AVERAGE_GRADE).unwrap();
        assert!(avg[0].is_null());
        assert_eq!(avg[1], &Value::Float(8.0));
    }

    #[test]
    fn non_numeric_grade_column_yields_nulls() {
        let schema = Schema::new(vec![
            Field::new("G1", ColumnType::Categorical),
            Field::new("G2", ColumnType::Numeric),
            Field::new("G3", ColumnType::Numeric),
        ])
        .unwrap();
        let ds = Dataset::new(
            schema,
            vec![Record::new(vec!["ten".into(), Value::Integer(12), Value::Integer(14)])],
        )
        .unwrap();
        let out = compute_derived_columns(&ds).unwrap();
        assert!(out.column(AVERAGE_GRADE).unwrap()[0].is_null());
    }

    #[test]
    fn non_finite_grade_yields_null_average() {
        let ds = grades(vec![
            [Value::Float(f64::INFINITY), Value::Integer(12), Value::Integer(14)],
            [Value::Integer(9), Value::Float(f64::NAN), Value::Integer(9)],
        ]);
        let out = compute_derived_columns(&ds).unwrap();
        assert!(out.column(AVERAGE_GRADE).unwrap().iter().all(|v| v.is_null()));
    }

    #[test]
    fn missing_grade_column_fails() {
        let schema = Schema::new(vec![
            Field::new("G1", ColumnType::Numeric),
            Field::new("G2", ColumnType::Numeric),
        ])
        .unwrap();
        let ds = Dataset::new(schema, vec![]).unwrap();
        assert_eq!(
            compute_derived_columns(&ds).unwrap_err(),
            PipelineError::MissingColumn {
                column: "G3".into()
            }
        );
    }

    #[test]
    fn recomputing_overwrites_existing_average() {
        let ds = grades(vec![[Value::Integer(1), Value::Integer(2), Value::Integer(3)]]);
        let once = compute_derived_columns(&ds).unwrap();
        let twice = compute_derived_columns(&once).unwrap();
        assert_eq!(once, twice);
        assert_eq!(twice.schema().len(), 4);
    }
}
