use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{
    Array, AsArray, BooleanArray, Float32Array, Float64Array, Int16Array, Int32Array, Int64Array,
    Int8Array, UInt16Array, UInt32Array, UInt8Array,
};
use arrow::datatypes::DataType;
use log::{info, warn};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{ColumnType, Dataset, Field, Record, Schema, Value};
use crate::config::LoadOptions;

/// Cell spellings read as missing values, compared case-insensitively.
const NULL_TOKENS: [&str; 5] = ["", "na", "n/a", "nan", "null"];

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a student dataset from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv` / `.txt` – header row, fields separated by `options.delimiter` (`;` by default)
/// * `.json`         – `[{ "school": "GP", "age": 18, ... }, ...]`
/// * `.parquet`      – one flat column per field
pub fn load_file(path: &Path, options: &LoadOptions) -> Result<Dataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let dataset = match ext.as_str() {
        "csv" | "txt" => load_csv(path, options),
        "json" => load_json(path, options),
        "parquet" | "pq" => load_parquet(path, options),
        other => bail!("Unsupported file extension: .{other}"),
    }
    .with_context(|| format!("loading {}", path.display()))?;

    info!(
        "loaded {} records x {} columns from {}",
        dataset.len(),
        dataset.schema().len(),
        path.display()
    );
    Ok(dataset)
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one student per row.
pub fn load_csv(path: &Path, options: &LoadOptions) -> Result<Dataset> {
    let reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .from_path(path)
        .context("opening CSV")?;
    read_csv(reader, options)
}

/// Parse delimited text already in memory (used for uploads and tests).
pub fn parse_csv(text: &str, options: &LoadOptions) -> Result<Dataset> {
    let reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .from_reader(text.as_bytes());
    read_csv(reader, options)
}

fn read_csv<R: std::io::Read>(
    mut reader: csv::Reader<R>,
    options: &LoadOptions,
) -> Result<Dataset> {
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    options.check_columns(headers.len())?;

    let mut rows: Vec<Vec<String>> = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        options.check_rows(row_no + 1)?;
        rows.push(record.iter().map(|s| s.trim().to_string()).collect());
    }

    let columns: Vec<(ColumnType, Vec<Value>)> = (0..headers.len())
        .map(|c| infer_column(rows.iter().map(|r| r.get(c).map(String::as_str).unwrap_or(""))))
        .collect();

    assemble(headers, columns, rows.len())
}

/// Infer a column type from its text cells and parse every cell accordingly.
///
/// All non-null cells integer → numeric (integers); all numeric → numeric
/// (floats); all `true`/`false` → boolean; anything else → categorical.
fn infer_column<'a>(cells: impl Iterator<Item = &'a str> + Clone) -> (ColumnType, Vec<Value>) {
    let present = cells.clone().filter(|s| !is_null_token(s));

    let all_int = present.clone().all(|s| s.parse::<i64>().is_ok());
    let all_num = all_int || present.clone().all(|s| s.parse::<f64>().is_ok());
    let all_bool = present.clone().all(|s| parse_bool(s).is_some());
    let any_present = present.clone().next().is_some();

    let parse: fn(&str) -> Value = if !any_present || all_int {
        parse_integer
    } else if all_num {
        parse_float
    } else if all_bool {
        parse_boolean
    } else {
        parse_text
    };
    let kind = if !any_present || all_num {
        ColumnType::Numeric
    } else if all_bool {
        ColumnType::Boolean
    } else {
        ColumnType::Categorical
    };

    let values = cells
        .map(|s| if is_null_token(s) { Value::Null } else { parse(s) })
        .collect();
    (kind, values)
}

fn parse_integer(s: &str) -> Value {
    s.parse::<i64>().map(Value::Integer).unwrap_or(Value::Null)
}

fn parse_float(s: &str) -> Value {
    s.parse::<f64>().map(finite_float).unwrap_or(Value::Null)
}

/// NaN and infinities are stored as null.
fn finite_float(v: f64) -> Value {
    if v.is_finite() {
        Value::Float(v)
    } else {
        Value::Null
    }
}

fn parse_boolean(s: &str) -> Value {
    parse_bool(s).map(Value::Bool).unwrap_or(Value::Null)
}

fn parse_text(s: &str) -> Value {
    Value::String(s.to_string())
}

fn is_null_token(s: &str) -> bool {
    NULL_TOKENS.iter().any(|t| t.eq_ignore_ascii_case(s))
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "school": "GP", "sex": "F", "age": 18, "G1": 5, "G2": 6, "G3": 6 },
///   ...
/// ]
/// ```
///
/// Columns are the union of keys over all records, sorted by name; a record
/// lacking a key gets a null cell.
pub fn load_json(path: &Path, options: &LoadOptions) -> Result<Dataset> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root.as_array().context("Expected top-level JSON array")?;
    options.check_rows(records.len())?;

    let mut keys: BTreeSet<&str> = BTreeSet::new();
    let mut first_keys = 0usize;
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        if i == 0 {
            first_keys = obj.len();
        }
        keys.extend(obj.keys().map(String::as_str));
    }
    if keys.len() > first_keys {
        warn!(
            "{} column(s) first appear after record 0; records without them read null",
            keys.len() - first_keys
        );
    }
    let headers: Vec<String> = keys.into_iter().map(str::to_string).collect();
    options.check_columns(headers.len())?;

    let mut cells: Vec<Vec<Value>> = vec![Vec::with_capacity(records.len()); headers.len()];
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        for (c, name) in headers.iter().enumerate() {
            cells[c].push(json_to_value(obj.get(name).unwrap_or(&JsonValue::Null)));
        }
    }

    let columns = cells.into_iter().map(unify_column).collect();
    assemble(headers, columns, records.len())
}

fn json_to_value(val: &JsonValue) -> Value {
    match val {
        JsonValue::String(s) => Value::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else if let Some(f) = n.as_f64() {
                finite_float(f)
            } else {
                Value::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Null => Value::Null,
        other => Value::String(other.to_string()),
    }
}

/// Pick a column type for already-typed values; mixed columns become
/// categorical with every non-null value rendered as text.
fn unify_column(values: Vec<Value>) -> (ColumnType, Vec<Value>) {
    let present = || values.iter().filter(|v| !v.is_null());
    let kind = if present().all(|v| v.as_f64().is_some()) {
        ColumnType::Numeric
    } else if present().all(|v| matches!(v, Value::Bool(_))) {
        ColumnType::Boolean
    } else {
        ColumnType::Categorical
    };

    let values = match kind {
        ColumnType::Categorical => values
            .into_iter()
            .map(|v| match v {
                Value::Null | Value::String(_) => v,
                other => Value::String(other.to_string()),
            })
            .collect(),
        _ => values,
    };
    (kind, values)
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with one flat column per field.
///
/// Integer and float columns become numeric, strings categorical, booleans
/// boolean. Works with files written by both **Pandas** (`df.to_parquet()`)
/// and **Polars** (`df.write_parquet()`).
pub fn load_parquet(path: &Path, options: &LoadOptions) -> Result<Dataset> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;

    let headers: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let kinds: Vec<ColumnType> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| arrow_column_type(f.data_type()))
        .collect::<Result<_>>()?;
    options.check_columns(headers.len())?;

    let reader = builder.build().context("building parquet reader")?;

    let mut cells: Vec<Vec<Value>> = vec![Vec::new(); headers.len()];
    let mut n_rows = 0usize;
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        n_rows += batch.num_rows();
        options.check_rows(n_rows)?;

        for (c, column) in batch.columns().iter().enumerate() {
            for row in 0..batch.num_rows() {
                let value = extract_value(column, row)
                    .with_context(|| format!("column '{}' row {row}", headers[c]))?;
                cells[c].push(value);
            }
        }
    }

    let columns = kinds.into_iter().zip(cells).collect();
    assemble(headers, columns, n_rows)
}

fn arrow_column_type(data_type: &DataType) -> Result<ColumnType> {
    Ok(match data_type {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::Float32
        | DataType::Float64 => ColumnType::Numeric,
        DataType::Utf8 | DataType::LargeUtf8 => ColumnType::Categorical,
        DataType::Boolean => ColumnType::Boolean,
        other => bail!("unsupported parquet column type {other:?}"),
    })
}

/// Extract a single value from an Arrow column at a given row.
fn extract_value(col: &Arc<dyn Array>, row: usize) -> Result<Value> {
    if col.is_null(row) {
        return Ok(Value::Null);
    }

    macro_rules! int_at {
        ($ty:ty) => {
            col.as_any()
                .downcast_ref::<$ty>()
                .map(|a| Value::Integer(a.value(row) as i64))
        };
    }

    let value = match col.data_type() {
        DataType::Utf8 => Some(Value::String(col.as_string::<i32>().value(row).to_string())),
        DataType::LargeUtf8 => Some(Value::String(col.as_string::<i64>().value(row).to_string())),
        DataType::Int8 => int_at!(Int8Array),
        DataType::Int16 => int_at!(Int16Array),
        DataType::Int32 => int_at!(Int32Array),
        DataType::Int64 => int_at!(Int64Array),
        DataType::UInt8 => int_at!(UInt8Array),
        DataType::UInt16 => int_at!(UInt16Array),
        DataType::UInt32 => int_at!(UInt32Array),
        DataType::Float32 => col
            .as_any()
            .downcast_ref::<Float32Array>()
            .map(|a| finite_float(a.value(row) as f64)),
        DataType::Float64 => col
            .as_any()
            .downcast_ref::<Float64Array>()
            .map(|a| finite_float(a.value(row))),
        DataType::Boolean => col
            .as_any()
            .downcast_ref::<BooleanArray>()
            .map(|a| Value::Bool(a.value(row))),
        other => bail!("unsupported parquet column type {other:?}"),
    };
    value.context("array type does not match its declared data type")
}

// ---------------------------------------------------------------------------
// Shared assembly
// ---------------------------------------------------------------------------

/// Turn column-major typed cells into a validated row-major dataset.
fn assemble(
    headers: Vec<String>,
    columns: Vec<(ColumnType, Vec<Value>)>,
    n_rows: usize,
) -> Result<Dataset> {
    let fields = headers
        .into_iter()
        .zip(&columns)
        .map(|(name, (kind, _))| Field::new(name, *kind))
        .collect();
    let schema = Schema::new(fields)?;

    let mut cursors: Vec<std::vec::IntoIter<Value>> =
        columns.into_iter().map(|(_, v)| v.into_iter()).collect();
    let records = (0..n_rows)
        .map(|_| Record::new(cursors.iter_mut().map(|c| c.next().unwrap_or(Value::Null)).collect()))
        .collect();

    Ok(Dataset::new(schema, records)?)
}
