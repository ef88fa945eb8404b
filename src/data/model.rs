use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// Value – a single cell
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value mirroring the dtypes a CSV column infers to.
///
/// `Value` lives in `BTreeSet`s (categorical filters, unique values), so it is
/// totally ordered. Integers and floats compare numerically with each other,
/// which lets a filter file written with `1` match a float column holding `1.0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Null,
}

impl Value {
    /// Numeric view of the value; `None` for anything that is not a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Numeric view restricted to finite numbers; NaN and infinities read as `None`.
    pub fn as_finite(&self) -> Option<f64> {
        self.as_f64().filter(|v| v.is_finite())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Null, or a float that is NaN or infinite. Statistics skip these cells.
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Float(v) => !v.is_finite(),
            _ => false,
        }
    }

    /// Whether the value may appear in a column of the given type.
    pub fn conforms_to(&self, kind: ColumnType) -> bool {
        match (self, kind) {
            (Value::Null, _) => true,
            (Value::Integer(_) | Value::Float(_), ColumnType::Numeric) => true,
            (Value::String(_), ColumnType::Categorical) => true,
            (Value::Bool(_), ColumnType::Boolean) => true,
            _ => false,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Integer(_) | Value::Float(_) => 2,
            Value::String(_) => 3,
        }
    }
}

// -- Manual Eq/Ord so we can put Value in BTreeSet --

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        use Value::*;
        let (ra, rb) = (self.rank(), other.rank());
        if ra != rb {
            return ra.cmp(&rb);
        }
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (String(a), String(b)) => a.cmp(b),
            (Float(a), Float(b)) => cmp_floats(*a, *b),
            (Integer(a), Float(b)) => cmp_int_float(*a, *b),
            (Float(a), Integer(b)) => cmp_int_float(*b, *a).reverse(),
            _ => Ordering::Equal,
        }
    }
}

/// `total_cmp` with `-0.0 == 0.0`, so both zeros equal `Integer(0)`.
fn cmp_floats(a: f64, b: f64) -> Ordering {
    if a == b {
        Ordering::Equal
    } else {
        a.total_cmp(&b)
    }
}

/// Exact comparison of an integer with a float, without rounding the integer.
///
/// NaN sorts like `total_cmp` places it: negative NaN below every number,
/// positive NaN above.
fn cmp_int_float(i: i64, f: f64) -> Ordering {
    if f.is_nan() {
        return if f.is_sign_negative() {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    let t = f.trunc();
    if t >= i64::MAX as f64 {
        // i64::MAX as f64 rounds up to 2^63, beyond every i64
        return Ordering::Less;
    }
    if t < i64::MIN as f64 {
        return Ordering::Greater;
    }
    // `t` is integral and within range, so the cast is exact
    match i.cmp(&(t as i64)) {
        Ordering::Equal => 0.0f64.total_cmp(&(f - t)),
        other => other,
    }
}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Value::String(s) => s.hash(state),
            // equal numbers have equal f64 images; `+ 0.0` folds -0.0 into 0.0
            Value::Integer(_) | Value::Float(_) => {
                (self.as_f64().unwrap_or_default() + 0.0).to_bits().hash(state)
            }
            Value::Bool(b) => b.hash(state),
            Value::Null => {}
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Null => write!(f, "<null>"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Semantic type of a column, fixed at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Numeric,
    Categorical,
    Boolean,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Numeric => "numeric",
            ColumnType::Categorical => "categorical",
            ColumnType::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: String,
    pub kind: ColumnType,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: ColumnType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Ordered column list shared by every record of a dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    /// Build a schema; duplicate column names are rejected.
    pub fn new(fields: Vec<Field>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(PipelineError::SchemaMismatch {
                    message: format!("duplicate column '{}'", field.name),
                });
            }
        }
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Like [`Schema::index_of`] but fails with `MissingColumn`.
    pub fn require(&self, name: &str) -> Result<(usize, ColumnType)> {
        self.index_of(name)
            .map(|i| (i, self.fields[i].kind))
            .ok_or_else(|| PipelineError::MissingColumn {
                column: name.to_string(),
            })
    }

    pub fn kind_of(&self, name: &str) -> Option<ColumnType> {
        self.index_of(name).map(|i| self.fields[i].kind)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Names of numeric columns, in schema order.
    pub fn numeric_columns(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.kind == ColumnType::Numeric)
            .map(|f| f.name.as_str())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Record – one row
// ---------------------------------------------------------------------------

/// One row of the dataset: one value per schema field, in schema order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record {
    values: Vec<Value>,
}

impl Record {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Value at a column index; out-of-range indices read as null.
    pub fn get(&self, idx: usize) -> &Value {
        self.values.get(idx).unwrap_or(&Value::Null)
    }
}

// ---------------------------------------------------------------------------
// Dataset – the complete loaded table
// ---------------------------------------------------------------------------

/// The full parsed dataset with pre-computed unique values per column.
///
/// Immutable once built: transformations return a new `Dataset`.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    schema: Schema,
    records: Vec<Record>,
    unique_values: BTreeMap<String, BTreeSet<Value>>,
}

impl Dataset {
    /// Validate records against the schema and build column indices.
    pub fn new(schema: Schema, records: Vec<Record>) -> Result<Self> {
        for (row, record) in records.iter().enumerate() {
            if record.values.len() != schema.len() {
                return Err(PipelineError::SchemaMismatch {
                    message: format!(
                        "row {row} has {} values but schema has {} columns",
                        record.values.len(),
                        schema.len()
                    ),
                });
            }
            for (field, value) in schema.fields.iter().zip(&record.values) {
                if !value.conforms_to(field.kind) {
                    return Err(PipelineError::SchemaMismatch {
                        message: format!(
                            "row {row}: value '{value}' does not fit {} column '{}'",
                            field.kind, field.name
                        ),
                    });
                }
            }
        }

        let mut unique_values: BTreeMap<String, BTreeSet<Value>> = schema
            .fields
            .iter()
            .map(|f| (f.name.clone(), BTreeSet::new()))
            .collect();
        for record in &records {
            for (field, value) in schema.fields.iter().zip(&record.values) {
                if let Some(set) = unique_values.get_mut(&field.name) {
                    set.insert(value.clone());
                }
            }
        }

        Ok(Dataset {
            schema,
            records,
            unique_values,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn record(&self, row: usize) -> Option<&Record> {
        self.records.get(row)
    }

    /// Sorted distinct values observed in a column.
    pub fn unique_values(&self, column: &str) -> Option<&BTreeSet<Value>> {
        self.unique_values.get(column)
    }

    /// All values of a column, in row order.
    pub fn column(&self, column: &str) -> Result<Vec<&Value>> {
        let (idx, _) = self.schema.require(column)?;
        Ok(self.records.iter().map(|r| r.get(idx)).collect())
    }

    /// Return a new dataset with `column` added (or overwritten in place).
    pub fn with_column(&self, column: &str, kind: ColumnType, values: Vec<Value>) -> Result<Self> {
        if values.len() != self.records.len() {
            return Err(PipelineError::SchemaMismatch {
                message: format!(
                    "column '{column}' has {} values but dataset has {} rows",
                    values.len(),
                    self.records.len()
                ),
            });
        }

        let mut fields = self.schema.fields.clone();
        let existing = self.schema.index_of(column);
        match existing {
            Some(i) => fields[i].kind = kind,
            None => fields.push(Field::new(column, kind)),
        }

        let records = self
            .records
            .iter()
            .zip(values)
            .map(|(record, value)| {
                let mut row = record.values.clone();
                match existing {
                    Some(i) => row[i] = value,
                    None => row.push(value),
                }
                Record::new(row)
            })
            .collect();

        Dataset::new(Schema { fields }, records)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("school", ColumnType::Categorical),
            Field::new("age", ColumnType::Numeric),
        ])
        .unwrap()
    }

    #[test]
    fn integer_and_float_compare_numerically() {
        assert_eq!(Value::Integer(1), Value::Float(1.0));
        assert!(Value::Integer(2) > Value::Float(1.5));
        assert!(Value::Null < Value::Bool(false));
        assert!(Value::Float(100.0) < Value::from("a"));

        let set: BTreeSet<Value> = [Value::Integer(3), Value::Float(3.0)].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn large_integers_compare_exactly_against_floats() {
        let two_53 = 1i64 << 53;
        let a = Value::Integer(two_53);
        let b = Value::Integer(two_53 + 1);
        let f = Value::Float(two_53 as f64);

        assert_eq!(a, f);
        assert_ne!(b, f);
        assert!(f < b);
        assert!(Value::Integer(i64::MAX) < Value::Float(i64::MAX as f64));
        assert_eq!(Value::Integer(i64::MIN), Value::Float(i64::MIN as f64));
        assert!(Value::Integer(2) < Value::Float(2.5));
        assert!(Value::Integer(-2) > Value::Float(-2.5));
        assert!(Value::Integer(0) < Value::Float(f64::NAN));
        assert_eq!(Value::Float(-0.0), Value::Integer(0));
        assert_eq!(Value::Float(-0.0), Value::Float(0.0));

        let set: BTreeSet<Value> = [a, b, f].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn non_finite_floats_are_missing() {
        assert!(Value::Float(f64::NAN).is_missing());
        assert!(Value::Float(f64::INFINITY).is_missing());
        assert!(Value::Null.is_missing());
        assert!(!Value::Float(1.5).is_missing());
        assert_eq!(Value::Float(f64::NEG_INFINITY).as_finite(), None);
        assert_eq!(Value::Integer(3).as_finite(), Some(3.0));
    }

    #[test]
    fn value_deserializes_untagged() {
        let vals: Vec<Value> = serde_json::from_str(r#"[true, 15, 2.5, "GP", null]"#).unwrap();
        assert_eq!(
            vals,
            vec![
                Value::Bool(true),
                Value::Integer(15),
                Value::Float(2.5),
                Value::from("GP"),
                Value::Null
            ]
        );
    }

    #[test]
    fn dataset_rejects_nonconforming_value() {
        let err = Dataset::new(
            schema(),
            vec![Record::new(vec![Value::from("GP"), Value::from("old")])],
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::SchemaMismatch { .. }));
    }

    #[test]
    fn dataset_rejects_short_row() {
        let err = Dataset::new(schema(), vec![Record::new(vec![Value::from("GP")])]).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaMismatch { .. }));
    }

    #[test]
    fn schema_rejects_duplicate_names() {
        let err = Schema::new(vec![
            Field::new("age", ColumnType::Numeric),
            Field::new("age", ColumnType::Numeric),
        ])
        .unwrap_err();
        assert!(matches!(err, PipelineError::SchemaMismatch { .. }));
    }

    #[test]
    fn unique_values_include_nulls() {
        let ds = Dataset::new(
            schema(),
            vec![
                Record::new(vec![Value::from("MS"), Value::Integer(16)]),
                Record::new(vec![Value::from("GP"), Value::Null]),
                Record::new(vec![Value::from("GP"), Value::Integer(16)]),
            ],
        )
        .unwrap();
        let schools: Vec<_> = ds.unique_values("school").unwrap().iter().cloned().collect();
        assert_eq!(schools, vec![Value::from("GP"), Value::from("MS")]);
        assert!(ds.unique_values("age").unwrap().contains(&Value::Null));
    }

    #[test]
    fn with_column_adds_and_overwrites() {
        let ds = Dataset::new(
            schema(),
            vec![Record::new(vec![Value::from("GP"), Value::Integer(16)])],
        )
        .unwrap();

        let added = ds
            .with_column("score", ColumnType::Numeric, vec![Value::Float(9.5)])
            .unwrap();
        assert_eq!(added.schema().len(), 3);
        assert_eq!(added.records()[0].get(2), &Value::Float(9.5));
        // source untouched
        assert_eq!(ds.schema().len(), 2);

        let replaced = added
            .with_column("score", ColumnType::Numeric, vec![Value::Null])
            .unwrap();
        assert_eq!(replaced.schema().len(), 3);
        assert!(replaced.records()[0].get(2).is_null());

        assert!(ds
            .with_column("score", ColumnType::Numeric, vec![])
            .is_err());
    }
}
