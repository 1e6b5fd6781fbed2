//! Row serialization: turns a driver-agnostic tabular query result into ordered JSON documents.
//!
//! Layout:
//! - `Scalar`: one dynamically typed cell as the store handed it over
//! - `TabularResult`: ordered column names plus positionally aligned rows
//! - `Document`: one row keyed by column name, key order = column order
//!
//! Normalization: `Scalar::Bytes` becomes a JSON string (lossy UTF-8), everything else keeps its
//! JSON type. Drivers deliver several text-like column types as raw byte sequences, callers want
//! readable JSON rather than byte arrays.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Number, Value};
use thiserror::Error as ThisError;

/// One cell of a query result, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    /// Raw byte sequence as delivered by the driver (text columns on MySQL, BLOBs, ...).
    Bytes(Vec<u8>),
}

impl Scalar {
    /// Applies the byte-to-text rule and converts to a JSON value.
    ///
    /// Non-finite floats have no JSON representation and become `null`.
    pub fn normalize(&self) -> Value {
        match self {
            Scalar::Null => Value::Null,
            Scalar::Bool(b) => Value::Bool(*b),
            Scalar::Int(i) => Value::Number((*i).into()),
            Scalar::UInt(u) => Value::Number((*u).into()),
            Scalar::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
            Scalar::Text(s) => Value::String(s.clone()),
            Scalar::Bytes(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<Vec<u8>> for Scalar {
    fn from(value: Vec<u8>) -> Self {
        Scalar::Bytes(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(value: Option<T>) -> Self {
        value.map_or(Scalar::Null, Into::into)
    }
}

/// Column-and-row shaped output of one query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabularResult {
    columns: Option<Vec<String>>,
    rows: Vec<Vec<Scalar>>,
}

impl TabularResult {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns: Some(columns),
            rows: Vec::new(),
        }
    }

    /// A result whose column metadata the driver could not provide.
    pub fn without_columns(rows: Vec<Vec<Scalar>>) -> Self {
        Self {
            columns: None,
            rows,
        }
    }

    pub fn with_rows(mut self, rows: Vec<Vec<Scalar>>) -> Self {
        self.rows = rows;
        self
    }

    pub fn push_row(&mut self, row: Vec<Scalar>) {
        self.rows.push(row);
    }

    pub fn columns(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }

    pub fn rows(&self) -> &[Vec<Scalar>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum SerializationError {
    #[error("column metadata unavailable")]
    MissingColumns,

    #[error("row {row}: expected {expected} values, found {found}")]
    ArityMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("row {row}, column '{column}': {message}")]
    Decode {
        row: usize,
        column: String,
        message: String,
    },
}

/// One row as an ordered key-value document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    fields: Vec<(String, Value)>,
}

impl Document {
    /// Sets `key`, keeping the position of its first occurrence.
    fn set(&mut self, key: &str, value: Value) {
        if let Some(slot) = self.fields.iter_mut().find(|(k, _)| k == key) {
            slot.1 = value;
        } else {
            self.fields.push((key.to_string(), value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Zips column names with normalized row values, preserving row and column order.
///
/// All-or-nothing: any malformed row discards the whole result. Duplicate column names keep the
/// first position and the last value.
pub fn serialize(result: &TabularResult) -> Result<Vec<Document>, SerializationError> {
    let Some(columns) = result.columns() else {
        return Err(SerializationError::MissingColumns);
    };

    result
        .rows()
        .iter()
        .enumerate()
        .map(|(idx, row)| {
            if row.len() != columns.len() {
                return Err(SerializationError::ArityMismatch {
                    row: idx,
                    expected: columns.len(),
                    found: row.len(),
                });
            }
            let mut doc = Document {
                fields: Vec::with_capacity(columns.len()),
            };
            for (column, value) in columns.iter().zip(row) {
                doc.set(column, value.normalize());
            }
            Ok(doc)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric_columns() -> Vec<String> {
        ["room", "time", "metric", "action"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    #[test]
    fn single_metric_row_matches_expected_json() {
        let result = TabularResult::new(metric_columns()).with_rows(vec![vec![
            "201".into(),
            "2024-01-01T00:00:00Z".into(),
            "temp".into(),
            "read".into(),
        ]]);

        let docs = serialize(&result).unwrap();
        let json = serde_json::to_string(&docs).unwrap();
        assert_eq!(
            json,
            r#"[{"room":"201","time":"2024-01-01T00:00:00Z","metric":"temp","action":"read"}]"#
        );
    }

    #[test]
    fn byte_values_become_strings() {
        let result = TabularResult::new(vec!["name".into(), "raw".into()])
            .with_rows(vec![vec![b"lobby".to_vec().into(), Scalar::Bytes(vec![0xff, b'a'])]]);

        let docs = serialize(&result).unwrap();
        assert_eq!(docs[0].get("name"), Some(&Value::String("lobby".into())));
        assert_eq!(docs[0].get("raw"), Some(&Value::String("\u{fffd}a".into())));
    }

    #[test]
    fn non_byte_scalars_keep_their_json_type() {
        let result = TabularResult::new(vec![
            "id".into(),
            "big".into(),
            "ratio".into(),
            "flag".into(),
            "gone".into(),
            "nan".into(),
        ])
        .with_rows(vec![vec![
            Scalar::Int(-3),
            Scalar::UInt(u64::MAX),
            Scalar::Float(0.5),
            Scalar::Bool(true),
            Scalar::Null,
            Scalar::Float(f64::NAN),
        ]]);

        let docs = serialize(&result).unwrap();
        assert_eq!(
            serde_json::to_string(&docs[0]).unwrap(),
            r#"{"id":-3,"big":18446744073709551615,"ratio":0.5,"flag":true,"gone":null,"nan":null}"#
        );
    }

    #[test]
    fn key_order_follows_column_order_not_alphabet() {
        let result = TabularResult::new(vec!["z".into(), "a".into(), "m".into()])
            .with_rows(vec![vec![Scalar::Int(1), Scalar::Int(2), Scalar::Int(3)]]);

        let docs = serialize(&result).unwrap();
        assert_eq!(docs[0].keys().collect::<Vec<_>>(), vec!["z", "a", "m"]);
    }

    #[test]
    fn row_count_and_order_are_preserved() {
        let rows = (0..50).map(|i| vec![Scalar::Int(i)]).collect();
        let result = TabularResult::new(vec!["n".into()]).with_rows(rows);

        let docs = serialize(&result).unwrap();
        assert_eq!(docs.len(), result.row_count());
        for (i, doc) in docs.iter().enumerate() {
            assert_eq!(doc.get("n"), Some(&Value::from(i)));
        }
    }

    #[test]
    fn serializing_twice_is_identical() {
        let result = TabularResult::new(metric_columns()).with_rows(vec![
            vec!["1".into(), Scalar::Null, b"x".to_vec().into(), "a".into()],
            vec!["2".into(), "t".into(), "m".into(), Scalar::Bytes(Vec::new())],
        ]);

        assert_eq!(serialize(&result).unwrap(), serialize(&result).unwrap());
    }

    #[test]
    fn empty_result_yields_empty_list() {
        let result = TabularResult::new(metric_columns());
        assert!(serialize(&result).unwrap().is_empty());
    }

    #[test]
    fn arity_mismatch_discards_everything() {
        let result = TabularResult::new(metric_columns()).with_rows(vec![
            vec!["1".into(), "t".into(), "m".into(), "a".into()],
            vec!["2".into(), "t".into()],
        ]);

        assert_eq!(
            serialize(&result),
            Err(SerializationError::ArityMismatch {
                row: 1,
                expected: 4,
                found: 2
            })
        );
    }

    #[test]
    fn missing_columns_is_an_error() {
        let result = TabularResult::without_columns(vec![vec![Scalar::Int(1)]]);
        assert_eq!(serialize(&result), Err(SerializationError::MissingColumns));
    }

    #[test]
    fn duplicate_columns_keep_first_position_last_value() {
        let result = TabularResult::new(vec!["a".into(), "b".into(), "a".into()])
            .with_rows(vec![vec![Scalar::Int(1), Scalar::Int(2), Scalar::Int(3)]]);

        let docs = serialize(&result).unwrap();
        assert_eq!(serde_json::to_string(&docs[0]).unwrap(), r#"{"a":3,"b":2}"#);
    }
}
