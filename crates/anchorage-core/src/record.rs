//! Append-only gateway records
//!
//! A [`Record`] is an immutable JSON object carrying a string `record_id`.
//! Every constructor validates the object, so a `Record` in hand is always
//! canonically encodable.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::errors::{AnchorageError, Result};

/// Field holding the record identifier
pub const RECORD_ID_FIELD: &str = "record_id";

/// Immutable record: a field mapping with a required string `record_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    /// Validate a JSON value as a record
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Self::from_map(fields),
            other => Err(AnchorageError::invalid_record(format!(
                "record must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Validate a field map as a record
    pub fn from_map(fields: Map<String, Value>) -> Result<Self> {
        match fields.get(RECORD_ID_FIELD) {
            Some(Value::String(id)) if !id.is_empty() => Ok(Self { fields }),
            Some(Value::String(_)) => Err(AnchorageError::invalid_record("record_id is empty")),
            Some(other) => Err(AnchorageError::invalid_record(format!(
                "record_id must be a string, got {}",
                json_kind(other)
            ))),
            None => Err(AnchorageError::invalid_record("missing record_id")),
        }
    }

    /// Parse a single record from JSON text
    pub fn parse_json(input: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(input)
            .map_err(|e| AnchorageError::invalid_record(format!("malformed JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Parse a JSON array of records, failing on the first invalid entry
    pub fn parse_json_array(input: &str) -> Result<Vec<Self>> {
        let value: Value = serde_json::from_str(input)
            .map_err(|e| AnchorageError::invalid_record(format!("malformed JSON: {e}")))?;
        let Value::Array(items) = value else {
            return Err(AnchorageError::invalid_record(
                "record input must be a JSON array",
            ));
        };
        items
            .into_iter()
            .enumerate()
            .map(|(position, item)| {
                Self::from_value(item).map_err(|e| {
                    AnchorageError::invalid_record(format!("record at position {position}: {e}"))
                })
            })
            .collect()
    }

    /// Start building a record with the given id
    pub fn builder(record_id: impl Into<String>) -> RecordBuilder {
        RecordBuilder::new(record_id)
    }

    /// The record identifier
    pub fn record_id(&self) -> &str {
        // Invariant established by `from_map`.
        self.fields
            .get(RECORD_ID_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Look up a field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// All fields, including `record_id`
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Convert into a JSON value
    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

impl TryFrom<Value> for Record {
    type Error = AnchorageError;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(value)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Object(record.fields)
    }
}

/// Incremental record construction with encodability checks per field
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    fields: Map<String, Value>,
}

impl RecordBuilder {
    fn new(record_id: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert(RECORD_ID_FIELD.to_string(), Value::String(record_id.into()));
        Self { fields }
    }

    /// Add a field from any serializable value
    pub fn field(mut self, key: impl Into<String>, value: impl Serialize) -> Result<Self> {
        let key = key.into();
        let value = serde_json::to_value(value).map_err(|e| {
            AnchorageError::invalid_record(format!("field {key:?} not encodable: {e}"))
        })?;
        self.insert(key, value)?;
        Ok(self)
    }

    /// Add a floating point field; NaN and infinities are rejected
    pub fn float(mut self, key: impl Into<String>, value: f64) -> Result<Self> {
        let key = key.into();
        let number = Number::from_f64(value).ok_or_else(|| {
            AnchorageError::invalid_record(format!("field {key:?} is non-finite ({value})"))
        })?;
        self.insert(key, Value::Number(number))?;
        Ok(self)
    }

    fn insert(&mut self, key: String, value: Value) -> Result<()> {
        if key == RECORD_ID_FIELD {
            return Err(AnchorageError::invalid_record(
                "record_id is set by the builder",
            ));
        }
        self.fields.insert(key, value);
        Ok(())
    }

    /// Finish the record
    pub fn build(self) -> Result<Record> {
        Record::from_map(self.fields)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn test_builder_produces_record() {
        let record = Record::builder("devA:0001")
            .field("temp_c", 21)
            .unwrap()
            .float("humidity", 0.45)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(record.record_id(), "devA:0001");
        assert_eq!(record.get("temp_c"), Some(&json!(21)));
    }

    #[test]
    fn test_non_finite_float_rejected() {
        let err = Record::builder("devA:0002")
            .float("reading", f64::NAN)
            .unwrap_err();
        assert_matches!(err, AnchorageError::InvalidRecord { .. });
        assert!(Record::builder("x").float("r", f64::INFINITY).is_err());
    }

    #[test]
    fn test_missing_or_bad_record_id() {
        assert_matches!(
            Record::from_value(json!({"value": 1})),
            Err(AnchorageError::InvalidRecord { .. })
        );
        assert!(Record::from_value(json!({"record_id": 5})).is_err());
        assert!(Record::from_value(json!({"record_id": ""})).is_err());
        assert!(Record::from_value(json!(["record_id"])).is_err());
    }

    #[test]
    fn test_parse_array_reports_position() {
        let err = Record::parse_json_array(r#"[{"record_id":"a"},{"id":"b"}]"#).unwrap_err();
        assert!(err.to_string().contains("position 1"));
        let records = Record::parse_json_array(r#"[{"record_id":"a"},{"record_id":"b"}]"#).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_serde_validates_on_deserialize() {
        let record: Record = serde_json::from_str(r#"{"record_id":"a","v":true}"#).unwrap();
        assert_eq!(record.record_id(), "a");
        assert!(serde_json::from_str::<Record>(r#"{"v":true}"#).is_err());
        assert_eq!(serde_json::to_value(&record).unwrap(), json!({"record_id":"a","v":true}));
    }

    #[test]
    fn test_builder_refuses_record_id_override() {
        assert!(Record::builder("a").field("record_id", "b").is_err());
    }
}
