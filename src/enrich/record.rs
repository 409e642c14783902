use crate::config::{FieldEntry, FieldKind};
use crate::enrich::EnrichError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A structured enrichment result
///
/// Keys keep the order the backend produced them in. Values are plain JSON: strings,
/// numbers, booleans, lists, nested objects, or null for unknown fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnrichedRecord {
    fields: Map<String, Value>,
}

impl EnrichedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(key.into(), value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Value> {
        self.fields.values_mut()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

impl TryFrom<Value> for EnrichedRecord {
    type Error = EnrichError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(EnrichError::MalformedResponse(format!(
                "expected a JSON object, got {}",
                value_kind(&other)
            ))),
        }
    }
}

/// Declared shape of an enrichment result
#[derive(Debug, Clone, Default)]
pub struct ResultSchema {
    fields: Vec<FieldEntry>,
}

impl ResultSchema {
    pub fn new(fields: Vec<FieldEntry>) -> Self {
        Self { fields }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Checks that every declared field is present with the declared kind
    ///
    /// Null is accepted for any field. Undeclared extra fields are kept.
    pub fn validate(&self, record: &EnrichedRecord) -> Result<(), EnrichError> {
        for field in &self.fields {
            let value = record
                .get(&field.name)
                .ok_or_else(|| EnrichError::Schema(format!("missing field '{}'", field.name)))?;

            if !value.is_null() && !matches_kind(value, field.kind) {
                return Err(EnrichError::Schema(format!(
                    "field '{}' should be {:?}, got {}",
                    field.name,
                    field.kind,
                    value_kind(value)
                )));
            }
        }
        Ok(())
    }
}

fn matches_kind(value: &Value, kind: FieldKind) -> bool {
    match kind {
        FieldKind::String => value.is_string(),
        FieldKind::Integer => value.is_i64() || value.is_u64(),
        FieldKind::Number => value.is_number(),
        FieldKind::Boolean => value.is_boolean(),
        FieldKind::List => value.is_array(),
        FieldKind::Object => value.is_object(),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
