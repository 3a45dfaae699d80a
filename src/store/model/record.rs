use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::store::error::{invalid_argument, StoreResult};
use crate::store::model::Identity;

/// An opaque field bag. One of its fields, chosen by the owning store, holds the identity.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Builds a record from a JSON value, which must be an object.
    pub fn from_value(value: Value) -> StoreResult<Self> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(invalid_argument(format!(
                "Records must be JSON objects, got `{other}`"
            ))),
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    pub fn identity(&self, id_property: &str) -> Option<Identity> {
        self.fields.get(id_property).and_then(Identity::from_value)
    }

    pub fn set_identity(&mut self, id_property: &str, identity: &Identity) {
        self.fields
            .insert(id_property.to_string(), identity.to_value());
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Self::from_fields(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_non_objects() {
        let err = Record::from_value(json!([1, 2])).unwrap_err();
        assert_eq!(err.code_str(), "store/invalid-argument");
    }

    #[test]
    fn reads_and_writes_identity() {
        let mut record = Record::from_value(json!({"name": "boiler"})).unwrap();
        assert_eq!(record.identity("id"), None);

        record.set_identity("id", &Identity::from(4));
        assert_eq!(record.identity("id"), Some(Identity::Number(4)));
        assert_eq!(record.into_value(), json!({"name": "boiler", "id": 4}));
    }
}
