use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Unique key of a record within one collection.
///
/// Identities are either numeric (surrogate keys handed out by an
/// [`IdentityStore`](crate::store::IdentityStore) or by the server) or textual keys supplied
/// by callers. They serialize untagged so they round-trip through JSON records.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Identity {
    Number(i64),
    Text(String),
}

impl Identity {
    /// Reads an identity out of a JSON value. Only integers and strings qualify.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => number.as_i64().map(Identity::Number),
            Value::String(text) => Some(Identity::Text(text.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Identity::Number(number) => Value::from(*number),
            Identity::Text(text) => Value::String(text.clone()),
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            Identity::Number(number) => Some(*number),
            Identity::Text(_) => None,
        }
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Identity::Number(number) => write!(f, "{number}"),
            Identity::Text(text) => f.write_str(text),
        }
    }
}

impl From<i64> for Identity {
    fn from(value: i64) -> Self {
        Identity::Number(value)
    }
}

impl From<i32> for Identity {
    fn from(value: i32) -> Self {
        Identity::Number(i64::from(value))
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Identity::Text(value.to_string())
    }
}

impl From<String> for Identity {
    fn from(value: String) -> Self {
        Identity::Text(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_numbers_and_strings() {
        assert_eq!(Identity::from_value(&json!(7)), Some(Identity::Number(7)));
        assert_eq!(Identity::from_value(&json!("A")), Some(Identity::from("A")));
        assert_eq!(Identity::from_value(&json!(1.5)), None);
        assert_eq!(Identity::from_value(&json!(null)), None);
    }

    #[test]
    fn serializes_untagged() {
        assert_eq!(serde_json::to_value(Identity::from(3)).unwrap(), json!(3));
        let parsed: Identity = serde_json::from_value(json!("point-1")).unwrap();
        assert_eq!(parsed, Identity::from("point-1"));
        assert_eq!(parsed.to_string(), "point-1");
    }
}
