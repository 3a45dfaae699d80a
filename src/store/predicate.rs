use serde_json::Value;

use crate::store::query::ValueTester;

/// Matches values that belong to a fixed set captured at construction.
///
/// ```
/// use mango_store::store::{ArrayTester, Query, ValueTester};
/// use serde_json::json;
///
/// let tester = ArrayTester::new([1, 2, 3]);
/// assert!(tester.test(&json!(2)));
/// assert!(!tester.test(&json!(5)));
///
/// let _query = Query::new().where_test("zone", ArrayTester::new(["a", "b"]));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct ArrayTester {
    values: Vec<Value>,
}

impl ArrayTester {
    pub fn new<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

impl ValueTester for ArrayTester {
    fn test(&self, value: &Value) -> bool {
        self.values.iter().any(|candidate| candidate == value)
    }
}
