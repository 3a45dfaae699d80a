use std::cmp::Ordering;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::store::model::Record;

/// A reusable test over a single field value, usable as a query matcher.
pub trait ValueTester: Send + Sync + 'static {
    fn test(&self, value: &Value) -> bool;
}

pub type RecordPredicate = Arc<dyn Fn(&Record) -> bool + Send + Sync + 'static>;

/// How a single field of a record is matched.
#[derive(Clone)]
pub enum FieldMatcher {
    Equals(Value),
    Test(Arc<dyn ValueTester>),
}

impl FieldMatcher {
    fn matches(&self, value: &Value) -> bool {
        match self {
            FieldMatcher::Equals(expected) => value == expected,
            FieldMatcher::Test(tester) => tester.test(value),
        }
    }
}

impl Debug for FieldMatcher {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldMatcher::Equals(value) => f.debug_tuple("Equals").field(value).finish(),
            FieldMatcher::Test(_) => f.write_str("Test(..)"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortField {
    field: String,
    direction: SortDirection,
}

impl SortField {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn direction(&self) -> SortDirection {
        self.direction
    }
}

/// Filter, sort and paging options for [`Collection::query`](crate::store::Collection::query).
///
/// An empty query matches every record. Field matchers and the optional predicate must all
/// accept a record for it to be returned. Without sort fields the result order is
/// unspecified; with sort fields, records comparing equal keep their original order.
#[derive(Clone, Default)]
pub struct Query {
    matchers: Vec<(String, FieldMatcher)>,
    predicate: Option<RecordPredicate>,
    sort: Vec<SortField>,
    start: usize,
    count: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_equals(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.matchers
            .push((field.into(), FieldMatcher::Equals(value.into())));
        self
    }

    pub fn where_test<T>(mut self, field: impl Into<String>, tester: T) -> Self
    where
        T: ValueTester,
    {
        self.matchers
            .push((field.into(), FieldMatcher::Test(Arc::new(tester))));
        self
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn sort_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort.push(SortField::new(field, direction));
        self
    }

    pub fn start(mut self, start: usize) -> Self {
        self.start = start;
        self
    }

    pub fn count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn sort_fields(&self) -> &[SortField] {
        &self.sort
    }

    pub fn matches(&self, record: &Record) -> bool {
        let fields_match = self.matchers.iter().all(|(field, matcher)| {
            let value = record.get(field).unwrap_or(&Value::Null);
            matcher.matches(value)
        });
        fields_match
            && self
                .predicate
                .as_ref()
                .map_or(true, |predicate| predicate(record))
    }

    /// Filters, sorts and pages `records`.
    pub fn apply(&self, records: impl IntoIterator<Item = Record>) -> QueryResults {
        let mut matched: Vec<Record> = records
            .into_iter()
            .filter(|record| self.matches(record))
            .collect();

        if !self.sort.is_empty() {
            matched.sort_by(|left, right| compare_records(left, right, &self.sort));
        }

        let total = matched.len();
        let page = matched
            .into_iter()
            .skip(self.start)
            .take(self.count.unwrap_or(usize::MAX))
            .collect();
        QueryResults::new(page, total)
    }

    /// The part of the query a server can evaluate: equality filters and sort order.
    /// Tester matchers, predicates and paging always run client side.
    pub fn to_params(&self) -> Value {
        let mut filter = Map::new();
        for (field, matcher) in &self.matchers {
            if let FieldMatcher::Equals(value) = matcher {
                filter.insert(field.clone(), value.clone());
            }
        }
        let sort: Vec<Value> = self
            .sort
            .iter()
            .map(|sort| {
                json!({
                    "attribute": sort.field(),
                    "descending": sort.direction() == SortDirection::Descending,
                })
            })
            .collect();
        json!({ "filter": filter, "sort": sort })
    }
}

impl Debug for Query {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("matchers", &self.matchers)
            .field("predicate", &self.predicate.as_ref().map(|_| ".."))
            .field("sort", &self.sort)
            .field("start", &self.start)
            .field("count", &self.count)
            .finish()
    }
}

/// The finite result sequence of a query.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryResults {
    records: Vec<Record>,
    total: usize,
}

impl QueryResults {
    pub fn new(records: Vec<Record>, total: usize) -> Self {
        Self { records, total }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of matches before `start`/`count` paging was applied.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn into_vec(self) -> Vec<Record> {
        self.records
    }
}

impl IntoIterator for QueryResults {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a QueryResults {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

fn compare_records(left: &Record, right: &Record, sort: &[SortField]) -> Ordering {
    for order in sort {
        let left_value = left.get(order.field()).unwrap_or(&Value::Null);
        let right_value = right.get(order.field()).unwrap_or(&Value::Null);

        let mut ordering = compare_values(left_value, right_value);
        if order.direction() == SortDirection::Descending {
            ordering = ordering.reverse();
        }
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => a
                .as_f64()
                .partial_cmp(&b.as_f64())
                .unwrap_or(Ordering::Equal),
        },
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => type_rank(left).cmp(&type_rank(right)),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) | Value::Object(_) => 4,
    }
}
