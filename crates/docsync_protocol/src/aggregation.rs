//! Minimal grouping aggregation over JSON documents.

use crate::query::{lookup, total_order, Query};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Number, Value};

/// How each group is reduced to a single value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reducer {
    /// Number of documents in the group.
    Count,
    /// Sum of a numeric field.
    Sum(String),
    /// Smallest numeric value of a field.
    Min(String),
    /// Largest numeric value of a field.
    Max(String),
    /// Mean of a numeric field.
    Average(String),
}

impl Reducer {
    /// Name of the result member written into each group.
    pub fn result_field(&self) -> &'static str {
        match self {
            Reducer::Count => "count",
            Reducer::Sum(_) => "sum",
            Reducer::Min(_) => "min",
            Reducer::Max(_) => "max",
            Reducer::Average(_) => "average",
        }
    }

    fn reduce(&self, docs: &[&Value]) -> Value {
        let field = match self {
            Reducer::Count => return json!(docs.len()),
            Reducer::Sum(f) | Reducer::Min(f) | Reducer::Max(f) | Reducer::Average(f) => f,
        };
        let numbers: Vec<f64> = docs
            .iter()
            .filter_map(|doc| lookup(doc, field).and_then(Value::as_f64))
            .collect();

        let result = match self {
            Reducer::Sum(_) => Some(numbers.iter().sum()),
            Reducer::Min(_) => numbers.iter().copied().reduce(f64::min),
            Reducer::Max(_) => numbers.iter().copied().reduce(f64::max),
            Reducer::Average(_) if numbers.is_empty() => None,
            Reducer::Average(_) => Some(numbers.iter().sum::<f64>() / numbers.len() as f64),
            Reducer::Count => None,
        };
        result
            .and_then(Number::from_f64)
            .map_or(Value::Null, Value::Number)
    }
}

/// Groups documents by a set of fields and reduces each group.
///
/// The result is an array with one object per group holding the group-by
/// fields and a member named after the reducer (`count`, `sum`, ...).
///
/// # Example
///
/// ```rust
/// use docsync_protocol::{Aggregation, Reducer};
/// use serde_json::json;
///
/// let agg = Aggregation::new(Reducer::Sum("pages".into())).group_by("author");
/// let docs = vec![
///     json!({ "author": "A", "pages": 10 }),
///     json!({ "author": "A", "pages": 5 }),
///     json!({ "author": "B", "pages": 7 }),
/// ];
/// assert_eq!(
///     agg.process(&docs),
///     json!([{ "author": "A", "sum": 15.0 }, { "author": "B", "sum": 7.0 }])
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    /// Fields that form the group key.
    pub group_by: Vec<String>,
    /// Reduction applied to each group.
    pub reducer: Reducer,
    /// Optional pre-filter.
    pub query: Option<Query>,
}

impl Aggregation {
    /// Creates an aggregation with no group-by fields (a single group).
    #[must_use]
    pub fn new(reducer: Reducer) -> Self {
        Self {
            group_by: Vec::new(),
            reducer,
            query: None,
        }
    }

    /// Counts documents per group.
    #[must_use]
    pub fn count() -> Self {
        Self::new(Reducer::Count)
    }

    /// Adds a group-by field.
    #[must_use]
    pub fn group_by(mut self, field: impl Into<String>) -> Self {
        self.group_by.push(field.into());
        self
    }

    /// Restricts the input documents.
    #[must_use]
    pub fn with_query(mut self, query: Query) -> Self {
        self.query = Some(query);
        self
    }

    /// Runs the aggregation over `docs`.
    pub fn process(&self, docs: &[Value]) -> Value {
        let mut groups: Vec<(Vec<Option<&Value>>, Vec<&Value>)> = Vec::new();

        for doc in docs {
            if self.query.as_ref().is_some_and(|q| !q.matches(doc)) {
                continue;
            }
            let key: Vec<Option<&Value>> =
                self.group_by.iter().map(|field| lookup(doc, field)).collect();
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(doc),
                None => groups.push((key, vec![doc])),
            }
        }

        groups.sort_by(|(a, _), (b, _)| {
            a.iter()
                .zip(b.iter())
                .map(|(x, y)| total_order(*x, *y))
                .find(|ord| ord.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Value::Array(
            groups
                .into_iter()
                .map(|(key, members)| {
                    let mut out = Map::new();
                    for (field, value) in self.group_by.iter().zip(key) {
                        out.insert(field.clone(), value.cloned().unwrap_or(Value::Null));
                    }
                    out.insert(
                        self.reducer.result_field().to_owned(),
                        self.reducer.reduce(&members),
                    );
                    Value::Object(out)
                })
                .collect(),
        )
    }
}
