//! Minimal query capability: filter, sort, skip and limit over JSON documents.
//!
//! A filter maps a (possibly dotted) field path to either a literal, which
//! means equality, or an operator object such as `{ "$gte": 3, "$lt": 9 }`.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::cmp::Ordering;

const OPERATORS: &[&str] = &["$eq", "$ne", "$gt", "$gte", "$lt", "$lte", "$in", "$nin", "$exists"];

/// Sort direction for one sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

impl SortDirection {
    fn code(self) -> i8 {
        match self {
            SortDirection::Ascending => 1,
            SortDirection::Descending => -1,
        }
    }
}

/// A query over JSON documents.
///
/// # Example
///
/// ```rust
/// use docsync_protocol::Query;
/// use serde_json::json;
///
/// let query = Query::new()
///     .equal_to("author", json!("Herbert"))
///     .greater_than("pages", json!(300))
///     .descending("pages")
///     .limit(10);
///
/// assert!(query.matches(&json!({ "author": "Herbert", "pages": 412 })));
/// assert!(!query.is_unbounded());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    #[serde(default)]
    filter: Map<String, Value>,
    #[serde(default)]
    sort: Vec<(String, SortDirection)>,
    #[serde(default)]
    skip: usize,
    #[serde(default)]
    limit: Option<usize>,
}

impl Query {
    /// Creates a query that matches every document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a query from a raw filter object.
    ///
    /// # Errors
    ///
    /// Fails if the filter is not an object or uses an unknown operator.
    pub fn from_filter(filter: Value) -> ProtocolResult<Self> {
        match filter {
            Value::Object(filter) => {
                let query = Self {
                    filter,
                    ..Self::default()
                };
                query.validate()?;
                Ok(query)
            }
            other => Err(ProtocolError::invalid_query(format!(
                "filter must be an object, got {other}"
            ))),
        }
    }

    /// Checks that every condition uses a known operator with a well-formed
    /// operand.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidQuery`] describing the first bad
    /// condition.
    pub fn validate(&self) -> ProtocolResult<()> {
        for (field, condition) in &self.filter {
            if field.is_empty() {
                return Err(ProtocolError::invalid_query("empty field name"));
            }
            let Value::Object(ops) = condition else {
                continue;
            };
            let dollar_keys = ops.keys().filter(|k| k.starts_with('$')).count();
            if dollar_keys == 0 {
                continue;
            }
            if dollar_keys != ops.len() {
                return Err(ProtocolError::invalid_query(format!(
                    "field {field:?} mixes operators and literal keys"
                )));
            }
            for (op, operand) in ops {
                if !OPERATORS.contains(&op.as_str()) {
                    return Err(ProtocolError::invalid_query(format!(
                        "unknown operator {op} on field {field:?}"
                    )));
                }
                match op.as_str() {
                    "$in" | "$nin" if !operand.is_array() => {
                        return Err(ProtocolError::invalid_query(format!(
                            "{op} on field {field:?} requires an array"
                        )));
                    }
                    "$exists" if !operand.is_boolean() => {
                        return Err(ProtocolError::invalid_query(format!(
                            "$exists on field {field:?} requires a boolean"
                        )));
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn condition(mut self, field: impl Into<String>, op: &str, operand: Value) -> Self {
        let field = field.into();
        match self.filter.remove(&field) {
            None if op == "$eq" => {
                self.filter.insert(field, operand);
            }
            None => {
                self.filter.insert(field, json!({ op: operand }));
            }
            Some(Value::Object(mut ops)) if is_operator_object(&ops) => {
                ops.insert(op.to_owned(), operand);
                self.filter.insert(field, Value::Object(ops));
            }
            Some(literal) => {
                self.filter
                    .insert(field, json!({ "$eq": literal, op: operand }));
            }
        }
        self
    }

    /// Field equals `value`.
    #[must_use]
    pub fn equal_to(self, field: impl Into<String>, value: Value) -> Self {
        self.condition(field, "$eq", value)
    }

    /// Field differs from `value` (or is absent).
    #[must_use]
    pub fn not_equal_to(self, field: impl Into<String>, value: Value) -> Self {
        self.condition(field, "$ne", value)
    }

    /// Field is greater than `value`.
    #[must_use]
    pub fn greater_than(self, field: impl Into<String>, value: Value) -> Self {
        self.condition(field, "$gt", value)
    }

    /// Field is greater than or equal to `value`.
    #[must_use]
    pub fn greater_than_or_equal_to(self, field: impl Into<String>, value: Value) -> Self {
        self.condition(field, "$gte", value)
    }

    /// Field is less than `value`.
    #[must_use]
    pub fn less_than(self, field: impl Into<String>, value: Value) -> Self {
        self.condition(field, "$lt", value)
    }

    /// Field is less than or equal to `value`.
    #[must_use]
    pub fn less_than_or_equal_to(self, field: impl Into<String>, value: Value) -> Self {
        self.condition(field, "$lte", value)
    }

    /// Field equals one of `values`.
    #[must_use]
    pub fn contained_in(self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.condition(field, "$in", Value::Array(values))
    }

    /// Field equals none of `values`.
    #[must_use]
    pub fn not_contained_in(self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.condition(field, "$nin", Value::Array(values))
    }

    /// Field is present (`true`) or absent (`false`).
    #[must_use]
    pub fn exists(self, field: impl Into<String>, present: bool) -> Self {
        self.condition(field, "$exists", Value::Bool(present))
    }

    /// Appends an ascending sort key.
    #[must_use]
    pub fn ascending(mut self, field: impl Into<String>) -> Self {
        self.sort.push((field.into(), SortDirection::Ascending));
        self
    }

    /// Appends a descending sort key.
    #[must_use]
    pub fn descending(mut self, field: impl Into<String>) -> Self {
        self.sort.push((field.into(), SortDirection::Descending));
        self
    }

    /// Skips the first `skip` matching documents.
    #[must_use]
    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    /// Returns at most `limit` documents.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns the number of documents skipped.
    pub fn skip_count(&self) -> usize {
        self.skip
    }

    /// Returns the result limit, `None` meaning unbounded.
    pub fn limit_count(&self) -> Option<usize> {
        self.limit
    }

    /// Returns the raw filter.
    pub fn filter(&self) -> &Map<String, Value> {
        &self.filter
    }

    /// True when the query has no skip and no limit, i.e. it describes a whole
    /// result set that can be resumed incrementally.
    pub fn is_unbounded(&self) -> bool {
        self.skip == 0 && self.limit.is_none()
    }

    /// Returns a copy of this query with skip and limit removed.
    #[must_use]
    pub fn without_paging(&self) -> Self {
        Self {
            skip: 0,
            limit: None,
            ..self.clone()
        }
    }

    /// Returns a copy of this query with the given window.
    #[must_use]
    pub fn with_window(&self, skip: usize, limit: usize) -> Self {
        Self {
            skip,
            limit: Some(limit),
            ..self.clone()
        }
    }

    /// Re-roots every filter field and sort key under `prefix`.
    ///
    /// `{ "title": "Dune" }` prefixed with `entity` becomes
    /// `{ "entity.title": "Dune" }`.
    #[must_use]
    pub fn prefixed(&self, prefix: &str) -> Self {
        Self {
            filter: self
                .filter
                .iter()
                .map(|(field, cond)| (format!("{prefix}.{field}"), cond.clone()))
                .collect(),
            sort: self
                .sort
                .iter()
                .map(|(field, dir)| (format!("{prefix}.{field}"), *dir))
                .collect(),
            skip: self.skip,
            limit: self.limit,
        }
    }

    /// Stable serialization of the filter and sort, excluding skip and limit.
    ///
    /// Two queries with the same key select the same documents in the same
    /// order.
    pub fn key(&self) -> String {
        let sort: Vec<Value> = self
            .sort
            .iter()
            .map(|(field, dir)| json!([field, dir.code()]))
            .collect();
        json!({ "filter": self.filter, "sort": sort }).to_string()
    }

    /// Returns true if `doc` satisfies every filter condition.
    pub fn matches(&self, doc: &Value) -> bool {
        self.filter
            .iter()
            .all(|(field, condition)| condition_matches(lookup(doc, field), condition))
    }

    /// Filters, sorts and windows `docs`.
    pub fn process(&self, docs: Vec<Value>) -> Vec<Value> {
        let mut matched: Vec<Value> = docs.into_iter().filter(|d| self.matches(d)).collect();

        if !self.sort.is_empty() {
            matched.sort_by(|a, b| {
                self.sort
                    .iter()
                    .map(|(field, dir)| {
                        let ord = total_order(lookup(a, field), lookup(b, field));
                        match dir {
                            SortDirection::Ascending => ord,
                            SortDirection::Descending => ord.reverse(),
                        }
                    })
                    .find(|ord| *ord != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }

        let windowed = matched.into_iter().skip(self.skip);
        match self.limit {
            Some(limit) => windowed.take(limit).collect(),
            None => windowed.collect(),
        }
    }
}

fn is_operator_object(ops: &Map<String, Value>) -> bool {
    !ops.is_empty() && ops.keys().all(|k| k.starts_with('$'))
}

/// Resolves a dotted path inside a document.
pub(crate) fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn condition_matches(actual: Option<&Value>, condition: &Value) -> bool {
    match condition {
        Value::Object(ops) if is_operator_object(ops) => ops
            .iter()
            .all(|(op, operand)| operator_matches(actual, op, operand)),
        literal => values_equal(actual, literal),
    }
}

fn operator_matches(actual: Option<&Value>, op: &str, operand: &Value) -> bool {
    match op {
        "$eq" => values_equal(actual, operand),
        "$ne" => !values_equal(actual, operand),
        "$gt" => partial_order(actual, operand) == Some(Ordering::Greater),
        "$gte" => matches!(
            partial_order(actual, operand),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        "$lt" => partial_order(actual, operand) == Some(Ordering::Less),
        "$lte" => matches!(
            partial_order(actual, operand),
            Some(Ordering::Less | Ordering::Equal)
        ),
        "$in" => operand
            .as_array()
            .is_some_and(|values| values.iter().any(|v| values_equal(actual, v))),
        "$nin" => operand
            .as_array()
            .is_some_and(|values| !values.iter().any(|v| values_equal(actual, v))),
        "$exists" => operand.as_bool() == Some(actual.is_some()),
        _ => false,
    }
}

fn values_equal(actual: Option<&Value>, expected: &Value) -> bool {
    match (actual, expected) {
        (None, Value::Null) => true,
        (None, _) => false,
        (Some(Value::Number(a)), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Some(a), b) => a == b,
    }
}

fn partial_order(actual: Option<&Value>, operand: &Value) -> Option<Ordering> {
    match (actual?, operand) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Object(_)) => 5,
    }
}

/// Orders any two values: missing and null first, then by type, then by value.
pub(crate) fn total_order(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    type_rank(a).cmp(&type_rank(b)).then_with(|| match (a, b) {
        (Some(x), Some(y)) => partial_order(Some(x), y)
            .unwrap_or_else(|| x.to_string().cmp(&y.to_string())),
        _ => Ordering::Equal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn books() -> Vec<Value> {
        vec![
            json!({ "_id": "1", "title": "Dune", "pages": 412, "meta": { "lang": "en" } }),
            json!({ "_id": "2", "title": "Emma", "pages": 320, "meta": { "lang": "en" } }),
            json!({ "_id": "3", "title": "Faust", "pages": 158, "meta": { "lang": "de" } }),
            json!({ "_id": "4", "title": "Ulysses" }),
        ]
    }

    fn ids(docs: &[Value]) -> Vec<&str> {
        docs.iter().map(|d| d["_id"].as_str().unwrap()).collect()
    }

    #[test]
    fn empty_query_matches_everything() {
        let result = Query::new().process(books());
        assert_eq!(result.len(), 4);
    }

    #[test]
    fn equality_and_dotted_paths() {
        let query = Query::new().equal_to("meta.lang", json!("en"));
        assert_eq!(ids(&query.process(books())), vec!["1", "2"]);
    }

    #[test]
    fn range_operators_combine_on_one_field() {
        let query = Query::new()
            .greater_than_or_equal_to("pages", json!(158))
            .less_than("pages", json!(400));
        assert_eq!(ids(&query.process(books())), vec!["2", "3"]);
    }

    #[test]
    fn equality_then_operator_keeps_both_conditions() {
        let query = Query::new()
            .equal_to("pages", json!(320))
            .less_than("pages", json!(400));
        assert_eq!(
            query.filter()["pages"],
            json!({ "$eq": 320, "$lt": 400 })
        );
        assert_eq!(ids(&query.process(books())), vec!["2"]);
    }

    #[test]
    fn set_membership_and_existence() {
        let query = Query::new().contained_in("_id", vec![json!("1"), json!("4")]);
        assert_eq!(ids(&query.process(books())), vec!["1", "4"]);

        let query = Query::new().exists("pages", false);
        assert_eq!(ids(&query.process(books())), vec!["4"]);

        let query = Query::new().not_equal_to("meta.lang", json!("en"));
        assert_eq!(ids(&query.process(books())), vec!["3", "4"]);
    }

    #[test]
    fn sort_skip_limit() {
        let query = Query::new().descending("pages").skip(1).limit(2);
        assert_eq!(ids(&query.process(books())), vec!["2", "3"]);

        let query = Query::new().ascending("pages");
        assert_eq!(ids(&query.process(books())), vec!["4", "3", "2", "1"]);
    }

    #[test]
    fn key_ignores_paging_but_not_sort() {
        let base = Query::new().equal_to("a", json!(1));
        assert_eq!(base.key(), base.clone().skip(5).limit(10).key());
        assert_ne!(base.key(), base.clone().ascending("a").key());
    }

    #[test]
    fn key_is_stable_across_insertion_order() {
        let a = Query::new()
            .equal_to("x", json!(1))
            .equal_to("y", json!(2));
        let b = Query::new()
            .equal_to("y", json!(2))
            .equal_to("x", json!(1));
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn unbounded_detection() {
        assert!(Query::new().is_unbounded());
        assert!(!Query::new().skip(5).is_unbounded());
        assert!(!Query::new().limit(10).is_unbounded());
        assert!(Query::new().skip(5).limit(10).without_paging().is_unbounded());
    }

    #[test]
    fn prefixed_reroots_fields() {
        let query = Query::new().equal_to("title", json!("Dune")).prefixed("entity");
        assert!(query.matches(&json!({ "entity": { "title": "Dune" } })));
        assert!(!query.matches(&json!({ "title": "Dune" })));
    }

    #[test]
    fn from_filter_validates_operators() {
        assert!(Query::from_filter(json!({ "a": { "$gt": 1 } })).is_ok());
        assert!(Query::from_filter(json!({ "a": { "$regex": "x" } })).is_err());
        assert!(Query::from_filter(json!({ "a": { "$in": 3 } })).is_err());
        assert!(Query::from_filter(json!({ "a": { "$gt": 1, "b": 2 } })).is_err());
        assert!(Query::from_filter(json!([1, 2])).is_err());
    }

    #[test]
    fn literal_objects_compare_by_value() {
        let query = Query::from_filter(json!({ "meta": { "lang": "de" } })).unwrap();
        assert_eq!(ids(&query.process(books())), vec!["3"]);
    }
}
