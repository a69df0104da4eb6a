//! Storage-neutral query predicates.
//!
//! The policy compiler emits a [`Predicate`] and the store gateway renders
//! it into engine query syntax. Nothing outside the db crate ever builds
//! engine-specific filters by hand.
//!
//! A predicate carries three buckets: plain comparisons that AND together,
//! an OR-group whose members combine disjunctively, and an AND-group whose
//! members combine conjunctively. Both groups AND with the plain bucket.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparison operators supported by resource filters and predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    In,
    NotIn,
    /// Field presence check; the comparison value is a boolean.
    Exists,
    /// Case-insensitive substring match on string fields.
    Matches,
}

/// A single field comparison with an already-resolved value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// Dot-notation path into the target document.
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Comparison {
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Evaluate this comparison against a JSON document.
    pub fn matches(&self, doc: &Value) -> bool {
        let found = lookup_path(doc, &self.field);
        match self.op {
            FilterOp::Equal => found.map(|v| value_eq(v, &self.value)).unwrap_or(false),
            FilterOp::NotEqual => !found.map(|v| value_eq(v, &self.value)).unwrap_or(false),
            FilterOp::GreaterThan => compare_order(found, &self.value)
                .map(std::cmp::Ordering::is_gt)
                .unwrap_or(false),
            FilterOp::GreaterThanOrEqual => compare_order(found, &self.value)
                .map(std::cmp::Ordering::is_ge)
                .unwrap_or(false),
            FilterOp::LessThan => compare_order(found, &self.value)
                .map(std::cmp::Ordering::is_lt)
                .unwrap_or(false),
            FilterOp::LessThanOrEqual => compare_order(found, &self.value)
                .map(std::cmp::Ordering::is_le)
                .unwrap_or(false),
            FilterOp::In => found.map(|v| value_in(v, &self.value)).unwrap_or(false),
            FilterOp::NotIn => !found.map(|v| value_in(v, &self.value)).unwrap_or(false),
            FilterOp::Exists => {
                let present = matches!(found, Some(v) if !v.is_null());
                self.value.as_bool().map(|b| b == present).unwrap_or(false)
            }
            FilterOp::Matches => match (found.and_then(Value::as_str), self.value.as_str()) {
                (Some(haystack), Some(needle)) => haystack
                    .to_ascii_lowercase()
                    .contains(&needle.to_ascii_lowercase()),
                _ => false,
            },
        }
    }
}

/// A compiled, storage-neutral boolean filter over one collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    /// Comparisons that must all hold.
    pub all: Vec<Comparison>,
    /// OR-group: at least one must hold (ignored when empty).
    pub any_of: Vec<Comparison>,
    /// AND-group: all must hold.
    pub all_of: Vec<Comparison>,
}

impl Predicate {
    /// A predicate with no constraints. Matches every document — callers
    /// must never conflate this with "no permission".
    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn is_unrestricted(&self) -> bool {
        self.all.is_empty() && self.any_of.is_empty() && self.all_of.is_empty()
    }

    pub fn and(mut self, cmp: Comparison) -> Self {
        self.all.push(cmp);
        self
    }

    /// Evaluate the whole predicate against a JSON document.
    pub fn matches(&self, doc: &Value) -> bool {
        self.all.iter().all(|c| c.matches(doc))
            && (self.any_of.is_empty() || self.any_of.iter().any(|c| c.matches(doc)))
            && self.all_of.iter().all(|c| c.matches(doc))
    }
}

/// Walk a dot-notation path through a JSON document. Every intermediate
/// segment must be an object; the final value may be anything, arrays
/// included.
pub fn lookup_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for segment in path.split('.') {
        match current {
            Value::Object(map) => current = map.get(segment)?,
            _ => return None,
        }
    }
    Some(current)
}

/// Document-store equality: scalar equality, or membership when the
/// document-side value is an array of scalars.
pub fn value_eq(found: &Value, expected: &Value) -> bool {
    if found == expected {
        return true;
    }
    match found {
        Value::Array(items) if !expected.is_array() => items.iter().any(|i| i == expected),
        _ => false,
    }
}

/// `found IN expected` where `expected` is an array. When the document
/// value is itself an array, any overlapping element is a match.
pub fn value_in(found: &Value, expected: &Value) -> bool {
    let Value::Array(candidates) = expected else {
        return false;
    };
    match found {
        Value::Array(items) => items.iter().any(|i| candidates.contains(i)),
        other => candidates.contains(other),
    }
}

fn compare_order(found: Option<&Value>, expected: &Value) -> Option<std::cmp::Ordering> {
    let found = found?;
    match (found, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.as_str().cmp(b.as_str())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn equal_matches_scalar_and_array_membership() {
        let doc = json!({"public": true, "categories": ["a", "b"]});
        assert!(Comparison::new("public", FilterOp::Equal, true).matches(&doc));
        assert!(Comparison::new("categories", FilterOp::Equal, "a").matches(&doc));
        assert!(!Comparison::new("categories", FilterOp::Equal, "c").matches(&doc));
    }

    #[test]
    fn in_overlaps_arrays() {
        let doc = json!({"id": "l2", "categories": ["a", "b"]});
        assert!(Comparison::new("id", FilterOp::In, json!(["l1", "l2"])).matches(&doc));
        assert!(Comparison::new("categories", FilterOp::In, json!(["b", "z"])).matches(&doc));
        assert!(!Comparison::new("id", FilterOp::In, json!(["l9"])).matches(&doc));
    }

    #[test]
    fn exists_checks_presence_and_nullness() {
        let doc = json!({"thumbnail": "x", "credit": null});
        assert!(Comparison::new("thumbnail", FilterOp::Exists, true).matches(&doc));
        assert!(Comparison::new("credit", FilterOp::Exists, false).matches(&doc));
        assert!(Comparison::new("missing", FilterOp::Exists, false).matches(&doc));
    }

    #[test]
    fn nested_paths_traverse_objects() {
        let doc = json!({"edit_data": {"current_editor": "u1"}});
        assert!(
            Comparison::new("edit_data.current_editor", FilterOp::Equal, "u1").matches(&doc)
        );
    }

    #[test]
    fn or_group_is_disjunctive_and_ands_with_plain_bucket() {
        let pred = Predicate {
            all: vec![Comparison::new("kind", FilterOp::Equal, "lesson")],
            any_of: vec![
                Comparison::new("public", FilterOp::Equal, true),
                Comparison::new("id", FilterOp::In, json!(["l2"])),
            ],
            all_of: vec![],
        };

        assert!(pred.matches(&json!({"kind": "lesson", "public": true, "id": "l1"})));
        assert!(pred.matches(&json!({"kind": "lesson", "public": false, "id": "l2"})));
        assert!(!pred.matches(&json!({"kind": "lesson", "public": false, "id": "l1"})));
        assert!(!pred.matches(&json!({"kind": "other", "public": true, "id": "l2"})));
    }

    #[test]
    fn unrestricted_matches_everything() {
        assert!(Predicate::unrestricted().matches(&json!({"anything": 1})));
    }
}
