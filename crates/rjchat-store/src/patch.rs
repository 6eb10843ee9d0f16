//! Field-level document mutations.
//!
//! A [`Patch`] is an ordered list of operations, each addressed by a
//! [`FieldPath`].  Path segments are taken literally: a segment containing a
//! `.` names one field, it is never split.  That is how flat keys such as
//! `"B2A1.userInfo"` end up in a document.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::models::Document;

/// Path to a field inside a document, outermost segment first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }
}

impl From<&str> for FieldPath {
    fn from(segment: &str) -> Self {
        Self(vec![segment.to_string()])
    }
}

impl From<String> for FieldPath {
    fn from(segment: String) -> Self {
        Self(vec![segment])
    }
}

impl<const N: usize> From<[&str; N]> for FieldPath {
    fn from(segments: [&str; N]) -> Self {
        Self(segments.iter().map(|s| s.to_string()).collect())
    }
}

impl From<Vec<String>> for FieldPath {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}

/// One operation on one field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    /// Replace the field.
    Set(Value),
    /// Set the field to the store's clock at commit time.
    ServerTimestamp,
    /// Add to a numeric field, treating a missing or non-numeric field as 0.
    Increment(i64),
    /// Append each value not already present.
    ArrayUnion(Vec<Value>),
    /// Remove every element equal to one of the values.
    ArrayRemove(Vec<Value>),
    /// Remove the field.
    Delete,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    ops: Vec<(FieldPath, FieldOp)>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn op(mut self, path: impl Into<FieldPath>, op: FieldOp) -> Self {
        self.ops.push((path.into(), op));
        self
    }

    pub fn set(self, path: impl Into<FieldPath>, value: impl Into<Value>) -> Self {
        self.op(path, FieldOp::Set(value.into()))
    }

    /// Merge `value` at `path`: objects are flattened into one `Set` per leaf
    /// so that existing sibling fields survive.  Non-object values are set
    /// as-is.
    pub fn merge(mut self, path: impl Into<FieldPath>, value: Value) -> Self {
        flatten_into(&mut self.ops, path.into(), value);
        self
    }

    pub fn server_timestamp(self, path: impl Into<FieldPath>) -> Self {
        self.op(path, FieldOp::ServerTimestamp)
    }

    pub fn increment(self, path: impl Into<FieldPath>, by: i64) -> Self {
        self.op(path, FieldOp::Increment(by))
    }

    pub fn array_union(self, path: impl Into<FieldPath>, values: Vec<Value>) -> Self {
        self.op(path, FieldOp::ArrayUnion(values))
    }

    pub fn array_remove(self, path: impl Into<FieldPath>, values: Vec<Value>) -> Self {
        self.op(path, FieldOp::ArrayRemove(values))
    }

    pub fn delete(self, path: impl Into<FieldPath>) -> Self {
        self.op(path, FieldOp::Delete)
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[(FieldPath, FieldOp)] {
        &self.ops
    }

    /// Apply every operation in order.  `now` resolves server timestamps.
    pub fn apply(&self, doc: &mut Document, now: DateTime<Utc>) {
        for (path, op) in &self.ops {
            apply_op(doc, path.segments(), op, now);
        }
    }
}

fn flatten_into(ops: &mut Vec<(FieldPath, FieldOp)>, path: FieldPath, value: Value) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                flatten_into(ops, path.child(key), child);
            }
        }
        other => ops.push((path, FieldOp::Set(other))),
    }
}

/// Encode a timestamp the way every document field stores one.
pub fn timestamp_value(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339_opts(SecondsFormat::Micros, true))
}

fn apply_op(doc: &mut Document, path: &[String], op: &FieldOp, now: DateTime<Utc>) {
    let Some((leaf, parents)) = path.split_last() else {
        return;
    };

    if matches!(op, FieldOp::Delete) {
        if let Some(parent) = existing_parent(doc, parents) {
            parent.remove(leaf);
        }
        return;
    }

    let parent = parent_mut(doc, parents);
    let current = parent.remove(leaf);
    let next = match op {
        FieldOp::Set(value) => value.clone(),
        FieldOp::ServerTimestamp => timestamp_value(now),
        FieldOp::Increment(by) => {
            let base = current.as_ref().and_then(Value::as_i64).unwrap_or(0);
            Value::from(base.saturating_add(*by))
        }
        FieldOp::ArrayUnion(values) => {
            let mut items = match current {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            };
            for v in values {
                if !items.contains(v) {
                    items.push(v.clone());
                }
            }
            Value::Array(items)
        }
        FieldOp::ArrayRemove(values) => {
            let mut items = match current {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            };
            items.retain(|item| !values.contains(item));
            Value::Array(items)
        }
        FieldOp::Delete => unreachable!("handled above"),
    };
    parent.insert(leaf.clone(), next);
}

/// Walk to the parent map, creating (or replacing non-object values with)
/// empty objects on the way.
fn parent_mut<'a>(doc: &'a mut Document, parents: &[String]) -> &'a mut Map<String, Value> {
    let mut cursor = doc;
    for segment in parents {
        let slot = cursor
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        cursor = match slot {
            Value::Object(map) => map,
            _ => unreachable!("slot was just made an object"),
        };
    }
    cursor
}

fn existing_parent<'a>(doc: &'a mut Document, parents: &[String]) -> Option<&'a mut Map<String, Value>> {
    let mut cursor = doc;
    for segment in parents {
        cursor = cursor.get_mut(segment)?.as_object_mut()?;
    }
    Some(cursor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn apply(doc: Value, patch: Patch) -> Value {
        let mut doc = doc.as_object().cloned().unwrap();
        patch.apply(&mut doc, Utc::now());
        Value::Object(doc)
    }

    #[test]
    fn dotted_segment_stays_literal() {
        let out = apply(json!({}), Patch::new().set("B2A1.date", 1));
        assert_eq!(out, json!({"B2A1.date": 1}));

        let out = apply(json!({}), Patch::new().set(["B2A1", "date"], 1));
        assert_eq!(out, json!({"B2A1": {"date": 1}}));
    }

    #[test]
    fn merge_keeps_siblings() {
        let out = apply(
            json!({"g": {"userInfo": {"uid": "g", "isGroup": true, "displayName": "Old"}, "unreadCount": 2}}),
            Patch::new().merge(["g", "userInfo"], json!({"displayName": "New", "photoURL": "p"})),
        );
        assert_eq!(
            out,
            json!({"g": {"userInfo": {"uid": "g", "isGroup": true, "displayName": "New", "photoURL": "p"}, "unreadCount": 2}})
        );
    }

    #[test]
    fn increment_from_missing_and_existing() {
        let out = apply(json!({}), Patch::new().increment(["c", "unreadCount"], 1));
        assert_eq!(out, json!({"c": {"unreadCount": 1}}));
        let out = apply(out, Patch::new().increment(["c", "unreadCount"], 1));
        assert_eq!(out, json!({"c": {"unreadCount": 2}}));
    }

    #[test]
    fn array_union_and_remove() {
        let out = apply(
            json!({"participants": ["a", "b"]}),
            Patch::new()
                .array_union("participants", vec![json!("b"), json!("c")])
                .array_remove("participants", vec![json!("a")]),
        );
        assert_eq!(out, json!({"participants": ["b", "c"]}));
    }

    #[test]
    fn delete_nested_and_missing() {
        let out = apply(
            json!({"g": {"x": 1}, "h": {"y": 2}}),
            Patch::new().delete("g").delete(["nope", "deeper"]),
        );
        assert_eq!(out, json!({"h": {"y": 2}}));
    }

    #[test]
    fn server_timestamp_resolves_to_rfc3339() {
        let out = apply(json!({}), Patch::new().server_timestamp("date"));
        let s = out["date"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(s).is_ok());
    }
}
