//! Cache keys.
//!
//! A query key is an ordered tuple of JSON segments identifying a logical
//! request, e.g. `["orders", {"status": "pending"}]`. Two keys are equal
//! iff their segments are structurally equal, so the same filter object
//! always lands on the same cache entry regardless of field order.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;
use serde_json::Value;

/// A structural cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryKey {
    segments: Vec<Value>,
}

impl QueryKey {
    /// A single-segment key.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            segments: vec![Value::String(name.into())],
        }
    }

    /// A key from string segments.
    pub fn of<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: parts.into_iter().map(|s| Value::String(s.into())).collect(),
        }
    }

    /// A key from raw JSON segments.
    pub fn from_segments(segments: Vec<Value>) -> Self {
        Self { segments }
    }

    /// Append a string segment.
    pub fn with(mut self, segment: impl Into<String>) -> Self {
        self.segments.push(Value::String(segment.into()));
        self
    }

    /// Append a raw JSON segment.
    pub fn with_value(mut self, segment: Value) -> Self {
        self.segments.push(segment);
        self
    }

    /// Append a serializable parameter object as a segment.
    pub fn with_param<T: Serialize>(mut self, param: &T) -> serde_json::Result<Self> {
        self.segments.push(serde_json::to_value(param)?);
        Ok(self)
    }

    /// The key's segments.
    pub fn segments(&self) -> &[Value] {
        &self.segments
    }

    /// Whether this key begins with `prefix`, segment-wise.
    ///
    /// Every key is a prefix of itself.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }

    /// Canonical rendering with lexicographically ordered object keys.
    ///
    /// Structurally equal keys render identically, which makes hashing
    /// consistent with equality.
    pub fn canonical(&self) -> String {
        let mut out = String::from("[");
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            canonicalize(segment, &mut out);
        }
        out.push(']');
        out
    }
}

fn canonicalize(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => {
            // serde_json string rendering handles escaping.
            out.push_str(&Value::String(s.clone()).to_string());
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                canonicalize(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut names: Vec<&String> = map.keys().collect();
            names.sort();
            out.push('{');
            for (i, name) in names.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*name).clone()).to_string());
                out.push(':');
                canonicalize(&map[*name], out);
            }
            out.push('}');
        }
    }
}

impl Hash for QueryKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().hash(state);
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl From<&str> for QueryKey {
    fn from(name: &str) -> Self {
        QueryKey::new(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(key: &QueryKey) -> u64 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_structural_equality() {
        let a = QueryKey::new("orders").with_value(json!({"status": "pending"}));
        let b = QueryKey::new("orders").with_value(json!({"status": "pending"}));
        let c = QueryKey::new("orders").with_value(json!({"status": "approved"}));

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_object_key_order_is_irrelevant() {
        let a = QueryKey::new("orders").with_value(json!({"page": 1, "status": "pending"}));
        let b = QueryKey::new("orders").with_value(json!({"status": "pending", "page": 1}));

        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_eq!(a.canonical(), b.canonical());
    }

    #[test]
    fn test_prefix_matching() {
        let key = QueryKey::new("orders").with_value(json!({"status": "pending"}));

        assert!(key.starts_with(&QueryKey::new("orders")));
        assert!(key.starts_with(&key));
        assert!(!key.starts_with(&QueryKey::new("order")));
        assert!(!key.starts_with(&QueryKey::of(["orders", "extra"])));

        let longer = QueryKey::of(["notifications", "unread-count"]);
        assert!(longer.starts_with(&QueryKey::new("notifications")));
    }

    #[test]
    fn test_with_param() {
        #[derive(Serialize)]
        struct Filter {
            status: &'static str,
        }

        let key = QueryKey::new("orders")
            .with_param(&Filter { status: "pending" })
            .unwrap();
        assert_eq!(
            key,
            QueryKey::new("orders").with_value(json!({"status": "pending"}))
        );
    }

    #[test]
    fn test_canonical_display() {
        let key = QueryKey::of(["notifications", "unread-count"]);
        assert_eq!(key.to_string(), r#"["notifications","unread-count"]"#);
    }
}
