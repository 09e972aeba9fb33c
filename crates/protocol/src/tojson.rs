//! JSON text in the exact shape Jinja's `tojson` filter produces.
//!
//! Keys are sorted, separators are `", "` and `": "`, non-ASCII text is
//! kept as-is, and `<`, `>`, `&`, `'` are escaped to `\u003c`, `\u003e`,
//! `\u0026`, `\u0027`. Model checkpoints were trained on this exact
//! layout, so it must not drift.

use agentrl_core::to_python_json;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Serialize a value like Jinja's `tojson`.
pub fn to_json(value: &Value) -> String {
    to_python_json(&SortedKeys(value))
        .unwrap_or_default()
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
        .replace('\'', "\\u0027")
}

/// Serializes objects with keys in sorted order, whatever map
/// implementation `serde_json` was built with.
struct SortedKeys<'a>(&'a Value);

impl Serialize for SortedKeys<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Array(items) => serializer.collect_seq(items.iter().map(SortedKeys)),
            Value::Object(map) => {
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                serializer.collect_map(entries.into_iter().map(|(k, v)| (k, SortedKeys(v))))
            }
            other => other.serialize(serializer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_keys_with_python_separators() {
        let v = json!({"b": 1, "a": [true, null], "c": {"z": "x", "y": 2.5}});
        assert_eq!(
            to_json(&v),
            r#"{"a": [true, null], "b": 1, "c": {"y": 2.5, "z": "x"}}"#
        );
    }

    #[test]
    fn html_sensitive_characters_are_escaped() {
        let v = json!({"q": "<a href='x'>&</a>"});
        assert_eq!(
            to_json(&v),
            r#"{"q": "\u003ca href=\u0027x\u0027\u003e\u0026\u003c/a\u003e"}"#
        );
    }

    #[test]
    fn non_ascii_kept_and_controls_escaped() {
        let v = json!({"city": "Zürich", "raw": "line\nnext\u{1}"});
        assert_eq!(
            to_json(&v),
            r#"{"city": "Zürich", "raw": "line\nnext\u0001"}"#
        );
    }

    #[test]
    fn empty_containers() {
        assert_eq!(to_json(&json!({})), "{}");
        assert_eq!(to_json(&json!([])), "[]");
    }
}
