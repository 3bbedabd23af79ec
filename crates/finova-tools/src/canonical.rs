//! Canonical cache keys for tool calls
//!
//! Two calls that are logically equal must produce the same key: object keys
//! are sorted, and every number goes through `f64` so `1`, `1.0` and `1e0`
//! collapse to one spelling.

use serde_json::{Number, Value};

/// Canonical `name(args)` key for a tool call
///
/// ```
/// use finova_tools::canonical_key;
/// use serde_json::json;
///
/// assert_eq!(
///     canonical_key("calculate_ratio", &json!({"b": 2.0, "a": 1})),
///     canonical_key("calculate_ratio", &json!({"a": 1.0, "b": 2})),
/// );
/// ```
pub fn canonical_key(tool_name: &str, args: &Value) -> String {
    let mut out = String::with_capacity(64);
    out.push_str(tool_name.trim());
    out.push('(');
    write_canonical(args, &mut out);
    out.push(')');
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&canonical_number(n)),
        Value::String(s) => out.push_str(&serde_json::to_string(s).unwrap_or_default()),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key).unwrap_or_default());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
    }
}

fn canonical_number(n: &Number) -> String {
    match n.as_f64() {
        // folds -0.0 into 0
        Some(f) if f == 0.0 => "0".to_string(),
        Some(f) => format!("{f}"),
        None => n.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integer_and_float_collapse() {
        assert_eq!(
            canonical_key("calculate_total", &json!([1, 2, 3])),
            canonical_key("calculate_total", &json!([1.0, 2.0, 3.0]))
        );
        assert_eq!(canonical_key("t", &json!(-0.0)), canonical_key("t", &json!(0)));
    }

    #[test]
    fn test_key_order_does_not_matter() {
        let a = json!({"part": 25, "whole": {"y": 1, "x": 2}});
        let b = json!({"whole": {"x": 2, "y": 1}, "part": 25});
        assert_eq!(canonical_key("p", &a), canonical_key("p", &b));
    }

    #[test]
    fn test_distinct_calls_differ() {
        assert_ne!(
            canonical_key("calculate_total", &json!([1, 2])),
            canonical_key("calculate_total", &json!([2, 1]))
        );
        assert_ne!(
            canonical_key("calculate_total", &json!("1,2")),
            canonical_key("calculate_average", &json!("1,2"))
        );
        assert_ne!(canonical_key("t", &json!("1")), canonical_key("t", &json!(1)));
    }

    #[test]
    fn test_shape() {
        assert_eq!(
            canonical_key(" calculate_ratio ", &json!({"a": 1.5, "b": "x"})),
            r#"calculate_ratio({"a":1.5,"b":"x"})"#
        );
    }
}
