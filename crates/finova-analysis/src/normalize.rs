//! Coercion of loosely typed tool arguments
//!
//! Models pass numbers in every shape imaginable: bare numbers, numeric
//! strings with currency noise, JSON documents embedded in strings, comma
//! lists. Everything here is total: what cannot be read becomes `0.0` (or
//! an empty sequence) instead of an error.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// A single number written with thousands separators, e.g. `GHS 1,200.50`
///
/// Only read as one number when something besides digits and commas marks
/// it, see [`is_grouped_number`]. A bare `670,420` is a list.
static GROUPED_NUMBER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^\d,\-]*-?\d{1,3}(,\d{3})+(\.\d+)?[^\d,]*$").ok());

/// Read one number out of arbitrary JSON
///
/// Objects contribute their `value` entry; anything unreadable is `0.0`.
pub fn to_float(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0),
        Value::String(s) => parse_number(s),
        Value::Object(map) => map.get("value").map_or(0.0, to_float),
        _ => 0.0,
    }
}

/// Parse a numeric string, dropping everything but digits, `.` and `-`
pub fn parse_number(text: &str) -> f64 {
    let trimmed = text.trim();
    if let Ok(v) = trimmed.parse::<f64>() {
        if v.is_finite() {
            return v;
        }
    }
    let cleaned: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-'))
        .collect();
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Coerce any argument into a flat, ordered list of numbers
///
/// ```
/// use finova_analysis::normalize::to_values;
/// use serde_json::json;
///
/// assert_eq!(to_values(&json!([100, "200", 300.5])), vec![100.0, 200.0, 300.5]);
/// assert_eq!(to_values(&json!("100, 200")), vec![100.0, 200.0]);
/// assert_eq!(to_values(&json!("[1, 2]")), vec![1.0, 2.0]);
/// assert_eq!(to_values(&json!({"values": [4, 5]})), vec![4.0, 5.0]);
/// ```
pub fn to_values(value: &Value) -> Vec<f64> {
    let mut out = Vec::new();
    match value {
        Value::Null => {}
        Value::String(s) => collect_from_str(s, &mut out),
        other => flatten_into(other, &mut out),
    }
    out
}

fn collect_from_str(text: &str, out: &mut Vec<f64>) {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::String(inner)) => collect_from_str(&inner, out),
        Ok(parsed) => flatten_into(&parsed, out),
        Err(_) if !trimmed.contains(',') || is_grouped_number(trimmed) => {
            out.push(parse_number(trimmed));
        }
        Err(_) => out.extend(
            trimmed
                .split(',')
                .map(str::trim)
                .filter(|piece| !piece.is_empty())
                .map(parse_number),
        ),
    }
}

fn flatten_into(value: &Value, out: &mut Vec<f64>) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| flatten_into(item, out)),
        Value::Object(map) => {
            if let Some(inner) = map.get("values") {
                match inner {
                    Value::String(s) => collect_from_str(s, out),
                    other => flatten_into(other, out),
                }
            } else if let Some(inner) = map.get("value") {
                out.push(to_float(inner));
            } else {
                map.values().for_each(|item| flatten_into(item, out));
            }
        }
        other => out.push(to_float(other)),
    }
}

fn is_grouped_number(text: &str) -> bool {
    let marked = text
        .chars()
        .any(|c| !(c.is_ascii_digit() || c.is_whitespace() || matches!(c, ',' | '-')));
    marked
        && GROUPED_NUMBER
            .as_ref()
            .is_some_and(|re| re.is_match(text))
}

/// Bind an argument payload to named parameters
///
/// `params` lists each parameter's accepted names, canonical name first.
/// Accepted payloads: an object keyed by any accepted name, a positional
/// array, a JSON string of either, or a comma string whose pieces are
/// positional or `name=value` pairs. A bare scalar binds the first
/// parameter. Missing parameters come back as `Value::Null`.
pub fn bind_args(payload: &Value, params: &[&[&str]]) -> Vec<Value> {
    let mut bound = vec![Value::Null; params.len()];
    match payload {
        Value::Object(map) => {
            for (slot, names) in bound.iter_mut().zip(params) {
                if let Some(value) = lookup(map, names) {
                    *slot = value.clone();
                }
            }
        }
        Value::Array(items) => {
            for (slot, item) in bound.iter_mut().zip(items) {
                *slot = item.clone();
            }
        }
        Value::String(text) => return bind_str(text, params),
        Value::Null => {}
        scalar => {
            if let Some(first) = bound.first_mut() {
                *first = scalar.clone();
            }
        }
    }
    bound
}

fn bind_str(text: &str, params: &[&[&str]]) -> Vec<Value> {
    let trimmed = text.trim();
    if let Ok(parsed @ (Value::Object(_) | Value::Array(_))) = serde_json::from_str::<Value>(trimmed)
    {
        return bind_args(&parsed, params);
    }

    let mut bound = vec![Value::Null; params.len()];
    let mut next = 0;
    for piece in trimmed.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let named = piece
            .split_once('=')
            .or_else(|| piece.split_once(':'))
            .and_then(|(key, value)| position(params, key).map(|index| (index, value)));
        if let Some((index, value)) = named {
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            bound[index] = Value::String(value.to_string());
        } else if next < bound.len() {
            bound[next] = Value::String(piece.to_string());
            next += 1;
        }
    }
    bound
}

fn lookup<'a>(map: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    map.iter()
        .find(|(key, _)| names.contains(&normalize_key(key).as_str()))
        .map(|(_, value)| value)
}

fn position(params: &[&[&str]], key: &str) -> Option<usize> {
    let key = normalize_key(key);
    params.iter().position(|names| names.contains(&key.as_str()))
}

fn normalize_key(key: &str) -> String {
    key.trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_lowercase()
        .replace([' ', '-'], "_")
}
