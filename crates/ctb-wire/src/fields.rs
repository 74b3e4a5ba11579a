//! Lenient accessors for remote JSON payloads.
//!
//! The remote side is not consistent about field spelling (`symbolId` vs
//! `id`, `deal` vs `deals`) or about number encoding: 64-bit integers often
//! arrive as strings. Everything that reads payload fields goes through here.

use serde_json::{Number, Value};

/// First present, non-null field among `names`.
pub fn field<'a>(obj: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|n| obj.get(*n))
        .find(|v| !v.is_null())
}

/// Integer from a JSON number or a numeric string.
pub fn as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Number from a JSON number or a numeric string, integers kept exact.
pub fn as_number(v: &Value) -> Option<Number> {
    match v {
        Value::Number(n) => Some(n.clone()),
        Value::String(s) => {
            let t = s.trim();
            if let Ok(i) = t.parse::<i64>() {
                Some(Number::from(i))
            } else {
                t.parse::<f64>().ok().and_then(Number::from_f64)
            }
        }
        _ => None,
    }
}

/// Non-empty trimmed string.
pub fn as_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

pub fn i64_field(obj: &Value, names: &[&str]) -> Option<i64> {
    field(obj, names).and_then(as_i64)
}

pub fn text_field(obj: &Value, names: &[&str]) -> Option<String> {
    field(obj, names).and_then(as_text)
}

/// Array stored under any of `names`; missing or non-array yields empty.
pub fn entries<'a>(obj: &'a Value, names: &[&str]) -> &'a [Value] {
    field(obj, names)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}
