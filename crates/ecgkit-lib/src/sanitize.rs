use crate::error::Result;
use serde::Serialize;
use serde_json::{Map, Number, Value};

/// Serialize `value` into JSON-safe form: non-finite floats become `null` at any depth.
pub fn sanitize<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    // serde_json already maps NaN/inf to null on this path; the walk below also
    // covers values built by hand.
    let raw = serde_json::to_value(value)?;
    Ok(sanitize_value(raw))
}

/// Recursively normalize a JSON tree. Integral numbers stay integers, floats stay
/// floats, non-finite floats become `null`. Idempotent.
pub fn sanitize_value(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, sanitize_value(v)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_value).collect()),
        Value::Number(n) => sanitize_number(n),
        other => other,
    }
}

fn sanitize_number(n: Number) -> Value {
    if n.is_i64() || n.is_u64() {
        return Value::Number(n);
    }
    match n.as_f64() {
        Some(f) if f.is_finite() => Number::from_f64(f).map_or(Value::Null, Value::Number),
        _ => Value::Null,
    }
}
