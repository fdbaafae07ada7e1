//! Shared JSON helpers for upstream payloads.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Read a number that may arrive as a JSON number or a numeric string.
pub(crate) fn number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// `deserialize_with` adapter for [`number`]; unparsable values become `None`.
pub(crate) fn flexible_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(number))
}

pub(crate) fn flexible_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = flexible_f64(deserializer)?;
    Ok(value.filter(|v| *v >= 0.0).map(|v| v.round() as u64))
}
