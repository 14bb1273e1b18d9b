//! Cell accessors for tabular rows.
//!
//! The service returns every cell as a JSON string (or `null`), so numeric
//! columns need parsing.

use serde_json::Value;

/// One row of a query result, in the query's column order.
pub type Row = Vec<Value>;

/// Reads a cell as trimmed, non-empty text.
#[must_use]
pub fn cell_str(row: &[Value], index: usize) -> Option<String> {
    match row.get(index)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Reads a cell as a finite number.
#[must_use]
pub fn cell_f64(row: &[Value], index: usize) -> Option<f64> {
    let value = match row.get(index)? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}
