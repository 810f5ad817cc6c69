use serde_json::Value;

/// Render a JSON value as display text, with control characters removed so
/// backend-supplied fields cannot inject terminal escapes.
pub fn value_to_string(value: Value) -> String {
    let raw = match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    strip_control_chars(&raw)
}

fn strip_control_chars(s: &str) -> String {
    s.chars().filter(|c| !c.is_control()).collect()
}
