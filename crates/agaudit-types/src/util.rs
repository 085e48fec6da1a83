use serde_json::Value;

/// Look up a dotted path (`a.b.c`) inside a JSON value. Returns None when
/// any segment is missing or an intermediate value is not an object.
pub fn dotted_get<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for part in path.split('.') {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Render a JSON value for human-facing messages: strings bare, everything
/// else as compact JSON.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Python-style truthiness over JSON values, used when coercing loosely
/// typed validator replies.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dotted_get_walks_nested_objects() {
        let value = json!({"params": {"total": 5000, "customer": {"id": "c-9"}}});
        assert_eq!(dotted_get(&value, "params.total"), Some(&json!(5000)));
        assert_eq!(
            dotted_get(&value, "params.customer.id"),
            Some(&json!("c-9"))
        );
        assert_eq!(dotted_get(&value, "params.missing"), None);
        assert_eq!(dotted_get(&value, "params.total.deeper"), None);
    }

    #[test]
    fn render_value_leaves_strings_bare() {
        assert_eq!(render_value(&json!("abc")), "abc");
        assert_eq!(render_value(&json!(5000)), "5000");
        assert_eq!(render_value(&json!({"a": 1})), "{\"a\":1}");
    }

    #[test]
    fn truthiness_matches_loose_coercion() {
        assert!(truthy(&json!(true)));
        assert!(truthy(&json!("no")));
        assert!(!truthy(&json!("")));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!(null)));
        assert!(truthy(&json!([1])));
    }
}
