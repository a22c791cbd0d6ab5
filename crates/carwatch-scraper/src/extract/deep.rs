//! Key search over an arbitrarily nested payload.

use serde_json::Value;

/// Depth-first iterator over every value bound to `key` at any depth.
///
/// A mapping's own binding is yielded before anything nested inside it;
/// children are then visited in document order.
pub(crate) struct DeepFind<'v, 'k> {
    key: &'k str,
    stack: Vec<&'v Value>,
}

impl<'v, 'k> DeepFind<'v, 'k> {
    pub(crate) fn new(root: &'v Value, key: &'k str) -> Self {
        Self {
            key,
            stack: vec![root],
        }
    }
}

fn is_container(value: &Value) -> bool {
    value.is_object() || value.is_array()
}

impl<'v> Iterator for DeepFind<'v, '_> {
    type Item = &'v Value;

    fn next(&mut self) -> Option<&'v Value> {
        while let Some(node) = self.stack.pop() {
            match node {
                Value::Object(map) => {
                    self.stack
                        .extend(map.values().rev().filter(|v| is_container(v)));
                    if let Some(found) = map.get(self.key) {
                        return Some(found);
                    }
                }
                Value::Array(items) => {
                    self.stack
                        .extend(items.iter().rev().filter(|v| is_container(v)));
                }
                _ => {}
            }
        }
        None
    }
}

/// Textual form of a scalar: trimmed non-empty strings and integers.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_owned())
        }
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}

/// First value bound to `key` with a textual form.
pub(crate) fn first_text(root: &Value, key: &str) -> Option<String> {
    DeepFind::new(root, key).find_map(scalar_text)
}

/// First value bound to `key` that reads as an integer (digits only).
pub(crate) fn first_int(root: &Value, key: &str) -> Option<i64> {
    DeepFind::new(root, key).find_map(|v| match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => {
            let digits: String = s.chars().filter(char::is_ascii_digit).collect();
            digits.parse().ok()
        }
        _ => None,
    })
}
