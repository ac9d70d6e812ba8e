//! Dotted path lookup over document data
//!
//! `"Customer.Address.City"` walks nested objects, matching keys exactly
//! first and case-insensitively second. Numeric segments index arrays
//! (`"Items.0.Name"`). Lookups never fail; a missing key or a null along the
//! way yields `None`.

use serde_json::Value;

/// Resolve `path` against `data`; empty path or `"."` returns `data` itself
pub fn resolve<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.trim();
    if path.is_empty() || path == "." {
        return Some(data);
    }

    let mut current = data;
    for segment in path.split('.') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        current = match current {
            Value::Object(map) => match map.get(segment) {
                Some(v) => v,
                None => {
                    map.iter()
                        .find(|(k, _)| k.eq_ignore_ascii_case(segment))
                        .map(|(_, v)| v)?
                }
            },
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
        if current.is_null() {
            return None;
        }
    }
    Some(current)
}

/// Resolve to display text: strings verbatim, numbers in shortest form,
/// booleans as `true`/`false`; null and containers are absent
pub fn resolve_text(data: &Value, path: &str) -> Option<String> {
    resolve(data, path).and_then(value_text)
}

pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Resolve to a sequence; anything that is not an array counts as empty
pub fn resolve_items<'a>(data: &'a Value, path: &str) -> Option<&'a [Value]> {
    match resolve(data, path)? {
        Value::Array(items) => Some(items.as_slice()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "Number": "A-100",
            "Total": 12.5,
            "Paid": true,
            "Customer": {"Name": "Ana", "Address": {"City": "Porto"}, "Phone": null},
            "Items": [{"Name": "Tea"}, {"Name": "Cake"}]
        })
    }

    #[test]
    fn test_identity_paths() {
        let data = sample();
        assert_eq!(resolve(&data, ""), Some(&data));
        assert_eq!(resolve(&data, "."), Some(&data));
    }

    #[test]
    fn test_nested_and_case_insensitive() {
        let data = sample();
        assert_eq!(resolve_text(&data, "Customer.Address.City").as_deref(), Some("Porto"));
        assert_eq!(resolve_text(&data, "customer.address.city").as_deref(), Some("Porto"));
        assert_eq!(resolve_text(&data, "Items.1.Name").as_deref(), Some("Cake"));
    }

    #[test]
    fn test_missing_and_null_short_circuit() {
        let data = sample();
        assert_eq!(resolve(&data, "Customer.Email"), None);
        assert_eq!(resolve(&data, "Customer.Phone.Area"), None);
        assert_eq!(resolve(&data, "Number.Length"), None);
        assert_eq!(resolve(&data, "Items.9.Name"), None);
    }

    #[test]
    fn test_scalar_text() {
        let data = sample();
        assert_eq!(resolve_text(&data, "Total").as_deref(), Some("12.5"));
        assert_eq!(resolve_text(&data, "Paid").as_deref(), Some("true"));
        assert_eq!(resolve_text(&data, "Customer"), None);
    }

    #[test]
    fn test_items() {
        let data = sample();
        assert_eq!(resolve_items(&data, "Items").map(|i| i.len()), Some(2));
        assert!(resolve_items(&data, "Number").is_none());
    }
}
