//! Known-field discovery.
//!
//! There is no registry of schema field names. A record's known fields are
//! whatever keys its schema encoding emits for the value at hand, so a field
//! that is skipped while empty is not known for that value. The decoder then
//! files an incoming key of that name under the extensions, and the encoder
//! merges it back, so the value still round-trips.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;

/// Field names `value` emits when serialized.
///
/// Values that do not serialize to a JSON object resolve to the empty set.
pub fn resolve<T>(value: &T) -> BTreeSet<String>
where
    T: Serialize + ?Sized,
{
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map.into_iter().map(|(key, _)| key).collect(),
        Ok(other) => {
            tracing::warn!(
                kind = value_kind(&other),
                "known-field resolution expected an object"
            );
            BTreeSet::new()
        }
        Err(error) => {
            tracing::warn!(%error, "known-field resolution failed to serialize value");
            BTreeSet::new()
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::resolve;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Sample {
        always: u32,
        #[serde(skip_serializing_if = "String::is_empty")]
        sometimes: String,
    }

    #[test]
    fn resolve_lists_emitted_keys() {
        let known = resolve(&Sample {
            always: 1,
            sometimes: "x".to_owned(),
        });
        assert_eq!(
            known.into_iter().collect::<Vec<_>>(),
            vec!["always".to_owned(), "sometimes".to_owned()]
        );
    }

    #[test]
    fn resolve_omits_skipped_empty_fields() {
        let known = resolve(&Sample {
            always: 1,
            sometimes: String::new(),
        });
        assert!(known.contains("always"));
        assert!(!known.contains("sometimes"));
    }

    #[test]
    fn resolve_non_object_is_empty() {
        assert!(resolve(&42).is_empty());
        assert!(resolve(&vec!["a"]).is_empty());
    }
}
