//! Request signature composition.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stable cache key for an outbound data fetch.
///
/// Derived from the target and the serialized option set. Object keys are
/// ordered before serialization, so logically identical option sets map to
/// the same signature whatever order they were built in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestSignature(String);

impl RequestSignature {
    /// Compute the signature for a target and its options.
    pub fn from_value(target: &str, options: &Value) -> Self {
        let mut key = String::with_capacity(target.len() + 16);
        key.push_str(target);
        key.push_str("-(");
        write_canonical(&mut key, options);
        key.push(')');
        Self(key)
    }

    /// Wrap a signature string produced elsewhere (e.g. a bootstrap payload).
    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the signature string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Serialize a JSON value with object keys in sorted order.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(&mut out, value);
    out
}

fn write_canonical(out: &mut String, value: &Value) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Display on Value emits escaped JSON and cannot fail.
                let _ = write!(out, "{}", Value::String(key.clone()));
                out.push(':');
                write_canonical(out, &map[key]);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(out, item);
            }
            out.push(']');
        }
        scalar => {
            let _ = write!(out, "{}", scalar);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{json, Map};

    #[test]
    fn test_signature_format() {
        let sig = RequestSignature::from_value("/api/products", &json!({"method": "GET"}));
        assert_eq!(sig.as_str(), r#"/api/products-({"method":"GET"})"#);
    }

    #[test]
    fn test_nested_keys_sorted() {
        // Parsed with key order preserved, so the input really is unsorted.
        let a: Value =
            serde_json::from_str(r#"{"method":"POST","headers":{"b":"2","a":"1"}}"#).unwrap();
        assert_eq!(
            a.to_string(),
            r#"{"method":"POST","headers":{"b":"2","a":"1"}}"#
        );
        assert_eq!(
            canonical_json(&a),
            r#"{"headers":{"a":"1","b":"2"},"method":"POST"}"#
        );
    }

    #[test]
    fn test_array_order_is_significant() {
        let a = RequestSignature::from_value("/x", &json!({"ids": [1, 2]}));
        let b = RequestSignature::from_value("/x", &json!({"ids": [2, 1]}));
        assert_ne!(a, b);
    }

    #[test]
    fn test_target_is_significant() {
        let opts = json!({});
        assert_ne!(
            RequestSignature::from_value("/a", &opts),
            RequestSignature::from_value("/b", &opts)
        );
    }

    #[test]
    fn test_signature_serializes_as_string() {
        let sig = RequestSignature::from_raw("k");
        assert_eq!(serde_json::to_string(&sig).unwrap(), r#""k""#);
    }

    fn options_strategy() -> impl Strategy<Value = Vec<(String, String)>> {
        proptest::collection::btree_map("[a-z]{1,8}", "[a-zA-Z0-9 ]{0,12}", 1..8)
            .prop_map(|m| m.into_iter().collect())
    }

    fn build(pairs: &[(String, String)]) -> Value {
        let mut map = Map::new();
        for (k, v) in pairs {
            map.insert(k.clone(), Value::String(v.clone()));
        }
        Value::Object(map)
    }

    /// Parse a JSON object whose keys appear in the order given.
    fn parse_in_order(pairs: &[(String, String)]) -> Value {
        let body: Vec<String> = pairs
            .iter()
            .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), Value::String(v.clone())))
            .collect();
        serde_json::from_str(&format!("{{{}}}", body.join(","))).unwrap()
    }

    proptest! {
        /// Property: the key order of the option text never changes the signature.
        #[test]
        fn prop_key_order_irrelevant(
            (pairs, shuffled) in options_strategy()
                .prop_flat_map(|pairs| (Just(pairs.clone()), Just(pairs).prop_shuffle())),
        ) {
            let a = parse_in_order(&pairs);
            let b = parse_in_order(&shuffled);

            let b_keys: Vec<&String> = b.as_object().unwrap().keys().collect();
            let shuffled_keys: Vec<&String> = shuffled.iter().map(|(k, _)| k).collect();
            prop_assert_eq!(b_keys, shuffled_keys);

            prop_assert_eq!(
                RequestSignature::from_value("/api", &a),
                RequestSignature::from_value("/api", &b)
            );
        }

        /// Property: changing any single option value changes the signature.
        #[test]
        fn prop_differing_option_differs(
            pairs in options_strategy(),
            index in any::<prop::sample::Index>(),
            suffix in "[a-z]{1,4}",
        ) {
            let mut changed = pairs.clone();
            let i = index.index(changed.len());
            changed[i].1.push_str(&suffix);

            let a = RequestSignature::from_value("/api", &build(&pairs));
            let b = RequestSignature::from_value("/api", &build(&changed));
            prop_assert_ne!(a, b);
        }
    }
}
