//! Canonical JSON encoding for deterministic serialization.
//!
//! Rules:
//! - Object keys sorted lexicographically (UTF-8 byte order)
//! - Numbers emitted with the shortest round-tripping decimal
//! - No insignificant whitespace
//! - Strings in strict JSON escaping
//! - Arrays preserve order
//!
//! The canonical encoding is critical: the same value must produce identical
//! bytes (and thus identical hashes) on every platform. Attested
//! floating-point quantities do not rely on shortest-round-trip formatting;
//! they are carried as [`Decimal17`] strings so cross-implementation
//! equality is well-defined.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

use crate::error::CoreError;

/// Encode a JSON value to its canonical string form.
pub fn canonical_string(value: &Value) -> Result<String, CoreError> {
    let mut out = String::new();
    write_value(&mut out, value)?;
    Ok(out)
}

/// Encode a JSON value to canonical bytes.
pub fn canonical_bytes(value: &Value) -> Result<Vec<u8>, CoreError> {
    canonical_string(value).map(String::into_bytes)
}

/// Recursively write a value in canonical form.
fn write_value(out: &mut String, value: &Value) -> Result<(), CoreError> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        // serde_json formats integers exactly and floats via the shortest
        // round-tripping decimal (ryu).
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => {
            let escaped = serde_json::to_string(s)
                .map_err(|e| CoreError::Json(e.to_string()))?;
            out.push_str(&escaped);
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item)?;
            }
            out.push(']');
        }
        Value::Object(map) => {
            // Sort keys by raw byte order regardless of the map's internal
            // ordering.
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable_by(|a, b| a.as_bytes().cmp(b.as_bytes()));

            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                let escaped = serde_json::to_string(key)
                    .map_err(|e| CoreError::Json(e.to_string()))?;
                out.push_str(&escaped);
                out.push(':');
                write_value(out, &map[key.as_str()])?;
            }
            out.push('}');
        }
    }
    Ok(())
}

/// A finite f64 canonicalized to a 17-significant-digit decimal string.
///
/// Hashed artifacts carry energy drops, residuals, regularizer weights, and
/// tolerances as strings of this form, never as raw IEEE-754 bits. 17
/// significant digits round-trip every finite f64.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decimal17(f64);

impl Decimal17 {
    /// Wrap a finite f64. Non-finite values are rejected.
    pub fn new(value: f64) -> Result<Self, CoreError> {
        if !value.is_finite() {
            return Err(CoreError::InvalidInput(format!(
                "non-finite value cannot be canonicalized: {value}"
            )));
        }
        Ok(Self(value))
    }

    /// The wrapped value.
    pub const fn value(&self) -> f64 {
        self.0
    }

    /// The canonical string form: sign, one leading digit, 16 fractional
    /// digits, and a decimal exponent.
    pub fn canonical(&self) -> String {
        format!("{:.16e}", self.0)
    }

    /// Parse the canonical form back into a value.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let value: f64 = s
            .parse()
            .map_err(|_| CoreError::InvalidInput(format!("bad decimal string: {s:?}")))?;
        Self::new(value)
    }
}

impl fmt::Display for Decimal17 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl Serialize for Decimal17 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.canonical())
    }
}

impl<'de> Deserialize<'de> for Decimal17 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_canonical_sorts_keys() {
        let value = json!({"zeta": 1, "alpha": 2, "mid": {"b": 1, "a": 2}});
        let s = canonical_string(&value).unwrap();
        assert_eq!(s, r#"{"alpha":2,"mid":{"a":2,"b":1},"zeta":1}"#);
    }

    #[test]
    fn test_canonical_no_whitespace() {
        let value = json!({"a": [1, 2, 3], "b": "x y"});
        let s = canonical_string(&value).unwrap();
        assert!(!s.contains(' ') || s.contains("x y"));
        assert_eq!(s, r#"{"a":[1,2,3],"b":"x y"}"#);
    }

    #[test]
    fn test_canonical_escapes_strings() {
        let value = json!({"k": "line\nbreak\"quote"});
        let s = canonical_string(&value).unwrap();
        assert_eq!(s, r#"{"k":"line\nbreak\"quote"}"#);
    }

    #[test]
    fn test_canonical_deterministic() {
        let value = json!({"b": [true, null, 42], "a": {"y": 1, "x": 2}});
        let s1 = canonical_string(&value).unwrap();
        let s2 = canonical_string(&value).unwrap();
        assert_eq!(s1, s2);
    }

    #[test]
    fn test_decimal17_fixed_width() {
        let d = Decimal17::new(0.5).unwrap();
        assert_eq!(d.canonical(), "5.0000000000000000e-1");

        let d = Decimal17::new(1.0).unwrap();
        assert_eq!(d.canonical(), "1.0000000000000000e0");

        let d = Decimal17::new(0.0).unwrap();
        assert_eq!(d.canonical(), "0.0000000000000000e0");
    }

    #[test]
    fn test_decimal17_roundtrip() {
        for x in [0.0, 1.0, -3.25, 1e-6, 0.1 + 0.2, f64::MAX, f64::MIN_POSITIVE] {
            let d = Decimal17::new(x).unwrap();
            let back = Decimal17::parse(&d.canonical()).unwrap();
            assert_eq!(back.value(), x, "roundtrip failed for {x}");
        }
    }

    #[test]
    fn test_decimal17_rejects_non_finite() {
        assert!(Decimal17::new(f64::NAN).is_err());
        assert!(Decimal17::new(f64::INFINITY).is_err());
        assert!(Decimal17::new(f64::NEG_INFINITY).is_err());
    }

    #[test]
    fn test_decimal17_serde() {
        let d = Decimal17::new(2.5).unwrap();
        let s = serde_json::to_string(&d).unwrap();
        assert_eq!(s, r#""2.5000000000000000e0""#);
        let back: Decimal17 = serde_json::from_str(&s).unwrap();
        assert_eq!(back.value(), 2.5);
    }

    proptest! {
        #[test]
        fn prop_object_keys_emitted_in_byte_order(
            keys in proptest::collection::btree_set("[A-Za-z0-9_]{1,8}", 1..10),
            nested in any::<bool>(),
        ) {
            // BTreeSet iteration is ascending byte order for these ASCII
            // keys, so the expected encoding can be assembled by hand.
            let sorted: Vec<&String> = keys.iter().collect();

            let mut inner = serde_json::Map::new();
            for (i, key) in sorted.iter().enumerate() {
                inner.insert((*key).clone(), Value::from(i as u64));
            }
            let inner_expected = format!(
                "{{{}}}",
                sorted
                    .iter()
                    .enumerate()
                    .map(|(i, k)| format!("\"{k}\":{i}"))
                    .collect::<Vec<_>>()
                    .join(",")
            );

            let (value, expected) = if nested {
                // Each key maps to the same object one level down; both
                // levels must come out sorted.
                let mut outer = serde_json::Map::new();
                for key in &keys {
                    outer.insert(key.clone(), Value::Object(inner.clone()));
                }
                let outer_expected = format!(
                    "{{{}}}",
                    sorted
                        .iter()
                        .map(|k| format!("\"{k}\":{inner_expected}"))
                        .collect::<Vec<_>>()
                        .join(",")
                );
                (Value::Object(outer), outer_expected)
            } else {
                (Value::Object(inner), inner_expected)
            };

            let canonical = canonical_string(&value).unwrap();
            prop_assert_eq!(&canonical, &expected);
            // And the encoding is stable.
            prop_assert_eq!(canonical_string(&value).unwrap(), canonical);
        }
    }
}
