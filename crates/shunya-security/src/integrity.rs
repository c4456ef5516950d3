// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Record integrity: canonical JSON bytes and SHA-256 fingerprints.
//
// Canonical form: object keys sorted by code point at every depth, no
// whitespace, serde_json scalar formatting.  Key order is imposed here rather
// than inherited from `serde_json::Map`, so the bytes do not change if some
// other crate in the build turns on `preserve_order`.
//
// Integers are exact only within i64/u64.  Anything larger was parsed as an
// f64 and has lost digits, so two different records could share one digest;
// such numbers are refused instead of canonicalized.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use shunya_core::error::{Result, ShunyaError};

/// Compute the SHA-256 hash of `data` and return it as a lowercase hex string.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Verify that `data` matches the expected SHA-256 hex digest.
///
/// Returns `Err(ShunyaError::IntegrityMismatch)` with the expected and actual
/// values when it does not.
pub fn verify_hash(data: &[u8], expected_hex: &str) -> Result<()> {
    let actual = hash_bytes(data);
    if actual == expected_hex {
        Ok(())
    } else {
        Err(ShunyaError::IntegrityMismatch {
            expected: expected_hex.to_owned(),
            actual,
        })
    }
}

/// Serialize `value` into its canonical byte form.
pub fn canonical_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let value = serde_json::to_value(value)?;
    let mut out = Vec::with_capacity(512);
    write_canonical(&value, &mut out)?;
    Ok(out)
}

/// SHA-256 hex of the canonical form of `value`.
pub fn canonical_digest<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(hash_bytes(&canonical_bytes(value)?))
}

/// 2^53: from here on an f64 no longer holds every integer.
const F64_EXACT_LIMIT: f64 = 9_007_199_254_740_992.0;

fn write_canonical(value: &Value, out: &mut Vec<u8>) -> Result<()> {
    match value {
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out)?;
            }
            out.push(b']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
            out.push(b'{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                serde_json::to_writer(&mut *out, key)?;
                out.push(b':');
                write_canonical(item, out)?;
            }
            out.push(b'}');
        }
        Value::Number(n) => {
            if let Some(f) = n.as_f64().filter(|_| n.is_f64()) {
                if f.fract() == 0.0 && f.abs() >= F64_EXACT_LIMIT {
                    return Err(ShunyaError::InexactNumber {
                        value: n.to_string(),
                    });
                }
            }
            serde_json::to_writer(&mut *out, n)?;
        }
        scalar => serde_json::to_writer(&mut *out, scalar)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// SHA-256 of the empty byte slice (well-known constant).
    const EMPTY_SHA256: &str =
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn hash_empty_input() {
        assert_eq!(hash_bytes(b""), EMPTY_SHA256);
    }

    #[test]
    fn hash_known_value() {
        // SHA-256("hello"), checked against coreutils sha256sum.
        let expected = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
        assert_eq!(hash_bytes(b"hello"), expected);
    }

    #[test]
    fn verify_mismatched_hash() {
        match verify_hash(b"a", "0000") {
            Err(ShunyaError::IntegrityMismatch { expected, actual }) => {
                assert_eq!(expected, "0000");
                assert_eq!(actual, hash_bytes(b"a"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(verify_hash(b"a", &hash_bytes(b"a")).is_ok());
    }

    #[test]
    fn keys_are_sorted_at_every_depth() {
        let value = json!({"b": 1, "a": {"z": true, "m": [3, {"y": null, "x": "s"}]}});
        let bytes = canonical_bytes(&value).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"a":{"m":[3,{"x":"s","y":null}],"z":true},"b":1}"#
        );
    }

    #[test]
    fn input_key_order_does_not_matter() {
        let one: Value = serde_json::from_str(r#"{"nonce": 7, "method": "eco", "drive_path": "/dev/sdc"}"#).unwrap();
        let two: Value = serde_json::from_str(
            r#"{
                "drive_path" : "/dev/sdc",
                "method" : "eco",
                "nonce" : 7
            }"#,
        )
        .unwrap();
        assert_eq!(canonical_bytes(&one).unwrap(), canonical_bytes(&two).unwrap());
        assert_eq!(canonical_digest(&one).unwrap(), canonical_digest(&two).unwrap());
    }

    #[test]
    fn strings_are_escaped_and_unicode_kept_raw() {
        let value = json!({"msg": "line\n\"quoted\" é"});
        let text = String::from_utf8(canonical_bytes(&value).unwrap()).unwrap();
        assert_eq!(text, "{\"msg\":\"line\\n\\\"quoted\\\" é\"}");
    }

    #[test]
    fn keys_sort_by_code_point() {
        let value = json!({"a": 1, "B": 2, "_": 3});
        let text = String::from_utf8(canonical_bytes(&value).unwrap()).unwrap();
        assert_eq!(text, r#"{"B":2,"_":3,"a":1}"#);
    }

    #[test]
    fn oversized_integers_are_refused() {
        let a: Value = serde_json::from_str(r#"{"serial": 123456789012345678901234}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"serial": 123456789012345678901235}"#).unwrap();
        for value in [&a, &b] {
            assert!(matches!(
                canonical_bytes(value),
                Err(ShunyaError::InexactNumber { .. })
            ));
        }
        let nested: Value = serde_json::from_str(r#"{"progress": [{"lba": 1e20}]}"#).unwrap();
        assert!(canonical_digest(&nested).is_err());
    }

    #[test]
    fn full_64_bit_range_and_fractions_stay_exact() {
        let value = json!({"max": u64::MAX, "min": i64::MIN, "ratio": 0.5});
        let text = String::from_utf8(canonical_bytes(&value).unwrap()).unwrap();
        assert!(text.contains("\"max\":18446744073709551615"), "{text}");
        assert!(text.contains("\"min\":-9223372036854775808"), "{text}");
        assert!(text.contains("\"ratio\":0.5"), "{text}");
    }
}
