//! Canonical JSON: the single byte encoding behind every digest and size
//!
//! All hashing (`vk_hash`, transcript bindings) and all size accounting that
//! feeds metering run over the bytes produced here, so the encoding must be
//! identical across processes, architectures, and implementations.
//!
//! ### Encoding rules
//! - Map keys sorted bytewise-lexicographic on their UTF-8 encoding.
//! - Compact separators; no insignificant whitespace is ever emitted.
//! - Integers only (shortest decimal form); floating-point values are
//!   rejected outright.
//! - Strings are UTF-8; `"` and `\` are escaped, control characters use
//!   lowercase `\u00xx` escapes; no other escapes are produced.
//!
//! ### Strict decoding
//! [`decode_strict`] accepts exactly the bytes [`encode`] would produce:
//! the input is parsed and re-encoded, and any byte difference (reordered
//! keys, duplicate keys, whitespace, non-shortest numbers) is rejected.

use serde_json::Value;

/// Errors from canonical encoding or strict decoding.
#[derive(Debug, thiserror::Error)]
pub enum CanonError {
    /// Floating-point numbers have no canonical form and are rejected.
    #[error("floating-point values are not encodable")]
    Float,
    /// The input was valid JSON but not in canonical form.
    #[error("input is not canonical JSON: {0}")]
    NotCanonical(&'static str),
    /// The input was not valid JSON at all.
    #[error("malformed JSON: {0}")]
    Malformed(String),
}

/// Encode a structured value into canonical bytes.
pub fn encode(value: &Value) -> Result<Vec<u8>, CanonError> {
    let mut out = Vec::with_capacity(128);
    write_value(value, &mut out)?;
    Ok(out)
}

/// Canonical encoded length of a value, as used for size accounting.
pub fn encoded_len(value: &Value) -> Result<u64, CanonError> {
    Ok(encode(value)?.len() as u64)
}

/// Parse canonical bytes back into a structured value (strict mode).
///
/// Rejects any input that is not bit-identical to its own re-encoding.
pub fn decode_strict(bytes: &[u8]) -> Result<Value, CanonError> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| CanonError::Malformed(e.to_string()))?;
    let reencoded = encode(&value)?;
    if reencoded != bytes {
        return Err(CanonError::NotCanonical(
            "bytes differ from canonical re-encoding",
        ));
    }
    Ok(value)
}

fn write_value(value: &Value, out: &mut Vec<u8>) -> Result<(), CanonError> {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(n) => {
            // Shortest-form decimal; only integers are canonical.
            if let Some(u) = n.as_u64() {
                out.extend_from_slice(u.to_string().as_bytes());
            } else if let Some(i) = n.as_i64() {
                out.extend_from_slice(i.to_string().as_bytes());
            } else {
                return Err(CanonError::Float);
            }
        }
        Value::String(s) => write_string(s, out),
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(item, out)?;
            }
            out.push(b']');
        }
        Value::Object(map) => {
            // serde_json's default map is a BTreeMap, so iteration order is
            // already bytewise-lexicographic on the UTF-8 keys.
            out.push(b'{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_string(key, out);
                out.push(b':');
                write_value(item, out)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}

fn write_string(s: &str, out: &mut Vec<u8>) {
    out.push(b'"');
    for c in s.chars() {
        match c {
            '"' => out.extend_from_slice(b"\\\""),
            '\\' => out.extend_from_slice(b"\\\\"),
            c if (c as u32) < 0x20 => {
                let mut buf = [0u8; 6];
                buf.copy_from_slice(b"\\u0000");
                let hex = b"0123456789abcdef";
                buf[4] = hex[((c as u32) >> 4) as usize];
                buf[5] = hex[((c as u32) & 0xf) as usize];
                out.extend_from_slice(&buf);
            }
            c => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out.push(b'"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trip() {
        let v = json!({
            "b": [1, 2, 3],
            "a": {"nested": true, "x": null},
            "s": "héllo\n"
        });
        let bytes = encode(&v).unwrap();
        let back = decode_strict(&bytes).unwrap();
        assert_eq!(v, back);
    }

    #[test]
    fn key_order_is_bytewise() {
        // serde_json maps sort on insertion; two insertion orders must
        // serialize identically.
        let a: Value = serde_json::from_str(r#"{"zz":1,"aa":2,"m":3}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"m":3,"aa":2,"zz":1}"#).unwrap();
        assert_eq!(encode(&a).unwrap(), encode(&b).unwrap());
        assert_eq!(encode(&a).unwrap(), br#"{"aa":2,"m":3,"zz":1}"#.to_vec());
    }

    #[test]
    fn no_whitespace_emitted() {
        let v = json!({"k": [1, {"x": "y"}]});
        let bytes = encode(&v).unwrap();
        assert_eq!(bytes, br#"{"k":[1,{"x":"y"}]}"#.to_vec());
    }

    #[test]
    fn floats_rejected() {
        let v = json!({"x": 1.5});
        assert!(matches!(encode(&v), Err(CanonError::Float)));
    }

    #[test]
    fn strict_decode_rejects_whitespace_and_reordering() {
        assert!(decode_strict(br#"{"a": 1}"#).is_err());
        assert!(decode_strict(br#"{"b":1,"a":2}"#).is_err());
        assert!(decode_strict(br#"{"a":1}"#).is_ok());
    }

    #[test]
    fn strict_decode_rejects_duplicate_keys() {
        // serde_json collapses duplicates, so re-encoding shrinks the input.
        assert!(decode_strict(br#"{"a":1,"a":1}"#).is_err());
    }

    #[test]
    fn control_chars_escape_lowercase() {
        let v = json!("\u{0001}");
        assert_eq!(encode(&v).unwrap(), b"\"\\u0001\"".to_vec());
    }

    #[test]
    fn encoded_len_matches_bytes() {
        let v = json!({"proof": "00ff", "n": 12});
        assert_eq!(encoded_len(&v).unwrap(), encode(&v).unwrap().len() as u64);
    }
}
