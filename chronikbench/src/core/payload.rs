//! Payload rendering and size estimation
//!
//! Payload size is the byte length of the pretty-printed (2-space indent)
//! JSON document. Integers that do not fit the exactly-representable float
//! range are rendered as decimal strings, so size estimates and the raw
//! payload viewer agree with consumers that parse numbers as doubles.

use std::io;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::{Number, Value};

/// Largest integer a double represents exactly (2^53 - 1)
pub const MAX_SAFE_INTEGER: u64 = 9_007_199_254_740_991;

/// Serializes a JSON value with oversized integers as decimal strings
pub struct SafeIntegers<'a>(pub &'a Value);

impl Serialize for SafeIntegers<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Number(n) => serialize_number(n, serializer),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(&SafeIntegers(item))?;
                }
                seq.end()
            }
            Value::Object(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (key, value) in fields {
                    map.serialize_entry(key, &SafeIntegers(value))?;
                }
                map.end()
            }
            other => other.serialize(serializer),
        }
    }
}

fn serialize_number<S: Serializer>(n: &Number, serializer: S) -> Result<S::Ok, S::Error> {
    if let Some(u) = n.as_u64() {
        if u > MAX_SAFE_INTEGER {
            return serializer.collect_str(&u);
        }
    } else if let Some(i) = n.as_i64() {
        if i.unsigned_abs() > MAX_SAFE_INTEGER {
            return serializer.collect_str(&i);
        }
    }
    n.serialize(serializer)
}

/// io::Write sink that only counts bytes
#[derive(Default)]
struct ByteCounter {
    count: u64,
}

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.count += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Byte length of the pretty-printed rendering of `value`
pub fn serialized_len(value: &Value) -> Result<u64, serde_json::Error> {
    let mut counter = ByteCounter::default();
    serde_json::to_writer_pretty(&mut counter, &SafeIntegers(value))?;
    Ok(counter.count)
}

/// Byte length of any serializable response document
pub fn document_len<T: Serialize>(document: &T) -> Result<u64, serde_json::Error> {
    serialized_len(&serde_json::to_value(document)?)
}

/// Pretty-printed rendering of `value` for the raw payload viewer
pub fn render_pretty(value: &Value) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&SafeIntegers(value))
}

/// Number of records in a payload document (`txs` or `offers`)
pub fn record_count(value: &Value) -> usize {
    ["txs", "offers"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_array))
        .map_or(0, Vec::len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_large_integers_render_as_strings() {
        let value = json!({
            "sats": 18_446_744_073_709_551_615u64,
            "negative": -9_007_199_254_740_993i64,
            "small": 546,
        });
        let rendered = render_pretty(&value).unwrap();
        assert!(rendered.contains("\"sats\": \"18446744073709551615\""));
        assert!(rendered.contains("\"negative\": \"-9007199254740993\""));
        assert!(rendered.contains("\"small\": 546"));
    }

    #[test]
    fn test_safe_boundary_stays_numeric() {
        let rendered = render_pretty(&json!([MAX_SAFE_INTEGER])).unwrap();
        assert!(rendered.contains("9007199254740991"));
        assert!(!rendered.contains('"'));
    }

    #[test]
    fn test_serialized_len_matches_rendering() {
        let value = json!({"txs": [{"txid": "00ff", "value": 18_446_744_073_709_551_615u64}]});
        let rendered = render_pretty(&value).unwrap();
        assert_eq!(serialized_len(&value).unwrap(), rendered.len() as u64);
    }

    #[test]
    fn test_record_count() {
        assert_eq!(record_count(&json!({"txs": [1, 2, 3]})), 3);
        assert_eq!(record_count(&json!({"offers": [{}], "numPages": 1})), 1);
        assert_eq!(record_count(&json!({"tipHeight": 5})), 0);
    }
}
