//! Compact JSON writer
//!
//! Renders a [`JsonValue`] tree to JSON text with proper escaping. The
//! writer is infallible: non-finite numbers (which the serializer rewrites
//! when the corresponding features are enabled) degrade to `null` so the
//! output is always syntactically valid, and `Raw` payloads are spliced
//! verbatim.

use super::JsonValue;
use std::fmt::Write;

/// Render a [`JsonValue`] to a JSON string
pub fn write(value: &JsonValue) -> String {
    let mut output = String::new();
    write_impl(value, &mut output);
    output
}

fn write_impl(value: &JsonValue, output: &mut String) {
    match value {
        JsonValue::Null => {
            output.push_str("null");
        }

        JsonValue::Bool(b) => {
            output.push_str(if *b { "true" } else { "false" });
        }

        JsonValue::Number(n) => {
            if n.is_nan() || n.is_infinite() {
                output.push_str("null");
            } else {
                // Rust's f64 Display prints integral values without a
                // trailing ".0"
                let _ = write!(output, "{}", n);
            }
        }

        JsonValue::String(s) => {
            output.push('"');
            escape_string(s, output);
            output.push('"');
        }

        JsonValue::Array(items) => {
            output.push('[');
            for (i, elem) in items.iter().enumerate() {
                if i > 0 {
                    output.push(',');
                }
                write_impl(elem, output);
            }
            output.push(']');
        }

        JsonValue::Object(entries) => {
            output.push('{');
            let mut first = true;
            for (key, value) in entries.iter() {
                if !first {
                    output.push(',');
                }
                first = false;

                output.push('"');
                escape_string(key, output);
                output.push('"');
                output.push(':');
                write_impl(value, output);
            }
            output.push('}');
        }

        JsonValue::Raw(text) => {
            output.push_str(text);
        }
    }
}

/// Escape a string for JSON
///
/// Escapes: " \ \b \f \n \r \t and control characters
fn escape_string(s: &str, output: &mut String) {
    for ch in s.chars() {
        match ch {
            '"' => output.push_str("\\\""),
            '\\' => output.push_str("\\\\"),
            '\x08' => output.push_str("\\b"),
            '\x0C' => output.push_str("\\f"),
            '\n' => output.push_str("\\n"),
            '\r' => output.push_str("\\r"),
            '\t' => output.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(output, "\\u{:04x}", c as u32);
            }
            c => output.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json::parser;
    use indexmap::IndexMap;

    #[test]
    fn test_write_null() {
        assert_eq!(write(&JsonValue::Null), "null");
    }

    #[test]
    fn test_write_bool() {
        assert_eq!(write(&JsonValue::Bool(true)), "true");
        assert_eq!(write(&JsonValue::Bool(false)), "false");
    }

    #[test]
    fn test_write_number() {
        assert_eq!(write(&JsonValue::Number(42.0)), "42");
        assert_eq!(write(&JsonValue::Number(3.14)), "3.14");
        assert_eq!(write(&JsonValue::Number(-0.5)), "-0.5");
    }

    #[test]
    fn test_write_non_finite_as_null() {
        assert_eq!(write(&JsonValue::Number(f64::NAN)), "null");
        assert_eq!(write(&JsonValue::Number(f64::INFINITY)), "null");
        assert_eq!(write(&JsonValue::Number(f64::NEG_INFINITY)), "null");
    }

    #[test]
    fn test_write_string_escapes() {
        assert_eq!(
            write(&JsonValue::string("hello\nworld\t\"test\"")),
            "\"hello\\nworld\\t\\\"test\\\"\""
        );
    }

    #[test]
    fn test_write_array() {
        let value = JsonValue::Array(vec![
            JsonValue::Number(1.0),
            JsonValue::Number(2.0),
            JsonValue::Number(3.0),
        ]);
        assert_eq!(write(&value), "[1,2,3]");
    }

    #[test]
    fn test_write_object_preserves_order() {
        let mut entries = IndexMap::new();
        entries.insert("b".to_string(), JsonValue::Number(1.0));
        entries.insert("a".to_string(), JsonValue::Number(2.0));
        let value = JsonValue::Object(entries);
        assert_eq!(write(&value), "{\"b\":1,\"a\":2}");
    }

    #[test]
    fn test_write_raw_verbatim() {
        let mut entries = IndexMap::new();
        entries.insert("data".to_string(), JsonValue::Raw("[1, 2, 3]".to_string()));
        let value = JsonValue::Object(entries);
        assert_eq!(write(&value), "{\"data\":[1, 2, 3]}");
    }

    #[test]
    fn test_round_trip() {
        let json_str = r#"{"name":"Alice","age":30,"active":true,"tags":["admin","user"]}"#;
        let parsed = parser::parse(json_str).unwrap();
        assert_eq!(write(&parsed), json_str);
    }
}
