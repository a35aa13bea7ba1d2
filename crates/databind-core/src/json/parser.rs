//! Single-pass JSON parser
//!
//! Parses JSON text directly into [`JsonValue`] trees:
//! - Single pass over the input bytes
//! - Minimal allocations (escape-free strings are sliced, not rebuilt)
//! - Position-bearing error messages
//! - Nesting depth limit

use super::JsonValue;
use crate::{BindError, BindResult, MAX_DEPTH};
use indexmap::IndexMap;

/// Parse a JSON string into a [`JsonValue`]
pub fn parse(input: &str) -> BindResult<JsonValue> {
    let mut parser = Parser::new(input);
    let value = parser.parse_value()?;
    parser.skip_whitespace();
    if parser.pos < parser.bytes.len() {
        return Err(BindError::Syntax(format!(
            "Trailing characters at position {}",
            parser.pos
        )));
    }
    Ok(value)
}

/// JSON parser state
struct Parser<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            depth: 0,
        }
    }

    /// Parse a JSON value (entry point)
    fn parse_value(&mut self) -> BindResult<JsonValue> {
        self.skip_whitespace();

        if self.pos >= self.bytes.len() {
            return Err(BindError::Syntax("Unexpected end of JSON".to_string()));
        }

        match self.bytes[self.pos] {
            b'n' => self.parse_null(),
            b't' | b'f' => self.parse_bool(),
            b'"' => self.parse_string(),
            b'[' => self.parse_array(),
            b'{' => self.parse_object(),
            b'-' | b'0'..=b'9' => self.parse_number(),
            c => Err(BindError::Syntax(format!(
                "Unexpected character '{}' at position {}",
                c as char, self.pos
            ))),
        }
    }

    fn parse_null(&mut self) -> BindResult<JsonValue> {
        if self.consume_literal("null") {
            Ok(JsonValue::Null)
        } else {
            Err(BindError::Syntax(format!(
                "Invalid null literal at position {}",
                self.pos
            )))
        }
    }

    fn parse_bool(&mut self) -> BindResult<JsonValue> {
        if self.consume_literal("true") {
            Ok(JsonValue::Bool(true))
        } else if self.consume_literal("false") {
            Ok(JsonValue::Bool(false))
        } else {
            Err(BindError::Syntax(format!(
                "Invalid boolean literal at position {}",
                self.pos
            )))
        }
    }

    fn parse_string(&mut self) -> BindResult<JsonValue> {
        Ok(JsonValue::String(self.parse_string_data()?))
    }

    /// Parse a quoted string into owned data
    fn parse_string_data(&mut self) -> BindResult<String> {
        if self.bytes[self.pos] != b'"' {
            return Err(BindError::Syntax(format!(
                "Expected '\"' at position {}",
                self.pos
            )));
        }
        self.pos += 1; // Skip opening quote

        let start = self.pos;
        let mut has_escapes = false;

        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'"' => {
                    let end = self.pos;
                    self.pos += 1;

                    return if has_escapes {
                        self.unescape_string(&self.input[start..end])
                    } else {
                        Ok(self.input[start..end].to_string())
                    };
                }
                b'\\' => {
                    has_escapes = true;
                    self.pos += 1; // Skip backslash
                    if self.pos >= self.bytes.len() {
                        return Err(BindError::Syntax(
                            "Unexpected end of string escape".to_string(),
                        ));
                    }
                    self.pos += 1; // Skip escaped character
                }
                b'\x00'..=b'\x1F' => {
                    return Err(BindError::Syntax(format!(
                        "Unescaped control character in string at position {}",
                        self.pos
                    )));
                }
                _ => {
                    self.pos += 1;
                }
            }
        }

        Err(BindError::Syntax("Unterminated string".to_string()))
    }

    /// Unescape a JSON string
    fn unescape_string(&self, s: &str) -> BindResult<String> {
        let mut result = String::with_capacity(s.len());
        let mut chars = s.chars();

        while let Some(ch) = chars.next() {
            if ch == '\\' {
                match chars.next() {
                    Some('"') => result.push('"'),
                    Some('\\') => result.push('\\'),
                    Some('/') => result.push('/'),
                    Some('b') => result.push('\x08'),
                    Some('f') => result.push('\x0C'),
                    Some('n') => result.push('\n'),
                    Some('r') => result.push('\r'),
                    Some('t') => result.push('\t'),
                    Some('u') => {
                        // Unicode escape \uXXXX
                        let hex: String = chars.by_ref().take(4).collect();
                        if hex.len() != 4 {
                            return Err(BindError::Syntax(
                                "Invalid unicode escape".to_string(),
                            ));
                        }
                        let code = u32::from_str_radix(&hex, 16).map_err(|_| {
                            BindError::Syntax("Invalid unicode hex digits".to_string())
                        })?;
                        if let Some(unicode_char) = char::from_u32(code) {
                            result.push(unicode_char);
                        } else {
                            return Err(BindError::Syntax(
                                "Invalid unicode code point".to_string(),
                            ));
                        }
                    }
                    Some(c) => {
                        return Err(BindError::Syntax(format!(
                            "Invalid escape sequence: \\{}",
                            c
                        )))
                    }
                    None => {
                        return Err(BindError::Syntax("Unexpected end of string".to_string()))
                    }
                }
            } else {
                result.push(ch);
            }
        }

        Ok(result)
    }

    fn parse_number(&mut self) -> BindResult<JsonValue> {
        let start = self.pos;

        // Optional minus
        if self.pos < self.bytes.len() && self.bytes[self.pos] == b'-' {
            self.pos += 1;
        }

        // Integer part
        if self.pos >= self.bytes.len() {
            return Err(BindError::Syntax("Unexpected end of number".to_string()));
        }

        if self.bytes[self.pos] == b'0' {
            self.pos += 1;
        } else if self.bytes[self.pos].is_ascii_digit() {
            while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
                self.pos += 1;
            }
        } else {
            return Err(BindError::Syntax(format!(
                "Invalid number at position {}",
                self.pos
            )));
        }

        // Fractional part
        if self.pos < self.bytes.len() && self.bytes[self.pos] == b'.' {
            self.pos += 1;
            if self.pos >= self.bytes.len() || !self.bytes[self.pos].is_ascii_digit() {
                return Err(BindError::Syntax(
                    "Invalid number: digit expected after '.'".to_string(),
                ));
            }
            while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
                self.pos += 1;
            }
        }

        // Exponent part
        if self.pos < self.bytes.len()
            && (self.bytes[self.pos] == b'e' || self.bytes[self.pos] == b'E')
        {
            self.pos += 1;
            if self.pos < self.bytes.len()
                && (self.bytes[self.pos] == b'+' || self.bytes[self.pos] == b'-')
            {
                self.pos += 1;
            }
            if self.pos >= self.bytes.len() || !self.bytes[self.pos].is_ascii_digit() {
                return Err(BindError::Syntax(
                    "Invalid number: digit expected in exponent".to_string(),
                ));
            }
            while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
                self.pos += 1;
            }
        }

        let num_str = &self.input[start..self.pos];
        let num = num_str
            .parse::<f64>()
            .map_err(|_| BindError::Syntax(format!("Invalid number: {}", num_str)))?;

        Ok(JsonValue::Number(num))
    }

    fn parse_array(&mut self) -> BindResult<JsonValue> {
        self.enter()?;
        self.pos += 1; // Skip '['
        self.skip_whitespace();

        let mut elements = Vec::new();

        // Empty array
        if self.pos < self.bytes.len() && self.bytes[self.pos] == b']' {
            self.pos += 1;
            self.depth -= 1;
            return Ok(JsonValue::Array(elements));
        }

        loop {
            let value = self.parse_value()?;
            elements.push(value);

            self.skip_whitespace();

            if self.pos >= self.bytes.len() {
                return Err(BindError::Syntax("Unterminated array".to_string()));
            }

            match self.bytes[self.pos] {
                b',' => {
                    self.pos += 1;
                    self.skip_whitespace();
                }
                b']' => {
                    self.pos += 1;
                    self.depth -= 1;
                    return Ok(JsonValue::Array(elements));
                }
                c => {
                    return Err(BindError::Syntax(format!(
                        "Expected ',' or ']' in array, got '{}' at position {}",
                        c as char, self.pos
                    )))
                }
            }
        }
    }

    fn parse_object(&mut self) -> BindResult<JsonValue> {
        self.enter()?;
        self.pos += 1; // Skip '{'
        self.skip_whitespace();

        let mut object = IndexMap::new();

        // Empty object
        if self.pos < self.bytes.len() && self.bytes[self.pos] == b'}' {
            self.pos += 1;
            self.depth -= 1;
            return Ok(JsonValue::Object(object));
        }

        loop {
            // Parse key (must be string)
            self.skip_whitespace();
            if self.pos >= self.bytes.len() || self.bytes[self.pos] != b'"' {
                return Err(BindError::Syntax(format!(
                    "Expected string key at position {}",
                    self.pos
                )));
            }

            let key = self.parse_string_data()?;

            // Expect colon
            self.skip_whitespace();
            if self.pos >= self.bytes.len() || self.bytes[self.pos] != b':' {
                return Err(BindError::Syntax(format!(
                    "Expected ':' after object key at position {}",
                    self.pos
                )));
            }
            self.pos += 1;

            // Parse value; duplicate keys: last occurrence wins
            self.skip_whitespace();
            let value = self.parse_value()?;
            object.insert(key, value);

            self.skip_whitespace();

            if self.pos >= self.bytes.len() {
                return Err(BindError::Syntax("Unterminated object".to_string()));
            }

            match self.bytes[self.pos] {
                b',' => {
                    self.pos += 1;
                    self.skip_whitespace();
                }
                b'}' => {
                    self.pos += 1;
                    self.depth -= 1;
                    return Ok(JsonValue::Object(object));
                }
                c => {
                    return Err(BindError::Syntax(format!(
                        "Expected ',' or '}}' in object, got '{}' at position {}",
                        c as char, self.pos
                    )))
                }
            }
        }
    }

    fn enter(&mut self) -> BindResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(BindError::DepthExceeded);
        }
        Ok(())
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b' ' | b'\t' | b'\n' | b'\r' => self.pos += 1,
                _ => break,
            }
        }
    }

    /// Try to consume a literal string
    fn consume_literal(&mut self, literal: &str) -> bool {
        let literal_bytes = literal.as_bytes();
        if self.pos + literal_bytes.len() > self.bytes.len() {
            return false;
        }

        if &self.bytes[self.pos..self.pos + literal_bytes.len()] == literal_bytes {
            self.pos += literal_bytes.len();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_null() {
        assert!(parse("null").unwrap().is_null());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse("true").unwrap().as_bool(), Some(true));
        assert_eq!(parse("false").unwrap().as_bool(), Some(false));
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse("42").unwrap().as_number(), Some(42.0));
        assert_eq!(parse("-17.5").unwrap().as_number(), Some(-17.5));
        assert_eq!(parse("3.14e2").unwrap().as_number(), Some(314.0));
    }

    #[test]
    fn test_parse_string() {
        assert_eq!(parse("\"hello\"").unwrap().as_str(), Some("hello"));
        assert_eq!(
            parse("\"hello\\nworld\"").unwrap().as_str(),
            Some("hello\nworld")
        );
        assert_eq!(parse("\"\\u0041\"").unwrap().as_str(), Some("A"));
    }

    #[test]
    fn test_parse_array() {
        let result = parse("[1, 2, 3]").unwrap();
        let arr = result.as_array().unwrap();
        assert_eq!(arr.len(), 3);
        assert_eq!(arr[0].as_number(), Some(1.0));
        assert_eq!(arr[2].as_number(), Some(3.0));
    }

    #[test]
    fn test_parse_object() {
        let result = parse("{\"name\": \"Alice\", \"age\": 30}").unwrap();
        assert!(result.is_object());
        assert_eq!(
            result.get_property("name").and_then(|v| v.as_str()),
            Some("Alice")
        );
        assert_eq!(
            result.get_property("age").and_then(|v| v.as_number()),
            Some(30.0)
        );
    }

    #[test]
    fn test_parse_object_preserves_key_order() {
        let result = parse(r#"{"b": 1, "a": 2, "c": 3}"#).unwrap();
        let keys: Vec<&str> = result.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_parse_duplicate_keys_last_wins() {
        let result = parse(r#"{"a": 1, "a": 2}"#).unwrap();
        assert_eq!(
            result.get_property("a").and_then(|v| v.as_number()),
            Some(2.0)
        );
        assert_eq!(result.as_object().unwrap().len(), 1);
    }

    #[test]
    fn test_parse_nested() {
        let json = r#"
        {
            "user": {
                "name": "Alice",
                "tags": ["admin", "user"]
            },
            "count": 42
        }
        "#;

        let result = parse(json).unwrap();
        let user = result.get_property("user").unwrap();
        assert!(user.is_object());
        assert!(user.get_property("tags").unwrap().is_array());
    }

    #[test]
    fn test_parse_error() {
        assert!(parse("{invalid}").is_err());
        assert!(parse("[1, 2,]").is_err());
        assert!(parse("nul").is_err());
        assert!(parse("42 garbage").is_err());
    }

    #[test]
    fn test_depth_limit() {
        let deep = "[".repeat(MAX_DEPTH + 1) + &"]".repeat(MAX_DEPTH + 1);
        assert!(matches!(parse(&deep), Err(BindError::DepthExceeded)));
    }
}
