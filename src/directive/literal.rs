//! Safe structured-literal parser
//!
//! Models emit inline directives in whatever quoting style they like:
//! JSON (`{"prompt": "a cat"}`) or Python-style literals
//! (`{'prompt': 'a cat', 'hd': True}`). This parser accepts both and never
//! evaluates anything: only mappings, sequences, strings, numbers, booleans
//! and null are recognised.

use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Maximum nesting of mappings/sequences
const MAX_DEPTH: usize = 32;

/// Literal parse failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message} at offset {offset}")]
pub struct LiteralError {
    pub offset: usize,
    pub message: String,
}

/// Parse a complete literal expression into a JSON value.
///
/// # Errors
/// Returns a [`LiteralError`] for anything that is not a single well-formed
/// literal, including trailing input.
pub fn parse_literal(input: &str) -> Result<Value, LiteralError> {
    let mut parser = Parser {
        chars: input.char_indices().collect(),
        pos: 0,
        len: input.len(),
    };
    let value = parser.value(0)?;
    parser.skip_whitespace();
    if parser.pos < parser.chars.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(value)
}

struct Parser {
    chars: Vec<(usize, char)>,
    pos: usize,
    len: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn offset(&self) -> usize {
        self.chars.get(self.pos).map_or(self.len, |(i, _)| *i)
    }

    fn error(&self, message: impl Into<String>) -> LiteralError {
        LiteralError {
            offset: self.offset(),
            message: message.into(),
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), LiteralError> {
        self.skip_whitespace();
        match self.peek() {
            Some(c) if c == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(c) => Err(self.error(format!("expected '{expected}', found '{c}'"))),
            None => Err(self.error(format!("expected '{expected}', found end of input"))),
        }
    }

    fn value(&mut self, depth: usize) -> Result<Value, LiteralError> {
        if depth > MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        self.skip_whitespace();
        match self.peek() {
            Some('{') => self.mapping(depth),
            Some('[') => self.sequence(depth, ']'),
            Some('(') => self.sequence(depth, ')'),
            Some('\'' | '"') => self.string().map(Value::String),
            Some(c) if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => self.number(),
            Some(c) if c.is_alphabetic() => self.keyword(),
            Some(c) => Err(self.error(format!("unexpected character '{c}'"))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn mapping(&mut self, depth: usize) -> Result<Value, LiteralError> {
        self.expect('{')?;
        let mut map = Map::new();
        loop {
            self.skip_whitespace();
            if self.peek() == Some('}') {
                self.pos += 1;
                return Ok(Value::Object(map));
            }

            let key = match self.peek() {
                Some('\'' | '"') => self.string()?,
                _ => return Err(self.error("mapping keys must be strings")),
            };
            self.expect(':')?;
            let value = self.value(depth + 1)?;
            map.insert(key, value);

            self.skip_whitespace();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some('}') => {
                    self.pos += 1;
                    return Ok(Value::Object(map));
                }
                _ => return Err(self.error("expected ',' or '}' in mapping")),
            }
        }
    }

    fn sequence(&mut self, depth: usize, close: char) -> Result<Value, LiteralError> {
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok(Value::Array(items));
            }

            items.push(self.value(depth + 1)?);

            self.skip_whitespace();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(c) if c == close => {
                    self.pos += 1;
                    return Ok(Value::Array(items));
                }
                _ => return Err(self.error(format!("expected ',' or '{close}' in sequence"))),
            }
        }
    }

    fn string(&mut self) -> Result<String, LiteralError> {
        let Some(quote) = self.bump() else {
            return Err(self.error("expected string"));
        };
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => out.push(self.escape()?),
                Some(c) => out.push(c),
            }
        }
    }

    fn escape(&mut self) -> Result<char, LiteralError> {
        match self.bump() {
            Some('n') => Ok('\n'),
            Some('t') => Ok('\t'),
            Some('r') => Ok('\r'),
            Some('0') => Ok('\0'),
            Some('b') => Ok('\u{8}'),
            Some('f') => Ok('\u{c}'),
            Some('u') => self.unicode_escape(),
            Some(c @ ('\\' | '\'' | '"' | '/')) => Ok(c),
            Some(c) => Err(self.error(format!("invalid escape '\\{c}'"))),
            None => Err(self.error("unterminated escape")),
        }
    }

    fn unicode_escape(&mut self) -> Result<char, LiteralError> {
        let high = self.hex4()?;
        if (0xD800..0xDC00).contains(&high) {
            // Surrogate pair, JSON style
            if self.bump() != Some('\\') || self.bump() != Some('u') {
                return Err(self.error("unpaired surrogate in unicode escape"));
            }
            let low = self.hex4()?;
            if !(0xDC00..0xE000).contains(&low) {
                return Err(self.error("invalid low surrogate in unicode escape"));
            }
            let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
            return char::from_u32(code).ok_or_else(|| self.error("invalid unicode escape"));
        }
        char::from_u32(high).ok_or_else(|| self.error("invalid unicode escape"))
    }

    fn hex4(&mut self) -> Result<u32, LiteralError> {
        let mut code = 0u32;
        for _ in 0..4 {
            let digit = self
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error("invalid unicode escape"))?;
            code = code * 16 + digit;
        }
        Ok(code)
    }

    fn number(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E' | '_'))
        {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos]
            .iter()
            .map(|(_, c)| *c)
            .filter(|c| *c != '_')
            .collect();
        let text = text.strip_prefix('+').unwrap_or(&text);

        if let Ok(n) = text.parse::<i64>() {
            return Ok(Value::Number(n.into()));
        }
        text.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| LiteralError {
                offset: self.chars[start].0,
                message: format!("invalid number '{text}'"),
            })
    }

    fn keyword(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().map(|(_, c)| *c).collect();
        match word.as_str() {
            "True" | "true" => Ok(Value::Bool(true)),
            "False" | "false" => Ok(Value::Bool(false)),
            "None" | "null" => Ok(Value::Null),
            _ => Err(LiteralError {
                offset: self.chars[start].0,
                message: format!("unknown identifier '{word}'"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_python_style_mapping() {
        let value = parse_literal("{'prompt': 'a cat', 'style': 'anime'}").unwrap();
        assert_eq!(value, json!({"prompt": "a cat", "style": "anime"}));
    }

    #[test]
    fn test_json_mapping() {
        let value = parse_literal(r#"{"prompt": "a \"quoted\" cat", "n": 2}"#).unwrap();
        assert_eq!(value, json!({"prompt": "a \"quoted\" cat", "n": 2}));
    }

    #[test]
    fn test_mixed_quotes_and_keywords() {
        let value =
            parse_literal(r#"{'a': "it's", "b": True, 'c': None, 'd': [1, 2.5, -3,], 'e': (1,)}"#)
                .unwrap();
        assert_eq!(
            value,
            json!({"a": "it's", "b": true, "c": null, "d": [1, 2.5, -3], "e": [1]})
        );
    }

    #[test]
    fn test_nested_mapping() {
        let value =
            parse_literal("{'name': 'generate_image', 'arguments': {'prompt': 'sunset'}}").unwrap();
        assert_eq!(value["arguments"]["prompt"], "sunset");
    }

    #[test]
    fn test_escapes() {
        let value = parse_literal(r"'line\nbreak é \'q\''").unwrap();
        assert_eq!(value, json!("line\nbreak é 'q'"));
    }

    #[test]
    fn test_code_is_rejected() {
        assert!(parse_literal("__import__('os').system('ls')").is_err());
        assert!(parse_literal("{'a': open('x')}").is_err());
    }

    #[test]
    fn test_malformed_inputs() {
        assert!(parse_literal("").is_err());
        assert!(parse_literal("{'a': 1").is_err());
        assert!(parse_literal("{'a' 1}").is_err());
        assert!(parse_literal("{1: 'a'}").is_err());
        assert!(parse_literal("'unterminated").is_err());
        assert!(parse_literal("{'a': 1} extra").is_err());
    }

    #[test]
    fn test_error_offset() {
        let err = parse_literal("{'a': @}").unwrap_err();
        assert_eq!(err.offset, 6);
    }

    #[test]
    fn test_depth_limit() {
        let deep = "[".repeat(MAX_DEPTH + 5);
        let err = parse_literal(&deep).unwrap_err();
        assert!(err.message.contains("too deep"));
    }
}
