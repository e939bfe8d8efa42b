//! # Literal Parser
//!
//! Filters, projections, pipelines and coordinate lists may arrive either
//! as native JSON structures or as string-encoded literals. This module
//! resolves the string form into `serde_json::Value` once, at the engine
//! boundary, so everything downstream only ever sees native structures.
//!
//! The accepted grammar is a relaxed JSON: single- or double-quoted
//! strings, parenthesized tuples (read as arrays), `True`/`False`/`None`
//! aliases, and trailing commas.

use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Literal parse errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LiteralError {
    /// Unexpected character at the given byte offset
    #[error("unexpected character '{0}' at offset {1}")]
    UnexpectedChar(char, usize),

    /// Input ended mid-literal
    #[error("unexpected end of literal")]
    UnexpectedEnd,

    /// Number could not be parsed
    #[error("malformed number: {0}")]
    BadNumber(String),

    /// Unknown escape sequence inside a string
    #[error("unsupported escape sequence: \\{0}")]
    BadEscape(char),

    /// Trailing characters after a complete literal
    #[error("trailing characters at offset {0}")]
    TrailingData(usize),

    /// Empty input
    #[error("empty literal")]
    Empty,
}

/// Parse a single literal into a JSON value
pub fn parse_literal(text: &str) -> Result<Value, LiteralError> {
    let mut parser = Parser::new(text);
    parser.skip_ws();
    if parser.at_end() {
        return Err(LiteralError::Empty);
    }
    let value = parser.parse_value()?;
    parser.skip_ws();
    if !parser.at_end() {
        return Err(LiteralError::TrailingData(parser.pos));
    }
    Ok(value)
}

/// Parse a comma-separated sequence of literals, e.g. a call argument list
pub fn parse_literal_list(text: &str) -> Result<Vec<Value>, LiteralError> {
    let mut parser = Parser::new(text);
    let mut values = Vec::new();
    parser.skip_ws();
    if parser.at_end() {
        return Ok(values);
    }
    loop {
        values.push(parser.parse_value()?);
        parser.skip_ws();
        match parser.peek() {
            Some(',') => {
                parser.advance();
                parser.skip_ws();
                // trailing comma before end
                if parser.at_end() {
                    break;
                }
            }
            Some(c) => return Err(LiteralError::UnexpectedChar(c, parser.pos)),
            None => break,
        }
    }
    Ok(values)
}

/// Resolve the dual string/native encoding: strings are parsed as
/// literals, everything else passes through untouched.
pub fn decode(value: &Value) -> Result<Value, LiteralError> {
    match value {
        Value::String(text) => parse_literal(text.trim()),
        other => Ok(other.clone()),
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn parse_value(&mut self) -> Result<Value, LiteralError> {
        self.skip_ws();
        match self.peek() {
            None => Err(LiteralError::UnexpectedEnd),
            Some('{') => self.parse_object(),
            Some('[') => self.parse_sequence(']'),
            Some('(') => self.parse_sequence(')'),
            Some('\'') | Some('"') => Ok(Value::String(self.parse_string()?)),
            Some(c) if c == '-' || c == '+' || c.is_ascii_digit() => self.parse_number(),
            Some(_) => self.parse_word(),
        }
    }

    fn parse_object(&mut self) -> Result<Value, LiteralError> {
        self.advance(); // '{'
        let mut map = Map::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some('}') => {
                    self.advance();
                    return Ok(Value::Object(map));
                }
                Some('\'') | Some('"') => {
                    let key = self.parse_string()?;
                    self.skip_ws();
                    match self.advance() {
                        Some(':') => {}
                        Some(c) => return Err(LiteralError::UnexpectedChar(c, self.pos - 1)),
                        None => return Err(LiteralError::UnexpectedEnd),
                    }
                    let value = self.parse_value()?;
                    map.insert(key, value);
                    self.skip_ws();
                    match self.peek() {
                        Some(',') => {
                            self.advance();
                        }
                        Some('}') => {}
                        Some(c) => return Err(LiteralError::UnexpectedChar(c, self.pos)),
                        None => return Err(LiteralError::UnexpectedEnd),
                    }
                }
                Some(c) => return Err(LiteralError::UnexpectedChar(c, self.pos)),
                None => return Err(LiteralError::UnexpectedEnd),
            }
        }
    }

    fn parse_sequence(&mut self, close: char) -> Result<Value, LiteralError> {
        self.advance(); // '[' or '('
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some(c) if c == close => {
                    self.advance();
                    return Ok(Value::Array(items));
                }
                Some(_) => {
                    items.push(self.parse_value()?);
                    self.skip_ws();
                    match self.peek() {
                        Some(',') => {
                            self.advance();
                        }
                        Some(c) if c == close => {}
                        Some(c) => return Err(LiteralError::UnexpectedChar(c, self.pos)),
                        None => return Err(LiteralError::UnexpectedEnd),
                    }
                }
                None => return Err(LiteralError::UnexpectedEnd),
            }
        }
    }

    fn parse_string(&mut self) -> Result<String, LiteralError> {
        let quote = self.advance().ok_or(LiteralError::UnexpectedEnd)?;
        let mut out = String::new();
        loop {
            match self.advance() {
                None => return Err(LiteralError::UnexpectedEnd),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => match self.advance() {
                    None => return Err(LiteralError::UnexpectedEnd),
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some('\\') => out.push('\\'),
                    Some('\'') => out.push('\''),
                    Some('"') => out.push('"'),
                    Some('u') => {
                        let mut code = 0u32;
                        for _ in 0..4 {
                            let d = self.advance().ok_or(LiteralError::UnexpectedEnd)?;
                            let digit = d.to_digit(16).ok_or(LiteralError::BadEscape(d))?;
                            code = code * 16 + digit;
                        }
                        out.push(char::from_u32(code).ok_or(LiteralError::BadEscape('u'))?);
                    }
                    Some(c) => return Err(LiteralError::BadEscape(c)),
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn parse_number(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        if matches!(self.peek(), Some('-') | Some('+')) {
            self.advance();
        }
        let mut is_float = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => {
                    self.advance();
                }
                '.' | 'e' | 'E' => {
                    is_float = true;
                    self.advance();
                    if matches!(self.peek(), Some('-') | Some('+')) {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
        let raw: String = self.chars[start..self.pos].iter().collect();
        let raw = raw.strip_prefix('+').unwrap_or(&raw).to_string();
        if is_float {
            let f: f64 = raw
                .parse()
                .map_err(|_| LiteralError::BadNumber(raw.clone()))?;
            Number::from_f64(f)
                .map(Value::Number)
                .ok_or(LiteralError::BadNumber(raw))
        } else {
            let i: i64 = raw
                .parse()
                .map_err(|_| LiteralError::BadNumber(raw.clone()))?;
            Ok(Value::Number(Number::from(i)))
        }
    }

    fn parse_word(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.advance();
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        match word.as_str() {
            "true" | "True" => Ok(Value::Bool(true)),
            "false" | "False" => Ok(Value::Bool(false)),
            "null" | "None" => Ok(Value::Null),
            _ => Err(LiteralError::UnexpectedChar(
                self.chars.get(start).copied().unwrap_or('?'),
                start,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_json() {
        assert_eq!(
            parse_literal(r#"{"a": 1, "b": [2, 3.5]}"#).unwrap(),
            json!({"a": 1, "b": [2, 3.5]})
        );
    }

    #[test]
    fn test_single_quotes_and_tuples() {
        assert_eq!(
            parse_literal("[('10:30:00', '+20:15:30')]").unwrap(),
            json!([["10:30:00", "+20:15:30"]])
        );
        assert_eq!(
            parse_literal("{'field': 'value'}").unwrap(),
            json!({"field": "value"})
        );
    }

    #[test]
    fn test_python_constants() {
        assert_eq!(
            parse_literal("{'a': True, 'b': False, 'c': None}").unwrap(),
            json!({"a": true, "b": false, "c": null})
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(parse_literal("-12").unwrap(), json!(-12));
        assert_eq!(parse_literal("+3.25").unwrap(), json!(3.25));
        assert_eq!(parse_literal("1e3").unwrap(), json!(1000.0));
    }

    #[test]
    fn test_trailing_comma() {
        assert_eq!(parse_literal("[1, 2,]").unwrap(), json!([1, 2]));
        assert_eq!(parse_literal("{'a': 1,}").unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_malformed_inputs() {
        assert!(matches!(parse_literal(""), Err(LiteralError::Empty)));
        assert!(matches!(
            parse_literal("{'a': }"),
            Err(LiteralError::UnexpectedChar('}', _))
        ));
        assert!(matches!(
            parse_literal("[1 2]"),
            Err(LiteralError::UnexpectedChar('2', _))
        ));
        assert!(matches!(
            parse_literal("{} extra"),
            Err(LiteralError::TrailingData(_))
        ));
        assert!(matches!(parse_literal("[1,"), Err(LiteralError::UnexpectedEnd)));
        assert!(matches!(
            parse_literal("bogus"),
            Err(LiteralError::UnexpectedChar('b', 0))
        ));
    }

    #[test]
    fn test_literal_list() {
        let args = parse_literal_list("{'a': 1}, {'b': 0}").unwrap();
        assert_eq!(args, vec![json!({"a": 1}), json!({"b": 0})]);
        assert!(parse_literal_list("").unwrap().is_empty());
    }

    #[test]
    fn test_decode_passthrough_and_string() {
        assert_eq!(decode(&json!({"x": 1})).unwrap(), json!({"x": 1}));
        assert_eq!(decode(&json!("{'x': 1}")).unwrap(), json!({"x": 1}));
        assert!(decode(&json!("not a literal")).is_err());
    }
}
