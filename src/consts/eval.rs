//! Constant folding for `const` right-hand sides.
//!
//! A small recursive-descent evaluator over numbers, double-quoted strings,
//! `+ - * /`, unary signs and parentheses:
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := factor (('*' | '/') factor)*
//! factor := '(' expr ')' | ('+' | '-') factor | string | number
//! ```
//!
//! Anything else (identifiers, calls, arrays) is simply not evaluable and the
//! caller falls back to a runtime-initialised constant. Evaluation never
//! reports an error.

use std::fmt;

/// A folded value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Str(String),
}

impl Value {
    /// Renders the value as a GML literal.
    ///
    /// Strings are escaped so the literal never spans more than one line.
    pub fn to_literal(&self) -> String {
        match self {
            Value::Number(n) => format_number(*n),
            Value::Str(s) => {
                let mut literal = String::with_capacity(s.len() + 2);
                literal.push('"');
                for c in s.chars() {
                    match c {
                        '\\' => literal.push_str("\\\\"),
                        '"' => literal.push_str("\\\""),
                        '\n' => literal.push_str("\\n"),
                        '\r' => literal.push_str("\\r"),
                        '\t' => literal.push_str("\\t"),
                        other => literal.push(other),
                    }
                }
                literal.push('"');
                literal
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_literal())
    }
}

/// Folds `text` into a literal, or `None` when it is not a closed constant
/// expression.
///
/// ```rust
/// use sketchy::consts::eval::evaluate;
///
/// assert_eq!(evaluate("7 * (3 + 4)").as_deref(), Some("49"));
/// assert_eq!(evaluate("\"hp: \" + 10").as_deref(), Some("\"hp: 10\""));
/// assert_eq!(evaluate("width * 2"), None);
/// ```
pub fn evaluate(text: &str) -> Option<String> {
    evaluate_value(text).map(|value| value.to_literal())
}

/// Like [`evaluate`] but returns the typed value.
pub fn evaluate_value(text: &str) -> Option<Value> {
    let mut parser = Parser { text, pos: 0 };
    let value = parser.expression()?;
    parser.skip_spaces();
    if parser.pos != text.len() {
        return None;
    }
    match value {
        Value::Number(n) if !n.is_finite() => None,
        value => Some(value),
    }
}

/// Shortest text that parses back to the same `f64`.
fn format_number(n: f64) -> String {
    if n == 0.0 {
        // Avoid `-0`.
        return "0".to_string();
    }
    format!("{n}")
}

// ============================================================================
// PARSER
// ============================================================================

struct Parser<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    fn skip_spaces(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.pos += 1;
        }
    }

    fn expression(&mut self) -> Option<Value> {
        let mut lhs = self.term()?;
        loop {
            self.skip_spaces();
            let op = match self.peek() {
                Some(op @ (b'+' | b'-')) => op,
                _ => return Some(lhs),
            };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = apply(lhs, op, rhs)?;
        }
    }

    fn term(&mut self) -> Option<Value> {
        let mut lhs = self.factor()?;
        loop {
            self.skip_spaces();
            let op = match self.peek() {
                Some(op @ (b'*' | b'/')) => op,
                _ => return Some(lhs),
            };
            self.pos += 1;
            let rhs = self.factor()?;
            lhs = apply(lhs, op, rhs)?;
        }
    }

    fn factor(&mut self) -> Option<Value> {
        self.skip_spaces();
        match self.peek()? {
            b'(' => {
                self.pos += 1;
                let inner = self.expression()?;
                self.skip_spaces();
                if self.peek() != Some(b')') {
                    return None;
                }
                self.pos += 1;
                Some(inner)
            }
            sign @ (b'+' | b'-') => {
                self.pos += 1;
                match self.factor()? {
                    Value::Number(n) if sign == b'-' => Some(Value::Number(-n)),
                    Value::Number(n) => Some(Value::Number(n)),
                    Value::Str(_) => None,
                }
            }
            b'"' => self.string().map(Value::Str),
            b'0'..=b'9' | b'.' => self.number().map(Value::Number),
            _ => None,
        }
    }

    /// Digits with at most one `.`; a leading `.` is allowed.
    fn number(&mut self) -> Option<f64> {
        let start = self.pos;
        let mut seen_dot = false;
        let mut seen_digit = false;
        while let Some(c) = self.peek() {
            match c {
                b'0'..=b'9' => seen_digit = true,
                b'.' if !seen_dot => seen_dot = true,
                _ => break,
            }
            self.pos += 1;
        }
        if !seen_digit {
            return None;
        }
        self.text[start..self.pos].parse().ok()
    }

    /// Double-quoted string. Known escapes are decoded; unknown ones are kept
    /// as written.
    fn string(&mut self) -> Option<String> {
        self.pos += 1;
        let mut value = String::new();
        let mut chars = self.text[self.pos..].char_indices();
        while let Some((offset, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos += offset + 1;
                    return Some(value);
                }
                '\\' => {
                    let (_, escaped) = chars.next()?;
                    match escaped {
                        'n' => value.push('\n'),
                        'r' => value.push('\r'),
                        't' => value.push('\t'),
                        '\\' => value.push('\\'),
                        '"' => value.push('"'),
                        other => {
                            value.push('\\');
                            value.push(other);
                        }
                    }
                }
                other => value.push(other),
            }
        }
        None
    }
}

fn apply(lhs: Value, op: u8, rhs: Value) -> Option<Value> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => Some(Value::Number(match op {
            b'+' => a + b,
            b'-' => a - b,
            b'*' => a * b,
            b'/' => a / b,
            _ => return None,
        })),
        (Value::Str(a), Value::Str(b)) if op == b'+' => Some(Value::Str(a + &b)),
        (Value::Str(a), Value::Number(b)) if op == b'+' => Some(Value::Str(a + &format_number(b))),
        (Value::Number(a), Value::Str(b)) if op == b'+' => Some(Value::Str(format_number(a) + &b)),
        _ => None,
    }
}
