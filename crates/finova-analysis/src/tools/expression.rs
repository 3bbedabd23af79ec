//! Arithmetic expression evaluator
//!
//! Evaluates expressions like:
//! - `1,720 - 970`
//! - `(750 / 1720) * 100`
//! - `sqrt(16) + 2^3`
//! - `15% * 200`
//!
//! Nothing is ever executed beyond the arithmetic below; unknown names are
//! rejected.

use std::f64::consts::{E, PI};
use std::fmt;
use thiserror::Error;

use super::calculations::round_to;

/// Why an expression could not be evaluated
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    #[error("empty expression")]
    Empty,

    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unknown function or constant '{0}'")]
    Unknown(String),

    #[error("{name} expects {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: &'static str,
        got: usize,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("result is not a finite number")]
    NonFinite,
}

type Result<T> = std::result::Result<T, ExpressionError>;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Op(char),
    LParen,
    RParen,
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Num(v) => write!(f, "{v}"),
            Token::Ident(name) => f.write_str(name),
            Token::Op(op) => write!(f, "{op}"),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::Comma => f.write_str(","),
        }
    }
}

/// Evaluate an arithmetic expression to a finite number
///
/// ```
/// use finova_analysis::tools::expression::evaluate;
///
/// assert_eq!(evaluate("1,720 - 970").unwrap(), 750.0);
/// assert_eq!(evaluate("round(750 / 1720 * 100, 2)").unwrap(), 43.6);
/// assert!(evaluate("1 / 0").is_err());
/// ```
pub fn evaluate(input: &str) -> Result<f64> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(ExpressionError::Empty);
    }

    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.expression()?;
    if let Some(token) = parser.peek() {
        return Err(ExpressionError::UnexpectedToken(token.to_string()));
    }
    finite(value)
}

fn finite(value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ExpressionError::NonFinite)
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    // open parens, true for function-call parens where ',' separates arguments
    let mut parens: Vec<bool> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() || matches!(c, '$' | '€' | '£') => i += 1,
            '0'..='9' | '.' => {
                let grouping = !parens.last().copied().unwrap_or(false);
                let (value, next) = lex_number(&chars, i, grouping)?;
                tokens.push(Token::Num(value));
                i = next;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let name: String = chars[start..i].iter().collect();
                tokens.push(Token::Ident(name.to_lowercase()));
            }
            '(' => {
                parens.push(matches!(tokens.last(), Some(Token::Ident(_))));
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                parens.pop();
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::Op('^'));
                i += 2;
            }
            '+' | '-' | '*' | '/' | '^' | '%' => {
                tokens.push(Token::Op(c));
                i += 1;
            }
            '×' => {
                tokens.push(Token::Op('*'));
                i += 1;
            }
            '÷' => {
                tokens.push(Token::Op('/'));
                i += 1;
            }
            '−' => {
                tokens.push(Token::Op('-'));
                i += 1;
            }
            other => return Err(ExpressionError::UnexpectedChar(other)),
        }
    }

    Ok(tokens)
}

fn lex_number(chars: &[char], start: usize, grouping: bool) -> Result<(f64, usize)> {
    let mut text = String::new();
    let mut seen_dot = false;
    let mut i = start;

    while let Some(&c) = chars.get(i) {
        if c.is_ascii_digit() {
            text.push(c);
        } else if c == '.' && !seen_dot {
            seen_dot = true;
            text.push(c);
        } else if c == ',' && grouping && !seen_dot && !text.is_empty() && is_group(chars, i) {
            // thousands separator
        } else {
            break;
        }
        i += 1;
    }

    if matches!(chars.get(i), Some('e' | 'E')) {
        let mut j = i + 1;
        let mut exponent = String::from("e");
        if let Some(&sign @ ('+' | '-')) = chars.get(j) {
            exponent.push(sign);
            j += 1;
        }
        if chars.get(j).is_some_and(char::is_ascii_digit) {
            while let Some(&d) = chars.get(j).filter(|d| d.is_ascii_digit()) {
                exponent.push(d);
                j += 1;
            }
            text.push_str(&exponent);
            i = j;
        }
    }

    text.parse::<f64>()
        .map(|value| (value, i))
        .map_err(|_| ExpressionError::InvalidNumber(text))
}

/// A comma followed by exactly three digits
fn is_group(chars: &[char], comma: usize) -> bool {
    (1..=3).all(|k| chars.get(comma + k).is_some_and(char::is_ascii_digit))
        && !chars.get(comma + 4).is_some_and(char::is_ascii_digit)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn operand_at(&self, offset: usize) -> bool {
        matches!(
            self.tokens.get(self.pos + offset),
            Some(Token::Num(_) | Token::Ident(_) | Token::LParen)
        )
    }

    fn expression(&mut self) -> Result<f64> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Op('+')) => {
                    self.pos += 1;
                    value += self.term()?;
                }
                Some(Token::Op('-')) => {
                    self.pos += 1;
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn term(&mut self) -> Result<f64> {
        let mut value = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Op('*')) => {
                    self.pos += 1;
                    value *= self.unary()?;
                }
                Some(Token::Op('/')) => {
                    self.pos += 1;
                    let divisor = self.unary()?;
                    if divisor == 0.0 {
                        return Err(ExpressionError::DivisionByZero);
                    }
                    value /= divisor;
                }
                // modulo only when an operand follows, otherwise postfix percent
                Some(Token::Op('%')) if self.operand_at(1) => {
                    self.pos += 1;
                    let divisor = self.unary()?;
                    if divisor == 0.0 {
                        return Err(ExpressionError::DivisionByZero);
                    }
                    value -= divisor * (value / divisor).floor();
                }
                _ => return Ok(value),
            }
        }
    }

    fn unary(&mut self) -> Result<f64> {
        match self.peek() {
            Some(Token::Op('-')) => {
                self.pos += 1;
                Ok(-self.unary()?)
            }
            Some(Token::Op('+')) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<f64> {
        let base = self.postfix()?;
        if matches!(self.peek(), Some(Token::Op('^'))) {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn postfix(&mut self) -> Result<f64> {
        let mut value = self.primary()?;
        while matches!(self.peek(), Some(Token::Op('%'))) && !self.operand_at(1) {
            self.pos += 1;
            value /= 100.0;
        }
        Ok(value)
    }

    fn primary(&mut self) -> Result<f64> {
        match self.advance() {
            Some(Token::Num(value)) => Ok(value),
            Some(Token::LParen) => {
                let value = self.expression()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(value),
                    Some(token) => Err(ExpressionError::UnexpectedToken(token.to_string())),
                    None => Err(ExpressionError::UnexpectedEnd),
                }
            }
            Some(Token::Ident(name)) => {
                if matches!(self.peek(), Some(Token::LParen)) {
                    self.pos += 1;
                    let args = self.arguments()?;
                    call(&name, &args)
                } else {
                    constant(&name)
                }
            }
            Some(token) => Err(ExpressionError::UnexpectedToken(token.to_string())),
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }

    fn arguments(&mut self) -> Result<Vec<f64>> {
        let mut args = Vec::new();
        if matches!(self.peek(), Some(Token::RParen)) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            match self.advance() {
                Some(Token::Comma) => {}
                Some(Token::RParen) => return Ok(args),
                Some(token) => return Err(ExpressionError::UnexpectedToken(token.to_string())),
                None => return Err(ExpressionError::UnexpectedEnd),
            }
        }
    }
}

fn constant(name: &str) -> Result<f64> {
    match name {
        "pi" => Ok(PI),
        "e" => Ok(E),
        _ => Err(ExpressionError::Unknown(name.to_string())),
    }
}

fn call(name: &str, args: &[f64]) -> Result<f64> {
    let arity = |expected: &'static str| ExpressionError::Arity {
        name: name.to_string(),
        expected,
        got: args.len(),
    };
    let single = |f: fn(f64) -> f64| match args {
        [x] => Ok(f(*x)),
        _ => Err(arity("1")),
    };

    let value = match name {
        "sqrt" => single(f64::sqrt)?,
        "abs" => single(f64::abs)?,
        "ln" => single(f64::ln)?,
        "log10" => single(f64::log10)?,
        "exp" => single(f64::exp)?,
        "floor" => single(f64::floor)?,
        "ceil" => single(f64::ceil)?,
        "log" => match args {
            [x] => x.ln(),
            [x, base] => x.log(*base),
            _ => return Err(arity("1 or 2")),
        },
        "round" => match args {
            [x] => x.round(),
            [x, places] => round_to(*x, *places as i32),
            _ => return Err(arity("1 or 2")),
        },
        "pow" => match args {
            [base, exponent] => base.powf(*exponent),
            _ => return Err(arity("2")),
        },
        "min" | "max" => {
            let (first, rest) = args.split_first().ok_or_else(|| arity("at least 1"))?;
            let pick = if name == "min" { f64::min } else { f64::max };
            rest.iter().fold(*first, |acc, v| pick(acc, *v))
        }
        _ => return Err(ExpressionError::Unknown(name.to_string())),
    };
    finite(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(input: &str) -> f64 {
        evaluate(input).unwrap()
    }

    #[test]
    fn test_precedence() {
        assert_eq!(eval("2 + 3 * 4"), 14.0);
        assert_eq!(eval("(2 + 3) * 4"), 20.0);
        assert_eq!(eval("2 ^ 3 ^ 2"), 512.0);
        assert_eq!(eval("2 ** 10"), 1024.0);
        assert_eq!(eval("-2 ^ 2"), -4.0);
        assert_eq!(eval("10 - -3"), 13.0);
    }

    #[test]
    fn test_thousands_separators() {
        assert_eq!(eval("1,720 - 970"), 750.0);
        assert_eq!(eval("$1,234,567.5 + 0.5"), 1_234_568.0);
        assert_eq!(eval("(1,000) * 2"), 2000.0);
        // inside a call the comma separates arguments
        assert_eq!(eval("max(1,000)"), 1.0);
    }

    #[test]
    fn test_percent_and_modulo() {
        assert_eq!(eval("15% * 200"), 30.0);
        assert_eq!(eval("50%"), 0.5);
        assert_eq!(eval("7 % 3"), 1.0);
        assert_eq!(eval("-7 % 3"), 2.0);
    }

    #[test]
    fn test_functions() {
        assert_eq!(eval("sqrt(16) + abs(-2)"), 6.0);
        assert_eq!(eval("round(2.346, 2)"), 2.35);
        assert_eq!(eval("min(3, 1, 2) + max(3, 1, 2)"), 4.0);
        assert!((eval("log10(1000)") - 3.0).abs() < 1e-12);
        assert!((eval("ln(e)") - 1.0).abs() < 1e-12);
        assert_eq!(eval("pow(2, 5)"), 32.0);
        assert_eq!(eval("floor(2.7) + ceil(2.1)"), 5.0);
        assert_eq!(eval("1.5e3 × 2 ÷ 3"), 1000.0);
        assert!((eval("2 * pi") - 6.283_185).abs() < 1e-6);
    }

    #[test]
    fn test_rejections() {
        assert_eq!(evaluate(""), Err(ExpressionError::Empty));
        assert_eq!(evaluate("1 / 0"), Err(ExpressionError::DivisionByZero));
        assert_eq!(evaluate("sqrt(-1)"), Err(ExpressionError::NonFinite));
        assert_eq!(
            evaluate("import(1)"),
            Err(ExpressionError::Unknown("import".to_string()))
        );
        assert!(matches!(evaluate("2 +"), Err(ExpressionError::UnexpectedEnd)));
        assert!(matches!(evaluate("(1 + 2"), Err(ExpressionError::UnexpectedEnd)));
        assert!(matches!(evaluate("1 2"), Err(ExpressionError::UnexpectedToken(_))));
        assert!(matches!(evaluate("2 # 3"), Err(ExpressionError::UnexpectedChar('#'))));
        assert!(matches!(evaluate("pow(2)"), Err(ExpressionError::Arity { .. })));
        assert!(evaluate("10 ^ 400").is_err());
    }
}
