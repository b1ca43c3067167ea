//! Arithmetic evaluator behind `{{#expr:}}` and `{{#ifexpr:}}`.
//!
//! A small recursive-descent parser. Precedence, lowest first:
//! `or`, `and`, comparisons, `round`, `+ -`, `* / div mod fmod`, `^`, then
//! prefix operators (`-`, `+`, `not`, `abs`, `floor`, `ceil`, `trunc`,
//! `sqrt`, `ln`, `exp`, `sin`, `cos`, `tan`). Comparisons and logical
//! operators yield `1` or `0`.

use std::fmt;

/// Maximum nesting of parentheses and prefix operators.
const MAX_NESTING: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub enum ExprError {
    UnexpectedChar(char),
    UnexpectedToken(String),
    UnexpectedEnd,
    UnrecognizedWord(String),
    DivisionByZero,
    InvalidArgument(&'static str),
    TooDeep,
}

impl fmt::Display for ExprError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprError::UnexpectedChar(c) => {
                write!(f, "Expression error: Unrecognized punctuation character \"{}\".", c)
            }
            ExprError::UnexpectedToken(t) => write!(f, "Expression error: Unexpected {}.", t),
            ExprError::UnexpectedEnd => write!(f, "Expression error: Missing operand."),
            ExprError::UnrecognizedWord(w) => {
                write!(f, "Expression error: Unrecognized word \"{}\".", w)
            }
            ExprError::DivisionByZero => write!(f, "Division by zero."),
            ExprError::InvalidArgument(func) => {
                write!(f, "Expression error: Invalid argument for {}.", func)
            }
            ExprError::TooDeep => write!(f, "Expression error: Stack exhausted."),
        }
    }
}

impl std::error::Error for ExprError {}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Word(String),
    Op(&'static str),
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Num(_) => "number".to_string(),
            Token::Word(w) => format!("\"{}\" operator", w),
            Token::Op(o) => format!("\"{}\" operator", o),
            Token::LParen => "opening bracket".to_string(),
            Token::RParen => "closing bracket".to_string(),
        }
    }
}

const TWO_CHAR_OPS: &[&str] = &["<=", ">=", "<>", "!="];

fn tokenize(input: &str) -> Result<Vec<Token>, ExprError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() || c == '.' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            // exponent suffix: 2e3, 1.5e-2
            if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                let mut j = i + 1;
                if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                    j += 1;
                }
                if j < chars.len() && chars[j].is_ascii_digit() {
                    while j < chars.len() && chars[j].is_ascii_digit() {
                        j += 1;
                    }
                    i = j;
                }
            }
            let text: String = chars[start..i].iter().collect();
            let value = text
                .parse::<f64>()
                .map_err(|_| ExprError::UnexpectedToken("number".to_string()))?;
            tokens.push(Token::Num(value));
        } else if c.is_alphabetic() {
            let start = i;
            while i < chars.len() && chars[i].is_alphabetic() {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect::<String>().to_lowercase();
            tokens.push(Token::Word(word));
        } else if c == '(' {
            tokens.push(Token::LParen);
            i += 1;
        } else if c == ')' {
            tokens.push(Token::RParen);
            i += 1;
        } else {
            let pair: String = chars[i..(i + 2).min(chars.len())].iter().collect();
            if let Some(op) = TWO_CHAR_OPS.iter().find(|o| **o == pair) {
                tokens.push(Token::Op(op));
                i += 2;
                continue;
            }
            let op = match c {
                '+' => "+",
                '-' | '\u{2212}' => "-",
                '*' | '\u{00d7}' => "*",
                '/' | '\u{00f7}' => "/",
                '^' => "^",
                '=' => "=",
                '<' => "<",
                '>' => ">",
                other => return Err(ExprError::UnexpectedChar(other)),
            };
            tokens.push(Token::Op(op));
            i += 1;
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_is_op(&self, op: &str) -> bool {
        matches!(self.peek(), Some(Token::Op(o)) if *o == op)
    }

    fn peek_is_word(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w == word)
    }

    fn descend(&mut self) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(ExprError::TooDeep);
        }
        Ok(())
    }

    fn or(&mut self) -> Result<f64, ExprError> {
        let mut lhs = self.and()?;
        while self.peek_is_word("or") {
            self.pos += 1;
            let rhs = self.and()?;
            lhs = bool_num(lhs != 0.0 || rhs != 0.0);
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<f64, ExprError> {
        let mut lhs = self.comparison()?;
        while self.peek_is_word("and") {
            self.pos += 1;
            let rhs = self.comparison()?;
            lhs = bool_num(lhs != 0.0 && rhs != 0.0);
        }
        Ok(lhs)
    }

    fn comparison(&mut self) -> Result<f64, ExprError> {
        let mut lhs = self.round()?;
        while let Some(Token::Op(op)) = self.peek() {
            let op = *op;
            if !matches!(op, "=" | "<>" | "!=" | "<" | ">" | "<=" | ">=") {
                break;
            }
            self.pos += 1;
            let rhs = self.round()?;
            lhs = bool_num(match op {
                "=" => lhs == rhs,
                "<>" | "!=" => lhs != rhs,
                "<" => lhs < rhs,
                ">" => lhs > rhs,
                "<=" => lhs <= rhs,
                _ => lhs >= rhs,
            });
        }
        Ok(lhs)
    }

    fn round(&mut self) -> Result<f64, ExprError> {
        let mut lhs = self.additive()?;
        while self.peek_is_word("round") {
            self.pos += 1;
            let digits = self.additive()?.trunc();
            let factor = 10f64.powi(digits.clamp(-300.0, 300.0) as i32);
            lhs = (lhs * factor).round() / factor;
        }
        Ok(lhs)
    }

    fn additive(&mut self) -> Result<f64, ExprError> {
        let mut lhs = self.multiplicative()?;
        loop {
            if self.peek_is_op("+") {
                self.pos += 1;
                lhs += self.multiplicative()?;
            } else if self.peek_is_op("-") {
                self.pos += 1;
                lhs -= self.multiplicative()?;
            } else {
                return Ok(lhs);
            }
        }
    }

    fn multiplicative(&mut self) -> Result<f64, ExprError> {
        let mut lhs = self.power()?;
        loop {
            if self.peek_is_op("*") {
                self.pos += 1;
                lhs *= self.power()?;
            } else if self.peek_is_op("/") || self.peek_is_word("div") {
                self.pos += 1;
                let rhs = self.power()?;
                if rhs == 0.0 {
                    return Err(ExprError::DivisionByZero);
                }
                lhs /= rhs;
            } else if self.peek_is_word("mod") {
                self.pos += 1;
                let rhs = self.power()?.trunc() as i64;
                if rhs == 0 {
                    return Err(ExprError::DivisionByZero);
                }
                lhs = ((lhs.trunc() as i64) % rhs) as f64;
            } else if self.peek_is_word("fmod") {
                self.pos += 1;
                let rhs = self.power()?;
                if rhs == 0.0 {
                    return Err(ExprError::DivisionByZero);
                }
                lhs %= rhs;
            } else {
                return Ok(lhs);
            }
        }
    }

    fn power(&mut self) -> Result<f64, ExprError> {
        let base = self.unary()?;
        if self.peek_is_op("^") {
            self.pos += 1;
            self.descend()?;
            let exponent = self.power()?;
            self.depth -= 1;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn unary(&mut self) -> Result<f64, ExprError> {
        let Some(token) = self.peek().cloned() else {
            return Err(ExprError::UnexpectedEnd);
        };
        match token {
            Token::Op("-") | Token::Op("+") => {
                self.pos += 1;
                self.descend()?;
                let v = self.unary()?;
                self.depth -= 1;
                Ok(if token == Token::Op("-") { -v } else { v })
            }
            Token::Word(ref w) if is_prefix_function(w) => {
                self.pos += 1;
                self.descend()?;
                let v = self.unary()?;
                self.depth -= 1;
                apply_function(w, v)
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<f64, ExprError> {
        let Some(token) = self.peek().cloned() else {
            return Err(ExprError::UnexpectedEnd);
        };
        self.pos += 1;
        match token {
            Token::Num(v) => Ok(v),
            Token::Word(w) => match w.as_str() {
                "pi" => Ok(std::f64::consts::PI),
                "e" => Ok(std::f64::consts::E),
                "and" | "or" | "mod" | "div" | "round" | "fmod" => {
                    Err(ExprError::UnexpectedToken(Token::Word(w).describe()))
                }
                _ => Err(ExprError::UnrecognizedWord(w)),
            },
            Token::LParen => {
                self.descend()?;
                let v = self.or()?;
                self.depth -= 1;
                match self.peek() {
                    Some(Token::RParen) => {
                        self.pos += 1;
                        Ok(v)
                    }
                    Some(other) => Err(ExprError::UnexpectedToken(other.describe())),
                    None => Err(ExprError::UnexpectedEnd),
                }
            }
            other => Err(ExprError::UnexpectedToken(other.describe())),
        }
    }
}

fn is_prefix_function(w: &str) -> bool {
    matches!(
        w,
        "not" | "abs" | "floor" | "ceil" | "trunc" | "sqrt" | "ln" | "exp" | "sin" | "cos" | "tan"
    )
}

fn apply_function(name: &str, v: f64) -> Result<f64, ExprError> {
    Ok(match name {
        "not" => bool_num(v == 0.0),
        "abs" => v.abs(),
        "floor" => v.floor(),
        "ceil" => v.ceil(),
        "trunc" => v.trunc(),
        "sqrt" if v < 0.0 => return Err(ExprError::InvalidArgument("sqrt")),
        "sqrt" => v.sqrt(),
        "ln" if v <= 0.0 => return Err(ExprError::InvalidArgument("ln")),
        "ln" => v.ln(),
        "exp" => v.exp(),
        "sin" => v.sin(),
        "cos" => v.cos(),
        _ => v.tan(),
    })
}

fn bool_num(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

/// Evaluate an expression. An empty (or all-whitespace) expression yields
/// `None`, which renders as empty text.
pub fn evaluate(input: &str) -> Result<Option<f64>, ExprError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Ok(None);
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.or()?;
    match parser.peek() {
        None => Ok(Some(value)),
        Some(extra) => Err(ExprError::UnexpectedToken(extra.describe())),
    }
}

/// Render a number the way `#expr` prints it: integers without a fraction,
/// other values with trailing zeros removed.
pub fn format_number(v: f64) -> String {
    if v.is_nan() {
        return "NAN".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "INF" } else { "-INF" }.to_string();
    }
    if v.fract() == 0.0 && v.abs() < 1e15 {
        // avoid "-0"
        return format!("{}", v as i64);
    }
    let s = format!("{:.10}", v);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    s.to_string()
}

/// Evaluate and render in one step.
pub fn eval_to_string(input: &str) -> Result<String, ExprError> {
    Ok(evaluate(input)?.map(format_number).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(s: &str) -> String {
        eval_to_string(s).unwrap()
    }

    #[test]
    fn arithmetic_and_precedence() {
        assert_eq!(ev("1 + 2 * 3"), "7");
        assert_eq!(ev("(1 + 2) * 3"), "9");
        assert_eq!(ev("2 ^ 3 ^ 2"), "512");
        assert_eq!(ev("7 mod 3"), "1");
        assert_eq!(ev("10 / 4"), "2.5");
        assert_eq!(ev("-2 ^ 2"), "4");
    }

    #[test]
    fn comparisons_and_logic() {
        assert_eq!(ev("3 > 2"), "1");
        assert_eq!(ev("3 = 2"), "0");
        assert_eq!(ev("1 and 0 or 1"), "1");
        assert_eq!(ev("not 0"), "1");
        assert_eq!(ev("2 <> 2"), "0");
    }

    #[test]
    fn functions_and_round() {
        assert_eq!(ev("abs -5"), "5");
        assert_eq!(ev("floor 2.7"), "2");
        assert_eq!(ev("3.14159 round 2"), "3.14");
        assert_eq!(ev("2e3"), "2000");
    }

    #[test]
    fn empty_is_empty() {
        assert_eq!(ev("   "), "");
    }

    #[test]
    fn errors() {
        assert_eq!(evaluate("1 / 0"), Err(ExprError::DivisionByZero));
        assert_eq!(evaluate("1 +"), Err(ExprError::UnexpectedEnd));
        assert_eq!(
            evaluate("foo"),
            Err(ExprError::UnrecognizedWord("foo".to_string()))
        );
        assert!(evaluate("(1").is_err());
        assert!(evaluate("1 2").is_err());
        assert!(evaluate("1 # 2").is_err());
    }

    #[test]
    fn deep_nesting_is_bounded() {
        let s = format!("{}1{}", "(".repeat(500), ")".repeat(500));
        assert_eq!(evaluate(&s), Err(ExprError::TooDeep));
    }

    #[test]
    fn error_message_shape() {
        let msg = ExprError::UnrecognizedWord("x".into()).to_string();
        assert!(msg.starts_with("Expression error"));
    }
}
