//! Math operations: expression evaluation and descriptive statistics

use crate::params::{as_f64, require_array, require_str};
use crate::registry::Operation;
use planchain_core::{OperationOutput, OperationSchema, ParamDef, ParamType, Params, Result};
use serde_json::json;
use std::iter::Peekable;
use std::str::Chars;

const CATEGORY: &str = "math_operations";

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    FloorDiv,
    Percent,
    Pow,
    LParen,
    RParen,
    Comma,
}

fn tokenize(expr: &str) -> std::result::Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars: Peekable<Chars> = expr.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '0'..='9' | '.' => {
                let mut num = String::new();
                while let Some(&d) = chars.peek() {
                    let exponent_sign = (d == '+' || d == '-') && num.ends_with(['e', 'E']);
                    if d.is_ascii_digit() || d == '.' || d == 'e' || d == 'E' || exponent_sign {
                        num.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = num
                    .parse()
                    .map_err(|_| format!("invalid number '{}'", num))?;
                tokens.push(Token::Num(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_alphanumeric() || d == '_' {
                        name.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(name));
            }
            _ => {
                chars.next();
                let token = match c {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' if chars.peek() == Some(&'*') => {
                        chars.next();
                        Token::Pow
                    }
                    '*' => Token::Star,
                    '/' if chars.peek() == Some(&'/') => {
                        chars.next();
                        Token::FloorDiv
                    }
                    '/' => Token::Slash,
                    '%' => Token::Percent,
                    '^' => Token::Pow,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    ',' => Token::Comma,
                    other => return Err(format!("unexpected character '{}'", other)),
                };
                tokens.push(token);
            }
        }
    }
    Ok(tokens)
}

/// Recursive descent over
///
/// ```text
/// expr   := term (('+' | '-') term)*
/// term   := unary (('*' | '/' | '//' | '%') unary)*
/// unary  := ('+' | '-') unary | power
/// power  := atom (('**' | '^') unary)?
/// atom   := number | name | name '(' args ')' | '(' expr ')'
/// ```
struct Evaluator {
    tokens: Vec<Token>,
    pos: usize,
}

impl Evaluator {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn expect(&mut self, token: Token) -> std::result::Result<(), String> {
        match self.next() {
            Some(t) if t == token => Ok(()),
            Some(t) => Err(format!("expected {:?}, found {:?}", token, t)),
            None => Err(format!("expected {:?} at end of expression", token)),
        }
    }

    fn expr(&mut self) -> std::result::Result<f64, String> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    value += self.term()?;
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn term(&mut self) -> std::result::Result<f64, String> {
        let mut value = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(t @ (Token::Star | Token::Slash | Token::FloorDiv | Token::Percent)) => {
                    t.clone()
                }
                _ => return Ok(value),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            if op != Token::Star && rhs == 0.0 {
                return Err("division by zero".to_string());
            }
            value = match op {
                Token::Star => value * rhs,
                Token::Slash => value / rhs,
                Token::FloorDiv => (value / rhs).floor(),
                // Sign follows the divisor.
                _ => value - rhs * (value / rhs).floor(),
            };
        }
    }

    fn unary(&mut self) -> std::result::Result<f64, String> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(-self.unary()?)
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> std::result::Result<f64, String> {
        let base = self.atom()?;
        if self.peek() == Some(&Token::Pow) {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn atom(&mut self) -> std::result::Result<f64, String> {
        match self.next() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::LParen) => {
                let value = self.expr()?;
                self.expect(Token::RParen)?;
                Ok(value)
            }
            Some(Token::Ident(name)) => {
                if self.peek() != Some(&Token::LParen) {
                    return constant(&name).ok_or_else(|| format!("unknown name '{}'", name));
                }
                self.pos += 1;
                let mut args = Vec::new();
                if self.peek() != Some(&Token::RParen) {
                    args.push(self.expr()?);
                    while self.peek() == Some(&Token::Comma) {
                        self.pos += 1;
                        args.push(self.expr()?);
                    }
                }
                self.expect(Token::RParen)?;
                call(&name, &args)
            }
            Some(t) => Err(format!("unexpected {:?}", t)),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

fn constant(name: &str) -> Option<f64> {
    match name {
        "pi" => Some(std::f64::consts::PI),
        "e" => Some(std::f64::consts::E),
        "tau" => Some(std::f64::consts::TAU),
        _ => None,
    }
}

fn call(name: &str, args: &[f64]) -> std::result::Result<f64, String> {
    let one = |f: fn(f64) -> f64| match args {
        [x] => Ok(f(*x)),
        _ => Err(format!("{}() takes exactly one argument", name)),
    };
    match name {
        "sqrt" => one(f64::sqrt),
        "abs" => one(f64::abs),
        "floor" => one(f64::floor),
        "ceil" => one(f64::ceil),
        "exp" => one(f64::exp),
        "sin" => one(f64::sin),
        "cos" => one(f64::cos),
        "tan" => one(f64::tan),
        "asin" => one(f64::asin),
        "acos" => one(f64::acos),
        "atan" => one(f64::atan),
        "log10" => one(f64::log10),
        "log2" => one(f64::log2),
        "log" => match args {
            [x] => Ok(x.ln()),
            [x, base] => Ok(x.log(*base)),
            _ => Err("log() takes one or two arguments".to_string()),
        },
        "pow" => match args {
            [x, y] => Ok(x.powf(*y)),
            _ => Err("pow() takes exactly two arguments".to_string()),
        },
        "round" => match args {
            [x] => Ok(x.round()),
            [x, digits] => {
                let scale = 10f64.powi(*digits as i32);
                Ok((x * scale).round() / scale)
            }
            _ => Err("round() takes one or two arguments".to_string()),
        },
        "min" | "max" if args.is_empty() => Err(format!("{}() needs at least one argument", name)),
        "min" => Ok(args.iter().copied().fold(f64::INFINITY, f64::min)),
        "max" => Ok(args.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
        _ => Err(format!("unknown function '{}'", name)),
    }
}

/// Evaluate an arithmetic expression. Non-finite results are errors.
pub fn evaluate(expr: &str) -> std::result::Result<f64, String> {
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return Err("empty expression".to_string());
    }
    let mut ev = Evaluator { tokens, pos: 0 };
    let value = ev.expr()?;
    if let Some(t) = ev.peek() {
        return Err(format!("unexpected {:?}", t));
    }
    if !value.is_finite() {
        return Err("result is not a finite number".to_string());
    }
    Ok(value)
}

/// Whole results come back as JSON integers.
fn number_json(value: f64) -> serde_json::Value {
    const EXACT: f64 = 9_007_199_254_740_992.0;
    if value.fract() == 0.0 && value.abs() < EXACT {
        json!(value as i64)
    } else {
        json!(value)
    }
}

pub struct Calculate {
    schema: OperationSchema,
}

impl Calculate {
    pub fn new() -> Self {
        Self {
            schema: OperationSchema::new(
                "calculate",
                CATEGORY,
                "Evaluate an arithmetic expression",
            )
            .param(ParamDef::required(
                "expression",
                ParamType::String,
                "e.g. (2 + 3) * 4, sqrt(16), round(pi, 2)",
            ))
            .returns("result, expression")
            .example("calculate('(120 - 20) / 4')"),
        }
    }
}

impl Default for Calculate {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Operation for Calculate {
    fn schema(&self) -> &OperationSchema {
        &self.schema
    }

    async fn invoke(&self, params: Params) -> Result<OperationOutput> {
        let expression = require_str("calculate", &params, "expression")?;
        match evaluate(expression) {
            Ok(value) => {
                let result = number_json(value);
                Ok(OperationOutput::data(result.clone())
                    .with("result", result)
                    .with("expression", expression))
            }
            Err(e) => Ok(OperationOutput::failure(format!(
                "Cannot evaluate '{}': {}",
                expression, e
            ))),
        }
    }
}

pub struct CalculateStatistics {
    schema: OperationSchema,
}

impl CalculateStatistics {
    pub fn new() -> Self {
        Self {
            schema: OperationSchema::new(
                "calculate_statistics",
                CATEGORY,
                "Calculate descriptive statistics for a list of numbers",
            )
            .param(ParamDef::required("numbers", ParamType::Array, "Numbers to analyze"))
            .returns("statistics: count, sum, mean, median, min, max, range, stdev, variance")
            .example("calculate_statistics([1, 2, 3, 4])"),
        }
    }
}

impl Default for CalculateStatistics {
    fn default() -> Self {
        Self::new()
    }
}

fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

/// Sample variance (n - 1); undefined below two values.
fn sample_variance(values: &[f64], mean: f64) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    Some(values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64)
}

#[async_trait::async_trait]
impl Operation for CalculateStatistics {
    fn schema(&self) -> &OperationSchema {
        &self.schema
    }

    async fn invoke(&self, params: Params) -> Result<OperationOutput> {
        let raw = require_array("calculate_statistics", &params, "numbers")?;
        let mut numbers = Vec::with_capacity(raw.len());
        for v in raw {
            match as_f64(v) {
                Some(n) => numbers.push(n),
                None => {
                    return Ok(OperationOutput::failure(format!(
                        "All values must be numeric, got {}",
                        v
                    )))
                }
            }
        }
        if numbers.is_empty() {
            return Ok(OperationOutput::failure("Empty list provided"));
        }

        let sum: f64 = numbers.iter().sum();
        let mean = sum / numbers.len() as f64;
        let variance = sample_variance(&numbers, mean);
        let mut sorted = numbers.clone();
        sorted.sort_by(f64::total_cmp);

        let (min, max) = (sorted[0], sorted[sorted.len() - 1]);
        let mut stats = json!({
            "count": numbers.len(),
            "sum": sum,
            "mean": mean,
            "median": median(&sorted),
            "min": min,
            "max": max,
            "range": max - min,
        });
        if let Some(variance) = variance {
            stats["stdev"] = json!(variance.sqrt());
            stats["variance"] = json!(variance);
        }
        Ok(OperationOutput::data(stats.clone()).with("statistics", stats))
    }
}
