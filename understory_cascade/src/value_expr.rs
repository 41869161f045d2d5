// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Deferred arithmetic over animated variables.
//!
//! The grammar is small:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := '-' unary | primary
//! primary := number | name | name '(' expr (',' expr)* ')' | '(' expr ')'
//! ```
//!
//! Functions are `min`, `max` (one or more arguments), `clamp(x, lo, hi)`,
//! `abs(x)`, and `round(x)`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::EvalError;

/// A binary arithmetic operator.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
}

/// A built-in function.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Function {
    /// Smallest argument.
    Min,
    /// Largest argument.
    Max,
    /// `clamp(x, lo, hi)`.
    Clamp,
    /// Absolute value.
    Abs,
    /// Round half away from zero.
    Round,
}

impl Function {
    fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "min" => Self::Min,
            "max" => Self::Max,
            "clamp" => Self::Clamp,
            "abs" => Self::Abs,
            "round" => Self::Round,
            _ => return None,
        })
    }

    fn name(self) -> &'static str {
        match self {
            Self::Min => "min",
            Self::Max => "max",
            Self::Clamp => "clamp",
            Self::Abs => "abs",
            Self::Round => "round",
        }
    }

    fn check_arity(self, count: usize) -> Result<(), EvalError> {
        let (ok, expected) = match self {
            Self::Min | Self::Max => (count >= 1, "one or more"),
            Self::Clamp => (count == 3, "three"),
            Self::Abs | Self::Round => (count == 1, "one"),
        };
        if ok {
            Ok(())
        } else {
            Err(EvalError::Arity {
                name: self.name(),
                expected,
            })
        }
    }
}

/// A parsed value expression.
///
/// ```rust
/// use understory_cascade::ValueExpr;
///
/// let expr: ValueExpr = "clamp(x * 2, 0, 15) + 1".parse().unwrap();
/// assert_eq!(expr.variables(), ["x"]);
/// assert_eq!(expr.evaluate(|name| (name == "x").then_some(5.0)), Ok(11.0));
/// assert_eq!(expr.evaluate(|name| (name == "x").then_some(9.0)), Ok(16.0));
/// assert!(expr.evaluate(|_| None).is_err());
/// ```
#[derive(Clone, PartialEq)]
pub enum ValueExpr {
    /// A literal.
    Number(f64),
    /// A variable reference.
    Variable(Arc<str>),
    /// Negation.
    Neg(Box<Self>),
    /// A binary operation.
    Binary(BinaryOp, Box<Self>, Box<Self>),
    /// A function call.
    Call(Function, Vec<Self>),
}

impl ValueExpr {
    /// Parses `source`.
    pub fn parse(source: &str) -> Result<Self, EvalError> {
        let mut parser = Parser {
            src: source.as_bytes(),
            pos: 0,
            depth: 0,
        };
        let expr = parser.expr()?;
        parser.skip_ws();
        if parser.pos < parser.src.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(expr)
    }

    /// Evaluates the expression, resolving variables with `lookup`.
    ///
    /// Fails on a missing variable or a non-finite result.
    pub fn evaluate(&self, lookup: impl Fn(&str) -> Option<f64>) -> Result<f64, EvalError> {
        let value = self.eval(&lookup)?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(EvalError::NotFinite)
        }
    }

    fn eval(&self, lookup: &impl Fn(&str) -> Option<f64>) -> Result<f64, EvalError> {
        Ok(match self {
            Self::Number(n) => *n,
            Self::Variable(name) => lookup(name).ok_or_else(|| EvalError::MissingVariable(name.clone()))?,
            Self::Neg(inner) => -inner.eval(lookup)?,
            Self::Binary(op, a, b) => {
                let (a, b) = (a.eval(lookup)?, b.eval(lookup)?);
                match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                }
            }
            Self::Call(function, args) => {
                let args = args
                    .iter()
                    .map(|a| a.eval(lookup))
                    .collect::<Result<Vec<f64>, _>>()?;
                match function {
                    Function::Min => args.iter().copied().fold(f64::INFINITY, f64::min),
                    Function::Max => args.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                    Function::Clamp => args[0].max(args[1]).min(args[2]),
                    Function::Abs => args[0].abs(),
                    Function::Round => args[0].round(),
                }
            }
        })
    }

    /// Returns the distinct variable names referenced, sorted.
    #[must_use]
    pub fn variables(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_variables(&mut out);
        out.sort_unstable();
        out.dedup();
        out
    }

    fn collect_variables<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Number(_) => {}
            Self::Variable(name) => out.push(name),
            Self::Neg(inner) => inner.collect_variables(out),
            Self::Binary(_, a, b) => {
                a.collect_variables(out);
                b.collect_variables(out);
            }
            Self::Call(_, args) => args.iter().for_each(|a| a.collect_variables(out)),
        }
    }

    /// Returns `true` if the expression references any variable.
    #[must_use]
    pub fn is_variable_dependent(&self) -> bool {
        match self {
            Self::Number(_) => false,
            Self::Variable(_) => true,
            Self::Neg(inner) => inner.is_variable_dependent(),
            Self::Binary(_, a, b) => a.is_variable_dependent() || b.is_variable_dependent(),
            Self::Call(_, args) => args.iter().any(Self::is_variable_dependent),
        }
    }
}

impl FromStr for ValueExpr {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, EvalError> {
        Self::parse(s)
    }
}

impl fmt::Debug for ValueExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Variable(name) => f.write_str(name),
            Self::Neg(inner) => write!(f, "-{inner:?}"),
            Self::Binary(op, a, b) => {
                let op = match op {
                    BinaryOp::Add => '+',
                    BinaryOp::Sub => '-',
                    BinaryOp::Mul => '*',
                    BinaryOp::Div => '/',
                };
                write!(f, "({a:?} {op} {b:?})")
            }
            Self::Call(function, args) => {
                write!(f, "{}(", function.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg:?}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Deepest expression tree the parser builds; evaluation recurses this far.
const MAX_DEPTH: usize = 128;

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn error(&self, message: &'static str) -> EvalError {
        EvalError::Parse {
            position: self.pos,
            message,
        }
    }

    fn descend(&mut self) -> Result<(), EvalError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error("expression nested too deeply"));
        }
        Ok(())
    }

    fn skip_ws(&mut self) {
        while self.src.get(self.pos).is_some_and(u8::is_ascii_whitespace) {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_ws();
        self.src.get(self.pos).copied()
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expr(&mut self) -> Result<ValueExpr, EvalError> {
        let base = self.depth;
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(b'+') => BinaryOp::Add,
                Some(b'-') => BinaryOp::Sub,
                _ => {
                    self.depth = base;
                    return Ok(lhs);
                }
            };
            self.pos += 1;
            // Each fold deepens the left spine.
            self.descend()?;
            let rhs = self.term()?;
            lhs = ValueExpr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn term(&mut self) -> Result<ValueExpr, EvalError> {
        let base = self.depth;
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(b'*') => BinaryOp::Mul,
                Some(b'/') => BinaryOp::Div,
                _ => {
                    self.depth = base;
                    return Ok(lhs);
                }
            };
            self.pos += 1;
            self.descend()?;
            let rhs = self.unary()?;
            lhs = ValueExpr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn unary(&mut self) -> Result<ValueExpr, EvalError> {
        if self.eat(b'-') {
            self.descend()?;
            let inner = self.unary()?;
            self.depth -= 1;
            return Ok(ValueExpr::Neg(Box::new(inner)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<ValueExpr, EvalError> {
        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                self.descend()?;
                let inner = self.expr()?;
                if !self.eat(b')') {
                    return Err(self.error("expected `)`"));
                }
                self.depth -= 1;
                Ok(inner)
            }
            Some(c) if c.is_ascii_digit() || c == b'.' => self.number(),
            Some(c) if c.is_ascii_alphabetic() || c == b'_' => self.name_or_call(),
            Some(_) => Err(self.error("expected a number, name, or `(`")),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn number(&mut self) -> Result<ValueExpr, EvalError> {
        let start = self.pos;
        self.digits();
        if self.src.get(self.pos) == Some(&b'.') {
            self.pos += 1;
            self.digits();
        }
        if matches!(self.src.get(self.pos), Some(b'e' | b'E')) {
            self.pos += 1;
            if matches!(self.src.get(self.pos), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            self.digits();
        }
        core::str::from_utf8(&self.src[start..self.pos])
            .ok()
            .and_then(|text| text.parse::<f64>().ok())
            .map(ValueExpr::Number)
            .ok_or(EvalError::Parse {
                position: start,
                message: "malformed number",
            })
    }

    fn digits(&mut self) {
        while self.src.get(self.pos).is_some_and(u8::is_ascii_digit) {
            self.pos += 1;
        }
    }

    fn name_or_call(&mut self) -> Result<ValueExpr, EvalError> {
        let start = self.pos;
        while self
            .src
            .get(self.pos)
            .is_some_and(|c| c.is_ascii_alphanumeric() || *c == b'_')
        {
            self.pos += 1;
        }
        // Identifiers are ASCII, so this slice is valid UTF-8.
        let name = core::str::from_utf8(&self.src[start..self.pos]).unwrap_or_default();
        if !self.eat(b'(') {
            return Ok(ValueExpr::Variable(Arc::from(name)));
        }
        let function = Function::lookup(name).ok_or(EvalError::Parse {
            position: start,
            message: "unknown function",
        })?;
        self.descend()?;
        let mut args = vec![self.expr()?];
        while self.eat(b',') {
            args.push(self.expr()?);
        }
        if !self.eat(b')') {
            return Err(self.error("expected `,` or `)`"));
        }
        self.depth -= 1;
        function.check_arity(args.len())?;
        Ok(ValueExpr::Call(function, args))
    }
}
