//! The annotation expression language.
//!
//! Annotations only ever need a handful of shapes: an integer constant, a
//! parameter value, the element count of a buffer parameter, or a product of
//! those (`pw * ph`). The grammar is exactly that:
//!
//! ```text
//! expr   := factor ("*" factor)*
//! factor := INTEGER | IDENT | "length" "(" IDENT ")" | "(" expr ")"
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error parsing an annotation expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseExprError {
    #[error("empty expression")]
    Empty,

    #[error("unexpected character `{ch}` at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("unexpected `{found}` at offset {offset}")]
    UnexpectedToken { found: String, offset: usize },

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("integer literal `{0}` is out of range")]
    LiteralOverflow(String),

    #[error("unknown function `{0}`, only `length(..)` is supported")]
    UnknownFunction(String),

    #[error("parentheses nested deeper than {} levels", MAX_NESTING)]
    TooDeep,
}

/// Deepest parenthesis nesting the parser accepts.
pub const MAX_NESTING: usize = 32;

/// Error evaluating an expression against concrete values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("no value for `{0}`")]
    Unbound(String),

    #[error("`{0}` is not a buffer, it has no length")]
    NoLength(String),

    #[error("arithmetic overflow evaluating `{0}`")]
    Overflow(String),
}

/// Values an expression is evaluated against.
pub trait Bindings {
    /// Integer value of a parameter.
    fn value(&self, name: &str) -> Option<i64>;

    /// Element count of a buffer parameter.
    fn length(&self, name: &str) -> Option<i64>;
}

/// A parameter an expression reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand<'a> {
    /// The parameter's value
    Value(&'a str),
    /// The element count of a buffer parameter
    Length(&'a str),
}

impl<'a> Operand<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            Operand::Value(name) | Operand::Length(name) => name,
        }
    }
}

/// A parsed annotation expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Expr {
    Int(i64),
    Param(String),
    Length(String),
    /// Always flattened, never nested and never fewer than two factors
    Product(Vec<Expr>),
}

impl Expr {
    /// Parse an expression.
    pub fn parse(src: &str) -> Result<Self, ParseExprError> {
        let tokens = tokenize(src)?;
        if tokens.is_empty() {
            return Err(ParseExprError::Empty);
        }

        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let expr = parser.expr()?;

        match parser.peek() {
            None => Ok(expr),
            Some(tok) => Err(ParseExprError::UnexpectedToken {
                found: tok.kind.to_string(),
                offset: tok.offset,
            }),
        }
    }

    /// The constant value, if this expression reads no parameters.
    pub fn as_constant(&self) -> Option<i64> {
        match self {
            Expr::Int(v) => Some(*v),
            Expr::Param(_) | Expr::Length(_) => None,
            Expr::Product(factors) => factors
                .iter()
                .try_fold(1i64, |acc, f| acc.checked_mul(f.as_constant()?)),
        }
    }

    /// Every parameter the expression reads, in source order.
    pub fn operands(&self) -> Vec<Operand<'_>> {
        let mut out = Vec::new();
        self.collect_operands(&mut out);
        out
    }

    fn collect_operands<'a>(&'a self, out: &mut Vec<Operand<'a>>) {
        match self {
            Expr::Int(_) => {}
            Expr::Param(name) => out.push(Operand::Value(name)),
            Expr::Length(name) => out.push(Operand::Length(name)),
            Expr::Product(factors) => {
                for f in factors {
                    f.collect_operands(out);
                }
            }
        }
    }

    /// Evaluate with checked integer arithmetic.
    pub fn eval(&self, bindings: &impl Bindings) -> Result<i64, EvalError> {
        match self {
            Expr::Int(v) => Ok(*v),
            Expr::Param(name) => bindings
                .value(name)
                .ok_or_else(|| EvalError::Unbound(name.clone())),
            Expr::Length(name) => bindings
                .length(name)
                .ok_or_else(|| EvalError::NoLength(name.clone())),
            Expr::Product(factors) => {
                let mut acc = 1i64;
                for f in factors {
                    acc = acc
                        .checked_mul(f.eval(bindings)?)
                        .ok_or_else(|| EvalError::Overflow(self.to_string()))?;
                }
                Ok(acc)
            }
        }
    }

    fn product(mut factors: Vec<Expr>) -> Expr {
        if factors.len() == 1 {
            return factors.remove(0);
        }
        let flat = factors
            .into_iter()
            .flat_map(|f| match f {
                Expr::Product(inner) => inner,
                other => vec![other],
            })
            .collect();
        Expr::Product(flat)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Int(v) => write!(f, "{}", v),
            Expr::Param(name) => f.write_str(name),
            Expr::Length(name) => write!(f, "length({})", name),
            Expr::Product(factors) => {
                for (i, factor) in factors.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" * ")?;
                    }
                    write!(f, "{}", factor)?;
                }
                Ok(())
            }
        }
    }
}

impl std::str::FromStr for Expr {
    type Err = ParseExprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Expr::parse(s)
    }
}

impl TryFrom<String> for Expr {
    type Error = ParseExprError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Expr::parse(&s)
    }
}

impl From<Expr> for String {
    fn from(expr: Expr) -> Self {
        expr.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    Int(String),
    Ident(String),
    Star,
    LParen,
    RParen,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Int(s) | TokenKind::Ident(s) => f.write_str(s),
            TokenKind::Star => f.write_str("*"),
            TokenKind::LParen => f.write_str("("),
            TokenKind::RParen => f.write_str(")"),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    offset: usize,
}

fn tokenize(src: &str) -> Result<Vec<Token>, ParseExprError> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some(&(offset, ch)) = chars.peek() {
        let kind = match ch {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '*' => {
                chars.next();
                TokenKind::Star
            }
            '(' => {
                chars.next();
                TokenKind::LParen
            }
            ')' => {
                chars.next();
                TokenKind::RParen
            }
            c if c.is_ascii_digit() => {
                let mut lit = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if !c.is_ascii_digit() {
                        break;
                    }
                    lit.push(c);
                    chars.next();
                }
                TokenKind::Int(lit)
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if !(c.is_ascii_alphanumeric() || c == '_') {
                        break;
                    }
                    ident.push(c);
                    chars.next();
                }
                TokenKind::Ident(ident)
            }
            other => return Err(ParseExprError::UnexpectedChar { ch: other, offset }),
        };
        tokens.push(Token { kind, offset });
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

    fn next(&mut self) -> Result<Token, ParseExprError> {
        let tok = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(ParseExprError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(tok)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), ParseExprError> {
        let tok = self.next()?;
        if tok.kind == kind {
            Ok(())
        } else {
            Err(ParseExprError::UnexpectedToken {
                found: tok.kind.to_string(),
                offset: tok.offset,
            })
        }
    }

    fn expr(&mut self) -> Result<Expr, ParseExprError> {
        let mut factors = vec![self.factor()?];
        while matches!(self.peek(), Some(Token { kind: TokenKind::Star, .. })) {
            self.pos += 1;
            factors.push(self.factor()?);
        }
        Ok(Expr::product(factors))
    }

    fn factor(&mut self) -> Result<Expr, ParseExprError> {
        let tok = self.next()?;
        match tok.kind {
            TokenKind::Int(lit) => lit
                .parse()
                .map(Expr::Int)
                .map_err(|_| ParseExprError::LiteralOverflow(lit)),
            TokenKind::Ident(name) => {
                if !matches!(self.peek(), Some(Token { kind: TokenKind::LParen, .. })) {
                    return Ok(Expr::Param(name));
                }
                if name != "length" {
                    return Err(ParseExprError::UnknownFunction(name));
                }
                self.expect(TokenKind::LParen)?;
                let arg = self.next()?;
                let target = match arg.kind {
                    TokenKind::Ident(target) => target,
                    other => {
                        return Err(ParseExprError::UnexpectedToken {
                            found: other.to_string(),
                            offset: arg.offset,
                        })
                    }
                };
                self.expect(TokenKind::RParen)?;
                Ok(Expr::Length(target))
            }
            TokenKind::LParen => {
                if self.depth == MAX_NESTING {
                    return Err(ParseExprError::TooDeep);
                }
                self.depth += 1;
                let inner = self.expr()?;
                self.depth -= 1;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            other => Err(ParseExprError::UnexpectedToken {
                found: other.to_string(),
                offset: tok.offset,
            }),
        }
    }
}
