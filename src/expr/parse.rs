//! `logos` tokenizer and recursive-descent parser for plot expressions.

use logos::{Lexer, Logos};

use crate::error::ParseError;

/// Built-in functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Func {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Exp,
    Ln,
    Log,
    Sqrt,
    Abs,
    Floor,
    Ceil,
    Sign,
    Min,
    Max,
    Atan2,
    Pow,
}

impl Func {
    fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "sin" => Self::Sin,
            "cos" => Self::Cos,
            "tan" => Self::Tan,
            "asin" => Self::Asin,
            "acos" => Self::Acos,
            "atan" => Self::Atan,
            "sinh" => Self::Sinh,
            "cosh" => Self::Cosh,
            "tanh" => Self::Tanh,
            "exp" => Self::Exp,
            "ln" => Self::Ln,
            "log" => Self::Log,
            "sqrt" => Self::Sqrt,
            "abs" => Self::Abs,
            "floor" => Self::Floor,
            "ceil" => Self::Ceil,
            "sign" => Self::Sign,
            "min" => Self::Min,
            "max" => Self::Max,
            "atan2" => Self::Atan2,
            "pow" => Self::Pow,
            _ => return None,
        })
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Tan => "tan",
            Self::Asin => "asin",
            Self::Acos => "acos",
            Self::Atan => "atan",
            Self::Sinh => "sinh",
            Self::Cosh => "cosh",
            Self::Tanh => "tanh",
            Self::Exp => "exp",
            Self::Ln => "ln",
            Self::Log => "log",
            Self::Sqrt => "sqrt",
            Self::Abs => "abs",
            Self::Floor => "floor",
            Self::Ceil => "ceil",
            Self::Sign => "sign",
            Self::Min => "min",
            Self::Max => "max",
            Self::Atan2 => "atan2",
            Self::Pow => "pow",
        }
    }

    fn arity(self) -> usize {
        match self {
            Self::Min | Self::Max | Self::Atan2 | Self::Pow => 2,
            _ => 1,
        }
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Ast {
    Number(f64),
    Ident { name: String, offset: usize },
    Neg(Box<Ast>),
    Binary {
        op: BinaryOp,
        lhs: Box<Ast>,
        rhs: Box<Ast>,
    },
    Call { func: Func, args: Vec<Ast> },
}

impl Ast {
    /// Visit every identifier in the tree.
    pub(crate) fn for_each_ident(&self, visit: &mut impl FnMut(&str, usize)) {
        match self {
            Self::Number(_) => {}
            Self::Ident { name, offset } => visit(name, *offset),
            Self::Neg(inner) => inner.for_each_ident(visit),
            Self::Binary { lhs, rhs, .. } => {
                lhs.for_each_ident(visit);
                rhs.for_each_ident(visit);
            }
            Self::Call { args, .. } => {
                for arg in args {
                    arg.for_each_ident(visit);
                }
            }
        }
    }

    /// Check whether the tree mentions `name`.
    pub(crate) fn mentions(&self, name: &str) -> bool {
        let mut found = false;
        self.for_each_ident(&mut |ident, _| found |= ident == name);
        found
    }

    /// Check whether the tree is exactly the identifier `name`.
    pub(crate) fn is_ident(&self, name: &str) -> bool {
        matches!(self, Self::Ident { name: ident, .. } if ident == name)
    }
}

/// A parsed input: an expression, or an equation `lhs = rhs`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Statement {
    pub(crate) lhs: Ast,
    pub(crate) rhs: Option<Ast>,
}

/// Nesting limit for parentheses, calls, signs and exponents.
const MAX_NESTING: usize = 64;

/// Token limit; it also bounds the height of operator chains.
const MAX_TOKENS: usize = 1024;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")]
enum TokenKind {
    // Runs of digits and dots are one token so `1.2.3` fails instead of
    // splitting.
    #[regex(r"[0-9][0-9.]*", number)]
    #[regex(r"\.[0-9][0-9.]*", number)]
    Number(f64),
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("^")]
    #[token("**")]
    Caret,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token("=")]
    Equals,
    End,
}

/// Parse a numeric literal, taking an exponent only when digits follow it;
/// `2e` is two times Euler's number.
fn number(lex: &mut Lexer<'_, TokenKind>) -> Option<f64> {
    let rest = lex.remainder().as_bytes();
    if matches!(rest.first(), Some(b'e' | b'E')) {
        let sign = usize::from(matches!(rest.get(1), Some(b'+' | b'-')));
        let digits = rest[1 + sign..]
            .iter()
            .take_while(|byte| byte.is_ascii_digit())
            .count();
        if digits > 0 {
            lex.bump(1 + sign + digits);
        }
    }
    lex.slice().parse().ok()
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    offset: usize,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    let mut lex = TokenKind::lexer(input);
    let mut tokens = Vec::new();
    while let Some(result) = lex.next() {
        let offset = lex.span().start;
        let kind = result.map_err(|()| {
            let text = lex.slice();
            if text.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
                ParseError::at(offset, format!("malformed number '{text}'"))
            } else {
                let found = input[offset..].chars().next().unwrap_or('?');
                ParseError::at(offset, format!("unexpected character '{found}'"))
            }
        })?;
        if tokens.len() == MAX_TOKENS {
            return Err(ParseError::at(offset, "expression is too long"));
        }
        tokens.push(Token { kind, offset });
    }
    tokens.push(Token {
        kind: TokenKind::End,
        offset: input.len(),
    });
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.peek().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<(), ParseError> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(ParseError::at(self.peek().offset, format!("expected {what}")))
        }
    }

    fn statement(&mut self) -> Result<Statement, ParseError> {
        let lhs = self.sum()?;
        let rhs = if self.eat(&TokenKind::Equals) {
            Some(self.sum()?)
        } else {
            None
        };
        let next = self.peek();
        if next.kind != TokenKind::End {
            return Err(ParseError::at(next.offset, "unexpected trailing input"));
        }
        Ok(Statement { lhs, rhs })
    }

    fn sum(&mut self) -> Result<Ast, ParseError> {
        let mut lhs = self.product()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.product()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn product(&mut self) -> Result<Ast, ParseError> {
        let mut lhs = self.unary()?;
        loop {
            let (op, rhs) = match self.peek().kind {
                TokenKind::Star => {
                    self.advance();
                    (BinaryOp::Mul, self.unary()?)
                }
                TokenKind::Slash => {
                    self.advance();
                    (BinaryOp::Div, self.unary()?)
                }
                // Juxtaposition: `2x`, `3(x + 1)`, `x sin(x)`.
                TokenKind::Number(_) | TokenKind::Ident(_) | TokenKind::LParen => {
                    (BinaryOp::Mul, self.power()?)
                }
                _ => return Ok(lhs),
            };
            lhs = binary(op, lhs, rhs);
        }
    }

    /// Every recursive path passes through here, so the depth check covers
    /// parentheses, call arguments, signs and exponents.
    fn unary(&mut self) -> Result<Ast, ParseError> {
        if self.depth == MAX_NESTING {
            return Err(ParseError::at(
                self.peek().offset,
                "expression nested too deeply",
            ));
        }
        self.depth += 1;
        let result = self.signed();
        self.depth -= 1;
        result
    }

    fn signed(&mut self) -> Result<Ast, ParseError> {
        if self.eat(&TokenKind::Minus) {
            return Ok(Ast::Neg(Box::new(self.unary()?)));
        }
        if self.eat(&TokenKind::Plus) {
            return self.unary();
        }
        self.power()
    }

    fn power(&mut self) -> Result<Ast, ParseError> {
        let base = self.primary()?;
        if self.eat(&TokenKind::Caret) {
            let exponent = self.unary()?;
            return Ok(binary(BinaryOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Ast, ParseError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Number(value) => Ok(Ast::Number(value)),
            TokenKind::Ident(name) => match Func::lookup(&name) {
                Some(func) if self.peek().kind == TokenKind::LParen => {
                    self.advance();
                    self.call(func, token.offset)
                }
                Some(func) => Err(ParseError::at(
                    token.offset,
                    format!("function '{}' needs an argument list", func.name()),
                )),
                None => Ok(Ast::Ident {
                    name,
                    offset: token.offset,
                }),
            },
            TokenKind::LParen => {
                let inner = self.sum()?;
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::End => Err(ParseError::at(token.offset, "unexpected end of expression")),
            _ => Err(ParseError::at(token.offset, "expected a value")),
        }
    }

    fn call(&mut self, func: Func, offset: usize) -> Result<Ast, ParseError> {
        let mut args = Vec::new();
        if !self.eat(&TokenKind::RParen) {
            loop {
                args.push(self.sum()?);
                if self.eat(&TokenKind::Comma) {
                    continue;
                }
                self.expect(&TokenKind::RParen, "',' or ')'")?;
                break;
            }
        }
        if args.len() != func.arity() {
            return Err(ParseError::at(
                offset,
                format!(
                    "{} takes {} argument(s), got {}",
                    func.name(),
                    func.arity(),
                    args.len()
                ),
            ));
        }
        Ok(Ast::Call { func, args })
    }
}

fn binary(op: BinaryOp, lhs: Ast, rhs: Ast) -> Ast {
    Ast::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

/// Parse an expression or equation.
pub(crate) fn parse_statement(input: &str) -> Result<Statement, ParseError> {
    let tokens = tokenize(input)?;
    if tokens.len() == 1 {
        return Err(ParseError::at(0, "empty expression"));
    }
    Parser {
        tokens,
        pos: 0,
        depth: 0,
    }
    .statement()
}

/// Parse a plain expression; `=` is rejected.
pub(crate) fn parse_expression(input: &str) -> Result<Ast, ParseError> {
    let statement = parse_statement(input)?;
    match statement.rhs {
        None => Ok(statement.lhs),
        Some(_) => Err(ParseError::new("unexpected '=' in value")),
    }
}
