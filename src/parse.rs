// Copyright (c) 2019 Georg Brandl.  Licensed under the Apache License,
// Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at
// your option. This file may not be copied, modified, or distributed except
// according to those terms.

//! The push-driven statement parser.
//!
//! The lexer pushes one token at a time; the parser collects the current
//! statement and, when `EndOfStatement` closes it, builds the field list by
//! precedence climbing and hands the finished [`Statement`] to a
//! [`StatementSink`].
//!
//! Error recovery is statement-scoped: a syntax error produces one
//! diagnostic with its source location and drops the statement; the lexer's
//! `Error` sentinel drops the statement without an additional diagnostic
//! (the lexer has already reported).

use std::mem;

use thiserror::Error;

use crate::ast::{BinOp, Expr, Span, Statement, UnOp};
use crate::lexer::{Keyword, LexError, Token, TokenSink};

/// A syntax error with its source region.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

/// Receiver for parsed statements and statement-scoped diagnostics.
pub trait StatementSink {
    /// One well-formed statement.  The return value is reserved for
    /// back-pressure and is currently always honored as "keep going".
    fn statement(&mut self, stmt: Statement) -> bool;

    /// A lexical or syntactic diagnostic, delivered in source order
    /// relative to surrounding statements.
    fn error(&mut self, message: String, span: Span);
}

/// The parser state: tokens of the statement under construction.
#[derive(Default)]
pub struct Parser {
    tokens: Vec<(Token, Span)>,
    in_error: bool,
}

impl Parser {
    pub fn new() -> Parser {
        Parser::default()
    }

    /// Consume one token.  Called by the lexer via [`ParseSink`].
    pub fn push(&mut self, token: Token, span: Span, out: &mut impl StatementSink) -> bool {
        match token {
            Token::Error => {
                self.in_error = true;
                self.tokens.clear();
                true
            }
            Token::EndOfStatement => {
                let was_error = mem::replace(&mut self.in_error, false);
                if !was_error && !self.tokens.is_empty() {
                    match build_statement(&self.tokens) {
                        Ok(stmt) => {
                            out.statement(stmt);
                        }
                        Err(err) => out.error(err.message, err.span),
                    }
                }
                self.tokens.clear();
                true
            }
            // The lexer swallows the rest of the line after an error;
            // anything still arriving is dropped.
            _ if self.in_error => true,
            token => {
                self.tokens.push((token, span));
                true
            }
        }
    }
}

/// Adapter wiring a [`Parser`] and its output into the lexer's token sink.
pub struct ParseSink<'a, S: StatementSink> {
    pub parser: &'a mut Parser,
    pub out: &'a mut S,
}

impl<S: StatementSink> TokenSink for ParseSink<'_, S> {
    fn token(&mut self, token: Token, span: Span) -> bool {
        self.parser.push(token, span, self.out)
    }

    fn lex_error(&mut self, error: LexError) {
        self.out.error(error.kind.to_string(), error.span);
    }
}

// ----- statement construction

const TERNARY_PREC: u8 = 8;

/// Binary operator precedence, low to high.  All binary operators are
/// left-associative; the ternary sits between the comparisons and `**`.
fn binary_op(kw: Keyword) -> Option<(BinOp, u8)> {
    Some(match kw {
        Keyword::Or => (BinOp::Or, 1),
        Keyword::And => (BinOp::And, 2),
        Keyword::Equal => (BinOp::Eq, 3),
        Keyword::Concat => (BinOp::Concat, 4),
        Keyword::Plus => (BinOp::Add, 5),
        Keyword::Minus => (BinOp::Sub, 5),
        Keyword::Times => (BinOp::Mul, 6),
        Keyword::Divide => (BinOp::Div, 6),
        Keyword::Mod => (BinOp::Mod, 6),
        Keyword::Less => (BinOp::Lt, 7),
        Keyword::Greater => (BinOp::Gt, 7),
        Keyword::LessEqual => (BinOp::Le, 7),
        Keyword::GreaterEqual => (BinOp::Ge, 7),
        Keyword::Power => (BinOp::Pow, 9),
        _ => return None,
    })
}

fn build_statement(tokens: &[(Token, Span)]) -> Result<Statement, ParseError> {
    let span = tokens[0].1.merge(tokens[tokens.len() - 1].1);
    let mut cursor = Cursor { tokens, pos: 0 };
    let mut fields = Vec::new();
    while cursor.peek().is_some() {
        fields.push(parse_field(&mut cursor)?);
    }
    Ok(Statement { fields, span })
}

/// `field := atom (BRIDGE atom)*`, folded into `Concat`.
fn parse_field(c: &mut Cursor) -> Result<Expr, ParseError> {
    let mut field = parse_atom(c)?;
    while matches!(c.peek(), Some(Token::Bridge)) {
        c.advance();
        let rhs = parse_atom(c)?;
        field = Expr::Binary(BinOp::Concat, Box::new(field), Box::new(rhs));
    }
    Ok(field)
}

/// `atom := word | "{" expr "}"`.
fn parse_atom(c: &mut Cursor) -> Result<Expr, ParseError> {
    match c.peek() {
        Some(Token::Str(word)) => {
            let word = word.clone();
            c.advance();
            Ok(Expr::Str(word))
        }
        Some(Token::Keyword(Keyword::LeftBrace)) => {
            c.advance();
            let expr = parse_expr(c, 0)?;
            c.expect_kw(Keyword::RightBrace)?;
            Ok(expr)
        }
        _ => Err(c.unexpected("a word or '{'")),
    }
}

fn parse_expr(c: &mut Cursor, min_prec: u8) -> Result<Expr, ParseError> {
    let mut lhs = parse_unary(c)?;
    loop {
        let Some(kw) = c.peek_kw() else { break };
        if kw == Keyword::If && TERNARY_PREC >= min_prec {
            c.advance();
            // The condition is delimited by ELSE, so it parses at the
            // lowest level; the alternative recurses at the ternary's own
            // level for right associativity.
            let cond = parse_expr(c, 0)?;
            c.expect_kw(Keyword::Else)?;
            let orelse = parse_expr(c, TERNARY_PREC)?;
            lhs = Expr::IfElse {
                then: Box::new(lhs),
                cond: Box::new(cond),
                orelse: Box::new(orelse),
            };
            continue;
        }
        let Some((op, prec)) = binary_op(kw) else { break };
        if prec < min_prec {
            break;
        }
        c.advance();
        let rhs = parse_expr(c, prec + 1)?;
        lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn parse_unary(c: &mut Cursor) -> Result<Expr, ParseError> {
    let op = match c.peek_kw() {
        Some(Keyword::Not) => Some(UnOp::Not),
        Some(Keyword::Plus) => Some(UnOp::Plus),
        Some(Keyword::Minus) => Some(UnOp::Minus),
        _ => None,
    };
    match op {
        Some(op) => {
            c.advance();
            Ok(Expr::Unary(op, Box::new(parse_unary(c)?)))
        }
        None => parse_postfix(c),
    }
}

/// Member access binds tightest: `foo.bar[baz].biz`.
fn parse_postfix(c: &mut Cursor) -> Result<Expr, ParseError> {
    let mut expr = parse_primary(c)?;
    loop {
        match c.peek_kw() {
            Some(Keyword::Dot) => {
                c.advance();
                let name = match c.peek() {
                    Some(Token::Identifier(name)) => name.clone(),
                    _ => return Err(c.unexpected("an identifier")),
                };
                c.advance();
                expr = Expr::Lookup {
                    parent: Box::new(expr),
                    key: Box::new(Expr::Str(name)),
                };
            }
            Some(Keyword::LeftBracket) => {
                c.advance();
                let key = parse_expr(c, 0)?;
                c.expect_kw(Keyword::RightBracket)?;
                expr = Expr::Lookup {
                    parent: Box::new(expr),
                    key: Box::new(key),
                };
            }
            _ => return Ok(expr),
        }
    }
}

fn parse_primary(c: &mut Cursor) -> Result<Expr, ParseError> {
    let expr = match c.peek() {
        Some(Token::Int(value)) => Expr::Int(*value),
        Some(Token::Float(value)) => Expr::Float(*value),
        Some(Token::Str(text)) => Expr::Str(text.clone()),
        Some(Token::Keyword(Keyword::True)) => Expr::Bool(true),
        Some(Token::Keyword(Keyword::False)) => Expr::Bool(false),
        Some(Token::Keyword(Keyword::Inf)) => Expr::Float(f64::INFINITY),
        Some(Token::Keyword(Keyword::Nan)) => Expr::Float(f64::NAN),
        Some(Token::Identifier(name)) => {
            let name = name.clone();
            c.advance();
            if c.peek_kw() == Some(Keyword::LeftParen) {
                c.advance();
                let args = parse_args(c)?;
                return Ok(Expr::Call { name, args });
            }
            return Ok(Expr::Param(name));
        }
        Some(Token::Keyword(Keyword::LeftParen)) => {
            c.advance();
            let expr = parse_expr(c, 0)?;
            c.expect_kw(Keyword::RightParen)?;
            return Ok(expr);
        }
        _ => return Err(c.unexpected("an expression")),
    };
    c.advance();
    Ok(expr)
}

/// Comma-separated arguments up to the closing parenthesis.
fn parse_args(c: &mut Cursor) -> Result<Vec<Expr>, ParseError> {
    let mut args = Vec::new();
    if c.peek_kw() == Some(Keyword::RightParen) {
        c.advance();
        return Ok(args);
    }
    loop {
        args.push(parse_expr(c, 0)?);
        match c.peek_kw() {
            Some(Keyword::Comma) => c.advance(),
            _ => break,
        }
    }
    c.expect_kw(Keyword::RightParen)?;
    Ok(args)
}

struct Cursor<'a> {
    tokens: &'a [(Token, Span)],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_kw(&self) -> Option<Keyword> {
        match self.peek() {
            Some(Token::Keyword(kw)) => Some(*kw),
            _ => None,
        }
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    /// Span of the current token, or of the last one at end of statement.
    fn span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|(_, s)| *s)
            .unwrap_or_default()
    }

    fn expect_kw(&mut self, kw: Keyword) -> Result<(), ParseError> {
        if self.peek_kw() == Some(kw) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&format!("\"{}\"", kw)))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        ParseError {
            message: format!("Unexpected {} (expected {})", self.describe(), expected),
            span: self.span(),
        }
    }

    fn describe(&self) -> String {
        match self.peek() {
            None => "end of line".into(),
            Some(Token::Keyword(kw)) => format!("\"{}\"", kw),
            Some(Token::Identifier(name)) => format!("identifier '{}'", name),
            Some(Token::Str(_)) => "string".into(),
            Some(Token::Int(_)) | Some(Token::Float(_)) => "number".into(),
            Some(Token::Bridge) => "adjacent field".into(),
            Some(Token::EndOfStatement) | Some(Token::Error) => "end of line".into(),
        }
    }
}
