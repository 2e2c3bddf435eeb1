// Copyright (c) 2019 Georg Brandl.  Licensed under the Apache License,
// Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at
// your option. This file may not be copied, modified, or distributed except
// according to those terms.

//! The incremental lexer.
//!
//! Input bytes drive a state machine that emits tokens through a
//! [`TokenSink`].  The machine is fully reentrant: `feed` may be called with
//! any byte split, including in the middle of a word, a string escape or a
//! float exponent, because every accumulator lives in the [`Lexer`] value.
//!
//! Outside of braces the input is cut into *words* (uppercased literal
//! fields).  A `{` switches to the expression sub-language with identifiers,
//! keywords, numbers in four bases, strings and operator symbols.  Between a
//! word and an adjacent expression the lexer interposes a synthetic
//! [`Token::Bridge`] which the parser folds into a concatenation.

use std::str::FromStr;

use strum_macros::EnumString;
use thiserror::Error;

use crate::ast::Span;

/// Keywords of the expression dialect, including punctuation.
///
/// Lookup is an exact match on the uppercased token text, so `or` and `OR`
/// are the same keyword while `ORE` is an identifier.
///
/// `Display` is implemented by hand rather than derived: strum's `Display`
/// derive validates every serialize string as a `format!` template (even
/// though unit variants never actually go through `format!`), so it rejects
/// the lone-brace strings needed for `{`/`}` with a spurious "bracket
/// without match" error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
pub enum Keyword {
    #[strum(serialize = "OR")]
    Or,
    #[strum(serialize = "AND")]
    And,
    #[strum(serialize = "IF")]
    If,
    #[strum(serialize = "ELSE")]
    Else,
    #[strum(serialize = "NAN")]
    Nan,
    #[strum(to_string = "INF", serialize = "INFINITY")]
    Inf,
    #[strum(serialize = "TRUE")]
    True,
    #[strum(serialize = "FALSE")]
    False,
    #[strum(serialize = "=")]
    Equal,
    #[strum(serialize = "~")]
    Concat,
    #[strum(serialize = "+")]
    Plus,
    #[strum(serialize = "-")]
    Minus,
    #[strum(serialize = "%")]
    Mod,
    #[strum(serialize = "**")]
    Power,
    #[strum(serialize = "*")]
    Times,
    #[strum(serialize = "/")]
    Divide,
    #[strum(serialize = "<")]
    Less,
    #[strum(serialize = ">")]
    Greater,
    #[strum(serialize = "<=")]
    LessEqual,
    #[strum(serialize = ">=")]
    GreaterEqual,
    #[strum(serialize = "!")]
    Not,
    #[strum(serialize = ".")]
    Dot,
    #[strum(serialize = ",")]
    Comma,
    #[strum(serialize = "(")]
    LeftParen,
    #[strum(serialize = ")")]
    RightParen,
    #[strum(serialize = "[")]
    LeftBracket,
    #[strum(serialize = "]")]
    RightBracket,
    #[strum(serialize = "{")]
    LeftBrace,
    #[strum(serialize = "}")]
    RightBrace,
}

impl std::fmt::Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Keyword::Or => "OR",
            Keyword::And => "AND",
            Keyword::If => "IF",
            Keyword::Else => "ELSE",
            Keyword::Nan => "NAN",
            Keyword::Inf => "INF",
            Keyword::True => "TRUE",
            Keyword::False => "FALSE",
            Keyword::Equal => "=",
            Keyword::Concat => "~",
            Keyword::Plus => "+",
            Keyword::Minus => "-",
            Keyword::Mod => "%",
            Keyword::Power => "**",
            Keyword::Times => "*",
            Keyword::Divide => "/",
            Keyword::Less => "<",
            Keyword::Greater => ">",
            Keyword::LessEqual => "<=",
            Keyword::GreaterEqual => ">=",
            Keyword::Not => "!",
            Keyword::Dot => ".",
            Keyword::Comma => ",",
            Keyword::LeftParen => "(",
            Keyword::RightParen => ")",
            Keyword::LeftBracket => "[",
            Keyword::RightBracket => "]",
            Keyword::LeftBrace => "{",
            Keyword::RightBrace => "}",
        };
        f.write_str(s)
    }
}

/// One lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Keyword(Keyword),
    /// An identifier inside an expression, uppercased.
    Identifier(String),
    /// A string literal, or a literal word at statement level (uppercased).
    Str(String),
    Int(i64),
    Float(f64),
    /// Synthesized between a word and an adjacent expression.
    Bridge,
    EndOfStatement,
    /// Recovery sentinel: the error has already been reported through
    /// [`TokenSink::lex_error`]; the parser should drop the pending
    /// statement without a diagnostic of its own.
    Error,
}

/// Lexical errors, with the exact diagnostics of the dialect.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexErrorKind {
    #[error("Unterminated string")]
    UnterminatedString,
    #[error("Unterminated expression")]
    UnterminatedExpression,
    #[error("Unexpected character {0}")]
    UnexpectedChar(char),
    #[error("Illegal operator '{0}'")]
    IllegalOperator(String),
    #[error("Illegal string escape \\{0}")]
    IllegalEscape(char),
    #[error("Illegal digit in octal escape (\\nnn)")]
    OctalEscapeDigit,
    #[error("Octal escape (\\nnn) exceeds byte value")]
    OctalEscapeRange,
    #[error("Hex string escape (\\x) requires at least one digit")]
    HexEscapeEmpty,
    #[error("Hex escape exceeds byte value")]
    HexEscapeRange,
    #[error("Low unicode escape (\\u) requires exactly four digits")]
    LowUnicodeEscape,
    #[error("High unicode escape (\\U) requires exactly eight digits")]
    HighUnicodeEscape,
    #[error("High unicode escape (\\U) exceeds unicode value")]
    UnicodeRange,
    #[error("Illegal binary digit {0}")]
    BinaryDigit(char),
    #[error("Illegal octal digit {0}")]
    OctalDigit(char),
    #[error("Binary literal exceeds maximum value")]
    BinaryRange,
    #[error("Octal literal exceeds maximum value")]
    OctalRange,
    #[error("Fractional binary literals not allowed")]
    BinaryFraction,
    #[error("Fractional octal literals not allowed")]
    OctalFraction,
    #[error("Decimal exponent must be 3 digits or less")]
    DecimalExponentLength,
    #[error("No digits after decimal exponent delimiter")]
    DecimalExponentEmpty,
    #[error("Hex exponent must be 2 digits or less")]
    HexExponentLength,
    #[error("No digits after hex exponent delimiter")]
    HexExponentEmpty,
}

/// A lexical error with its source region.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}")]
pub struct LexError {
    pub kind: LexErrorKind,
    pub span: Span,
}

/// Receiver for the token stream.
pub trait TokenSink {
    /// Deliver one token.  Returning `false` aborts the current statement:
    /// the lexer skips to the next newline.
    fn token(&mut self, token: Token, span: Span) -> bool;

    /// A lexical diagnostic; the [`Token::Error`] sentinel follows.
    fn lex_error(&mut self, error: LexError);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Newline,
    Error,
    LineNo,
    AfterLineNo,
    Statement,
    Word,
    Comment,
    EmptyLineComment,
    Expr,
    ExprDot,
    AfterExpr,
    Symbol,
    Identifier,
    Str,
    StrEscape,
    StrOctal,
    StrHex,
    StrLowUnicode,
    StrHighUnicode,
    NumberBase,
    Decimal,
    Hex,
    Binary,
    Octal,
    DecimalFloat,
    DecimalFraction,
    DecimalExponentSign,
    DecimalExponent,
    HexFloat,
    HexFraction,
    HexExponentSign,
    HexExponent,
}

/// The incremental lexer.  See the module docs.
pub struct Lexer {
    state: State,
    /// Scratch for the token under construction (word, identifier, string
    /// or symbol run).  Grows on demand and is never shrunk.
    token: Vec<u8>,
    /// Accumulator for integer literals, escape code points and exponents.
    int_value: i64,
    /// Accumulator for float literals.
    float_value: f64,
    /// Positional multiplier while scanning fraction digits.
    fraction: f64,
    /// Digits consumed by the current bounded sub-scan.
    digits: u32,
    exp_sign: i8,
    /// `(`/`)` nesting depth inside the current expression.
    nesting: u32,
    line: u32,
    column: u32,
    span: Span,
}

impl Default for Lexer {
    fn default() -> Self {
        Lexer::new()
    }
}

impl Lexer {
    pub fn new() -> Lexer {
        Lexer {
            state: State::Newline,
            token: Vec::with_capacity(128),
            int_value: 0,
            float_value: 0.,
            fraction: 1.,
            digits: 0,
            exp_sign: 1,
            nesting: 0,
            line: 1,
            column: 0,
            span: Span::default(),
        }
    }

    /// Consume a chunk of input, emitting tokens into `sink`.  The chunk
    /// may end anywhere, including mid-token.
    pub fn feed(&mut self, data: &[u8], sink: &mut impl TokenSink) {
        for &ch in data {
            // A newline is positioned at the end of the line it terminates;
            // the line counter advances once it has been processed.
            self.column += 1;
            // A step that changes state without consuming the byte asks to
            // have it reprocessed.  Every such transition makes progress,
            // so this loop terminates.
            while !self.step(ch, sink) {}
            if ch == b'\n' {
                self.line += 1;
                self.column = 0;
            }
        }
    }

    /// Flush a dangling statement by feeding a synthetic newline.
    pub fn finish(&mut self, sink: &mut impl TokenSink) {
        if self.state != State::Newline {
            self.feed(b"\n", sink);
        }
    }

    /// Clear all scan state for reuse on a new input.
    pub fn reset(&mut self) {
        self.state = State::Newline;
        self.token.clear();
        self.line = 1;
        self.column = 0;
    }

    // -- token helpers --

    fn token_start(&mut self) {
        self.span.first_line = self.line;
        self.span.first_col = self.column;
        self.token_stop();
    }

    fn token_stop(&mut self) {
        self.span.last_line = self.line;
        self.span.last_col = self.column + 1;
    }

    fn emit(&mut self, token: Token, sink: &mut impl TokenSink) -> bool {
        self.token_stop();
        if sink.token(token, self.span) {
            true
        } else {
            self.state = State::Error;
            false
        }
    }

    fn error(&mut self, kind: LexErrorKind, sink: &mut impl TokenSink) {
        self.token_stop();
        self.token.clear();
        sink.lex_error(LexError { kind, span: self.span });
        sink.token(Token::Error, self.span);
        self.state = State::Error;
    }

    fn take_text(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.token).into_owned();
        self.token.clear();
        text
    }

    fn push_upper(&mut self, ch: u8) {
        self.token.push(ch.to_ascii_uppercase());
    }

    /// Emit the accumulated word as a `Str` token.
    fn emit_word(&mut self, sink: &mut impl TokenSink) -> bool {
        let text = self.take_text();
        self.emit(Token::Str(text), sink)
    }

    fn char_symbol(&mut self, kw: Keyword, sink: &mut impl TokenSink) -> bool {
        self.token_start();
        self.emit(Token::Keyword(kw), sink)
    }

    /// Emit `{` and switch to expression scanning.
    fn enter_expr(&mut self, sink: &mut impl TokenSink) {
        if self.char_symbol(Keyword::LeftBrace, sink) {
            self.state = State::Expr;
            self.nesting = 0;
        }
    }

    fn end_of_statement(&mut self, sink: &mut impl TokenSink) {
        self.token_start();
        sink.token(Token::EndOfStatement, self.span);
        self.state = State::Newline;
    }

    /// The accumulated symbol run is looked up as a single keyword.
    fn emit_symbol(&mut self, sink: &mut impl TokenSink) -> bool {
        self.token_stop();
        let text = self.take_text();
        match Keyword::from_str(&text) {
            Ok(kw) => self.emit(Token::Keyword(kw), sink),
            Err(_) => {
                self.error(LexErrorKind::IllegalOperator(text), sink);
                false
            }
        }
    }

    fn emit_keyword_or_identifier(&mut self, sink: &mut impl TokenSink) -> bool {
        self.token_stop();
        let text = self.take_text();
        match Keyword::from_str(&text) {
            Ok(kw) => self.emit(Token::Keyword(kw), sink),
            Err(_) => self.emit(Token::Identifier(text), sink),
        }
    }

    // -- numeric helpers --

    fn digit_exceeds(&self, value: i64, base: i64, max: i64) -> bool {
        self.int_value > (max - value) / base
    }

    fn add_safe_digit(&mut self, value: i64, base: i64) {
        self.int_value = self.int_value * base + value;
        self.digits += 1;
    }

    /// Accumulate a digit with an overflow diagnostic (bounded literals:
    /// binary, octal, escapes).
    fn add_digit(
        &mut self,
        value: i64,
        base: i64,
        max: i64,
        err: LexErrorKind,
        sink: &mut impl TokenSink,
    ) -> bool {
        if self.digit_exceeds(value, base, max) {
            self.error(err, sink);
            false
        } else {
            self.add_safe_digit(value, base);
            true
        }
    }

    fn apply_exponent(&mut self, base: f64) {
        self.float_value *= base.powi(self.exp_sign as i32 * self.int_value as i32);
    }

    /// Append the accumulated code point as UTF-8; unencodable values
    /// (surrogates) degrade to `?`.
    fn push_wchar(&mut self) {
        match char::from_u32(self.int_value as u32) {
            Some(c) => {
                let mut buf = [0u8; 4];
                self.token.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
            None => self.token.push(b'?'),
        }
    }

    /// Process one byte in the current state.  Returns `false` when the
    /// byte must be fed again to the (new) state.
    fn step(&mut self, ch: u8, sink: &mut impl TokenSink) -> bool {
        match self.state {
            State::Newline => match ch {
                b'N' | b'n' => {
                    self.state = State::LineNo;
                    true
                }
                b';' => {
                    self.state = State::EmptyLineComment;
                    true
                }
                b'\n' | b' ' | b'\t' | b'\x0b' | b'\r' => true,
                _ => {
                    self.state = State::Statement;
                    false
                }
            },

            State::Error => {
                if ch == b'\n' {
                    self.end_of_statement(sink);
                }
                true
            }

            State::LineNo => match ch {
                b'\n' => {
                    self.state = State::Newline;
                    true
                }
                b' ' | b'\t' | b'\x0b' | b'\r' => {
                    self.state = State::AfterLineNo;
                    true
                }
                b';' => {
                    self.state = State::EmptyLineComment;
                    true
                }
                b'{' => {
                    self.enter_expr(sink);
                    true
                }
                // Digits of the line number are discarded.
                _ => true,
            },

            State::AfterLineNo => match ch {
                b'\n' => {
                    self.state = State::Newline;
                    true
                }
                b' ' | b'\t' | b'\x0b' | b'\r' => true,
                b';' => {
                    self.state = State::EmptyLineComment;
                    true
                }
                _ => {
                    self.state = State::Statement;
                    false
                }
            },

            State::Statement => match ch {
                b'{' => {
                    self.enter_expr(sink);
                    true
                }
                b'\n' => {
                    self.end_of_statement(sink);
                    true
                }
                b';' => {
                    self.state = State::Comment;
                    true
                }
                b' ' | b'\t' | b'\x0b' | b'\r' => true,
                _ => {
                    self.token_start();
                    self.state = State::Word;
                    false
                }
            },

            State::Word => match ch {
                b'\n' => {
                    self.emit_word(sink);
                    self.end_of_statement(sink);
                    true
                }
                b' ' | b'\t' | b'\x0b' | b'\r' => {
                    if self.emit_word(sink) {
                        self.state = State::Statement;
                    }
                    true
                }
                b';' => {
                    if self.emit_word(sink) {
                        self.state = State::Comment;
                    }
                    true
                }
                b'{' => {
                    if self.emit_word(sink) && self.emit(Token::Bridge, sink) {
                        self.enter_expr(sink);
                    }
                    true
                }
                _ => {
                    self.push_upper(ch);
                    true
                }
            },

            State::Comment => {
                if ch == b'\n' {
                    self.end_of_statement(sink);
                }
                true
            }

            State::EmptyLineComment => {
                if ch == b'\n' {
                    self.state = State::Newline;
                }
                true
            }

            State::Expr => match ch {
                b'\n' => {
                    self.token_start();
                    self.error(LexErrorKind::UnterminatedExpression, sink);
                    false
                }
                b' ' | b'\t' | b'\x0b' | b'\r' => true,
                b'(' => {
                    self.nesting += 1;
                    self.char_symbol(Keyword::LeftParen, sink);
                    true
                }
                b')' => {
                    self.nesting = self.nesting.saturating_sub(1);
                    self.char_symbol(Keyword::RightParen, sink);
                    true
                }
                b'}' => {
                    if self.char_symbol(Keyword::RightBrace, sink) {
                        self.state = State::AfterExpr;
                    }
                    true
                }
                b'{' => {
                    self.char_symbol(Keyword::LeftBrace, sink);
                    true
                }
                b'[' => {
                    self.char_symbol(Keyword::LeftBracket, sink);
                    true
                }
                b']' => {
                    self.char_symbol(Keyword::RightBracket, sink);
                    true
                }
                b',' => {
                    self.char_symbol(Keyword::Comma, sink);
                    true
                }
                b'0' => {
                    self.token_start();
                    self.state = State::NumberBase;
                    true
                }
                b'\'' | b'`' => {
                    self.token_start();
                    self.error(LexErrorKind::UnexpectedChar(ch as char), sink);
                    true
                }
                b'.' => {
                    // Either the start of a fraction (`.5`) or the member
                    // access operator; decided by the next character.
                    self.token_start();
                    self.state = State::ExprDot;
                    true
                }
                b'"' => {
                    self.token_start();
                    self.state = State::Str;
                    true
                }
                b'1'..=b'9' => {
                    self.token_start();
                    self.int_value = 0;
                    self.digits = 0;
                    self.state = State::Decimal;
                    false
                }
                _ if is_symbol_char(ch) => {
                    self.token_start();
                    self.token.push(ch);
                    self.state = State::Symbol;
                    true
                }
                _ => {
                    self.token_start();
                    self.push_upper(ch);
                    self.state = State::Identifier;
                    true
                }
            },

            State::ExprDot => match ch {
                b'0'..=b'9' => {
                    self.float_value = 0.;
                    self.fraction = 1.;
                    self.state = State::DecimalFraction;
                    false
                }
                _ => {
                    if self.emit(Token::Keyword(Keyword::Dot), sink) {
                        self.state = State::Expr;
                    }
                    false
                }
            },

            State::AfterExpr => match ch {
                b'\n' | b';' | b' ' | b'\t' | b'\x0b' | b'\r' => {
                    self.state = State::Statement;
                    false
                }
                b'{' => {
                    if self.emit(Token::Bridge, sink) {
                        self.state = State::Statement;
                    }
                    false
                }
                _ => {
                    if self.emit(Token::Bridge, sink) {
                        self.token_start();
                        self.state = State::Word;
                    }
                    false
                }
            },

            State::Symbol => {
                if is_symbol_char(ch) {
                    self.token.push(ch);
                    true
                } else if !self.emit_symbol(sink) {
                    false
                } else if ch == b'\n' {
                    self.token_start();
                    self.error(LexErrorKind::UnterminatedExpression, sink);
                    false
                } else {
                    self.state = State::Expr;
                    false
                }
            }

            State::Identifier => {
                if is_ident_char(ch) {
                    self.push_upper(ch);
                    true
                } else {
                    if self.emit_keyword_or_identifier(sink) {
                        self.state = State::Expr;
                    }
                    false
                }
            }

            State::Str => match ch {
                b'\\' => {
                    self.state = State::StrEscape;
                    true
                }
                b'"' => {
                    let text = self.take_text();
                    if self.emit(Token::Str(text), sink) {
                        self.state = State::Expr;
                    }
                    true
                }
                b'\n' => {
                    self.error(LexErrorKind::UnterminatedString, sink);
                    false
                }
                _ => {
                    self.token.push(ch);
                    true
                }
            },

            State::StrEscape => {
                let simple = match ch {
                    b'a' => Some(0x07),
                    b'b' => Some(0x08),
                    b'e' => Some(0x1b),
                    b'f' => Some(0x0c),
                    b'n' => Some(0x0a),
                    b'r' => Some(0x0d),
                    b't' => Some(0x09),
                    b'v' => Some(0x0b),
                    b'\\' => Some(0x5c),
                    b'\'' => Some(0x27),
                    b'"' => Some(0x22),
                    b'?' => Some(0x3f),
                    _ => None,
                };
                if let Some(byte) = simple {
                    self.token.push(byte);
                    self.state = State::Str;
                    return true;
                }
                match ch {
                    b'x' => {
                        self.int_value = 0;
                        self.digits = 0;
                        self.state = State::StrHex;
                        true
                    }
                    b'u' => {
                        self.int_value = 0;
                        self.digits = 0;
                        self.state = State::StrLowUnicode;
                        true
                    }
                    b'U' => {
                        self.int_value = 0;
                        self.digits = 0;
                        self.state = State::StrHighUnicode;
                        true
                    }
                    b'\n' => {
                        self.error(LexErrorKind::UnterminatedString, sink);
                        false
                    }
                    b'0'..=b'9' => {
                        self.int_value = 0;
                        self.digits = 0;
                        self.state = State::StrOctal;
                        false
                    }
                    _ => {
                        self.error(LexErrorKind::IllegalEscape(ch as char), sink);
                        true
                    }
                }
            }

            State::StrOctal => match ch {
                b'0'..=b'7' => {
                    if self.add_digit(
                        (ch - b'0') as i64,
                        8,
                        255,
                        LexErrorKind::OctalEscapeRange,
                        sink,
                    ) && self.digits == 3
                    {
                        let byte = self.int_value as u8;
                        self.token.push(byte);
                        self.state = State::Str;
                    }
                    true
                }
                b'8' | b'9' => {
                    self.error(LexErrorKind::OctalEscapeDigit, sink);
                    true
                }
                _ => {
                    let byte = self.int_value as u8;
                    self.token.push(byte);
                    self.state = State::Str;
                    false
                }
            },

            State::StrHex => match hex_digit(ch) {
                Some(value) => {
                    self.add_digit(value, 16, 255, LexErrorKind::HexEscapeRange, sink);
                    true
                }
                None => {
                    if self.digits == 0 {
                        self.error(LexErrorKind::HexEscapeEmpty, sink);
                        true
                    } else {
                        let byte = self.int_value as u8;
                        self.token.push(byte);
                        self.state = State::Str;
                        false
                    }
                }
            },

            State::StrLowUnicode => match hex_digit(ch) {
                Some(value) => {
                    self.add_safe_digit(value, 16);
                    if self.digits == 4 {
                        self.push_wchar();
                        self.state = State::Str;
                    }
                    true
                }
                None => {
                    self.error(LexErrorKind::LowUnicodeEscape, sink);
                    true
                }
            },

            State::StrHighUnicode => match hex_digit(ch) {
                Some(value) => {
                    if self.add_digit(value, 16, UNICODE_MAX, LexErrorKind::UnicodeRange, sink)
                        && self.digits == 8
                    {
                        self.push_wchar();
                        self.state = State::Str;
                    }
                    true
                }
                None => {
                    self.error(LexErrorKind::HighUnicodeEscape, sink);
                    true
                }
            },

            State::NumberBase => match ch {
                b'b' | b'B' => {
                    self.int_value = 0;
                    self.digits = 0;
                    self.state = State::Binary;
                    true
                }
                b'x' | b'X' => {
                    self.int_value = 0;
                    self.digits = 0;
                    self.state = State::Hex;
                    true
                }
                b'.' => {
                    self.float_value = 0.;
                    self.fraction = 1.;
                    self.state = State::DecimalFraction;
                    true
                }
                b'e' | b'E' => {
                    self.float_value = 0.;
                    self.state = State::DecimalExponentSign;
                    true
                }
                b'0'..=b'9' => {
                    self.int_value = 0;
                    self.digits = 0;
                    self.state = State::Octal;
                    false
                }
                _ => {
                    if self.emit(Token::Int(0), sink) {
                        self.state = State::Expr;
                    }
                    false
                }
            },

            State::Decimal => match ch {
                b'.' => {
                    self.float_value = self.int_value as f64;
                    self.fraction = 1.;
                    self.state = State::DecimalFraction;
                    true
                }
                b'e' | b'E' => {
                    self.float_value = self.int_value as f64;
                    self.state = State::DecimalExponentSign;
                    true
                }
                b'0'..=b'9' => {
                    let value = (ch - b'0') as i64;
                    if self.digit_exceeds(value, 10, i64::MAX) {
                        // Promote before the overflowing digit; it is
                        // rescanned as a float digit.
                        self.float_value = self.int_value as f64;
                        self.state = State::DecimalFloat;
                        false
                    } else {
                        self.add_safe_digit(value, 10);
                        true
                    }
                }
                _ => {
                    if self.emit(Token::Int(self.int_value), sink) {
                        self.state = State::Expr;
                    }
                    false
                }
            },

            State::Hex => match ch {
                b'.' => {
                    self.float_value = self.int_value as f64;
                    self.fraction = 1.;
                    self.state = State::HexFraction;
                    true
                }
                b'p' | b'P' => {
                    self.float_value = self.int_value as f64;
                    self.state = State::HexExponentSign;
                    true
                }
                _ => match hex_digit(ch) {
                    Some(value) => {
                        if self.digit_exceeds(value, 16, i64::MAX) {
                            self.float_value = self.int_value as f64;
                            self.state = State::HexFloat;
                            false
                        } else {
                            self.add_safe_digit(value, 16);
                            true
                        }
                    }
                    None => {
                        if self.emit(Token::Int(self.int_value), sink) {
                            self.state = State::Expr;
                        }
                        false
                    }
                },
            },

            State::Binary => match ch {
                b'0' | b'1' => {
                    self.add_digit(
                        (ch - b'0') as i64,
                        2,
                        i64::MAX,
                        LexErrorKind::BinaryRange,
                        sink,
                    );
                    true
                }
                b'.' => {
                    self.error(LexErrorKind::BinaryFraction, sink);
                    true
                }
                b'2'..=b'9' => {
                    self.error(LexErrorKind::BinaryDigit(ch as char), sink);
                    true
                }
                _ => {
                    if self.emit(Token::Int(self.int_value), sink) {
                        self.state = State::Expr;
                    }
                    false
                }
            },

            State::Octal => match ch {
                b'0'..=b'7' => {
                    self.add_digit(
                        (ch - b'0') as i64,
                        8,
                        i64::MAX,
                        LexErrorKind::OctalRange,
                        sink,
                    );
                    true
                }
                b'.' => {
                    self.error(LexErrorKind::OctalFraction, sink);
                    true
                }
                b'8' | b'9' => {
                    self.error(LexErrorKind::OctalDigit(ch as char), sink);
                    true
                }
                _ => {
                    if self.emit(Token::Int(self.int_value), sink) {
                        self.state = State::Expr;
                    }
                    false
                }
            },

            State::DecimalFloat => match ch {
                b'.' => {
                    self.fraction = 1.;
                    self.state = State::DecimalFraction;
                    true
                }
                b'e' | b'E' => {
                    self.state = State::DecimalExponentSign;
                    true
                }
                b'0'..=b'9' => {
                    self.float_value = self.float_value * 10. + (ch - b'0') as f64;
                    true
                }
                _ => {
                    if self.emit(Token::Float(self.float_value), sink) {
                        self.state = State::Expr;
                    }
                    false
                }
            },

            State::DecimalFraction => match ch {
                b'e' | b'E' => {
                    self.state = State::DecimalExponentSign;
                    true
                }
                b'0'..=b'9' => {
                    self.fraction /= 10.;
                    self.float_value += (ch - b'0') as f64 * self.fraction;
                    true
                }
                _ => {
                    if self.emit(Token::Float(self.float_value), sink) {
                        self.state = State::Expr;
                    }
                    false
                }
            },

            State::DecimalExponentSign => {
                let consumed = if ch == b'-' {
                    self.exp_sign = -1;
                    true
                } else {
                    self.exp_sign = 1;
                    false
                };
                self.int_value = 0;
                self.digits = 0;
                self.state = State::DecimalExponent;
                consumed
            }

            State::DecimalExponent => match ch {
                b'0'..=b'9' => {
                    if self.digits == 3 {
                        self.error(LexErrorKind::DecimalExponentLength, sink);
                    } else {
                        self.add_safe_digit((ch - b'0') as i64, 10);
                    }
                    true
                }
                _ => {
                    if self.digits == 0 {
                        self.error(LexErrorKind::DecimalExponentEmpty, sink);
                        true
                    } else {
                        self.apply_exponent(10.);
                        if self.emit(Token::Float(self.float_value), sink) {
                            self.state = State::Expr;
                        }
                        false
                    }
                }
            },

            State::HexFloat => match ch {
                b'.' => {
                    self.fraction = 1.;
                    self.state = State::HexFraction;
                    true
                }
                b'p' | b'P' => {
                    self.state = State::HexExponentSign;
                    true
                }
                _ => match hex_digit(ch) {
                    Some(value) => {
                        self.float_value = self.float_value * 16. + value as f64;
                        true
                    }
                    None => {
                        if self.emit(Token::Float(self.float_value), sink) {
                            self.state = State::Expr;
                        }
                        false
                    }
                },
            },

            State::HexFraction => match ch {
                b'p' | b'P' => {
                    self.state = State::HexExponentSign;
                    true
                }
                _ => match hex_digit(ch) {
                    Some(value) => {
                        self.fraction /= 16.;
                        self.float_value += value as f64 * self.fraction;
                        true
                    }
                    None => {
                        if self.emit(Token::Float(self.float_value), sink) {
                            self.state = State::Expr;
                        }
                        false
                    }
                },
            },

            State::HexExponentSign => {
                let consumed = if ch == b'-' {
                    self.exp_sign = -1;
                    true
                } else {
                    self.exp_sign = 1;
                    false
                };
                self.int_value = 0;
                self.digits = 0;
                self.state = State::HexExponent;
                consumed
            }

            State::HexExponent => match hex_digit(ch) {
                Some(value) => {
                    if self.digits == 2 {
                        self.error(LexErrorKind::HexExponentLength, sink);
                    } else {
                        self.add_safe_digit(value, 16);
                    }
                    true
                }
                None => {
                    if self.digits == 0 {
                        self.error(LexErrorKind::HexExponentEmpty, sink);
                        true
                    } else {
                        self.apply_exponent(16.);
                        if self.emit(Token::Float(self.float_value), sink) {
                            self.state = State::Expr;
                        }
                        false
                    }
                }
            },
        }
    }
}

const UNICODE_MAX: i64 = 0x10ffff;

fn hex_digit(ch: u8) -> Option<i64> {
    match ch {
        b'0'..=b'9' => Some((ch - b'0') as i64),
        b'a'..=b'f' => Some((10 + ch - b'a') as i64),
        b'A'..=b'F' => Some((10 + ch - b'A') as i64),
        _ => None,
    }
}

fn is_ident_char(ch: u8) -> bool {
    ch.is_ascii_alphanumeric() || ch == b'_' || ch == b'$'
}

/// Characters that form greedy multi-character operator runs (`<=`, `**`).
/// Delimiters — parens, brackets, braces, comma, dot — are emitted directly
/// by the expression state and never join a run.
fn is_symbol_char(ch: u8) -> bool {
    matches!(
        ch,
        b'~' | b'!'
            | b'@'
            | b'#'
            | b'%'
            | b'^'
            | b'&'
            | b'*'
            | b'-'
            | b'+'
            | b'='
            | b'|'
            | b'\\'
            | b':'
            | b'<'
            | b'>'
            | b'?'
            | b'/'
    )
}
