// Copyright (c) 2019 Georg Brandl.  Licensed under the Apache License,
// Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at
// your option. This file may not be copied, modified, or distributed except
// according to those terms.

use xgc::ast::{Span, Statement};
use xgc::lexer::Lexer;
use xgc::parse::{ParseSink, Parser, StatementSink};

#[derive(Default)]
struct Collect {
    statements: Vec<Statement>,
    errors: Vec<(String, Span)>,
}

impl StatementSink for Collect {
    fn statement(&mut self, stmt: Statement) -> bool {
        self.statements.push(stmt);
        true
    }

    fn error(&mut self, message: String, span: Span) {
        self.errors.push((message, span));
    }
}

fn parse(input: &str) -> Collect {
    let mut lexer = Lexer::new();
    let mut parser = Parser::new();
    let mut out = Collect::default();
    let mut sink = ParseSink { parser: &mut parser, out: &mut out };
    lexer.feed(input.as_bytes(), &mut sink);
    lexer.finish(&mut sink);
    out
}

/// Parse a single statement and return its canonical display form.
fn display(input: &str) -> String {
    let out = parse(input);
    assert_eq!(out.errors, vec![], "unexpected errors for {:?}", input);
    assert_eq!(out.statements.len(), 1, "expected one statement for {:?}", input);
    out.statements[0].to_string()
}

#[test]
fn test_words() {
    assert_eq!(display("G1 X10 Y20\n"), "G1 X10 Y20");
    assert_eq!(display("N42 g1 x0 ; comment\n"), "G1 X0");
}

#[test]
fn test_bridged_fields() {
    assert_eq!(display("G1 X{1}\n"), "G1 X{1}");
    assert_eq!(display("X{1}{2}y\n"), "X{1}{2}Y");
    assert_eq!(display("{1}\n"), "{1}");
}

#[test]
fn test_precedence() {
    assert_eq!(display("{1+2*3}\n"), "{1 + (2 * 3)}");
    assert_eq!(display("{1*2+3}\n"), "{(1 * 2) + 3}");
    assert_eq!(display("{1~2+3}\n"), "{1 ~ (2 + 3)}");
    assert_eq!(display("{1 or 2 and 3}\n"), "{1 OR (2 AND 3)}");
    // Comparisons bind tighter than the additive operators in this
    // dialect.
    assert_eq!(display("{1 < 2 + 3}\n"), "{(1 < 2) + 3}");
    // Exponentiation binds tighter than the ternary, looser than unary
    // minus.
    assert_eq!(display("{-2 ** 2}\n"), "{-2 ** 2}");
    assert_eq!(display("{(1+2)*3}\n"), "{(1 + 2) * 3}");
}

#[test]
fn test_left_associativity() {
    assert_eq!(display("{1-2-3}\n"), "{(1 - 2) - 3}");
    assert_eq!(display("{8/4/2}\n"), "{(8 / 4) / 2}");
}

#[test]
fn test_ternary() {
    assert_eq!(display("{1 if 2 else 3}\n"), "{1 IF 2 ELSE 3}");
    // Right-associative: the alternative takes the nested conditional.
    assert_eq!(
        display("{1 if 2 else 3 if 4 else 5}\n"),
        "{1 IF 2 ELSE (3 IF 4 ELSE 5)}"
    );
    // The condition is delimited by ELSE and may hold any expression.
    assert_eq!(display("{1 if 2 or 3 else 4}\n"), "{1 IF (2 OR 3) ELSE 4}");
}

#[test]
fn test_unary() {
    assert_eq!(display("{!1}\n"), "{!1}");
    assert_eq!(display("{--1}\n"), "{--1}");
    assert_eq!(display("{-(1+2)}\n"), "{-(1 + 2)}");
}

#[test]
fn test_member_access() {
    assert_eq!(display("{foo.bar.baz}\n"), "{FOO.BAR.BAZ}");
    assert_eq!(display("{foo[\"bar\"]}\n"), "{FOO[\"bar\"]}");
    assert_eq!(display("{foo[\"A\" ~ \"B\"].baz}\n"), "{FOO[\"A\" ~ \"B\"].BAZ}");
    // Member access binds tighter than unary minus.
    assert_eq!(display("{-foo.bar}\n"), "{-FOO.BAR}");
}

#[test]
fn test_calls() {
    assert_eq!(display("{str(1)}\n"), "{STR(1)}");
    assert_eq!(display("{int(1 + 2)}\n"), "{INT(1 + 2)}");
    assert_eq!(display("{f(1, 2, 3)}\n"), "{F(1, 2, 3)}");
    assert_eq!(display("{f()}\n"), "{F()}");
}

#[test]
fn test_literals() {
    assert_eq!(display("{true} {false} {inf}\n"), "{TRUE} {FALSE} {inf}");
    assert_eq!(display("{\"a b\"}\n"), "{\"a b\"}");
    assert_eq!(display("{1.25}\n"), "{1.250000}");
}

#[test]
fn test_command_word() {
    let out = parse("M112\n");
    assert_eq!(out.statements[0].command_word(), Some("M112"));
    let out = parse("{\"M\"}{112}\n");
    assert_eq!(out.statements[0].command_word(), None);
}

#[test]
fn test_syntax_errors() {
    let out = parse("{1 2}\n");
    assert!(out.statements.is_empty());
    assert_eq!(out.errors.len(), 1);
    assert!(
        out.errors[0].0.contains("Unexpected number"),
        "got: {}",
        out.errors[0].0
    );

    let out = parse("{}\n");
    assert!(out.errors[0].0.contains("expected an expression"));

    let out = parse("{1 if 2}\n");
    assert!(out.errors[0].0.contains("\"ELSE\""), "got: {}", out.errors[0].0);
}

#[test]
fn test_error_recovery() {
    // A malformed statement produces one diagnostic and does not affect
    // its neighbors.
    let out = parse("G0\n{*}\nM18\n");
    assert_eq!(out.errors.len(), 1);
    let rendered: Vec<String> = out.statements.iter().map(|s| s.to_string()).collect();
    assert_eq!(rendered, ["G0", "M18"]);
}

#[test]
fn test_lex_error_suppresses_parser_diagnostic() {
    // The lexer reported already; the parser must not add a second error
    // for the same statement.
    let out = parse("G1 {\"u\nM18\n");
    assert_eq!(out.errors.len(), 1);
    assert!(out.errors[0].0.contains("Unterminated string"));
    let rendered: Vec<String> = out.statements.iter().map(|s| s.to_string()).collect();
    assert_eq!(rendered, ["M18"]);
}

#[test]
fn test_statement_spans() {
    let out = parse("  G1 X0\n");
    let span = out.statements[0].span;
    assert_eq!((span.first_line, span.first_col), (1, 3));
    assert_eq!(span.last_line, 1);

    let out = parse("{1 2}\n");
    assert_eq!(out.errors[0].1.first_line, 1);
}

#[test]
fn test_push_parsing_is_incremental() {
    // Statements are delivered as soon as their line terminator arrives.
    let mut lexer = Lexer::new();
    let mut parser = Parser::new();
    let mut out = Collect::default();
    let mut sink = ParseSink { parser: &mut parser, out: &mut out };
    lexer.feed(b"G1 X0\nG2 ", &mut sink);
    assert_eq!(sink.out.statements.len(), 1);
    lexer.feed(b"Y5\n", &mut sink);
    assert_eq!(sink.out.statements.len(), 2);
    let rendered: Vec<String> = sink.out.statements.iter().map(|s| s.to_string()).collect();
    assert_eq!(rendered, ["G1 X0", "G2 Y5"]);
}
