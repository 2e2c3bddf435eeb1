// Copyright (c) 2019 Georg Brandl.  Licensed under the Apache License,
// Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at
// your option. This file may not be copied, modified, or distributed except
// according to those terms.

//! End-to-end tests: bytes in, `(command, fields[])` out.

use xgc::eval::{Handler, Value};
use xgc::queue::{Executor, Outcome, Queue};

/// Test host with the environment
/// `FOO.BAR.BAZ = "5"`, `POS = 7`, `SPEED = 1.5`, `NAME = "alpha"`.
#[derive(Default)]
struct Host {
    m112: usize,
    errors: Vec<String>,
    execs: Vec<String>,
    reject: bool,
}

impl Handler for Host {
    type Dict = &'static str;

    fn lookup(&mut self, parent: Option<&&'static str>, key: &str) -> Option<Value<&'static str>> {
        match (parent.copied(), key) {
            (None, "FOO") => Some(Value::Dict("foo")),
            (Some("foo"), "BAR") => Some(Value::Dict("bar")),
            (Some("bar"), "BAZ") => Some(Value::Str("5".into())),
            (None, "POS") => Some(Value::Int(7)),
            (None, "SPEED") => Some(Value::Float(1.5)),
            (None, "NAME") => Some(Value::Str("alpha".into())),
            _ => None,
        }
    }

    fn serialize(&mut self, dict: &&'static str) -> String {
        format!("#<dict:{}>", dict)
    }

    fn exec(&mut self, command: &str, fields: &[String]) -> bool {
        let mut line = command.to_string();
        for field in fields {
            line.push(' ');
            line.push_str(field);
        }
        self.execs.push(line);
        !self.reject
    }

    fn error(&mut self, message: &str) {
        self.errors.push(message.into());
    }

    fn m112(&mut self) {
        self.m112 += 1;
    }
}

type Record = Result<(String, Vec<String>), String>;

fn drain(queue: &mut Queue, exec: &mut Executor<Host>) -> Vec<Record> {
    let mut records = Vec::new();
    loop {
        match queue.exec_next(exec) {
            (Outcome::Empty, 0) => break,
            (Outcome::Empty, _) => (),
            (Outcome::Error(message), _) => records.push(Err(message)),
            (Outcome::Command { name, fields }, _) => {
                records.push(Ok((name.to_string(), fields.to_vec())))
            }
        }
    }
    records
}

fn run(input: &str) -> (Vec<Record>, Host) {
    let mut exec = Executor::new(Host::default());
    let mut queue = Queue::new();
    queue.feed(&mut exec, input.as_bytes());
    queue.feed_finish(&mut exec);
    let records = drain(&mut queue, &mut exec);
    (records, exec.into_handler())
}

fn ok(command: &str, fields: &[&str]) -> Record {
    Ok((command.into(), fields.iter().map(|f| f.to_string()).collect()))
}

#[test]
fn test_plain_words() {
    assert_eq!(run("G1 X10 Y20\n").0, [ok("G1", &["X10", "Y20"])]);
}

#[test]
fn test_lineno_and_case() {
    assert_eq!(run("N42 g1 x0\n").0, [ok("G1", &["X0"])]);
}

#[test]
fn test_arithmetic_interpolation() {
    assert_eq!(run("G1 X{1+2*3}\n").0, [ok("G1", &["X7"])]);
}

#[test]
fn test_string_concat() {
    assert_eq!(
        run("M117 {\"hello\" ~ \" \" ~ \"world\"}\n").0,
        [ok("M117", &["hello world"])]
    );
}

#[test]
fn test_nested_lookup() {
    assert_eq!(run("G1 X{foo.bar.baz}\n").0, [ok("G1", &["X5"])]);
    assert_eq!(run("G1 X{foo[\"BAR\"][\"BAZ\"]}\n").0, [ok("G1", &["X5"])]);
}

#[test]
fn test_comment_and_blank_lines() {
    assert_eq!(run("; comment only\n\n  ; blank\n M18\n").0, [ok("M18", &[])]);
}

#[test]
fn test_error_then_recovery() {
    let (records, host) = run("G1 X{1/0}\nM18\n");
    assert_eq!(records.len(), 2);
    let err = records[0].as_ref().unwrap_err();
    assert!(err.contains("ivision by zero"), "got: {}", err);
    assert!(err.contains("line 1"), "got: {}", err);
    assert_eq!(records[1], ok("M18", &[]));
    assert_eq!(host.errors.len(), 1);
}

#[test]
fn test_lex_error_then_recovery() {
    let (records, host) = run("G1 X{\"oops\nM18\n");
    assert_eq!(records.len(), 2);
    assert!(records[0].as_ref().unwrap_err().contains("Unterminated string"));
    assert_eq!(records[1], ok("M18", &[]));
    assert_eq!(host.errors.len(), 1);
}

#[test]
fn test_m112_fires_on_feed() {
    let mut exec = Executor::new(Host::default());
    let mut queue = Queue::new();
    queue.feed(&mut exec, b"G1 X0\nM112\nM18\n");
    // The emergency stop fires during feed, before anything executes.
    assert_eq!(exec.handler().m112, 1);
    assert!(exec.handler().execs.is_empty());

    let records = drain(&mut queue, &mut exec);
    assert_eq!(
        records,
        [ok("G1", &["X0"]), ok("M112", &[]), ok("M18", &[])]
    );
    assert_eq!(exec.handler().m112, 1);
}

#[test]
fn test_m112_requires_exact_word() {
    let (_, host) = run("M1121\nM11\n");
    assert_eq!(host.m112, 0);
}

#[test]
fn test_ring_growth_preserves_order() {
    let mut input = String::new();
    for i in 0..100 {
        input.push_str(&format!("T{} P{}\n", i, i));
    }
    let (records, _) = run(&input);
    assert_eq!(records.len(), 100);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(
            *record,
            ok(&format!("T{}", i), &[&format!("P{}", i)]),
            "at index {}",
            i
        );
    }
}

#[test]
fn test_interleaved_feed_and_drain() {
    let mut exec = Executor::new(Host::default());
    let mut queue = Queue::new();
    assert_eq!(queue.feed(&mut exec, b"M1\nM2\n"), 2);

    let (outcome, remaining) = queue.exec_next(&mut exec);
    assert!(matches!(outcome, Outcome::Command { name: "M1", .. }));
    assert_eq!(remaining, 1);

    assert_eq!(queue.feed(&mut exec, b"M3\n"), 2);
    let records = drain(&mut queue, &mut exec);
    assert_eq!(records, [ok("M2", &[]), ok("M3", &[])]);

    let (outcome, remaining) = queue.exec_next(&mut exec);
    assert_eq!(outcome, Outcome::Empty);
    assert_eq!(remaining, 0);
}

#[test]
fn test_literal_round_trip() {
    let (records, _) = run("{42}\n{1.5}\n{true}\n{false}\n{\"x\"}\n{0b110}\n{0x10}\n");
    let commands: Vec<&str> = records
        .iter()
        .map(|r| r.as_ref().unwrap().0.as_str())
        .collect();
    assert_eq!(commands, ["42", "1.500000", "true", "false", "x", "6", "16"]);
}

#[test]
fn test_special_floats() {
    let (records, _) = run("{inf} {-inf} {nan} {infinity}\n");
    assert_eq!(records, [ok("inf", &["-inf", "nan", "inf"])]);
}

#[test]
fn test_arithmetic_rules() {
    let (records, _) = run("E {10/4} {7 % 3} {2 ** 10} {1.0/0} {-1.0/0}\n");
    assert_eq!(
        records,
        [ok("E", &["2", "1", "1024", "inf", "-inf"])]
    );
}

#[test]
fn test_float_widening() {
    let (records, _) = run("E {1 + 0.5} {2 ** 0.5} {3 * 1.5}\n");
    assert_eq!(records, [ok("E", &["1.500000", "1.414214", "4.500000"])]);
}

#[test]
fn test_overflow_widens_to_float() {
    let (records, _) = run("E {9223372036854775807 + 1}\n");
    assert_eq!(records, [ok("E", &["9223372036854775808.000000"])]);
}

#[test]
fn test_int_division_by_zero_is_error() {
    let (records, _) = run("E {1/0}\n");
    assert!(records[0].as_ref().unwrap_err().contains("ivision by zero"));
    let (records, _) = run("E {1%0}\n");
    assert!(records[0].as_ref().unwrap_err().contains("ivision by zero"));
}

#[test]
fn test_casts() {
    let (records, _) = run("E {int(\"42\")} {float(1)} {str(123)} {bool(0)} {bool(\"\")} {int(3.9)}\n");
    assert_eq!(
        records,
        [ok("E", &["42", "1.000000", "123", "false", "false", "3"])]
    );
}

#[test]
fn test_bad_cast_is_error() {
    let (records, _) = run("E {int(\"4x2\")}\n");
    assert!(records[0]
        .as_ref()
        .unwrap_err()
        .contains("Cannot convert '4x2' to an integer"));
}

#[test]
fn test_comparisons_widen() {
    let (records, _) = run("E {1 = 1.0} {\"5\" = 5} {\"b\" > \"a\"} {true = 1} {2 <= 1}\n");
    assert_eq!(
        records,
        [ok("E", &["true", "true", "true", "true", "false"])]
    );
}

#[test]
fn test_logical_ops_do_not_short_circuit() {
    // Both operands are evaluated: the unknown parameter surfaces even
    // though the left side already decides the result.
    let (records, _) = run("E {false and nope}\n");
    assert!(records[0]
        .as_ref()
        .unwrap_err()
        .contains("Parameter 'NOPE' is not defined"));

    let (records, _) = run("E {true or nope}\n");
    assert!(records[0].is_err());

    let (records, _) = run("E {1 and 2} {0 or 0}\n");
    assert_eq!(records, [ok("E", &["true", "false"])]);
}

#[test]
fn test_ternary_takes_one_branch() {
    // Only the selected branch is evaluated.
    let (records, _) = run("E {1 if true else nope} {nope if false else 2}\n");
    assert_eq!(records, [ok("E", &["1", "2"])]);
}

#[test]
fn test_lookup_errors() {
    let (records, _) = run("E {nope}\n");
    assert!(records[0]
        .as_ref()
        .unwrap_err()
        .contains("Parameter 'NOPE' is not defined"));

    let (records, _) = run("E {foo.nope}\n");
    assert!(records[0].as_ref().unwrap_err().contains("No property 'NOPE'"));

    let (records, _) = run("E {name.x}\n");
    assert!(records[0]
        .as_ref()
        .unwrap_err()
        .contains("Cannot look up 'X' in a string value"));
}

#[test]
fn test_parameter_values() {
    let (records, _) = run("G1 X{pos} F{speed} ; uses the host env\n");
    assert_eq!(records, [ok("G1", &["X7", "F1.500000"])]);
}

#[test]
fn test_dict_serialization() {
    let (records, _) = run("M117 {foo}\n");
    assert_eq!(records, [ok("M117", &["#<dict:foo>"])]);
}

#[test]
fn test_default_serialize_fallback() {
    struct Bare;
    impl Handler for Bare {
        type Dict = u8;
        fn lookup(&mut self, parent: Option<&u8>, key: &str) -> Option<Value<u8>> {
            match (parent, key) {
                (None, "OBJ") => Some(Value::Dict(1)),
                _ => None,
            }
        }
    }

    let mut exec = Executor::new(Bare);
    let mut queue = Queue::new();
    queue.feed(&mut exec, b"M117 {obj}\n");
    match queue.exec_next(&mut exec) {
        (Outcome::Command { fields, .. }, _) => assert_eq!(fields, ["<obj>"]),
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[test]
fn test_undefined_function() {
    let (records, _) = run("E {magic(1)}\n");
    assert!(records[0]
        .as_ref()
        .unwrap_err()
        .contains("Function 'MAGIC' is undefined"));

    let (records, _) = run("E {int(1, 2)}\n");
    assert!(records[0]
        .as_ref()
        .unwrap_err()
        .contains("takes exactly one argument"));
}

#[test]
fn test_exec_callback_sees_commands() {
    let (_, host) = run("G1 X{pos}\nM18\n");
    assert_eq!(host.execs, ["G1 X7", "M18"]);
}

#[test]
fn test_host_rejection_is_statement_scoped() {
    let mut exec = Executor::new(Host { reject: true, ..Host::default() });
    let mut queue = Queue::new();
    queue.feed(&mut exec, b"M18\nM19\n");
    queue.feed_finish(&mut exec);
    let records = drain(&mut queue, &mut exec);
    assert_eq!(records.len(), 2);
    for record in &records {
        assert!(record.as_ref().unwrap_err().contains("rejected by host"));
    }
    // Both statements reached the host despite the rejections.
    assert_eq!(exec.handler().execs, ["M18", "M19"]);
}

#[test]
fn test_error_order_is_source_order() {
    let (records, _) = run("M1\n{\"bad\nM2\n{1 2}\nM3\n");
    assert_eq!(records.len(), 5);
    assert_eq!(records[0], ok("M1", &[]));
    assert!(records[1].is_err());
    assert_eq!(records[2], ok("M2", &[]));
    assert!(records[3].is_err());
    assert_eq!(records[4], ok("M3", &[]));
}

#[test]
fn test_incremental_equivalence_all_splits() {
    let input = "N1 G1 X{1+2} Y{\"a\" ~ \"b\"}\nM117 {foo.bar.baz}\n; c\nM18 E{0x10}\n";
    let (whole, _) = run(input);
    for split in 0..=input.len() {
        let mut exec = Executor::new(Host::default());
        let mut queue = Queue::new();
        queue.feed(&mut exec, &input.as_bytes()[..split]);
        queue.feed(&mut exec, &input.as_bytes()[split..]);
        queue.feed_finish(&mut exec);
        let records = drain(&mut queue, &mut exec);
        assert_eq!(records, whole, "split at {}", split);
    }
}

#[test]
fn test_incremental_equivalence_mid_escape() {
    let input = "M117 {\"\\x41\\u00E9\" ~ str(1.5e1)}\n";
    let (whole, _) = run(input);
    assert_eq!(whole, [ok("M117", &["Aé15.000000"])]);
    for split in 0..=input.len() {
        let mut exec = Executor::new(Host::default());
        let mut queue = Queue::new();
        queue.feed(&mut exec, &input.as_bytes()[..split]);
        queue.feed(&mut exec, &input.as_bytes()[split..]);
        queue.feed_finish(&mut exec);
        let records = drain(&mut queue, &mut exec);
        assert_eq!(records, whole, "split at {}", split);
    }
}

#[test]
fn test_feed_finish_flushes() {
    let (records, _) = run("M18");
    assert_eq!(records, [ok("M18", &[])]);
}

#[test]
fn test_empty_input() {
    assert!(run("").0.is_empty());
    assert!(run("\n\n  \n").0.is_empty());
}
