// Copyright (c) 2019 Georg Brandl.  Licensed under the Apache License,
// Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at
// your option. This file may not be copied, modified, or distributed except
// according to those terms.

//! Reference driver: compiles a file of G-code and prints each flattened
//! command, one field per line.  The environment is a fixed demo
//! dictionary (`FOO.BAR.BIZ = "baz"`).

use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use xgc::eval::{Handler, Value};
use xgc::queue::{Executor, Outcome, Queue};

#[derive(Parser)]
#[command(version, about = "Compile G-code with embedded expressions")]
struct Args {
    /// Input file.
    input: PathBuf,
    /// Feed the pipeline in chunks of this many bytes (exercises the
    /// incremental path).
    #[arg(long, default_value_t = 4096)]
    chunk_size: usize,
    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

/// Trivial demo environment: `{ FOO: { BAR: { BIZ: "baz" } } }`.
struct DemoHost;

impl Handler for DemoHost {
    type Dict = &'static str;

    fn lookup(&mut self, parent: Option<&&'static str>, key: &str) -> Option<Value<&'static str>> {
        match (parent.copied(), key) {
            (None, "FOO") => Some(Value::Dict("foo")),
            (Some("foo"), "BAR") => Some(Value::Dict("bar")),
            (Some("bar"), "BIZ") => Some(Value::Str("baz".into())),
            _ => None,
        }
    }

    fn serialize(&mut self, dict: &&'static str) -> String {
        format!("#<dict:{}>", dict)
    }

    fn m112(&mut self) {
        eprintln!("*** EMERGENCY STOP");
    }

    fn fatal(&mut self, message: &str) {
        eprintln!("*** FATAL: {}", message);
    }
}

fn drain(queue: &mut Queue, exec: &mut Executor<DemoHost>) {
    loop {
        match queue.exec_next(exec) {
            (Outcome::Empty, 0) => break,
            (Outcome::Empty, _) => (),
            (Outcome::Error(message), _) => eprintln!("*** ERROR: {}", message),
            (Outcome::Command { name, fields }, _) => {
                println!("{}", name);
                for field in fields {
                    println!("  {}", field);
                }
            }
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    if args.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_writer(std::io::stderr)
            .init();
    }

    let mut file = match File::open(&args.input) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("Error opening {}: {}", args.input.display(), err);
            return ExitCode::FAILURE;
        }
    };

    let mut exec = Executor::new(DemoHost);
    let mut queue = Queue::new();
    let mut buf = vec![0u8; args.chunk_size.max(1)];
    loop {
        match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                queue.feed(&mut exec, &buf[..n]);
                drain(&mut queue, &mut exec);
            }
            Err(err) => {
                eprintln!("I/O error reading input: {}", err);
                return ExitCode::FAILURE;
            }
        }
    }
    queue.feed_finish(&mut exec);
    drain(&mut queue, &mut exec);

    ExitCode::SUCCESS
}
