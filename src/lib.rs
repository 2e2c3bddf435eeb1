// Copyright (c) 2019 Georg Brandl.  Licensed under the Apache License,
// Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at
// your option. This file may not be copied, modified, or distributed except
// according to those terms.

//! A library that compiles G-code with embedded expressions into flat
//! command records.
//!
//! The dialect mixes literal words (`G1`, `X0`) with brace-delimited
//! expressions (`X{pos + 1}`, `M117 {"hello" ~ " " ~ "world"}`) that are
//! evaluated against a host-supplied environment.  Input is ingested
//! incrementally — buffers may split anywhere, even inside a token — and
//! every finished statement is delivered as an ordered list of printable
//! fields, of which the first is the command name.
//!
//! The pipeline is `bytes → lexer → parser → queue → evaluator`.  The
//! queue decouples parsing from execution so a driver can feed input and
//! drain commands at different rates; everything is single-threaded and
//! non-blocking, with independent pipelines usable from different threads.
//!
//! ## Basic usage
//!
//! Implement [`eval::Handler`] for your environment, then feed a
//! [`queue::Queue`] and drain it:
//!
//! ```rust
//! use xgc::eval::{Handler, Value};
//! use xgc::queue::{Executor, Outcome, Queue};
//!
//! struct Host;
//!
//! impl Handler for Host {
//!     type Dict = ();
//!     fn lookup(&mut self, _parent: Option<&()>, _key: &str) -> Option<Value<()>> {
//!         None
//!     }
//! }
//!
//! let mut exec = Executor::new(Host);
//! let mut queue = Queue::new();
//! queue.feed(&mut exec, b"G1 X{1+2} Y20\n");
//! queue.feed_finish(&mut exec);
//!
//! match queue.exec_next(&mut exec) {
//!     (Outcome::Command { name, fields }, _) => {
//!         assert_eq!(name, "G1");
//!         assert_eq!(fields, ["X3".to_string(), "Y20".to_string()]);
//!     }
//!     other => panic!("unexpected outcome: {:?}", other),
//! }
//! ```
//!
//! ## Unsupported features
//!
//! There is no control flow (loops, statement-level conditionals, macro
//! definitions) and no variable assignment; the environment is entirely
//! host-supplied.  What a command *means* is the host's business: the
//! library stops at `(command, fields[])`.

pub mod ast;
pub mod eval;
pub mod lexer;
pub mod parse;
pub mod queue;

// internal helpers
pub(crate) mod util;
