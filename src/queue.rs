// Copyright (c) 2019 Georg Brandl.  Licensed under the Apache License,
// Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at
// your option. This file may not be copied, modified, or distributed except
// according to those terms.

//! The statement queue: the coordination point between parsing and
//! execution.
//!
//! `feed` runs the lexer and parser and appends the produced statements
//! (and any diagnostics, in the position they occurred) to a bounded ring;
//! `exec_next` pops the oldest entry and runs it through the evaluator.
//! The two ends may be driven at different rates, but the queue is not
//! internally synchronized: the driver serializes producers and consumers.
//! Independent queues are fully isolated and may run on separate threads.
//!
//! An `M112` statement triggers [`Handler::m112`] the moment it is queued,
//! so an emergency stop does not wait behind queued work.

use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::ast::{Span, Statement};
use crate::eval::{EvalError, Evaluator, Handler};
use crate::lexer::Lexer;
use crate::parse::{ParseSink, Parser, StatementSink};

/// Initial ring capacity; growth doubles and preserves entry order.
const INITIAL_RING: usize = 32;

/// Evaluation context shared by any number of queues: the host capability
/// set plus the evaluator scratch.
pub struct Executor<H: Handler> {
    handler: H,
    evaluator: Evaluator,
}

impl<H: Handler> Executor<H> {
    pub fn new(handler: H) -> Executor<H> {
        Executor { handler, evaluator: Evaluator::new() }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }
}

enum Entry {
    Statement(Statement),
    Error(String),
}

/// A single parsing context with its pending work.
pub struct Queue {
    lexer: Lexer,
    parser: Parser,
    ring: VecDeque<Entry>,
}

/// The result of draining one queue entry.
#[derive(Debug, PartialEq)]
pub enum Outcome<'a> {
    /// Nothing to do: the queue is drained, or the entry produced no
    /// command.
    Empty,
    /// A statement-scoped error, with location when one was available.
    Error(String),
    /// One flattened command.  The borrowed strings stay valid until the
    /// next `exec_next` call on the same executor.
    Command { name: &'a str, fields: &'a [String] },
}

impl Default for Queue {
    fn default() -> Queue {
        Queue::new()
    }
}

impl Queue {
    pub fn new() -> Queue {
        Queue {
            lexer: Lexer::new(),
            parser: Parser::new(),
            ring: VecDeque::with_capacity(INITIAL_RING),
        }
    }

    /// Number of queued entries.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Run a chunk of input through the lexer and parser, queueing the
    /// statements and errors it completes.  Returns the new occupancy.
    pub fn feed<H: Handler>(&mut self, exec: &mut Executor<H>, data: &[u8]) -> usize {
        let mut out = RingSink { ring: &mut self.ring, handler: &mut exec.handler };
        let mut sink = ParseSink { parser: &mut self.parser, out: &mut out };
        self.lexer.feed(data, &mut sink);
        self.ring.len()
    }

    /// Flush a trailing unterminated line.  Returns the new occupancy.
    pub fn feed_finish<H: Handler>(&mut self, exec: &mut Executor<H>) -> usize {
        let mut out = RingSink { ring: &mut self.ring, handler: &mut exec.handler };
        let mut sink = ParseSink { parser: &mut self.parser, out: &mut out };
        self.lexer.finish(&mut sink);
        self.ring.len()
    }

    /// Pop and execute the oldest entry.  Returns the outcome and the
    /// number of entries still queued.
    pub fn exec_next<'a, H: Handler>(
        &mut self,
        exec: &'a mut Executor<H>,
    ) -> (Outcome<'a>, usize) {
        let Some(entry) = self.ring.pop_front() else {
            return (Outcome::Empty, 0);
        };
        let remaining = self.ring.len();
        let outcome = match entry {
            Entry::Error(text) => Outcome::Error(text),
            Entry::Statement(stmt) => {
                trace!(statement = %stmt, "executing");
                match exec.evaluator.exec(&mut exec.handler, &stmt) {
                    Ok(true) => {
                        let fields = exec.evaluator.fields();
                        Outcome::Command { name: &fields[0], fields: &fields[1..] }
                    }
                    Ok(false) => Outcome::Empty,
                    Err(kind) => {
                        let text = EvalError { span: stmt.span, kind }.to_string();
                        debug!(error = %text, "statement failed");
                        exec.handler.error(&text);
                        Outcome::Error(text)
                    }
                }
            }
        };
        (outcome, remaining)
    }
}

/// Statement sink appending to the ring.  Also drives the two host side
/// channels: immediate M112 notification and fatal on failed growth.
struct RingSink<'a, H: Handler> {
    ring: &'a mut VecDeque<Entry>,
    handler: &'a mut H,
}

impl<H: Handler> RingSink<'_, H> {
    fn push(&mut self, entry: Entry) {
        if self.ring.len() == self.ring.capacity()
            && self.ring.try_reserve(self.ring.len()).is_err()
        {
            self.handler.fatal("Out of memory (queue growth)");
            return;
        }
        self.ring.push_back(entry);
    }
}

impl<H: Handler> StatementSink for RingSink<'_, H> {
    fn statement(&mut self, stmt: Statement) -> bool {
        let emergency = stmt.command_word() == Some("M112");
        trace!(statement = %stmt, "queueing");
        self.push(Entry::Statement(stmt));
        if emergency {
            self.handler.m112();
        }
        true
    }

    fn error(&mut self, message: String, span: Span) {
        let text = format!("{} at {}", message, span);
        debug!(error = %text, "queueing error");
        self.handler.error(&text);
        self.push(Entry::Error(text));
    }
}
