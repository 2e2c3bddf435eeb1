// Copyright (c) 2019 Georg Brandl.  Licensed under the Apache License,
// Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at
// your option. This file may not be copied, modified, or distributed except
// according to those terms.

//! The evaluator, which flattens statements into command records.
//!
//! Each field of a statement reduces to a typed [`Value`] by post-order
//! walking of its expression tree, then serializes to text.  The first
//! field's text is the command name, the rest are its fields.  Environment
//! access (`foo.bar`, `foo["bar"]`, bare parameters) goes through the
//! host's [`Handler::lookup`].
//!
//! Coercions follow the widening order Dict < Str < Bool < Int < Float:
//! comparisons coerce both sides to the wider type, arithmetic widens to
//! float when either side is float, and integer arithmetic that overflows
//! widens to float rather than wrapping.

mod error;
mod value;

use crate::ast::{BinOp, Expr, Statement, UnOp};
use crate::util::format_float;

pub use self::error::{ErrType, EvalError};
pub use self::value::{Handler, Value};

/// The statement flattener.
///
/// Owns the per-statement field buffer; the buffer is cleared (but keeps
/// its capacity) at the start of every [`exec`](Evaluator::exec) call, so
/// the slices handed out stay valid exactly until the next call.
#[derive(Default)]
pub struct Evaluator {
    fields: Vec<String>,
}

impl Evaluator {
    pub fn new() -> Evaluator {
        Evaluator::default()
    }

    /// The fields produced by the most recent `exec`, command name first.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Flatten one statement.  Returns `Ok(true)` when a command was
    /// produced and accepted, `Ok(false)` for an empty statement.
    pub fn exec<H: Handler>(
        &mut self,
        handler: &mut H,
        stmt: &Statement,
    ) -> Result<bool, ErrType> {
        self.fields.clear();
        for field in &stmt.fields {
            let value = eval_expr(handler, field)?;
            let text = text_of(handler, value);
            self.fields.push(text);
        }
        if self.fields.is_empty() {
            return Ok(false);
        }
        if !handler.exec(&self.fields[0], &self.fields[1..]) {
            return Err(ErrType::HostAbort);
        }
        Ok(true)
    }
}

/// Evaluate one expression against the host environment.
fn eval_expr<H: Handler>(h: &mut H, expr: &Expr) -> Result<Value<H::Dict>, ErrType> {
    match expr {
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::Int(v) => Ok(Value::Int(*v)),
        Expr::Float(v) => Ok(Value::Float(*v)),
        Expr::Bool(v) => Ok(Value::Bool(*v)),
        Expr::Param(name) => h
            .lookup(None, name)
            .ok_or_else(|| ErrType::UnknownParam(name.clone())),
        Expr::Unary(op, arg) => {
            let value = eval_expr(h, arg)?;
            apply_unary(*op, value)
        }
        Expr::Binary(op, lhs, rhs) => {
            // Both sides are always evaluated; and/or do not short-circuit.
            let a = eval_expr(h, lhs)?;
            let b = eval_expr(h, rhs)?;
            apply_binary(h, *op, a, b)
        }
        Expr::IfElse { then, cond, orelse } => {
            if eval_expr(h, cond)?.truthy() {
                eval_expr(h, then)
            } else {
                eval_expr(h, orelse)
            }
        }
        Expr::Lookup { parent, key } => {
            let parent = eval_expr(h, parent)?;
            let key = eval_expr(h, key)?;
            let key = text_of(h, key);
            match parent {
                Value::Dict(dict) => h
                    .lookup(Some(&dict), &key)
                    .ok_or(ErrType::UnknownProperty(key)),
                other => Err(ErrType::LookupInNonDict(key, other.type_name())),
            }
        }
        Expr::Call { name, args } => call(h, name, args),
    }
}

/// The builtin casts `str`, `int`, `bool` and `float`.
fn call<H: Handler>(h: &mut H, name: &str, args: &[Expr]) -> Result<Value<H::Dict>, ErrType> {
    if !matches!(name, "STR" | "INT" | "BOOL" | "FLOAT") {
        return Err(ErrType::UndefinedFunction(name.into()));
    }
    if args.len() != 1 {
        return Err(ErrType::FunctionArity(name.into()));
    }
    let value = eval_expr(h, &args[0])?;
    Ok(match name {
        "STR" => Value::Str(text_of(h, value)),
        "INT" => Value::Int(value.int()?),
        "BOOL" => Value::Bool(value.truthy()),
        _ => Value::Float(value.float()?),
    })
}

fn apply_unary<D>(op: UnOp, value: Value<D>) -> Result<Value<D>, ErrType> {
    match op {
        UnOp::Not => Ok(Value::Bool(!value.truthy())),
        UnOp::Plus => numeric(value),
        UnOp::Minus => Ok(match numeric(value)? {
            Value::Int(i) => match i.checked_neg() {
                Some(n) => Value::Int(n),
                None => Value::Float(-(i as f64)),
            },
            Value::Float(f) => Value::Float(-f),
            _ => unreachable!(),
        }),
    }
}

/// The operand of unary `+`/`-`: ints and floats pass through, bools count
/// as 0/1.
fn numeric<D>(value: Value<D>) -> Result<Value<D>, ErrType> {
    match value {
        Value::Int(_) | Value::Float(_) => Ok(value),
        Value::Bool(b) => Ok(Value::Int(b as i64)),
        other => Err(ErrType::NotNumeric(other.type_name())),
    }
}

fn apply_binary<H: Handler>(
    h: &mut H,
    op: BinOp,
    a: Value<H::Dict>,
    b: Value<H::Dict>,
) -> Result<Value<H::Dict>, ErrType> {
    let float = matches!(a, Value::Float(_)) || matches!(b, Value::Float(_));
    match op {
        BinOp::And => Ok(Value::Bool(a.truthy() && b.truthy())),
        BinOp::Or => Ok(Value::Bool(a.truthy() || b.truthy())),
        BinOp::Concat => {
            let mut text = text_of(h, a);
            text.push_str(&text_of(h, b));
            Ok(Value::Str(text))
        }
        BinOp::Eq | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
            Ok(Value::Bool(compare(h, op, a, b)?))
        }
        BinOp::Add => arith(float, a, b, |x, y| x.checked_add(y), |x, y| x + y),
        BinOp::Sub => arith(float, a, b, |x, y| x.checked_sub(y), |x, y| x - y),
        BinOp::Mul => arith(float, a, b, |x, y| x.checked_mul(y), |x, y| x * y),
        BinOp::Div => {
            if float {
                // IEEE semantics: infinity or nan.
                Ok(Value::Float(a.float()? / b.float()?))
            } else {
                let x = a.int()?;
                let y = b.int()?;
                if y == 0 {
                    Err(ErrType::DivByZero)
                } else {
                    Ok(Value::Int(x / y))
                }
            }
        }
        BinOp::Mod => {
            let x = a.int()?;
            let y = b.int()?;
            if y == 0 {
                Err(ErrType::DivByZero)
            } else {
                Ok(Value::Int(x % y))
            }
        }
        BinOp::Pow => {
            if float {
                Ok(Value::Float(a.float()?.powf(b.float()?)))
            } else {
                let x = a.int()?;
                let y = b.int()?;
                let widened = || Value::Float((x as f64).powf(y as f64));
                if y < 0 || y > u32::MAX as i64 {
                    Ok(widened())
                } else {
                    Ok(x.checked_pow(y as u32).map(Value::Int).unwrap_or_else(widened))
                }
            }
        }
    }
}

/// Int arithmetic with widen-to-float on overflow, or float arithmetic
/// when either side already is one.
fn arith<D>(
    float: bool,
    a: Value<D>,
    b: Value<D>,
    int_op: impl Fn(i64, i64) -> Option<i64>,
    float_op: impl Fn(f64, f64) -> f64,
) -> Result<Value<D>, ErrType> {
    if float {
        Ok(Value::Float(float_op(a.float()?, b.float()?)))
    } else {
        let x = a.int()?;
        let y = b.int()?;
        Ok(match int_op(x, y) {
            Some(v) => Value::Int(v),
            None => Value::Float(float_op(x as f64, y as f64)),
        })
    }
}

/// Equality and ordering coerce both sides to the wider type.
fn compare<H: Handler>(
    h: &mut H,
    op: BinOp,
    a: Value<H::Dict>,
    b: Value<H::Dict>,
) -> Result<bool, ErrType> {
    fn decide<T: PartialOrd>(op: BinOp, x: T, y: T) -> bool {
        match op {
            BinOp::Eq => x == y,
            BinOp::Lt => x < y,
            BinOp::Gt => x > y,
            BinOp::Le => x <= y,
            BinOp::Ge => x >= y,
            _ => unreachable!(),
        }
    }

    match a.rank().max(b.rank()) {
        4 => Ok(decide(op, a.float()?, b.float()?)),
        3 => Ok(decide(op, a.int()?, b.int()?)),
        2 => Ok(decide(op, a.truthy(), b.truthy())),
        // Str and Dict compare textually; dict handles have no identity
        // visible to the core.
        _ => Ok(decide(op, text_of(h, a), text_of(h, b))),
    }
}

/// Serialize a value to its canonical text form.
fn text_of<H: Handler>(h: &mut H, value: Value<H::Dict>) -> String {
    match value {
        Value::Str(s) => s,
        Value::Bool(true) => "true".into(),
        Value::Bool(false) => "false".into(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => format_float(f),
        Value::Dict(d) => h.serialize(&d),
    }
}
