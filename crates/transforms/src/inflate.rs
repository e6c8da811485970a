//! Call-stack inflation: a literal is returned through a chain of trampolines.
//!
//! ```text
//! Функция f1() Возврат f2(); КонецФункции
//! Функция f2() Возврат 42;   КонецФункции
//! ```
//! and the literal itself becomes `f1()`.

use crate::camouflage::{hide, DEFAULT_COMPLEXITY};
use crate::garbage::inject;
use crate::names::ROUTINE_NAME_LEN;
use crate::{Result, Session};
use murk_core::ast::{Directive, Expression, Literal, Routine, Statement};
use tracing::debug;

/// Replaces `literal` by a call to the outermost of `depth` trampolines carrying
/// the caller's directive. A zero depth returns the literal unchanged.
pub fn inflate(
    session: &mut Session,
    literal: Literal,
    directive: Option<Directive>,
    depth: usize,
) -> Result<Expression> {
    let mut value = Expression::Literal(literal);
    if depth == 0 {
        return Ok(value);
    }
    if session.config.conditional_chains {
        value = hide(session, value, DEFAULT_COMPLEXITY)?;
    }

    // Innermost first: each new trampoline returns the previous one.
    for _ in 0..depth {
        let name = session.fresh_name(ROUTINE_NAME_LEN);
        let routine = trampoline(session, name.clone(), directive, value)?;
        session.add_routine(routine);
        value = Expression::call(name, Vec::new());
    }
    debug!(depth, "literal hidden behind call stack");
    Ok(value)
}

fn trampoline(
    session: &mut Session,
    name: String,
    directive: Option<Directive>,
    value: Expression,
) -> Result<Routine> {
    let mut body = Vec::new();
    for _ in 0..3 {
        if session.coin() {
            inject(session, &mut body, directive)?;
        }
    }
    body.push(Statement::Return(Some(value)));
    for _ in 0..2 {
        if session.coin() {
            inject(session, &mut body, directive)?;
        }
    }

    let mut routine = Routine::function(name, directive);
    routine.body = body;
    Ok(routine)
}
