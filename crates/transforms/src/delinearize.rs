//! Rewrites structured loops into labels and jumps.
//!
//! ```text
//! Пока c Цикл            ~start:
//!     body;       =>     Если НЕ c Тогда Перейти ~end; КонецЕсли;
//! КонецЦикла;            body; Перейти ~start;
//!                        ~end:
//! ```
//!
//! `Прервать` becomes a jump to the end label and `Продолжить` a jump to the
//! re-check point. Jumps belonging to nested loops are left alone. `Для Каждого`
//! loops are returned unchanged.

use crate::{Result, Session};
use murk_core::ast::{BinaryOp, Expression, IfStatement, Loop, LoopKind, Statement};
use tracing::debug;

/// Replacement statements for `lp`, to be spliced where the loop stood.
pub fn delinearize(session: &mut Session, lp: Loop) -> Result<Vec<Statement>> {
    let Loop { kind, mut body } = lp;
    let statements = match kind {
        LoopKind::While(condition) => {
            let start = session.fresh_name_between(5, 10);
            let end = session.fresh_name_between(5, 10);
            retarget(&mut body, &end, &start);

            let mut out = Vec::with_capacity(body.len() + 4);
            out.push(Statement::Label(start.clone()));
            out.push(Statement::If(IfStatement::new(
                condition.negate(),
                vec![Statement::Goto(end.clone())],
            )));
            out.extend(body);
            out.push(Statement::Goto(start));
            out.push(Statement::Label(end));
            out
        }
        LoopKind::Range { var, from, to } => {
            let start = session.fresh_name_between(5, 10);
            let end = session.fresh_name_between(5, 10);
            let next = has_continue(&body).then(|| session.fresh_name_between(5, 10));
            retarget(&mut body, &end, next.as_deref().unwrap_or(start.as_str()));

            let mut out = Vec::with_capacity(body.len() + 7);
            out.push(Statement::assign(var.clone(), from));
            // The bound is evaluated once, before the first iteration.
            let bound = match to {
                literal @ Expression::Literal(_) => literal,
                other => {
                    let tmp = session.fresh_name_between(5, 10);
                    out.push(Statement::assign(tmp.clone(), other));
                    Expression::var(tmp)
                }
            };
            out.push(Statement::Label(start.clone()));
            out.push(Statement::If(IfStatement::new(
                Expression::binary(BinaryOp::Gt, Expression::var(var.clone()), bound),
                vec![Statement::Goto(end.clone())],
            )));
            out.extend(body);
            if let Some(next) = next {
                out.push(Statement::Label(next));
            }
            out.push(Statement::assign(
                var.clone(),
                Expression::binary(BinaryOp::Add, Expression::var(var), Expression::number(1.0)),
            ));
            out.push(Statement::Goto(start));
            out.push(Statement::Label(end));
            out
        }
        kind @ LoopKind::ForEach { .. } => {
            debug!("leaving for-each loop structured");
            return Ok(vec![Statement::Loop(Loop { kind, body })]);
        }
    };
    session.stats.loops_rewritten += 1;
    debug!(statements = statements.len(), "loop rewritten into jumps");
    Ok(statements)
}

/// Replaces every structured loop directly in `block` by its jump form.
pub fn delinearize_block(session: &mut Session, block: &mut Vec<Statement>) -> Result<()> {
    let statements = std::mem::take(block);
    for statement in statements {
        match statement {
            Statement::Loop(lp) => block.extend(delinearize(session, lp)?),
            other => block.push(other),
        }
    }
    Ok(())
}

/// Points the loop's own `Прервать`/`Продолжить` at the given labels.
fn retarget(block: &mut [Statement], on_break: &str, on_continue: &str) {
    for statement in block {
        match statement {
            Statement::Break => *statement = Statement::Goto(on_break.to_string()),
            Statement::Continue => *statement = Statement::Goto(on_continue.to_string()),
            Statement::If(stmt) => {
                retarget(&mut stmt.then_block, on_break, on_continue);
                for arm in &mut stmt.else_ifs {
                    retarget(&mut arm.block, on_break, on_continue);
                }
                if let Some(else_block) = &mut stmt.else_block {
                    retarget(else_block, on_break, on_continue);
                }
            }
            Statement::Try { body, handler } => {
                retarget(body, on_break, on_continue);
                retarget(handler, on_break, on_continue);
            }
            // Jumps inside nested loops belong to them.
            _ => {}
        }
    }
}

fn has_continue(block: &[Statement]) -> bool {
    block.iter().any(|statement| match statement {
        Statement::Continue => true,
        Statement::If(stmt) => {
            has_continue(&stmt.then_block)
                || stmt.else_ifs.iter().any(|arm| has_continue(&arm.block))
                || stmt.else_block.as_deref().is_some_and(has_continue)
        }
        Statement::Try { body, handler } => has_continue(body) || has_continue(handler),
        _ => false,
    })
}
