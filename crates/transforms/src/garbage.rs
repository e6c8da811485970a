//! Inert statements appended to blocks.
//!
//! Each kind is added on an independent coin flip: a dead string assignment, a
//! dead number assignment, an `Если` guarded by an always-false predicate and a
//! `Пока` loop guarded by one. Branch and loop bodies may receive garbage of
//! their own, up to [`MAX_DEPTH`] levels, and are shuffled into jump form.

use crate::camouflage::hide;
use crate::delinearize::delinearize_block;
use crate::shuffle::shuffle;
use crate::{Result, Session};
use murk_core::ast::{Directive, ElseIf, Expression, IfStatement, Loop, LoopKind, Statement};
use rand::Rng;
use tracing::debug;

/// Nesting limit for garbage inside garbage.
pub const MAX_DEPTH: usize = 3;

/// Appends garbage to `block` when garbage injection is enabled.
pub fn inject(
    session: &mut Session,
    block: &mut Vec<Statement>,
    directive: Option<Directive>,
) -> Result<()> {
    if !session.config.inject_garbage {
        return Ok(());
    }
    let garbage = generate(session, 0)?;
    if !garbage.is_empty() {
        debug!(?directive, statements = garbage.len(), "injecting garbage");
        block.extend(garbage);
    }
    Ok(())
}

/// Like [`inject`], but creates a missing `Иначе` block only when there is
/// something to put into it.
pub fn inject_optional(
    session: &mut Session,
    block: &mut Option<Vec<Statement>>,
    directive: Option<Directive>,
) -> Result<()> {
    if !session.config.inject_garbage {
        return Ok(());
    }
    let garbage = generate(session, 0)?;
    if !garbage.is_empty() {
        debug!(?directive, statements = garbage.len(), "injecting garbage");
        block.get_or_insert_with(Vec::new).extend(garbage);
    }
    Ok(())
}

/// `count` arms guarded by always-false predicates, with empty blocks.
pub fn false_arms(session: &mut Session, count: usize) -> Result<Vec<ElseIf>> {
    (0..count)
        .map(|_| {
            Ok(ElseIf {
                condition: session.false_condition()?,
                block: Vec::new(),
            })
        })
        .collect()
}

fn generate(session: &mut Session, depth: usize) -> Result<Vec<Statement>> {
    let mut out = Vec::new();

    if session.coin() {
        let name = session.fresh_name(20);
        let value = session.random_string(5);
        let value = hide(session, Expression::string(value), 4)?;
        out.push(Statement::assign(name, value));
    }
    if session.coin() {
        let name = session.fresh_name(10);
        let number = session.rng().random_range(-100..100);
        let value = hide(session, Expression::number(f64::from(number)), 5)?;
        out.push(Statement::assign(name, value));
    }
    if session.coin() {
        let mut branch = IfStatement::new(session.false_condition()?, Vec::new());
        if session.coin() {
            let count = session.rng().random_range(0..5);
            branch.else_ifs = false_arms(session, count)?;
        }
        if session.coin() && depth < MAX_DEPTH {
            let else_block = generate(session, depth + 1)?;
            branch.then_block = generate(session, depth + 1)?;
            if !else_block.is_empty() {
                branch.else_block = Some(else_block);
            }
        }
        branch.then_block = shuffle(session, std::mem::take(&mut branch.then_block));
        if let Some(else_block) = branch.else_block.take() {
            branch.else_block = Some(shuffle(session, else_block));
        }
        session.stats.garbage_blocks += 1;
        out.push(Statement::If(branch));
    }
    if session.coin() {
        let mut body = Vec::new();
        if session.coin() && depth < MAX_DEPTH {
            body = generate(session, depth + 1)?;
        }
        let body = shuffle(session, body);
        let lp = Loop {
            kind: LoopKind::While(session.false_condition()?),
            body,
        };
        session.stats.garbage_blocks += 1;
        out.push(Statement::Loop(lp));
    }

    if session.config.loops_to_jumps {
        delinearize_block(session, &mut out)?;
    }
    Ok(out)
}
