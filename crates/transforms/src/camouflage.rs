//! Value camouflage: hides a value inside a chain of nested `?()` expressions.
//!
//! A chain of depth D has D+1 levels. The level at the chosen true position is
//! guarded by an always-true predicate and yields the real value; every other
//! level is guarded by an always-false predicate and yields a decoy of the same
//! category, and the innermost else-branch is a decoy too. At run time the
//! false levels fall through until the true one is reached.
//!
//! ```text
//! ?(F1, decoy, ?(T, value, ?(F2, decoy, decoy)))
//! ```

use crate::{Result, Session};
use murk_core::ast::{Expression, Literal};
use rand::Rng;
use tracing::trace;

/// Complexity used for operands the walker hides.
pub const DEFAULT_COMPLEXITY: usize = 4;

/// Camouflages `value` when it is a literal, a binary expression or a call, with
/// a random depth in `[2, complexity)` and a random true position in
/// `[0, complexity - 1)`. Anything else comes back unchanged.
pub fn hide(session: &mut Session, value: Expression, complexity: usize) -> Result<Expression> {
    if !is_camouflageable(&value) {
        return Ok(value);
    }
    let complexity = complexity.max(3);
    let depth = session.rng().random_range(2..complexity);
    let true_step = session.rng().random_range(0..complexity - 1);
    camouflage(session, value, depth, true_step)
}

/// Builds a chain of `depth + 1` levels with the real value at `true_step`.
/// The two numbers are swapped when `true_step > depth`.
pub fn camouflage(
    session: &mut Session,
    value: Expression,
    depth: usize,
    true_step: usize,
) -> Result<Expression> {
    let (depth, true_step) = if true_step > depth {
        (true_step, depth)
    } else {
        (depth, true_step)
    };
    trace!(depth, true_step, "camouflaging value");
    session.stats.values_camouflaged += 1;

    // Built from the innermost level outwards.
    let mut chain = decoy(session, &value)?;
    for level in (0..=depth).rev() {
        let (condition, branch) = if level == true_step {
            (session.true_condition()?, value.clone())
        } else {
            (session.false_condition()?, decoy(session, &value)?)
        };
        chain = Expression::ternary(condition, branch, chain);
    }
    Ok(chain)
}

fn is_camouflageable(value: &Expression) -> bool {
    match value {
        Expression::Literal(literal) => literal.is_scalar(),
        Expression::Binary { .. } | Expression::Call(_) => true,
        _ => false,
    }
}

/// A stand-in of the same category as `value`.
fn decoy(session: &mut Session, value: &Expression) -> Result<Expression> {
    Ok(match value {
        Expression::Literal(Literal::Number(_)) => {
            Expression::number(session.rng().random_range(0..1000) as f64)
        }
        Expression::Literal(Literal::String(_)) => Expression::string(session.random_string(10)),
        Expression::Literal(Literal::Bool(_)) => {
            Expression::Literal(Literal::Bool(session.coin()))
        }
        Expression::Literal(Literal::Date(_)) => Expression::Literal(random_date(session)),
        Expression::Call(_) => fake_call(session),
        _ => session.false_condition()?,
    })
}

fn random_date(session: &mut Session) -> Literal {
    let rng = session.rng();
    Literal::Date(format!(
        "{:04}{:02}{:02}{:02}{:02}{:02}",
        rng.random_range(1990..2030),
        rng.random_range(1..=12),
        rng.random_range(1..=28),
        rng.random_range(0..24),
        rng.random_range(0..60),
        rng.random_range(0..60),
    ))
}

/// A harmless call to a platform function with random arguments.
fn fake_call(session: &mut Session) -> Expression {
    let number = |session: &mut Session, range: std::ops::Range<i32>| {
        Expression::number(session.rng().random_range(range) as f64)
    };
    match session.rng().random_range(0..7) {
        0 => {
            let n = number(session, 0..1000);
            Expression::call("XMLСтрока", vec![n])
        }
        1 | 2 => {
            let name = if session.coin() { "Лев" } else { "Прав" };
            let text = Expression::string(session.random_string(20));
            let count = number(session, 1..10);
            Expression::call(name, vec![text, count])
        }
        3 => {
            let text = Expression::string(session.random_string(20));
            let start = number(session, 1..10);
            let count = number(session, 0..10);
            Expression::call("Сред", vec![text, start, count])
        }
        other => {
            let name = match other {
                4 => "ПобитовыйСдвигВлево",
                5 => "ПобитовыйСдвигВправо",
                _ => "ПобитовоеИ",
            };
            let value = number(session, 0..1000);
            let shift = number(session, 1..10);
            Expression::call(name, vec![value, shift])
        }
    }
}
