//! Constant folding for literal-only arithmetic and comparisons.

use crate::ast::{BinaryOp, Expression, Literal};
use crate::result::{Error, Result};

/// Applies an arithmetic operator to two numbers.
pub fn apply_arithmetic(op: BinaryOp, left: f64, right: f64) -> Result<f64> {
    match op {
        BinaryOp::Add => Ok(left + right),
        BinaryOp::Sub => Ok(left - right),
        BinaryOp::Mul => Ok(left * right),
        BinaryOp::Div | BinaryOp::Mod if right == 0.0 => {
            Err(Error::Evaluation("division by zero".into()))
        }
        BinaryOp::Div => Ok(left / right),
        BinaryOp::Mod => Ok(left % right),
        other => Err(Error::Evaluation(format!(
            "'{}' is not an arithmetic operator",
            other.symbol()
        ))),
    }
}

/// Evaluates an expression built only from number literals, parentheses,
/// unary minus and the arithmetic operators.
pub fn evaluate_number(expr: &Expression) -> Result<f64> {
    match expr {
        Expression::Literal(Literal::Number(value)) => Ok(*value),
        Expression::Neg(inner) => Ok(-evaluate_number(inner)?),
        Expression::Binary { op, left, right } => {
            apply_arithmetic(*op, evaluate_number(left)?, evaluate_number(right)?)
        }
        other => Err(Error::Evaluation(format!("not a constant number: {other:?}"))),
    }
}

/// Evaluates both sides of a constant comparison.
///
/// Returns the operator with its two folded operands so callers can apply their
/// own tolerance before trusting the outcome.
pub fn evaluate_comparison(expr: &Expression) -> Result<(BinaryOp, f64, f64)> {
    match expr {
        Expression::Binary { op, left, right } if op.is_comparison() => {
            Ok((*op, evaluate_number(left)?, evaluate_number(right)?))
        }
        other => Err(Error::Evaluation(format!("not a comparison: {other:?}"))),
    }
}

/// Result of comparing two numbers with the given operator.
pub fn compare(op: BinaryOp, left: f64, right: f64) -> Result<bool> {
    match op {
        BinaryOp::Eq => Ok(left == right),
        BinaryOp::NotEq => Ok(left != right),
        BinaryOp::Lt => Ok(left < right),
        BinaryOp::LtEq => Ok(left <= right),
        BinaryOp::Gt => Ok(left > right),
        BinaryOp::GtEq => Ok(left >= right),
        other => Err(Error::Evaluation(format!(
            "'{}' is not a comparison",
            other.symbol()
        ))),
    }
}
