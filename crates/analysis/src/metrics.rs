use crate::{Error, Result};
/// Module for computing structural metrics of BSL modules before and after obfuscation.
///
/// Implements a minimal set of metrics quantified by statement volume, branching, jump
/// density, expression nesting and exposed string literals to assess transform potency
/// (analyst effort). The module provides functions to collect metrics from a parsed
/// `Module` and to compare pre- and post-obfuscation states.
///
/// # Usage
/// ```rust,ignore
/// let module = murk_core::parser::parse_module(source)?;
/// let metrics = metrics::collect_metrics(&module)?;
/// println!("{}", serde_json::to_string_pretty(&metrics)?);
/// ```
use murk_core::ast::{Expression, Literal, LoopKind, Module, Statement};
use serde::{Deserialize, Serialize};

/// Represents a set of structural metrics for evaluating BSL obfuscation.
///
/// Metrics include statement and routine counts, control flow complexity (branches, loops,
/// labels and jumps), the deepest expression nesting, exposed string literals and a composite
/// potency score. Used to compare pre- and post-obfuscation states.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Number of routines declared in the module.
    pub routine_cnt: usize,
    /// Number of statements, counted recursively through nested blocks.
    pub statement_cnt: usize,
    /// Conditions evaluated for branching: `Если`, `ИначеЕсли` and `?()`.
    pub branch_cnt: usize,
    /// Structured loops of any kind.
    pub loop_cnt: usize,
    /// Labels and `Перейти` statements.
    pub jump_cnt: usize,
    /// Deepest expression tree found in the module.
    pub max_expr_depth: usize,
    /// String literals readable directly in the source.
    pub string_literal_cnt: usize,
    /// Composite potency score (heuristic based on volume, branching and nesting).
    pub potency: f64,
}

/// Collects metrics from a parsed module.
///
/// Walks every routine and the module body once, counting statements, branches, loops and
/// jumps, and tracking the deepest expression. Declarations of module variables carry no
/// statements and are ignored.
///
/// # Arguments
/// * `module` - The parsed module.
///
/// # Returns
/// A `Metrics` struct with computed metrics, or an error if the module is empty.
pub fn collect_metrics(module: &Module) -> Result<Metrics> {
    if module.is_empty() {
        return Err(Error::EmptyModule);
    }

    let mut metrics = Metrics {
        routine_cnt: module.routines().count(),
        ..Metrics::default()
    };
    for routine in module.routines() {
        count_block(&routine.body, &mut metrics);
        for param in &routine.params {
            if let Some(default) = &param.default {
                count_expression(default, 1, &mut metrics);
            }
        }
    }
    count_block(&module.body, &mut metrics);

    metrics.potency = score(&metrics);
    Ok(metrics)
}

fn count_block(block: &[Statement], metrics: &mut Metrics) {
    for statement in block {
        count_statement(statement, metrics);
    }
}

fn count_statement(statement: &Statement, metrics: &mut Metrics) {
    metrics.statement_cnt += 1;
    match statement {
        Statement::Assign { target, value } => {
            count_expression(target, 1, metrics);
            count_expression(value, 1, metrics);
        }
        Statement::Expression(expr) => count_expression(expr, 1, metrics),
        Statement::If(stmt) => {
            metrics.branch_cnt += 1 + stmt.else_ifs.len();
            count_expression(&stmt.condition, 1, metrics);
            count_block(&stmt.then_block, metrics);
            for arm in &stmt.else_ifs {
                count_expression(&arm.condition, 1, metrics);
                count_block(&arm.block, metrics);
            }
            if let Some(else_block) = &stmt.else_block {
                count_block(else_block, metrics);
            }
        }
        Statement::Loop(lp) => {
            metrics.loop_cnt += 1;
            match &lp.kind {
                LoopKind::While(condition) => count_expression(condition, 1, metrics),
                LoopKind::Range { from, to, .. } => {
                    count_expression(from, 1, metrics);
                    count_expression(to, 1, metrics);
                }
                LoopKind::ForEach { collection, .. } => count_expression(collection, 1, metrics),
            }
            count_block(&lp.body, metrics);
        }
        Statement::Return(value) | Statement::Throw(value) => {
            if let Some(value) = value {
                count_expression(value, 1, metrics);
            }
        }
        Statement::Try { body, handler } => {
            count_block(body, metrics);
            count_block(handler, metrics);
        }
        Statement::Label(_) | Statement::Goto(_) => metrics.jump_cnt += 1,
        Statement::Break | Statement::Continue => {}
    }
}

fn count_expression(expr: &Expression, depth: usize, metrics: &mut Metrics) {
    metrics.max_expr_depth = metrics.max_expr_depth.max(depth);
    let next = depth + 1;
    match expr {
        Expression::Literal(Literal::String(_)) => metrics.string_literal_cnt += 1,
        Expression::Literal(_) => {}
        Expression::Var(_) => {}
        Expression::Binary { left, right, .. } => {
            count_expression(left, next, metrics);
            count_expression(right, next, metrics);
        }
        Expression::Not(inner) | Expression::Neg(inner) => count_expression(inner, next, metrics),
        Expression::Call(call) => {
            for arg in &call.args {
                count_expression(arg, next, metrics);
            }
        }
        Expression::Chain { base, call } => {
            count_expression(base, next, metrics);
            for arg in &call.args {
                count_expression(arg, next, metrics);
            }
        }
        Expression::Member { base, .. } => count_expression(base, next, metrics),
        Expression::Index { base, index } => {
            count_expression(base, next, metrics);
            count_expression(index, next, metrics);
        }
        Expression::New { args, .. } => {
            for arg in args {
                count_expression(arg, next, metrics);
            }
        }
        Expression::Ternary {
            condition,
            then,
            otherwise,
        } => {
            metrics.branch_cnt += 1;
            count_expression(condition, next, metrics);
            count_expression(then, next, metrics);
            count_expression(otherwise, next, metrics);
        }
    }
}

/// Computes a composite potency score for a module.
///
/// Combines statement volume, branching, jump density and expression nesting into a heuristic
/// score estimating analyst effort. Exposed string literals lower the score since they give a
/// reader direct anchors into the code.
///
/// # Arguments
/// * `metrics` - Counts gathered by `collect_metrics`.
///
/// # Returns
/// A potency score (higher indicates greater complexity).
fn score(metrics: &Metrics) -> f64 {
    5.0 * (metrics.statement_cnt.max(1) as f64).log2()
        + metrics.branch_cnt as f64
        + metrics.jump_cnt as f64
        + 2.0 * metrics.max_expr_depth as f64
        - 0.5 * metrics.string_literal_cnt as f64
}

/// Compares two sets of metrics to evaluate an obfuscation run.
///
/// # Arguments
/// * `before` - Metrics of the input module.
/// * `after` - Metrics of the obfuscated module.
///
/// # Returns
/// The potency delta (positive means the output is harder to read).
pub fn compare(before: &Metrics, after: &Metrics) -> f64 {
    after.potency - before.potency
}
