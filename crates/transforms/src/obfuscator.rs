use crate::walker::Walker;
use crate::{Error, ObfuscationConfig, Result, Session, TransformStats};
use murk_analysis::{collect_metrics, compare, Metrics};
use murk_core::ast::{Declaration, Expression, LoopKind, Module, Statement};
use murk_core::{BslCodec, SourceCodec};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Result of the obfuscation pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObfuscationResult {
    /// The obfuscated module text
    pub source: String,
    /// Seed the run used, for reproducing it
    pub seed: String,
    /// What the techniques did
    #[serde(flatten)]
    pub stats: TransformStats,
    /// Metrics of the input, absent for an empty module
    pub before: Option<Metrics>,
    /// Metrics of the output, absent for an empty module
    pub after: Option<Metrics>,
    /// Potency gained by the run
    pub potency_delta: f64,
}

/// Obfuscates a parsed module in place and appends every synthesized routine.
///
/// Reads predicates from the session's oracle with blocking calls, so it must
/// not run on an async worker thread.
pub fn obfuscate_module(module: &mut Module, session: &mut Session) -> Result<()> {
    reserve_identifiers(module, session);
    Walker::new(session).visit_module(module)?;

    let synthesized = session.take_routines();
    debug!("  Appending {} synthesized routines", synthesized.len());
    module
        .declarations
        .extend(synthesized.into_iter().map(Declaration::Routine));
    Ok(())
}

/// Main obfuscation pipeline
pub async fn obfuscate_source(source: &str, config: ObfuscationConfig) -> Result<ObfuscationResult> {
    let codec: Arc<dyn SourceCodec> = Arc::new(BslCodec);
    debug!("Starting obfuscation pipeline:");

    // Step 1: Parse
    let mut module = codec.parse(source)?;
    let print = config.print;
    if module.is_empty() {
        debug!("  Empty module, nothing to obfuscate");
        let seed = config.seed.clone().unwrap_or_else(murk_core::Seed::generate);
        return Ok(ObfuscationResult {
            source: source.to_string(),
            seed: seed.to_hex(),
            stats: TransformStats::default(),
            before: None,
            after: None,
            potency_delta: 0.0,
        });
    }
    let before = collect_metrics(&module)?;
    debug!(
        "  Input: {} routines, {} statements",
        before.routine_cnt, before.statement_cnt
    );

    // Step 2: Walk on a blocking thread while the oracle fills its queues
    let session = Session::new(config, Arc::clone(&codec));
    let seed = session.seed().to_hex();
    let (module, session) = tokio::task::spawn_blocking(move || {
        let mut session = session;
        let outcome = obfuscate_module(&mut module, &mut session);
        session.shutdown();
        outcome.map(|()| (module, session))
    })
    .await
    .map_err(|e| Error::Worker(e.to_string()))??;

    // Step 3: Print and measure
    let after = collect_metrics(&module)?;
    let potency_delta = compare(&before, &after);
    let stats = session.stats;
    info!(
        "{:>14} Δ{:+.2} ({} routines synthesized, {} strings hidden, {} loops rewritten)",
        "obfuscate", potency_delta, stats.routines_synthesized, stats.strings_hidden, stats.loops_rewritten
    );

    Ok(ObfuscationResult {
        source: codec.print(&module, print),
        seed,
        stats,
        before: Some(before),
        after: Some(after),
        potency_delta,
    })
}

/// Marks every identifier the module already uses as taken, so synthesized
/// names never shadow or capture one.
fn reserve_identifiers(module: &Module, session: &mut Session) {
    for declaration in &module.declarations {
        match declaration {
            Declaration::Variables(vars) => {
                for var in &vars.variables {
                    session.reserve_name(&var.name);
                }
            }
            Declaration::Routine(routine) => {
                session.reserve_name(&routine.name);
                for param in &routine.params {
                    session.reserve_name(&param.name);
                }
                reserve_in_block(&routine.body, session);
            }
        }
    }
    reserve_in_block(&module.body, session);
}

fn reserve_in_block(block: &[Statement], session: &mut Session) {
    for statement in block {
        match statement {
            Statement::Assign { target, value } => {
                reserve_in_expr(target, session);
                reserve_in_expr(value, session);
            }
            Statement::Expression(expr) | Statement::Return(Some(expr)) | Statement::Throw(Some(expr)) => {
                reserve_in_expr(expr, session)
            }
            Statement::If(stmt) => {
                reserve_in_expr(&stmt.condition, session);
                reserve_in_block(&stmt.then_block, session);
                for arm in &stmt.else_ifs {
                    reserve_in_expr(&arm.condition, session);
                    reserve_in_block(&arm.block, session);
                }
                if let Some(block) = &stmt.else_block {
                    reserve_in_block(block, session);
                }
            }
            Statement::Loop(lp) => {
                match &lp.kind {
                    LoopKind::While(condition) => reserve_in_expr(condition, session),
                    LoopKind::Range { var, from, to } => {
                        session.reserve_name(var);
                        reserve_in_expr(from, session);
                        reserve_in_expr(to, session);
                    }
                    LoopKind::ForEach { var, collection } => {
                        session.reserve_name(var);
                        reserve_in_expr(collection, session);
                    }
                }
                reserve_in_block(&lp.body, session);
            }
            Statement::Try { body, handler } => {
                reserve_in_block(body, session);
                reserve_in_block(handler, session);
            }
            Statement::Label(name) | Statement::Goto(name) => session.reserve_name(name),
            _ => {}
        }
    }
}

fn reserve_in_expr(expr: &Expression, session: &mut Session) {
    match expr {
        Expression::Var(name) => session.reserve_name(name),
        Expression::Binary { left, right, .. } => {
            reserve_in_expr(left, session);
            reserve_in_expr(right, session);
        }
        Expression::Not(inner) | Expression::Neg(inner) => reserve_in_expr(inner, session),
        Expression::Call(call) => {
            session.reserve_name(&call.name);
            call.args.iter().for_each(|arg| reserve_in_expr(arg, session));
        }
        Expression::Chain { base, call } => {
            reserve_in_expr(base, session);
            call.args.iter().for_each(|arg| reserve_in_expr(arg, session));
        }
        Expression::Member { base, .. } => reserve_in_expr(base, session),
        Expression::Index { base, index } => {
            reserve_in_expr(base, session);
            reserve_in_expr(index, session);
        }
        Expression::New { args, .. } => args.iter().for_each(|arg| reserve_in_expr(arg, session)),
        Expression::Ternary {
            condition,
            then,
            otherwise,
        } => {
            reserve_in_expr(condition, session);
            reserve_in_expr(then, session);
            reserve_in_expr(otherwise, session);
        }
        Expression::Literal(_) => {}
    }
}
