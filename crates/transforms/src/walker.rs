//! Traversal driving every technique over a module.
//!
//! Statements are consumed and rebuilt so that one statement can be replaced by
//! several (a rewritten loop) in place. Expressions are rebuilt bottom-up. Only
//! routines are obfuscated; every synthesized helper is tagged with the
//! directive of the routine it serves.

use crate::camouflage::{hide, DEFAULT_COMPLEXITY};
use crate::delinearize::delinearize;
use crate::garbage::{false_arms, inject, inject_optional};
use crate::inflate::inflate;
use crate::strings::conceal;
use crate::{Result, Session};
use murk_core::ast::{
    BinaryOp, Call, Declaration, Directive, ElseIf, Expression, IfStatement, Literal, Loop,
    LoopKind, Module, Routine, Statement,
};
use rand::Rng;
use tracing::{debug, warn};

/// Number of always-true conjuncts added to a randomized condition.
const EXTRA_CONJUNCTS: usize = 3;

pub struct Walker<'s> {
    session: &'s mut Session,
}

impl<'s> Walker<'s> {
    pub fn new(session: &'s mut Session) -> Self {
        Self { session }
    }

    /// Obfuscates every routine of the module in place.
    pub fn visit_module(&mut self, module: &mut Module) -> Result<()> {
        for declaration in &mut module.declarations {
            if let Declaration::Routine(routine) = declaration {
                self.visit_routine(routine)?;
            }
        }
        if !module.body.is_empty() {
            warn!(
                statements = module.body.len(),
                "statements outside routines are left as written"
            );
        }
        Ok(())
    }

    pub fn visit_routine(&mut self, routine: &mut Routine) -> Result<()> {
        debug!(name = %routine.name, "obfuscating routine");
        let directive = routine.directive;
        self.visit_block(&mut routine.body, directive)?;
        inject(self.session, &mut routine.body, directive)
    }

    fn visit_block(&mut self, block: &mut Vec<Statement>, directive: Option<Directive>) -> Result<()> {
        let statements = std::mem::take(block);
        block.reserve(statements.len());
        for statement in statements {
            let replacement = self.visit_statement(statement, directive)?;
            block.extend(replacement);
        }
        Ok(())
    }

    fn visit_statement(
        &mut self,
        statement: Statement,
        directive: Option<Directive>,
    ) -> Result<Vec<Statement>> {
        let statement = match statement {
            Statement::Assign { target, value } => self.visit_assign(target, value, directive)?,
            Statement::Expression(expr) => self.visit_expression_statement(expr, directive)?,
            Statement::If(stmt) => Statement::If(self.visit_if(stmt, directive)?),
            Statement::Loop(lp) => return self.visit_loop(lp, directive),
            Statement::Return(Some(value)) => {
                Statement::Return(Some(self.hide_operand(value, directive)?))
            }
            Statement::Throw(Some(value)) => {
                Statement::Throw(Some(self.visit_expr(value, directive)?))
            }
            Statement::Try {
                mut body,
                mut handler,
            } => {
                self.visit_block(&mut body, directive)?;
                self.visit_block(&mut handler, directive)?;
                Statement::Try { body, handler }
            }
            other => other,
        };
        Ok(vec![statement])
    }

    fn visit_assign(
        &mut self,
        target: Expression,
        value: Expression,
        directive: Option<Directive>,
    ) -> Result<Statement> {
        let target = self.visit_target(target, directive)?;
        let value = if self.session.config.dynamic_eval
            && matches!(target, Expression::Var(_))
            && value.is_call_like()
        {
            let value = self.visit_expr(value, directive)?;
            let text = self.session.codec.serialize_expression(&value);
            self.evaluated("Вычислить", &text, directive)?
        } else {
            self.hide_operand(value, directive)?
        };
        Ok(Statement::Assign { target, value })
    }

    /// Method calls and call chains standing alone may be replaced by
    /// `Выполнить` of their encrypted text.
    fn visit_expression_statement(
        &mut self,
        expr: Expression,
        directive: Option<Directive>,
    ) -> Result<Statement> {
        let is_call = matches!(expr, Expression::Call(_) | Expression::Chain { .. });
        let expr = self.visit_expr(expr, directive)?;
        let statement = Statement::Expression(expr);
        if is_call && self.session.config.dynamic_eval && self.session.coin() {
            let text = self.session.codec.serialize_statement(&statement);
            let call = self.evaluated("Выполнить", &text, directive)?;
            return Ok(Statement::Expression(call));
        }
        Ok(statement)
    }

    fn visit_if(&mut self, stmt: IfStatement, directive: Option<Directive>) -> Result<IfStatement> {
        let IfStatement {
            condition,
            mut then_block,
            else_ifs,
            mut else_block,
        } = stmt;

        let mut condition = self.visit_expr(condition, directive)?;
        if self.session.config.randomize_conditions {
            for _ in 0..EXTRA_CONJUNCTS {
                let truth = self.session.true_condition()?;
                condition = if self.session.coin() {
                    Expression::binary(BinaryOp::And, truth, condition)
                } else {
                    Expression::binary(BinaryOp::And, condition, truth)
                };
            }
        }

        self.visit_block(&mut then_block, directive)?;
        let mut arms = Vec::with_capacity(else_ifs.len());
        for arm in else_ifs {
            let condition = self.visit_expr(arm.condition, directive)?;
            let mut block = arm.block;
            self.visit_block(&mut block, directive)?;
            arms.push(ElseIf { condition, block });
        }
        if let Some(block) = &mut else_block {
            self.visit_block(block, directive)?;
        }

        if self.session.config.randomize_conditions {
            let count = self.session.rng().random_range(0..5);
            arms.extend(false_arms(self.session, count)?);
        }
        inject(self.session, &mut then_block, directive)?;
        inject_optional(self.session, &mut else_block, directive)?;

        Ok(IfStatement {
            condition,
            then_block,
            else_ifs: arms,
            else_block,
        })
    }

    fn visit_loop(&mut self, lp: Loop, directive: Option<Directive>) -> Result<Vec<Statement>> {
        let Loop { kind, mut body } = lp;
        let kind = match kind {
            LoopKind::While(condition) => LoopKind::While(self.visit_expr(condition, directive)?),
            LoopKind::Range { var, from, to } => LoopKind::Range {
                var,
                from: self.visit_expr(from, directive)?,
                to: self.visit_expr(to, directive)?,
            },
            LoopKind::ForEach { var, collection } => LoopKind::ForEach {
                var,
                collection: self.visit_expr(collection, directive)?,
            },
        };
        self.visit_block(&mut body, directive)?;
        let lp = Loop { kind, body };
        if self.session.config.loops_to_jumps {
            delinearize(self.session, lp)
        } else {
            Ok(vec![Statement::Loop(lp)])
        }
    }

    /// Assignment targets keep their shape; only index expressions inside them
    /// are visited.
    fn visit_target(&mut self, target: Expression, directive: Option<Directive>) -> Result<Expression> {
        Ok(match target {
            Expression::Index { base, index } => Expression::Index {
                base: Box::new(self.visit_target(*base, directive)?),
                index: Box::new(self.visit_expr(*index, directive)?),
            },
            Expression::Member { base, name } => Expression::Member {
                base: Box::new(self.visit_target(*base, directive)?),
                name,
            },
            other => other,
        })
    }

    /// Hides a returned or assigned value: strings behind the decoder, other
    /// literals behind trampolines, everything else behind a `?()` chain.
    fn hide_operand(&mut self, value: Expression, directive: Option<Directive>) -> Result<Expression> {
        let config = &self.session.config;
        let (hide_strings, depth, chains) =
            (config.hide_strings, config.call_stack_depth, config.conditional_chains);
        match value {
            Expression::Literal(Literal::String(text)) if hide_strings => {
                conceal(self.session, &text, directive)
            }
            Expression::Literal(literal) if literal.is_scalar() && depth > 0 => {
                inflate(self.session, literal, directive, depth)
            }
            other => {
                let other = self.visit_expr(other, directive)?;
                if chains {
                    hide(self.session, other, DEFAULT_COMPLEXITY)
                } else {
                    Ok(other)
                }
            }
        }
    }

    /// `function(decoder(cipher, key))`
    fn evaluated(
        &mut self,
        function: &str,
        text: &str,
        directive: Option<Directive>,
    ) -> Result<Expression> {
        let decoded = conceal(self.session, text, directive)?;
        self.session.stats.calls_evaluated += 1;
        Ok(Expression::call(function, vec![decoded]))
    }

    fn visit_call(&mut self, call: Call, directive: Option<Directive>) -> Result<Call> {
        let args = self.visit_all(call.args, directive)?;
        Ok(Call {
            name: call.name,
            args,
        })
    }

    fn visit_all(
        &mut self,
        exprs: Vec<Expression>,
        directive: Option<Directive>,
    ) -> Result<Vec<Expression>> {
        exprs
            .into_iter()
            .map(|expr| self.visit_expr(expr, directive))
            .collect()
    }

    fn visit_boxed(
        &mut self,
        expr: Box<Expression>,
        directive: Option<Directive>,
    ) -> Result<Box<Expression>> {
        Ok(Box::new(self.visit_expr(*expr, directive)?))
    }

    pub fn visit_expr(&mut self, expr: Expression, directive: Option<Directive>) -> Result<Expression> {
        Ok(match expr {
            Expression::Literal(Literal::String(text)) if self.session.config.hide_strings => {
                conceal(self.session, &text, directive)?
            }
            Expression::Binary { op, left, right } => {
                let left = self.visit_boxed(left, directive)?;
                let mut right = self.visit_expr(*right, directive)?;
                if self.session.config.conditional_chains {
                    right = hide(self.session, right, DEFAULT_COMPLEXITY)?;
                }
                Expression::Binary {
                    op,
                    left,
                    right: Box::new(right),
                }
            }
            Expression::Not(inner) => Expression::Not(self.visit_boxed(inner, directive)?),
            Expression::Neg(inner) => Expression::Neg(self.visit_boxed(inner, directive)?),
            Expression::Call(call) => Expression::Call(self.visit_call(call, directive)?),
            Expression::Chain { base, call } => Expression::Chain {
                base: self.visit_boxed(base, directive)?,
                call: self.visit_call(call, directive)?,
            },
            Expression::Member { base, name } => Expression::Member {
                base: self.visit_boxed(base, directive)?,
                name,
            },
            Expression::Index { base, index } => Expression::Index {
                base: self.visit_boxed(base, directive)?,
                index: self.visit_boxed(index, directive)?,
            },
            Expression::New { constructor, args } => Expression::New {
                constructor,
                args: self.visit_all(args, directive)?,
            },
            Expression::Ternary {
                condition,
                then,
                otherwise,
            } => Expression::Ternary {
                condition: self.visit_boxed(condition, directive)?,
                then: self.visit_boxed(then, directive)?,
                otherwise: self.visit_boxed(otherwise, directive)?,
            },
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::with_session;
    use crate::ObfuscationConfig;
    use murk_core::parser::parse_module;
    use murk_core::printer::print_module;
    use murk_core::PrintConfig;

    fn walk(config: ObfuscationConfig, source: &str) -> (Module, crate::TransformStats) {
        with_session(config, |session| {
            let mut module = parse_module(source).unwrap();
            Walker::new(session).visit_module(&mut module).unwrap();
            module
                .declarations
                .extend(session.take_routines().into_iter().map(Declaration::Routine));
            (module, session.stats)
        })
    }

    const SAMPLE: &str = "Процедура Тест()
    Для Сч = 1 По 3 Цикл
        Сообщить(\"шаг\" + Сч);
    КонецЦикла;
    Если Сч > 2 Тогда
        А = 1;
    КонецЕсли;
КонецПроцедуры";

    #[test]
    fn disabled_toggles_change_nothing() {
        let (module, stats) = walk(ObfuscationConfig::default(), SAMPLE);
        assert_eq!(module, parse_module(SAMPLE).unwrap());
        assert_eq!(stats, crate::TransformStats::default());
    }

    #[test]
    fn strings_are_routed_through_one_decoder() {
        let config = ObfuscationConfig {
            hide_strings: true,
            ..ObfuscationConfig::default()
        };
        let (module, stats) = walk(config, SAMPLE);
        let printed = print_module(&module, PrintConfig::default());
        assert!(!printed.contains("\"шаг\""));
        assert_eq!(stats.strings_hidden, 1);
        assert_eq!(module.routines().count(), 2);
    }

    #[test]
    fn loops_become_jumps() {
        let config = ObfuscationConfig {
            loops_to_jumps: true,
            ..ObfuscationConfig::default()
        };
        let (module, stats) = walk(config, SAMPLE);
        let routine = module.routine("Тест").unwrap();
        assert!(!routine.body.iter().any(Statement::is_loop));
        assert_eq!(stats.loops_rewritten, 1);
    }

    #[test]
    fn randomized_conditions_gain_three_conjuncts() {
        let config = ObfuscationConfig {
            randomize_conditions: true,
            ..ObfuscationConfig::default()
        };
        let (module, _) = walk(config, SAMPLE);
        let routine = module.routine("Тест").unwrap();
        let stmt = routine
            .body
            .iter()
            .find_map(|s| match s {
                Statement::If(stmt) => Some(stmt),
                _ => None,
            })
            .unwrap();

        fn conjuncts(expr: &Expression) -> usize {
            match expr {
                Expression::Binary {
                    op: BinaryOp::And,
                    left,
                    right,
                } => conjuncts(left) + conjuncts(right),
                _ => 1,
            }
        }
        assert_eq!(conjuncts(&stmt.condition), 4);
        assert!(stmt.else_ifs.len() < 5);
        assert!(stmt.else_block.is_none());
    }

    #[test]
    fn literals_return_through_trampolines() {
        let config = ObfuscationConfig {
            call_stack_depth: 2,
            ..ObfuscationConfig::default()
        };
        let (module, _) = walk(
            config,
            "&НаСервере\nФункция Ответ()\n    Возврат 42;\nКонецФункции",
        );
        assert_eq!(module.routines().count(), 3);
        assert!(module
            .routines()
            .all(|r| r.directive == Some(Directive::AtServer)));
        let original = module.routine("Ответ").unwrap();
        assert!(matches!(
            original.body[0],
            Statement::Return(Some(Expression::Call(_)))
        ));
    }

    /// Value of the first statement of `Тест`, which must be an assignment to `А`.
    fn assigned_value(config: ObfuscationConfig, statement: &str) -> (Expression, Module) {
        let source = format!("Процедура Тест()\n    {statement}\nКонецПроцедуры");
        let (module, _) = walk(config, &source);
        let value = match &module.routine("Тест").unwrap().body[0] {
            Statement::Assign { target, value } => {
                assert_eq!(target, &Expression::var("А"));
                value.clone()
            }
            other => panic!("expected an assignment, got {other:?}"),
        };
        (value, module)
    }

    fn called_name(value: &Expression) -> &str {
        match value {
            Expression::Call(call) => &call.name,
            other => panic!("expected a call, got {other:?}"),
        }
    }

    #[test]
    fn assigned_calls_are_evaluated_dynamically() {
        let config = ObfuscationConfig {
            dynamic_eval: true,
            ..ObfuscationConfig::default()
        };
        let (value, module) = assigned_value(config, "А = Ф(1);");
        assert_eq!(called_name(&value), "Вычислить");
        let Expression::Call(call) = &value else { unreachable!() };
        let decoder = called_name(&call.args[0]);
        assert!(module.routine(decoder).is_some());
    }

    #[test]
    fn assigned_literals_go_through_trampolines() {
        let config = ObfuscationConfig {
            call_stack_depth: 2,
            ..ObfuscationConfig::default()
        };
        let (value, module) = assigned_value(config, "А = 5;");
        let trampoline = called_name(&value);
        assert!(module.routine(trampoline).is_some());
        assert_eq!(module.routines().count(), 3);
    }

    #[test]
    fn assigned_strings_go_through_the_decoder() {
        let config = ObfuscationConfig {
            hide_strings: true,
            ..ObfuscationConfig::default()
        };
        let (value, module) = assigned_value(config, "А = \"х\";");
        let decoder = called_name(&value);
        assert!(module.routine(decoder).is_some());
        assert_eq!(module.routines().count(), 2);
    }

    #[test]
    fn module_body_is_left_alone() {
        let config = ObfuscationConfig::all(1);
        let source = "Процедура П()\nКонецПроцедуры\n\nСообщить(\"тело\");";
        let (module, _) = walk(config, source);
        assert_eq!(module.body, parse_module(source).unwrap().body);
    }
}
