//! Renders syntax trees back into BSL source text.
//!
//! The printer always emits the Russian spelling of keywords and built-in
//! literals. Output produced here parses back into an equal tree.

use crate::ast::{
    Call, Declaration, Directive, Expression, IfStatement, Literal, Loop, LoopKind,
    Module, Routine, RoutineKind, Statement, VariableDeclaration,
};
use serde::{Deserialize, Serialize};

/// Layout options for printed modules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintConfig {
    /// Put every routine on a single line.
    pub one_line: bool,
    /// Spaces per nesting level.
    pub margin: usize,
}

impl Default for PrintConfig {
    fn default() -> Self {
        Self {
            one_line: false,
            margin: 4,
        }
    }
}

impl PrintConfig {
    /// One line per routine with a single-space margin, the layout obfuscated
    /// modules are printed in unless asked otherwise.
    pub const fn compact() -> Self {
        Self {
            one_line: true,
            margin: 1,
        }
    }
}

/// Prints a whole module.
pub fn print_module(module: &Module, config: PrintConfig) -> String {
    let mut printer = Printer::new(config);
    for (index, declaration) in module.declarations.iter().enumerate() {
        if index > 0 {
            printer.blank_line();
        }
        match declaration {
            Declaration::Variables(vars) => printer.variables(vars),
            Declaration::Routine(routine) => printer.routine(routine),
        }
    }
    if !module.body.is_empty() {
        if !module.declarations.is_empty() {
            printer.blank_line();
        }
        printer.block(&module.body);
    }
    printer.finish()
}

/// Prints one statement on a single line without the trailing `;`, in the
/// form accepted by `Выполнить`.
pub fn serialize_statement(statement: &Statement) -> String {
    let mut printer = Printer::new(PrintConfig {
        one_line: true,
        margin: 0,
    });
    printer.statement(statement);
    let text = printer.finish();
    text.trim_end().trim_end_matches(';').to_string()
}

/// Prints an expression in the form accepted by `Вычислить`.
pub fn serialize_expression(expression: &Expression) -> String {
    let mut out = String::new();
    write_expression(&mut out, expression);
    out
}

struct Printer {
    config: PrintConfig,
    out: String,
    depth: usize,
}

impl Printer {
    fn new(config: PrintConfig) -> Self {
        Self {
            config,
            out: String::new(),
            depth: 0,
        }
    }

    fn finish(self) -> String {
        self.out
    }

    fn line(&mut self, text: &str) {
        if self.config.one_line {
            if !self.out.is_empty() && !self.out.ends_with('\n') {
                self.out.push(' ');
            }
            self.out.push_str(text);
        } else {
            self.out
                .extend(std::iter::repeat_n(' ', self.depth * self.config.margin));
            self.out.push_str(text);
            self.out.push('\n');
        }
    }

    /// Separates top-level declarations.
    fn blank_line(&mut self) {
        self.out.push('\n');
    }

    fn directive(&mut self, directive: Option<Directive>) {
        if let Some(directive) = directive {
            self.line(&directive.to_string());
        }
    }

    fn variables(&mut self, vars: &VariableDeclaration) {
        self.directive(vars.directive);
        let names: Vec<String> = vars
            .variables
            .iter()
            .map(|var| {
                if var.export {
                    format!("{} Экспорт", var.name)
                } else {
                    var.name.clone()
                }
            })
            .collect();
        self.line(&format!("Перем {};", names.join(", ")));
    }

    fn routine(&mut self, routine: &Routine) {
        self.directive(routine.directive);
        let (open, close) = match routine.kind {
            RoutineKind::Procedure => ("Процедура", "КонецПроцедуры"),
            RoutineKind::Function => ("Функция", "КонецФункции"),
        };
        let params: Vec<String> = routine
            .params
            .iter()
            .map(|param| {
                let mut text = String::new();
                if param.by_value {
                    text.push_str("Знач ");
                }
                text.push_str(&param.name);
                if let Some(default) = &param.default {
                    text.push_str(" = ");
                    write_expression(&mut text, default);
                }
                text
            })
            .collect();
        let export = if routine.export { " Экспорт" } else { "" };
        self.line(&format!(
            "{open} {}({}){export}",
            routine.name,
            params.join(", ")
        ));
        self.nested(&routine.body);
        self.line(close);
    }

    fn block(&mut self, block: &[Statement]) {
        for statement in block {
            self.statement(statement);
        }
    }

    fn nested(&mut self, block: &[Statement]) {
        self.depth += 1;
        self.block(block);
        self.depth -= 1;
    }

    fn statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Assign { target, value } => {
                let text = format!("{} = {};", expression(target), expression(value));
                self.line(&text);
            }
            Statement::Expression(expr) => self.line(&format!("{};", expression(expr))),
            Statement::If(if_statement) => self.if_statement(if_statement),
            Statement::Loop(lp) => self.loop_statement(lp),
            Statement::Return(None) => self.line("Возврат;"),
            Statement::Return(Some(value)) => {
                self.line(&format!("Возврат {};", expression(value)))
            }
            Statement::Throw(None) => self.line("ВызватьИсключение;"),
            Statement::Throw(Some(value)) => {
                self.line(&format!("ВызватьИсключение {};", expression(value)))
            }
            Statement::Try { body, handler } => {
                self.line("Попытка");
                self.nested(body);
                self.line("Исключение");
                self.nested(handler);
                self.line("КонецПопытки;");
            }
            Statement::Label(name) => self.line(&format!("~{name}:")),
            Statement::Goto(name) => self.line(&format!("Перейти ~{name};")),
            Statement::Break => self.line("Прервать;"),
            Statement::Continue => self.line("Продолжить;"),
        }
    }

    fn if_statement(&mut self, stmt: &IfStatement) {
        self.line(&format!("Если {} Тогда", expression(&stmt.condition)));
        self.nested(&stmt.then_block);
        for arm in &stmt.else_ifs {
            self.line(&format!("ИначеЕсли {} Тогда", expression(&arm.condition)));
            self.nested(&arm.block);
        }
        if let Some(else_block) = &stmt.else_block {
            self.line("Иначе");
            self.nested(else_block);
        }
        self.line("КонецЕсли;");
    }

    fn loop_statement(&mut self, lp: &Loop) {
        let header = match &lp.kind {
            LoopKind::While(condition) => format!("Пока {} Цикл", expression(condition)),
            LoopKind::Range { var, from, to } => {
                format!("Для {var} = {} По {} Цикл", expression(from), expression(to))
            }
            LoopKind::ForEach { var, collection } => {
                format!("Для Каждого {var} Из {} Цикл", expression(collection))
            }
        };
        self.line(&header);
        self.nested(&lp.body);
        self.line("КонецЦикла;");
    }
}

fn expression(expr: &Expression) -> String {
    serialize_expression(expr)
}

/// Precedence of `НЕ`, between `И` and the comparisons.
const NOT_PRECEDENCE: u8 = 3;
/// Precedence of unary minus and of postfix units.
const UNARY_PRECEDENCE: u8 = 7;

fn expression_precedence(expr: &Expression) -> u8 {
    match expr {
        Expression::Binary { op, .. } => op.precedence(),
        Expression::Not(_) => NOT_PRECEDENCE,
        Expression::Literal(Literal::Number(n)) if *n < 0.0 => UNARY_PRECEDENCE,
        _ => UNARY_PRECEDENCE + 1,
    }
}

fn write_operand(out: &mut String, expr: &Expression, min_precedence: u8) {
    if expression_precedence(expr) < min_precedence {
        out.push('(');
        write_expression(out, expr);
        out.push(')');
    } else {
        write_expression(out, expr);
    }
}

fn write_args(out: &mut String, args: &[Expression]) {
    out.push('(');
    for (index, arg) in args.iter().enumerate() {
        if index > 0 {
            out.push_str(", ");
        }
        write_expression(out, arg);
    }
    out.push(')');
}

fn write_call(out: &mut String, call: &Call) {
    out.push_str(&call.name);
    write_args(out, &call.args);
}

fn write_expression(out: &mut String, expr: &Expression) {
    match expr {
        Expression::Literal(literal) => write_literal(out, literal),
        Expression::Var(name) => out.push_str(name),
        Expression::Binary { op, left, right } => {
            let precedence = op.precedence();
            // Comparisons do not chain, so both sides of one need to bind tighter.
            let left_min = if op.is_comparison() {
                precedence + 1
            } else {
                precedence
            };
            write_operand(out, left, left_min);
            out.push(' ');
            out.push_str(op.symbol());
            out.push(' ');
            write_operand(out, right, precedence + 1);
        }
        Expression::Not(inner) => {
            out.push_str("НЕ ");
            write_operand(out, inner, NOT_PRECEDENCE);
        }
        Expression::Neg(inner) => {
            out.push('-');
            write_operand(out, inner, UNARY_PRECEDENCE + 1);
        }
        Expression::Call(call) => write_call(out, call),
        Expression::Chain { base, call } => {
            write_operand(out, base, UNARY_PRECEDENCE + 1);
            out.push('.');
            write_call(out, call);
        }
        Expression::Member { base, name } => {
            write_operand(out, base, UNARY_PRECEDENCE + 1);
            out.push('.');
            out.push_str(name);
        }
        Expression::Index { base, index } => {
            write_operand(out, base, UNARY_PRECEDENCE + 1);
            out.push('[');
            write_expression(out, index);
            out.push(']');
        }
        Expression::New { constructor, args } => {
            out.push_str("Новый ");
            out.push_str(constructor);
            write_args(out, args);
        }
        Expression::Ternary {
            condition,
            then,
            otherwise,
        } => {
            out.push_str("?(");
            write_expression(out, condition);
            out.push_str(", ");
            write_expression(out, then);
            out.push_str(", ");
            write_expression(out, otherwise);
            out.push(')');
        }
    }
}

fn write_literal(out: &mut String, literal: &Literal) {
    match literal {
        Literal::Number(value) => out.push_str(&format_number(*value)),
        Literal::String(value) => {
            out.push('"');
            for c in value.chars() {
                match c {
                    '"' => out.push_str("\"\""),
                    '\n' => out.push_str("\n|"),
                    '\r' => {}
                    c => out.push(c),
                }
            }
            out.push('"');
        }
        Literal::Bool(true) => out.push_str("Истина"),
        Literal::Bool(false) => out.push_str("Ложь"),
        Literal::Date(digits) => {
            out.push('\'');
            out.push_str(digits);
            out.push('\'');
        }
        Literal::Undefined => out.push_str("Неопределено"),
        Literal::Null => out.push_str("NULL"),
    }
}

/// Integral values print without a fractional part.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_expression, parse_module};

    fn roundtrip_expr(source: &str) -> String {
        serialize_expression(&parse_expression(source).unwrap())
    }

    #[test]
    fn keeps_required_parentheses() {
        assert_eq!(roundtrip_expr("(а + б) * в"), "(а + б) * в");
        assert_eq!(roundtrip_expr("а - (б - в)"), "а - (б - в)");
        assert_eq!(roundtrip_expr("а - б - в"), "а - б - в");
        assert_eq!(roundtrip_expr("НЕ (а И б)"), "НЕ (а И б)");
        assert_eq!(roundtrip_expr("а И б ИЛИ в"), "а И б ИЛИ в");
        assert_eq!(roundtrip_expr("а И (б ИЛИ в)"), "а И (б ИЛИ в)");
    }

    #[test]
    fn prints_ternaries_and_calls() {
        assert_eq!(
            roundtrip_expr("?(1 > 2, Лев(\"аб\", 1), Новый Массив())"),
            "?(1 > 2, Лев(\"аб\", 1), Новый Массив())"
        );
        assert_eq!(roundtrip_expr("Объект.Метод(1).Поле[2]"), "Объект.Метод(1).Поле[2]");
    }

    #[test]
    fn escapes_strings() {
        let expr = Expression::string("a \"b\"\nc");
        assert_eq!(serialize_expression(&expr), "\"a \"\"b\"\"\n|c\"");
        assert_eq!(parse_expression(&serialize_expression(&expr)).unwrap(), expr);
    }

    #[test]
    fn integral_numbers_have_no_fraction() {
        assert_eq!(format_number(5.0), "5");
        assert_eq!(format_number(-12.0), "-12");
        assert_eq!(format_number(0.25), "0.25");
    }

    #[test]
    fn module_roundtrip_is_stable() {
        let source = "&НаСервере\nПроцедура Тест(Знач А, Б = 1) Экспорт\n    Для Сч = 0 По 10 Цикл\n        Если Сч > 5 Тогда\n            Прервать;\n        ИначеЕсли Сч = 2 Тогда\n            Продолжить;\n        Иначе\n            Сообщить(Сч);\n        КонецЕсли;\n    КонецЦикла;\n    ~метка:\n    Перейти ~метка;\nКонецПроцедуры\n";
        let module = parse_module(source).unwrap();
        let printed = print_module(&module, PrintConfig::default());
        assert_eq!(printed, source);
        assert_eq!(parse_module(&printed).unwrap(), module);
    }

    #[test]
    fn one_line_layout() {
        let module =
            parse_module("Функция Ф()\n    А = 1;\n    Возврат А;\nКонецФункции").unwrap();
        let printed = print_module(
            &module,
            PrintConfig {
                one_line: true,
                margin: 0,
            },
        );
        assert_eq!(printed, "Функция Ф() А = 1; Возврат А; КонецФункции");
    }

    #[test]
    fn serialized_statements_drop_the_terminator() {
        let stmt = Statement::call("Сообщить", vec![Expression::string("х")]);
        assert_eq!(serialize_statement(&stmt), "Сообщить(\"х\")");
    }
}
