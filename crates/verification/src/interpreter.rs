//! Tree-walking interpreter for the BSL subset the obfuscator produces.
//!
//! Jumps are resolved by searching the current block for the label and, when it
//! is not there, handing the jump to the enclosing block. Every generated jump
//! targets a label in the same or an enclosing block, so this covers all
//! obfuscated output.

use crate::builtins;
use crate::value::Value;
use crate::{Error, Result};
use murk_core::ast::{
    BinaryOp, Call, Expression, IfStatement, Loop, LoopKind, Module, Routine, Statement,
};
use murk_core::arith::apply_arithmetic;
use murk_core::SourceCodec;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Statements executed before a run is abandoned.
pub const DEFAULT_STEP_LIMIT: usize = 5_000_000;

const MAX_CALL_DEPTH: usize = 256;

/// How a statement or block finished.
#[derive(Debug)]
enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
    /// Lowercased label still to be found.
    Goto(String),
}

#[derive(Default)]
struct Frame {
    locals: HashMap<String, Value>,
}

fn key(name: &str) -> String {
    name.to_lowercase()
}

pub struct Interpreter<'m> {
    module: &'m Module,
    routines: HashMap<String, &'m Routine>,
    globals: HashMap<String, Value>,
    codec: &'m dyn SourceCodec,
    output: Vec<String>,
    steps: usize,
    step_limit: usize,
    depth: usize,
    last_error: String,
}

impl<'m> Interpreter<'m> {
    pub fn new(module: &'m Module, codec: &'m dyn SourceCodec) -> Self {
        let routines = module
            .routines()
            .map(|routine| (key(&routine.name), routine))
            .collect();
        let globals = module
            .declarations
            .iter()
            .filter_map(|declaration| match declaration {
                murk_core::ast::Declaration::Variables(vars) => Some(&vars.variables),
                murk_core::ast::Declaration::Routine(_) => None,
            })
            .flatten()
            .map(|var| (key(&var.name), Value::Undefined))
            .collect();
        Self {
            module,
            routines,
            globals,
            codec,
            output: Vec::new(),
            steps: 0,
            step_limit: DEFAULT_STEP_LIMIT,
            depth: 0,
            last_error: String::new(),
        }
    }

    pub fn with_step_limit(mut self, step_limit: usize) -> Self {
        self.step_limit = step_limit;
        self
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Lines passed to `Сообщить` so far.
    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// Runs the module body, then calls `entry` with `args`.
    pub fn run(&mut self, entry: &str, args: Vec<Value>) -> Result<Value> {
        let module = self.module;
        let mut frame = Frame::default();
        match self.exec_block(&module.body, &mut frame)? {
            Flow::Goto(label) => return Err(Error::runtime(format!("label '~{label}' not found"))),
            Flow::Break | Flow::Continue => {
                return Err(Error::runtime("break or continue outside a loop"))
            }
            Flow::Normal | Flow::Return(_) => {}
        }
        debug!(entry, "calling entry routine");
        self.call(entry, args)
    }

    /// Calls a routine of the module by name.
    pub fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Value> {
        match self.routines.get(&key(name)).copied() {
            Some(routine) => self.invoke(routine, args),
            None => Err(Error::runtime(format!("routine '{name}' is not defined"))),
        }
    }

    fn invoke(&mut self, routine: &'m Routine, args: Vec<Value>) -> Result<Value> {
        if args.len() > routine.params.len() {
            return Err(Error::runtime(format!(
                "too many arguments for '{}'",
                routine.name
            )));
        }
        if self.depth >= MAX_CALL_DEPTH {
            return Err(Error::runtime("call stack overflow"));
        }

        let mut frame = Frame::default();
        let mut args = args.into_iter();
        for param in &routine.params {
            let value = match (args.next(), &param.default) {
                (Some(value), _) => value,
                (None, Some(default)) => self.eval(default, &mut frame)?,
                (None, None) => Value::Undefined,
            };
            frame.locals.insert(key(&param.name), value);
        }

        self.depth += 1;
        let flow = self.exec_block(&routine.body, &mut frame);
        self.depth -= 1;
        match flow? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Undefined),
            Flow::Goto(label) => Err(Error::runtime(format!(
                "label '~{label}' not found in '{}'",
                routine.name
            ))),
            Flow::Break | Flow::Continue => {
                Err(Error::runtime("break or continue outside a loop"))
            }
        }
    }

    fn tick(&mut self) -> Result<()> {
        self.steps += 1;
        if self.steps > self.step_limit {
            return Err(Error::StepLimit(self.step_limit));
        }
        Ok(())
    }

    fn exec_block(&mut self, block: &[Statement], frame: &mut Frame) -> Result<Flow> {
        let mut pc = 0;
        while pc < block.len() {
            match self.exec(&block[pc], frame)? {
                Flow::Normal => pc += 1,
                Flow::Goto(label) => match find_label(block, &label) {
                    Some(position) => pc = position + 1,
                    None => return Ok(Flow::Goto(label)),
                },
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, statement: &Statement, frame: &mut Frame) -> Result<Flow> {
        self.tick()?;
        match statement {
            Statement::Assign { target, value } => {
                let value = self.eval(value, frame)?;
                self.assign(target, value, frame)?;
            }
            Statement::Expression(expr) => {
                self.eval(expr, frame)?;
            }
            Statement::If(stmt) => return self.exec_if(stmt, frame),
            Statement::Loop(lp) => return self.exec_loop(lp, frame),
            Statement::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, frame)?,
                    None => Value::Undefined,
                };
                return Ok(Flow::Return(value));
            }
            Statement::Throw(Some(expr)) => {
                let payload = self.eval(expr, frame)?;
                return Err(Error::Runtime(payload.to_string()));
            }
            Statement::Throw(None) => return Err(Error::Runtime(self.last_error.clone())),
            Statement::Try { body, handler } => {
                return match self.exec_block(body, frame) {
                    Err(Error::Runtime(message)) => {
                        debug!(%message, "exception caught");
                        self.last_error = message;
                        self.exec_block(handler, frame)
                    }
                    other => other,
                };
            }
            Statement::Label(_) => {}
            Statement::Goto(label) => return Ok(Flow::Goto(key(label))),
            Statement::Break => return Ok(Flow::Break),
            Statement::Continue => return Ok(Flow::Continue),
        }
        Ok(Flow::Normal)
    }

    fn exec_if(&mut self, stmt: &IfStatement, frame: &mut Frame) -> Result<Flow> {
        if self.eval(&stmt.condition, frame)?.as_bool()? {
            return self.exec_block(&stmt.then_block, frame);
        }
        for arm in &stmt.else_ifs {
            if self.eval(&arm.condition, frame)?.as_bool()? {
                return self.exec_block(&arm.block, frame);
            }
        }
        match &stmt.else_block {
            Some(block) => self.exec_block(block, frame),
            None => Ok(Flow::Normal),
        }
    }

    fn exec_loop(&mut self, lp: &Loop, frame: &mut Frame) -> Result<Flow> {
        match &lp.kind {
            LoopKind::While(condition) => loop {
                self.tick()?;
                if !self.eval(condition, frame)?.as_bool()? {
                    break;
                }
                match self.exec_block(&lp.body, frame)? {
                    Flow::Normal | Flow::Continue => {}
                    Flow::Break => break,
                    other => return Ok(other),
                }
            },
            LoopKind::Range { var, from, to } => {
                let from = self.eval(from, frame)?.as_number()?;
                let to = self.eval(to, frame)?.as_number()?;
                self.set_var(var, Value::Number(from), frame);
                loop {
                    self.tick()?;
                    if self.get_var(var, frame)?.as_number()? > to {
                        break;
                    }
                    match self.exec_block(&lp.body, frame)? {
                        Flow::Normal | Flow::Continue => {}
                        Flow::Break => break,
                        other => return Ok(other),
                    }
                    let next = self.get_var(var, frame)?.as_number()? + 1.0;
                    self.set_var(var, Value::Number(next), frame);
                }
            }
            LoopKind::ForEach { var, collection } => {
                let items = match self.eval(collection, frame)? {
                    Value::Array(items) => items.borrow().clone(),
                    other => {
                        return Err(Error::runtime(format!(
                            "cannot iterate over {}",
                            other.type_name()
                        )))
                    }
                };
                for item in items {
                    self.tick()?;
                    self.set_var(var, item, frame);
                    match self.exec_block(&lp.body, frame)? {
                        Flow::Normal | Flow::Continue => {}
                        Flow::Break => break,
                        other => return Ok(other),
                    }
                }
            }
        }
        Ok(Flow::Normal)
    }

    fn get_var(&self, name: &str, frame: &Frame) -> Result<Value> {
        let name_key = key(name);
        frame
            .locals
            .get(&name_key)
            .or_else(|| self.globals.get(&name_key))
            .cloned()
            .ok_or_else(|| Error::runtime(format!("variable '{name}' is not defined")))
    }

    /// Assigns a local unless only a module variable of that name exists.
    fn set_var(&mut self, name: &str, value: Value, frame: &mut Frame) {
        let name_key = key(name);
        if !frame.locals.contains_key(&name_key) {
            if let Some(slot) = self.globals.get_mut(&name_key) {
                *slot = value;
                return;
            }
        }
        frame.locals.insert(name_key, value);
    }

    fn assign(&mut self, target: &Expression, value: Value, frame: &mut Frame) -> Result<()> {
        match target {
            Expression::Var(name) => {
                self.set_var(name, value, frame);
                Ok(())
            }
            Expression::Index { base, index } => {
                let base = self.eval(base, frame)?;
                let index = self.eval(index, frame)?;
                match base {
                    Value::Array(items) => {
                        let position = builtins::checked_index(items.borrow().len(), &index)?;
                        items.borrow_mut()[position] = value;
                        Ok(())
                    }
                    other => Err(Error::runtime(format!(
                        "{} cannot be indexed",
                        other.type_name()
                    ))),
                }
            }
            other => Err(Error::runtime(format!("cannot assign to {other:?}"))),
        }
    }

    fn eval(&mut self, expr: &Expression, frame: &mut Frame) -> Result<Value> {
        match expr {
            Expression::Literal(literal) => Ok(Value::from(literal)),
            Expression::Var(name) => self.get_var(name, frame),
            Expression::Binary { op, left, right } => self.eval_binary(*op, left, right, frame),
            Expression::Not(inner) => Ok(Value::Bool(!self.eval(inner, frame)?.as_bool()?)),
            Expression::Neg(inner) => Ok(Value::Number(-self.eval(inner, frame)?.as_number()?)),
            Expression::Call(call) => self.eval_call(call, frame),
            Expression::Chain { base, call } => {
                let base = self.eval(base, frame)?;
                let args = self.eval_args(&call.args, frame)?;
                builtins::method(&base, &call.name, args)
            }
            Expression::Member { name, .. } => Err(Error::runtime(format!(
                "property '{name}' is not supported"
            ))),
            Expression::Index { base, index } => {
                let base = self.eval(base, frame)?;
                let index = self.eval(index, frame)?;
                match base {
                    Value::Array(items) => {
                        let items = items.borrow();
                        let position = builtins::checked_index(items.len(), &index)?;
                        Ok(items[position].clone())
                    }
                    other => Err(Error::runtime(format!(
                        "{} cannot be indexed",
                        other.type_name()
                    ))),
                }
            }
            Expression::New { constructor, args } => {
                let args = self.eval_args(args, frame)?;
                builtins::construct(constructor, args)
            }
            Expression::Ternary {
                condition,
                then,
                otherwise,
            } => {
                if self.eval(condition, frame)?.as_bool()? {
                    self.eval(then, frame)
                } else {
                    self.eval(otherwise, frame)
                }
            }
        }
    }

    fn eval_args(&mut self, args: &[Expression], frame: &mut Frame) -> Result<Vec<Value>> {
        args.iter().map(|arg| self.eval(arg, frame)).collect()
    }

    fn eval_binary(
        &mut self,
        op: BinaryOp,
        left: &Expression,
        right: &Expression,
        frame: &mut Frame,
    ) -> Result<Value> {
        // И/ИЛИ evaluate their right operand only when needed.
        match op {
            BinaryOp::And => {
                if !self.eval(left, frame)?.as_bool()? {
                    return Ok(Value::Bool(false));
                }
                return Ok(Value::Bool(self.eval(right, frame)?.as_bool()?));
            }
            BinaryOp::Or => {
                if self.eval(left, frame)?.as_bool()? {
                    return Ok(Value::Bool(true));
                }
                return Ok(Value::Bool(self.eval(right, frame)?.as_bool()?));
            }
            _ => {}
        }
        let left = self.eval(left, frame)?;
        let right = self.eval(right, frame)?;
        binary(op, &left, &right)
    }

    fn eval_call(&mut self, call: &Call, frame: &mut Frame) -> Result<Value> {
        let args = self.eval_args(&call.args, frame)?;
        if let Some(routine) = self.routines.get(&key(&call.name)).copied() {
            return self.invoke(routine, args);
        }
        match key(&call.name).as_str() {
            "выполнить" => {
                let text = builtins::arg(&args, 0, &call.name)?.as_str()?;
                let statements = self
                    .codec
                    .parse_statements(text)
                    .map_err(|e| Error::Runtime(e.to_string()))?;
                trace!(statements = statements.len(), "executing dynamic text");
                match self.exec_block(&statements, frame)? {
                    Flow::Normal => Ok(Value::Undefined),
                    other => Err(Error::runtime(format!(
                        "dynamic text left its block: {other:?}"
                    ))),
                }
            }
            "вычислить" => {
                let text = builtins::arg(&args, 0, &call.name)?.as_str()?;
                let expr = self
                    .codec
                    .parse_expression(text)
                    .map_err(|e| Error::Runtime(e.to_string()))?;
                self.eval(&expr, frame)
            }
            "сообщить" => {
                let line = args.first().map(ToString::to_string).unwrap_or_default();
                trace!(%line, "message");
                self.output.push(line);
                Ok(Value::Undefined)
            }
            "описаниеошибки" => Ok(Value::String(self.last_error.clone())),
            _ => builtins::function(&call.name, args),
        }
    }
}

fn find_label(block: &[Statement], label: &str) -> Option<usize> {
    block
        .iter()
        .position(|statement| matches!(statement, Statement::Label(name) if key(name) == label))
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    let arithmetic = |l: f64, r: f64| {
        apply_arithmetic(op, l, r)
            .map(Value::Number)
            .map_err(|e| Error::Runtime(e.to_string()))
    };
    match op {
        BinaryOp::Eq => Ok(Value::Bool(left.equals(right))),
        BinaryOp::NotEq => Ok(Value::Bool(!left.equals(right))),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            let ordering = match (left, right) {
                (Value::Number(l), Value::Number(r)) => l.partial_cmp(r),
                (Value::String(l), Value::String(r)) | (Value::Date(l), Value::Date(r)) => {
                    Some(l.cmp(r))
                }
                _ => None,
            };
            let ordering = ordering.ok_or_else(|| {
                Error::runtime(format!(
                    "cannot compare {} with {}",
                    left.type_name(),
                    right.type_name()
                ))
            })?;
            Ok(Value::Bool(ordered(op, ordering)))
        }
        BinaryOp::Add => match (left, right) {
            (Value::String(l), r) => Ok(Value::String(format!("{l}{r}"))),
            (Value::Number(l), Value::String(r)) => {
                let r = r.trim().parse::<f64>().map_err(|_| {
                    Error::runtime(format!("cannot convert '{r}' to Число"))
                })?;
                arithmetic(*l, r)
            }
            (l, r) => arithmetic(l.as_number()?, r.as_number()?),
        },
        _ => arithmetic(left.as_number()?, right.as_number()?),
    }
}

fn ordered(op: BinaryOp, ordering: Ordering) -> bool {
    match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::LtEq => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        _ => ordering.is_ge(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murk_core::BslCodec;

    fn run(source: &str, entry: &str) -> (Result<Value>, Vec<String>) {
        let module = BslCodec.parse(source).unwrap();
        let mut interpreter = Interpreter::new(&module, &BslCodec).with_step_limit(100_000);
        let result = interpreter.run(entry, Vec::new());
        (result, interpreter.output().to_vec())
    }

    #[test]
    fn counted_loop_with_break_and_continue() {
        let (result, output) = run(
            "Процедура П()
    Для Сч = 1 По 10 Цикл
        Если Сч = 2 Тогда
            Продолжить;
        КонецЕсли;
        Если Сч > 4 Тогда
            Прервать;
        КонецЕсли;
        Сообщить(Сч);
    КонецЦикла;
    Сообщить(\"после \" + Сч);
КонецПроцедуры",
            "П",
        );
        result.unwrap();
        assert_eq!(output, ["1", "3", "4", "после 5"]);
    }

    #[test]
    fn jumps_leave_nested_blocks() {
        let (result, output) = run(
            "Функция Ф()
    Сч = 0;
    ~Начало:
    Если Сч >= 3 Тогда
        Перейти ~Конец;
    КонецЕсли;
    Сч = Сч + 1;
    Перейти ~Начало;
    ~Конец:
    Возврат Сч;
КонецФункции",
            "Ф",
        );
        assert!(result.unwrap().equals(&Value::Number(3.0)));
        assert!(output.is_empty());
    }

    #[test]
    fn exceptions_are_caught() {
        let (result, output) = run(
            "Процедура П()
    Попытка
        Х = 1 / 0;
    Исключение
        Сообщить(\"поймано\");
    КонецПопытки;
    ВызватьИсключение \"дальше\";
КонецПроцедуры",
            "П",
        );
        assert!(matches!(result, Err(Error::Runtime(message)) if message == "дальше"));
        assert_eq!(output, ["поймано"]);
    }

    #[test]
    fn dynamic_text_runs_in_the_caller_frame() {
        let (result, output) = run(
            "Процедура П()
    А = 2;
    Б = Вычислить(\"А * 21\");
    Выполнить(\"Сообщить(Б)\");
КонецПроцедуры",
            "П",
        );
        result.unwrap();
        assert_eq!(output, ["42"]);
    }

    #[test]
    fn runaway_loops_hit_the_step_limit() {
        let (result, _) = run(
            "Процедура П()\n    Пока Истина Цикл\n    КонецЦикла;\nКонецПроцедуры",
            "П",
        );
        assert!(matches!(result, Err(Error::StepLimit(100_000))));
    }

    #[test]
    fn arrays_are_shared() {
        let (result, output) = run(
            "Процедура Заполнить(М)
    М.Добавить(\"б\");
КонецПроцедуры

Процедура П()
    М = Новый Массив;
    М.Добавить(\"а\");
    Заполнить(М);
    М[0] = \"я\";
    Для Каждого Эл Из М Цикл
        Сообщить(Эл);
    КонецЦикла;
    Сообщить(М.Количество());
КонецПроцедуры",
            "П",
        );
        result.unwrap();
        assert_eq!(output, ["я", "б", "2"]);
    }

    #[test]
    fn module_variables_are_shared_between_routines() {
        let (result, output) = run(
            "Перем Счетчик;

Процедура Увеличить()
    Счетчик = Счетчик + 1;
КонецПроцедуры

Процедура П()
    Счетчик = 0;
    Увеличить();
    Увеличить();
    Сообщить(Счетчик);
КонецПроцедуры",
            "П",
        );
        result.unwrap();
        assert_eq!(output, ["2"]);
    }
}
