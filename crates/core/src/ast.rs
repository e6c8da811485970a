//! Syntax tree for BSL modules.
//!
//! The tree is a set of closed enums: statements, expressions and literals are
//! matched exhaustively, there is no dynamic "any node" type. Blocks are plain
//! `Vec<Statement>` so passes can rebuild a block and splice expansions in place
//! by position.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A whole module: declarations followed by the module body.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub declarations: Vec<Declaration>,
    /// Statements of the main program section (after all routines).
    pub body: Vec<Statement>,
}

impl Module {
    /// Iterates over the routines declared in the module.
    pub fn routines(&self) -> impl Iterator<Item = &Routine> {
        self.declarations.iter().filter_map(|decl| match decl {
            Declaration::Routine(routine) => Some(routine),
            Declaration::Variables(_) => None,
        })
    }

    /// Looks a routine up by name, ignoring letter case like the platform does.
    pub fn routine(&self, name: &str) -> Option<&Routine> {
        self.routines().find(|r| r.name.to_lowercase() == name.to_lowercase())
    }

    /// True when the module declares nothing and has no body.
    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty() && self.body.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Declaration {
    Variables(VariableDeclaration),
    Routine(Routine),
}

/// `Перем А, Б Экспорт;`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VariableDeclaration {
    pub directive: Option<Directive>,
    pub variables: Vec<ModuleVariable>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModuleVariable {
    pub name: String,
    pub export: bool,
}

/// Execution-context annotation of a routine or module variable.
///
/// A routine may only call routines that are available in its own context, so
/// everything synthesized for a caller is tagged with the caller's directive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Directive {
    AtClient,
    AtServer,
    AtServerNoContext,
    AtClientAtServerNoContext,
    AtClientAtServer,
}

impl Directive {
    /// Parses the annotation name (without the leading `&`), case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "наклиенте" | "atclient" => Some(Self::AtClient),
            "насервере" | "atserver" => Some(Self::AtServer),
            "насерверебезконтекста" | "atservernocontext" => Some(Self::AtServerNoContext),
            "наклиентенасерверебезконтекста" | "atclientatservernocontext" => {
                Some(Self::AtClientAtServerNoContext)
            }
            "наклиентенасервере" | "atclientatserver" => Some(Self::AtClientAtServer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AtClient => "НаКлиенте",
            Self::AtServer => "НаСервере",
            Self::AtServerNoContext => "НаСервереБезКонтекста",
            Self::AtClientAtServerNoContext => "НаКлиентеНаСервереБезКонтекста",
            Self::AtClientAtServer => "НаКлиентеНаСервере",
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "&{}", self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoutineKind {
    Procedure,
    Function,
}

/// A procedure or function declaration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Routine {
    pub kind: RoutineKind,
    pub name: String,
    pub params: Vec<Parameter>,
    pub body: Vec<Statement>,
    pub export: bool,
    pub directive: Option<Directive>,
}

impl Routine {
    /// A parameterless, non-exported function with the given body.
    pub fn function(name: impl Into<String>, directive: Option<Directive>) -> Self {
        Self {
            kind: RoutineKind::Function,
            name: name.into(),
            params: Vec::new(),
            body: Vec::new(),
            export: false,
            directive,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    /// `Знач` modifier.
    pub by_value: bool,
    pub default: Option<Expression>,
}

impl Parameter {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            by_value: false,
            default: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    /// `target = value;`
    Assign { target: Expression, value: Expression },
    /// An expression evaluated for its side effects: a method call, a call chain,
    /// an object construction or a bare variable reference.
    Expression(Expression),
    If(IfStatement),
    Loop(Loop),
    Return(Option<Expression>),
    /// `ВызватьИсключение`, with or without a payload.
    Throw(Option<Expression>),
    Try {
        body: Vec<Statement>,
        handler: Vec<Statement>,
    },
    /// `~name:`
    Label(String),
    /// `Перейти ~name;`
    Goto(String),
    Break,
    Continue,
}

impl Statement {
    pub fn assign(target: impl Into<String>, value: Expression) -> Self {
        Self::Assign {
            target: Expression::var(target),
            value,
        }
    }

    pub fn call(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Self::Expression(Expression::call(name, args))
    }

    pub fn is_loop(&self) -> bool {
        matches!(self, Self::Loop(_))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IfStatement {
    pub condition: Expression,
    pub then_block: Vec<Statement>,
    pub else_ifs: Vec<ElseIf>,
    /// `None` when the statement has no `Иначе` part at all.
    pub else_block: Option<Vec<Statement>>,
}

impl IfStatement {
    pub fn new(condition: Expression, then_block: Vec<Statement>) -> Self {
        Self {
            condition,
            then_block,
            else_ifs: Vec::new(),
            else_block: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ElseIf {
    pub condition: Expression,
    pub block: Vec<Statement>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Loop {
    pub kind: LoopKind,
    pub body: Vec<Statement>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LoopKind {
    /// `Пока condition Цикл`
    While(Expression),
    /// `Для var = from По to Цикл`
    Range {
        var: String,
        from: Expression,
        to: Expression,
    },
    /// `Для Каждого var Из collection Цикл`
    ForEach { var: String, collection: Expression },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Number(f64),
    String(String),
    Bool(bool),
    /// Date literal digits as written between the quotes, e.g. `20240131120000`.
    Date(String),
    Undefined,
    Null,
}

impl Literal {
    /// Literals that can be returned from a parameterless function unchanged.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Self::Undefined | Self::Null)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinaryOp {
    /// Binding strength; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::Eq | Self::NotEq | Self::Lt | Self::LtEq | Self::Gt | Self::GtEq => 4,
            Self::Add | Self::Sub => 5,
            Self::Mul | Self::Div | Self::Mod => 6,
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::NotEq | Self::Lt | Self::LtEq | Self::Gt | Self::GtEq
        )
    }

    /// The comparison that yields the opposite answer, when there is one.
    pub fn inverse(self) -> Option<Self> {
        match self {
            Self::Eq => Some(Self::NotEq),
            Self::NotEq => Some(Self::Eq),
            Self::Lt => Some(Self::GtEq),
            Self::GtEq => Some(Self::Lt),
            Self::Gt => Some(Self::LtEq),
            Self::LtEq => Some(Self::Gt),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::And => "И",
            Self::Or => "ИЛИ",
        }
    }
}

/// `name(args)`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub name: String,
    pub args: Vec<Expression>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    Literal(Literal),
    Var(String),
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Not(Box<Expression>),
    Neg(Box<Expression>),
    /// A plain method call, `Name(args)`.
    Call(Call),
    /// A call on a preceding unit, `base.Name(args)`.
    Chain { base: Box<Expression>, call: Call },
    /// `base.name`
    Member { base: Box<Expression>, name: String },
    /// `base[index]`
    Index {
        base: Box<Expression>,
        index: Box<Expression>,
    },
    /// `Новый Name(args)`
    New { constructor: String, args: Vec<Expression> },
    /// `?(condition, then, otherwise)`
    Ternary {
        condition: Box<Expression>,
        then: Box<Expression>,
        otherwise: Box<Expression>,
    },
}

impl Expression {
    pub fn var(name: impl Into<String>) -> Self {
        Self::Var(name.into())
    }

    pub fn number(value: f64) -> Self {
        Self::Literal(Literal::Number(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::Literal(Literal::String(value.into()))
    }

    pub fn call(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Self::Call(Call {
            name: name.into(),
            args,
        })
    }

    pub fn binary(op: BinaryOp, left: Expression, right: Expression) -> Self {
        Self::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn ternary(condition: Expression, then: Expression, otherwise: Expression) -> Self {
        Self::Ternary {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Self::Literal(literal) => Some(literal),
            _ => None,
        }
    }

    /// True for call-like nodes whose evaluation may have side effects.
    pub fn is_call_like(&self) -> bool {
        matches!(self, Self::Call(_) | Self::Chain { .. } | Self::New { .. })
    }

    /// Logical negation, folding comparisons and double negations instead of
    /// stacking `НЕ` on top.
    pub fn negate(self) -> Self {
        match self {
            Self::Not(inner) => *inner,
            Self::Literal(Literal::Bool(value)) => Self::Literal(Literal::Bool(!value)),
            Self::Binary { op, left, right } => match op.inverse() {
                Some(inverse) => Self::Binary {
                    op: inverse,
                    left,
                    right,
                },
                None => Self::Not(Box::new(Self::Binary { op, left, right })),
            },
            other => Self::Not(Box::new(other)),
        }
    }
}
