use crate::{Error, Result};
use murk_core::ast::Literal;
use murk_core::printer::format_number;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A run-time value of the interpreted language.
///
/// Arrays are shared by reference, like platform collections: copying a
/// variable that holds one copies the reference.
#[derive(Clone, Debug)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// `ГГГГММДДччммсс` digits as written in the literal.
    Date(String),
    Binary(Rc<Vec<u8>>),
    Array(Rc<RefCell<Vec<Value>>>),
}

impl Value {
    pub fn array(items: Vec<Value>) -> Self {
        Self::Array(Rc::new(RefCell::new(items)))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "Неопределено",
            Self::Null => "Null",
            Self::Bool(_) => "Булево",
            Self::Number(_) => "Число",
            Self::String(_) => "Строка",
            Self::Date(_) => "Дата",
            Self::Binary(_) => "ДвоичныеДанные",
            Self::Array(_) => "Массив",
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Self::Bool(value) => Ok(*value),
            other => Err(Error::runtime(format!(
                "expected Булево, got {}",
                other.type_name()
            ))),
        }
    }

    pub fn as_number(&self) -> Result<f64> {
        match self {
            Self::Number(value) => Ok(*value),
            other => Err(Error::runtime(format!(
                "expected Число, got {}",
                other.type_name()
            ))),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            Self::String(value) => Ok(value),
            other => Err(Error::runtime(format!(
                "expected Строка, got {}",
                other.type_name()
            ))),
        }
    }

    /// A non-negative integer fitting the platform's 32-bit bitwise functions.
    pub fn as_u32(&self) -> Result<u32> {
        let number = self.as_number()?;
        if number.fract() != 0.0 || !(0.0..=f64::from(u32::MAX)).contains(&number) {
            return Err(Error::runtime(format!(
                "{} is not a 32-bit unsigned integer",
                format_number(number)
            )));
        }
        Ok(number as u32)
    }

    /// Value equality as `=` sees it; values of different types are unequal.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) | (Self::Date(a), Self::Date(b)) => a == b,
            (Self::Binary(a), Self::Binary(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<&Literal> for Value {
    fn from(literal: &Literal) -> Self {
        match literal {
            Literal::Number(value) => Self::Number(*value),
            Literal::String(value) => Self::String(value.clone()),
            Literal::Bool(value) => Self::Bool(*value),
            Literal::Date(digits) => Self::Date(digits.clone()),
            Literal::Undefined => Self::Undefined,
            Literal::Null => Self::Null,
        }
    }
}

/// Presentation used by `Сообщить` and `Строка`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined | Self::Null => Ok(()),
            Self::Bool(true) => f.write_str("Да"),
            Self::Bool(false) => f.write_str("Нет"),
            Self::Number(value) => f.write_str(&format_number(*value)),
            Self::String(value) | Self::Date(value) => f.write_str(value),
            Self::Binary(bytes) => write!(f, "{}", bytes.len()),
            Self::Array(_) => f.write_str("Массив"),
        }
    }
}
