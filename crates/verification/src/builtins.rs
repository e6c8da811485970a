//! Global functions, array methods and constructors known to the interpreter.
//!
//! Names are matched case-insensitively. Only what obfuscated output and
//! typical test modules use is covered.

use crate::value::Value;
use crate::{Error, Result};
use base64::{engine::general_purpose, Engine as _};
use murk_core::printer::format_number;
use std::rc::Rc;

/// Argument `index` of `function`, which must be present.
pub fn arg<'a>(args: &'a [Value], index: usize, function: &str) -> Result<&'a Value> {
    args.get(index).ok_or_else(|| {
        Error::runtime(format!("'{function}' expects at least {} arguments", index + 1))
    })
}

fn optional_number(args: &[Value], index: usize, default: f64) -> Result<f64> {
    match args.get(index) {
        Some(Value::Undefined) | None => Ok(default),
        Some(value) => value.as_number(),
    }
}

/// Zero-based position into a collection of `len` items.
pub fn checked_index(len: usize, index: &Value) -> Result<usize> {
    let number = index.as_number()?;
    if number.fract() != 0.0 || number < 0.0 || number >= len as f64 {
        return Err(Error::runtime(format!(
            "index {} is out of range",
            format_number(number)
        )));
    }
    Ok(number as usize)
}

/// Clamps a character count taken from the program to `0..=len`.
fn char_count(value: f64, len: usize) -> usize {
    if value <= 0.0 {
        0
    } else {
        (value as usize).min(len)
    }
}

pub fn function(name: &str, args: Vec<Value>) -> Result<Value> {
    let lowered = name.to_lowercase();
    let number = |index: usize| arg(&args, index, name).and_then(Value::as_number);
    let bits = |index: usize| arg(&args, index, name).and_then(Value::as_u32);
    let text = |index: usize| arg(&args, index, name).and_then(Value::as_str);

    let value = match lowered.as_str() {
        "символ" => {
            let code = bits(0)?;
            Value::String(char::from_u32(code).map(String::from).unwrap_or_default())
        }
        "кодсимвола" => {
            let position = optional_number(&args, 1, 1.0)?;
            let code = if position >= 1.0 {
                text(0)?.chars().nth(position as usize - 1)
            } else {
                None
            };
            Value::Number(code.map_or(-1.0, |c| f64::from(u32::from(c))))
        }
        "стрдлина" => Value::Number(text(0)?.chars().count() as f64),
        "врег" => Value::String(text(0)?.to_uppercase()),
        "нрег" => Value::String(text(0)?.to_lowercase()),
        "сокрлп" => Value::String(text(0)?.trim().to_string()),
        "лев" => {
            let source = text(0)?;
            let count = char_count(number(1)?, source.chars().count());
            Value::String(source.chars().take(count).collect())
        }
        "прав" => {
            let source = text(0)?;
            let len = source.chars().count();
            let count = char_count(number(1)?, len);
            Value::String(source.chars().skip(len - count).collect())
        }
        "сред" => {
            let source = text(0)?;
            let len = source.chars().count();
            let start = char_count(number(1)? - 1.0, len);
            let count = char_count(optional_number(&args, 2, len as f64)?, len - start);
            Value::String(source.chars().skip(start).take(count).collect())
        }
        "строка" => Value::String(arg(&args, 0, name)?.to_string()),
        "xmlстрока" => Value::String(match arg(&args, 0, name)? {
            Value::Bool(true) => "true".to_string(),
            Value::Bool(false) => "false".to_string(),
            other => other.to_string(),
        }),
        "число" => match arg(&args, 0, name)? {
            Value::Number(value) => Value::Number(*value),
            other => {
                let source = other.to_string();
                let parsed = source.trim().parse::<f64>().map_err(|_| {
                    Error::runtime(format!("cannot convert '{source}' to Число"))
                })?;
                Value::Number(parsed)
            }
        },
        "цел" => Value::Number(number(0)?.trunc()),
        "окр" => {
            let scale = 10f64.powf(optional_number(&args, 1, 0.0)?);
            Value::Number((number(0)? * scale).round() / scale)
        }
        "макс" | "мин" => {
            let values = args
                .iter()
                .map(Value::as_number)
                .collect::<Result<Vec<_>>>()?;
            let pick: fn(f64, f64) -> f64 = if lowered == "макс" { f64::max } else { f64::min };
            let first = number(0)?;
            Value::Number(values.into_iter().fold(first, pick))
        }
        "побитовоеи" => Value::Number(f64::from(bits(0)? & bits(1)?)),
        "побитовоеили" => Value::Number(f64::from(bits(0)? | bits(1)?)),
        "побитовоеисклили" => Value::Number(f64::from(bits(0)? ^ bits(1)?)),
        "побитовоеине" => Value::Number(f64::from(bits(0)? & !bits(1)?)),
        "побитовоене" => Value::Number(f64::from(!bits(0)?)),
        "побитовыйсдвигвлево" | "побитовыйсдвигвправо" => {
            let (value, shift) = (bits(0)?, bits(1)?);
            if shift > 31 {
                return Err(Error::runtime(format!("shift by {shift} is out of range")));
            }
            let shifted = if lowered == "побитовыйсдвигвлево" {
                value << shift
            } else {
                value >> shift
            };
            Value::Number(f64::from(shifted))
        }
        "base64значение" => {
            let bytes = general_purpose::STANDARD
                .decode(text(0)?.trim())
                .unwrap_or_default();
            Value::Binary(Rc::new(bytes))
        }
        "base64строка" => match arg(&args, 0, name)? {
            Value::Binary(bytes) => Value::String(general_purpose::STANDARD.encode(bytes.as_slice())),
            other => {
                return Err(Error::runtime(format!(
                    "expected ДвоичныеДанные, got {}",
                    other.type_name()
                )))
            }
        },
        "получитьстрокуиздвоичныхданных" => match arg(&args, 0, name)? {
            Value::Binary(bytes) => {
                let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes.as_slice());
                let decoded = String::from_utf8(bytes.to_vec())
                    .map_err(|e| Error::runtime(format!("invalid UTF-8: {e}")))?;
                Value::String(decoded)
            }
            other => {
                return Err(Error::runtime(format!(
                    "expected ДвоичныеДанные, got {}",
                    other.type_name()
                )))
            }
        },
        "получитьдвоичныеданныеизстроки" => {
            Value::Binary(Rc::new(text(0)?.as_bytes().to_vec()))
        }
        _ => return Err(Error::runtime(format!("function '{name}' is not defined"))),
    };
    Ok(value)
}

/// `target.name(args)`
pub fn method(target: &Value, name: &str, args: Vec<Value>) -> Result<Value> {
    let Value::Array(items) = target else {
        return Err(Error::runtime(format!(
            "{} has no method '{name}'",
            target.type_name()
        )));
    };
    let lowered = name.to_lowercase();
    let value = match lowered.as_str() {
        "добавить" => {
            let item = args.into_iter().next().unwrap_or(Value::Undefined);
            items.borrow_mut().push(item);
            Value::Undefined
        }
        "количество" => Value::Number(items.borrow().len() as f64),
        "вграница" => Value::Number(items.borrow().len() as f64 - 1.0),
        "получить" => {
            let items = items.borrow();
            let position = checked_index(items.len(), arg(&args, 0, name)?)?;
            items[position].clone()
        }
        "установить" => {
            let position = checked_index(items.borrow().len(), arg(&args, 0, name)?)?;
            items.borrow_mut()[position] = arg(&args, 1, name)?.clone();
            Value::Undefined
        }
        "вставить" => {
            let len = items.borrow().len();
            let position = checked_index(len + 1, arg(&args, 0, name)?)?;
            let item = args.get(1).cloned().unwrap_or(Value::Undefined);
            items.borrow_mut().insert(position, item);
            Value::Undefined
        }
        "удалить" => {
            let position = checked_index(items.borrow().len(), arg(&args, 0, name)?)?;
            items.borrow_mut().remove(position);
            Value::Undefined
        }
        "найти" => {
            let needle = arg(&args, 0, name)?;
            items
                .borrow()
                .iter()
                .position(|item| item.equals(needle))
                .map_or(Value::Undefined, |position| Value::Number(position as f64))
        }
        "очистить" => {
            items.borrow_mut().clear();
            Value::Undefined
        }
        _ => return Err(Error::runtime(format!("Массив has no method '{name}'"))),
    };
    Ok(value)
}

/// `Новый constructor(args)`
pub fn construct(constructor: &str, args: Vec<Value>) -> Result<Value> {
    match constructor.to_lowercase().as_str() {
        "массив" => {
            let len = match args.first() {
                Some(size) => checked_index(usize::MAX, size)?,
                None => 0,
            };
            Ok(Value::array(vec![Value::Undefined; len]))
        }
        _ => Err(Error::runtime(format!("type '{constructor}' is not supported"))),
    }
}
