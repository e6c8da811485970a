//! Behavior checks for obfuscated modules.
//!
//! This crate runs an original module and its obfuscated counterpart through
//! a reference interpreter and compares what they print and return.

pub mod builtins;
pub mod interpreter;
pub mod result;
pub mod value;

pub use interpreter::{Interpreter, DEFAULT_STEP_LIMIT};
pub use result::{Error, Result};
pub use value::Value;

use murk_core::ast::{Expression, Literal};
use murk_core::{BslCodec, SourceCodec};
use serde::{Deserialize, Serialize};

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The entry routine returned a value of the given type and presentation.
    Returned { kind: String, value: String },
    /// An exception escaped the entry routine.
    Raised(String),
}

/// Observable behavior of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    /// Lines passed to `Сообщить`, in order.
    pub output: Vec<String>,
    pub outcome: Outcome,
    /// Statements executed.
    pub steps: usize,
}

impl Execution {
    /// Same output and same outcome; step counts may differ.
    pub fn same_behavior(&self, other: &Execution) -> bool {
        self.output == other.output && self.outcome == other.outcome
    }
}

/// Result of comparing an original module with its obfuscated form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub entry: String,
    pub equivalent: bool,
    pub original: Execution,
    pub obfuscated: Execution,
}

/// Runs modules under a statement budget.
#[derive(Debug, Clone, Copy)]
pub struct Verifier {
    step_limit: usize,
}

impl Default for Verifier {
    fn default() -> Self {
        Self {
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }
}

impl Verifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_step_limit(step_limit: usize) -> Self {
        Self { step_limit }
    }

    /// Runs `entry` of `source`, collecting its output.
    ///
    /// Exceptions escaping the entry routine are part of the observed
    /// behavior; parse failures and an exhausted step budget are errors.
    pub fn run(&self, source: &str, entry: &str, args: &[Value]) -> Result<Execution> {
        let module = BslCodec.parse(source)?;
        let mut interpreter = Interpreter::new(&module, &BslCodec).with_step_limit(self.step_limit);
        let outcome = match interpreter.run(entry, args.to_vec()) {
            Ok(value) => Outcome::Returned {
                kind: value.type_name().to_string(),
                value: value.to_string(),
            },
            Err(Error::Runtime(message)) => Outcome::Raised(message),
            Err(other) => return Err(other),
        };
        Ok(Execution {
            output: interpreter.output().to_vec(),
            outcome,
            steps: interpreter.steps(),
        })
    }

    /// Main entry point: check that two modules behave the same when `entry`
    /// is called with `args`.
    pub fn verify_equivalence(
        &self,
        original: &str,
        obfuscated: &str,
        entry: &str,
        args: &[Value],
    ) -> Result<VerificationReport> {
        tracing::debug!("Running original module");
        let original = self.run(original, entry, args)?;
        tracing::debug!("Running obfuscated module");
        let obfuscated = self.run(obfuscated, entry, args)?;
        let equivalent = original.same_behavior(&obfuscated);

        tracing::info!(
            "Verification of '{}' completed: equivalent: {}, steps {} -> {}",
            entry,
            equivalent,
            original.steps,
            obfuscated.steps
        );
        Ok(VerificationReport {
            entry: entry.to_string(),
            equivalent,
            original,
            obfuscated,
        })
    }
}

/// [`Verifier::verify_equivalence`] with the default step budget.
pub fn verify_equivalence(
    original: &str,
    obfuscated: &str,
    entry: &str,
    args: &[Value],
) -> Result<VerificationReport> {
    Verifier::default().verify_equivalence(original, obfuscated, entry, args)
}

/// Parses a literal given on the command line (`42`, `-1.5`, `"text"`,
/// `Истина`) into an argument value.
pub fn parse_argument(text: &str) -> Result<Value> {
    match BslCodec.parse_expression(text)? {
        Expression::Literal(literal) => Ok(Value::from(&literal)),
        Expression::Neg(inner) => match *inner {
            Expression::Literal(Literal::Number(value)) => Ok(Value::Number(-value)),
            _ => Err(Error::runtime(format!("'{text}' is not a literal"))),
        },
        _ => Err(Error::runtime(format!("'{text}' is not a literal"))),
    }
}
