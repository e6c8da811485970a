pub mod camouflage;
pub mod delinearize;
pub mod garbage;
pub mod inflate;
pub mod names;
pub mod obfuscator;
pub mod oracle;
pub mod session;
pub mod shuffle;
pub mod strings;
pub mod walker;

pub use obfuscator::{obfuscate_module, obfuscate_source, ObfuscationResult};
pub use session::Session;

use murk_analysis::Error as MetricsError;
use murk_core::{PrintConfig, Seed};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Transform error type encompassing all transform module errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Parsing or another core operation failed.
    #[error(transparent)]
    Core(#[from] murk_core::Error),

    /// A predicate queue was read after the oracle shut down and drained.
    #[error("condition oracle is exhausted")]
    OracleExhausted,

    /// A synthesized node did not have the expected shape.
    #[error("internal invariant violated: {0}")]
    Invariant(String),

    /// Metrics computation failed.
    #[error("metrics computation failed: {0}")]
    Metrics(#[from] MetricsError),

    /// The blocking worker running the walker panicked or was cancelled.
    #[error("obfuscation worker failed: {0}")]
    Worker(String),
}

/// Transform result type
pub type Result<T> = std::result::Result<T, Error>;

/// Toggles selecting which obfuscation techniques run.
///
/// Everything is off by default; with every toggle off and a zero call-stack depth
/// the module is printed back unchanged apart from layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ObfuscationConfig {
    /// Hide values and right operands behind nested `?()` chains.
    pub conditional_chains: bool,
    /// Rewrite `Пока` and `Для` loops into labels and jumps.
    pub loops_to_jumps: bool,
    /// Replace calls by `Выполнить`/`Вычислить` of their encrypted text.
    pub dynamic_eval: bool,
    /// Replace string literals by calls to a decoder routine.
    pub hide_strings: bool,
    /// Pad `Если` conditions with true conjuncts and false `ИначеЕсли` arms.
    pub randomize_conditions: bool,
    /// Sprinkle inert statements, branches and loops.
    pub inject_garbage: bool,
    /// Number of trampoline functions placed in front of a returned or assigned literal.
    pub call_stack_depth: usize,
    /// Seed for reproducible output; a fresh one is generated when absent.
    pub seed: Option<Seed>,
    /// Layout of the printed result, compact unless set.
    pub print: PrintConfig,
}

impl Default for ObfuscationConfig {
    fn default() -> Self {
        Self {
            conditional_chains: false,
            loops_to_jumps: false,
            dynamic_eval: false,
            hide_strings: false,
            randomize_conditions: false,
            inject_garbage: false,
            call_stack_depth: 0,
            seed: None,
            print: PrintConfig::compact(),
        }
    }
}

impl ObfuscationConfig {
    /// Every boolean toggle on, keeping the given call-stack depth.
    pub fn all(call_stack_depth: usize) -> Self {
        Self {
            conditional_chains: true,
            loops_to_jumps: true,
            dynamic_eval: true,
            hide_strings: true,
            randomize_conditions: true,
            inject_garbage: true,
            call_stack_depth,
            ..Self::default()
        }
    }

    /// Create config with a specific seed
    pub fn with_seed(mut self, seed: Seed) -> Self {
        self.seed = Some(seed);
        self
    }

    /// True when at least one technique would touch the module.
    pub fn any_enabled(&self) -> bool {
        self.conditional_chains
            || self.loops_to_jumps
            || self.dynamic_eval
            || self.hide_strings
            || self.randomize_conditions
            || self.inject_garbage
            || self.call_stack_depth > 0
    }
}

/// Counters reported for an obfuscation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformStats {
    pub routines_synthesized: usize,
    pub strings_hidden: usize,
    pub loops_rewritten: usize,
    pub values_camouflaged: usize,
    pub calls_evaluated: usize,
    pub garbage_blocks: usize,
}

#[cfg(test)]
pub(crate) mod test_utils {
    use crate::{ObfuscationConfig, Session};
    use murk_core::{BslCodec, Seed};
    use std::sync::Arc;

    pub const FIXED_SEED: &str =
        "0x6d75726b6d75726b6d75726b6d75726b6d75726b6d75726b6d75726b6d75726b";

    /// Runs `f` with a seeded session on a thread that may block on the oracle.
    pub fn with_session<T>(config: ObfuscationConfig, f: impl FnOnce(&mut Session) -> T) -> T {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let _guard = runtime.enter();
        let seed = Seed::from_hex(FIXED_SEED).unwrap();
        let mut session = Session::new(config.with_seed(seed), Arc::new(BslCodec));
        f(&mut session)
    }
}
