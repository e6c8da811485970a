use crate::names::{random_string, NameGenerator};
use crate::oracle::Oracle;
use crate::{ObfuscationConfig, Result, TransformStats};
use murk_core::ast::{Directive, Expression, Routine};
use murk_core::{Seed, SourceCodec};
use rand::{rngs::StdRng, Rng};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Mutable state of one obfuscation run.
///
/// A session owns the walker's random stream, the condition oracle, the name
/// generator, the decoder memo and the routines synthesized so far. Passes are
/// free functions taking `&mut Session`.
pub struct Session {
    pub config: ObfuscationConfig,
    pub codec: Arc<dyn SourceCodec>,
    pub stats: TransformStats,
    seed: Seed,
    rng: StdRng,
    oracle: Oracle,
    names: NameGenerator,
    decoders: HashMap<Option<Directive>, String>,
    synthesized: Vec<Routine>,
}

impl Session {
    /// Creates a session and starts its oracle. Must be called from within a
    /// tokio runtime.
    pub fn new(config: ObfuscationConfig, codec: Arc<dyn SourceCodec>) -> Self {
        let seed = config.seed.clone().unwrap_or_else(Seed::generate);
        debug!(seed = %seed.to_hex(), "starting obfuscation session");
        Self {
            rng: seed.stream_rng("walker"),
            oracle: Oracle::spawn(&seed),
            seed,
            config,
            codec,
            stats: TransformStats::default(),
            names: NameGenerator::new(),
            decoders: HashMap::new(),
            synthesized: Vec::new(),
        }
    }

    pub fn seed(&self) -> &Seed {
        &self.seed
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Marks identifiers of the input module as taken.
    pub fn reserve_name(&mut self, name: &str) {
        self.names.reserve(name);
    }

    /// A fresh identifier unique within the session.
    pub fn fresh_name(&mut self, len: usize) -> String {
        self.names.fresh(&mut self.rng, len)
    }

    /// A fresh identifier with a random length in `[min, max]`.
    pub fn fresh_name_between(&mut self, min: usize, max: usize) -> String {
        let len = self.rng.random_range(min..=max);
        self.fresh_name(len)
    }

    /// A random, possibly repeating, string for decoy values.
    pub fn random_string(&mut self, len: usize) -> String {
        random_string(&mut self.rng, len)
    }

    /// Fair coin flip.
    pub fn coin(&mut self) -> bool {
        self.rng.random_bool(0.5)
    }

    /// A predicate node that always evaluates to true.
    pub fn true_condition(&mut self) -> Result<Expression> {
        let text = self.oracle.next_true()?;
        Ok(self.codec.parse_expression(&text)?)
    }

    /// A predicate node that always evaluates to false.
    pub fn false_condition(&mut self) -> Result<Expression> {
        let text = self.oracle.next_false()?;
        Ok(self.codec.parse_expression(&text)?)
    }

    pub(crate) fn decoder(&self, directive: Option<Directive>) -> Option<&str> {
        self.decoders.get(&directive).map(String::as_str)
    }

    pub(crate) fn remember_decoder(&mut self, directive: Option<Directive>, name: String) {
        self.decoders.insert(directive, name);
    }

    /// Queues a synthesized routine for appending to the module.
    pub fn add_routine(&mut self, routine: Routine) {
        debug!(name = %routine.name, "synthesized routine");
        self.stats.routines_synthesized += 1;
        self.synthesized.push(routine);
    }

    /// Takes the routines synthesized so far, in creation order.
    pub fn take_routines(&mut self) -> Vec<Routine> {
        std::mem::take(&mut self.synthesized)
    }

    /// Stops the oracle producers.
    pub fn shutdown(&self) {
        self.oracle.shutdown();
    }
}
