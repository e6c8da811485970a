use murk_core::parser::is_reserved;
use rand::{rngs::StdRng, Rng};
use std::collections::HashSet;

/// Alphabet of generated identifiers and decoy strings.
pub const CHARSET: &str = "abcdefghijklmnopqrstuvwxyzйцукенгшщзхъфывапролджэячсмитьбю";

/// Length of synthesized routine names.
pub const ROUTINE_NAME_LEN: usize = 30;

/// Random string over [`CHARSET`]. Not guaranteed to be unique.
pub fn random_string(rng: &mut StdRng, len: usize) -> String {
    let charset: Vec<char> = CHARSET.chars().collect();
    (0..len)
        .map(|_| charset[rng.random_range(0..charset.len())])
        .collect()
}

/// Hands out identifiers that are unique within one obfuscation run.
///
/// BSL identifiers are case-insensitive, so names are compared lowercased. Names
/// already used by the input module can be reserved up front.
#[derive(Debug, Default)]
pub struct NameGenerator {
    used: HashSet<String>,
}

impl NameGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks an existing identifier as taken.
    pub fn reserve(&mut self, name: &str) {
        self.used.insert(name.to_lowercase());
    }

    /// A fresh identifier of exactly `len` characters.
    pub fn fresh(&mut self, rng: &mut StdRng, len: usize) -> String {
        loop {
            let candidate = random_string(rng, len);
            if is_reserved(&candidate) {
                continue;
            }
            if self.used.insert(candidate.to_lowercase()) {
                return candidate;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}
