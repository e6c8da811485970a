use crate::result::Error;
use rand::{rngs::StdRng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::fmt;

/// Domain separator mixed into every derived stream.
const DOMAIN: &[u8] = b"MURK_BSL_OBFUSCATION";

/// A 256-bit seed driving every random choice of an obfuscation run.
///
/// Independent consumers (the walker and the two predicate producers) each get
/// their own stream, so the output does not depend on how the producers are
/// scheduled against the walker.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seed {
    inner: [u8; 32],
}

impl Seed {
    /// Generate a new random 256-bit seed
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        rand::rng().fill_bytes(&mut seed);
        Self { inner: seed }
    }

    /// Create from hex string (with or without 0x prefix)
    pub fn from_hex(hex: &str) -> Result<Self, Error> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        if hex.len() != 64 {
            return Err(Error::InvalidSeedLength(hex.len()));
        }

        let bytes = hex::decode(hex).map_err(|_| Error::InvalidSeedHex)?;
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&bytes);
        Ok(Self { inner: seed })
    }

    /// Convert to hex string with 0x prefix
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.inner))
    }

    /// RNG for the named stream. The same seed and stream name always yield the
    /// same sequence; different stream names are independent.
    pub fn stream_rng(&self, stream: &str) -> StdRng {
        let mut hasher = Sha3_256::new();
        hasher.update(DOMAIN);
        hasher.update(self.inner);
        hasher.update(stream.as_bytes());
        StdRng::from_seed(hasher.finalize().into())
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Seed").field(&self.to_hex()).finish()
    }
}
