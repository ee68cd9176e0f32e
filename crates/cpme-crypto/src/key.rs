//! Key folding: key string → KeyScalar
//!
//! Adjacent byte pairs are summed, shifted left by their position, and folded
//! into an alternating accumulator:
//!
//! ```text
//! sum_0 = (s0+s1) << 0
//! sum_i = ((s_i + s_{i+1}) << i) - sum_{i-1}
//! ```
//!
//! The result seeds every digit stream for the instruction, so it must be
//! strictly positive (it is fed to a logarithm).

use cpme_core::{CpmeError, CpmeResult};
use secrecy::{ExposeSecret, SecretString};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Integer folded from a key string. Zeroized on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct KeyScalar {
    value: i64,
}

impl KeyScalar {
    /// Fold `key` into a scalar. Keys shorter than two bytes and keys whose
    /// fold is not positive are rejected.
    pub fn derive(key: &str) -> CpmeResult<Self> {
        let bytes = key.as_bytes();
        if bytes.len() < 2 {
            return Err(CpmeError::InvalidKey(
                "key must be at least 2 characters long".into(),
            ));
        }

        let mut sum: i64 = 0;
        for (i, pair) in bytes.windows(2).enumerate() {
            let add = (pair[0] as i64 + pair[1] as i64).wrapping_shl(i as u32);
            sum = add.wrapping_sub(sum);
        }

        if sum <= 0 {
            return Err(CpmeError::InvalidKey(
                "key folds to a non-positive scalar; choose a different key".into(),
            ));
        }
        Ok(Self { value: sum })
    }

    pub fn from_secret(key: &SecretString) -> CpmeResult<Self> {
        Self::derive(key.expose_secret())
    }

    pub fn value(&self) -> i64 {
        self.value
    }
}

impl std::fmt::Debug for KeyScalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyScalar")
            .field("value", &"[REDACTED]")
            .finish()
    }
}
