use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;

use crate::error::{CpmeError, CpmeResult};

/// Largest permutation matrix dimension, and the variable-mode chunk ceiling.
pub const MAX_DIMENSION: usize = 8192;

/// Maximum number of layered instructions per job.
pub const MAX_INSTRUCTIONS: usize = 10;

/// Which way an instruction list is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Instructions front-to-back, forward matrices
    Encrypt,
    /// Instructions back-to-front, transposed (inverse) matrices
    Decrypt,
}

impl Direction {
    pub fn is_inverse(self) -> bool {
        self == Direction::Decrypt
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Encrypt => f.write_str("encrypt"),
            Direction::Decrypt => f.write_str("decrypt"),
        }
    }
}

/// One encryption/decryption pass: dimension mode, key, integrity flag.
///
/// Immutable once built. The key never appears in `Debug` or `Display`
/// output and is zeroized when the instruction is dropped.
#[derive(Debug)]
pub struct Instruction {
    dimension_mode: usize,
    key: SecretString,
    integrity_check: bool,
}

impl Instruction {
    /// `dimension_mode` 0 selects variable-dimension chunking; any other value
    /// is a fixed chunk size (capped at the configured maximum when run).
    ///
    /// Keys shorter than two bytes have no adjacent pair to fold and are rejected.
    pub fn new(
        dimension_mode: usize,
        key: impl Into<String>,
        integrity_check: bool,
    ) -> CpmeResult<Self> {
        let key: String = key.into();
        if key.len() < 2 {
            return Err(CpmeError::InvalidKey(
                "key must be at least 2 characters long".into(),
            ));
        }
        Ok(Self {
            dimension_mode,
            key: SecretString::from(key),
            integrity_check,
        })
    }

    pub fn dimension_mode(&self) -> usize {
        self.dimension_mode
    }

    pub fn is_variable(&self) -> bool {
        self.dimension_mode == 0
    }

    pub fn key(&self) -> &SecretString {
        &self.key
    }

    pub fn integrity_check(&self) -> bool {
        self.integrity_check
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_variable() {
            write!(f, "dimension: variable")?;
        } else {
            write!(f, "dimension: {}", self.dimension_mode)?;
        }
        write!(
            f,
            ", integrity check: {}, key: [REDACTED] ({} chars)",
            if self.integrity_check { "on" } else { "off" },
            self.key.expose_secret().chars().count()
        )
    }
}

/// Reject empty or oversized instruction lists.
pub fn check_instruction_count(count: usize) -> CpmeResult<()> {
    if count == 0 {
        return Err(CpmeError::MissingInstructions);
    }
    if count > MAX_INSTRUCTIONS {
        return Err(CpmeError::TooManyInstructions {
            count,
            max: MAX_INSTRUCTIONS,
        });
    }
    Ok(())
}

/// Instruction list file (TOML):
///
/// ```toml
/// [[instruction]]
/// dimension = 0
/// key = "first key"
///
/// [[instruction]]
/// dimension = 256
/// integrity_check = false
/// ```
///
/// An entry without `key` is completed interactively by the caller.
#[derive(Debug, Default, Deserialize)]
pub struct InstructionFile {
    #[serde(default, rename = "instruction")]
    pub instructions: Vec<InstructionEntry>,
}

#[derive(Deserialize)]
pub struct InstructionEntry {
    #[serde(default)]
    pub dimension: usize,
    pub key: Option<String>,
    #[serde(default = "default_true")]
    pub integrity_check: bool,
}

fn default_true() -> bool {
    true
}

impl fmt::Debug for InstructionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstructionEntry")
            .field("dimension", &self.dimension)
            .field("key", &self.key.as_ref().map(|_| "[REDACTED]"))
            .field("integrity_check", &self.integrity_check)
            .finish()
    }
}

impl InstructionFile {
    pub fn from_toml(s: &str) -> CpmeResult<Self> {
        toml::from_str(s).map_err(|e| CpmeError::Config(format!("parsing instruction file: {e}")))
    }
}
