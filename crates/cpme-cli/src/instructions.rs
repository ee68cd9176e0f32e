//! Instruction list assembly for the CLI.
//!
//! The first instruction comes from `-k/-D/-s`; an optional TOML instruction
//! file appends more. Any instruction without a key is completed by the
//! prompt callback, which reads without echo in the real binary.

use std::path::Path;

use anyhow::{Context, Result};
use cpme_core::types::{check_instruction_count, InstructionFile};
use cpme_core::Instruction;
use zeroize::Zeroizing;

/// Instruction given directly on the command line.
pub struct FirstInstruction {
    pub dimension: usize,
    pub key: Option<String>,
    pub integrity_check: bool,
}

/// Build the ordered instruction list. `prompt(n)` supplies the key for the
/// 1-based instruction `n` when none was given.
pub fn collect<P>(
    first: FirstInstruction,
    file: Option<&Path>,
    mut prompt: P,
) -> Result<Vec<Instruction>>
where
    P: FnMut(usize) -> Result<String>,
{
    let mut pending = vec![(first.dimension, first.key, first.integrity_check)];

    if let Some(path) = file {
        let content = Zeroizing::new(
            std::fs::read_to_string(path)
                .with_context(|| format!("reading instruction file: {}", path.display()))?,
        );
        let parsed = InstructionFile::from_toml(&content)
            .with_context(|| format!("loading instruction file: {}", path.display()))?;
        tracing::debug!(
            path = %path.display(),
            count = parsed.instructions.len(),
            "loaded instruction file"
        );
        pending.extend(
            parsed
                .instructions
                .into_iter()
                .map(|e| (e.dimension, e.key, e.integrity_check)),
        );
    }

    check_instruction_count(pending.len())?;

    let mut instructions = Vec::with_capacity(pending.len());
    for (n, (dimension, key, integrity_check)) in pending.into_iter().enumerate() {
        let key = Zeroizing::new(match key {
            Some(key) => key,
            None => prompt(n + 1)?,
        });
        let instruction = Instruction::new(dimension, key.as_str(), integrity_check)
            .with_context(|| format!("instruction {}", n + 1))?;
        instructions.push(instruction);
    }
    Ok(instructions)
}

/// Read a key from the terminal without echo.
pub fn prompt_key(n: usize) -> Result<String> {
    rpassword::prompt_password(format!("Key for instruction {n}: "))
        .context("reading key from terminal")
}
