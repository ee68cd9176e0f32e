use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CpmeError, CpmeResult};
use crate::types::MAX_DIMENSION;

/// Top-level configuration (loaded from cpme.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CpmeConfig {
    pub cipher: CipherConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CipherConfig {
    /// Largest matrix dimension; also the variable-mode chunk ceiling (default: 8192).
    /// Changing it changes the ciphertext.
    pub max_dimension: usize,
    /// Worker thread count (0 = cpu_count, default: 1)
    pub threads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
    /// Append-only file receiving one line per fatal error
    pub fatal_log: PathBuf,
}

impl Default for CipherConfig {
    fn default() -> Self {
        Self {
            max_dimension: MAX_DIMENSION,
            threads: 1,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
            fatal_log: PathBuf::from("cpme_log.txt"),
        }
    }
}

impl CipherConfig {
    /// Resolve `threads = 0` to the machine's available parallelism.
    pub fn effective_threads(&self) -> usize {
        if self.threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.threads
        }
    }

    pub fn validate(&self) -> CpmeResult<()> {
        if self.max_dimension == 0 {
            return Err(CpmeError::Config("max_dimension must be positive".into()));
        }
        Ok(())
    }
}

impl CpmeConfig {
    /// Parse a TOML document; missing keys fall back to defaults.
    pub fn from_toml(s: &str) -> CpmeResult<Self> {
        let config: CpmeConfig =
            toml::from_str(s).map_err(|e| CpmeError::Config(format!("parsing config: {e}")))?;
        config.cipher.validate()?;
        Ok(config)
    }

    /// Load the config file at `path`, or defaults when it does not exist.
    pub fn load_or_default(path: &Path) -> CpmeResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)
        } else {
            tracing::debug!("config file not found: {}  (using defaults)", path.display());
            Ok(Self::default())
        }
    }
}
