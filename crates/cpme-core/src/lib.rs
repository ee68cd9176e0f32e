pub mod config;
pub mod error;
pub mod naming;
pub mod types;

pub use config::{CipherConfig, CpmeConfig, LogConfig};
pub use error::{CpmeError, CpmeResult};
pub use types::{Direction, Instruction, MAX_DIMENSION, MAX_INSTRUCTIONS};
