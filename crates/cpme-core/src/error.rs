use thiserror::Error;

pub type CpmeResult<T> = Result<T, CpmeError>;

/// Every variant is fatal: nothing is retried or recovered mid-instruction,
/// because a partially applied pass is neither plaintext nor ciphertext.
#[derive(Debug, Error)]
pub enum CpmeError {
    #[error("allocation failure: could not reserve {requested} bytes for {what}")]
    AllocationFailure { what: &'static str, requested: usize },

    #[error("no instructions set: at least one instruction is required before run")]
    MissingInstructions,

    #[error("too many instructions: {count} given, at most {max} allowed")]
    TooManyInstructions { count: usize, max: usize },

    #[error(
        "integrity check failed for {dimension}-byte chunk at offset {offset} \
         (before={before}, after={after}, bytes remaining={bytes_remaining})"
    )]
    IntegrityViolation {
        offset: usize,
        dimension: usize,
        before: i64,
        after: i64,
        bytes_remaining: u64,
    },

    #[error("no permutation matrix cached for dimension {dimension}")]
    InvalidMatrixReference { dimension: usize },

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid matrix dimension {dimension}: must be positive")]
    InvalidDimension { dimension: usize },

    #[error("input length changed: job created for {expected} bytes, found {actual}")]
    LengthMismatch { expected: u64, actual: u64 },

    #[error("output {path} would overwrite the input file", path = .0.display())]
    OutputIsInput(std::path::PathBuf),

    #[error("job not in a writable state: {0}")]
    NotWritable(&'static str),

    #[error("job failed earlier; its buffer is partially transformed and cannot be reused")]
    JobFailed,

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
