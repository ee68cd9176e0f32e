//! cpme-crypto: key-derived permutation matrices for CPME
//!
//! Pipeline for one chunk of D bytes:
//!
//! ```text
//! key string ─fold→ KeyScalar ─log digits→ DigitStream(2D)
//!            ─drain two NodePools→ PermutationMatrix (row_of, check vectors)
//! bytes ─M·v→ permuted bytes   (+ dot-product integrity check)
//! ```
//!
//! The transform is a deterministic, reproducible byte permutation, not a
//! vetted cipher.

pub mod digits;
pub mod key;
pub mod matrix;
pub mod node_pool;
pub mod transform;

pub use digits::{digits_of, DigitStream, DIGITS_PER_LOG};
pub use key::KeyScalar;
pub use matrix::PermutationMatrix;
pub use node_pool::NodePool;
pub use transform::{transform_chunk, IntegrityMismatch, Scratch};
