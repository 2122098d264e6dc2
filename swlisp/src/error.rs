//! Runtime error types
//!
//! Every failure is fatal to the program being interpreted: errors propagate
//! with `?` to the embedder, which reports the one-line diagnostic and stops.
//! Nothing is caught along the way and no evaluation state is rolled back.

use swlisp_gc::AllocError;
use thiserror::Error;

/// An interpreter error
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed syntax: unexpected token, missing `)`, truncated input
    #[error("{0}")]
    Parse(String),

    /// Runtime shape mismatch, e.g. applying a non-function or destructuring
    /// a non-cons
    #[error("{0}")]
    Type(&'static str),

    /// Variable lookup found no binding
    #[error("eval: no such binding: {0}")]
    Unbound(String),

    /// Out of host memory, or the object-count limit is still reached after
    /// a collection cycle
    #[error("{0}")]
    Resource(#[from] AllocError),
}

/// Result type used throughout evaluation
pub type EvalResult<T> = Result<T, Error>;
