//! Error types for chain construction and scoring.
//!
//! All validation happens before a chain starts sweeping; the sampler
//! itself has no recoverable-error paths.

use thiserror::Error;

/// Result type alias for Quorum operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for chain construction and held-out scoring.
#[derive(Debug, Error)]
pub enum Error {
    #[error("no annotation domains provided")]
    NoDomains,

    #[error("annotation matrix has no annotator columns")]
    NoAnnotators,

    #[error("annotation matrix has no items")]
    EmptyMatrix,

    #[error("item {item} has {got} votes, expected {expected}")]
    RaggedRow {
        item: usize,
        expected: usize,
        got: usize,
    },

    #[error("domain {domain} has {got} annotators, expected {expected}")]
    AnnotatorCountMismatch {
        domain: usize,
        expected: usize,
        got: usize,
    },

    #[error("held-out data has {got} domains, expected {expected}")]
    DomainCountMismatch { expected: usize, got: usize },

    #[error("chain must retain at least one sample")]
    NoRetainedSamples,

    #[error("concentration must be positive and finite, got {got}")]
    InvalidConcentration { got: f64 },
}
