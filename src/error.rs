//! Error types for model loading and inference.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors produced by model construction, loading, and inference.
///
/// Load-time failures (shape mismatches, missing files, malformed records)
/// are fatal and carry expected-vs-actual detail; there is no automatic
/// recovery. The one recoverable condition in the legacy loader (ragged
/// per-table iteration counts) is reported through the `log` facade rather
/// than through this type.
#[derive(Debug, Error)]
pub enum Error {
    /// A loaded array's shape does not match the model geometry.
    #[error("shape mismatch for {name}: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Name of the offending array or file section.
        name: &'static str,
        /// The shape required by the model geometry.
        expected: String,
        /// The shape actually found.
        actual: String,
    },

    /// A query vector's length does not match the embedding dimensionality.
    #[error("dimension mismatch: expected a vector of length {expected}, got {actual}")]
    DimensionMismatch {
        /// Embedding dimensionality of the model.
        expected: usize,
        /// Length of the vector supplied by the caller.
        actual: usize,
    },

    /// A document token id falls outside the vocabulary range.
    #[error("token id {token} outside vocabulary range (vocabulary size {vocab_size})")]
    InvalidToken {
        /// The offending token id.
        token: usize,
        /// Size of the model vocabulary.
        vocab_size: usize,
    },

    /// A hyperparameter or argument violates a model invariant.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A numerical operation failed, signalling corrupted or degenerate
    /// model parameters (e.g. a singular Cholesky factor).
    #[error("numerical error: {0}")]
    NumericalError(String),

    /// Filesystem failure, with the path that triggered it.
    #[error("io error on {path}: {source}")]
    Io {
        /// Path of the file or directory being accessed.
        path: PathBuf,
        /// Underlying io error (`NotFound` for missing model files).
        #[source]
        source: std::io::Error,
    },

    /// Malformed hyperparameter record.
    #[error("malformed params record: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed binary array store.
    #[error("malformed array store: {0}")]
    Bincode(#[from] bincode::Error),

    /// A numeric field in a text-format model file failed to parse.
    #[error("parse error in {path}: {message}")]
    Parse {
        /// File containing the malformed field.
        path: PathBuf,
        /// What failed to parse.
        message: String,
    },
}

impl Error {
    pub(crate) fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
