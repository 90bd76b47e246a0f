use oversketch_structs::core::{BlockIndex, Phase};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("Block {index} of matrix '{matrix}' not found")]
    BlockNotFound { matrix: String, index: BlockIndex },
    #[error("Matrix '{0}' does not exist")]
    MatrixNotFound(String),
    #[error("Block {index} of matrix '{matrix}' has shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        matrix: String,
        index: BlockIndex,
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[error("Failed to read block {index} of matrix '{matrix}': {reason}")]
    Read {
        matrix: String,
        index: BlockIndex,
        reason: String,
    },
    #[error("Failed to write block {index} of matrix '{matrix}': {reason}")]
    Write {
        matrix: String,
        index: BlockIndex,
        reason: String,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::BlockNotFound { .. })
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OverSketchError {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),
    #[error(
        "No partial contribution could be read for output block {index} ({absent} absent, {failed} failed)"
    )]
    TotalMiss {
        index: BlockIndex,
        absent: usize,
        failed: usize,
    },
    #[error("Phase '{phase}' failed: {reason}")]
    PhaseFailed { phase: Phase, reason: String },
    #[error(
        "Phase '{phase}' timed out after {elapsed_ms}ms with {resolved} of {required} required tasks resolved"
    )]
    PhaseTimedOut {
        phase: Phase,
        elapsed_ms: u64,
        resolved: usize,
        required: usize,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type OverSketchResult<T> = std::result::Result<T, OverSketchError>;
