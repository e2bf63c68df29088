// ============================================================
// Layer 3: Pipeline Error Kinds
// ============================================================
// The typed failure kinds shared by the dataset builder, the
// training orchestrator and the generation driver.
//
//   Io        - corpus, dataset or checkpoint file missing/unreadable
//   Shape     - corpus shorter than one window, batch or window size
//               that the model cannot accept, malformed dataset file
//   Tokenizer - the tokenizer backend refused to encode/decode
//   Encoding  - the dataset file could not be (de)serialised
//
// Gradient overflow under reduced precision is NOT an error kind:
// the training context recovers from it internally (see
// ml::context::UpdateOutcome::Skipped).
//
// Upper layers wrap these in anyhow::Error; tests and callers that
// care about the kind use `err.downcast_ref::<PipelineError>()`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Shape error: {0}")]
    Shape(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Dataset encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

impl PipelineError {
    /// Attach the offending path to an `std::io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub fn shape(msg: impl Into<String>) -> Self {
        Self::Shape(msg.into())
    }

    pub fn is_shape(&self) -> bool {
        matches!(self, Self::Shape(_))
    }

    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}
