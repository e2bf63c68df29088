// ============================================================
// Layer 3: Domain Layer
// ============================================================
// Plain Rust types and traits that describe WHAT the pipeline
// works with, independent of burn or the tokenizer backend.
//
// Rules for this layer:
//   - NO burn types
//   - NO file I/O
//   - Only structs, enums and traits
//
// Everything here can be unit tested without a GPU.

// Typed failure kinds (IO, Shape, Tokenizer, Encoding)
pub mod error;

// Per-step loss record and moving-average smoothing
pub mod loss_history;

// Tokenizer, sampler and corpus contracts
pub mod traits;
