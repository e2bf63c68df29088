// ============================================================
// Layer 6: Infrastructure Layer
// ============================================================
// Persistence and diagnostics used by more than one other layer:
//
//   checkpoint.rs      - Parameter snapshot (CompactRecorder),
//                        latest step pointer and the saved
//                        TrainConfig that generation rebuilds from.
//
//   tokenizer_store.rs - Trains the byte-level BPE tokenizer on the
//                        corpus once, then reloads tokenizer.json so
//                        dataset building, training and generation
//                        all share one vocabulary.
//
//   metrics.rs         - Per-step CSV (loss, lr, loss scale, update).
//
//   plot.rs            - Raw and smoothed loss curve as a PNG.

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Tokenizer training, saving, and loading
pub mod tokenizer_store;

/// Per-step training metrics CSV logger
pub mod metrics;

/// Loss curve rendering
pub mod plot;
