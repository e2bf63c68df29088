// ============================================================
// Layer 4: Data Pipeline
// ============================================================
// Everything from the raw corpus file to device-ready batches.
//
//   data.txt
//       │
//       ▼
//   CorpusLoader   → reads lines, strips separators
//       │
//       ▼
//   Packer         → encode + eos per line, window, label shift
//       │
//       ▼
//   shuffle_rows   → seeded row permutation
//       │
//       ▼
//   PackedDataset  → [rows, L+1] ids, persisted with bincode
//       │
//       ▼
//   TokenBatcher   → inputs / targets tensors on the device
//
// Each module is responsible for exactly one step.

/// Reads the corpus text file line by line
pub mod corpus;

/// Tokenization, windowing and label shift
pub mod packer;

/// Seeded row shuffle
pub mod shuffle;

/// The packed, persisted training matrix
pub mod dataset;

/// Implements burn's Batcher trait for packed rows
pub mod batcher;
