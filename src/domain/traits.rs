// ============================================================
// Layer 3: Core Traits (Abstractions)
// ============================================================
// The collaborators the core algorithms talk to, expressed as
// plain traits so that the dataset builder and the generation
// driver never see a concrete tokenizer or sampling algorithm.
//
//   CorpusSource  - anything that yields the corpus line by line
//                   (CorpusLoader reads a text file)
//   TextTokenizer - text <-> id sequence, plus the end-of-text id
//                   (HfTokenizer wraps a byte-level BPE tokenizer)
//   TokenSampler  - last-position scores + history -> one next id
//                   (NucleusSampler in ml::sampler)
//
// The model contract lives in ml::model::CausalLm because it is
// expressed in burn tensor types, which this layer never imports.

use anyhow::Result;

// ─── CorpusSource ─────────────────────────────────────────────────────────────
/// Any component that can produce the raw corpus as lines.
///
/// Implementations:
///   - CorpusLoader → one line per line of a UTF-8 text file
pub trait CorpusSource {
    /// Return every line, in file order, with line separators removed.
    fn lines(&self) -> Result<Vec<String>>;
}

// ─── TextTokenizer ────────────────────────────────────────────────────────────
/// Converts between text and integer token ids.
///
/// The same `eos_id()` is used to terminate every corpus line when
/// packing the dataset and to stop generation, so training and
/// generation must share one tokenizer instance on disk.
pub trait TextTokenizer {
    /// Encode text without adding any extra special tokens.
    fn encode(&self, text: &str) -> Result<Vec<u32>>;

    /// Decode ids back into text. Special tokens are kept.
    fn decode(&self, ids: &[u32]) -> Result<String>;

    /// The id of the end-of-text marker.
    fn eos_id(&self) -> u32;

    /// Number of distinct ids the tokenizer can emit.
    fn vocab_size(&self) -> usize;
}

// ─── TokenSampler ─────────────────────────────────────────────────────────────
/// Picks the next token id from the model's last-position scores.
///
/// The generation driver treats implementations as opaque: it only
/// guarantees that `scores.len()` equals the model vocabulary and that
/// `history` is the full sequence produced so far (prompt included).
pub trait TokenSampler {
    fn select(&mut self, scores: &[f32], history: &[u32]) -> Result<u32>;
}
