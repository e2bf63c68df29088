// ============================================================
// Layer 6: Tokenizer Store
// ============================================================
// Trains, saves and loads the byte-level BPE tokenizer.
//
// Training builds a concretely-typed TokenizerImpl<BPE, ...> so that
// train_from_files sees a BpeTrainer whose Model is exactly BPE.
// The result is written as tokenizer.json and reloaded through the
// generic `Tokenizer` type, which is what every later run uses.
//
// Settings:
//   - byte-level pre-tokenizer, no prefix space ("Ġ" marks spaces)
//   - alphabet limited to 500 initial symbols
//   - "<|endoftext|>" registered as a special token, so it is never
//     split by BPE merges and always maps to a single id
//
// Reference: Sennrich et al. (2016) BPE paper

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokenizers::{
    models::bpe::{BpeTrainerBuilder, BPE},
    normalizers::NormalizerWrapper,
    pre_tokenizers::byte_level::ByteLevel,
    AddedToken, Tokenizer, TokenizerBuilder,
};

use crate::domain::error::PipelineError;
use crate::domain::traits::TextTokenizer;

pub const EOS_TOKEN: &str = "<|endoftext|>";
const ALPHABET_LIMIT: usize = 500;

// ─── HfTokenizer ──────────────────────────────────────────────────────────────
/// A loaded tokenizer plus its end-of-text id.
pub struct HfTokenizer {
    inner:  Tokenizer,
    eos_id: u32,
}

impl HfTokenizer {
    pub fn from_file(path: &Path) -> Result<Self> {
        let inner = Tokenizer::from_file(path).map_err(|e| {
            PipelineError::Tokenizer(format!("cannot load '{}': {e}", path.display()))
        })?;
        Self::new(inner)
    }

    pub fn new(inner: Tokenizer) -> Result<Self> {
        let eos_id = inner
            .token_to_id(EOS_TOKEN)
            .ok_or_else(|| PipelineError::Tokenizer(format!("vocabulary has no '{EOS_TOKEN}' token")))?;
        Ok(Self { inner, eos_id })
    }
}

impl TextTokenizer for HfTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let enc = self
            .inner
            .encode(text, false)
            .map_err(|e| PipelineError::Tokenizer(format!("encode: {e}")))?;
        Ok(enc.get_ids().to_vec())
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        let text = self
            .inner
            .decode(ids, false)
            .map_err(|e| PipelineError::Tokenizer(format!("decode: {e}")))?;
        Ok(text)
    }

    fn eos_id(&self) -> u32 {
        self.eos_id
    }

    fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(true)
    }
}

// ─── TokenizerStore ───────────────────────────────────────────────────────────
pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join("tokenizer.json")
    }

    /// Load the saved tokenizer, or train one on `corpus` when none exists.
    pub fn load_or_train(&self, corpus: &Path, vocab_size: usize) -> Result<HfTokenizer> {
        if self.path().exists() {
            tracing::info!("Loading existing tokenizer from '{}'", self.path().display());
            self.load()
        } else {
            tracing::info!("Training new tokenizer (vocab_size={})", vocab_size);
            self.train_and_save(corpus, vocab_size)
        }
    }

    pub fn load(&self) -> Result<HfTokenizer> {
        HfTokenizer::from_file(&self.path())
    }

    fn train_and_save(&self, corpus: &Path, vocab_size: usize) -> Result<HfTokenizer> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;
        if !corpus.exists() {
            return Err(PipelineError::io(
                corpus,
                std::io::Error::new(std::io::ErrorKind::NotFound, "corpus file not found"),
            )
            .into());
        }

        let mut trainer = BpeTrainerBuilder::new()
            .show_progress(false)
            .vocab_size(vocab_size)
            .min_frequency(0)
            .limit_alphabet(ALPHABET_LIMIT)
            .initial_alphabet(ByteLevel::alphabet())
            .special_tokens(vec![AddedToken::from(EOS_TOKEN, true)])
            .build();

        let mut tokenizer = TokenizerBuilder::<BPE, NormalizerWrapper, ByteLevel, ByteLevel, ByteLevel>::new()
            .with_model(BPE::default())
            .with_normalizer(None)
            .with_pre_tokenizer(Some(ByteLevel::default().add_prefix_space(false)))
            .with_post_processor(Some(ByteLevel::default().trim_offsets(false)))
            .with_decoder(Some(ByteLevel::default()))
            .build()
            .map_err(|e| PipelineError::Tokenizer(format!("build: {e}")))?;

        let files = vec![corpus.to_string_lossy().into_owned()];
        tokenizer
            .train_from_files(&mut trainer, files)
            .map_err(|e| PipelineError::Tokenizer(format!("train: {e}")))?;

        let path = self.path();
        tokenizer
            .save(&path, false)
            .map_err(|e| PipelineError::Tokenizer(format!("save '{}': {e}", path.display())))?;

        let loaded = self.load()?;
        tracing::info!(
            "Tokenizer trained with {} tokens, saved to '{}'",
            loaded.vocab_size(),
            path.display()
        );
        Ok(loaded)
    }
}
