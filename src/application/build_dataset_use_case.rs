// ============================================================
// Layer 2: BuildDatasetUseCase
// ============================================================
// Orchestrates dataset construction in order:
//
//   Step 1: Train or load the tokenizer    (Layer 6 - infra)
//   Step 2: Read corpus lines              (Layer 4 - data)
//   Step 3: Tokenize, window, label-shift  (Layer 4 - data)
//   Step 4: Shuffle rows                   (Layer 4 - data)
//   Step 5: Persist the packed dataset     (Layer 4 - data)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::data::{corpus::CorpusLoader, dataset::PackedDataset, packer::Packer, shuffle::shuffle_rows};
use crate::domain::traits::{CorpusSource, TextTokenizer};
use crate::infra::tokenizer_store::TokenizerStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    pub corpus_path:   String,
    pub artifacts_dir: String,
    pub output_path:   String,
    pub window:        usize,
    pub vocab_size:    usize,
    pub seed:          u64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            corpus_path:   "data.txt".to_string(),
            artifacts_dir: "artifacts".to_string(),
            output_path:   "artifacts/dataset.bin".to_string(),
            window:        256,
            vocab_size:    10_000,
            seed:          0,
        }
    }
}

pub struct BuildDatasetUseCase {
    config: BuildConfig,
}

impl BuildDatasetUseCase {
    pub fn new(config: BuildConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<PackedDataset> {
        let cfg    = &self.config;
        let corpus = Path::new(&cfg.corpus_path);

        // ── Step 1: Tokenizer ─────────────────────────────────────────────────
        let tokenizer = TokenizerStore::new(&cfg.artifacts_dir)
            .load_or_train(corpus, cfg.vocab_size)?;
        tracing::info!(
            "Tokenizer: {} tokens, end-of-text id {}",
            tokenizer.vocab_size(),
            tokenizer.eos_id()
        );

        // ── Step 2: Corpus lines ──────────────────────────────────────────────
        let lines = CorpusLoader::new(corpus).lines()?;

        // ── Steps 3-4: Pack and shuffle ───────────────────────────────────────
        let mut dataset = Packer::new(cfg.window).pack(&lines, &tokenizer)?;
        shuffle_rows(&mut dataset, cfg.seed);

        // ── Step 5: Persist ───────────────────────────────────────────────────
        dataset
            .save(Path::new(&cfg.output_path))
            .with_context(|| format!("Cannot write dataset '{}'", cfg.output_path))?;

        Ok(dataset)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::PipelineError;
    use tempfile::tempdir;

    fn config(dir: &Path, window: usize) -> BuildConfig {
        BuildConfig {
            corpus_path:   dir.join("data.txt").to_string_lossy().into_owned(),
            artifacts_dir: dir.join("artifacts").to_string_lossy().into_owned(),
            output_path:   dir.join("artifacts/dataset.bin").to_string_lossy().into_owned(),
            window,
            vocab_size:    300,
            seed:          5,
        }
    }

    #[test]
    fn test_builds_and_persists_dataset() {
        let dir = tempdir().unwrap();
        let text = "Wikipedia paragraph about films and directors.\n".repeat(60);
        std::fs::write(dir.path().join("data.txt"), text).unwrap();

        let cfg = config(dir.path(), 16);
        let built = BuildDatasetUseCase::new(cfg.clone()).execute().unwrap();

        assert!(built.rows() > 0);
        assert_eq!(built.width(), 17);
        assert_eq!(PackedDataset::load(Path::new(&cfg.output_path)).unwrap(), built);
        assert!(dir.path().join("artifacts/tokenizer.json").exists());

        // same corpus, same seed, same file
        let again = BuildDatasetUseCase::new(cfg).execute().unwrap();
        assert_eq!(again, built);
    }

    #[test]
    fn test_corpus_shorter_than_window_is_shape_error() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("data.txt"), "tiny\n".repeat(5)).unwrap();

        let err = BuildDatasetUseCase::new(config(dir.path(), 4096)).execute().unwrap_err();
        assert!(err.downcast_ref::<PipelineError>().unwrap().is_shape());
    }
}
