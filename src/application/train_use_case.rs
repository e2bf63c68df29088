// ============================================================
// Layer 2: TrainUseCase
// ============================================================
// Orchestrates one training pass:
//
//   Step 1: Load the packed dataset       (Layer 4 - data)
//   Step 2: Prepare artifact outputs      (Layer 6 - infra)
//   Step 3: Save config for generation    (Layer 6 - infra)
//   Step 4: Run the training pass         (Layer 5 - ml)
//
// Reference: Burn Book §5 (Training)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::data::dataset::PackedDataset;
use crate::infra::{checkpoint::CheckpointManager, metrics::MetricsLogger};
use crate::ml::model::GptConfig;
use crate::ml::trainer::{run_training, TrainSummary};

// ─── Precision ────────────────────────────────────────────────────────────────
/// Numeric mode of the forward and backward passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    /// f32 throughout, no loss scaling
    Full,
    /// f16 forward and backward, f32 weights, dynamic loss scaling
    Reduced,
}

// ─── Training Configuration ──────────────────────────────────────────────────
// Saved as train_config.json before training so `generate` can
// rebuild exactly the same architecture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub dataset_path:  String,
    pub artifacts_dir: String,

    // model
    pub vocab_size:    usize,
    pub max_seq_len:   usize,
    pub d_model:       usize,
    pub num_heads:     usize,
    pub num_layers:    usize,
    pub d_ff:          usize,
    pub dropout:       f64,

    // optimisation
    pub batch_size:    usize,
    pub accumulation:  usize,
    pub lr:            f64,
    pub warmup_steps:  usize,
    pub grad_clip:     f64,
    pub max_steps:     Option<usize>,
    pub precision:     Precision,
    pub seed:          u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            dataset_path:  "artifacts/dataset.bin".to_string(),
            artifacts_dir: "artifacts".to_string(),
            vocab_size:    10_000,
            max_seq_len:   256,
            d_model:       512,
            num_heads:     16,
            num_layers:    8,
            d_ff:          2048,
            dropout:       0.1,
            batch_size:    16,
            accumulation:  4,
            lr:            5e-4,
            warmup_steps:  300,
            grad_clip:     1.0,
            max_steps:     None,
            precision:     Precision::Reduced,
            seed:          0,
        }
    }
}

impl TrainConfig {
    pub fn model_config(&self) -> GptConfig {
        GptConfig::new(
            self.vocab_size, self.max_seq_len, self.d_model,
            self.num_heads, self.num_layers, self.d_ff,
        )
        .with_dropout(self.dropout)
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<TrainSummary> {
        let cfg = &self.config;

        // ── Step 1: Load the packed dataset ───────────────────────────────────
        let dataset = PackedDataset::load(Path::new(&cfg.dataset_path))
            .with_context(|| format!("Cannot load dataset '{}'", cfg.dataset_path))?;

        // ── Step 2: Artifact outputs ──────────────────────────────────────────
        let ckpt_manager = CheckpointManager::new(&cfg.artifacts_dir)?;
        let metrics      = MetricsLogger::create(ckpt_manager.dir())?;

        // ── Step 3: Save config for generation ────────────────────────────────
        ckpt_manager.save_config(cfg)?;

        // ── Step 4: Run the training pass (Layer 5) ───────────────────────────
        run_training(cfg, &dataset, ckpt_manager, metrics)
    }
}
