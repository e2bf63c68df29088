// ============================================================
// Layer 2: GenerateUseCase
// ============================================================
// Loads the trained tokenizer and model from the artifact
// directory, encodes the prompt and runs the generation driver
// with a nucleus sampler.

use anyhow::Result;
use burn::backend::{wgpu::WgpuDevice, Wgpu};
use serde::{Deserialize, Serialize};

use crate::domain::traits::TextTokenizer;
use crate::infra::{checkpoint::CheckpointManager, tokenizer_store::TokenizerStore};
use crate::ml::{generator::Generator, sampler::NucleusSampler};

type InferBackend = Wgpu;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateConfig {
    pub artifacts_dir:     String,
    pub prompt:            String,
    pub max_new_tokens:    usize,
    pub top_p:             f32,
    pub frequency_penalty: f32,
    pub seed:              u64,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            artifacts_dir:     "artifacts".to_string(),
            prompt:            "The Godfather is a film about".to_string(),
            max_new_tokens:    100,
            top_p:             0.9,
            frequency_penalty: 1.2,
            seed:              0,
        }
    }
}

/// The generated ids and their decoded text.
#[derive(Debug, Clone)]
pub struct GenerateOutput {
    pub ids:            Vec<u32>,
    pub text:           String,
    pub stopped_at_eos: bool,
}

pub struct GenerateUseCase {
    config: GenerateConfig,
}

impl GenerateUseCase {
    pub fn new(config: GenerateConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<GenerateOutput> {
        let cfg = &self.config;

        let tokenizer    = TokenizerStore::new(&cfg.artifacts_dir).load()?;
        let ckpt_manager = CheckpointManager::new(&cfg.artifacts_dir)?;

        let device    = WgpuDevice::default();
        let generator = Generator::<InferBackend, _>::from_checkpoint(&ckpt_manager, device)?;

        let prompt = tokenizer.encode(&cfg.prompt)?;
        tracing::info!("Prompt '{}' → {} tokens", cfg.prompt, prompt.len());

        let mut sampler = NucleusSampler::new(cfg.top_p, cfg.frequency_penalty, cfg.seed);
        let generation  = generator.generate(&prompt, cfg.max_new_tokens, tokenizer.eos_id(), &mut sampler)?;

        let text = tokenizer.decode(&generation.ids)?;
        Ok(GenerateOutput {
            ids:            generation.ids,
            text,
            stopped_at_eos: generation.stopped_at_eos,
        })
    }
}
