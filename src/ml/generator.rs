// ============================================================
// Layer 5: Generation Driver
// ============================================================
// Extends a prompt one token at a time.
//
//   loop, at most N times:
//     scores = model(whole sequence so far)[last position]
//     id     = sampler.select(scores, sequence)
//     sequence.push(id)
//     stop if id is the end-of-text id
//
// There is no key/value cache: every step re-runs the full prefix,
// so the cost grows quadratically with the sequence length.
use anyhow::{anyhow, Result};
use burn::prelude::*;
use std::marker::PhantomData;

use crate::domain::error::PipelineError;
use crate::domain::traits::TokenSampler;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::{CausalLm, GptModel};

/// The prompt plus everything appended to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub ids:            Vec<u32>,
    pub prompt_len:     usize,
    pub stopped_at_eos: bool,
}

impl Generation {
    pub fn generated(&self) -> &[u32] {
        &self.ids[self.prompt_len..]
    }
}

pub struct Generator<B: Backend, M: CausalLm<B>> {
    model:    M,
    device:   B::Device,
    _backend: PhantomData<B>,
}

impl<B: Backend> Generator<B, GptModel<B>> {
    /// Rebuild the trained architecture from train_config.json and load its weights.
    pub fn from_checkpoint(ckpt: &CheckpointManager, device: B::Device) -> Result<Self> {
        let cfg   = ckpt.load_config()?;
        let model = cfg.model_config().with_dropout(0.0).init::<B>(&device);
        let model = ckpt.load_model(model, &device)?;
        tracing::info!(
            "Model loaded: {} layers, d_model={}, {} parameters",
            cfg.num_layers, cfg.d_model, model.num_params()
        );
        Ok(Self::new(model, device))
    }
}

impl<B: Backend, M: CausalLm<B>> Generator<B, M> {
    pub fn new(model: M, device: B::Device) -> Self {
        Self { model, device, _backend: PhantomData }
    }

    /// Append up to `max_new_tokens` ids to `prompt`, stopping early at `eos_id`.
    pub fn generate<S: TokenSampler>(
        &self,
        prompt:         &[u32],
        max_new_tokens: usize,
        eos_id:         u32,
        sampler:        &mut S,
    ) -> Result<Generation> {
        if prompt.is_empty() {
            return Err(PipelineError::shape("prompt encodes to zero tokens").into());
        }
        let limit = self.model.max_seq_len();
        if prompt.len() + max_new_tokens > limit {
            return Err(PipelineError::shape(format!(
                "prompt of {} tokens plus up to {} new tokens could exceed the model's max_seq_len of {} \
                 (the limit assumes no end-of-text stop)",
                prompt.len(),
                max_new_tokens,
                limit
            ))
            .into());
        }

        let mut ids = prompt.to_vec();
        let mut stopped_at_eos = false;

        for _ in 0..max_new_tokens {
            let scores = self.last_scores(&ids)?;
            let next   = sampler.select(&scores, &ids)?;
            ids.push(next);
            if next == eos_id {
                stopped_at_eos = true;
                break;
            }
        }

        tracing::debug!(
            "Generated {} tokens (eos: {})",
            ids.len() - prompt.len(),
            stopped_at_eos
        );
        Ok(Generation { ids, prompt_len: prompt.len(), stopped_at_eos })
    }

    /// Scores for the token following `ids`, one per vocabulary entry.
    fn last_scores(&self, ids: &[u32]) -> Result<Vec<f32>> {
        let seq_len = ids.len();
        let flat: Vec<i32> = ids.iter().map(|&x| x as i32).collect();
        let input = Tensor::<B, 1, Int>::from_ints(flat.as_slice(), &self.device)
            .reshape([1, seq_len]);

        let scores = self.model.forward(input);
        let [_, _, vocab] = scores.dims();
        scores
            .slice([0..1, seq_len - 1..seq_len, 0..vocab])
            .reshape([vocab])
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| anyhow!("cannot read scores: {e:?}"))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::sampler::NucleusSampler;
    use crate::ml::testing::{bigram_on, BigramLm, TestBackend};

    /// Returns a fixed script of ids and records the history length it saw.
    struct Scripted {
        script: Vec<u32>,
        seen:   Vec<usize>,
    }

    impl TokenSampler for Scripted {
        fn select(&mut self, scores: &[f32], history: &[u32]) -> Result<u32> {
            assert_eq!(scores.len(), 16);
            self.seen.push(history.len());
            Ok(self.script[self.seen.len() - 1])
        }
    }

    fn generator(vocab: usize, max_seq_len: usize) -> Generator<TestBackend, BigramLm<TestBackend>> {
        let device = Default::default();
        let mut model = bigram_on::<TestBackend>(vocab, &device);
        model.max_seq_len = max_seq_len;
        Generator::new(model, device)
    }

    #[test]
    fn test_history_grows_by_one_and_stops_at_eos() {
        let gen = generator(16, 64);
        let mut sampler = Scripted { script: vec![4, 5, 0, 9], seen: Vec::new() };
        let out = gen.generate(&[1, 2, 3], 10, 0, &mut sampler).unwrap();

        assert_eq!(sampler.seen, vec![3, 4, 5]);
        assert_eq!(out.ids, vec![1, 2, 3, 4, 5, 0]);
        assert_eq!(out.generated(), &[4, 5, 0]);
        assert!(out.stopped_at_eos);
    }

    #[test]
    fn test_budget_is_exact_without_eos() {
        let gen = generator(16, 64);
        let mut sampler = Scripted { script: vec![7; 5], seen: Vec::new() };
        let out = gen.generate(&[1], 5, 0, &mut sampler).unwrap();
        assert_eq!(out.generated().len(), 5);
        assert!(!out.stopped_at_eos);
    }

    #[test]
    fn test_godfather_prompt_terminates() {
        // one id per byte, 256 = end of text
        let prompt: Vec<u32> = "The Godfather is a film about".bytes().map(u32::from).collect();
        let gen = generator(257, 256);
        let mut sampler = NucleusSampler::new(0.9, 1.2, 0);

        let out = gen.generate(&prompt, 100, 256, &mut sampler).unwrap();
        let generated = out.generated();
        assert_eq!(&out.ids[..prompt.len()], prompt.as_slice());
        if out.stopped_at_eos {
            assert_eq!(generated.last(), Some(&256));
            assert!(generated.len() <= 100);
            assert!(!generated[..generated.len() - 1].contains(&256));
        } else {
            assert_eq!(generated.len(), 100);
        }
    }

    #[test]
    fn test_shape_errors_before_any_forward() {
        let gen = generator(16, 8);
        let mut sampler = Scripted { script: vec![], seen: Vec::new() };

        let err = gen.generate(&[], 3, 0, &mut sampler).unwrap_err();
        assert!(err.downcast_ref::<PipelineError>().unwrap().is_shape());

        let err = gen.generate(&[1, 2, 3, 4, 5, 6], 3, 0, &mut sampler).unwrap_err();
        assert!(err.downcast_ref::<PipelineError>().unwrap().is_shape());
        assert!(err.to_string().contains("no end-of-text stop"), "{err}");
        assert!(sampler.seen.is_empty());
    }
}
