// ============================================================
// Layer 5: Training Context
// ============================================================
// All mutable training state in one value, owned by the caller
// of the loop and advanced one batch at a time with `step`.
//
// One step:
//   1. lr = schedule(step)
//   2. forward pass (full or half precision), cross-entropy over
//      every position
//   3. backward on loss × scale, grads added to the accumulator
//      on the master backend
//   4. if (step + 1) % accumulation == 0, run one update:
//        unscale → global norm → overflow? skip : clip → AdamW step
//   5. step += 1, tokens += B·L, loss recorded in the history
//
// Gradients are summed across the accumulation window, not
// averaged. Clipping happens at most once per window, right
// before the optimizer step, on unscaled gradients.

use std::marker::PhantomData;

use anyhow::Result;
use burn::{
    module::AutodiffModule,
    optim::{GradientsAccumulator, Optimizer},
    tensor::backend::AutodiffBackend,
};

use crate::data::batcher::TokenBatch;
use crate::domain::loss_history::LossHistory;
use crate::ml::{
    grads::{clip_factor, scale_grads, unscale_and_norm},
    loss_scale::LossScaler,
    model::CausalLm,
    precision::{ForwardPass, FullForward},
    schedule::WarmupCosine,
};

/// Result of the optimizer update at an accumulation boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpdateOutcome {
    Applied { grad_norm: f64, clipped: bool },
    /// Non-finite gradients under loss scaling; parameters untouched.
    Skipped { grad_norm: f64 },
}

/// Everything the bookkeeping hook needs to know about one step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    /// Steps completed so far, including this one (1-based).
    pub step:          usize,
    pub tokens_seen:   usize,
    pub loss:          f64,
    pub learning_rate: f64,
    /// Scale the loss was multiplied by for this step's backward pass.
    pub loss_scale:    f64,
    /// Present only on accumulation boundaries.
    pub update:        Option<UpdateOutcome>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UpdateStats {
    pub applied: usize,
    pub skipped: usize,
    pub clipped: usize,
}

pub struct TrainingContext<B, M, O, F = FullForward>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + CausalLm<B>,
    O: Optimizer<M, B>,
    F: ForwardPass<B, M>,
{
    model:        M,
    optim:        O,
    forward:      F,
    scaler:       LossScaler,
    schedule:     WarmupCosine,
    accumulator:  GradientsAccumulator<M>,
    accumulation: usize,
    grad_clip:    f64,
    step:         usize,
    tokens_seen:  usize,
    history:      LossHistory,
    stats:        UpdateStats,
    _backend:     PhantomData<B>,
}

impl<B, M, O> TrainingContext<B, M, O, FullForward>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + CausalLm<B>,
    O: Optimizer<M, B>,
{
    /// Context whose forward pass runs on the master model itself.
    pub fn new(
        model:        M,
        optim:        O,
        scaler:       LossScaler,
        schedule:     WarmupCosine,
        accumulation: usize,
        grad_clip:    f64,
    ) -> Self {
        Self::with_forward(FullForward, model, optim, scaler, schedule, accumulation, grad_clip)
    }
}

impl<B, M, O, F> TrainingContext<B, M, O, F>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + CausalLm<B>,
    O: Optimizer<M, B>,
    F: ForwardPass<B, M>,
{
    pub fn with_forward(
        forward:      F,
        model:        M,
        optim:        O,
        scaler:       LossScaler,
        schedule:     WarmupCosine,
        accumulation: usize,
        grad_clip:    f64,
    ) -> Self {
        Self {
            model,
            optim,
            forward,
            scaler,
            schedule,
            accumulator:  GradientsAccumulator::new(),
            accumulation: accumulation.max(1),
            grad_clip,
            step:         0,
            tokens_seen:  0,
            history:      LossHistory::new(),
            stats:        UpdateStats::default(),
            _backend:     PhantomData,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn step_count(&self) -> usize {
        self.step
    }

    pub fn tokens_seen(&self) -> usize {
        self.tokens_seen
    }

    pub fn history(&self) -> &LossHistory {
        &self.history
    }

    pub fn stats(&self) -> UpdateStats {
        self.stats
    }

    pub fn loss_scale(&self) -> f64 {
        self.scaler.scale()
    }

    /// Run one training step on `batch`.
    pub fn step(&mut self, batch: TokenBatch<B>) -> Result<StepReport> {
        let lr         = self.schedule.lr_at(self.step);
        let loss_scale = self.scaler.scale();
        let num_tokens = batch.num_tokens();

        let (loss_value, grads) = self.forward.loss_and_grads(&self.model, batch, loss_scale)?;
        if !loss_value.is_finite() && !self.scaler.is_enabled() {
            tracing::warn!("Step {}: non-finite loss {} in full precision", self.step, loss_value);
        }
        self.accumulator.accumulate(&self.model, grads);

        let update = if (self.step + 1) % self.accumulation == 0 {
            Some(self.apply_update(lr))
        } else {
            None
        };

        self.step        += 1;
        self.tokens_seen += num_tokens;
        self.history.record(self.tokens_seen, loss_value);

        tracing::debug!(
            "step={} tokens={} loss={:.4} lr={:.3e} scale={}",
            self.step, self.tokens_seen, loss_value, lr, loss_scale
        );

        Ok(StepReport {
            step:          self.step,
            tokens_seen:   self.tokens_seen,
            loss:          loss_value,
            learning_rate: lr,
            loss_scale,
            update,
        })
    }

    fn apply_update(&mut self, lr: f64) -> UpdateOutcome {
        let mut grads = self.accumulator.grads();
        let grad_norm = unscale_and_norm::<B, M>(&self.model, &mut grads, self.scaler.scale());

        if self.scaler.is_enabled() && !grad_norm.is_finite() {
            self.scaler.update(true);
            self.stats.skipped += 1;
            tracing::warn!(
                "Step {}: non-finite gradients, update skipped, loss scale now {}",
                self.step,
                self.scaler.scale()
            );
            return UpdateOutcome::Skipped { grad_norm };
        }

        let clipped = match clip_factor(grad_norm, self.grad_clip) {
            Some(factor) => {
                scale_grads::<B, M>(&self.model, &mut grads, factor);
                self.stats.clipped += 1;
                true
            }
            None => false,
        };

        self.model = self.optim.step(lr, self.model.clone(), grads);
        self.scaler.update(false);
        self.stats.applied += 1;

        UpdateOutcome::Applied { grad_norm, clipped }
    }
}
