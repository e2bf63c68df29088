// ============================================================
// Layer 5: Forward Precision
// ============================================================
// Produces the loss and the scaled gradients for one batch. The
// master weights, the accumulated gradients and the AdamW moments
// always stay on the master backend (f32); only the forward and
// backward pass may run in half precision.
//
//   FullForward   forward + backward on the master model itself
//   HalfForward   copy master weights into an f16 model,
//                 forward + backward there on loss × scale,
//                 widen every gradient to the master backend
//                 under the master parameter's id
//
// The copy is refreshed from the master on every call, so it
// always sees the weights of the latest applied update.

use anyhow::{anyhow, Result};
use burn::{
    module::{AutodiffModule, ModuleVisitor, ParamId},
    nn::loss::CrossEntropyLossConfig,
    optim::GradientsParams,
    prelude::*,
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
    tensor::backend::AutodiffBackend,
};
use std::marker::PhantomData;

use crate::data::batcher::TokenBatch;
use crate::ml::model::CausalLm;

/// Source of (loss, gradients) for a training step.
///
/// The returned gradients are keyed by `model`'s parameter ids and live
/// on `B::InnerBackend`, still multiplied by `loss_scale`.
pub trait ForwardPass<B: AutodiffBackend, M: AutodiffModule<B> + CausalLm<B>> {
    fn loss_and_grads(
        &mut self,
        model:      &M,
        batch:      TokenBatch<B>,
        loss_scale: f64,
    ) -> Result<(f64, GradientsParams)>;
}

/// Mean cross-entropy over every position of the batch.
pub fn token_cross_entropy<B: Backend, M: CausalLm<B>>(
    model:   &M,
    inputs:  Tensor<B, 2, Int>,
    targets: Tensor<B, 2, Int>,
) -> Tensor<B, 1> {
    let logits = model.forward(inputs);
    let [batch_size, seq_len, vocab] = logits.dims();
    CrossEntropyLossConfig::new()
        .init(&logits.device())
        .forward(
            logits.reshape([batch_size * seq_len, vocab]),
            targets.reshape([batch_size * seq_len]),
        )
}

fn backward_scaled<B: AutodiffBackend, M: AutodiffModule<B>>(
    model:      &M,
    loss:       Tensor<B, 1>,
    loss_scale: f64,
) -> (f64, GradientsParams) {
    let loss_value = loss.clone().into_scalar().elem::<f64>();
    let scaled = if loss_scale != 1.0 { loss.mul_scalar(loss_scale) } else { loss };
    (loss_value, GradientsParams::from_grads(scaled.backward(), model))
}

// ─── FullForward ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, Default)]
pub struct FullForward;

impl<B, M> ForwardPass<B, M> for FullForward
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + CausalLm<B>,
{
    fn loss_and_grads(&mut self, model: &M, batch: TokenBatch<B>, loss_scale: f64) -> Result<(f64, GradientsParams)> {
        let loss = token_cross_entropy(model, batch.inputs, batch.targets);
        Ok(backward_scaled(model, loss, loss_scale))
    }
}

// ─── HalfForward ──────────────────────────────────────────────────────────────
pub struct HalfForward<H: AutodiffBackend, MH> {
    copy:     MH,
    device:   H::Device,
    recorder: BinBytesRecorder<FullPrecisionSettings>,
}

impl<H: AutodiffBackend, MH: AutodiffModule<H>> HalfForward<H, MH> {
    /// `copy` must share the master model's architecture; its values are
    /// overwritten before every forward pass.
    pub fn new(copy: MH, device: H::Device) -> Self {
        Self { copy, device, recorder: BinBytesRecorder::default() }
    }

    fn refresh<B: AutodiffBackend, M: AutodiffModule<B>>(&mut self, model: &M) -> Result<()> {
        let bytes = <BinBytesRecorder<FullPrecisionSettings> as Recorder<B>>::record(
            &self.recorder,
            model.clone().into_record(),
            (),
        )
        .map_err(|e| anyhow!("cannot snapshot master weights: {e:?}"))?;
        let record: <MH as Module<H>>::Record = <BinBytesRecorder<FullPrecisionSettings> as Recorder<H>>::load(
            &self.recorder,
            bytes,
            &self.device,
        )
        .map_err(|e| anyhow!("cannot load master weights into the half-precision copy: {e:?}"))?;
        self.copy = self.copy.clone().load_record(record);
        Ok(())
    }
}

fn move_ids<B: Backend, H: Backend>(ids: Tensor<B, 2, Int>, device: &H::Device) -> Tensor<H, 2, Int> {
    Tensor::from_data(ids.into_data().convert::<H::IntElem>(), device)
}

impl<B, H, M, MH> ForwardPass<B, M> for HalfForward<H, MH>
where
    B:  AutodiffBackend,
    H:  AutodiffBackend,
    M:  AutodiffModule<B> + CausalLm<B>,
    MH: AutodiffModule<H> + CausalLm<H>,
{
    fn loss_and_grads(&mut self, model: &M, batch: TokenBatch<B>, loss_scale: f64) -> Result<(f64, GradientsParams)> {
        self.refresh::<B, M>(model)?;

        let inputs  = move_ids::<B, H>(batch.inputs, &self.device);
        let targets = move_ids::<B, H>(batch.targets, &self.device);
        let loss    = token_cross_entropy(&self.copy, inputs, targets);
        let (loss_value, mut half_grads) = backward_scaled(&self.copy, loss, loss_scale);

        let mut widen = Widen::<H> { half: &mut half_grads, full: GradientsParams::new(), _half: PhantomData };
        model.visit(&mut widen);
        Ok((loss_value, widen.full))
    }
}

/// Moves each half-precision gradient onto the master backend as f32.
struct Widen<'a, H: AutodiffBackend> {
    half:  &'a mut GradientsParams,
    full:  GradientsParams,
    _half: PhantomData<H>,
}

impl<'a, B: AutodiffBackend, H: AutodiffBackend> ModuleVisitor<B> for Widen<'a, H> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, tensor: &Tensor<B, D>) {
        if let Some(grad) = self.half.remove::<H::InnerBackend, D>(id.clone()) {
            let data = grad.into_data().convert::<f32>();
            let wide = Tensor::<B::InnerBackend, D>::from_data(data, &tensor.device());
            self.full.register::<B::InnerBackend, D>(id, wide);
        }
    }
}
