// ============================================================
// Layer 5: Gradient Utilities
// ============================================================
// Walks a module's float parameters with burn's ModuleVisitor and
// rewrites the matching entries of a GradientsParams in place.
//
//   unscale_and_norm  grads ÷ loss scale, returns the global L2 norm
//   scale_grads       grads × factor (used for clipping)
//
// Gradients live on the inner (non-autodiff) backend, so every
// lookup goes through `GradientsParams::remove::<B::InnerBackend, D>`
// and is re-registered under the same id.
//
// The norm is accumulated on the host in f64, whatever the
// gradient element type. A NaN or infinite entry anywhere makes
// the returned norm non-finite, which is how the training context
// detects overflow.

use burn::{
    module::{AutodiffModule, ModuleVisitor, ParamId},
    optim::GradientsParams,
    prelude::*,
    tensor::backend::AutodiffBackend,
};

struct UnscaleAndSquare<'a> {
    grads:     &'a mut GradientsParams,
    inv_scale: f64,
    sum_sq:    f64,
}

impl<'a, B: AutodiffBackend> ModuleVisitor<B> for UnscaleAndSquare<'a> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        let Some(grad) = self.grads.remove::<B::InnerBackend, D>(id.clone()) else {
            return;
        };
        let inv_scale = self.inv_scale;
        self.sum_sq += grad
            .clone()
            .into_data()
            .iter::<f64>()
            .map(|g| (g * inv_scale).powi(2))
            .sum::<f64>();
        let grad = if inv_scale != 1.0 { grad.mul_scalar(inv_scale) } else { grad };
        self.grads.register::<B::InnerBackend, D>(id, grad);
    }
}

struct Rescale<'a> {
    grads:  &'a mut GradientsParams,
    factor: f64,
}

impl<'a, B: AutodiffBackend> ModuleVisitor<B> for Rescale<'a> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.remove::<B::InnerBackend, D>(id.clone()) {
            self.grads.register::<B::InnerBackend, D>(id, grad.mul_scalar(self.factor));
        }
    }
}

/// Divide every gradient of `model` by `scale` and return the global L2 norm.
pub fn unscale_and_norm<B, M>(model: &M, grads: &mut GradientsParams, scale: f64) -> f64
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let mut visitor = UnscaleAndSquare { grads, inv_scale: 1.0 / scale, sum_sq: 0.0 };
    model.visit(&mut visitor);
    visitor.sum_sq.sqrt()
}

/// Multiply every gradient of `model` by `factor`.
pub fn scale_grads<B, M>(model: &M, grads: &mut GradientsParams, factor: f64)
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let mut visitor = Rescale { grads, factor };
    model.visit(&mut visitor);
}

/// Factor that brings `norm` down to `max_norm`, or None when no clip is needed.
///
/// A non-positive `max_norm` disables clipping.
pub fn clip_factor(norm: f64, max_norm: f64) -> Option<f64> {
    if max_norm > 0.0 && norm > max_norm {
        Some(max_norm / (norm + 1e-6))
    } else {
        None
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::testing::{bigram, half_bigram, BigramLm, TestAutodiff};
    use approx::assert_relative_eq;

    /// Loss sum(w²) gives grads 2w, so the expected norm is known.
    fn grads_of_sum_sq(model: &BigramLm<TestAutodiff>) -> (GradientsParams, f64) {
        let weight = model.table.weight.val();
        let expected_sq = weight.clone().powf_scalar(2.0).sum().into_scalar().elem::<f64>() * 4.0;
        let loss = weight.powf_scalar(2.0).sum();
        let grads = GradientsParams::from_grads(loss.backward(), model);
        (grads, expected_sq.sqrt())
    }

    #[test]
    fn test_norm_is_global_l2_after_unscale() {
        let model = bigram(6);
        let (mut grads, norm) = grads_of_sum_sq(&model);
        let got = unscale_and_norm(&model, &mut grads, 1.0);
        assert_relative_eq!(got, norm, max_relative = 1e-4);

        // a second pass with scale 2 halves the norm
        let halved = unscale_and_norm(&model, &mut grads, 2.0);
        assert_relative_eq!(halved, norm / 2.0, max_relative = 1e-4);
    }

    #[test]
    fn test_scale_grads_multiplies_norm() {
        let model = bigram(6);
        let (mut grads, norm) = grads_of_sum_sq(&model);
        scale_grads(&model, &mut grads, 0.25);
        let got = unscale_and_norm(&model, &mut grads, 1.0);
        assert_relative_eq!(got, norm * 0.25, max_relative = 1e-4);
    }

    #[test]
    fn test_non_finite_grad_gives_non_finite_norm() {
        let model = bigram(4);
        let loss = (model.table.weight.val() * f32::INFINITY).sum();
        let mut grads = GradientsParams::from_grads(loss.backward(), &model);
        assert!(!unscale_and_norm(&model, &mut grads, 1.0).is_finite());
    }

    #[test]
    fn test_f16_norm_above_f16_range_stays_finite() {
        // four gradients of 300: the squares sum past the f16 maximum
        let model = half_bigram(2, 1.0);
        let loss = model.table.weight.val().mul_scalar(300.0).sum();
        let mut grads = GradientsParams::from_grads(loss.backward(), &model);
        let norm = unscale_and_norm(&model, &mut grads, 1.0);
        assert_relative_eq!(norm, 600.0, max_relative = 1e-3);
    }

    #[test]
    fn test_f16_tiny_gradients_give_nonzero_norm() {
        // 10 000 gradients of 1e-4: each square is below the f16 subnormal range
        let model = half_bigram(100, 1.0);
        let loss = model.table.weight.val().mul_scalar(1e-4).sum();
        let mut grads = GradientsParams::from_grads(loss.backward(), &model);
        let norm = unscale_and_norm(&model, &mut grads, 1.0);
        assert_relative_eq!(norm, 0.01, max_relative = 1e-2);
    }

    #[test]
    fn test_f16_unscale_divides_before_squaring() {
        let model = half_bigram(2, 1.0);
        let loss = model.table.weight.val().mul_scalar(1024.0).sum();
        let mut grads = GradientsParams::from_grads(loss.backward(), &model);
        assert_relative_eq!(unscale_and_norm(&model, &mut grads, 1024.0), 2.0, max_relative = 1e-3);
        // the stored gradients are unscaled too
        assert_relative_eq!(unscale_and_norm(&model, &mut grads, 1.0), 2.0, max_relative = 1e-3);
    }

    #[test]
    fn test_clip_factor() {
        assert!(clip_factor(0.5, 1.0).is_none());
        assert!(clip_factor(5.0, 0.0).is_none());
        assert!(clip_factor(f64::NAN, 1.0).is_none());
        assert_relative_eq!(clip_factor(4.0, 1.0).unwrap(), 1.0 / 4.000001);
    }
}
