// ============================================================
// Layer 5: ML / Model Layer (Burn)
// ============================================================
// Every piece of code that needs burn tensors lives here.
//
//   model.rs       - CausalLm trait and the GPT decoder
//   loss_scale.rs  - dynamic loss scaler for f16 training
//   schedule.rs    - warmup + cosine learning rate
//   grads.rs       - unscale, global norm and clipping of
//                    GradientsParams through a ModuleVisitor
//   precision.rs   - forward pass on the f32 master or on an
//                    f16 copy with widened gradients
//   context.rs     - TrainingContext: one step at a time,
//                    gradient accumulation, skip-on-overflow
//   bookkeeper.rs  - per-step metrics, periodic plot and
//                    checkpoint
//   trainer.rs     - precision dispatch and the training pass
//   sampler.rs     - nucleus sampling with repetition penalty
//   generator.rs   - autoregressive generation loop
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)
//            Vaswani et al. (2017) Attention Is All You Need
//            Radford et al. (2019) GPT-2

/// GPT decoder architecture and the model contract
pub mod model;

/// Dynamic loss scaling
pub mod loss_scale;

/// Warmup-cosine learning rate schedule
pub mod schedule;

/// Gradient unscaling, norm and clipping
pub mod grads;

/// Full or half precision forward and backward
pub mod precision;

/// Mutable training state and the single-step routine
pub mod context;

/// Metrics, plots and checkpoints during a pass
pub mod bookkeeper;

/// Training pass with precision dispatch
pub mod trainer;

/// Nucleus sampler
pub mod sampler;

/// Autoregressive generation driver
pub mod generator;

#[cfg(test)]
pub(crate) mod testing;
