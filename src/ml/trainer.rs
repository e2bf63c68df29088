// ============================================================
// Layer 5: Training Loop
// ============================================================
// One pass over the packed dataset.
//
//   run_training  master weights and AdamW always on
//                 Autodiff<Wgpu<f32>>; the precision mode picks the
//                 forward pass
//                   full    → on the master, scaler disabled
//                   reduced → on an Autodiff<Wgpu<f16>> copy,
//                             dynamic scaler
//   train_loop    builds model, AdamW, schedule and context, checks
//                 shapes, then drives run_pass with the bookkeeper
//   run_pass      batch i = rows [B·i, B·(i+1)), i < steps, no
//                 wraparound; calls a hook after every step
//
// Reference: Burn Book §5, Loshchilov & Hutter (2019) AdamW

use anyhow::Result;
use burn::{
    backend::{wgpu::WgpuDevice, Autodiff, Wgpu},
    module::AutodiffModule,
    optim::{AdamWConfig, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use indicatif::{ProgressBar, ProgressStyle};

use crate::application::train_use_case::{Precision, TrainConfig};
use crate::data::{batcher::TokenBatcher, dataset::PackedDataset};
use crate::domain::error::PipelineError;
use crate::infra::{checkpoint::CheckpointManager, metrics::MetricsLogger};
use crate::ml::{
    bookkeeper::{Bookkeeper, ReportCadence},
    context::{StepReport, TrainingContext, UpdateStats},
    loss_scale::{LossScaleConfig, LossScaler},
    model::{CausalLm, GptModel},
    precision::{ForwardPass, FullForward, HalfForward},
    schedule::WarmupCosine,
};

type MasterBackend = Autodiff<Wgpu>;
type HalfBackend   = Autodiff<Wgpu<half::f16, i32>>;

#[derive(Debug, Clone, PartialEq)]
pub struct TrainSummary {
    pub steps:       usize,
    pub tokens_seen: usize,
    pub final_loss:  Option<f64>,
    pub stats:       UpdateStats,
    pub loss_scale:  f64,
}

pub fn run_training(
    cfg:          &TrainConfig,
    dataset:      &PackedDataset,
    ckpt_manager: CheckpointManager,
    metrics:      MetricsLogger,
) -> Result<TrainSummary> {
    let device = WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?} ({:?} precision)", device, cfg.precision);

    match cfg.precision {
        Precision::Full => train_loop::<MasterBackend, _>(
            cfg, dataset, ckpt_manager, metrics, device, LossScaler::disabled(), FullForward,
        ),
        Precision::Reduced => {
            HalfBackend::seed(cfg.seed);
            let copy: GptModel<HalfBackend> = cfg.model_config().init(&device);
            let forward = HalfForward::<HalfBackend, _>::new(copy, device.clone());
            train_loop::<MasterBackend, _>(
                cfg, dataset, ckpt_manager, metrics, device, LossScaler::new(&LossScaleConfig::new()), forward,
            )
        }
    }
}

pub fn train_loop<B, F>(
    cfg:          &TrainConfig,
    dataset:      &PackedDataset,
    ckpt_manager: CheckpointManager,
    metrics:      MetricsLogger,
    device:       B::Device,
    scaler:       LossScaler,
    forward:      F,
) -> Result<TrainSummary>
where
    B: AutodiffBackend,
    F: ForwardPass<B, GptModel<B>>,
{
    B::seed(cfg.seed);

    // ── Build model ───────────────────────────────────────────────────────────
    let model: GptModel<B> = cfg.model_config().init(&device);
    check_shapes(&model, dataset)?;
    let steps = plan_steps(dataset.rows(), cfg.batch_size, cfg.max_steps)?;

    tracing::info!(
        "Model ready: {} layers, d_model={}, {} parameters",
        cfg.num_layers, cfg.d_model, model.num_params()
    );
    tracing::info!(
        "Dataset [{}, {}], batch {} × accumulation {}, {} steps",
        dataset.rows(), dataset.width(), cfg.batch_size, cfg.accumulation, steps
    );

    // ── AdamW optimiser ───────────────────────────────────────────────────────
    let optim    = AdamWConfig::new().with_weight_decay(0.01).init();
    let schedule = WarmupCosine::new(cfg.lr, cfg.warmup_steps, steps);
    let mut ctx  = TrainingContext::with_forward(
        forward, model, optim, scaler, schedule, cfg.accumulation, cfg.grad_clip,
    );

    let batcher    = TokenBatcher::<B>::new(device);
    let mut keeper = Bookkeeper::new(ckpt_manager, metrics, ReportCadence::default());

    let pb = ProgressBar::new(steps as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  training {bar:40.cyan/blue} {pos}/{len} {msg} [{elapsed}<{eta}]")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    // ── Training pass ─────────────────────────────────────────────────────────
    run_pass(&mut ctx, dataset, &batcher, cfg.batch_size, steps, |ctx, report| {
        keeper.on_step(ctx.model(), ctx.history(), report)?;
        pb.set_message(format!("loss {:.4}", report.loss));
        pb.inc(1);
        Ok(())
    })?;
    pb.finish_and_clear();

    keeper.finish(ctx.model(), ctx.history(), ctx.step_count())?;

    let summary = TrainSummary {
        steps:       ctx.step_count(),
        tokens_seen: ctx.tokens_seen(),
        final_loss:  ctx.history().losses().last().copied(),
        stats:       ctx.stats(),
        loss_scale:  ctx.loss_scale(),
    };
    tracing::info!(
        "Training complete: {} steps, {} tokens, {} updates ({} skipped, {} clipped)",
        summary.steps, summary.tokens_seen,
        summary.stats.applied, summary.stats.skipped, summary.stats.clipped
    );
    Ok(summary)
}

/// Drive `steps` consecutive batches through `ctx`, calling `on_step` after each.
pub fn run_pass<B, M, O, S, F>(
    ctx:        &mut TrainingContext<B, M, O, S>,
    dataset:    &PackedDataset,
    batcher:    &TokenBatcher<B>,
    batch_size: usize,
    steps:      usize,
    mut on_step: F,
) -> Result<()>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + CausalLm<B>,
    O: Optimizer<M, B>,
    S: ForwardPass<B, M>,
    F: FnMut(&TrainingContext<B, M, O, S>, &StepReport) -> Result<()>,
{
    for i in 0..steps {
        let batch = batcher.batch_at(dataset, batch_size, i).ok_or_else(|| {
            PipelineError::shape(format!(
                "batch {} of size {} runs past the {} dataset rows",
                i, batch_size, dataset.rows()
            ))
        })?;
        let report = ctx.step(batch)?;
        on_step(ctx, &report)?;
    }
    Ok(())
}

/// Steps in one pass: `rows / batch_size`, capped by `max_steps`.
pub fn plan_steps(rows: usize, batch_size: usize, max_steps: Option<usize>) -> Result<usize, PipelineError> {
    if batch_size == 0 {
        return Err(PipelineError::shape("batch size must be at least 1"));
    }
    let full  = rows / batch_size;
    let steps = max_steps.map_or(full, |cap| cap.min(full));
    if steps == 0 {
        return Err(PipelineError::shape(format!(
            "{} rows with batch size {} give zero training steps",
            rows, batch_size
        )));
    }
    Ok(steps)
}

/// The dataset's window and vocabulary must fit the model.
pub fn check_shapes<B: Backend, M: CausalLm<B>>(model: &M, dataset: &PackedDataset) -> Result<(), PipelineError> {
    if dataset.window() > model.max_seq_len() {
        return Err(PipelineError::shape(format!(
            "window length {} exceeds the model's max_seq_len {}",
            dataset.window(),
            model.max_seq_len()
        )));
    }
    if dataset.vocab_size() > model.vocab_size() {
        return Err(PipelineError::shape(format!(
            "dataset vocabulary {} exceeds the model's vocabulary {}",
            dataset.vocab_size(),
            model.vocab_size()
        )));
    }
    Ok(())
}
