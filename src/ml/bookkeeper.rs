// ============================================================
// Layer 5: Training Bookkeeper
// ============================================================
// Runs after every training step:
//
//   every step             → one row in metrics.csv
//   step > settle and
//   step % interval == 0   → loss plot (raw + smoothed, settling
//                            steps excluded), checkpoint, log line
//   end of pass            → final checkpoint and plot
//
// A failed plot is logged and ignored; a failed checkpoint aborts
// the pass.

use anyhow::Result;
use burn::prelude::*;
use std::{path::PathBuf, time::Instant};

use crate::domain::loss_history::LossHistory;
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{MetricsLogger, StepMetrics},
    plot::plot_loss_curve,
};
use crate::ml::context::StepReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportCadence {
    /// Early steps left out of the plot and the smoothing.
    pub settle:    usize,
    pub interval:  usize,
    /// Moving-average window for the smoothed loss.
    pub smoothing: usize,
}

impl Default for ReportCadence {
    fn default() -> Self {
        Self { settle: 200, interval: 100, smoothing: 50 }
    }
}

impl ReportCadence {
    /// `step_count` is the number of completed steps (1-based).
    pub fn is_due(&self, step_count: usize) -> bool {
        step_count > self.settle && self.interval > 0 && step_count % self.interval == 0
    }
}

pub struct Bookkeeper {
    cadence:    ReportCadence,
    checkpoint: CheckpointManager,
    metrics:    MetricsLogger,
    plot_path:  PathBuf,
    started:    Instant,
}

impl Bookkeeper {
    pub fn new(checkpoint: CheckpointManager, metrics: MetricsLogger, cadence: ReportCadence) -> Self {
        let plot_path = checkpoint.dir().join("loss_plot.png");
        Self { cadence, checkpoint, metrics, plot_path, started: Instant::now() }
    }

    pub fn on_step<B: Backend, M: Module<B>>(
        &mut self,
        model:   &M,
        history: &LossHistory,
        report:  &StepReport,
    ) -> Result<()> {
        self.metrics.log(&StepMetrics::from(report))?;
        if !self.cadence.is_due(report.step) {
            return Ok(());
        }

        let smoothed = self.plot(history);
        self.checkpoint.save_model(model, report.step)?;

        let hours = self.started.elapsed().as_secs_f64() / 3600.0;
        let tokens_per_hour = if hours > 0.0 { report.tokens_seen as f64 / hours } else { 0.0 };
        tracing::info!(
            "step {} | tokens {} | loss {:.4} | smoothed {} | lr {:.3e} | scale {} | {:.0} tokens/hr",
            report.step,
            report.tokens_seen,
            report.loss,
            smoothed.map_or("-".to_string(), |s| format!("{s:.4}")),
            report.learning_rate,
            report.loss_scale,
            tokens_per_hour,
        );
        Ok(())
    }

    /// Final checkpoint after the last step of the pass.
    pub fn finish<B: Backend, M: Module<B>>(
        &mut self,
        model:      &M,
        history:    &LossHistory,
        step_count: usize,
    ) -> Result<()> {
        self.plot(history);
        self.checkpoint.save_model(model, step_count)?;
        tracing::info!(
            "Final checkpoint at step {} written to '{}'",
            step_count,
            self.checkpoint.dir().display()
        );
        Ok(())
    }

    /// Redraw the loss plot; returns the latest smoothed loss, if any.
    fn plot(&self, history: &LossHistory) -> Option<f64> {
        let curve = history.curve(self.cadence.settle, self.cadence.smoothing);
        if curve.raw.is_empty() {
            return None;
        }
        if let Err(e) = plot_loss_curve(&self.plot_path, &curve) {
            tracing::warn!("Could not write loss plot '{}': {e:#}", self.plot_path.display());
        }
        curve.smoothed.last().copied()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::testing::{bigram_on, BigramLm, TestBackend};
    use tempfile::tempdir;

    #[test]
    fn test_cadence() {
        let cadence = ReportCadence::default();
        assert!(!cadence.is_due(100));
        assert!(!cadence.is_due(200));
        assert!(!cadence.is_due(250));
        assert!(cadence.is_due(300));
        assert!(cadence.is_due(400));
    }

    fn report(step: usize) -> StepReport {
        StepReport {
            step,
            tokens_seen:   step * 32,
            loss:          3.0,
            learning_rate: 1e-3,
            loss_scale:    1.0,
            update:        None,
        }
    }

    #[test]
    fn test_checkpoint_only_when_due() {
        let dir  = tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let csv  = MetricsLogger::create(dir.path()).unwrap();
        let mut keeper = Bookkeeper::new(ckpt, csv, ReportCadence { settle: 2, interval: 3, smoothing: 2 });

        let model: BigramLm<TestBackend> = bigram_on(4, &Default::default());
        let mut history = LossHistory::new();
        for step in 1..=5 {
            history.record(step * 32, 3.0 / step as f64);
            keeper.on_step(&model, &history, &report(step)).unwrap();
            let latest = dir.path().join("latest_step.json");
            // only step 3 is due within 1..=5
            assert_eq!(latest.exists(), step >= 3, "step {step}");
        }

        keeper.finish(&model, &history, 5).unwrap();
        let latest = std::fs::read_to_string(dir.path().join("latest_step.json")).unwrap();
        assert_eq!(latest, "5");

        let rows = std::fs::read_to_string(dir.path().join("metrics.csv")).unwrap();
        assert_eq!(rows.lines().count(), 6);
    }
}
