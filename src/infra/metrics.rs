// ============================================================
// Layer 6: Metrics Logger
// ============================================================
// Records one CSV row per training step.
//
// Columns:
//   step          - steps completed (1-based)
//   tokens        - cumulative tokens processed
//   loss          - raw cross-entropy of the step
//   learning_rate - rate the schedule produced for the step
//   loss_scale    - dynamic loss scale used for backward
//   update        - "", "applied", "clipped" or "skipped"
//
// Output file: <artifacts>/metrics.csv
//
// Example CSV output:
//   step,tokens,loss,learning_rate,loss_scale,update
//   1,4096,9.214871,0.00000000,65536,
//   4,16384,9.187702,0.00000500,32768,skipped
//
// Training always starts at step zero, so the file is recreated
// for every run instead of appended to.

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::ml::context::{StepReport, UpdateOutcome};

/// One row of the metrics CSV.
#[derive(Debug, Clone, PartialEq)]
pub struct StepMetrics {
    pub step:          usize,
    pub tokens:        usize,
    pub loss:          f64,
    pub learning_rate: f64,
    pub loss_scale:    f64,
    pub update:        &'static str,
}

impl From<&StepReport> for StepMetrics {
    fn from(r: &StepReport) -> Self {
        let update = match r.update {
            None                                                => "",
            Some(UpdateOutcome::Applied { clipped: false, .. }) => "applied",
            Some(UpdateOutcome::Applied { clipped: true, .. })  => "clipped",
            Some(UpdateOutcome::Skipped { .. })                 => "skipped",
        };
        Self {
            step:          r.step,
            tokens:        r.tokens_seen,
            loss:          r.loss,
            learning_rate: r.learning_rate,
            loss_scale:    r.loss_scale,
            update,
        }
    }
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create `<dir>/metrics.csv`, replacing any previous run's file.
    pub fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");
        let mut f = fs::File::create(&csv_path)
            .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
        writeln!(f, "step,tokens,loss,learning_rate,loss_scale,update")?;
        tracing::debug!("Created metrics CSV: '{}'", csv_path.display());

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &StepMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{},{:.6},{:.8},{},{}",
            m.step, m.tokens, m.loss, m.learning_rate, m.loss_scale, m.update,
        )?;
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn report(step: usize, update: Option<UpdateOutcome>) -> StepReport {
        StepReport {
            step,
            tokens_seen:   step * 10,
            loss:          2.5,
            learning_rate: 1e-4,
            loss_scale:    1024.0,
            update,
        }
    }

    #[test]
    fn test_update_column() {
        let applied = Some(UpdateOutcome::Applied { grad_norm: 0.5, clipped: false });
        let clipped = Some(UpdateOutcome::Applied { grad_norm: 5.0, clipped: true });
        let skipped = Some(UpdateOutcome::Skipped { grad_norm: f64::NAN });
        assert_eq!(StepMetrics::from(&report(1, None)).update, "");
        assert_eq!(StepMetrics::from(&report(2, applied)).update, "applied");
        assert_eq!(StepMetrics::from(&report(3, clipped)).update, "clipped");
        assert_eq!(StepMetrics::from(&report(4, skipped)).update, "skipped");
    }

    #[test]
    fn test_rows_follow_header_and_file_is_recreated() {
        let dir = tempdir().unwrap();
        let logger = MetricsLogger::create(dir.path()).unwrap();
        logger.log(&StepMetrics::from(&report(1, None))).unwrap();
        logger.log(&StepMetrics::from(&report(2, None))).unwrap();

        let text = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "1,10,2.500000,0.00010000,1024,");

        let again = MetricsLogger::create(dir.path()).unwrap();
        assert_eq!(fs::read_to_string(again.csv_path()).unwrap().lines().count(), 1);
    }
}
