// ============================================================
// Layer 5: Warmup-Cosine Learning Rate
// ============================================================
//
//   lr(s) = peak · s / W                                s < W
//   lr(s) = ½ · peak · (1 + cos(π · min(1, (s-W)/(T-W))))  s ≥ W
//
// where T is the number of steps in the pass. The schedule is
// queried once per step, not once per optimizer update.

use std::f64::consts::PI;

#[derive(Debug, Clone, Copy)]
pub struct WarmupCosine {
    peak_lr:      f64,
    warmup_steps: usize,
    total_steps:  usize,
}

impl WarmupCosine {
    pub fn new(peak_lr: f64, warmup_steps: usize, total_steps: usize) -> Self {
        Self { peak_lr, warmup_steps, total_steps }
    }

    pub fn lr_at(&self, step: usize) -> f64 {
        if step < self.warmup_steps {
            return self.peak_lr * step as f64 / self.warmup_steps as f64;
        }
        let decay_steps = self.total_steps.saturating_sub(self.warmup_steps).max(1);
        let progress = ((step - self.warmup_steps) as f64 / decay_steps as f64).min(1.0);
        0.5 * self.peak_lr * (1.0 + (PI * progress).cos())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_zero_at_start_and_peak_at_warmup_end() {
        let sched = WarmupCosine::new(5e-4, 300, 2000);
        assert_eq!(sched.lr_at(0), 0.0);
        assert_relative_eq!(sched.lr_at(150), 2.5e-4);
        assert_relative_eq!(sched.lr_at(300), 5e-4);
    }

    #[test]
    fn test_non_increasing_after_warmup() {
        let sched = WarmupCosine::new(1.0, 10, 100);
        let mut prev = sched.lr_at(10);
        for step in 11..=120 {
            let lr = sched.lr_at(step);
            assert!(lr <= prev + 1e-12, "step {step}: {lr} > {prev}");
            prev = lr;
        }
        assert_relative_eq!(sched.lr_at(100), 0.0, epsilon = 1e-12);
        assert_relative_eq!(sched.lr_at(120), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_no_warmup_starts_at_peak() {
        let sched = WarmupCosine::new(0.1, 0, 50);
        assert_relative_eq!(sched.lr_at(0), 0.1);
    }

    #[test]
    fn test_pass_shorter_than_warmup() {
        let sched = WarmupCosine::new(1.0, 300, 100);
        assert_relative_eq!(sched.lr_at(99), 0.33, epsilon = 1e-12);
    }
}
