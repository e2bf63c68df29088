// ============================================================
// Layer 3: Loss History
// ============================================================
// Per-step record of (cumulative tokens processed, raw loss).
// Owned by the training context and read by the bookkeeping
// hook, which plots the curve and logs the smoothed value.
//
// Smoothing is a plain moving average in "valid" mode: a window
// of w values yields len - w + 1 averages, each aligned with the
// LAST token count it covers.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LossHistory {
    tokens: Vec<usize>,
    losses: Vec<f64>,
}

/// A slice of the history ready for plotting.
#[derive(Debug, Clone, PartialEq)]
pub struct LossCurve {
    pub tokens:          Vec<f64>,
    pub raw:             Vec<f64>,
    pub smoothed_tokens: Vec<f64>,
    pub smoothed:        Vec<f64>,
}

impl LossHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, tokens_seen: usize, loss: f64) {
        self.tokens.push(tokens_seen);
        self.losses.push(loss);
    }

    pub fn len(&self) -> usize {
        self.losses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.losses.is_empty()
    }

    pub fn losses(&self) -> &[f64] {
        &self.losses
    }

    pub fn tokens(&self) -> &[usize] {
        &self.tokens
    }

    /// Raw and smoothed curve after discarding the first `skip` steps.
    ///
    /// The smoothed series is empty while fewer than `window` points
    /// remain after the skip.
    pub fn curve(&self, skip: usize, window: usize) -> LossCurve {
        let start = skip.min(self.len());
        let tokens: Vec<f64> = self.tokens[start..].iter().map(|&t| t as f64).collect();
        let raw = self.losses[start..].to_vec();

        let smoothed = moving_average(&raw, window);
        let smoothed_tokens = tokens[tokens.len() - smoothed.len()..].to_vec();

        LossCurve { tokens, raw, smoothed_tokens, smoothed }
    }
}

/// Moving average over `window` values, "valid" mode.
pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || values.len() < window {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(values.len() - window + 1);
    let mut sum: f64 = values[..window].iter().sum();
    out.push(sum / window as f64);
    for i in window..values.len() {
        sum += values[i] - values[i - window];
        out.push(sum / window as f64);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_moving_average_valid_mode() {
        let avg = moving_average(&[1.0, 2.0, 3.0, 4.0, 5.0], 2);
        assert_eq!(avg.len(), 4);
        assert_relative_eq!(avg[0], 1.5);
        assert_relative_eq!(avg[3], 4.5);
    }

    #[test]
    fn test_moving_average_short_input_is_empty() {
        assert!(moving_average(&[1.0, 2.0], 3).is_empty());
        assert!(moving_average(&[1.0, 2.0], 0).is_empty());
    }

    #[test]
    fn test_curve_skips_settling_steps_and_aligns_tail() {
        let mut history = LossHistory::new();
        for step in 1..=10 {
            history.record(step * 100, step as f64);
        }

        let curve = history.curve(4, 3);
        // steps 5..=10 remain
        assert_eq!(curve.raw, vec![5.0, 6.0, 7.0, 8.0, 9.0, 10.0]);
        assert_eq!(curve.smoothed.len(), 4);
        // each average is aligned with the last token count it covers
        assert_eq!(curve.smoothed_tokens, vec![700.0, 800.0, 900.0, 1000.0]);
        assert_relative_eq!(curve.smoothed[0], 6.0);
    }
}
