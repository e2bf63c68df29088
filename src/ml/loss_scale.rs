// ============================================================
// Layer 5: Dynamic Loss Scaler
// ============================================================
// Keeps small half-precision gradients representable.
//
//   backward on   loss × scale
//   inspect       grads ÷ scale
//   overflow?     skip the update, scale × backoff, reset streak
//   otherwise     apply the update; after `growth_interval`
//                 consecutive good updates, scale × growth
//
// In full precision the scaler is disabled: the scale is fixed at
// 1.0 and updates are never skipped.

use burn::prelude::*;

#[derive(Config, Debug)]
pub struct LossScaleConfig {
    #[config(default = 65536.0)]
    pub init_scale:      f64,
    #[config(default = 2.0)]
    pub growth_factor:   f64,
    #[config(default = 0.5)]
    pub backoff_factor:  f64,
    #[config(default = 2000)]
    pub growth_interval: usize,
}

/// What `LossScaler::update` did to the scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScaleChange {
    Unchanged,
    Grew(f64),
    BackedOff(f64),
}

#[derive(Debug, Clone)]
pub struct LossScaler {
    enabled:         bool,
    scale:           f64,
    growth_factor:   f64,
    backoff_factor:  f64,
    growth_interval: usize,
    good_streak:     usize,
}

impl LossScaler {
    pub fn new(config: &LossScaleConfig) -> Self {
        Self {
            enabled:         true,
            scale:           config.init_scale,
            growth_factor:   config.growth_factor,
            backoff_factor:  config.backoff_factor,
            growth_interval: config.growth_interval.max(1),
            good_streak:     0,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled:         false,
            scale:           1.0,
            growth_factor:   1.0,
            backoff_factor:  1.0,
            growth_interval: usize::MAX,
            good_streak:     0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Record the result of one update window.
    pub fn update(&mut self, found_non_finite: bool) -> ScaleChange {
        if !self.enabled {
            return ScaleChange::Unchanged;
        }
        if found_non_finite {
            self.scale *= self.backoff_factor;
            self.good_streak = 0;
            return ScaleChange::BackedOff(self.scale);
        }
        self.good_streak += 1;
        if self.good_streak >= self.growth_interval {
            self.scale *= self.growth_factor;
            self.good_streak = 0;
            return ScaleChange::Grew(self.scale);
        }
        ScaleChange::Unchanged
    }
}
