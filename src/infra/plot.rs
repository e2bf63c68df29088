// ============================================================
// Layer 6: Loss Plot
// ============================================================
// Renders the raw and smoothed training loss against the number
// of tokens processed into a PNG (plotters bitmap backend).
//
//   faint blue  - raw per-step loss
//   solid blue  - moving average
//
// Only the lines are drawn; the axis ranges are logged instead of
// rendered as text so no font backend is needed.

use anyhow::{anyhow, bail, Result};
use plotters::prelude::*;
use std::path::Path;

use crate::domain::loss_history::LossCurve;

const SIZE: (u32, u32) = (900, 600);

pub fn plot_loss_curve(path: &Path, curve: &LossCurve) -> Result<()> {
    let raw: Vec<(f64, f64)> = finite_points(&curve.tokens, &curve.raw);
    if raw.is_empty() {
        bail!("no finite loss values to plot");
    }
    let smoothed = finite_points(&curve.smoothed_tokens, &curve.smoothed);

    let (x_lo, x_hi) = padded_range(raw.iter().map(|p| p.0));
    let (y_lo, y_hi) = padded_range(raw.iter().map(|p| p.1));

    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(|e| anyhow!("backend error: {e}"))?;
    {
        let mut chart = ChartBuilder::on(&root)
            .margin(20)
            .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)
            .map_err(|e| anyhow!("chart build error: {e}"))?;

        chart
            .draw_series(LineSeries::new(raw, BLUE.mix(0.2)))
            .map_err(|e| anyhow!("draw error: {e}"))?;
        chart
            .draw_series(LineSeries::new(smoothed, &BLUE))
            .map_err(|e| anyhow!("draw error: {e}"))?;
    }
    root.present().map_err(|e| anyhow!("render error: {e}"))?;

    tracing::debug!(
        "Loss plot '{}': tokens {:.0}..{:.0}, loss {:.3}..{:.3}",
        path.display(), x_lo, x_hi, y_lo, y_hi
    );
    Ok(())
}

fn finite_points(xs: &[f64], ys: &[f64]) -> Vec<(f64, f64)> {
    xs.iter()
        .zip(ys)
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(&x, &y)| (x, y))
        .collect()
}

fn padded_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if hi - lo < 1e-9 {
        (lo - 1.0, hi + 1.0)
    } else {
        (lo, hi)
    }
}
