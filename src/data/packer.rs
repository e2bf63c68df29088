// ============================================================
// Layer 4: Sequence Packer
// ============================================================
// Turns corpus lines into fixed-width, label-shifted rows.
//
// Stage 1: tokenize
//   every line → encode(line) ++ [eos]
//   all lines concatenated in file order → one flat TokenStream
//
// Stage 2: window
//   truncate the stream to a multiple of L (the tail is dropped)
//   and cut it into N rows of L ids:
//
//     stream:  t0 t1 t2 t3 t4 t5 t6 t7 t8 t9 t10      (L = 3)
//     windows: [t0 t1 t2] [t3 t4 t5] [t6 t7 t8]       (t9 t10 dropped)
//
// Stage 3: shift
//   row i borrows the first id of row i+1 as its (L+1)-th column,
//   and the last row, with nothing left to borrow, is dropped:
//
//     rows:    [t0 t1 t2 t3] [t3 t4 t5 t6]            (N-1 = 2 rows)
//
//   ids[0..L]   are the model input
//   ids[1..L+1] are the next-token targets
//
// Shuffling happens afterwards in data::shuffle so the packer stays
// deterministic and easy to test.

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};

use crate::data::dataset::PackedDataset;
use crate::domain::error::PipelineError;
use crate::domain::traits::TextTokenizer;

/// Rows of exactly `window` ids, before the label shift.
#[derive(Debug, Clone, PartialEq)]
pub struct Windows {
    pub window: usize,
    pub ids:    Vec<u32>,
}

impl Windows {
    pub fn count(&self) -> usize {
        self.ids.len() / self.window
    }

    pub fn row(&self, i: usize) -> &[u32] {
        &self.ids[i * self.window..(i + 1) * self.window]
    }
}

/// Packs tokenized text into rows of `window + 1` ids.
pub struct Packer {
    window: usize,
}

impl Packer {
    pub fn new(window: usize) -> Self {
        Self { window }
    }

    /// Full pipeline: tokenize → window → shift (unshuffled).
    pub fn pack<T: TextTokenizer>(&self, lines: &[String], tokenizer: &T) -> Result<PackedDataset> {
        let stream  = tokenize_lines(lines, tokenizer)?;
        tracing::info!("Token stream length: {}", stream.len());

        let windows = self.window(stream)?;
        let rows    = shift_labels(&windows)?;
        let packed  = PackedDataset::new(self.window, tokenizer.vocab_size(), rows)?;

        if let Some(first) = packed.row(0) {
            tracing::debug!("First packed row: {:?}", first);
        }
        tracing::info!("Packed dataset shape: [{}, {}]", packed.rows(), packed.width());
        Ok(packed)
    }

    /// Stage 2: drop the remainder and cut the stream into rows of `window`.
    pub fn window(&self, mut stream: Vec<u32>) -> Result<Windows, PipelineError> {
        if self.window == 0 {
            return Err(PipelineError::shape("window length must be at least 1"));
        }
        let usable = (stream.len() / self.window) * self.window;
        if usable == 0 {
            return Err(PipelineError::shape(format!(
                "corpus has {} tokens, fewer than one window of {}",
                stream.len(),
                self.window
            )));
        }
        let dropped = stream.len() - usable;
        stream.truncate(usable);
        tracing::debug!("Windowing: kept {} tokens, dropped {} trailing", usable, dropped);

        Ok(Windows { window: self.window, ids: stream })
    }
}

/// Stage 1: encode every line, append the end-of-text id, concatenate.
pub fn tokenize_lines<T: TextTokenizer>(lines: &[String], tokenizer: &T) -> Result<Vec<u32>> {
    let eos = tokenizer.eos_id();

    let pb = ProgressBar::new(lines.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  tokenizing {bar:40.cyan/blue} {pos}/{len} [{elapsed}<{eta}]")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut stream = Vec::new();
    for line in lines {
        stream.extend(tokenizer.encode(line)?);
        stream.push(eos);
        pb.inc(1);
    }
    pb.finish_and_clear();

    Ok(stream)
}

/// Stage 3: append the first id of row i+1 to row i, drop the last row.
///
/// N windows of width L become N-1 rows of width L+1.
pub fn shift_labels(windows: &Windows) -> Result<Vec<u32>, PipelineError> {
    let n = windows.count();
    if n < 2 {
        return Err(PipelineError::shape(format!(
            "need at least 2 windows of {} tokens to form one shifted row, got {}",
            windows.window, n
        )));
    }

    let width = windows.window + 1;
    let mut rows = Vec::with_capacity((n - 1) * width);
    for i in 0..n - 1 {
        rows.extend_from_slice(windows.row(i));
        rows.push(windows.row(i + 1)[0]);
    }
    Ok(rows)
}
