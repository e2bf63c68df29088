// ============================================================
// Layer 4: Token Batcher
// ============================================================
// Turns consecutive packed rows into the two tensors a
// language-modelling step needs.
//
//   Input:  B rows of L+1 ids
//   Output: inputs  [B, L]  = columns 0..L
//           targets [B, L]  = columns 1..L+1
//
// The rows are flattened into one Vec<i32> (burn Int tensors use
// i32), uploaded once, reshaped to [B, L+1] and then sliced, so
// each batch is created directly on the training device.

use burn::prelude::*;

use crate::data::dataset::PackedDataset;

// ─── TokenBatch ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct TokenBatch<B: Backend> {
    /// Model input ids, shape [batch_size, window]
    pub inputs:  Tensor<B, 2, Int>,

    /// Next-token targets, shape [batch_size, window]
    pub targets: Tensor<B, 2, Int>,
}

impl<B: Backend> TokenBatch<B> {
    pub fn batch_size(&self) -> usize {
        self.inputs.dims()[0]
    }

    pub fn window(&self) -> usize {
        self.inputs.dims()[1]
    }

    /// Number of target positions, which is the token count of the step.
    pub fn num_tokens(&self) -> usize {
        self.batch_size() * self.window()
    }
}

// ─── TokenBatcher ─────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct TokenBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> TokenBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    /// Batch `i` of a pass: rows [batch_size * i, batch_size * (i + 1)).
    ///
    /// Returns None when the batch would run past the last row; a pass
    /// never wraps around.
    pub fn batch_at(&self, dataset: &PackedDataset, batch_size: usize, index: usize) -> Option<TokenBatch<B>> {
        let start = batch_size * index;
        let flat  = dataset.row_range(start, start + batch_size)?;
        Some(self.from_flat(flat, batch_size, dataset.width()))
    }

    fn from_flat(&self, flat: &[u32], batch_size: usize, width: usize) -> TokenBatch<B> {
        let ids: Vec<i32> = flat.iter().map(|&id| id as i32).collect();
        let rows = Tensor::<B, 1, Int>::from_ints(ids.as_slice(), &self.device)
            .reshape([batch_size, width]);

        let inputs  = rows.clone().slice([0..batch_size, 0..width - 1]);
        let targets = rows.slice([0..batch_size, 1..width]);

        TokenBatch { inputs, targets }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn dataset() -> PackedDataset {
        // 3 rows of width 4
        PackedDataset::new(3, 20, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]).unwrap()
    }

    fn to_vec(t: Tensor<TestBackend, 2, Int>) -> Vec<i64> {
        t.into_data().convert::<i64>().to_vec::<i64>().unwrap()
    }

    #[test]
    fn test_inputs_and_targets_are_shifted_by_one() {
        let batcher = TokenBatcher::<TestBackend>::new(Default::default());
        let batch = batcher.batch_at(&dataset(), 2, 0).unwrap();

        assert_eq!(batch.inputs.dims(), [2, 3]);
        assert_eq!(to_vec(batch.inputs), vec![1, 2, 3, 5, 6, 7]);
        assert_eq!(to_vec(batch.targets), vec![2, 3, 4, 6, 7, 8]);
    }

    #[test]
    fn test_pass_does_not_wrap_around() {
        let batcher = TokenBatcher::<TestBackend>::new(Default::default());
        let ds = dataset();
        assert!(batcher.batch_at(&ds, 1, 2).is_some());
        assert!(batcher.batch_at(&ds, 1, 3).is_none());
        // second batch of two would need rows 2..4
        assert!(batcher.batch_at(&ds, 2, 1).is_none());
    }
}
