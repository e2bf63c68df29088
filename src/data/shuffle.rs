// ============================================================
// Layer 4: Row Shuffler
// ============================================================
// Shuffles the rows of a packed dataset in place, once, before the
// file is written. The training pass then walks rows strictly in
// order, batch i being rows [B*i, B*(i+1)).
//
// The permutation comes from a seeded StdRng, so the same corpus and
// seed always produce the same file. Ids inside a row never move:
// the row is a unit (input and shifted target together).
//
// Uses Fisher-Yates via rand::seq::SliceRandom.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::data::dataset::PackedDataset;

/// Uniformly permute the rows of `dataset` using `seed`.
pub fn shuffle_rows(dataset: &mut PackedDataset, seed: u64) {
    let rows  = dataset.rows();
    let width = dataset.width();

    let mut order: Vec<usize> = (0..rows).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let ids = dataset.ids_mut();
    let original = ids.to_vec();
    for (dst, &src) in order.iter().enumerate() {
        ids[dst * width..(dst + 1) * width]
            .copy_from_slice(&original[src * width..(src + 1) * width]);
    }

    tracing::debug!("Shuffled {} rows with seed {}", rows, seed);
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    /// 50 rows of width 3 where row r is [r, r, r].
    fn numbered_rows() -> PackedDataset {
        let ids: Vec<u32> = (0..50u32).flat_map(|r| [r, r, r]).collect();
        PackedDataset::new(2, 64, ids).unwrap()
    }

    fn row_order(ds: &PackedDataset) -> Vec<u32> {
        (0..ds.rows()).map(|r| ds.row(r).unwrap()[0]).collect()
    }

    #[test]
    fn test_same_seed_same_order() {
        let mut a = numbered_rows();
        let mut b = numbered_rows();
        shuffle_rows(&mut a, 7);
        shuffle_rows(&mut b, 7);
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_seed_changes_order() {
        let mut a = numbered_rows();
        let mut b = numbered_rows();
        shuffle_rows(&mut a, 1);
        shuffle_rows(&mut b, 2);
        assert_ne!(row_order(&a), row_order(&b));
    }

    #[test]
    fn test_rows_stay_intact_and_complete() {
        let mut ds = numbered_rows();
        shuffle_rows(&mut ds, 42);

        for r in 0..ds.rows() {
            let row = ds.row(r).unwrap();
            assert!(row.iter().all(|&id| id == row[0]));
        }
        let mut order = row_order(&ds);
        order.sort_unstable();
        assert_eq!(order, (0..50).collect::<Vec<u32>>());
    }
}
