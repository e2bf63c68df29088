use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

use crate::domain::error::PipelineError;

/// Dense row-major matrix of token ids, shape `[rows, window + 1]`.
///
/// Row `r` holds the model input in `ids[0..window]` and the
/// next-token targets in `ids[1..window + 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackedDataset {
    window:     usize,
    vocab_size: usize,
    rows:       usize,
    ids:        Vec<u32>,
}

impl PackedDataset {
    /// Wrap already-shifted rows, checking width and id range.
    pub fn new(window: usize, vocab_size: usize, ids: Vec<u32>) -> Result<Self, PipelineError> {
        let width = window + 1;
        if window == 0 || ids.len() % width != 0 {
            return Err(PipelineError::shape(format!(
                "{} ids cannot form rows of width {}",
                ids.len(),
                width
            )));
        }
        let dataset = Self { window, vocab_size, rows: ids.len() / width, ids };
        dataset.validate()?;
        Ok(dataset)
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn width(&self) -> usize {
        self.window + 1
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn row(&self, index: usize) -> Option<&[u32]> {
        if index >= self.rows {
            return None;
        }
        let width = self.width();
        Some(&self.ids[index * width..(index + 1) * width])
    }

    /// Contiguous rows `[start, end)` as one flat slice.
    pub fn row_range(&self, start: usize, end: usize) -> Option<&[u32]> {
        if start > end || end > self.rows {
            return None;
        }
        let width = self.width();
        Some(&self.ids[start * width..end * width])
    }

    pub(crate) fn ids_mut(&mut self) -> &mut [u32] {
        &mut self.ids
    }

    fn validate(&self) -> Result<(), PipelineError> {
        if self.rows == 0 {
            return Err(PipelineError::shape("packed dataset has zero usable rows"));
        }
        if self.ids.len() != self.rows * self.width() {
            return Err(PipelineError::shape(format!(
                "expected {} ids for {} rows of width {}, found {}",
                self.rows * self.width(),
                self.rows,
                self.width(),
                self.ids.len()
            )));
        }
        if let Some(&bad) = self.ids.iter().find(|&&id| id as usize >= self.vocab_size) {
            return Err(PipelineError::shape(format!(
                "token id {} is outside the vocabulary of {}",
                bad, self.vocab_size
            )));
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<(), PipelineError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }
        let file = File::create(path).map_err(|e| PipelineError::io(path, e))?;
        bincode::serialize_into(BufWriter::new(file), self)?;
        tracing::info!(
            "Saved dataset [{}, {}] to '{}'",
            self.rows,
            self.width(),
            path.display()
        );
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
        let dataset: Self = bincode::deserialize_from(BufReader::new(file))?;
        dataset.validate()?;
        tracing::info!(
            "Loaded dataset [{}, {}] from '{}'",
            dataset.rows,
            dataset.width(),
            path.display()
        );
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> PackedDataset {
        PackedDataset::new(3, 10, vec![1, 2, 3, 4, 4, 5, 6, 7]).unwrap()
    }

    #[test]
    fn test_rows_have_window_plus_one_entries() {
        let ds = sample();
        assert_eq!(ds.rows(), 2);
        assert_eq!(ds.width(), 4);
        assert_eq!(ds.row(1).unwrap(), &[4, 5, 6, 7]);
        assert!(ds.row(2).is_none());
        assert_eq!(ds.row_range(0, 2).unwrap().len(), 8);
        assert!(ds.row_range(1, 3).is_none());
    }

    #[test]
    fn test_rejects_ragged_rows() {
        let err = PackedDataset::new(3, 10, vec![1, 2, 3, 4, 5]).unwrap_err();
        assert!(err.is_shape());
    }

    #[test]
    fn test_rejects_out_of_vocab_ids() {
        let err = PackedDataset::new(1, 5, vec![1, 5]).unwrap_err();
        assert!(err.is_shape());
    }

    #[test]
    fn test_rejects_empty() {
        assert!(PackedDataset::new(4, 10, Vec::new()).unwrap_err().is_shape());
    }

    #[test]
    fn test_save_and_load_preserve_rows() {
        let dir  = tempdir().unwrap();
        let path = dir.path().join("nested/dataset.bin");
        let ds   = sample();
        ds.save(&path).unwrap();
        assert_eq!(PackedDataset::load(&path).unwrap(), ds);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let err = PackedDataset::load(&dir.path().join("absent.bin")).unwrap_err();
        assert!(err.is_io());
    }
}
