// ============================================================
// Layer 4: Corpus Loader
// ============================================================
// Reads the raw training corpus: one UTF-8 text file where every
// line is one independent sample (one Wikipedia paragraph in the
// default setup). Lines are returned in file order with their
// separators stripped. Empty lines are kept: each line, empty or
// not, contributes an end-of-text marker to the stream.
//
// A missing or unreadable file is reported as PipelineError::Io
// so the caller sees exactly which path failed.

use anyhow::Result;
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use crate::domain::error::PipelineError;
use crate::domain::traits::CorpusSource;

/// Loads the corpus text file line by line.
pub struct CorpusLoader {
    path: PathBuf,
}

impl CorpusLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CorpusSource for CorpusLoader {
    fn lines(&self) -> Result<Vec<String>> {
        let file = File::open(&self.path).map_err(|e| PipelineError::io(&self.path, e))?;

        // BufRead::lines() strips both "\n" and "\r\n"
        let lines = BufReader::new(file)
            .lines()
            .collect::<std::io::Result<Vec<String>>>()
            .map_err(|e| PipelineError::io(&self.path, e))?;

        tracing::info!("Read {} lines from '{}'", lines.len(), self.path.display());
        Ok(lines)
    }
}
