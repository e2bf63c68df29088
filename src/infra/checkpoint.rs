// ============================================================
// Layer 6: Checkpoint Manager
// ============================================================
// Saves and restores model parameters using Burn's CompactRecorder.
//
// What gets saved:
//   1. model_weights.mpk   - every learned parameter, overwritten
//                            at each report interval and at the end
//   2. latest_step.json    - how many steps the weights have seen
//   3. train_config.json   - hyperparameters, written before training
//
// Only parameters are stored. Optimizer moments, the loss scale
// and the schedule position are not, so there is no resume path:
// a restarted run begins again at step zero.
//
// File layout:
//   artifacts/
//     model_weights.mpk
//     latest_step.json
//     train_config.json

use anyhow::{Context, Result};
use burn::{prelude::*, record::CompactRecorder};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::train_use_case::TrainConfig;

const WEIGHTS_FILE: &str = "model_weights";
const LATEST_FILE:  &str = "latest_step.json";
const CONFIG_FILE:  &str = "train_config.json";

/// Manages the parameter snapshot and its companions in one directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Overwrite the weight snapshot and record the step count.
    pub fn save_model<B: Backend, M: Module<B>>(&self, model: &M, step: usize) -> Result<()> {
        let path = self.dir.join(WEIGHTS_FILE);
        model
            .clone()
            .save_file(path.clone(), &CompactRecorder::new())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        let latest_path = self.dir.join(LATEST_FILE);
        fs::write(&latest_path, serde_json::to_string(&step)?)
            .with_context(|| format!("Failed to write '{}'", latest_path.display()))?;

        tracing::debug!("Saved checkpoint at step {}", step);
        Ok(())
    }

    /// Load the snapshot into `model`, which must have the same architecture.
    pub fn load_model<B: Backend, M: Module<B>>(&self, model: M, device: &B::Device) -> Result<M> {
        let path = self.dir.join(WEIGHTS_FILE);
        let step = self.latest_step()?;
        tracing::info!("Loading checkpoint saved at step {}", step);

        model
            .load_file(path.clone(), &CompactRecorder::new(), device)
            .with_context(|| {
                format!(
                    "Cannot load checkpoint '{}'. Have you trained the model first?",
                    path.display()
                )
            })
    }

    /// Must be called before training so generation can rebuild the model.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(CONFIG_FILE);
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. \
                 Make sure you have run 'train' before 'generate'.",
                path.display()
            )
        })?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed config '{}'", path.display()))
    }

    pub fn latest_step(&self) -> Result<usize> {
        let path = self.dir.join(LATEST_FILE);
        let s = fs::read_to_string(&path).with_context(|| {
            format!("Cannot find '{}'. Have you run 'train' first?", path.display())
        })?;
        Ok(serde_json::from_str::<usize>(&s)?)
    }
}
