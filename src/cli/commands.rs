// ============================================================
// Layer 1: CLI Commands and Arguments
// ============================================================
// Defines the three subcommands and all their flags:
//
//   build-dataset  corpus → tokenizer.json + packed dataset
//   train          packed dataset → weights, plot, metrics
//   generate       weights + prompt → text
//
// Defaults reproduce the reference run: a 512-wide, 8-layer,
// 16-head decoder over a 10 000-token vocabulary and 256-token
// windows.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand, ValueEnum};

use crate::application::{
    build_dataset_use_case::BuildConfig,
    generate_use_case::GenerateConfig,
    train_use_case::{Precision, TrainConfig},
};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the tokenizer if needed and pack the corpus into a dataset file
    BuildDataset(BuildDatasetArgs),

    /// Run one training pass over a packed dataset
    Train(TrainArgs),

    /// Continue a prompt with a trained model
    Generate(GenerateArgs),
}

// ─── build-dataset ────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct BuildDatasetArgs {
    /// Text file with one sample per line
    #[arg(long, default_value = "data.txt")]
    pub corpus: String,

    /// Directory for tokenizer.json and training outputs
    #[arg(long, default_value = "artifacts")]
    pub artifacts_dir: String,

    /// Where to write the packed dataset
    #[arg(long, default_value = "artifacts/dataset.bin")]
    pub output: String,

    /// Tokens per training window (rows hold window + 1 ids)
    #[arg(long, default_value_t = 256)]
    pub window: usize,

    /// Target vocabulary size when a tokenizer has to be trained
    #[arg(long, default_value_t = 10_000)]
    pub vocab_size: usize,

    /// Seed for the row shuffle
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}

impl From<BuildDatasetArgs> for BuildConfig {
    fn from(a: BuildDatasetArgs) -> Self {
        BuildConfig {
            corpus_path:   a.corpus,
            artifacts_dir: a.artifacts_dir,
            output_path:   a.output,
            window:        a.window,
            vocab_size:    a.vocab_size,
            seed:          a.seed,
        }
    }
}

// ─── train ────────────────────────────────────────────────────────────────────
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrecisionArg {
    /// f32 forward and backward
    Full,
    /// f16 forward and backward, f32 weights, dynamic loss scaling
    Reduced,
}

impl From<PrecisionArg> for Precision {
    fn from(p: PrecisionArg) -> Self {
        match p {
            PrecisionArg::Full    => Precision::Full,
            PrecisionArg::Reduced => Precision::Reduced,
        }
    }
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Packed dataset written by build-dataset
    #[arg(long, default_value = "artifacts/dataset.bin")]
    pub dataset: String,

    /// Directory for weights, config, plot and metrics
    #[arg(long, default_value = "artifacts")]
    pub artifacts_dir: String,

    /// Stop the pass after this many steps
    #[arg(long)]
    pub max_steps: Option<usize>,

    #[arg(long, value_enum, default_value_t = PrecisionArg::Reduced)]
    pub precision: PrecisionArg,

    /// Rows per step
    #[arg(long, default_value_t = 16)]
    pub batch_size: usize,

    /// Steps whose gradients are summed before one optimizer update
    #[arg(long, default_value_t = 4)]
    pub accumulation: usize,

    /// Peak learning rate reached at the end of warmup
    #[arg(long, default_value_t = 5e-4)]
    pub lr: f64,

    #[arg(long, default_value_t = 300)]
    pub warmup_steps: usize,

    /// Maximum global gradient L2 norm (0 disables clipping)
    #[arg(long, default_value_t = 1.0)]
    pub grad_clip: f64,

    #[arg(long, default_value_t = 512)]
    pub d_model: usize,

    /// d_model must be divisible by num_heads
    #[arg(long, default_value_t = 16)]
    pub num_heads: usize,

    #[arg(long, default_value_t = 8)]
    pub num_layers: usize,

    /// Inner dimension of the feed-forward network
    #[arg(long, default_value_t = 2048)]
    pub d_ff: usize,

    #[arg(long, default_value_t = 0.1)]
    pub dropout: f64,

    #[arg(long, default_value_t = 10_000)]
    pub vocab_size: usize,

    /// Longest sequence the model can attend over
    #[arg(long, default_value_t = 256)]
    pub max_seq_len: usize,

    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}

/// This is the boundary between Layer 1 and Layer 2:
/// the application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            dataset_path:  a.dataset,
            artifacts_dir: a.artifacts_dir,
            vocab_size:    a.vocab_size,
            max_seq_len:   a.max_seq_len,
            d_model:       a.d_model,
            num_heads:     a.num_heads,
            num_layers:    a.num_layers,
            d_ff:          a.d_ff,
            dropout:       a.dropout,
            batch_size:    a.batch_size,
            accumulation:  a.accumulation,
            lr:            a.lr,
            warmup_steps:  a.warmup_steps,
            grad_clip:     a.grad_clip,
            max_steps:     a.max_steps,
            precision:     a.precision.into(),
            seed:          a.seed,
        }
    }
}

// ─── generate ─────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Directory holding tokenizer.json, train_config.json and the weights
    #[arg(long, default_value = "artifacts")]
    pub artifacts_dir: String,

    #[arg(long, default_value = "The Godfather is a film about")]
    pub prompt: String,

    #[arg(long, default_value_t = 100)]
    pub max_new_tokens: usize,

    /// Probability mass kept by nucleus sampling
    #[arg(long, default_value_t = 0.9)]
    pub top_p: f32,

    /// Divides positive (multiplies negative) scores of ids already generated
    #[arg(long, default_value_t = 1.2)]
    pub frequency_penalty: f32,

    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}

impl From<GenerateArgs> for GenerateConfig {
    fn from(a: GenerateArgs) -> Self {
        GenerateConfig {
            artifacts_dir:     a.artifacts_dir,
            prompt:            a.prompt,
            max_new_tokens:    a.max_new_tokens,
            top_p:             a.top_p,
            frequency_penalty: a.frequency_penalty,
            seed:              a.seed,
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_train_defaults_match_reference_run() {
        let cli = Cli::try_parse_from(["wikitext-gpt", "train"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg = TrainConfig::from(args);
        assert_eq!(cfg, TrainConfig::default());
    }

    #[test]
    fn test_precision_flag() {
        let cli = Cli::try_parse_from(["wikitext-gpt", "train", "--precision", "full", "--max-steps", "10"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg = TrainConfig::from(args);
        assert_eq!(cfg.precision, Precision::Full);
        assert_eq!(cfg.max_steps, Some(10));
    }

    #[test]
    fn test_generate_and_build_defaults() {
        let cli = Cli::try_parse_from(["wikitext-gpt", "generate"]).unwrap();
        let Commands::Generate(args) = cli.command else { panic!("expected generate") };
        assert_eq!(GenerateConfig::from(args), GenerateConfig::default());

        let cli = Cli::try_parse_from(["wikitext-gpt", "build-dataset", "--window", "128"]).unwrap();
        let Commands::BuildDataset(args) = cli.command else { panic!("expected build-dataset") };
        let cfg = BuildConfig::from(args);
        assert_eq!(cfg.window, 128);
        assert_eq!(cfg.corpus_path, "data.txt");
    }
}
