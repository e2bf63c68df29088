// ============================================================
// Layer 1: CLI / Presentation Layer
// ============================================================
// Parses command line arguments with clap and dispatches to the
// matching Layer 2 use case. Results are printed here and only
// here.
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{BuildDatasetArgs, Commands, GenerateArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "wikitext-gpt",
    version,
    about = "Pack a text corpus, train a GPT-style language model, and generate text from it."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// This keeps the CLI layer thin: it only routes, never computes.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::BuildDataset(args) => run_build_dataset(args),
            Commands::Train(args)        => run_train(args),
            Commands::Generate(args)     => run_generate(args),
        }
    }
}

fn run_build_dataset(args: BuildDatasetArgs) -> Result<()> {
    use crate::application::build_dataset_use_case::BuildDatasetUseCase;

    tracing::info!("Building dataset from '{}'", args.corpus);
    let output  = args.output.clone();
    let dataset = BuildDatasetUseCase::new(args.into()).execute()?;

    println!(
        "Dataset [{}, {}] written to '{}'",
        dataset.rows(),
        dataset.width(),
        output
    );
    Ok(())
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on '{}'", args.dataset);
    let artifacts = args.artifacts_dir.clone();
    let summary   = TrainUseCase::new(args.into()).execute()?;

    println!(
        "Training complete: {} steps, {} tokens, final loss {}. Weights saved in '{}'.",
        summary.steps,
        summary.tokens_seen,
        summary.final_loss.map_or("-".to_string(), |l| format!("{l:.4}")),
        artifacts
    );
    Ok(())
}

fn run_generate(args: GenerateArgs) -> Result<()> {
    use crate::application::generate_use_case::GenerateUseCase;

    let output = GenerateUseCase::new(args.into()).execute()?;

    println!("{:?}", output.ids);
    println!("\n{}", output.text);
    Ok(())
}
