use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use digitnet::{ config::TrainingConfig, train::Trainer };


/// Train a multi-layer perceptron on MNIST
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
  /// Directory holding the four MNIST IDX files, plain or gzipped
  #[arg(long, default_value = "./data")]
  data: PathBuf,

  /// Directory for mlp.model, mlp.state, graph.dot and train_config.json
  #[arg(long, default_value = ".")]
  out: PathBuf,

  /// Number of passes over the training split
  #[arg(long, default_value_t = 20)]
  epochs: usize,

  /// Number of examples per minibatch
  #[arg(long, default_value_t = 100)]
  batchsize: usize,

  /// Number of units in each hidden layer
  #[arg(long, default_value_t = 1000)]
  unit: usize,

  /// Adam step size
  #[arg(long, default_value_t = 0.001)]
  alpha: f32,

  /// Seed for weight initialisation and shuffling
  #[arg(long)]
  seed: Option<u64>,

  /// Initialize the model from a saved mlp.model file
  #[arg(long)]
  initmodel: Option<PathBuf>,

  /// Resume the optimizer from a saved mlp.state file
  #[arg(long)]
  resume: Option<PathBuf>,

  /// Number of leading examples used for training
  #[arg(long, default_value_t = 60_000)]
  train_size: usize,

  /// Skip writing graph.dot
  #[arg(long)]
  no_graph: bool,
}

impl From<Args> for TrainingConfig {
  fn from(args: Args) -> Self {
    Self {
      data_dir: args.data,
      out_dir: args.out,
      batch_size: args.batchsize,
      epochs: args.epochs,
      units: args.unit,
      train_size: args.train_size,
      learning_rate: args.alpha,
      seed: args.seed,
      init_model: args.initmodel,
      resume: args.resume,
      dump_graph: !args.no_graph,
    }
  }
}


fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("digitnet=info")),
    )
    .init();

  let now = Instant::now();
  let config: TrainingConfig = Args::parse().into();
  let data_dir = config.data_dir.clone();

  let mut trainer = Trainer::new(config)
    .with_context(|| format!("failed to prepare training with data from {}", data_dir.display()))?;
  let reports = trainer.run().context("training failed")?;

  if let Some(last) = reports.last() {
    info!(
      "finished {} epochs in {:0.2}s, test accuracy={}",
      last.epoch,
      now.elapsed().as_secs_f32(),
      last.test.accuracy,
    );
  }
  Ok(())
}


#[cfg(test)]
mod tests {
  use super::*;
  use clap::CommandFactory;

  #[test]
  fn arguments() {
    Args::command().debug_assert();
  }

  #[test]
  fn defaults_match_config() {
    let config: TrainingConfig = Args::try_parse_from(["digitnet"]).unwrap().into();
    assert_eq!(config, TrainingConfig::default());
  }

  #[test]
  fn options_map_onto_config() {
    let args = Args::try_parse_from([
      "digitnet",
      "--data", "mnist", "--out", "runs",
      "--epochs", "3", "--batchsize", "32", "--unit", "50", "--alpha", "0.01",
      "--seed", "4", "--initmodel", "old.model", "--resume", "old.state",
      "--train-size", "1000", "--no-graph",
    ]).unwrap();
    let config = TrainingConfig::from(args);
    assert_eq!(config, TrainingConfig {
      data_dir: PathBuf::from("mnist"),
      out_dir: PathBuf::from("runs"),
      batch_size: 32,
      epochs: 3,
      units: 50,
      train_size: 1000,
      learning_rate: 0.01,
      seed: Some(4),
      init_model: Some(PathBuf::from("old.model")),
      resume: Some(PathBuf::from("old.state")),
      dump_graph: false,
    });
  }

  #[test]
  fn rejects_bad_numbers() {
    assert!(Args::try_parse_from(["digitnet", "--batchsize", "-1"]).is_err());
    assert!(Args::try_parse_from(["digitnet", "--alpha", "fast"]).is_err());
  }
}
