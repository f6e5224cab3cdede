use std::fs;
use std::path::{ Path, PathBuf };

use serde::{ Serialize, Deserialize };

use crate::{ mnist::NUM_TRAIN, Result };


pub const MODEL_FILE: &str = "mlp.model";
pub const STATE_FILE: &str = "mlp.state";
pub const GRAPH_FILE: &str = "graph.dot";
pub const CONFIG_FILE: &str = "train_config.json";


/// Hyperparameters and file locations of a training run.
///
/// Saved as JSON next to the model so a run can be reproduced.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
  pub data_dir: PathBuf,
  pub out_dir: PathBuf,
  pub batch_size: usize,
  pub epochs: usize,
  pub units: usize,
  /// Number of leading examples used for training, the rest is for testing.
  pub train_size: usize,
  pub learning_rate: f32,
  pub seed: Option<u64>,
  pub init_model: Option<PathBuf>,
  pub resume: Option<PathBuf>,
  pub dump_graph: bool,
}

impl Default for TrainingConfig {
  fn default() -> Self {
    Self {
      data_dir: PathBuf::from("./data"),
      out_dir: PathBuf::from("."),
      batch_size: 100,
      epochs: 20,
      units: 1000,
      train_size: NUM_TRAIN,
      learning_rate: 0.001,
      seed: None,
      init_model: None,
      resume: None,
      dump_graph: true,
    }
  }
}

impl TrainingConfig {
  pub fn model_path(&self) -> PathBuf {
    self.out_dir.join(MODEL_FILE)
  }

  pub fn state_path(&self) -> PathBuf {
    self.out_dir.join(STATE_FILE)
  }

  pub fn graph_path(&self) -> PathBuf {
    self.out_dir.join(GRAPH_FILE)
  }

  pub fn config_path(&self) -> PathBuf {
    self.out_dir.join(CONFIG_FILE)
  }

  pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
    fs::write(path, serde_json::to_string_pretty(self)?)?;
    Ok(())
  }

  pub fn load(path: impl AsRef<Path>) -> Result<Self> {
    let json = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults() {
    let config = TrainingConfig::default();
    assert_eq!(config.batch_size, 100);
    assert_eq!(config.epochs, 20);
    assert_eq!(config.units, 1000);
    assert_eq!(config.model_path(), PathBuf::from("./mlp.model"));
    assert_eq!(config.state_path(), PathBuf::from("./mlp.state"));
  }

  #[test]
  fn json_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let config = TrainingConfig {
      seed: Some(7),
      resume: Some(PathBuf::from("old.state")),
      ..TrainingConfig::default()
    };
    let path = dir.path().join(CONFIG_FILE);
    config.save(&path).unwrap();
    assert_eq!(TrainingConfig::load(&path).unwrap(), config);
  }
}
