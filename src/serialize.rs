//! Persist model parameters and optimizer state as postcard files.

use std::fs;
use std::path::Path;

use serde::{ Serialize, Deserialize };
use tracing::debug;

use crate::{
  scalar::Real,
  optimize::{ Optimizer, Strategy },
  Tensor, Variable, Module, Error, Result,
};


#[derive(Debug, Serialize, Deserialize)]
#[serde(bound(serialize = "R: Real", deserialize = "R: Real"))]
struct ParameterRecord<R: Real> {
  name: String,
  tensor: Tensor<R>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(bound(serialize = "R: Real", deserialize = "R: Real"))]
struct ModelRecord<R: Real> {
  dtype: String,
  parameters: Vec<ParameterRecord<R>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(bound(serialize = "R: Real", deserialize = "R: Real"))]
struct SlotRecord<R: Real> {
  name: String,
  tensors: Vec<Tensor<R>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(bound(serialize = "R: Real", deserialize = "R: Real"))]
struct OptimizerRecord<R: Real> {
  strategy: String,
  step: usize,
  slots: Vec<SlotRecord<R>>,
}


/// Write all named parameters of `module` to `path`.

pub fn save_model<R: Real, M: Module<R>>(path: impl AsRef<Path>, module: &M) -> Result<()> {
  let record = ModelRecord {
    dtype: R::NAME.to_string(),
    parameters: module.parameters()
      .into_iter()
      .map(|(name, param)| ParameterRecord { name, tensor: param.detach() } )
      .collect(),
  };
  write(path.as_ref(), &record)
}

/// Overwrite the parameters of `module` with those stored at `path`.
///
/// Names and shapes need to match the module's exactly.

pub fn load_model<R: Real, M: Module<R>>(path: impl AsRef<Path>, module: &M) -> Result<()> {
  let record: ModelRecord<R> = read(path.as_ref())?;
  if record.dtype != R::NAME {
    return Err(Error::ParameterMismatch(format!("stored {} parameters, expected {}", record.dtype, R::NAME)))
  }
  let params = module.parameters();
  if params.len() != record.parameters.len() {
    return Err(Error::ParameterMismatch(
      format!("stored {} parameters, model has {}", record.parameters.len(), params.len())))
  }
  for ((name, param), stored) in params.iter().zip(&record.parameters) {
    check_parameter(name, param, &stored.name, stored.tensor.dims())?;
  }
  for ((_, param), stored) in params.iter().zip(&record.parameters) {
    param.tensor().assign(&stored.tensor);
  }
  Ok(())
}

/// Write the step and per-parameter slots of `optimizer` to `path`.
///
/// The learning rate is left out, it belongs to the training configuration.

pub fn save_optimizer<R, S>(path: impl AsRef<Path>, optimizer: &Optimizer<R, S>, params: &[(String, Variable<R>)]) -> Result<()>
where
  R: Real,
  S: Strategy<R>,
{
  let record = OptimizerRecord {
    strategy: S::NAME.to_string(),
    step: optimizer.step(),
    slots: params.iter()
      .map(|(name, param)| SlotRecord {
        name: name.clone(),
        tensors: optimizer.strategy.slots(param).iter().map(|slot| slot.detach() ).collect(),
      })
      .collect(),
  };
  write(path.as_ref(), &record)
}

/// Restore state written by [save_optimizer] for the same named parameters.

pub fn load_optimizer<R, S>(path: impl AsRef<Path>, optimizer: &mut Optimizer<R, S>, params: &[(String, Variable<R>)]) -> Result<()>
where
  R: Real,
  S: Strategy<R>,
{
  let record: OptimizerRecord<R> = read(path.as_ref())?;
  if record.strategy != S::NAME {
    return Err(Error::ParameterMismatch(
      format!("stored {} optimizer state, expected {}", record.strategy, S::NAME)))
  }
  if params.len() != record.slots.len() {
    return Err(Error::ParameterMismatch(
      format!("stored state for {} parameters, model has {}", record.slots.len(), params.len())))
  }
  for ((name, param), stored) in params.iter().zip(&record.slots) {
    for slot in &stored.tensors {
      check_parameter(name, param, &stored.name, slot.dims())?;
    }
  }
  for ((_, param), stored) in params.iter().zip(record.slots) {
    optimizer.strategy.restore(param, stored.tensors);
  }
  optimizer.set_step(record.step);
  Ok(())
}

fn check_parameter<R: Real>(name: &str, param: &Variable<R>, stored_name: &str, stored_dims: &[usize]) -> Result<()> {
  if name != stored_name {
    return Err(Error::ParameterMismatch(format!("expected parameter {name}, found {stored_name}")))
  }
  if param.dims() != stored_dims {
    return Err(Error::ParameterMismatch(
      format!("{name} has shape {:?}, stored {:?}", param.dims(), stored_dims)))
  }
  Ok(())
}

fn write<T: Serialize>(path: &Path, record: &T) -> Result<()> {
  let bytes = postcard::to_allocvec(record)?;
  fs::write(path, &bytes)?;
  debug!("wrote {} bytes to {}", bytes.len(), path.display());
  Ok(())
}

fn read<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
  if !path.is_file() {
    return Err(Error::NotFound(path.to_path_buf()))
  }
  let bytes = fs::read(path)?;
  Ok(postcard::from_bytes(&bytes)?)
}


#[cfg(test)]
mod tests {
  use super::*;
  use rand::{ SeedableRng, rngs::StdRng };
  use crate::{
    model::{ Classifier, MnistMlp },
    optimize::{ Adam, SGD },
  };

  fn model(units: usize, seed: u64) -> Classifier<MnistMlp<f32>> {
    Classifier::new(MnistMlp::new(4, units, 3, &mut StdRng::seed_from_u64(seed)), 3)
  }

  #[test]
  fn model_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mlp.model");
    let x = Tensor::randn_with(&[8, 4], &mut StdRng::seed_from_u64(9));
    let source = model(6, 1);
    let target = model(6, 2);
    save_model(&path, &source).unwrap();
    load_model(&path, &target).unwrap();
    for ((_, a), (_, b)) in source.parameters().iter().zip(target.parameters().iter()) {
      assert_eq!(a.tensor(), b.tensor());
    }
    assert_eq!(source.predict(&x), target.predict(&x));
  }

  #[test]
  fn model_shape_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mlp.model");
    save_model(&path, &model(6, 1)).unwrap();
    let result = load_model(&path, &model(5, 1));
    assert!(matches!(result, Err(Error::ParameterMismatch(_))));
  }

  #[test]
  fn missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = load_model(dir.path().join("nothing"), &model(2, 0));
    assert!(matches!(result, Err(Error::NotFound(_))));
  }

  #[test]
  fn corrupt_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mlp.model");
    fs::write(&path, [0xff; 3]).unwrap();
    assert!(matches!(load_model(&path, &model(2, 0)), Err(Error::Serialization(_))));
  }

  #[test]
  fn optimizer_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mlp.state");
    let x = Tensor::randn_with(&[8, 4], &mut StdRng::seed_from_u64(3));
    let t = Tensor::vec(&[0u8, 1, 2, 0, 1, 2, 0, 1]);

    let source = model(6, 1);
    let params = source.parameters();
    let variables: Vec<_> = params.iter().map(|(_, p)| p.clone() ).collect();
    let mut optimizer = Optimizer::new(0.01, Adam::default());
    for _ in 0..2 {
      let output = source.loss(&x, &t);
      optimizer.minimize(&output.loss, &variables);
    }
    save_optimizer(&path, &optimizer, &params).unwrap();

    let target = model(6, 2);
    let target_params = target.parameters();
    let mut restored = Optimizer::new(0.5, Adam::default());
    load_optimizer(&path, &mut restored, &target_params).unwrap();
    assert_eq!(restored.step(), 3);
    assert_eq!(restored.learning_rate, 0.5);
    for ((_, a), (_, b)) in params.iter().zip(&target_params) {
      assert_eq!(optimizer.strategy.slots(a), restored.strategy.slots(b));
    }

    let mut sgd = Optimizer::new(0.01, SGD);
    let result = load_optimizer(&path, &mut sgd, &target_params);
    assert!(matches!(result, Err(Error::ParameterMismatch(_))));
  }
}
