use std::fs;

use rand::{ SeedableRng, rngs::StdRng, seq::SliceRandom };
use tracing::{ info, debug };

use crate::{
  config::TrainingConfig,
  mnist::{ self, Mnist, NUM_CLASSES },
  model::{ Classifier, MnistMlp },
  optimize::{ Optimizer, Adam },
  serialize::{ save_model, load_model, save_optimizer, load_optimizer },
  Variable, Module, Error, Result,
};


/// Mean loss and accuracy over a dataset split.

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Stats {
  pub mean_loss: f32,
  pub accuracy: f32,
}

impl Stats {
  fn from_sums(sum_loss: f32, sum_accuracy: f32, n: usize) -> Self {
    if n == 0 { return Self::default() }
    let n = n as f32;
    Self { mean_loss: sum_loss / n, accuracy: sum_accuracy / n }
  }
}


#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochReport {
  pub epoch: usize,
  pub train: Stats,
  pub test: Stats,
}


/// Minibatch training of an [MnistMlp] classifier with Adam.

#[derive(Debug)]
pub struct Trainer {
  config: TrainingConfig,
  train: Mnist,
  test: Mnist,
  model: Classifier<MnistMlp<f32>>,
  params: Vec<Variable<f32>>,
  optimizer: Optimizer<f32, Adam<f32>>,
  rng: StdRng,
  epoch: usize,
}

impl Trainer {
  /// Load the dataset from the configured directory and set up a fresh model.

  pub fn new(config: TrainingConfig) -> Result<Self> {
    info!("load MNIST dataset");
    let data = mnist::load_mnist_data(&config.data_dir)?;
    Self::with_data(config, data)
  }

  /// Set up a model for `data`, whose first `train_size` examples are
  /// used for training and the rest for testing.

  pub fn with_data(config: TrainingConfig, data: Mnist) -> Result<Self> {
    if config.batch_size == 0 {
      return Err(Error::InvalidConfig("batch size must be positive".to_string()))
    }
    if config.train_size > data.len() {
      return Err(Error::InvalidConfig(
        format!("training size {} exceeds {} examples", config.train_size, data.len())))
    }
    fs::create_dir_all(&config.out_dir)?;
    let (train, test) = data.split(config.train_size);
    info!("{} training and {} test examples", train.len(), test.len());

    let mut rng = match config.seed {
      Some(seed) => StdRng::seed_from_u64(seed),
      None => StdRng::from_entropy(),
    };
    let predictor = MnistMlp::new(data.pixels(), config.units, NUM_CLASSES, &mut rng);
    let model = Classifier::new(predictor, NUM_CLASSES);
    let params = model.parameters().into_iter().map(|(_, param)| param ).collect();
    let optimizer = Optimizer::new(config.learning_rate, Adam::default());

    let mut trainer = Self { config, train, test, model, params, optimizer, rng, epoch: 0 };

    if let Some(path) = &trainer.config.init_model {
      info!("load model from {}", path.display());
      load_model(path, &trainer.model)?;
    }
    if let Some(path) = &trainer.config.resume {
      info!("load optimizer state from {}", path.display());
      load_optimizer(path, &mut trainer.optimizer, &trainer.model.parameters())?;
    }

    Ok(trainer)
  }

  pub fn config(&self) -> &TrainingConfig {
    &self.config
  }

  pub fn model(&self) -> &Classifier<MnistMlp<f32>> {
    &self.model
  }

  pub fn optimizer(&self) -> &Optimizer<f32, Adam<f32>> {
    &self.optimizer
  }

  /// Run all configured epochs, then save model, optimizer and configuration.

  pub fn run(&mut self) -> Result<Vec<EpochReport>> {
    let mut reports = Vec::with_capacity(self.config.epochs);
    for _ in 0..self.config.epochs {
      let train = self.train_epoch()?;
      let test = self.evaluate();
      reports.push(EpochReport { epoch: self.epoch, train, test });
    }
    self.save()?;
    Ok(reports)
  }

  /// One pass over the shuffled training split with an update per minibatch.

  pub fn train_epoch(&mut self) -> Result<Stats> {
    self.epoch += 1;
    info!("epoch {}", self.epoch);

    let mut perm: Vec<usize> = (0..self.train.len()).collect();
    perm.shuffle(&mut self.rng);

    let mut sum_loss = 0.0;
    let mut sum_accuracy = 0.0;
    for (i, indices) in perm.chunks(self.config.batch_size).enumerate() {
      let batch = self.train.batch(indices);
      let output = self.model.loss(&batch.images, &batch.labels);
      self.optimizer.minimize(&output.loss, &self.params);

      if self.epoch == 1 && i == 0 && self.config.dump_graph {
        output.loss.write_dot(self.config.graph_path())?;
        info!("graph generated");
        debug!("{:?}", output.loss.statistics());
      }

      let len = batch.len() as f32;
      sum_loss += output.loss.item() * len;
      sum_accuracy += output.accuracy * len;
    }

    let stats = Stats::from_sums(sum_loss, sum_accuracy, self.train.len());
    info!("train mean loss={}, accuracy={}", stats.mean_loss, stats.accuracy);
    Ok(stats)
  }

  /// Loss and accuracy on the test split, in order and without updates.

  pub fn evaluate(&self) -> Stats {
    let model = self.model.frozen();
    let mut sum_loss = 0.0;
    let mut sum_accuracy = 0.0;
    let indices: Vec<usize> = (0..self.test.len()).collect();
    for indices in indices.chunks(self.config.batch_size) {
      let batch = self.test.batch(indices);
      let output = model.loss(&batch.images, &batch.labels);
      let len = batch.len() as f32;
      sum_loss += output.loss.item() * len;
      sum_accuracy += output.accuracy * len;
    }

    let stats = Stats::from_sums(sum_loss, sum_accuracy, self.test.len());
    info!("test  mean loss={}, accuracy={}", stats.mean_loss, stats.accuracy);
    stats
  }

  /// Write `mlp.model`, `mlp.state` and `train_config.json` to the output directory.

  pub fn save(&self) -> Result<()> {
    info!("save the model");
    save_model(self.config.model_path(), &self.model)?;
    info!("save the optimizer");
    save_optimizer(self.config.state_path(), &self.optimizer, &self.model.parameters())?;
    self.config.save(self.config.config_path())
  }
}
