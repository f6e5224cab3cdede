use std::collections::HashMap;

use crate::{
  scalar::Real,
  tensor::Tensor,
  variable::Variable,
  ops::RealOps,
};


/// An optimization strategy to be used with [Optimizer].
///
/// Stateful strategies keep one or more slot tensors per parameter,
/// which can be read with [slots](Strategy::slots) and put back with
/// [restore](Strategy::restore) in the same order.

pub trait Strategy<R: Real> {
  const NAME: &'static str;

  fn update(&mut self, param: &Variable<R>, rate: R, step: usize) -> Tensor<R>;
  fn slots(&self, param: &Variable<R>) -> Vec<Tensor<R>>;
  fn restore(&mut self, param: &Variable<R>, slots: Vec<Tensor<R>>);
}


/// Generic optimizer that allows for several optimization [strategies](Strategy) to be used.

#[derive(Debug)]
pub struct Optimizer<R: Real, S: Strategy<R>> {
  pub strategy: S,
  pub learning_rate: R,
  step: usize,
}

impl<R: Real, S: Strategy<R>> Optimizer<R, S> {
  pub fn new(learning_rate: R, strategy: S) -> Self {
    Self { strategy, learning_rate, step: 1 }
  }

  /// Number of the next update, starting at one.

  pub fn step(&self) -> usize {
    self.step
  }

  pub fn set_step(&mut self, step: usize) {
    self.step = step;
  }

  pub fn minimize(&mut self, loss: &Variable<R>, params: &[Variable<R>]) {
    // Compute gradients
    loss.backward();

    // Optimize individual parameters
    for param in params {
      assert!(param.grad().is_some(), "Non-trainable parameters cannot be optimized");

      // Execute strategy
      let change = self.strategy.update(param, self.learning_rate, self.step);

      // Apply change
      let weights = param.tensor();
      weights.assign(&(weights + change));
    }

    // Reset gradients
    loss.reset();

    self.step += 1;
  }
}


/// Stochastic Gradient Descent strategy

#[derive(Debug, Clone, Default)]
pub struct SGD;

impl<R: Real> Strategy<R> for SGD {
  const NAME: &'static str = "sgd";

  fn update(&mut self, param: &Variable<R>, rate: R, _step: usize) -> Tensor<R> {
    gradient(param) * -rate
  }

  fn slots(&self, _param: &Variable<R>) -> Vec<Tensor<R>> {
    vec![]
  }

  fn restore(&mut self, _param: &Variable<R>, _slots: Vec<Tensor<R>>) {}
}


/// Stochastic Gradient Descent with momentum

#[derive(Debug, Clone)]
pub struct Momentum<R: Real> {
  pub momentum: R,
  v: HashMap<usize, Tensor<R>>,
}

impl<R: Real> Momentum<R> {
  pub fn new(momentum: R) -> Self {
    Self {
      momentum,
      v: HashMap::new(),
    }
  }
}

impl<R: Real> Default for Momentum<R> {
  fn default() -> Self {
    Self::new(R::from(0.9).unwrap())
  }
}

impl<R: Real> Strategy<R> for Momentum<R> {
  const NAME: &'static str = "momentum";

  fn update(&mut self, param: &Variable<R>, rate: R, _step: usize) -> Tensor<R> {
    let grad = gradient(param);
    let v = self.v
      .entry(param.id())
      .or_insert_with(|| Tensor::zeros(param.dims()) );
    v.assign(&(&*v * self.momentum - grad * rate));
    v.clone()
  }

  fn slots(&self, param: &Variable<R>) -> Vec<Tensor<R>> {
    self.v.get(&param.id()).cloned().into_iter().collect()
  }

  fn restore(&mut self, param: &Variable<R>, slots: Vec<Tensor<R>>) {
    if let Some(v) = slots.into_iter().next() {
      self.v.insert(param.id(), v);
    }
  }
}


/// Adaptive Movement Estimation strategy (ADAM)
///
/// `epsilon` is added to the bias-corrected `sqrt(v̂)`, as in the
/// paper's algorithm, rather than to the uncorrected `sqrt(v)`.

#[derive(Debug, Clone)]
pub struct Adam<R: Real> {
  pub beta1: R,
  pub beta2: R,
  pub epsilon: R,
  m: HashMap<usize, Tensor<R>>,
  v: HashMap<usize, Tensor<R>>,
}

impl<R: Real> Adam<R> {
  pub fn new(beta1: R, beta2: R, epsilon: R) -> Self {
    Self {
      beta1,
      beta2,
      epsilon,
      m: HashMap::new(),
      v: HashMap::new(),
    }
  }
}

impl<R: Real> Default for Adam<R> {
  fn default() -> Self {
    Self::new(R::from(0.9).unwrap(), R::from(0.999).unwrap(), R::from(1e-8).unwrap())
  }
}

impl<R: Real> Strategy<R> for Adam<R> {
  const NAME: &'static str = "adam";

  fn update(&mut self, param: &Variable<R>, rate: R, step: usize) -> Tensor<R> {
    let id = param.id();
    let grad = gradient(param);
    if !self.m.contains_key(&id) {
      self.m.insert(id, Tensor::zeros(param.dims()));
      self.v.insert(id, Tensor::zeros(param.dims()));
    }
    let m = &self.m[&id];
    let v = &self.v[&id];
    m.assign(&(m * self.beta1 + &grad         * (R::one() - self.beta1)));
    v.assign(&(v * self.beta2 + &grad * &grad * (R::one() - self.beta2)));
    let step = R::from(step).unwrap();
    let mt = m / (R::one() - self.beta1.powf(step));
    let vt = v / (R::one() - self.beta2.powf(step));
    mt * -rate / (vt.sqrt() + self.epsilon)
  }

  fn slots(&self, param: &Variable<R>) -> Vec<Tensor<R>> {
    let id = param.id();
    match (self.m.get(&id), self.v.get(&id)) {
      (Some(m), Some(v)) => vec![m.clone(), v.clone()],
      _ => vec![],
    }
  }

  fn restore(&mut self, param: &Variable<R>, slots: Vec<Tensor<R>>) {
    if let [m, v] = &slots[..] {
      self.m.insert(param.id(), m.clone());
      self.v.insert(param.id(), v.clone());
    }
  }
}


fn gradient<R: Real>(param: &Variable<R>) -> Tensor<R> {
  match param.grad() {
    Some(grad) => grad.clone(),
    None => panic!("Non-trainable parameters cannot be optimized"),
  }
}
