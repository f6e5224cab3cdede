use rand::Rng;

use crate::{
  ops::RealOps,
  scalar::Real,
  Tensor, Variable, Module, Linear,
};


/// Three fully connected layers with ReLU activations in between.

#[derive(Debug, Clone)]
pub struct MnistMlp<R: Real> {
  pub l1: Linear<R>,
  pub l2: Linear<R>,
  pub l3: Linear<R>,
}

impl<R: Real> MnistMlp<R> {
  pub fn new<G: Rng>(inputs: usize, units: usize, outputs: usize, rng: &mut G) -> Self {
    Self {
      l1: Linear::new(inputs, units, rng),
      l2: Linear::new(units, units, rng),
      l3: Linear::new(units, outputs, rng),
    }
  }
}

impl<R: Real> Module<R> for MnistMlp<R> {
  fn forward(&self, input: &Variable<R>) -> Variable<R> {
    let h1 = self.l1.forward(input).relu();
    let h2 = self.l2.forward(&h1).relu();
    self.l3.forward(&h2)
  }

  fn parameters(&self) -> Vec<(String, Variable<R>)> {
    [
      self.l1.scoped_parameters("l1"),
      self.l2.scoped_parameters("l2"),
      self.l3.scoped_parameters("l3"),
    ].concat()
  }

  fn frozen(&self) -> Self {
    Self { l1: self.l1.frozen(), l2: self.l2.frozen(), l3: self.l3.frozen() }
  }
}


/// Loss and accuracy of a single batch.

#[derive(Debug, Clone)]
pub struct Output<R: Real> {
  pub loss: Variable<R>,
  pub accuracy: R,
}


/// Wraps a predictor with softmax cross-entropy loss and accuracy reporting.

#[derive(Debug, Clone)]
pub struct Classifier<P> {
  pub predictor: P,
  classes: usize,
}

impl<P> Classifier<P> {
  pub fn new(predictor: P, classes: usize) -> Self {
    Self { predictor, classes }
  }

  pub fn classes(&self) -> usize {
    self.classes
  }

  /// Compute the loss of `x` against labels `t`, along with the
  /// fraction of labels predicted correctly.

  pub fn loss<R: Real>(&self, x: &Tensor<R>, t: &Tensor<u8>) -> Output<R>
  where
    P: Module<R>,
  {
    let y = self.predictor.forward(&x.tracked());
    let target = t.one_hot(self.classes).tracked();
    let loss = y.softmax_cross_entropy(&target);
    let accuracy = y.argmax::<u8>().accuracy(t);
    Output { loss, accuracy }
  }

  /// Most likely class of every row in `x`.

  pub fn predict<R: Real>(&self, x: &Tensor<R>) -> Tensor<u8>
  where
    P: Module<R>,
  {
    self.predictor.forward(&x.tracked()).argmax()
  }
}

impl<R: Real, P: Module<R>> Module<R> for Classifier<P> {
  fn forward(&self, input: &Variable<R>) -> Variable<R> {
    self.predictor.forward(input)
  }

  fn parameters(&self) -> Vec<(String, Variable<R>)> {
    self.predictor.scoped_parameters("predictor")
  }

  fn frozen(&self) -> Self {
    Self { predictor: self.predictor.frozen(), classes: self.classes }
  }
}
