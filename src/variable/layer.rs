use rand::Rng;

use crate::{ ops::*, scalar::Real, Variable, Tensor };


/// A differentiable building block with named trainable parameters.

pub trait Module<R: Real> {
  fn forward(&self, input: &Variable<R>) -> Variable<R>;

  /// Trainable parameters in a stable order, keyed by a path-like name.
  fn parameters(&self) -> Vec<(String, Variable<R>)>;

  /// Copy sharing this module's weights whose forward pass records no gradients.
  fn frozen(&self) -> Self where Self: Sized;

  /// Parameters of this module with every name prefixed by `scope`.

  fn scoped_parameters(&self, scope: &str) -> Vec<(String, Variable<R>)> {
    self.parameters()
      .into_iter()
      .map(|(name, param)| (format!("{scope}/{name}"), param) )
      .collect()
  }
}


/// Fully connected layer computing `x·W + b`.

#[derive(Debug, Clone)]
pub struct Linear<R: Real> {
  pub weight: Variable<R>,
  pub bias: Variable<R>,
}

impl<R: Real> Linear<R> {
  /// Weights are drawn from `N(0, 1/inputs)`, biases start at zero.

  pub fn new<G: Rng>(inputs: usize, outputs: usize, rng: &mut G) -> Self {
    let scale = R::from(1.0 / inputs as f64).unwrap().sqrt();
    Self {
      weight: (Tensor::randn_with(&[inputs, outputs], rng) * scale).trained(),
      bias: Tensor::zeros(&[outputs]).trained(),
    }
  }

  pub fn inputs(&self) -> usize {
    self.weight.dim(0)
  }

  pub fn outputs(&self) -> usize {
    self.weight.dim(1)
  }
}

impl<R: Real> Module<R> for Linear<R> {
  fn forward(&self, input: &Variable<R>) -> Variable<R> {
    input.mm(&self.weight) + &self.bias
  }

  fn parameters(&self) -> Vec<(String, Variable<R>)> {
    vec![
      ("W".to_string(), self.weight.clone()),
      ("b".to_string(), self.bias.clone()),
    ]
  }

  fn frozen(&self) -> Self {
    Self { weight: self.weight.frozen(), bias: self.bias.frozen() }
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use rand::{ SeedableRng, rngs::StdRng };

  #[test]
  fn linear() {
    let layer = Linear::<f64>::new(3, 2, &mut StdRng::seed_from_u64(1));
    assert_eq!(layer.inputs(), 3);
    assert_eq!(layer.outputs(), 2);
    assert_eq!(layer.bias.tensor(), &Tensor::zeros(&[2]));
    let y = layer.forward(&Tensor::zeros(&[4,3]).tracked());
    assert_eq!(y.dims(), &[4,2]);
    assert_eq!(y.tensor(), &Tensor::zeros(&[4,2]));
  }

  #[test]
  fn gradient_reaches_parameters() {
    let layer = Linear::<f64>::new(2, 2, &mut StdRng::seed_from_u64(2));
    let y = layer.forward(&Tensor::ones(&[3,2]).tracked()).sum(0);
    y.backward();
    assert_eq!(layer.bias.grad(), Some(&Tensor::vec(&[3.0, 3.0])));
    assert_eq!(layer.weight.grad(), Some(&Tensor::fill(&[2,2], 3.0)));
  }

  #[test]
  fn frozen_layer() {
    let layer = Linear::<f64>::new(2, 3, &mut StdRng::seed_from_u64(4));
    let x = Tensor::ones(&[1,2]).tracked();
    let y = layer.frozen().forward(&x);
    assert_eq!(y, layer.forward(&x));
    assert!(y.grad().is_none());
  }

  #[test]
  fn scoped_names() {
    let layer = Linear::<f32>::new(2, 2, &mut StdRng::seed_from_u64(3));
    let names: Vec<_> = layer.scoped_parameters("l1").into_iter().map(|(name, _)| name ).collect();
    assert_eq!(names, vec!["l1/W", "l1/b"]);
  }
}
