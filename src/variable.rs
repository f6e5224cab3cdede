use std::collections::HashSet;
use std::sync::atomic::{ AtomicUsize, Ordering };
use std::fmt::Debug;

mod mops;
mod graph;
mod layer;

pub use layer::{ Module, Linear };

use crate::{
  internal::*,
  tensor::Tensor,
  scalar::Real,
  ops::{ BaseOps, NumericOps, Hops },
};


pub fn make_id() -> usize {
  static LAST_ID: AtomicUsize = AtomicUsize::new(0);
  LAST_ID.fetch_add(1, Ordering::Relaxed)
}


/// Differentiable operation on a single input.

pub trait UnaryOp<T: Real>: Debug {
  /// Label used when rendering the graph.
  fn name(&self) -> &'static str;
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T>;
  /// Gradient with respect to the input, given the output's gradient.
  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T>;
}


/// Differentiable operation on two inputs.

pub trait BinaryOp<T: Real>: Debug {
  fn name(&self) -> &'static str;
  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T>;
  fn derive(&self, lhs: &Tensor<T>, rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>);
}


#[derive(Debug)]
enum Op<T: Real> {
  Unary(Box<dyn UnaryOp<T>>),
  Binary(Box<dyn BinaryOp<T>>),
}


/// The operation that computed a node, together with its inputs.

#[derive(Debug)]
struct Origin<T: Real> {
  op: Op<T>,
  inputs: Vec<RcT<Node<T>>>,
}

impl<T: Real> Origin<T> {
  fn name(&self) -> &'static str {
    match &self.op {
      Op::Unary(op) => op.name(),
      Op::Binary(op) => op.name(),
    }
  }

  // Gradient contributions for each input
  fn derive(&self, grad: &Tensor<T>) -> Vec<Tensor<T>> {
    let lhs = &self.inputs[0].data;
    match &self.op {
      Op::Unary(op) => vec![op.derive(lhs, grad)],
      Op::Binary(op) => {
        let (dl, dr) = op.derive(lhs, &self.inputs[1].data, grad);
        vec![dl, dr]
      },
    }
  }
}


#[derive(Debug)]
struct Node<T: Real> {
  id: usize,
  data: Tensor<T>,
  grad: Option<Tensor<T>>,
  origin: Option<Origin<T>>,
  trainable: bool,
}

impl<T: Real> Node<T> {
  fn inputs(&self) -> &[RcT<Self>] {
    self.origin.as_ref().map_or(&[][..], |origin| origin.inputs.as_slice() )
  }

  fn fill_grad(&self, value: T) {
    if let Some(grad) = &self.grad {
      grad.refill(value);
    }
  }

  // Hand this node's gradient on to the inputs that take one
  fn propagate(&self) {
    let (Some(origin), Some(grad)) = (&self.origin, &self.grad) else { return };
    for (change, input) in origin.derive(grad).iter().zip(&origin.inputs) {
      if let Some(input_grad) = &input.grad {
        input_grad.assign(&(input_grad + change));
      }
    }
  }
}


/// Value in a computation graph.
///
/// Variables remember the operation and inputs they were computed from,
/// so gradients can flow back from a loss to every trainable parameter.
/// Create them from a [Tensor] with [trained](Tensor::trained) for
/// parameters or [tracked](Tensor::tracked) for data.
///
/// A Variable dereferences to its [Tensor], so all non-differentiable
/// tensor methods are available too.

#[derive(Debug, Clone)]
pub struct Variable<T: Real> {
  node: RcT<Node<T>>,
}


/// Size of a Variable's computation graph.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphStats {
  pub nodes: usize,
  pub operations: usize,
  pub gradients: usize,
  pub parameters: usize,
  /// Scalars held by all trainable parameters.
  pub weights: usize,
}


impl<T: Real> Hops<T> for Variable<T> {}

impl<T: Real> std::ops::Deref for Variable<T> {
  type Target = Tensor<T>;

  fn deref(&self) -> &Self::Target {
    &self.node.data
  }
}

impl<T: Real> PartialEq for Variable<T> {
  fn eq(&self, rhs: &Self) -> bool {
    self.node.data == rhs.node.data
  }
}

impl<T: Real> From<T> for Variable<T> {
  fn from(value: T) -> Self {
    Self::scalar(value)
  }
}

impl<T: Real> Variable<T> {
  pub(crate) fn from_tensor(data: Tensor<T>, trainable: bool) -> Self {
    let grad = trainable.then(|| Tensor::zeros(data.dims()) );
    Self::from_node(Node { id: make_id(), data, grad, origin: None, trainable })
  }

  fn from_node(node: Node<T>) -> Self {
    Self { node: RcT::new(node) }
  }

  fn computed(op: Op<T>, data: Tensor<T>, inputs: &[&Self]) -> Self {
    // Only track gradients where some input wants one
    let grad = inputs.iter()
      .any(|input| input.node.grad.is_some() )
      .then(|| Tensor::zeros(data.dims()) );
    let inputs = inputs.iter().map(|input| input.node.clone() ).collect();
    Self::from_node(Node {
      id: make_id(),
      data,
      grad,
      origin: Some(Origin { op, inputs }),
      trainable: false,
    })
  }

  pub fn unary_op(&self, op: impl UnaryOp<T> + 'static) -> Self {
    let data = op.run(&self.node.data);
    Self::computed(Op::Unary(Box::new(op)), data, &[self])
  }

  pub fn binary_op(&self, op: impl BinaryOp<T> + 'static, rhs: &Self) -> Self {
    let data = op.run(&self.node.data, &rhs.node.data);
    Self::computed(Op::Binary(Box::new(op)), data, &[self, rhs])
  }

  pub fn id(&self) -> usize {
    self.node.id
  }

  pub fn tensor(&self) -> &Tensor<T> {
    &self.node.data
  }

  pub fn grad(&self) -> Option<&Tensor<T>> {
    self.node.grad.as_ref()
  }

  pub fn is_trainable(&self) -> bool {
    self.node.trainable
  }

  /// Constant Variable sharing this one's storage.
  ///
  /// Operations on it record no gradients, while later updates
  /// to this Variable's values still show through.

  pub fn frozen(&self) -> Self {
    Self::from_tensor(self.node.data.clone(), false)
  }

  /// Name of the operation that produced this Variable, if any.

  pub fn op_name(&self) -> Option<&'static str> {
    self.node.origin.as_ref().map(|origin| origin.name() )
  }

  /// Inputs of the operation that produced this Variable.

  pub fn previous(&self) -> Vec<Self> {
    self.node.inputs()
      .iter()
      .map(|node| Self { node: node.clone() } )
      .collect()
  }

  /// Back-propagate from this Variable, seeding its own gradient with ones.
  ///
  /// Gradients add up with whatever is stored already, so call
  /// [reset](Self::reset) between independent passes.

  pub fn backward(&self) {
    if self.node.grad.is_none() { panic!("Cannot compute gradients for constant {self}") }
    self.node.fill_grad(T::one());
    for node in self.history().iter().rev() {
      node.propagate();
    }
  }

  /// Trainable Variables this one was computed from.

  pub fn parameters(&self) -> Vec<Self> {
    self.history()
      .into_iter()
      .filter(|node| node.trainable )
      .map(|node| Self { node } )
      .collect()
  }

  /// Zero all gradients in this Variable's graph.

  pub fn reset(&self) {
    for node in self.history() {
      node.fill_grad(T::zero());
    }
  }

  // Every node of the graph once, each listed after all of its inputs
  fn history(&self) -> Vec<RcT<Node<T>>> {
    let mut order = vec![];
    let mut visited = HashSet::new();
    let mut stack = vec![(self.node.clone(), false)];
    while let Some((node, expanded)) = stack.pop() {
      if expanded {
        order.push(node);
      } else if visited.insert(node.id) {
        stack.push((node.clone(), true));
        for input in node.inputs().iter().rev() {
          if !visited.contains(&input.id) {
            stack.push((input.clone(), false));
          }
        }
      }
    }
    order
  }

  /// Mean absolute difference between the derived gradient of
  /// `generator` and central differences, at a random input of `shape`.

  pub fn check_gradients<F>(shape: &[usize], generator: F) -> T
  where
    F: Fn(&Self) -> Self
  {
    let eps = T::from(0.01).unwrap();
    let input = Tensor::randn(shape);
    let var = input.trained();
    generator(&var).sum(0).backward();
    let derived = var.grad().unwrap().detach();

    let values = input.to_vec();
    let evaluate = |i: usize, delta: T| {
      let mut shifted = values.clone();
      shifted[i] = shifted[i] + delta;
      generator(&Tensor::new(shape, shifted).tracked()).sum(0).item()
    };
    let numeric = (0..values.len())
      .map(|i| (evaluate(i, eps) - evaluate(i, -eps)) / (eps + eps) )
      .collect();

    (derived - Tensor::new(shape, numeric)).abs().mean(0).item()
  }

  pub fn statistics(&self) -> GraphStats {
    let history = self.history();
    let params = self.parameters();
    GraphStats {
      nodes: history.len(),
      operations: history.iter().filter(|node| node.origin.is_some() ).count(),
      gradients: history.iter().filter(|node| node.grad.is_some() ).count(),
      parameters: params.len(),
      weights: params.iter().map(|param| param.size() ).sum(),
    }
  }

  pub fn tracked(&self) -> Self { panic!("Tensor is already being tracked") }
  pub fn trained(&self) -> Self { panic!("Tensor is already being tracked") }
}

impl<T: Real> std::fmt::Display for Variable<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    let kind = match (self.node.trainable, &self.node.grad) {
      (true, _) => "Trainable",
      (false, Some(_)) => "Computed",
      (false, None) => "Tracked",
    };
    write!(f, "{kind} {}", self.tensor())
  }
}
