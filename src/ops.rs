use crate::internal::*;
use crate::Shape;
use crate::scalar::{ Inner, Numeric, Real };


/// Low-level compute operations.

pub trait Cops<I: Numeric> {
  fn matmul(&self, rhs: &Self) -> Vec<I>;
}


/// Differentiable mid-level operations that are also implemented
/// for non-differentiable [Inner] types.

pub trait BaseOps<I: Inner>: Clone {
  fn scalar(item: I) -> Self;
  fn shape(&self) -> &Shape;
  fn broadcast(&self, shape: &Shape) -> Self;
  fn reshape(&self, dims: &[usize]) -> Self;
  fn transpose(&self, dim1: isize, dim2: isize) -> Self;

  fn dim(&self, dim: isize) -> usize {
    self.shape()[dim]
  }

  fn rank(&self) -> usize {
    self.shape().rank()
  }
}


/// Differentiable mid-level operations that are also implemented
/// for non-differentiable [Numeric] inner types.
///
/// Reductions collapse every dimension from `dim` to the last one.

pub trait NumericOps<I: Numeric>: Sized {
  fn sum(&self, dim: isize) -> Self;
}


/// Differentiable mid-level operations.

pub trait RealOps<I: Real>: Sized {
  fn mm(&self, rhs: &Self) -> Self;
  fn exp(&self) -> Self;
  fn log(&self) -> Self;
  fn sqrt(&self) -> Self;
  fn relu(&self) -> Self;
  fn sigmoid(&self) -> Self;

  /// Mean softmax cross-entropy of `[batch, classes]` logits
  /// against one-hot targets of the same shape.
  fn softmax_cross_entropy(&self, target: &Self) -> Self;
}


/// High-level operations, implemented exclusively on top of
/// mid-level ops. As a result, these are all
/// differentiable when called on a [Variable](crate::Variable).

pub trait Hops<I>: BaseOps<I> + NumericOps<I> + RealOps<I> + std::ops::Div<I, Output = Self>
where
  I: Real,
  for<'a> &'a Self: std::ops::Mul<&'a Self, Output = Self> + std::ops::Sub<&'a Self, Output = Self>,
{
  fn sqr(&self) -> Self {
    self * self
  }

  fn mean(&self, dim: isize) -> Self {
    let udim = negative_index(dim, self.shape().rank(), false);
    let n: usize = self.shape().dims[udim..].iter().product();
    let n = I::from(n).unwrap();
    self.sum(dim) / n
  }

  fn mse(&self, rhs: &Self) -> Self {
    (self - rhs).sqr().mean(0)
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::Tensor;

  #[test]
  fn mean() {
    let a = Tensor::new(&[3,2], vec![1., 2., 3., 4., 5., 6.]).trained();
    assert_eq!(a.mean(0).tensor(), &Tensor::vec(&[3.5]));
    assert_eq!(a.mean(-1).tensor(), &Tensor::vec(&[1.5, 3.5, 5.5]));
  }

  #[test]
  fn mse() {
    let a = Tensor::vec(&[1.0, 2.0, 3.0]);
    let b = Tensor::vec(&[1.0, 0.0, 0.0]);
    assert_eq!(a.mse(&b).item(), 13.0 / 3.0);
  }

  #[test]
  fn softmax_cross_entropy() {
    // Uniform logits give ln(classes) regardless of target
    let logits = Tensor::<f64>::zeros(&[2, 4]);
    let target = Tensor::new(&[2], vec![1u8, 3]).one_hot(4);
    let loss = logits.softmax_cross_entropy(&target).item();
    assert!((loss - 4f64.ln()).abs() < 1e-12);
  }
}
