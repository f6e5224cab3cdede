use crate::{
  shape::Shape,
  tensor::Tensor,
  scalar::{ Inner, Numeric, Signed, Real },
  ops::{ Cops, BaseOps, NumericOps, RealOps },
};


impl<T: Inner> BaseOps<T> for Tensor<T> {
  fn scalar(item: T) -> Self {
    Self::new(&[], vec![item])
  }

  fn shape(&self) -> &Shape {
    &self.shape
  }

  fn broadcast(&self, shape: &Shape) -> Self {
    self.view(self.shape.broadcast(shape))
  }

  /// Views of contiguous tensors are reshaped in place, anything
  /// else gets copied into fresh storage first.

  fn reshape(&self, dims: &[usize]) -> Self {
    let source = self.contiguous();
    assert_eq!(source.size(), dims.iter().product::<usize>(),
      "Cannot reshape {} to {:?}", source.shape, dims);
    source.view(Shape::with_offset(dims, source.shape.offset))
  }

  fn transpose(&self, dim1: isize, dim2: isize) -> Self {
    self.view(self.shape.transpose(dim1, dim2))
  }
}

impl<T: Numeric> NumericOps<T> for Tensor<T> {
  fn sum(&self, dim: isize) -> Self {
    self.collapse(dim, |values| values.iter().copied().sum() )
  }
}

impl<T: Real> RealOps<T> for Tensor<T> {
  fn mm(&self, rhs: &Self) -> Self {
    let data = self.matmul(rhs);
    Self::new(&[self.shape[-2], rhs.shape[-1]], data)
  }

  fn exp(&self) -> Self {
    self.vectorize(|a| a.exp() )
  }

  fn log(&self) -> Self {
    self.vectorize(|a| a.ln() )
  }

  fn sqrt(&self) -> Self {
    self.vectorize(|a| a.sqrt() )
  }

  fn relu(&self) -> Self {
    self.vectorize(|a| if a > T::zero() { a } else { T::zero() })
  }

  fn sigmoid(&self) -> Self {
    self.vectorize(|a| T::one() / (T::one() + (-a).exp()) )
  }

  fn softmax_cross_entropy(&self, target: &Self) -> Self {
    assert_eq!(self.shape.dims, target.shape.dims,
      "Logits {} don't match targets {}", self.shape, target.shape);
    let batch = T::from(self.shape[0]).unwrap();
    let total: T = self.log_softmax()
      .param_iter()
      .zip(target.param_iter())
      .map(|(log_p, t)| -(log_p * t) )
      .sum();
    Self::scalar(total / batch)
  }
}

impl<T: Signed> std::ops::Neg for &Tensor<T> {
  type Output = Tensor<T>;

  fn neg(self) -> Tensor<T> {
    self.vectorize(|a| -a )
  }
}

impl<T: Signed> std::ops::Neg for Tensor<T> {
  type Output = Tensor<T>;

  fn neg(self) -> Tensor<T> {
    self.vectorize(|a| -a )
  }
}


// Elementwise arithmetic for every pairing of owned and borrowed
// tensors, plus tensors with a plain scalar on the right.
macro_rules! elementwise {
  ($trait:ident, $method:ident, $symbol:tt) => {
    elementwise!(@pair $trait, $method, $symbol, &Tensor<T>, &Tensor<T>);
    elementwise!(@pair $trait, $method, $symbol, &Tensor<T>, Tensor<T>);
    elementwise!(@pair $trait, $method, $symbol, Tensor<T>, &Tensor<T>);
    elementwise!(@pair $trait, $method, $symbol, Tensor<T>, Tensor<T>);
    elementwise!(@scalar $trait, $method, $symbol, &Tensor<T>);
    elementwise!(@scalar $trait, $method, $symbol, Tensor<T>);
  };

  (@pair $trait:ident, $method:ident, $symbol:tt, $lhs:ty, $rhs:ty) => {
    impl<T: Numeric> std::ops::$trait<$rhs> for $lhs {
      type Output = Tensor<T>;

      #[allow(clippy::needless_borrow)]
      fn $method(self, rhs: $rhs) -> Tensor<T> {
        self.zip(&rhs, |(a, b)| a $symbol b )
      }
    }
  };

  (@scalar $trait:ident, $method:ident, $symbol:tt, $lhs:ty) => {
    impl<T: Numeric> std::ops::$trait<T> for $lhs {
      type Output = Tensor<T>;

      fn $method(self, rhs: T) -> Tensor<T> {
        self.vectorize(|a| a $symbol rhs )
      }
    }
  };
}

elementwise!(Add, add, +);
elementwise!(Sub, sub, -);
elementwise!(Mul, mul, *);
elementwise!(Div, div, /);


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sum() {
    let a = Tensor::new(&[3,2], vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(a.sum(0), Tensor::new(&[], vec![21]));
    assert_eq!(a.sum(-1), Tensor::new(&[3], vec![3, 7, 11]));
  }

  #[test]
  fn reshape_view() {
    let a = Tensor::arrange(&[3,2], 0, 1);
    let row = a.range(&[1..2]).reshape(&[2]);
    assert_eq!(row, Tensor::vec(&[2, 3]));
    let t = a.transpose(0, 1).reshape(&[6]);
    assert_eq!(t, Tensor::vec(&[0, 2, 4, 1, 3, 5]));
  }

  #[test]
  fn scalar_ops() {
    let a = Tensor::vec(&[1.0, -2.0]);
    assert_eq!(&a * 2.0 + 1.0, Tensor::vec(&[3.0, -3.0]));
    assert_eq!(-&a, Tensor::vec(&[-1.0, 2.0]));
    assert_eq!(a.relu(), Tensor::vec(&[1.0, 0.0]));
  }

  #[test]
  fn mixed_operands() {
    let batch = Tensor::new(&[2,2], vec![1, 2, 3, 4]);
    let bias = Tensor::vec(&[10, 20]);
    let expected = Tensor::new(&[2,2], vec![11, 22, 13, 24]);
    assert_eq!(&batch + &bias, expected);
    assert_eq!(&bias + batch.clone(), expected);
    assert_eq!(batch.clone() + &bias, expected);
    assert_eq!(batch - bias, Tensor::new(&[2,2], vec![-9, -18, -7, -16]));
    assert_eq!(-Tensor::vec(&[1, -2]), Tensor::vec(&[-1, 2]));
  }
}
