use std::cell::{ Ref, RefMut, RefCell };
use std::ops::Range;
use std::fmt::Debug;

use rand::Rng;
use num_traits::NumCast;
use serde::{ Serialize, Deserialize };

mod cops;
mod lops;

use crate::{
  internal::*,
  shape::{ Shape, Positions },
  variable::Variable,
  scalar::{ Inner, Numeric, Real, Signed, Unsigned },
  ops::Hops,
};


/// Multidimensional array.
///
/// Tensors may contain any type that satisfies [Inner], but
/// additional methods are available for [Numeric], [Real],
/// [Unsigned] and [boolean](bool) inner types.
///
/// Storage is shared between a tensor and the views created from it
/// with [transpose](crate::ops::BaseOps::transpose), [broadcast](crate::ops::BaseOps::broadcast)
/// or [range](Tensor::range).
///
/// [Real] tensor types can be wrapped in a [Variable] by
/// calling [tracked](Tensor::tracked) or [trained](Tensor::trained).

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tensor<T: Inner> {
  shape: Shape,
  data: RcT<RefCell<Vec<T>>>,
}

impl<T: Real> Hops<T> for Tensor<T> {}

impl<T: Inner> PartialEq for Tensor<T> {
  fn eq(&self, rhs: &Self) -> bool {
    if self.shape.squeeze().dims != rhs.shape.squeeze().dims { return false }
    let data_l = self.data.borrow();
    let data_r = rhs.data.borrow();
    for (i, j) in self.shape.iter().zip(rhs.shape.iter()) {
      if data_l[i] != data_r[j] { return false }
    }
    true
  }
}

impl<T: Inner> Tensor<T> {
  pub fn from_shape(shape: Shape, data: Vec<T>) -> Self {
    assert_eq!(shape.size(), data.len(),
      "{} doesn't match data length {}", shape, data.len());
    Self { shape, data: RcT::new(RefCell::new(data)) }
  }

  pub fn new(shape: &[usize], data: Vec<T>) -> Self {
    Self::from_shape(Shape::new(shape), data)
  }

  pub fn vec(vec: &[T]) -> Self {
    Self::new(&[vec.len()], vec.to_vec())
  }

  pub fn from_vec(vec: Vec<T>) -> Self {
    Self::new(&[vec.len()], vec)
  }

  pub fn fill(shape: &[usize], filler: T) -> Self {
    Self::new(shape, vec![filler; shape.iter().product()])
  }

  pub fn raw(&self) -> Ref<Vec<T>> {
    self.data.borrow()
  }

  pub(crate) fn raw_mut(&self) -> RefMut<Vec<T>> {
    self.data.borrow_mut()
  }

  /// Copy all elements in logical order.

  pub fn to_vec(&self) -> Vec<T> {
    self.param_iter().collect()
  }

  pub fn size(&self) -> usize {
    self.shape.size()
  }

  pub fn dims(&self) -> &[usize] {
    &self.shape.dims
  }

  pub fn shared_with(&self, other: &Self) -> bool {
    RcT::ptr_eq(&self.data, &other.data)
  }

  /// Overwrite this tensor's elements with those of `other`.
  ///
  /// Both shapes must match, apart from dimensions of size one.

  pub fn assign(&self, other: &Self) {
    assert!(self.shape.squeeze().dims == other.shape.squeeze().dims,
      "Could not assign {} tensor to {} tensor", other.shape, self.shape);
    // Avoid clashing borrow when tensors share storage
    let other = if self.shared_with(other) {
      other.detach()
    } else {
      other.clone()
    };
    let mut data = self.data.borrow_mut();
    let other_data = other.data.borrow();
    for (i, j) in self.shape.iter().zip(other.shape.iter()) {
      data[i] = other_data[j];
    }
  }

  pub fn refill(&self, filler: T) {
    let mut data = self.data.borrow_mut();
    for i in self.shape.iter() {
      data[i] = filler;
    }
  }

  pub fn contiguous(&self) -> Self {
    if self.shape.contiguous() {
      self.clone()
    } else {
      self.detach()
    }
  }

  pub fn detach(&self) -> Self {
    self.vectorize(|a| a )
  }

  pub fn zip<O,F>(&self, rhs: &Self, cb: F) -> Tensor<O>
  where
    O: Inner,
    F: Fn((T, T)) -> O,
  {
    let dims = self.shape.broadcast_dims(&rhs.shape);
    let lhs = self.view(self.shape.expand(&dims));
    let rhs = rhs.view(rhs.shape.expand(&dims));
    let pairs = lhs.param_iter().zip(rhs.param_iter());
    Tensor::new(&dims, pairs.map(cb).collect())
  }

  pub fn vectorize<O,F>(&self, cb: F) -> Tensor<O>
  where
    O: Inner,
    F: FnMut(T) -> O,
  {
    let data = self.param_iter().map(cb).collect();
    Tensor::new(&self.shape.dims, data)
  }

  /// Reduce all dimensions from `dim` onwards by handing each
  /// contiguous block of elements to `cb`.

  pub fn collapse<O,F>(&self, dim: isize, cb: F) -> Tensor<O>
  where
    O: Inner,
    F: Fn(&[T]) -> O,
  {
    let dim = negative_index(dim, self.shape.rank(), false);
    let inner: usize = self.shape.dims[dim..].iter().product();
    let values = self.to_vec();
    let data = values.chunks(inner.max(1))
      .map(cb)
      .collect();
    Tensor::new(&self.shape.dims[..dim], data)
  }

  pub fn param_iter(&self) -> TensorIterator<T> {
    TensorIterator::new(self)
  }

  /// Tensor sharing this one's storage through a different layout.

  pub(crate) fn view(&self, shape: Shape) -> Self {
    Self { shape, data: self.data.clone() }
  }

  pub fn range(&self, ranges: &[Range<isize>]) -> Self {
    self.view(self.shape.range(ranges))
  }

  /// Select rows along the first dimension in the given order.

  pub fn gather(&self, indices: &[usize]) -> Self {
    let mut dims = self.shape.dims.clone();
    assert!(!dims.is_empty(), "Cannot gather rows from a scalar");
    let rows = dims[0];
    dims[0] = indices.len();
    let row_size: usize = self.shape.dims[1..].iter().product();
    let source = self.contiguous();
    let raw = source.raw();
    let offset = source.shape.offset;
    let mut data = Vec::with_capacity(indices.len() * row_size);
    for &i in indices {
      assert!(i < rows, "Row {i} out of bounds for {}", self.shape);
      let start = offset + i * row_size;
      data.extend_from_slice(&raw[start..start + row_size]);
    }
    Tensor::new(&dims, data)
  }

  pub fn item(&self) -> T {
    assert!(self.shape.size() == 1,
      "Can't extract item from non-scalar {}", self.shape);
    let i = self.shape.iter().next().unwrap();
    self.raw()[i]
  }

  pub fn unsqueeze(&self, dim: isize) -> Self {
    self.view(self.shape.unsqueeze(dim))
  }

  pub fn squeeze(&self) -> Self {
    self.view(self.shape.squeeze())
  }

  pub fn equal(&self, rhs: &Self) -> Tensor<bool> {
    self.zip(rhs, |(a, b)| a == b )
  }
}

impl<T: Numeric> Tensor<T> {
  pub fn ones(shape: &[usize]) -> Self {
    Self::new(shape, vec![T::one(); shape.iter().product()])
  }

  pub fn zeros(shape: &[usize]) -> Self {
    Self::new(shape, vec![T::zero(); shape.iter().product()])
  }

  pub fn arrange(shape: &[usize], start: T, step: T) -> Self {
    Self::new(shape, (0..shape.iter().product())
      .map(|i| T::from(i).unwrap() * step + start )
      .collect())
  }

  pub fn max(&self, dim: isize) -> Self {
    self.collapse(dim, |values| {
      values.iter()
        .copied()
        .reduce(|a, b| if b > a { b } else { a } )
        .expect("Cannot take the maximum of an empty dimension")
    })
  }

  /// Sum a broadcasted tensor back down to `dims`.

  pub fn sum_to(&self, dims: &[usize]) -> Self {
    if self.shape.dims == dims { return self.clone() }
    // Every element lands on the position it was broadcast from
    let target = Shape::new(dims).expand(&self.shape.dims);
    let mut out = vec![T::zero(); dims.iter().product()];
    for (value, idx) in self.param_iter().zip(target.iter()) {
      out[idx] += value;
    }
    Self::new(dims, out)
  }

  /// Collapse the last dimension using the index of its greatest value.

  pub fn argmax<O: Unsigned>(&self) -> Tensor<O> {
    self.collapse(-1, |values| {
      let mut index = 0;
      for (i, value) in values.iter().enumerate() {
        if *value > values[index] {
          index = i;
        }
      }
      O::from(index).unwrap()
    })
  }

  pub fn cast<I: Numeric>(&self) -> Tensor<I> {
    self.vectorize(|a| I::from(a).unwrap() )
  }
}

impl<T: Real> Tensor<T> {
  pub fn randn(shape: &[usize]) -> Self {
    Self::randn_with(shape, &mut rand::thread_rng())
  }

  /// Standard normal samples drawn from the given generator.

  pub fn randn_with<G: Rng>(shape: &[usize], rng: &mut G) -> Self {
    let len = shape.iter().product();
    let mut data = Vec::with_capacity(len + 1);
    while data.len() < len {
      let (r1, r2): (T, T) = randn(rng);
      data.push(r1);
      data.push(r2);
    }
    data.truncate(len);
    Self::new(shape, data)
  }

  pub fn trained(&self) -> Variable<T> {
    Variable::from_tensor(self.clone(), true)
  }

  pub fn tracked(&self) -> Variable<T> {
    Variable::from_tensor(self.clone(), false)
  }

  /// Softmax over the last dimension.

  pub fn softmax(&self) -> Self {
    let classes = self.shape[-1];
    let data: Vec<T> = self.to_vec()
      .chunks(classes)
      .flat_map(|row| {
        let max = row.iter().copied().fold(T::min_value(), |a, b| if b > a { b } else { a });
        let exp: Vec<T> = row.iter().map(|&a| (a - max).exp() ).collect();
        let sum: T = exp.iter().copied().sum();
        exp.into_iter().map(move |e| e / sum )
      })
      .collect();
    Self::new(&self.shape.dims, data)
  }

  /// Log-softmax over the last dimension.

  pub fn log_softmax(&self) -> Self {
    let classes = self.shape[-1];
    let data: Vec<T> = self.to_vec()
      .chunks(classes)
      .flat_map(|row| {
        let max = row.iter().copied().fold(T::min_value(), |a, b| if b > a { b } else { a });
        let sum: T = row.iter().map(|&a| (a - max).exp() ).sum();
        let log_sum = sum.ln() + max;
        row.iter().map(move |&a| a - log_sum ).collect::<Vec<_>>()
      })
      .collect();
    Self::new(&self.shape.dims, data)
  }
}

impl<T: Unsigned> Tensor<T> {
  pub fn one_hot<O: Numeric>(&self, size: usize) -> Tensor<O> {
    let mut dims = self.shape.dims.clone();
    dims.push(size);
    let data = self.param_iter()
      .flat_map(|a| {
        let mut hot = vec![O::zero(); size];
        let i: usize = NumCast::from(a).unwrap();
        assert!(i < size, "Class {i} out of range for {size} classes");
        hot[i] = O::one();
        hot
      })
      .collect();
    Tensor::new(&dims, data)
  }

  /// Fraction of entries that match `labels`.

  pub fn accuracy<O: Real>(&self, labels: &Self) -> O {
    let n = labels.size();
    if n == 0 { return O::zero() }
    let correct = self
      .equal(labels)
      .param_iter()
      .filter(|&hit| hit )
      .count();
    O::from(correct).unwrap() / O::from(n).unwrap()
  }
}

impl<T: Signed> Tensor<T> {
  pub fn abs(&self) -> Self {
    self.vectorize(|a| a.abs() )
  }
}

impl Tensor<bool> {
  pub fn numeric<O: Numeric>(&self) -> Tensor<O> {
    self.vectorize(|a| if a { O::one() } else { O::zero() })
  }
}

impl<T: Inner> std::fmt::Display for Tensor<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(f, "Tensor{:?} ", self.shape.dims)?;
    print_chunks(0, &self.shape, &self.to_vec(), f)?;
    Ok(())
  }
}

fn print_chunks<T: Debug>(idx: usize, shape: &Shape, vec: &[T], f: &mut std::fmt::Formatter) -> std::fmt::Result {
  let indent = (0..idx * 2).map(|_| " ").collect::<String>();
  if shape.rank() == 0 {
    write!(f, "{indent}{:?}", vec[0])?;
  } else if idx == shape.rank() - 1 || vec.is_empty() {
    writeln!(f, "{indent}{:?}", vec)?;
  } else {
    let chunks = vec.chunks(vec.len() / shape.dims[idx]);
    writeln!(f, "{indent}[")?;
    for chunk in chunks {
      print_chunks(idx + 1, shape, chunk, f)?;
    }
    writeln!(f, "{indent}]")?;
  }
  Ok(())
}


pub struct TensorIterator<'a, T: Inner> {
  data: Ref<'a, Vec<T>>,
  positions: Positions<'a>,
}

impl<'a, T: Inner> TensorIterator<'a, T> {
  fn new(tensor: &'a Tensor<T>) -> Self {
    Self {
      data: tensor.data.borrow(),
      positions: tensor.shape.iter(),
    }
  }
}

impl<T: Inner> Iterator for TensorIterator<'_, T> {
  type Item = T;

  fn next(&mut self) -> Option<Self::Item> {
    self.positions.next().map(|i| self.data[i] )
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use rand::{ SeedableRng, rngs::StdRng };
  use crate::ops::{ BaseOps, RealOps };

  #[test]
  fn range() {
    let x = Tensor::vec(&[3, 5, 6]);
    assert_eq!(x.range(&[1..-1]), Tensor::vec(&[5, 6]));
  }

  #[test]
  fn broadcast() {
    let x = Tensor::new(&[1,2,3], vec![1, 2, 3, 4, 5, 6]);

    let y = Tensor::new(&[    1], vec![1]);
    assert_eq!(&x + &y, Tensor::new(&[1,2,3], vec![2, 3, 4, 5, 6, 7]));

    let y = Tensor::new(&[    3], vec![1, 2, 3]);
    assert_eq!(&x + &y, Tensor::new(&[1,2,3], vec![2, 4, 6, 5, 7, 9]));

    let y = Tensor::new(&[  2,3], vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(&x + &y, Tensor::new(&[1,2,3], vec![2, 4, 6, 8, 10, 12]));
  }

  #[test]
  fn sum_to() {
    let a = Tensor::arrange(&[3,2], 0, 1);
    assert_eq!(a.sum_to(&[2]), Tensor::vec(&[6, 9]));
    assert_eq!(a.sum_to(&[3,1]), Tensor::new(&[3,1], vec![1, 5, 9]));
    assert_eq!(a.sum_to(&[]), Tensor::new(&[], vec![15]));
  }

  #[test]
  fn gather() {
    let a = Tensor::arrange(&[4,2], 0, 1);
    assert_eq!(a.gather(&[2, 0]), Tensor::new(&[2,2], vec![4, 5, 0, 1]));
    assert_eq!(a.transpose(0, 1).gather(&[1]), Tensor::new(&[1,4], vec![1, 3, 5, 7]));
  }

  #[test]
  fn assign_view() {
    let a = Tensor::zeros(&[2,3]);
    a.range(&[1..2]).assign(&Tensor::vec(&[7, 8, 9]));
    assert_eq!(a, Tensor::new(&[2,3], vec![0, 0, 0, 7, 8, 9]));
  }

  #[test]
  fn argmax() {
    let a = Tensor::new(&[2,3], vec![0.1, 0.7, 0.2, -1.0, -3.0, -2.0]);
    assert_eq!(a.argmax::<u8>(), Tensor::vec(&[1u8, 0]));
  }

  #[test]
  fn one_hot() {
    let labels = Tensor::vec(&[2u8, 0]);
    assert_eq!(labels.one_hot::<f32>(3), Tensor::new(&[2,3], vec![0., 0., 1., 1., 0., 0.]));
  }

  #[test]
  fn accuracy() {
    let pred = Tensor::vec(&[1u8, 2, 3, 4]);
    let real = Tensor::vec(&[1u8, 2, 0, 4]);
    assert_eq!(pred.accuracy::<f64>(&real), 0.75);
  }

  #[test]
  fn softmax() {
    let a = Tensor::arrange(&[3,2], 1.0, 1.0).softmax();
    for row in a.to_vec().chunks(2) {
      assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }
    let log = Tensor::arrange(&[3,2], 1.0, 1.0).log_softmax();
    assert!((log.exp() - a).abs().max(0).item() < 1e-12);
  }

  #[test]
  fn conversions() {
    let a = Tensor::vec(&[1u8, 2, 2]);
    let mask = a.equal(&Tensor::vec(&[2u8]));
    assert_eq!(mask.numeric::<u8>(), Tensor::vec(&[0u8, 1, 1]));
    assert_eq!(a.cast::<f32>(), Tensor::vec(&[1.0, 2.0, 2.0]));
    assert_eq!(a.unsqueeze(0).dims(), &[1, 3]);
    assert_eq!(a.unsqueeze(0).squeeze().dims(), &[3]);
  }

  #[test]
  fn seeded_randn() {
    let a = Tensor::<f32>::randn_with(&[5], &mut StdRng::seed_from_u64(7));
    let b = Tensor::<f32>::randn_with(&[5], &mut StdRng::seed_from_u64(7));
    assert_eq!(a, b);
    assert_eq!(a.size(), 5);
  }
}
