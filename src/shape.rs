use std::ops::Range;

use serde::{ Serialize, Deserialize };

use crate::internal::*;


/// Dimensions of a [Tensor](crate::Tensor), along with the strided
/// layout of its elements inside shared storage.
///
/// Views like ranges, transposes and broadcasts only ever produce a new
/// Shape and leave the underlying storage untouched.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
  pub dims: Vec<usize>,
  pub(crate) strides: Vec<isize>,
  pub(crate) offset: usize,
}

impl Shape {
  pub fn new(dims: &[usize]) -> Self {
    Self::with_offset(dims, 0)
  }

  /// Row-major layout of `dims`, starting at `offset` into storage.

  pub(crate) fn with_offset(dims: &[usize], offset: usize) -> Self {
    Self { dims: dims.to_vec(), strides: Self::row_major(dims), offset }
  }

  fn row_major(dims: &[usize]) -> Vec<isize> {
    let mut stride = 1;
    let mut strides: Vec<isize> = dims.iter()
      .rev()
      .map(|&n| {
        let current = stride;
        stride *= n as isize;
        current
      })
      .collect();
    strides.reverse();
    strides
  }

  pub fn size(&self) -> usize {
    self.dims.iter().product()
  }

  pub fn rank(&self) -> usize {
    self.dims.len()
  }

  pub fn contiguous(&self) -> bool {
    self.strides == Self::row_major(&self.dims)
  }

  /// Storage positions of all elements in row-major order.

  pub fn iter(&self) -> Positions<'_> {
    Positions::new(self)
  }

  /// View of the given ranges along the leading dimensions.
  /// Negative bounds count from the end.

  pub fn range(&self, ranges: &[Range<isize>]) -> Self {
    assert!(ranges.len() <= self.rank(), "Too many ranges for {}", self);
    let mut shape = self.clone();
    for (d, range) in ranges.iter().enumerate() {
      let n = self.dims[d];
      let start = negative_index(range.start, n, true);
      let end = negative_index(range.end, n, true);
      assert!(start <= end && end <= n, "Range {:?} out of bounds for {}", range, self);
      shape.offset = (shape.offset as isize + self.strides[d] * start as isize) as usize;
      shape.dims[d] = end - start;
    }
    shape
  }

  /// Drop all dimensions of size one.

  pub fn squeeze(&self) -> Self {
    let (dims, strides) = self.dims.iter()
      .zip(&self.strides)
      .filter(|(&n, _)| n != 1 )
      .map(|(&n, &s)| (n, s) )
      .unzip();
    Self { dims, strides, offset: self.offset }
  }

  /// Insert a dimension of size one at `dim`.

  pub fn unsqueeze(&self, dim: isize) -> Self {
    let d = negative_index(dim, self.rank(), true);
    let stride = self.strides.get(d).map_or(1, |&s| s * self.dims[d] as isize );
    let mut shape = self.clone();
    shape.dims.insert(d, 1);
    shape.strides.insert(d, stride);
    shape
  }

  /// Dimensions both shapes broadcast to, aligned at their last dimension.

  pub fn broadcast_dims(&self, other: &Self) -> Vec<usize> {
    let rank = self.rank().max(other.rank());
    let dim = |shape: &Self, d: usize| (d + shape.rank())
      .checked_sub(rank)
      .map_or(1, |i| shape.dims[i] );
    (0..rank)
      .map(|d| {
        let (a, b) = (dim(self, d), dim(other, d));
        assert!(a == b || a == 1 || b == 1, "Could not broadcast {} & {}", self, other);
        a.max(b)
      })
      .collect()
  }

  /// View of this shape repeated along its size-one and missing
  /// leading dimensions to match `dims`.

  pub fn expand(&self, dims: &[usize]) -> Self {
    assert!(dims.len() >= self.rank(), "Could not broadcast {} to {:?}", self, dims);
    let lead = dims.len() - self.rank();
    let strides = dims.iter()
      .enumerate()
      .map(|(d, &n)| {
        if d < lead { return 0 }
        let own = self.dims[d - lead];
        assert!(own == n || own == 1, "Could not broadcast {} to {:?}", self, dims);
        if own == n { self.strides[d - lead] } else { 0 }
      })
      .collect();
    Self { dims: dims.to_vec(), strides, offset: self.offset }
  }

  pub fn broadcast(&self, other: &Self) -> Self {
    self.expand(&self.broadcast_dims(other))
  }

  pub fn transpose(&self, dim1: isize, dim2: isize) -> Self {
    let dim1 = negative_index(dim1, self.rank(), false);
    let dim2 = negative_index(dim2, self.rank(), false);
    let mut shape = self.clone();
    shape.dims.swap(dim1, dim2);
    shape.strides.swap(dim1, dim2);
    shape
  }
}

impl std::ops::Index<isize> for Shape {
  type Output = usize;

  fn index(&self, i: isize) -> &usize {
    &self.dims[negative_index(i, self.rank(), false)]
  }
}

impl std::fmt::Display for Shape {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(f, "Shape{:?}", self.dims)
  }
}


/// Storage positions of a [Shape]'s elements, walking its
/// dimensions like an odometer.

pub struct Positions<'a> {
  shape: &'a Shape,
  counter: Vec<usize>,
  position: isize,
  remaining: usize,
}

impl<'a> Positions<'a> {
  fn new(shape: &'a Shape) -> Self {
    Self {
      counter: vec![0; shape.rank()],
      position: shape.offset as isize,
      remaining: shape.size(),
      shape,
    }
  }
}

impl Iterator for Positions<'_> {
  type Item = usize;

  fn next(&mut self) -> Option<usize> {
    if self.remaining == 0 { return None }
    self.remaining -= 1;
    let current = self.position as usize;
    for d in (0..self.counter.len()).rev() {
      self.counter[d] += 1;
      self.position += self.shape.strides[d];
      if self.counter[d] < self.shape.dims[d] { break }
      // Carry into the next outer dimension
      self.counter[d] = 0;
      self.position -= self.shape.strides[d] * self.shape.dims[d] as isize;
    }
    Some(current)
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    (self.remaining, Some(self.remaining))
  }
}

impl ExactSizeIterator for Positions<'_> {}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn strides() {
    assert_eq!(Shape::new(&[3,2,2]).strides, vec![4,2,1]);
    assert_eq!(Shape::new(&[784]).strides, vec![1]);
    assert!(Shape::new(&[]).strides.is_empty());
    assert_eq!(Shape::new(&[2,3]).iter().len(), 6);
  }

  #[test]
  fn range() {
    let shape = Shape::new(&[4,4,4]).range(&[1..3, 1..3, 1..3]);
    assert_eq!(shape.dims, vec![2,2,2]);
    assert_eq!(shape.offset, 21);
    assert!(!shape.contiguous());
    let positions: Vec<_> = shape.iter().collect();
    assert_eq!(positions, vec![21, 22, 25, 26, 37, 38, 41, 42]);

    // Batch of rows keeps the row layout
    let batch = Shape::new(&[10,784]).range(&[2..-3]);
    assert_eq!(batch.dims, vec![6,784]);
    assert_eq!(batch.offset, 2 * 784);
    assert!(batch.contiguous());
  }

  #[test]
  #[should_panic(expected = "out of bounds")]
  fn range_out_of_bounds() {
    Shape::new(&[3]).range(&[2..5]);
  }

  #[test]
  fn squeeze_unsqueeze() {
    let shape = Shape::new(&[1,2,3,1]).squeeze();
    assert_eq!(shape.dims, vec![2,3]);
    assert_eq!(shape.strides, vec![3,1]);

    let shape = Shape::new(&[2,3]).unsqueeze(0);
    assert_eq!(shape.dims, vec![1,2,3]);
    assert!(shape.contiguous());
    assert_eq!(Shape::new(&[2,3]).unsqueeze(-1).dims, vec![2,3,1]);
  }

  #[test]
  fn broadcast() {
    let bias = Shape::new(&[10]);
    let batch = Shape::new(&[4,10]);
    assert_eq!(bias.broadcast_dims(&batch), vec![4,10]);
    let shape = bias.broadcast(&batch);
    assert_eq!(shape.strides, vec![0,1]);

    let shape = Shape::new(&[2,1]).broadcast(&Shape::new(&[3]));
    assert_eq!(shape.dims, vec![2,3]);
    let positions: Vec<_> = shape.iter().collect();
    assert_eq!(positions, vec![0, 0, 0, 1, 1, 1]);
  }

  #[test]
  fn expand_scalar() {
    let shape = Shape::new(&[]).expand(&[2,2]);
    assert_eq!(shape.iter().collect::<Vec<_>>(), vec![0; 4]);
  }

  #[test]
  #[should_panic(expected = "Could not broadcast")]
  fn broadcast_incompatible() {
    Shape::new(&[3]).broadcast(&Shape::new(&[4]));
  }

  #[test]
  fn transpose() {
    let shape = Shape::new(&[2,3]).transpose(0, -1);
    assert_eq!(shape.dims, vec![3,2]);
    assert_eq!(shape.strides, vec![1,3]);
    assert_eq!(shape[-1], 2);
    let positions: Vec<_> = shape.iter().collect();
    assert_eq!(positions, vec![0, 3, 1, 4, 2, 5]);
  }
}
