use rand::distributions::uniform::SampleUniform;
use num_traits::{ PrimInt, NumAssignOps, Num, NumCast };
use serde::{ Serialize, de::DeserializeOwned };


/// All types that may be used in a [Tensor](crate::Tensor).
///
/// This trait gets implemented automatically for all types
/// that satisfy its dependent traits.

pub trait Inner: PartialEq + Clone + Copy + Send + Sync + std::fmt::Debug + 'static {}
impl<T: PartialEq + Clone + Copy + Send + Sync + std::fmt::Debug + 'static> Inner for T {}


/// All numeric types.
///
/// This trait gets implemented automatically for all types
/// that satisfy its dependent traits.

pub trait Numeric: Inner + PartialOrd + Num + NumCast + NumAssignOps + std::iter::Sum {}
impl<T: Inner + PartialOrd + Num + NumCast + NumAssignOps + std::iter::Sum> Numeric for T {}


/// All signed numeric types.
///
/// This trait gets implemented automatically for all types
/// that satisfy its dependent traits.

pub trait Signed: Numeric + num_traits::Signed {}
impl<T: Numeric + num_traits::Signed> Signed for T {}


/// All unsigned integer types, used for class labels and indices.
///
/// This trait gets implemented automatically for all types
/// that satisfy its dependent traits.

pub trait Unsigned: Numeric + PrimInt + num_traits::Unsigned {}
impl<T: Numeric + PrimInt + num_traits::Unsigned> Unsigned for T {}


/// All continuous numeric types that gradients can be computed for.
///
/// Implemented for [f32] and [f64], which both come with an
/// accelerated matrix multiplication.

pub trait Real: Signed + num_traits::real::Real + SampleUniform + Serialize + DeserializeOwned {
  /// Name used in diagnostic output, like `float32`.
  const NAME: &'static str;

  /// General matrix multiplication `C = A * B` of an `m x k` and a `k x n` matrix,
  /// both given as raw storage with row and column strides.
  /// `c` is contiguous with `m * n` elements.
  fn gemm(m: usize, k: usize, n: usize, a: Strided<Self>, b: Strided<Self>, c: &mut [Self]);
}


/// Borrowed matrix storage with an offset and strides.

#[derive(Debug, Clone, Copy)]
pub struct Strided<'a, T> {
  pub data: &'a [T],
  pub offset: usize,
  pub row_stride: isize,
  pub col_stride: isize,
}

impl<'a, T: Copy> Strided<'a, T> {
  #[inline]
  pub fn get(&self, row: usize, col: usize) -> T {
    let i = self.offset as isize + row as isize * self.row_stride + col as isize * self.col_stride;
    self.data[i as usize]
  }
}


macro_rules! impl_real {
  ($type:ty, $name:expr, $gemm:ident) => {
    impl Real for $type {
      const NAME: &'static str = $name;

      #[cfg(feature = "unsafe")]
      fn gemm(m: usize, k: usize, n: usize, a: Strided<Self>, b: Strided<Self>, c: &mut [Self]) {
        assert_eq!(c.len(), m * n);
        if m == 0 || n == 0 { return }
        // Strided views never reach outside their storage
        unsafe {
          matrixmultiply::$gemm(
            m, k, n,
            1.0,
            a.data.as_ptr().add(a.offset), a.row_stride, a.col_stride,
            b.data.as_ptr().add(b.offset), b.row_stride, b.col_stride,
            0.0,
            c.as_mut_ptr(), n as isize, 1,
          );
        }
      }

      #[cfg(not(feature = "unsafe"))]
      fn gemm(m: usize, k: usize, n: usize, a: Strided<Self>, b: Strided<Self>, c: &mut [Self]) {
        assert_eq!(c.len(), m * n);
        if n == 0 { return }
        let row = |(i, out): (usize, &mut [Self])| {
          for j in 0..n {
            let mut acc = 0.0;
            for l in 0..k {
              acc += a.get(i, l) * b.get(l, j);
            }
            out[j] = acc;
          }
        };

        #[cfg(feature = "rayon")]
        {
          use rayon::prelude::*;
          c.par_chunks_mut(n).enumerate().for_each(row);
        }

        #[cfg(not(feature = "rayon"))]
        c.chunks_mut(n).enumerate().for_each(row);
      }
    }
  };
}

impl_real!(f32, "float32", sgemm);
impl_real!(f64, "float64", dgemm);


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn gemm_transposed() {
    // A = [[1,2,3],[4,5,6]], B = A^T read from the same storage
    let data = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
    let a = Strided { data: &data, offset: 0, row_stride: 3, col_stride: 1 };
    let b = Strided { data: &data, offset: 0, row_stride: 1, col_stride: 3 };
    let mut c = vec![0.0; 4];
    f32::gemm(2, 3, 2, a, b, &mut c);
    assert_eq!(c, vec![14.0, 32.0, 32.0, 77.0]);
  }
}
