use crate::{
  tensor::Tensor,
  scalar::{ Real, Strided },
  ops::Cops,
};


impl<T: Real> Cops<T> for Tensor<T> {
  fn matmul(&self, rhs: &Self) -> Vec<T> {
    assert!(self.shape.rank() == 2 && rhs.shape.rank() == 2,
      "Matrix multiplication needs two matrices, got {} & {}", self.shape, rhs.shape);
    let rows_l = self.shape[-2];
    let cols_l = self.shape[-1];
    let rows_r = rhs.shape[-2];
    let cols_r = rhs.shape[-1];
    assert_eq!(cols_l, rows_r,
      "Could not multiply {} & {} matrices", self.shape, rhs.shape);

    let data_l = self.raw();
    let data_r = rhs.raw();
    let mut data = vec![T::zero(); rows_l * cols_r];

    T::gemm(
      rows_l,
      cols_l,
      cols_r,
      Strided {
        data: &data_l,
        offset: self.shape.offset,
        row_stride: self.shape.strides[0],
        col_stride: self.shape.strides[1],
      },
      Strided {
        data: &data_r,
        offset: rhs.shape.offset,
        row_stride: rhs.shape.strides[0],
        col_stride: rhs.shape.strides[1],
      },
      &mut data,
    );

    data
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::ops::{ BaseOps, RealOps };

  #[test]
  fn matmul() {
    let x = Tensor::new(&[2,3], vec![1., 2., 3., 4., 5., 6.]);
    let y = Tensor::new(&[3,2], vec![1., 2., 3., 4., 5., 6.]);
    assert_eq!(x.mm(&y), Tensor::new(&[2,2], vec![22., 28., 49., 64.]));
  }

  #[test]
  fn matmul_vector() {
    let x = Tensor::new(&[2,3], vec![1., 2., 3., 4., 5., 6.]);
    let y = Tensor::new(&[3,1], vec![1., 2., 3.]);
    assert_eq!(x.mm(&y), Tensor::new(&[2,1], vec![14., 32.]));
  }

  #[test]
  fn matmul_transposed_view() {
    let x = Tensor::new(&[2,3], vec![1., 2., 3., 4., 5., 6.]);
    assert_eq!(x.mm(&x.transpose(0, 1)), Tensor::new(&[2,2], vec![14., 32., 32., 77.]));
  }

  #[test]
  #[should_panic(expected = "Could not multiply")]
  fn matmul_mismatch() {
    let x = Tensor::<f32>::zeros(&[2,3]);
    x.mm(&x);
  }
}
