use crate::{
  internal::*,
  shape::Shape,
  tensor::Tensor,
  variable::{ Variable, BinaryOp, UnaryOp },
  scalar::Real,
  ops::{ BaseOps, NumericOps, RealOps },
};


impl<T: Real> BaseOps<T> for Variable<T> {
  fn scalar(item: T) -> Self {
    Self::from_tensor(Tensor::scalar(item), false)
  }

  fn shape(&self) -> &Shape {
    self.node.data.shape()
  }

  fn broadcast(&self, shape: &Shape) -> Self {
    let dims = self.shape().broadcast_dims(shape);
    if dims == self.dims() { return self.clone() }
    self.unary_op(Layout::Broadcast(dims))
  }

  fn reshape(&self, dims: &[usize]) -> Self {
    self.unary_op(Layout::Reshape(dims.to_vec()))
  }

  fn transpose(&self, dim1: isize, dim2: isize) -> Self {
    self.unary_op(Layout::Transpose(dim1, dim2))
  }
}

impl<T: Real> NumericOps<T> for Variable<T> {
  fn sum(&self, dim: isize) -> Self {
    self.unary_op(Layout::Sum(dim))
  }
}

impl<T: Real> RealOps<T> for Variable<T> {
  fn mm(&self, rhs: &Self) -> Self {
    self.binary_op(MatMul, rhs)
  }

  fn exp(&self) -> Self {
    self.unary_op(Pointwise::Exp)
  }

  fn log(&self) -> Self {
    self.unary_op(Pointwise::Log)
  }

  fn sqrt(&self) -> Self {
    self.unary_op(Pointwise::Sqrt)
  }

  fn relu(&self) -> Self {
    self.unary_op(Pointwise::ReLU)
  }

  fn sigmoid(&self) -> Self {
    self.unary_op(Pointwise::Sigmoid)
  }

  fn softmax_cross_entropy(&self, target: &Self) -> Self {
    self.binary_op(SoftmaxCrossEntropy, target)
  }
}

impl<T: Real> Variable<T> {
  // Both sides get broadcast to a common shape first
  fn arithmetic(&self, op: Arithmetic, rhs: &Self) -> Self {
    if self.dims() == rhs.dims() {
      self.binary_op(op, rhs)
    } else {
      self.broadcast(rhs.shape()).binary_op(op, &rhs.broadcast(self.shape()))
    }
  }
}

impl<T: Real> std::ops::Neg for &Variable<T> {
  type Output = Variable<T>;

  fn neg(self) -> Variable<T> {
    self.unary_op(Pointwise::Neg)
  }
}

impl<T: Real> std::ops::Neg for Variable<T> {
  type Output = Variable<T>;

  fn neg(self) -> Variable<T> {
    self.unary_op(Pointwise::Neg)
  }
}

macro_rules! arithmetic_operator {
  ($trait:ident, $method:ident, $op:expr) => {
    impl<T: Real> std::ops::$trait<&Variable<T>> for &Variable<T> {
      type Output = Variable<T>;

      fn $method(self, rhs: &Variable<T>) -> Variable<T> {
        self.arithmetic($op, rhs)
      }
    }

    impl<T: Real> std::ops::$trait<Variable<T>> for &Variable<T> {
      type Output = Variable<T>;

      fn $method(self, rhs: Variable<T>) -> Variable<T> {
        self.arithmetic($op, &rhs)
      }
    }

    impl<T: Real> std::ops::$trait<&Variable<T>> for Variable<T> {
      type Output = Variable<T>;

      fn $method(self, rhs: &Variable<T>) -> Variable<T> {
        self.arithmetic($op, rhs)
      }
    }

    impl<T: Real> std::ops::$trait for Variable<T> {
      type Output = Variable<T>;

      fn $method(self, rhs: Variable<T>) -> Variable<T> {
        self.arithmetic($op, &rhs)
      }
    }

    // Scalars become constants
    impl<T: Real> std::ops::$trait<T> for &Variable<T> {
      type Output = Variable<T>;

      fn $method(self, rhs: T) -> Variable<T> {
        self.arithmetic($op, &Variable::scalar(rhs))
      }
    }

    impl<T: Real> std::ops::$trait<T> for Variable<T> {
      type Output = Variable<T>;

      fn $method(self, rhs: T) -> Variable<T> {
        self.arithmetic($op, &Variable::scalar(rhs))
      }
    }
  };
}

arithmetic_operator!(Add, add, Arithmetic::Add);
arithmetic_operator!(Sub, sub, Arithmetic::Sub);
arithmetic_operator!(Mul, mul, Arithmetic::Mul);
arithmetic_operator!(Div, div, Arithmetic::Div);


/// Element-wise arithmetic on two inputs of equal shape.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arithmetic {
  Add,
  Sub,
  Mul,
  Div,
}

impl<T: Real> BinaryOp<T> for Arithmetic {
  fn name(&self) -> &'static str {
    match self {
      Self::Add => "add",
      Self::Sub => "sub",
      Self::Mul => "mul",
      Self::Div => "div",
    }
  }

  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T> {
    match self {
      Self::Add => lhs + rhs,
      Self::Sub => lhs - rhs,
      Self::Mul => lhs * rhs,
      Self::Div => lhs / rhs,
    }
  }

  fn derive(&self, lhs: &Tensor<T>, rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>) {
    match self {
      Self::Add => (grad.clone(), grad.clone()),
      Self::Sub => (grad.clone(), -grad),
      Self::Mul => (grad * rhs, grad * lhs),
      Self::Div => (grad / rhs, -grad * lhs / (rhs * rhs)),
    }
  }
}


/// Element-wise functions of a single input.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pointwise {
  Neg,
  Exp,
  Log,
  Sqrt,
  ReLU,
  Sigmoid,
}

impl<T: Real> UnaryOp<T> for Pointwise {
  fn name(&self) -> &'static str {
    match self {
      Self::Neg => "neg",
      Self::Exp => "exp",
      Self::Log => "log",
      Self::Sqrt => "sqrt",
      Self::ReLU => "relu",
      Self::Sigmoid => "sigmoid",
    }
  }

  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    match self {
      Self::Neg => -lhs,
      Self::Exp => lhs.exp(),
      Self::Log => lhs.log(),
      Self::Sqrt => lhs.sqrt(),
      Self::ReLU => lhs.relu(),
      Self::Sigmoid => lhs.sigmoid(),
    }
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    let two = T::from(2.0).unwrap();
    // Local slope at every input element
    let slope = match self {
      Self::Neg => return -grad,
      Self::Exp => lhs.exp(),
      Self::Log => lhs.vectorize(|a| a.recip() ),
      Self::Sqrt => lhs.vectorize(|a| (a.sqrt() * two).recip() ),
      Self::ReLU => lhs.vectorize(|a| if a > T::zero() { T::one() } else { T::zero() } ),
      Self::Sigmoid => lhs.sigmoid().vectorize(|s| s * (T::one() - s) ),
    };
    grad * slope
  }
}


/// Operations that only rearrange or reduce elements.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
  Broadcast(Vec<usize>),
  Reshape(Vec<usize>),
  Transpose(isize, isize),
  /// Sum over all dimensions from the given one onwards.
  Sum(isize),
}

impl<T: Real> UnaryOp<T> for Layout {
  fn name(&self) -> &'static str {
    match self {
      Self::Broadcast(_) => "broadcast",
      Self::Reshape(_) => "reshape",
      Self::Transpose(..) => "transpose",
      Self::Sum(_) => "sum",
    }
  }

  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    match self {
      Self::Broadcast(dims) => lhs.broadcast(&Shape::new(dims)),
      Self::Reshape(dims) => lhs.reshape(dims),
      Self::Transpose(dim1, dim2) => lhs.transpose(*dim1, *dim2),
      Self::Sum(dim) => lhs.sum(*dim),
    }
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    match self {
      Self::Broadcast(_) => grad.sum_to(lhs.dims()),
      Self::Reshape(_) => grad.reshape(lhs.dims()),
      Self::Transpose(dim1, dim2) => grad.transpose(*dim1, *dim2),
      Self::Sum(dim) => {
        // Collapsed dimensions come back as ones before spreading out again
        let dim = negative_index(*dim, lhs.rank(), false);
        let mut dims = lhs.dims().to_vec();
        dims[dim..].fill(1);
        grad.reshape(&dims).broadcast(lhs.shape())
      },
    }
  }
}


#[derive(Debug, Clone, Copy)]
pub struct MatMul;

impl<T: Real> BinaryOp<T> for MatMul {
  fn name(&self) -> &'static str { "matmul" }

  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T> {
    lhs.mm(rhs)
  }

  fn derive(&self, lhs: &Tensor<T>, rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>) {
    (grad.mm(&rhs.transpose(0, 1)), lhs.transpose(0, 1).mm(grad))
  }
}


/// Mean softmax cross-entropy over a batch of logits.
/// The target side is treated as a constant.

#[derive(Debug, Clone, Copy)]
pub struct SoftmaxCrossEntropy;

impl<T: Real> BinaryOp<T> for SoftmaxCrossEntropy {
  fn name(&self) -> &'static str { "softmax_cross_entropy" }

  fn run(&self, logits: &Tensor<T>, target: &Tensor<T>) -> Tensor<T> {
    logits.softmax_cross_entropy(target)
  }

  fn derive(&self, logits: &Tensor<T>, target: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>) {
    let scale = grad.item() / T::from(logits.dim(0)).unwrap();
    ((logits.softmax() - target) * scale, Tensor::zeros(target.dims()))
  }
}
