//! Train a multi-layer perceptron on handwritten digits.
//! Tiny. Few dependencies. CPU only.
//!
//! # Features
//!
//! - **Auto-grad** — [Variable]s record the operations used to create them,
//! so gradients of a loss can be back-propagated to every trainable parameter.
//!
//! - **Broadcasting** — Tensors with differing but compatible shapes get
//! broadcasted to matching dimensions automatically for element-wise operations.
//!
//! - **Zero-copy views** — Tensors may be sliced, transposed and broadcasted
//! without actually copying any data.
//!
//! - **Optimization** — Includes standard optimizers: SGD, Momentum and Adam.
//!
//! - **MNIST** — Loads the IDX files of the MNIST dataset, plain or gzipped,
//! trains a [Classifier](model::Classifier) around an [MnistMlp](model::MnistMlp)
//! and persists model and optimizer state with [postcard].
//!
//! # Examples
//!
//! Evaluating and minimizing a non-linear function:
//! ```
//! use digitnet::{ ops::*, Tensor, optimize::{ Optimizer, Adam } };
//!
//! // Create trainable variables from tensors
//! let w = Tensor::randn(&[2, 8]).trained();
//! let b = Tensor::zeros(&[8]).trained();
//!
//! // Use a standard optimizer
//! let mut optimizer = Optimizer::new(0.001, Adam::default());
//!
//! // Basic training loop
//! for _ in 0..100 {
//!
//!   // Track training data for compute operations to be recorded
//!   let x = Tensor::new(&[1, 2], vec![1.0, 2.0]).tracked();
//!
//!   // Compute loss
//!   let loss = ((x.mm(&w) + &b).sigmoid() - 0.5).sqr().mean(0);
//!
//!   // Back-prop, optimize and reset gradients
//!   optimizer.minimize(&loss, &loss.parameters());
//! }
//! ```
//!
//! Training on MNIST:
//! ```no_run
//! use digitnet::{ config::TrainingConfig, train::Trainer };
//!
//! let config = TrainingConfig { epochs: 1, ..TrainingConfig::default() };
//! let mut trainer = Trainer::new(config)?;
//! for report in trainer.run()? {
//!   println!("{report:?}");
//! }
//! # Ok::<(), digitnet::Error>(())
//! ```
//!
//! # Optional features
//!
//! Some features can be toggled in your `Cargo.toml`.
//!
//! - `unsafe` *(default)* — Accelerated matrix math using [matrixmultiply] crate.
//! - `rayon` — Parallel fallback matrix multiplication when `unsafe` is disabled.

mod internal;
mod shape;
mod tensor;
mod variable;
mod error;

pub mod ops;
pub mod scalar;
pub mod optimize;
pub mod mnist;
pub mod model;
pub mod serialize;
pub mod config;
pub mod train;

pub use shape::Shape;
pub use tensor::Tensor;
pub use variable::{ Variable, GraphStats, Module, Linear, UnaryOp, BinaryOp };
pub use error::{ Error, Result };
