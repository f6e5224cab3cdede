use std::path::PathBuf;


/// Errors raised while loading data or reading and writing artifacts.
///
/// Shape mismatches inside tensor math are programmer errors and panic instead.

#[derive(thiserror::Error, Debug)]
pub enum Error {
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("File not found: {}", .0.display())]
  NotFound(PathBuf),

  #[error("Invalid IDX file {}: {reason}", .file.display())]
  InvalidIdx { file: PathBuf, reason: String },

  #[error("Serialization error: {0}")]
  Serialization(String),

  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("Invalid configuration: {0}")]
  InvalidConfig(String),

  #[error("Parameter mismatch: {0}")]
  ParameterMismatch(String),
}

impl From<postcard::Error> for Error {
  fn from(err: postcard::Error) -> Self {
    Self::Serialization(err.to_string())
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
