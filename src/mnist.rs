//! Loader for the MNIST dataset in IDX format.
//!
//! The four files are looked up by their usual names in a directory, either
//! plain or gzip-compressed:
//!
//! - `train-images-idx3-ubyte` / `train-labels-idx1-ubyte` (60 000 examples)
//! - `t10k-images-idx3-ubyte` / `t10k-labels-idx1-ubyte` (10 000 examples)

use std::fs::File;
use std::io::{ BufReader, Read };
use std::path::{ Path, PathBuf };

use flate2::read::GzDecoder;
use tracing::{ debug, warn };

use crate::{ Tensor, Error, Result };


pub const IMAGE_MAGIC: u32 = 2051;
pub const LABEL_MAGIC: u32 = 2049;

pub const NUM_TRAIN: usize = 60_000;
pub const NUM_TEST: usize = 10_000;
pub const NUM_CLASSES: usize = 10;


/// Images and their labels.
///
/// Images are stored as `[n, rows * cols]` pixels in `[0, 1]`.

#[derive(Debug, Clone)]
pub struct Mnist {
  pub images: Tensor<f32>,
  pub labels: Tensor<u8>,
}

impl Mnist {
  pub fn new(images: Tensor<f32>, labels: Tensor<u8>) -> Self {
    assert_eq!(images.dims()[0], labels.dims()[0],
      "{} images don't match {} labels", images.dims()[0], labels.dims()[0]);
    Self { images, labels }
  }

  pub fn len(&self) -> usize {
    self.labels.size()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Number of pixels per image.

  pub fn pixels(&self) -> usize {
    self.images.dims()[1]
  }

  /// Split into the first `n` examples and the rest, without copying.

  pub fn split(&self, n: usize) -> (Self, Self) {
    assert!(n <= self.len(), "Cannot split {} examples at {n}", self.len());
    let n = n as isize;
    let len = self.len() as isize;
    (
      Self::new(self.images.range(&[0..n]), self.labels.range(&[0..n])),
      Self::new(self.images.range(&[n..len]), self.labels.range(&[n..len])),
    )
  }

  /// Gather the examples at `indices` into a new minibatch.

  pub fn batch(&self, indices: &[usize]) -> Self {
    Self::new(self.images.gather(indices), self.labels.gather(indices))
  }

  /// Append `other`'s examples to this set's.

  pub fn concat(&self, other: &Self) -> Self {
    assert_eq!(self.pixels(), other.pixels(), "Image sizes differ");
    let mut images = self.images.to_vec();
    images.extend(other.images.param_iter());
    let mut labels = self.labels.to_vec();
    labels.extend(other.labels.param_iter());
    let len = labels.len();
    Self::new(
      Tensor::new(&[len, self.pixels()], images),
      Tensor::from_vec(labels),
    )
  }
}


/// Load training and test files from `dir` and concatenate them
/// into a single set of 70 000 examples, training examples first.

pub fn load_mnist_data(dir: impl AsRef<Path>) -> Result<Mnist> {
  let dir = dir.as_ref();
  let train = load_files(dir, "train-images", "train-labels")?;
  let test = load_files(dir, "t10k-images", "t10k-labels")?;
  if train.len() != NUM_TRAIN || test.len() != NUM_TEST {
    warn!("unusual MNIST split of {} training and {} test examples", train.len(), test.len());
  }
  Ok(train.concat(&test))
}

/// Load a single pair of image and label files.

pub fn load_files(dir: &Path, images: &str, labels: &str) -> Result<Mnist> {
  let images_path = find_file(dir, images, "idx3-ubyte")?;
  let labels_path = find_file(dir, labels, "idx1-ubyte")?;
  let images = parse_images(&read_file(&images_path)?, &images_path)?;
  let labels = parse_labels(&read_file(&labels_path)?, &labels_path)?;
  if images.dims()[0] != labels.size() {
    return Err(Error::InvalidIdx {
      file: labels_path,
      reason: format!("{} labels for {} images", labels.size(), images.dims()[0]),
    })
  }
  Ok(Mnist::new(images, labels))
}

fn find_file(dir: &Path, stem: &str, kind: &str) -> Result<PathBuf> {
  let candidates = [
    format!("{stem}-{kind}"),
    format!("{stem}.{kind}"),
    format!("{stem}-{kind}.gz"),
    format!("{stem}.{kind}.gz"),
  ];
  candidates.iter()
    .map(|name| dir.join(name) )
    .find(|path| path.is_file() )
    .ok_or_else(|| Error::NotFound(dir.join(&candidates[0])) )
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
  let reader = BufReader::new(File::open(path)?);
  let mut bytes = vec![];
  if path.extension().map_or(false, |ext| ext == "gz") {
    GzDecoder::new(reader).read_to_end(&mut bytes)?;
  } else {
    let mut reader = reader;
    reader.read_to_end(&mut bytes)?;
  }
  debug!("read {} bytes from {}", bytes.len(), path.display());
  Ok(bytes)
}

fn read_be_u32(bytes: &[u8], offset: &mut usize, file: &Path) -> Result<u32> {
  let word = bytes.get(*offset..*offset + 4).ok_or_else(|| Error::InvalidIdx {
    file: file.to_path_buf(),
    reason: "truncated header".to_string(),
  })?;
  *offset += 4;
  Ok(u32::from_be_bytes([word[0], word[1], word[2], word[3]]))
}

fn expect_magic(bytes: &[u8], offset: &mut usize, magic: u32, file: &Path) -> Result<()> {
  let found = read_be_u32(bytes, offset, file)?;
  if found != magic {
    return Err(Error::InvalidIdx {
      file: file.to_path_buf(),
      reason: format!("magic number {found}, expected {magic}"),
    })
  }
  Ok(())
}

// Exactly `len` bytes following the header
fn payload<'a>(bytes: &'a [u8], offset: usize, len: usize, file: &Path, what: &str) -> Result<&'a [u8]> {
  offset.checked_add(len)
    .and_then(|end| bytes.get(offset..end) )
    .ok_or_else(|| Error::InvalidIdx {
      file: file.to_path_buf(),
      reason: format!("expected {len} {what}, found {}", bytes.len().saturating_sub(offset)),
    })
}

/// Parse an IDX3 image file into `[n, rows * cols]` pixels scaled to `[0, 1]`.

pub fn parse_images(bytes: &[u8], file: &Path) -> Result<Tensor<f32>> {
  let mut offset = 0;
  expect_magic(bytes, &mut offset, IMAGE_MAGIC, file)?;
  let count = read_be_u32(bytes, &mut offset, file)? as usize;
  let rows = read_be_u32(bytes, &mut offset, file)? as usize;
  let cols = read_be_u32(bytes, &mut offset, file)? as usize;
  let size = count.checked_mul(rows)
    .and_then(|n| n.checked_mul(cols) )
    .ok_or_else(|| Error::InvalidIdx {
      file: file.to_path_buf(),
      reason: format!("{count} images of {rows}x{cols} pixels exceed the address space"),
    })?;
  let pixels = payload(bytes, offset, size, file, "pixel bytes")?;
  debug!("{count} images of {rows}x{cols} pixels in {}", file.display());
  let data = pixels.iter().map(|&p| p as f32 / 255.0 ).collect();
  Ok(Tensor::new(&[count, rows * cols], data))
}

/// Parse an IDX1 label file.

pub fn parse_labels(bytes: &[u8], file: &Path) -> Result<Tensor<u8>> {
  let mut offset = 0;
  expect_magic(bytes, &mut offset, LABEL_MAGIC, file)?;
  let count = read_be_u32(bytes, &mut offset, file)? as usize;
  let labels = payload(bytes, offset, count, file, "labels")?;
  if let Some(&label) = labels.iter().find(|&&label| label as usize >= NUM_CLASSES ) {
    return Err(Error::InvalidIdx {
      file: file.to_path_buf(),
      reason: format!("label {label} out of range"),
    })
  }
  debug!("{count} labels in {}", file.display());
  Ok(Tensor::vec(labels))
}


#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;
  use flate2::{ Compression, write::GzEncoder };

  fn idx_images(count: u32, rows: u32, cols: u32, pixels: &[u8]) -> Vec<u8> {
    let mut bytes = vec![];
    for word in [IMAGE_MAGIC, count, rows, cols] {
      bytes.extend_from_slice(&word.to_be_bytes());
    }
    bytes.extend_from_slice(pixels);
    bytes
  }

  fn idx_labels(labels: &[u8]) -> Vec<u8> {
    let mut bytes = vec![];
    for word in [LABEL_MAGIC, labels.len() as u32] {
      bytes.extend_from_slice(&word.to_be_bytes());
    }
    bytes.extend_from_slice(labels);
    bytes
  }

  fn path() -> PathBuf {
    PathBuf::from("test-idx")
  }

  #[test]
  fn images() {
    let bytes = idx_images(2, 1, 2, &[0, 255, 51, 102]);
    let images = parse_images(&bytes, &path()).unwrap();
    assert_eq!(images, Tensor::new(&[2,2], vec![0.0, 1.0, 0.2, 0.4]));
  }

  #[test]
  fn labels() {
    let labels = parse_labels(&idx_labels(&[3, 1, 4]), &path()).unwrap();
    assert_eq!(labels, Tensor::vec(&[3u8, 1, 4]));
  }

  #[test]
  fn bad_magic() {
    let bytes = idx_labels(&[1]);
    assert!(matches!(parse_images(&bytes, &path()), Err(Error::InvalidIdx { .. })));
    let bytes = idx_images(1, 1, 1, &[0]);
    assert!(matches!(parse_labels(&bytes, &path()), Err(Error::InvalidIdx { .. })));
  }

  #[test]
  fn truncated() {
    let bytes = idx_images(2, 2, 2, &[0; 7]);
    assert!(matches!(parse_images(&bytes, &path()), Err(Error::InvalidIdx { .. })));
    let bytes = idx_labels(&[1, 2]);
    assert!(matches!(parse_labels(&bytes[..9], &path()), Err(Error::InvalidIdx { .. })));
    assert!(matches!(parse_labels(&bytes[..3], &path()), Err(Error::InvalidIdx { .. })));
  }

  #[test]
  fn oversized_header() {
    let bytes = idx_images(u32::MAX, u32::MAX, u32::MAX, &[0; 4]);
    assert!(matches!(parse_images(&bytes, &path()), Err(Error::InvalidIdx { .. })));
    let mut bytes = idx_labels(&[1]);
    bytes[4..8].copy_from_slice(&u32::MAX.to_be_bytes());
    assert!(matches!(parse_labels(&bytes, &path()), Err(Error::InvalidIdx { .. })));
  }

  #[test]
  fn label_out_of_range() {
    assert!(parse_labels(&idx_labels(&[10]), &path()).is_err());
  }

  #[test]
  fn split_and_batch() {
    let images = Tensor::arrange(&[4,2], 0.0, 1.0);
    let data = Mnist::new(images, Tensor::vec(&[0u8, 1, 2, 3]));
    let (train, test) = data.split(3);
    assert_eq!(train.len(), 3);
    assert_eq!(test.len(), 1);
    assert_eq!(test.images, Tensor::new(&[1,2], vec![6.0, 7.0]));
    let batch = train.batch(&[2, 0]);
    assert_eq!(batch.labels, Tensor::vec(&[2u8, 0]));
    assert_eq!(batch.images, Tensor::new(&[2,2], vec![4.0, 5.0, 0.0, 1.0]));
    let batch = test.batch(&[0]);
    assert_eq!(batch.labels, Tensor::vec(&[3u8]));
  }

  #[test]
  fn load_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("train-images-idx3-ubyte"), idx_images(2, 1, 1, &[0, 255])).unwrap();
    std::fs::write(dir.path().join("train-labels-idx1-ubyte"), idx_labels(&[5, 7])).unwrap();
    // Test files gzipped with the dotted naming
    let mut gz = GzEncoder::new(vec![], Compression::default());
    gz.write_all(&idx_images(1, 1, 1, &[51])).unwrap();
    std::fs::write(dir.path().join("t10k-images.idx3-ubyte.gz"), gz.finish().unwrap()).unwrap();
    std::fs::write(dir.path().join("t10k-labels-idx1-ubyte"), idx_labels(&[9])).unwrap();

    let data = load_mnist_data(dir.path()).unwrap();
    assert_eq!(data.len(), 3);
    assert_eq!(data.labels, Tensor::vec(&[5u8, 7, 9]));
    assert_eq!(data.images, Tensor::new(&[3,1], vec![0.0, 1.0, 0.2]));
  }

  #[test]
  fn missing_files() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(load_mnist_data(dir.path()), Err(Error::NotFound(_))));
  }

  #[test]
  fn count_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("train-images-idx3-ubyte"), idx_images(2, 1, 1, &[0, 255])).unwrap();
    std::fs::write(dir.path().join("train-labels-idx1-ubyte"), idx_labels(&[5])).unwrap();
    assert!(load_files(dir.path(), "train-images", "train-labels").is_err());
  }
}
