//! Dataset storage and loaders.
//!
//! A [`Dataset`] is a validated sequence of `(input, target)` pairs stored in two
//! contiguous row-major buffers. [`TrainUnit`] is the owned per-sample form used to
//! build one.
//!
//! [`read_idx`] loads an image/label pair in the big-endian IDX format used by MNIST.

use std::path::Path;

use crate::{Error, Result};

/// One `(input, target)` training pair.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainUnit {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl TrainUnit {
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Self {
        Self { x, y }
    }
}

/// A supervised dataset: inputs (X) and targets (Y).
///
/// Stored as contiguous buffers with row-major layout:
/// - `inputs.len() == len * input_dim`
/// - `targets.len() == len * target_dim`
///
/// `input_dim` may be zero (bias-only networks); `target_dim` may not.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    inputs: Vec<f64>,
    targets: Vec<f64>,
    len: usize,
    input_dim: usize,
    target_dim: usize,
}

impl Dataset {
    /// An empty dataset with the given row shapes.
    pub fn empty(input_dim: usize, target_dim: usize) -> Result<Self> {
        Self::from_flat(Vec::new(), Vec::new(), input_dim, target_dim)
    }

    /// Build a dataset from flat buffers.
    ///
    /// `inputs` is `(len, input_dim)` and `targets` is `(len, target_dim)`; `len` is
    /// inferred from `targets`.
    pub fn from_flat(
        inputs: Vec<f64>,
        targets: Vec<f64>,
        input_dim: usize,
        target_dim: usize,
    ) -> Result<Self> {
        if target_dim == 0 {
            return Err(Error::InvalidData("target_dim must be > 0".to_owned()));
        }
        if !targets.len().is_multiple_of(target_dim) {
            return Err(Error::InvalidData(format!(
                "targets length {} is not divisible by target_dim {target_dim}",
                targets.len()
            )));
        }
        let len = targets.len() / target_dim;
        if inputs.len() != len * input_dim {
            return Err(Error::InvalidData(format!(
                "inputs length {} does not match len * input_dim ({len} * {input_dim})",
                inputs.len()
            )));
        }

        Ok(Self {
            inputs,
            targets,
            len,
            input_dim,
            target_dim,
        })
    }

    /// Build a dataset from per-sample rows.
    ///
    /// This is a convenience constructor (it copies into contiguous storage).
    pub fn from_rows(inputs: &[Vec<f64>], targets: &[Vec<f64>]) -> Result<Self> {
        if inputs.len() != targets.len() {
            return Err(Error::InvalidData(format!(
                "inputs/targets length mismatch: {} vs {}",
                inputs.len(),
                targets.len()
            )));
        }
        if inputs.is_empty() {
            return Err(Error::InvalidData("rows must not be empty".to_owned()));
        }

        let input_dim = inputs[0].len();
        let target_dim = targets[0].len();
        for (i, (x, y)) in inputs.iter().zip(targets).enumerate() {
            if x.len() != input_dim {
                return Err(Error::InvalidData(format!(
                    "input row {i} has len {}, expected {input_dim}",
                    x.len()
                )));
            }
            if y.len() != target_dim {
                return Err(Error::InvalidData(format!(
                    "target row {i} has len {}, expected {target_dim}",
                    y.len()
                )));
            }
        }

        Self::from_flat(inputs.concat(), targets.concat(), input_dim, target_dim)
    }

    /// Build a dataset from owned training pairs.
    pub fn from_units(units: &[TrainUnit]) -> Result<Self> {
        let (xs, ys): (Vec<_>, Vec<_>) = units.iter().map(|u| (u.x.clone(), u.y.clone())).unzip();
        Self::from_rows(&xs, &ys)
    }

    #[inline]
    /// Returns the number of samples.
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    /// Returns true if there are no samples.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    #[inline]
    pub fn target_dim(&self) -> usize {
        self.target_dim
    }

    #[inline]
    /// Returns the `idx`-th input row.
    ///
    /// Panics if `idx >= len`.
    pub fn input(&self, idx: usize) -> &[f64] {
        assert!(idx < self.len, "sample {idx} out of range for len {}", self.len);
        let start = idx * self.input_dim;
        &self.inputs[start..start + self.input_dim]
    }

    #[inline]
    /// Returns the `idx`-th target row.
    ///
    /// Panics if `idx >= len`.
    pub fn target(&self, idx: usize) -> &[f64] {
        let start = idx * self.target_dim;
        &self.targets[start..start + self.target_dim]
    }

    /// Iterate over `(input, target)` pairs in storage order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&[f64], &[f64])> + '_ {
        (0..self.len).map(move |i| (self.input(i), self.target(i)))
    }

    /// Owned copy of sample `idx`.
    pub fn unit(&self, idx: usize) -> TrainUnit {
        TrainUnit::new(self.input(idx).to_vec(), self.target(idx).to_vec())
    }

    /// Keep the first `n` samples (or all of them if there are fewer).
    pub fn truncate(&mut self, n: usize) {
        if n < self.len {
            self.len = n;
            self.inputs.truncate(n * self.input_dim);
            self.targets.truncate(n * self.target_dim);
        }
    }
}

const IDX_IMAGES_MAGIC: u32 = 2051;
const IDX_LABELS_MAGIC: u32 = 2049;

/// Load an IDX image file and its label file.
///
/// Pixels are scaled to `[0, 1]`; labels are one-hot encoded over `classes` entries.
pub fn read_idx<P: AsRef<Path>, Q: AsRef<Path>>(
    images_path: P,
    labels_path: Q,
    classes: usize,
) -> Result<Dataset> {
    let read = |p: &Path| {
        std::fs::read(p).map_err(|e| Error::Io(format!("failed to read {}: {e}", p.display())))
    };
    let images = read(images_path.as_ref())?;
    let labels = read(labels_path.as_ref())?;
    parse_idx(&images, &labels, classes)
}

/// Parse in-memory IDX image and label buffers. See [`read_idx`].
pub fn parse_idx(images: &[u8], labels: &[u8], classes: usize) -> Result<Dataset> {
    if classes == 0 {
        return Err(Error::InvalidConfig("classes must be > 0".to_owned()));
    }

    let mut img = ByteReader::new(images);
    let magic = img.u32_be()?;
    if magic != IDX_IMAGES_MAGIC {
        return Err(Error::InvalidData(format!(
            "bad IDX image magic number {magic}, expected {IDX_IMAGES_MAGIC}"
        )));
    }
    let count = img.u32_be()? as usize;
    let rows = img.u32_be()? as usize;
    let cols = img.u32_be()? as usize;
    let pixels_per_image = rows * cols;

    let mut lab = ByteReader::new(labels);
    let magic = lab.u32_be()?;
    if magic != IDX_LABELS_MAGIC {
        return Err(Error::InvalidData(format!(
            "bad IDX label magic number {magic}, expected {IDX_LABELS_MAGIC}"
        )));
    }
    let label_count = lab.u32_be()? as usize;
    if label_count != count {
        return Err(Error::InvalidData(format!(
            "image count {count} does not match label count {label_count}"
        )));
    }

    let total = count
        .checked_mul(pixels_per_image)
        .ok_or_else(|| Error::InvalidData("IDX image shape overflow".to_owned()))?;
    let pixels = img.take(total)?;
    let label_bytes = lab.take(count)?;

    let inputs: Vec<f64> = pixels.iter().map(|&p| f64::from(p) / 255.0).collect();
    let mut targets = vec![0.0; count * classes];
    for (i, &label) in label_bytes.iter().enumerate() {
        let label = usize::from(label);
        if label >= classes {
            return Err(Error::InvalidData(format!(
                "label {label} of sample {i} is out of range for {classes} classes"
            )));
        }
        targets[i * classes + label] = 1.0;
    }

    tracing::debug!(count, rows, cols, classes, "parsed idx dataset");
    Dataset::from_flat(inputs, targets, pixels_per_image, classes)
}

struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| {
                Error::InvalidData(format!(
                    "unexpected end of IDX data: wanted {n} bytes at offset {}",
                    self.pos
                ))
            })?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u32_be(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}
