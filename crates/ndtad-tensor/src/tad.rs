//! Tensor-along-dimension decomposition.
//!
//! A TAD pack splits a tensor into sub-tensors that vary along a set of axes while
//! every other axis is fixed. All slices share one sub-shape; they differ only by
//! their base offset into the parent buffer.

use serde::{Deserialize, Serialize};

use crate::{
    shape::{normalize_axes, ShapeDescriptor},
    TensorError,
};

/// Shared sub-shape and per-slice base offsets of a TAD decomposition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TadPack {
    shape: ShapeDescriptor,
    offsets: Vec<usize>,
}

impl TadPack {
    /// Builds a pack from an externally computed sub-shape and offsets.
    pub fn new(shape: ShapeDescriptor, offsets: Vec<usize>) -> Self {
        Self { shape, offsets }
    }

    /// A pack holding a single slice that spans the whole tensor.
    pub fn whole(desc: &ShapeDescriptor) -> Self {
        Self {
            shape: desc.clone(),
            offsets: vec![0],
        }
    }

    /// The sub-shape shared by every slice.
    #[inline]
    pub fn shape(&self) -> &ShapeDescriptor {
        &self.shape
    }

    /// Base offset of every slice, in elements.
    #[inline]
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Number of elements in one slice.
    #[inline]
    pub fn tad_length(&self) -> usize {
        self.shape.len()
    }

    /// Number of slices.
    #[inline]
    pub fn num_tads(&self) -> usize {
        self.offsets.len()
    }
}

/// Splits `desc` into slices spanning `axes`, one per combination of the other axes.
///
/// Slices are enumerated in row-major order over the remaining axes. With no axes
/// every element is its own slice; with all axes there is one slice.
///
/// # Errors
///
/// Fails if an axis is out of range or repeated.
///
/// # Example
///
/// ```rust
/// use ndtad_tensor::{build_tad, DataType, Order, ShapeDescriptor};
///
/// let desc = ShapeDescriptor::new(&[2, 3], DataType::F32, Order::C).unwrap();
/// // rows
/// let rows = build_tad(&desc, &[1]).unwrap();
/// assert_eq!(rows.offsets(), &[0, 3]);
/// assert_eq!(rows.tad_length(), 3);
/// // columns
/// let cols = build_tad(&desc, &[0]).unwrap();
/// assert_eq!(cols.offsets(), &[0, 1, 2]);
/// assert_eq!(cols.shape().strides(), &[3]);
/// ```
pub fn build_tad(desc: &ShapeDescriptor, axes: &[usize]) -> Result<TadPack, TensorError> {
    let axes = normalize_axes(axes, desc.rank())?;
    let shape = desc.select_axes(&axes);

    let kept: Vec<(usize, usize)> = (0..desc.rank())
        .filter(|d| axes.binary_search(d).is_err())
        .map(|d| (desc.shape()[d], desc.strides()[d]))
        .collect();

    let num_tads = if desc.is_empty() {
        0
    } else {
        kept.iter().map(|&(size, _)| size).product()
    };

    let offsets = (0..num_tads)
        .map(|t| {
            let mut remaining = t;
            let mut offset = 0;
            for &(size, stride) in kept.iter().rev() {
                offset += (remaining % size) * stride;
                remaining /= size;
            }
            offset
        })
        .collect();

    log::debug!(
        "built tad pack: axes {:?}, {} slices of length {}",
        axes,
        num_tads,
        shape.len()
    );

    Ok(TadPack { shape, offsets })
}
