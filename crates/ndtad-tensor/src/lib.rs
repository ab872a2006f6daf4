#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! # Overview
//!
//! `ndtad-tensor` describes N-dimensional arrays as a byte buffer paired with a shape
//! descriptor. The descriptor carries the dimensions, per-dimension strides, the
//! memory order, the element type and property flags, so one handle type covers
//! row-major and column-major data as well as strided views of any element type.
//!
//! # Architecture
//!
//! - **ShapeDescriptor**: validated metadata with offset arithmetic
//! - **TensorStorage**: reference-counted buffer tagged with its [`Ownership`]
//! - **NdArray**: the tensor handle, built through the factory constructors
//! - **TadPack**: decomposition of an array into slices along chosen axes
//! - **TensorAllocator**: pluggable allocation, with heap and arena implementations
//!
//! # Quick Start
//!
//! ```rust
//! use ndtad_tensor::{build_tad, NdArray, Order};
//!
//! let t = NdArray::from_values(Order::C, &[2, 3], &[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
//! assert_eq!(t.get::<f32>(&[1, 2]).unwrap(), 6.0);
//!
//! // a transposed view shares the buffer
//! let tt = t.permute_axes(&[1, 0]).unwrap();
//! assert_eq!(tt.to_vec::<f32>().unwrap(), vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
//!
//! // one slice per row
//! let rows = build_tad(t.descriptor(), &[1]).unwrap();
//! assert_eq!(rows.num_tads(), 2);
//! ```

/// Allocator module containing memory management utilities.
pub mod allocator;

/// Element type tags and the typed element trait.
pub mod dtype;

/// Constructors for array handles.
pub mod factory;

/// Shape descriptors, memory order and stride utilities.
pub mod shape;

/// Storage module containing low-level memory buffer implementations.
pub mod storage;

/// Tensor-along-dimension decomposition.
pub mod tad;

/// Tensor module containing the array handle and error types.
pub mod tensor;

/// Non-owning views into array data.
pub mod view;

pub use half::{bf16, f16};

pub use crate::allocator::{ArenaAllocator, CpuAllocator, TensorAllocator, TensorAllocatorError};
pub use crate::dtype::{DataType, TensorElement};
pub use crate::shape::{
    get_strides_from_shape, normalize_axes, ArrayFlags, Order, ShapeDescriptor, MAX_RANK,
};
pub use crate::storage::{Ownership, TensorStorage};
pub use crate::tad::{build_tad, TadPack};
pub use crate::tensor::{NdArray, TensorError};
pub use crate::view::{TensorView, TensorViewMut};
