#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! # Overview
//!
//! A paired reduction folds two arrays element by element into distances or
//! similarities. [`Reduce3Executor`] runs one over whole arrays, along a set of axes,
//! or for every pair of slices of the two inputs. Kernels are looked up by operator
//! and by input and output element type, and pick their addressing scheme from the
//! layout of the inputs.
//!
//! # Quick Start
//!
//! ```rust
//! use ndtad_reduce::{ExtraParams, Reduce3Executor, Reduce3Op};
//! use ndtad_tensor::{DataType, NdArray, Order};
//!
//! let x = NdArray::from_values(Order::C, &[3], &[1.0f64, 2.0, 2.0]).unwrap();
//! let y = NdArray::from_values(Order::C, &[3], &[0.0f64, 0.0, 0.0]).unwrap();
//! let mut z = NdArray::zero_scalar(DataType::F64).unwrap();
//!
//! Reduce3Executor::default()
//!     .exec_scalar(Reduce3Op::EuclideanDistance, &x, &y, &ExtraParams::default(), &mut z)
//!     .unwrap();
//! assert_eq!(z.get::<f64>(&[]).unwrap(), 3.0);
//! ```

/// Execution settings.
pub mod config;

/// Error types for the reduction engine.
pub mod error;

/// Orchestration of full, axis and all-pairs reductions.
pub mod executor;

mod kernels;

/// The reduction operator set.
pub mod ops;

/// Rayon-based work distribution.
pub mod parallel;

mod registry;

pub use crate::config::Reduce3Config;
pub use crate::error::Reduce3Error;
pub use crate::executor::Reduce3Executor;
pub use crate::ops::{to_accumulator, Accumulator, AuxSlots, ExtraParams, PairwiseReduction, Reduce3Op};
pub use crate::parallel::{ExecutionStrategy, ParallelError};
pub use crate::registry::is_supported;
