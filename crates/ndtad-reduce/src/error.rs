use ndtad_tensor::{DataType, TensorError};
use thiserror::Error;

use crate::parallel::ParallelError;

/// An error type for paired-reduction execution.
#[derive(Debug, Error, PartialEq)]
pub enum Reduce3Error {
    /// The opcode does not name a reduction operator.
    #[error("Unknown reduce3 opcode {0}")]
    UnknownOpcode(i32),

    /// No kernel is registered for the input and output element types.
    #[error("No reduce3 kernel for input type {x} and output type {z}")]
    UnsupportedTypePair {
        /// Element type of the inputs
        x: DataType,
        /// Element type of the output
        z: DataType,
    },

    /// The two inputs have different element types.
    #[error("Input types differ: x is {x}, y is {y}")]
    InputTypeMismatch {
        /// Element type of x
        x: DataType,
        /// Element type of y
        y: DataType,
    },

    /// The two inputs of a full reduction have different lengths.
    #[error("Input lengths differ: x has {x} elements, y has {y}")]
    LengthMismatch {
        /// Number of elements in x
        x: usize,
        /// Number of elements in y
        y: usize,
    },

    /// Paired slices have different lengths.
    #[error("Slice lengths differ: x slices hold {x} elements, y slices hold {y}")]
    SliceLengthMismatch {
        /// Elements per x slice
        x: usize,
        /// Elements per y slice
        y: usize,
    },

    /// The slice counts of x and y cannot be paired.
    #[error("Slice counts differ: x has {x} slices, y has {y}")]
    TadCountMismatch {
        /// Number of x slices
        x: usize,
        /// Number of y slices
        y: usize,
    },

    /// The output does not hold one element per result.
    #[error("Output holds {actual} elements, expected {expected}")]
    OutputLengthMismatch {
        /// Number of results produced by the reduction
        expected: usize,
        /// Number of elements in the output
        actual: usize,
    },

    /// Tensor metadata or buffer access failed.
    #[error(transparent)]
    TensorError(#[from] TensorError),

    /// The worker pool could not be set up.
    #[error(transparent)]
    ParallelError(#[from] ParallelError),
}
