use ndtad_tensor::{build_tad, NdArray, TadPack, TensorAllocator, TensorError};

use crate::{
    config::Reduce3Config,
    error::Reduce3Error,
    kernels::paired_output_len,
    ops::{ExtraParams, Reduce3Op},
    registry::{lookup, Reduce3Kernel},
};

/// Runs paired reductions of two arrays into an output array.
///
/// Inputs share one element type; the output is a float type. Every entry point
/// validates its arguments before any buffer is touched and writes only `z`.
///
/// # Example
///
/// ```rust
/// use ndtad_reduce::{ExtraParams, Reduce3Executor, Reduce3Op};
/// use ndtad_tensor::{DataType, NdArray, Order};
///
/// let x = NdArray::from_values(Order::C, &[2, 2], &[1.0f32, 2.0, 3.0, 4.0]).unwrap();
/// let y = NdArray::from_values(Order::C, &[2, 2], &[1.0f32, 0.0, 3.0, 0.0]).unwrap();
/// let mut z = NdArray::from_shape(Order::C, &[2], DataType::F32).unwrap();
///
/// let executor = Reduce3Executor::default();
/// executor
///     .exec(Reduce3Op::ManhattanDistance, &x, &y, &ExtraParams::default(), &mut z, &[1])
///     .unwrap();
/// assert_eq!(z.to_vec::<f32>().unwrap(), vec![2.0, 4.0]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Reduce3Executor {
    config: Reduce3Config,
}

impl Reduce3Executor {
    /// Creates an executor with the given configuration.
    pub fn new(config: Reduce3Config) -> Self {
        Self { config }
    }

    /// The executor configuration.
    pub fn config(&self) -> &Reduce3Config {
        &self.config
    }

    fn kernel<A, B, C>(
        &self,
        op: Reduce3Op,
        x: &NdArray<A>,
        y: &NdArray<B>,
        z: &NdArray<C>,
    ) -> Result<Reduce3Kernel, Reduce3Error>
    where
        A: TensorAllocator,
        B: TensorAllocator,
        C: TensorAllocator,
    {
        if x.dtype() != y.dtype() {
            return Err(Reduce3Error::InputTypeMismatch {
                x: x.dtype(),
                y: y.dtype(),
            });
        }
        lookup(op, x.dtype(), z.dtype())
    }

    /// Reduces all elements of `x` and `y` pairwise into the single element of `z`.
    ///
    /// Elements are paired by logical position.
    ///
    /// # Errors
    ///
    /// Fails on mismatched input types or lengths, an unsupported type pair, or an
    /// output that does not hold exactly one element.
    pub fn exec_scalar<A, B, C>(
        &self,
        op: Reduce3Op,
        x: &NdArray<A>,
        y: &NdArray<B>,
        params: &ExtraParams,
        z: &mut NdArray<C>,
    ) -> Result<(), Reduce3Error>
    where
        A: TensorAllocator,
        B: TensorAllocator,
        C: TensorAllocator,
    {
        let kernel = self.kernel(op, x, y, z)?;
        if x.len() != y.len() {
            return Err(Reduce3Error::LengthMismatch {
                x: x.len(),
                y: y.len(),
            });
        }
        if z.len() != 1 {
            return Err(Reduce3Error::OutputLengthMismatch {
                expected: 1,
                actual: z.len(),
            });
        }
        log::debug!(
            "reduce3 {} scalar: {} elements, strategy {:?}",
            op,
            x.len(),
            self.config.strategy
        );
        (kernel.scalar)(x.view(), y.view(), params, &self.config, z.view_mut()?)
    }

    /// Reduces `x` and `y` along `axes`, producing one output per slice.
    ///
    /// When `z` holds a single element the whole arrays are reduced and `axes` is
    /// ignored. When both inputs have the same length, slice `i` of x pairs with slice
    /// `i` of y. Otherwise the larger input is sliced and the smaller one is reused
    /// whole against every slice.
    ///
    /// # Errors
    ///
    /// Fails on invalid axes, mismatched input types, slices of different lengths, an
    /// unsupported type pair, or an output whose length differs from the number of
    /// slices.
    pub fn exec<A, B, C>(
        &self,
        op: Reduce3Op,
        x: &NdArray<A>,
        y: &NdArray<B>,
        params: &ExtraParams,
        z: &mut NdArray<C>,
        axes: &[usize],
    ) -> Result<(), Reduce3Error>
    where
        A: TensorAllocator,
        B: TensorAllocator,
        C: TensorAllocator,
    {
        if z.is_scalar() {
            return self.exec_scalar(op, x, y, params, z);
        }

        let (x_pack, y_pack) = if x.len() == y.len() {
            (
                build_tad(x.descriptor(), axes)?,
                build_tad(y.descriptor(), axes)?,
            )
        } else if x.len() > y.len() {
            (
                build_tad(x.descriptor(), axes)?,
                TadPack::whole(y.descriptor()),
            )
        } else {
            (
                TadPack::whole(x.descriptor()),
                build_tad(y.descriptor(), axes)?,
            )
        };
        self.run_paired(op, x, &x_pack, y, &y_pack, params, z)
    }

    /// Reduces pre-tiled slices of `x` against `y`.
    ///
    /// With `y_tads` slice `i` of x pairs with slice `i` of y; without it `y` is
    /// reused whole against every slice of x.
    ///
    /// # Errors
    ///
    /// As [`Reduce3Executor::exec`], and fails if a pack addresses elements outside
    /// its array.
    #[allow(clippy::too_many_arguments)]
    pub fn exec_tad<A, B, C>(
        &self,
        op: Reduce3Op,
        x: &NdArray<A>,
        x_tads: &TadPack,
        y: &NdArray<B>,
        y_tads: Option<&TadPack>,
        params: &ExtraParams,
        z: &mut NdArray<C>,
    ) -> Result<(), Reduce3Error>
    where
        A: TensorAllocator,
        B: TensorAllocator,
        C: TensorAllocator,
    {
        let whole;
        let y_pack = match y_tads {
            Some(pack) => pack,
            None => {
                whole = TadPack::whole(y.descriptor());
                &whole
            }
        };
        self.run_paired(op, x, x_tads, y, y_pack, params, z)
    }

    /// Reduces every slice of `x` against every slice of `y`.
    ///
    /// The result of x slice `r` and y slice `g` is stored at `r * y_slices + g`.
    ///
    /// # Errors
    ///
    /// Fails on invalid axes, mismatched input types, slices of different lengths, an
    /// unsupported type pair, or an output that does not hold one element per pair.
    pub fn exec_all<A, B, C>(
        &self,
        op: Reduce3Op,
        x: &NdArray<A>,
        y: &NdArray<B>,
        params: &ExtraParams,
        z: &mut NdArray<C>,
        axes: &[usize],
    ) -> Result<(), Reduce3Error>
    where
        A: TensorAllocator,
        B: TensorAllocator,
        C: TensorAllocator,
    {
        let x_pack = build_tad(x.descriptor(), axes)?;
        let y_pack = build_tad(y.descriptor(), axes)?;
        self.exec_all_tad(op, x, &x_pack, y, &y_pack, params, z)
    }

    /// All-pairs reduction over pre-tiled slices.
    ///
    /// # Errors
    ///
    /// As [`Reduce3Executor::exec_all`], and fails if a pack addresses elements
    /// outside its array.
    #[allow(clippy::too_many_arguments)]
    pub fn exec_all_tad<A, B, C>(
        &self,
        op: Reduce3Op,
        x: &NdArray<A>,
        x_tads: &TadPack,
        y: &NdArray<B>,
        y_tads: &TadPack,
        params: &ExtraParams,
        z: &mut NdArray<C>,
    ) -> Result<(), Reduce3Error>
    where
        A: TensorAllocator,
        B: TensorAllocator,
        C: TensorAllocator,
    {
        let kernel = self.kernel(op, x, y, z)?;
        check_slices(x, x_tads, y, y_tads)?;
        let expected = x_tads.num_tads() * y_tads.num_tads();
        check_output(expected, z.len())?;
        log::debug!(
            "reduce3 {} all pairs: {}x{} slices, strategy {:?}",
            op,
            x_tads.num_tads(),
            y_tads.num_tads(),
            self.config.strategy
        );
        (kernel.all_pairs)(
            x.view(),
            x_tads,
            y.view(),
            y_tads,
            params,
            &self.config,
            z.view_mut()?,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn run_paired<A, B, C>(
        &self,
        op: Reduce3Op,
        x: &NdArray<A>,
        x_pack: &TadPack,
        y: &NdArray<B>,
        y_pack: &TadPack,
        params: &ExtraParams,
        z: &mut NdArray<C>,
    ) -> Result<(), Reduce3Error>
    where
        A: TensorAllocator,
        B: TensorAllocator,
        C: TensorAllocator,
    {
        let kernel = self.kernel(op, x, y, z)?;
        check_slices(x, x_pack, y, y_pack)?;

        let (x_count, y_count) = (x_pack.num_tads(), y_pack.num_tads());
        if x_count != y_count && x_count != 1 && y_count != 1 {
            return Err(Reduce3Error::TadCountMismatch {
                x: x_count,
                y: y_count,
            });
        }
        let expected = paired_output_len(x_count, y_count);
        check_output(expected, z.len())?;

        log::debug!(
            "reduce3 {} along axes: {} outputs, x slices {}, y slices {}, strategy {:?}",
            op,
            expected,
            x_count,
            y_count,
            self.config.strategy
        );
        (kernel.paired)(
            x.view(),
            x_pack,
            y.view(),
            y_pack,
            params,
            &self.config,
            z.view_mut()?,
        )
    }
}

/// Checks that paired slices have equal lengths and stay inside their buffers.
fn check_slices<A: TensorAllocator, B: TensorAllocator>(
    x: &NdArray<A>,
    x_pack: &TadPack,
    y: &NdArray<B>,
    y_pack: &TadPack,
) -> Result<(), Reduce3Error> {
    if x_pack.tad_length() != y_pack.tad_length() {
        return Err(Reduce3Error::SliceLengthMismatch {
            x: x_pack.tad_length(),
            y: y_pack.tad_length(),
        });
    }
    check_pack_bounds(x, x_pack)?;
    check_pack_bounds(y, y_pack)?;
    Ok(())
}

fn check_pack_bounds<A: TensorAllocator>(
    array: &NdArray<A>,
    pack: &TadPack,
) -> Result<(), TensorError> {
    if pack.shape().dtype() != array.dtype() {
        return Err(TensorError::DataTypeMismatch {
            expected: array.dtype(),
            actual: pack.shape().dtype(),
        });
    }
    let span = pack.shape().required_span();
    if span == 0 {
        return Ok(());
    }
    let size = array.as_bytes().len() / array.dtype().size_of();
    if let Some(&max) = pack.offsets().iter().max() {
        let last = max
            .checked_add(span - 1)
            .ok_or(TensorError::index_out_of_bounds(max, size))?;
        if last >= size {
            return Err(TensorError::index_out_of_bounds(last, size));
        }
    }
    Ok(())
}

fn check_output(expected: usize, actual: usize) -> Result<(), Reduce3Error> {
    if expected != actual {
        return Err(Reduce3Error::OutputLengthMismatch { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::ExecutionStrategy;
    use approx::assert_relative_eq;
    use ndtad_tensor::{DataType, Order, ShapeDescriptor};

    fn serial() -> Reduce3Executor {
        Reduce3Executor::new(Reduce3Config::default().with_strategy(ExecutionStrategy::Serial))
    }

    #[test]
    fn test_exec_scalar_euclidean() -> Result<(), Reduce3Error> {
        let x = NdArray::from_values(Order::C, &[4], &[0.0f64, 3.0, 0.0, 0.0])?;
        let y = NdArray::from_values(Order::C, &[2, 2], &[0.0f64, 0.0, 4.0, 0.0])?;
        let mut z = NdArray::zero_scalar(DataType::F64)?;
        serial().exec_scalar(Reduce3Op::EuclideanDistance, &x, &y, &ExtraParams::default(), &mut z)?;
        assert_relative_eq!(z.get::<f64>(&[])?, 5.0);
        Ok(())
    }

    #[test]
    fn test_exec_scalar_integer_input() -> Result<(), Reduce3Error> {
        let x = NdArray::vector(&[1i32, 2, 3])?;
        let y = NdArray::vector(&[4i32, 5, 6])?;
        let mut z = NdArray::zero_scalar(DataType::F32)?;
        serial().exec_scalar(Reduce3Op::Dot, &x, &y, &ExtraParams::default(), &mut z)?;
        assert_relative_eq!(z.get::<f32>(&[])?, 32.0);
        Ok(())
    }

    #[test]
    fn test_exec_rows_and_columns() -> Result<(), Reduce3Error> {
        let x = NdArray::from_values(Order::C, &[2, 3], &[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0])?;
        let y = NdArray::from_broadcast_value(&[2, 3], 1.0f32, Order::C)?;
        let params = ExtraParams::default();

        let mut rows = NdArray::from_shape(Order::C, &[2], DataType::F32)?;
        serial().exec(Reduce3Op::Dot, &x, &y, &params, &mut rows, &[1])?;
        assert_eq!(rows.to_vec::<f32>()?, vec![6.0, 15.0]);

        let mut cols = NdArray::from_shape(Order::C, &[3], DataType::F32)?;
        serial().exec(Reduce3Op::Dot, &x, &y, &params, &mut cols, &[0])?;
        assert_eq!(cols.to_vec::<f32>()?, vec![5.0, 7.0, 9.0]);
        Ok(())
    }

    #[test]
    fn test_exec_reuses_smaller_operand() -> Result<(), Reduce3Error> {
        let x = NdArray::from_values(Order::C, &[3, 2], &[1.0f64, 0.0, 0.0, 1.0, 1.0, 1.0])?;
        let y = NdArray::vector(&[1.0f64, 0.0])?;
        let params = ExtraParams::default();

        let mut z = NdArray::from_shape(Order::C, &[3], DataType::F64)?;
        serial().exec(Reduce3Op::ManhattanDistance, &x, &y, &params, &mut z, &[1])?;
        assert_eq!(z.to_vec::<f64>()?, vec![0.0, 2.0, 1.0]);

        // the same with the operands swapped
        serial().exec(Reduce3Op::ManhattanDistance, &y, &x, &params, &mut z, &[1])?;
        assert_eq!(z.to_vec::<f64>()?, vec![0.0, 2.0, 1.0]);
        Ok(())
    }

    #[test]
    fn test_exec_strided_output() -> Result<(), Reduce3Error> {
        let x = NdArray::from_values(Order::C, &[4, 2], &[1.0f32, 1.0, 2.0, 2.0, 3.0, 3.0, 4.0, 4.0])?;
        let y = NdArray::from_broadcast_value(&[4, 2], 0.0f32, Order::C)?;
        // output laid out column-major
        let mut z = NdArray::from_shape(Order::F, &[2, 2], DataType::F32)?;
        serial().exec(Reduce3Op::ManhattanDistance, &x, &y, &ExtraParams::default(), &mut z, &[1])?;
        assert_eq!(z.to_vec::<f32>()?, vec![2.0, 4.0, 6.0, 8.0]);
        assert_eq!(z.as_slice::<f32>()?, &[2.0, 6.0, 4.0, 8.0]);
        Ok(())
    }

    #[test]
    fn test_exec_tad_pretiled() -> Result<(), Reduce3Error> {
        let x = NdArray::from_values(Order::C, &[2, 3], &[1.0f64, 2.0, 3.0, 0.0, 0.0, 1.0])?;
        let y = NdArray::vector(&[1.0f64, 2.0, 3.0])?;
        let x_tads = build_tad(x.descriptor(), &[1])?;
        let mut z = NdArray::from_shape(Order::C, &[2], DataType::F64)?;
        serial().exec_tad(
            Reduce3Op::SimpleHammingDistance,
            &x,
            &x_tads,
            &y,
            None,
            &ExtraParams::default(),
            &mut z,
        )?;
        let out = z.to_vec::<f64>()?;
        assert_relative_eq!(out[0], 0.0);
        assert_relative_eq!(out[1], 1.0);
        Ok(())
    }

    #[test]
    fn test_exec_tad_empty_batch() -> Result<(), Reduce3Error> {
        let x = NdArray::from_shape(Order::C, &[0, 3], DataType::F32)?;
        let x_tads = build_tad(x.descriptor(), &[1])?;
        assert_eq!(x_tads.num_tads(), 0);
        let y = NdArray::vector(&[1.0f32, 2.0, 3.0])?;
        let params = ExtraParams::default();

        // no slices to pair means no outputs, even against a reused operand
        let mut scalar = NdArray::zero_scalar(DataType::F32)?;
        assert_eq!(
            serial().exec_tad(Reduce3Op::Dot, &x, &x_tads, &y, None, &params, &mut scalar),
            Err(Reduce3Error::OutputLengthMismatch {
                expected: 0,
                actual: 1
            })
        );

        let mut z = NdArray::from_shape(Order::C, &[0], DataType::F32)?;
        serial().exec_tad(Reduce3Op::Dot, &x, &x_tads, &y, None, &params, &mut z)?;
        assert!(z.is_empty());
        Ok(())
    }

    #[test]
    fn test_exec_tad_offset_overflow() -> Result<(), Reduce3Error> {
        let x = NdArray::vector(&[1.0f64, 2.0, 3.0, 4.0])?;
        let good = build_tad(x.descriptor(), &[0])?;
        let bad = TadPack::new(
            ShapeDescriptor::new(&[4], DataType::F64, Order::C)?,
            vec![usize::MAX],
        );
        let mut z = NdArray::zero_scalar(DataType::F64)?;
        let res = serial().exec_tad(
            Reduce3Op::Dot,
            &x,
            &good,
            &x,
            Some(&bad),
            &ExtraParams::default(),
            &mut z,
        );
        assert_eq!(
            res,
            Err(Reduce3Error::TensorError(TensorError::IndexOutOfBounds {
                index: usize::MAX,
                size: 4
            }))
        );
        Ok(())
    }

    #[test]
    fn test_exec_all_small() -> Result<(), Reduce3Error> {
        let x = NdArray::from_values(Order::C, &[2, 2], &[1.0f32, 0.0, 0.0, 1.0])?;
        let y = NdArray::from_values(Order::C, &[3, 2], &[1.0f32, 0.0, 0.0, 1.0, 1.0, 1.0])?;
        let mut z = NdArray::from_shape(Order::C, &[2, 3], DataType::F32)?;
        serial().exec_all(Reduce3Op::Dot, &x, &y, &ExtraParams::default(), &mut z, &[1])?;
        assert_eq!(z.to_vec::<f32>()?, vec![1.0, 0.0, 1.0, 0.0, 1.0, 1.0]);
        Ok(())
    }

    #[test]
    fn test_validation_errors() -> Result<(), Reduce3Error> {
        let params = ExtraParams::default();
        let x = NdArray::from_values(Order::C, &[2, 3], &[0.0f32; 6])?;
        let y64 = NdArray::from_values(Order::C, &[2, 3], &[0.0f64; 6])?;
        let mut z = NdArray::from_shape(Order::C, &[2], DataType::F32)?;
        let exec = serial();

        assert_eq!(
            exec.exec(Reduce3Op::Dot, &x, &y64, &params, &mut z, &[1]),
            Err(Reduce3Error::InputTypeMismatch {
                x: DataType::F32,
                y: DataType::F64
            })
        );
        assert_eq!(
            exec.exec(Reduce3Op::Dot, &x, &x, &params, &mut z, &[2]),
            Err(Reduce3Error::TensorError(TensorError::InvalidAxis { axis: 2, rank: 2 }))
        );
        assert_eq!(
            exec.exec(Reduce3Op::Dot, &x, &x, &params, &mut z, &[0]),
            Err(Reduce3Error::OutputLengthMismatch {
                expected: 3,
                actual: 2
            })
        );

        let mut zi = NdArray::from_shape(Order::C, &[2], DataType::I32)?;
        assert_eq!(
            exec.exec(Reduce3Op::Dot, &x, &x, &params, &mut zi, &[1]),
            Err(Reduce3Error::UnsupportedTypePair {
                x: DataType::F32,
                z: DataType::I32
            })
        );

        let short = NdArray::vector(&[0.0f32; 4])?;
        assert_eq!(
            exec.exec(Reduce3Op::Dot, &x, &short, &params, &mut z, &[1]),
            Err(Reduce3Error::SliceLengthMismatch { x: 3, y: 4 })
        );

        let mut scalar = NdArray::zero_scalar(DataType::F32)?;
        assert_eq!(
            exec.exec_scalar(Reduce3Op::Dot, &x, &short, &params, &mut scalar),
            Err(Reduce3Error::LengthMismatch { x: 6, y: 4 })
        );
        Ok(())
    }

    #[test]
    fn test_pack_out_of_bounds() -> Result<(), Reduce3Error> {
        let x = NdArray::vector(&[1.0f32, 2.0, 3.0, 4.0])?;
        let shape = ShapeDescriptor::new(&[2], DataType::F32, Order::C)?;
        let bad = TadPack::new(shape, vec![0, 3]);
        let mut z = NdArray::from_shape(Order::C, &[2], DataType::F32)?;
        let res = serial().exec_tad(
            Reduce3Op::Dot,
            &x,
            &bad,
            &x,
            Some(&bad),
            &ExtraParams::default(),
            &mut z,
        );
        assert_eq!(
            res,
            Err(Reduce3Error::TensorError(TensorError::IndexOutOfBounds {
                index: 4,
                size: 4
            }))
        );
        Ok(())
    }

    #[test]
    fn test_output_sharing_input_buffer() -> Result<(), Reduce3Error> {
        let x = NdArray::from_values(Order::C, &[2, 2], &[1.0f32, 2.0, 3.0, 4.0])?;
        let mut z = x.clone();
        let res = serial().exec_all(
            Reduce3Op::Dot,
            &x,
            &x,
            &ExtraParams::default(),
            &mut z,
            &[1],
        );
        assert_eq!(res, Err(Reduce3Error::TensorError(TensorError::StorageShared)));
        Ok(())
    }
}
