//! Typed reduction kernels.
//!
//! Each kernel is generic over the operator, the input element type `X` and the
//! accumulator type `Z`. The registry erases the types behind the function pointer
//! aliases below.

use ndtad_tensor::{Order, ShapeDescriptor, TadPack, TensorElement, TensorView, TensorViewMut};
use num_traits::AsPrimitive;

use crate::{
    config::Reduce3Config,
    error::Reduce3Error,
    ops::{to_accumulator, Accumulator, AuxSlots, ExtraParams, PairwiseReduction},
    parallel::{fill_indexed, fold_indexed, ParallelError},
};

/// Full reduction of two arrays into the single element of the output.
pub(crate) type ScalarKernelFn = fn(
    TensorView<'_>,
    TensorView<'_>,
    &ExtraParams,
    &Reduce3Config,
    TensorViewMut<'_>,
) -> Result<(), Reduce3Error>;

/// Reduction of slice pairs into one output element per pair.
pub(crate) type TadKernelFn = fn(
    TensorView<'_>,
    &TadPack,
    TensorView<'_>,
    &TadPack,
    &ExtraParams,
    &Reduce3Config,
    TensorViewMut<'_>,
) -> Result<(), Reduce3Error>;

/// Addressing scheme of a full reduction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum ScalarPath {
    /// Both inputs are walked linearly.
    UnitStride,
    /// Both inputs are walked with a constant step each.
    UniformStride { x: usize, y: usize },
    /// Offsets are computed per element from the shape.
    General,
}

/// Returns true if walking the buffer in memory order visits elements in logical order.
fn walks_logically(desc: &ShapeDescriptor) -> bool {
    desc.order() == Order::C || desc.shape().iter().filter(|&&d| d != 1).count() <= 1
}

/// Returns true if walking both buffers in memory order pairs equal coordinates.
fn memory_order_agrees(x: &ShapeDescriptor, y: &ShapeDescriptor) -> bool {
    if walks_logically(x) && walks_logically(y) {
        return true;
    }
    let non_unit = |d: &ShapeDescriptor| -> Vec<usize> {
        d.shape().iter().copied().filter(|&s| s != 1).collect()
    };
    x.order() == y.order() && non_unit(x) == non_unit(y)
}

pub(crate) fn select_scalar_path(x: &ShapeDescriptor, y: &ShapeDescriptor) -> ScalarPath {
    match (x.element_wise_stride(), y.element_wise_stride()) {
        (Some(xe), Some(ye)) if memory_order_agrees(x, y) => {
            if xe == 1 && ye == 1 {
                ScalarPath::UnitStride
            } else if x.is_stride_monotonic() && y.is_stride_monotonic() {
                ScalarPath::UniformStride { x: xe, y: ye }
            } else {
                ScalarPath::General
            }
        }
        _ => ScalarPath::General,
    }
}

/// Offsets of the elements of one slice relative to its base offset.
#[derive(Debug, PartialEq)]
pub(crate) enum Walk {
    Linear(usize),
    Table(Vec<usize>),
}

impl Walk {
    /// Plans the walks of a pair of slice shapes; strided when both allow it.
    pub(crate) fn plan(x: &ShapeDescriptor, y: &ShapeDescriptor) -> (Walk, Walk) {
        if let (Some(xe), Some(ye)) = (x.element_wise_stride(), y.element_wise_stride()) {
            if memory_order_agrees(x, y) {
                return (Walk::Linear(xe), Walk::Linear(ye));
            }
        }
        (Walk::table(x), Walk::table(y))
    }

    fn table(desc: &ShapeDescriptor) -> Walk {
        Walk::Table((0..desc.len()).map(|i| desc.index_to_offset(i)).collect())
    }

    #[inline]
    fn offset(&self, i: usize) -> usize {
        match self {
            Walk::Linear(stride) => i * stride,
            Walk::Table(offsets) => offsets[i],
        }
    }
}

/// Number of outputs when slice `i` of one pack pairs with slice `i` of the other,
/// a single-slice pack being reused against every slice of the other.
pub(crate) fn paired_output_len(x_slices: usize, y_slices: usize) -> usize {
    if x_slices == 0 || y_slices == 0 {
        0
    } else {
        x_slices.max(y_slices)
    }
}

/// Reduces one slice pair on the calling thread.
#[allow(clippy::too_many_arguments)]
#[inline]
fn reduce_slice<O, X, Z>(
    x: &[X],
    x_base: usize,
    x_walk: &Walk,
    y: &[X],
    y_base: usize,
    y_walk: &Walk,
    n: usize,
    eps: Z,
) -> Z
where
    O: PairwiseReduction<Z>,
    X: TensorElement + AsPrimitive<Z>,
    Z: Accumulator,
{
    let mut aux = AuxSlots::zero();
    let mut acc = O::starting_value();
    for i in 0..n {
        let a: Z = x[x_base + x_walk.offset(i)].as_();
        let b: Z = y[y_base + y_walk.offset(i)].as_();
        acc = O::update(acc, O::op(a, b, &mut aux, eps));
    }
    O::post_process(acc, n, &aux)
}

/// Folds `n` element pairs across workers, each with its own auxiliary slots.
fn accumulate<O, X, Z, FX, FY>(
    x: &[X],
    y: &[X],
    n: usize,
    eps: Z,
    config: &Reduce3Config,
    x_at: FX,
    y_at: FY,
) -> Result<Z, ParallelError>
where
    O: PairwiseReduction<Z>,
    X: TensorElement + AsPrimitive<Z>,
    Z: Accumulator,
    FX: Fn(usize) -> usize + Sync + Send,
    FY: Fn(usize) -> usize + Sync + Send,
{
    let (acc, aux) = fold_indexed(
        config.strategy,
        n,
        config.element_threshold,
        || (O::starting_value(), AuxSlots::zero()),
        |(acc, mut aux): (Z, AuxSlots<Z>), i| {
            let a: Z = x[x_at(i)].as_();
            let b: Z = y[y_at(i)].as_();
            let value = O::op(a, b, &mut aux, eps);
            (O::update(acc, value), aux)
        },
        |(a, mut aux_a): (Z, AuxSlots<Z>), (b, aux_b): (Z, AuxSlots<Z>)| {
            aux_a.merge(&aux_b);
            (O::update(a, b), aux_a)
        },
    )?;
    Ok(O::post_process(acc, n, &aux))
}

/// Computes `count` outputs with `f` and stores them in logical order.
fn write_outputs<Z, F>(
    z: TensorViewMut<'_>,
    count: usize,
    config: &Reduce3Config,
    f: F,
) -> Result<(), Reduce3Error>
where
    Z: Accumulator,
    F: Fn(usize) -> Z + Sync + Send,
{
    let desc = z.descriptor();
    let data = z.into_slice_mut::<Z>()?;
    if desc.is_row_major_contiguous() {
        fill_indexed(config.strategy, &mut data[..count], config.tad_threshold, f)?;
    } else {
        let mut values = vec![Z::zero(); count];
        fill_indexed(config.strategy, &mut values, config.tad_threshold, f)?;
        for (i, value) in values.into_iter().enumerate() {
            data[desc.index_to_offset(i)] = value;
        }
    }
    Ok(())
}

pub(crate) fn scalar_kernel<O, X, Z>(
    x: TensorView<'_>,
    y: TensorView<'_>,
    params: &ExtraParams,
    config: &Reduce3Config,
    z: TensorViewMut<'_>,
) -> Result<(), Reduce3Error>
where
    O: PairwiseReduction<Z>,
    X: TensorElement + AsPrimitive<Z>,
    Z: Accumulator,
{
    let (xs, ys) = (x.as_slice::<X>()?, y.as_slice::<X>()?);
    let (xd, yd) = (x.descriptor(), y.descriptor());
    let n = xd.len();
    let eps: Z = to_accumulator(params.epsilon);

    let path = select_scalar_path(xd, yd);
    log::debug!("{} over {} elements: {:?} path", O::OP, n, path);

    let value = match path {
        ScalarPath::UnitStride => accumulate::<O, X, Z, _, _>(xs, ys, n, eps, config, |i| i, |i| i)?,
        ScalarPath::UniformStride { x: xe, y: ye } => accumulate::<O, X, Z, _, _>(
            xs,
            ys,
            n,
            eps,
            config,
            move |i| i * xe,
            move |i| i * ye,
        )?,
        ScalarPath::General => accumulate::<O, X, Z, _, _>(
            xs,
            ys,
            n,
            eps,
            config,
            |i| xd.index_to_offset(i),
            |i| yd.index_to_offset(i),
        )?,
    };

    let offset = z.descriptor().index_to_offset(0);
    z.into_slice_mut::<Z>()?[offset] = value;
    Ok(())
}

/// Reduces slice `i` of x against slice `i` of y. A pack holding a single slice is
/// reused against every slice of the other.
pub(crate) fn paired_kernel<O, X, Z>(
    x: TensorView<'_>,
    x_pack: &TadPack,
    y: TensorView<'_>,
    y_pack: &TadPack,
    params: &ExtraParams,
    config: &Reduce3Config,
    z: TensorViewMut<'_>,
) -> Result<(), Reduce3Error>
where
    O: PairwiseReduction<Z>,
    X: TensorElement + AsPrimitive<Z>,
    Z: Accumulator,
{
    let (xs, ys) = (x.as_slice::<X>()?, y.as_slice::<X>()?);
    let n = x_pack.tad_length();
    let eps: Z = to_accumulator(params.epsilon);
    let (x_walk, y_walk) = Walk::plan(x_pack.shape(), y_pack.shape());
    let (x_offsets, y_offsets) = (x_pack.offsets(), y_pack.offsets());
    let count = paired_output_len(x_offsets.len(), y_offsets.len());

    log::debug!(
        "{} over {} slice pairs of length {}: x {}, y {}",
        O::OP,
        count,
        n,
        walk_name(&x_walk),
        walk_name(&y_walk)
    );

    let base = |offsets: &[usize], i: usize| {
        if offsets.len() == 1 {
            offsets[0]
        } else {
            offsets[i]
        }
    };
    write_outputs(z, count, config, |i| {
        reduce_slice::<O, X, Z>(
            xs,
            base(x_offsets, i),
            &x_walk,
            ys,
            base(y_offsets, i),
            &y_walk,
            n,
            eps,
        )
    })
}

/// Reduces every slice of x against every slice of y; pair `(r, g)` lands at
/// `r * y_slices + g`.
pub(crate) fn all_pairs_kernel<O, X, Z>(
    x: TensorView<'_>,
    x_pack: &TadPack,
    y: TensorView<'_>,
    y_pack: &TadPack,
    params: &ExtraParams,
    config: &Reduce3Config,
    z: TensorViewMut<'_>,
) -> Result<(), Reduce3Error>
where
    O: PairwiseReduction<Z>,
    X: TensorElement + AsPrimitive<Z>,
    Z: Accumulator,
{
    let (xs, ys) = (x.as_slice::<X>()?, y.as_slice::<X>()?);
    let n = x_pack.tad_length();
    let eps: Z = to_accumulator(params.epsilon);
    let (x_walk, y_walk) = Walk::plan(x_pack.shape(), y_pack.shape());
    let (x_offsets, y_offsets) = (x_pack.offsets(), y_pack.offsets());
    let y_count = y_offsets.len();

    log::debug!(
        "{} over {}x{} slice pairs of length {}",
        O::OP,
        x_offsets.len(),
        y_count,
        n
    );

    write_outputs(z, x_offsets.len() * y_count, config, |k| {
        reduce_slice::<O, X, Z>(
            xs,
            x_offsets[k / y_count],
            &x_walk,
            ys,
            y_offsets[k % y_count],
            &y_walk,
            n,
            eps,
        )
    })
}

fn walk_name(walk: &Walk) -> &'static str {
    match walk {
        Walk::Linear(_) => "strided",
        Walk::Table(_) => "offset table",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndtad_tensor::{DataType, TensorError};

    fn desc(dims: &[usize], order: Order) -> Result<ShapeDescriptor, TensorError> {
        ShapeDescriptor::new(dims, DataType::F32, order)
    }

    #[test]
    fn test_paired_output_len() {
        assert_eq!(paired_output_len(4, 4), 4);
        assert_eq!(paired_output_len(1, 5), 5);
        assert_eq!(paired_output_len(5, 1), 5);
        assert_eq!(paired_output_len(0, 1), 0);
        assert_eq!(paired_output_len(1, 0), 0);
        assert_eq!(paired_output_len(0, 0), 0);
    }

    #[test]
    fn test_scalar_path_selection() -> Result<(), TensorError> {
        let c = desc(&[3, 4], Order::C)?;
        let f = desc(&[3, 4], Order::F)?;
        assert_eq!(select_scalar_path(&c, &c), ScalarPath::UnitStride);
        assert_eq!(select_scalar_path(&f, &f), ScalarPath::UnitStride);
        // same shape in different orders pairs different coordinates in memory
        assert_eq!(select_scalar_path(&c, &f), ScalarPath::General);

        let col = ShapeDescriptor::with_strides(&[3], &[4], DataType::F32, Order::C)?;
        let vec3 = desc(&[3], Order::C)?;
        assert_eq!(
            select_scalar_path(&col, &vec3),
            ScalarPath::UniformStride { x: 4, y: 1 }
        );

        let transposed = c.permuted(&[1, 0])?;
        assert_eq!(select_scalar_path(&transposed, &c), ScalarPath::General);
        Ok(())
    }

    #[test]
    fn test_vectors_ignore_order_tag() -> Result<(), TensorError> {
        let c = desc(&[1, 5], Order::C)?;
        let f = desc(&[5, 1], Order::F)?;
        assert_eq!(select_scalar_path(&c, &f), ScalarPath::UnitStride);
        Ok(())
    }

    #[test]
    fn test_walk_plan() -> Result<(), TensorError> {
        let row = desc(&[4], Order::C)?;
        let col = ShapeDescriptor::with_strides(&[4], &[3], DataType::F32, Order::C)?;
        assert_eq!(Walk::plan(&row, &col), (Walk::Linear(1), Walk::Linear(3)));

        let sub = ShapeDescriptor::with_strides(&[2, 2], &[1, 4], DataType::F32, Order::C)?;
        let (xw, yw) = Walk::plan(&sub, &desc(&[2, 2], Order::C)?);
        assert_eq!(xw, Walk::Table(vec![0, 4, 1, 5]));
        assert_eq!(yw, Walk::Table(vec![0, 1, 2, 3]));
        Ok(())
    }
}
