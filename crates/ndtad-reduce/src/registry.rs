use std::collections::HashMap;
use std::sync::OnceLock;

use half::{bf16, f16};
use ndtad_tensor::{DataType, TensorElement};
use num_traits::AsPrimitive;

use crate::{
    error::Reduce3Error,
    kernels::{all_pairs_kernel, paired_kernel, scalar_kernel, ScalarKernelFn, TadKernelFn},
    ops::{
        Accumulator, CosineDistance, CosineSimilarity, Dot, EqualsWithEps, EuclideanDistance,
        JaccardDistance, ManhattanDistance, PairwiseReduction, Reduce3Op, SimpleHammingDistance,
    },
};

/// The kernels of one operator for one input/output type pair.
#[derive(Copy, Clone)]
pub(crate) struct Reduce3Kernel {
    pub scalar: ScalarKernelFn,
    pub paired: TadKernelFn,
    pub all_pairs: TadKernelFn,
}

type KernelKey = (Reduce3Op, DataType, DataType);

static REGISTRY: OnceLock<HashMap<KernelKey, Reduce3Kernel>> = OnceLock::new();

fn insert<O, X, Z>(table: &mut HashMap<KernelKey, Reduce3Kernel>)
where
    O: PairwiseReduction<Z>,
    X: TensorElement + AsPrimitive<Z>,
    Z: Accumulator,
{
    table.insert(
        (O::OP, X::DTYPE, Z::DTYPE),
        Reduce3Kernel {
            scalar: scalar_kernel::<O, X, Z>,
            paired: paired_kernel::<O, X, Z>,
            all_pairs: all_pairs_kernel::<O, X, Z>,
        },
    );
}

macro_rules! register_ops {
    ($table:ident, $x:ty, $z:ty) => {
        insert::<ManhattanDistance, $x, $z>(&mut $table);
        insert::<EuclideanDistance, $x, $z>(&mut $table);
        insert::<CosineSimilarity, $x, $z>(&mut $table);
        insert::<Dot, $x, $z>(&mut $table);
        insert::<EqualsWithEps, $x, $z>(&mut $table);
        insert::<CosineDistance, $x, $z>(&mut $table);
        insert::<JaccardDistance, $x, $z>(&mut $table);
        insert::<SimpleHammingDistance, $x, $z>(&mut $table);
    };
}

macro_rules! register_types {
    ($table:ident, [$($x:ty),*] => $z:ty) => {
        $(
            register_ops!($table, $x, $z);
        )*
    };
}

// Half precision outputs accept their own half type but not the other one.
fn build() -> HashMap<KernelKey, Reduce3Kernel> {
    let mut table = HashMap::new();
    register_types!(table, [i8, i16, i32, i64, u8, u16, u32, u64, f16, bf16, f32, f64] => f32);
    register_types!(table, [i8, i16, i32, i64, u8, u16, u32, u64, f16, bf16, f32, f64] => f64);
    register_types!(table, [i8, i16, i32, i64, u8, u16, u32, u64, f16, f32, f64] => f16);
    register_types!(table, [i8, i16, i32, i64, u8, u16, u32, u64, bf16, f32, f64] => bf16);
    log::debug!("registered {} reduce3 kernels", table.len());
    table
}

fn registry() -> &'static HashMap<KernelKey, Reduce3Kernel> {
    REGISTRY.get_or_init(build)
}

/// Looks up the kernels of `op` for input type `x` and output type `z`.
pub(crate) fn lookup(op: Reduce3Op, x: DataType, z: DataType) -> Result<Reduce3Kernel, Reduce3Error> {
    registry()
        .get(&(op, x, z))
        .copied()
        .ok_or(Reduce3Error::UnsupportedTypePair { x, z })
}

/// Returns true if a kernel exists for `op` with input type `x` and output type `z`.
///
/// ```rust
/// use ndtad_reduce::{is_supported, Reduce3Op};
/// use ndtad_tensor::DataType;
///
/// assert!(is_supported(Reduce3Op::Dot, DataType::I32, DataType::F64));
/// assert!(!is_supported(Reduce3Op::Dot, DataType::F32, DataType::I32));
/// assert!(!is_supported(Reduce3Op::Dot, DataType::Bool, DataType::F32));
/// ```
pub fn is_supported(op: Reduce3Op, x: DataType, z: DataType) -> bool {
    registry().contains_key(&(op, x, z))
}
