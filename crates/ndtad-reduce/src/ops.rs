//! The paired-reduction operator set.
//!
//! Every operator folds pairs of elements into an accumulator: `op` combines one pair,
//! `update` adds the result to the running accumulator and `post_process` turns the
//! accumulator into the final value once all pairs are seen. Some operators keep
//! extra running sums in [`AuxSlots`].

use ndtad_tensor::TensorElement;
use num_traits::{Float, NumCast, ToPrimitive};
use serde::{Deserialize, Serialize};

use crate::error::Reduce3Error;

/// Floating point type used for accumulation and output.
///
/// Implemented for every floating point tensor element: `f32`, `f64`, `f16` and
/// `bf16`.
pub trait Accumulator: Float + TensorElement {}

impl<T: Float + TensorElement> Accumulator for T {}

/// Converts a primitive value to the accumulator type, NaN if it is not representable.
#[inline]
pub fn to_accumulator<Z: Accumulator, N: ToPrimitive>(n: N) -> Z {
    <Z as NumCast>::from(n).unwrap_or_else(Z::nan)
}

/// Reduction operator selector.
///
/// The discriminant is the operator opcode.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum Reduce3Op {
    /// Sum of absolute differences.
    ManhattanDistance = 0,
    /// Square root of the sum of squared differences.
    EuclideanDistance = 1,
    /// Dot product normalized by both magnitudes.
    CosineSimilarity = 2,
    /// Sum of products.
    Dot = 3,
    /// Number of pairs that differ by more than epsilon.
    EqualsWithEps = 4,
    /// One minus the cosine similarity.
    CosineDistance = 5,
    /// One minus the ratio of summed minima to summed maxima.
    JaccardDistance = 6,
    /// Fraction of pairs that are not equal.
    SimpleHammingDistance = 7,
}

impl Reduce3Op {
    /// Every operator, in opcode order.
    pub const ALL: [Reduce3Op; 8] = [
        Reduce3Op::ManhattanDistance,
        Reduce3Op::EuclideanDistance,
        Reduce3Op::CosineSimilarity,
        Reduce3Op::Dot,
        Reduce3Op::EqualsWithEps,
        Reduce3Op::CosineDistance,
        Reduce3Op::JaccardDistance,
        Reduce3Op::SimpleHammingDistance,
    ];

    /// The integer opcode.
    #[inline]
    pub fn opcode(self) -> i32 {
        self as i32
    }

    /// Operator name.
    pub fn name(self) -> &'static str {
        match self {
            Reduce3Op::ManhattanDistance => "manhattan",
            Reduce3Op::EuclideanDistance => "euclidean",
            Reduce3Op::CosineSimilarity => "cosine_similarity",
            Reduce3Op::Dot => "dot",
            Reduce3Op::EqualsWithEps => "equals_with_eps",
            Reduce3Op::CosineDistance => "cosine_distance",
            Reduce3Op::JaccardDistance => "jaccard",
            Reduce3Op::SimpleHammingDistance => "simple_hamming",
        }
    }

    /// Number of auxiliary accumulator slots the operator uses.
    pub fn aux_slots(self) -> usize {
        match self {
            Reduce3Op::CosineSimilarity
            | Reduce3Op::CosineDistance
            | Reduce3Op::JaccardDistance => 2,
            _ => 0,
        }
    }
}

impl TryFrom<i32> for Reduce3Op {
    type Error = Reduce3Error;

    fn try_from(opcode: i32) -> Result<Self, Self::Error> {
        Reduce3Op::ALL
            .get(usize::try_from(opcode).map_err(|_| Reduce3Error::UnknownOpcode(opcode))?)
            .copied()
            .ok_or(Reduce3Error::UnknownOpcode(opcode))
    }
}

impl std::fmt::Display for Reduce3Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-call parameters of a reduction.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtraParams {
    /// Tolerance used by [`Reduce3Op::EqualsWithEps`].
    pub epsilon: f64,
}

impl Default for ExtraParams {
    fn default() -> Self {
        Self { epsilon: 1e-5 }
    }
}

impl ExtraParams {
    /// Parameters with the given comparison tolerance.
    pub fn with_epsilon(epsilon: f64) -> Self {
        Self { epsilon }
    }
}

/// Auxiliary running sums of a reduction.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AuxSlots<Z>(pub [Z; 3]);

impl<Z: Accumulator> AuxSlots<Z> {
    /// All slots set to zero.
    #[inline]
    pub fn zero() -> Self {
        Self([Z::zero(); 3])
    }

    /// Adds the slots of a partial result computed elsewhere.
    #[inline]
    pub fn merge(&mut self, other: &Self) {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a = *a + *b;
        }
    }
}

/// A paired-reduction operator over accumulator type `Z`.
pub trait PairwiseReduction<Z: Accumulator>: Send + Sync + 'static {
    /// Selector of this operator.
    const OP: Reduce3Op;

    /// Accumulator value before any pair is seen.
    #[inline]
    fn starting_value() -> Z {
        Z::zero()
    }

    /// Combines one pair of elements.
    fn op(x: Z, y: Z, aux: &mut AuxSlots<Z>, eps: Z) -> Z;

    /// Folds a combined value or a partial accumulator into the accumulator.
    #[inline]
    fn update(acc: Z, value: Z) -> Z {
        acc + value
    }

    /// Produces the final value from the accumulator and the number of pairs.
    #[inline]
    fn post_process(acc: Z, _n: usize, _aux: &AuxSlots<Z>) -> Z {
        acc
    }
}

/// Returns true if `x` and `y` are equal within `eps`, absolutely or relative to the
/// larger magnitude.
#[inline]
pub fn equals_within<Z: Accumulator>(x: Z, y: Z, eps: Z) -> bool {
    if x.is_infinite() && y.is_infinite() {
        return x.is_sign_positive() == y.is_sign_positive();
    }
    let diff = (x - y).abs();
    diff <= eps || diff <= x.abs().max(y.abs()) * eps
}

/// Sum of absolute differences.
#[derive(Copy, Clone, Debug, Default)]
pub struct ManhattanDistance;

impl<Z: Accumulator> PairwiseReduction<Z> for ManhattanDistance {
    const OP: Reduce3Op = Reduce3Op::ManhattanDistance;

    #[inline]
    fn op(x: Z, y: Z, _aux: &mut AuxSlots<Z>, _eps: Z) -> Z {
        (x - y).abs()
    }
}

/// Square root of the sum of squared differences.
#[derive(Copy, Clone, Debug, Default)]
pub struct EuclideanDistance;

impl<Z: Accumulator> PairwiseReduction<Z> for EuclideanDistance {
    const OP: Reduce3Op = Reduce3Op::EuclideanDistance;

    #[inline]
    fn op(x: Z, y: Z, _aux: &mut AuxSlots<Z>, _eps: Z) -> Z {
        let d = x - y;
        d * d
    }

    #[inline]
    fn post_process(acc: Z, _n: usize, _aux: &AuxSlots<Z>) -> Z {
        acc.sqrt()
    }
}

/// Dot product over the product of magnitudes; slot 0 sums `x²`, slot 1 sums `y²`.
#[derive(Copy, Clone, Debug, Default)]
pub struct CosineSimilarity;

impl<Z: Accumulator> PairwiseReduction<Z> for CosineSimilarity {
    const OP: Reduce3Op = Reduce3Op::CosineSimilarity;

    #[inline]
    fn op(x: Z, y: Z, aux: &mut AuxSlots<Z>, _eps: Z) -> Z {
        aux.0[0] = aux.0[0] + x * x;
        aux.0[1] = aux.0[1] + y * y;
        x * y
    }

    #[inline]
    fn post_process(acc: Z, _n: usize, aux: &AuxSlots<Z>) -> Z {
        acc / (aux.0[0].sqrt() * aux.0[1].sqrt())
    }
}

/// Sum of products.
#[derive(Copy, Clone, Debug, Default)]
pub struct Dot;

impl<Z: Accumulator> PairwiseReduction<Z> for Dot {
    const OP: Reduce3Op = Reduce3Op::Dot;

    #[inline]
    fn op(x: Z, y: Z, _aux: &mut AuxSlots<Z>, _eps: Z) -> Z {
        x * y
    }
}

/// Number of pairs not equal within epsilon.
#[derive(Copy, Clone, Debug, Default)]
pub struct EqualsWithEps;

impl<Z: Accumulator> PairwiseReduction<Z> for EqualsWithEps {
    const OP: Reduce3Op = Reduce3Op::EqualsWithEps;

    #[inline]
    fn op(x: Z, y: Z, _aux: &mut AuxSlots<Z>, eps: Z) -> Z {
        if equals_within(x, y, eps) {
            Z::zero()
        } else {
            Z::one()
        }
    }
}

/// One minus [`CosineSimilarity`].
#[derive(Copy, Clone, Debug, Default)]
pub struct CosineDistance;

impl<Z: Accumulator> PairwiseReduction<Z> for CosineDistance {
    const OP: Reduce3Op = Reduce3Op::CosineDistance;

    #[inline]
    fn op(x: Z, y: Z, aux: &mut AuxSlots<Z>, eps: Z) -> Z {
        <CosineSimilarity as PairwiseReduction<Z>>::op(x, y, aux, eps)
    }

    #[inline]
    fn post_process(acc: Z, n: usize, aux: &AuxSlots<Z>) -> Z {
        Z::one() - <CosineSimilarity as PairwiseReduction<Z>>::post_process(acc, n, aux)
    }
}

/// One minus the ratio of summed minima (slot 0) to summed maxima (slot 1).
#[derive(Copy, Clone, Debug, Default)]
pub struct JaccardDistance;

impl<Z: Accumulator> PairwiseReduction<Z> for JaccardDistance {
    const OP: Reduce3Op = Reduce3Op::JaccardDistance;

    #[inline]
    fn op(x: Z, y: Z, aux: &mut AuxSlots<Z>, _eps: Z) -> Z {
        aux.0[0] = aux.0[0] + x.min(y);
        aux.0[1] = aux.0[1] + x.max(y);
        Z::zero()
    }

    #[inline]
    fn post_process(_acc: Z, _n: usize, aux: &AuxSlots<Z>) -> Z {
        Z::one() - aux.0[0] / aux.0[1]
    }
}

/// Fraction of pairs that differ.
#[derive(Copy, Clone, Debug, Default)]
pub struct SimpleHammingDistance;

impl<Z: Accumulator> PairwiseReduction<Z> for SimpleHammingDistance {
    const OP: Reduce3Op = Reduce3Op::SimpleHammingDistance;

    #[inline]
    fn op(x: Z, y: Z, _aux: &mut AuxSlots<Z>, _eps: Z) -> Z {
        if x == y {
            Z::zero()
        } else {
            Z::one()
        }
    }

    #[inline]
    fn post_process(acc: Z, n: usize, _aux: &AuxSlots<Z>) -> Z {
        acc / to_accumulator::<Z, _>(n)
    }
}
