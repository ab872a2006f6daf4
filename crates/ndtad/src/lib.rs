#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]

#[doc(inline)]
pub use ndtad_tensor as tensor;

#[doc(inline)]
pub use ndtad_reduce as reduce;
