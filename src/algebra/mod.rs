//! Numeric types and linear algebra for the solver.
//!
//! Everything is generic over the opaque [`Scalar`] type; no BLAS or other
//! fixed-precision backend is assumed.

mod blockdiag;
pub mod dense;
mod error_types;
mod floats;
mod math_traits;
mod vecmath;

pub use blockdiag::*;
pub use dense::{Matrix, ShapedMatrix};
pub use error_types::*;
pub use floats::*;
pub use math_traits::*;
