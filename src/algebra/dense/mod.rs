//! Dense matrix types and factorization engines.

mod cholesky;
mod core;
mod eigen;
mod lu;
mod matrix_math;

pub use self::core::*;
pub use self::matrix_math::*;

pub(crate) use self::cholesky::{CholeskyEngine, StabilizedCholeskyEngine};
pub(crate) use self::eigen::SymEigenEngine;
pub(crate) use self::lu::LuEngine;
