use thiserror::Error;

/// Errors from dense factorization engines
#[derive(Error, Debug)]
pub enum DenseFactorizationError {
    #[error("Matrix dimension fields are incompatible")]
    IncompatibleDimension,
    #[error("Matrix is not positive definite (pivot {0} failed)")]
    Cholesky(usize),
    #[error("Matrix remained singular after stabilization (direction {0})")]
    StabilizationExhausted(usize),
    #[error("Matrix is singular (pivot column {0})")]
    LU(usize),
    #[error("Eigenvalue iteration failed to converge")]
    Eigen,
}
