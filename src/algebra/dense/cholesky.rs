#![allow(non_snake_case)]
use super::core::{Matrix, ShapedMatrix};
use crate::algebra::{DenseFactorizationError, Scalar};

/// Computes the lower Cholesky factor of a symmetric positive definite
/// matrix.  Fails on a non-positive pivot.
pub(crate) struct CholeskyEngine<T> {
    /// lower triangular factor (stored as square dense)
    pub L: Matrix<T>,
}

impl<T: Scalar> CholeskyEngine<T> {
    pub fn new(n: usize) -> Self {
        let L = Matrix::<T>::zeros((n, n));
        Self { L }
    }

    pub fn cholesky(&mut self, A: &Matrix<T>) -> Result<(), DenseFactorizationError> {
        if A.size() != self.L.size() {
            return Err(DenseFactorizationError::IncompatibleDimension);
        }
        factor_lower(A, &mut self.L, |_j, d| {
            if d > T::zero() {
                Some(d)
            } else {
                None
            }
        })
        .map(|_| ())
    }
}

/// Cholesky factorization with per-direction stabilization.
///
/// A pivot that falls below `threshold` times the largest diagonal entry of
/// the input is lifted back to that floor by adding a positive constant on
/// the diagonal.  The factor then satisfies `L·Lᵀ = A + U·Uᵀ` where `U` has
/// one column `λ·e_j` per stabilized direction `j`.  The recorded lambdas
/// are the square roots of the added constants, i.e. exactly the column
/// scales of `U`.
pub(crate) struct StabilizedCholeskyEngine<T> {
    /// lower triangular factor of the stabilized matrix
    pub L: Matrix<T>,
    /// directions that required stabilization, ascending
    pub stabilize_indices: Vec<usize>,
    /// `U` column scale for each entry of `stabilize_indices`
    pub stabilize_lambdas: Vec<T>,
}

impl<T: Scalar> StabilizedCholeskyEngine<T> {
    pub fn new(n: usize) -> Self {
        Self {
            L: Matrix::<T>::zeros((n, n)),
            stabilize_indices: Vec::new(),
            stabilize_lambdas: Vec::new(),
        }
    }

    pub fn cholesky(
        &mut self,
        A: &Matrix<T>,
        threshold: T,
    ) -> Result<(), DenseFactorizationError> {
        if A.size() != self.L.size() {
            return Err(DenseFactorizationError::IncompatibleDimension);
        }
        self.stabilize_indices.clear();
        self.stabilize_lambdas.clear();

        let mut diag_max = T::zero();
        for i in 0..A.nrows() {
            diag_max = T::max(diag_max, T::abs(A[(i, i)]));
        }
        if diag_max == T::zero() {
            diag_max = T::one();
        }
        let floor = diag_max * threshold;

        let indices = &mut self.stabilize_indices;
        let lambdas = &mut self.stabilize_lambdas;
        factor_lower(A, &mut self.L, |j, d| {
            if d >= floor {
                return Some(d);
            }
            let lifted = d + floor;
            if lifted <= T::zero() {
                return None;
            }
            indices.push(j);
            lambdas.push(T::sqrt(floor));
            Some(lifted)
        })
        .map_err(|e| match e {
            DenseFactorizationError::Cholesky(j) => {
                DenseFactorizationError::StabilizationExhausted(j)
            }
            other => other,
        })
    }
}

// Shared left-looking factorization kernel.  `pivot_rule` receives the raw
// pivot value and returns the (possibly lifted) value to use, or None to
// fail at that direction.
fn factor_lower<T: Scalar>(
    A: &Matrix<T>,
    L: &mut Matrix<T>,
    mut pivot_rule: impl FnMut(usize, T) -> Option<T>,
) -> Result<(), DenseFactorizationError> {
    let n = A.nrows();
    L.set_zero();
    for j in 0..n {
        let mut d = A[(j, j)];
        for k in 0..j {
            d -= L[(j, k)] * L[(j, k)];
        }
        let d = pivot_rule(j, d).ok_or(DenseFactorizationError::Cholesky(j))?;
        let ljj = T::sqrt(d);
        L[(j, j)] = ljj;
        for i in (j + 1)..n {
            let mut v = A[(i, j)];
            for k in 0..j {
                v -= L[(i, k)] * L[(j, k)];
            }
            L[(i, j)] = v / ljj;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cholesky() {
        #[rustfmt::skip]
        let S = Matrix::from_rows(
            &[&[ 8., -2., 4.],
              &[-2., 12., 2.],
              &[ 4.,  2., 6.]]);

        let mut eng = CholeskyEngine::<f64>::new(3);
        assert!(eng.cholesky(&S).is_ok());

        let mut M = Matrix::<f64>::zeros((3, 3));
        M.mul(&eng.L, &eng.L.t(), 1.0, 0.0);
        for i in 0..3 {
            for j in 0..3 {
                assert!((M[(i, j)] - S[(i, j)]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_cholesky_rejects_indefinite() {
        let S = Matrix::from_rows(&[&[1.0, 2.0], &[2.0, 1.0]]);
        let mut eng = CholeskyEngine::<f64>::new(2);
        assert!(matches!(
            eng.cholesky(&S),
            Err(DenseFactorizationError::Cholesky(1))
        ));
    }

    #[test]
    fn test_stabilized_cholesky_lifts_weak_direction() {
        // second direction is numerically dead relative to the first
        let S = Matrix::from_rows(&[&[1.0, 0.0], &[0.0, 1e-30]]);
        let mut eng = StabilizedCholeskyEngine::<f64>::new(2);
        eng.cholesky(&S, 1e-10).unwrap();

        assert_eq!(eng.stabilize_indices, vec![1]);
        assert_eq!(eng.stabilize_lambdas.len(), 1);
        assert!(eng.stabilize_lambdas[0] > 0.0);

        // L·Lᵀ = S + λ²·e₁e₁ᵀ
        let λ = eng.stabilize_lambdas[0];
        let mut M = Matrix::<f64>::zeros((2, 2));
        M.mul(&eng.L, &eng.L.t(), 1.0, 0.0);
        assert!((M[(1, 1)] - (1e-30 + λ * λ)).abs() < 1e-22);
    }

    #[test]
    fn test_stabilized_cholesky_clean_matrix_records_nothing() {
        let S = Matrix::from_rows(&[&[4.0, 1.0], &[1.0, 3.0]]);
        let mut eng = StabilizedCholeskyEngine::<f64>::new(2);
        eng.cholesky(&S, 1e-10).unwrap();
        assert!(eng.stabilize_indices.is_empty());
        assert!(eng.stabilize_lambdas.is_empty());
    }
}
