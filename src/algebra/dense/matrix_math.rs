#![allow(non_snake_case)]
use super::core::{DenseMatrix, Matrix, ShapedMatrix};
use crate::algebra::Scalar;

impl<T: Scalar> Matrix<T> {
    /// `self = α·A·B + β·self`
    ///
    /// Operands may be plain matrices or [`Adjoint`](super::core::Adjoint)
    /// views, so `C.mul(&A.t(), &B, α, β)` works without materializing the
    /// transpose.
    pub fn mul<MA, MB>(&mut self, A: &MA, B: &MB, α: T, β: T)
    where
        MA: DenseMatrix<T = T>,
        MB: DenseMatrix<T = T>,
    {
        assert!(self.nrows() == A.nrows());
        assert!(self.ncols() == B.ncols());
        assert!(A.ncols() == B.nrows());

        let k = A.ncols();
        for j in 0..self.ncols() {
            for i in 0..self.nrows() {
                let mut acc = T::zero();
                for p in 0..k {
                    acc += A.at((i, p)) * B.at((p, j));
                }
                self[(i, j)] = α * acc + β * self[(i, j)];
            }
        }
    }

    /// `y = α·A·x + β·y`
    pub fn gemv(&self, y: &mut [T], x: &[T], α: T, β: T) {
        assert!(y.len() == self.m && x.len() == self.n);
        for (i, yi) in y.iter_mut().enumerate() {
            let mut acc = T::zero();
            for j in 0..self.n {
                acc += self.at((i, j)) * x[j];
            }
            *yi = α * acc + β * *yi;
        }
    }

    /// `y = α·Aᵀ·x + β·y`
    pub fn gemv_t(&self, y: &mut [T], x: &[T], α: T, β: T) {
        assert!(y.len() == self.n && x.len() == self.m);
        for (j, yj) in y.iter_mut().enumerate() {
            let mut acc = T::zero();
            for i in 0..self.m {
                acc += self.at((i, j)) * x[i];
            }
            *yj = α * acc + β * *yj;
        }
    }

    /// Solve `L·Z = self` in place, `L` lower triangular.
    pub fn lower_triangular_solve(&mut self, L: &Matrix<T>) {
        assert!(L.is_square() && L.nrows() == self.nrows());
        let n = L.nrows();
        for c in 0..self.ncols() {
            let col = self.col_slice_mut(c);
            for i in 0..n {
                let mut v = col[i];
                for k in 0..i {
                    v -= L.at((i, k)) * col[k];
                }
                col[i] = v / L.at((i, i));
            }
        }
    }

    /// Solve `Lᵀ·Z = self` in place, `L` lower triangular.
    pub fn lower_triangular_transpose_solve(&mut self, L: &Matrix<T>) {
        assert!(L.is_square() && L.nrows() == self.nrows());
        let n = L.nrows();
        for c in 0..self.ncols() {
            let col = self.col_slice_mut(c);
            for i in (0..n).rev() {
                let mut v = col[i];
                for k in (i + 1)..n {
                    v -= L.at((k, i)) * col[k];
                }
                col[i] = v / L.at((i, i));
            }
        }
    }

    /// `self = L⁻¹ · self · L⁻ᵀ`, `L` lower triangular.
    ///
    /// Used on symmetric operands when computing step-length eigenvalue
    /// bounds; the result is symmetric up to roundoff.
    pub fn lower_triangular_inverse_congruence(&mut self, L: &Matrix<T>) {
        self.lower_triangular_solve(L);
        // right-multiplication by L⁻ᵀ acts on rows: transpose, forward
        // solve, transpose back
        self.transpose_in_place();
        self.lower_triangular_solve(L);
        self.transpose_in_place();
    }

    pub fn transpose_in_place(&mut self) {
        assert!(self.is_square());
        for j in 0..self.n {
            for i in 0..j {
                let lo = self.index_linear((i, j));
                let hi = self.index_linear((j, i));
                self.data.swap(lo, hi);
            }
        }
    }
}

/// Solve `L·z = b` in place for a vector right-hand side.
pub fn lower_triangular_solve_vec<T: Scalar>(L: &Matrix<T>, b: &mut [T]) {
    assert!(L.is_square() && L.nrows() == b.len());
    for i in 0..b.len() {
        let mut v = b[i];
        for k in 0..i {
            v -= L.at((i, k)) * b[k];
        }
        b[i] = v / L.at((i, i));
    }
}

/// Solve `Lᵀ·z = b` in place for a vector right-hand side.
pub fn lower_triangular_transpose_solve_vec<T: Scalar>(L: &Matrix<T>, b: &mut [T]) {
    assert!(L.is_square() && L.nrows() == b.len());
    for i in (0..b.len()).rev() {
        let mut v = b[i];
        for k in (i + 1)..b.len() {
            v -= L.at((k, i)) * b[k];
        }
        b[i] = v / L.at((i, i));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemm_with_adjoint() {
        let A = Matrix::from_rows(&[&[1.0, 2.0], &[3.0, 4.0]]);
        let B = Matrix::from_rows(&[&[1.0, 0.0], &[1.0, 1.0]]);
        let mut C = Matrix::<f64>::zeros((2, 2));
        C.mul(&A.t(), &B, 1.0, 0.0);
        assert_eq!(C, Matrix::from_rows(&[&[4.0, 3.0], &[6.0, 4.0]]));
    }

    #[test]
    fn test_triangular_solves() {
        let L = Matrix::from_rows(&[&[2.0, 0.0], &[1.0, 3.0]]);
        let mut b = vec![2.0, 7.0];
        lower_triangular_solve_vec(&L, &mut b);
        assert_eq!(b, vec![1.0, 2.0]);

        let mut b = vec![2.0, 3.0];
        lower_triangular_transpose_solve_vec(&L, &mut b);
        // Lᵀ z = b  =>  z = [1/2, 1] then back-substitute row 0
        assert_eq!(b[1], 1.0);
        assert_eq!(b[0], (2.0 - 1.0) / 2.0);
    }

    #[test]
    fn test_inverse_congruence() {
        let L = Matrix::from_rows(&[&[2.0, 0.0], &[1.0, 1.0]]);
        let mut M = Matrix::from_rows(&[&[4.0, 2.0], &[2.0, 2.0]]);
        // M = L·Lᵀ here, so the congruence is the identity
        M.lower_triangular_inverse_congruence(&L);
        assert!((M[(0, 0)] - 1.0).abs() < 1e-12);
        assert!((M[(1, 1)] - 1.0).abs() < 1e-12);
        assert!(M[(0, 1)].abs() < 1e-12);
        assert!(M[(1, 0)].abs() < 1e-12);
    }
}
