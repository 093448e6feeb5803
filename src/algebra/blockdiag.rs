#![allow(non_snake_case)]
use super::dense::{CholeskyEngine, Matrix, SymEigenEngine};
use crate::algebra::{DenseFactorizationError, Scalar, VectorMath};

/// Block-diagonal matrix: an ordered sequence of square dense blocks.
///
/// Only the blocks owned by this process group are present; the mapping
/// from local position to global block index is held by
/// [`BlockInfo`](crate::blockinfo::BlockInfo).  Mutation happens only at
/// the well-defined update points of the iteration, so blocks never need
/// interior synchronization.
#[derive(Debug, Clone)]
pub struct BlockDiagonalMatrix<T> {
    pub blocks: Vec<Matrix<T>>,
}

impl<T: Scalar> BlockDiagonalMatrix<T> {
    pub fn zeros(block_sizes: &[usize]) -> Self {
        let blocks = block_sizes
            .iter()
            .map(|&n| Matrix::<T>::zeros((n, n)))
            .collect();
        Self { blocks }
    }

    pub fn zeros_like(other: &Self) -> Self {
        Self::zeros(&other.block_sizes())
    }

    pub fn block_sizes(&self) -> Vec<usize> {
        self.blocks.iter().map(|b| b.m).collect()
    }

    /// Total dimension of the locally held blocks.
    pub fn local_dim(&self) -> usize {
        self.blocks.iter().map(|b| b.m).sum()
    }

    pub fn set_zero(&mut self) {
        for b in &mut self.blocks {
            b.set_zero();
        }
    }

    pub fn set_identity_scaled(&mut self, c: T) {
        for b in &mut self.blocks {
            b.set_zero();
            for i in 0..b.m {
                b[(i, i)] = c;
            }
        }
    }

    pub fn copy_from(&mut self, src: &Self) {
        for (d, s) in self.blocks.iter_mut().zip(src.blocks.iter()) {
            d.data_mut().copy_from(s.data());
        }
    }

    pub fn scale(&mut self, c: T) {
        for b in &mut self.blocks {
            b.scale(c);
        }
    }

    /// `self += a·B`
    pub fn axpy(&mut self, a: T, B: &Self) {
        for (d, s) in self.blocks.iter_mut().zip(B.blocks.iter()) {
            d.axpy(a, s);
        }
    }

    pub fn add_diagonal(&mut self, c: T) {
        for b in &mut self.blocks {
            b.add_diagonal(c);
        }
    }

    pub fn symmetrize(&mut self) {
        for b in &mut self.blocks {
            b.symmetrize();
        }
    }

    /// Largest absolute entry over the local blocks.
    pub fn max_abs_local(&self) -> T {
        self.blocks
            .iter()
            .fold(T::zero(), |m, b| T::max(m, b.max_abs()))
    }

    /// `Σ_b Tr(A_b · B_b)` over the local blocks, operands symmetric.
    pub fn trace_product_sym_local(&self, B: &Self) -> T {
        self.blocks
            .iter()
            .zip(B.blocks.iter())
            .fold(T::zero(), |acc, (a, b)| acc + a.trace_product_sym(b))
    }

    /// `Σ_b Tr((A+dA)_b · (B+dB)_b)` without forming the sums.
    pub fn trace_product_of_sums_local(A: &Self, dA: &Self, B: &Self, dB: &Self) -> T {
        let mut acc = T::zero();
        for (((a, da), b), db) in A
            .blocks
            .iter()
            .zip(dA.blocks.iter())
            .zip(B.blocks.iter())
            .zip(dB.blocks.iter())
        {
            for (((&xa, &xda), &xb), &xdb) in a
                .data()
                .iter()
                .zip(da.data().iter())
                .zip(b.data().iter())
                .zip(db.data().iter())
            {
                acc += (xa + xda) * (xb + xdb);
            }
        }
        acc
    }

    /// `C = α·A·B + β·C` blockwise.
    pub fn mul(&mut self, A: &Self, B: &Self, α: T, β: T) {
        for ((c, a), b) in self
            .blocks
            .iter_mut()
            .zip(A.blocks.iter())
            .zip(B.blocks.iter())
        {
            c.mul(a, b, α, β);
        }
    }

    /// Lower Cholesky factor of every block into `factors`.
    pub fn cholesky_into(
        &self,
        factors: &mut Self,
    ) -> Result<(), DenseFactorizationError> {
        for (b, f) in self.blocks.iter().zip(factors.blocks.iter_mut()) {
            let mut eng = CholeskyEngine::new(b.m);
            eng.cholesky(b)?;
            std::mem::swap(f, &mut eng.L);
        }
        Ok(())
    }

    /// `self = A⁻¹·self` blockwise, given the lower Cholesky factors of `A`.
    pub fn solve_with_cholesky(&mut self, factors: &Self) {
        for (b, L) in self.blocks.iter_mut().zip(factors.blocks.iter()) {
            b.lower_triangular_solve(L);
            b.lower_triangular_transpose_solve(L);
        }
    }

    /// Minimum eigenvalue over the local blocks.
    pub fn min_eigenvalue_local(&self) -> Result<T, DenseFactorizationError> {
        let mut λmin = T::infinity();
        for b in &self.blocks {
            let mut eng = SymEigenEngine::new(b.m);
            eng.factor(b)?;
            λmin = T::min(λmin, eng.min_eigenvalue());
        }
        Ok(λmin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_block() -> BlockDiagonalMatrix<f64> {
        let mut M = BlockDiagonalMatrix::<f64>::zeros(&[2, 1]);
        M.blocks[0] = Matrix::from_rows(&[&[2.0, 1.0], &[1.0, 3.0]]);
        M.blocks[1] = Matrix::from_rows(&[&[4.0]]);
        M
    }

    #[test]
    fn test_trace_product() {
        let M = two_block();
        let mut I = BlockDiagonalMatrix::<f64>::zeros(&[2, 1]);
        I.set_identity_scaled(1.0);
        // Tr(M·I) = trace of M
        assert_eq!(M.trace_product_sym_local(&I), 2.0 + 3.0 + 4.0);
    }

    #[test]
    fn test_cholesky_solve_roundtrip() {
        let M = two_block();
        let mut L = BlockDiagonalMatrix::zeros_like(&M);
        M.cholesky_into(&mut L).unwrap();

        let mut Z = BlockDiagonalMatrix::zeros_like(&M);
        Z.set_identity_scaled(1.0);
        Z.solve_with_cholesky(&L);

        // M·M⁻¹ = I
        let mut P = BlockDiagonalMatrix::zeros_like(&M);
        P.mul(&M, &Z, 1.0, 0.0);
        P.add_diagonal(-1.0);
        assert!(P.max_abs_local() < 1e-12);
    }

    #[test]
    fn test_min_eigenvalue_local() {
        let M = two_block();
        let λ = M.min_eigenvalue_local().unwrap();
        // block 0 spectrum: (5 ± √5)/2 ; block 1: 4
        assert!((λ - (5.0 - 5.0_f64.sqrt()) / 2.0).abs() < 1e-12);
    }
}
