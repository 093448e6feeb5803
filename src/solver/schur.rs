//! The two-level Schur complement solve.
//!
//! Eliminating the psd matrix variables from the Newton system leaves, per
//! block, a dense Schur complement `S_j` plus a coupling through the
//! free-variable matrix `B`.  `S_j` is factored with a stabilized Cholesky
//! whose lifted directions form the columns of a low-rank update `U`; the
//! coupled system is then closed by the small replicated matrix
//!
//! `Q = [B U]ᵀ L⁻ᵀ L⁻¹ [B U] − diag(0,…,0, 1,…,1)`
//!
//! factored with pivoted LU.  The full Schur complement is never formed:
//! per-iteration cost stays proportional to the sum of per-block costs.

#![allow(non_snake_case)]

use super::pairings::{schur_complement_block, BlockShape};
use super::SolverError;
use crate::algebra::dense::{
    lower_triangular_solve_vec, lower_triangular_transpose_solve_vec, LuEngine,
    StabilizedCholeskyEngine,
};
use crate::algebra::{BlockDiagonalMatrix, Matrix, Scalar, ShapedMatrix};
use crate::blockinfo::BlockInfo;
use crate::comm::Collective;
use crate::sdp::Sdp;
use crate::timers::{timeit, Timers};

/// Per-iteration factorization state for the Schur complement equation.
///
/// Everything here is rebuilt from scratch each iteration; the buffers are
/// retained only as working storage.
pub(crate) struct SchurSolver<T> {
    /// `S_j` for each owned block
    pub schur_complement: BlockDiagonalMatrix<T>,
    /// stabilized lower Cholesky factors `L_j`
    pub schur_cholesky: BlockDiagonalMatrix<T>,
    /// `L_j⁻¹ B_j` for each owned block
    pub schur_off_diagonal: Vec<Matrix<T>>,
    /// stabilized directions per owned block
    pub stabilize_indices: Vec<Vec<usize>>,
    /// `U` column scales per owned block
    pub stabilize_lambdas: Vec<Vec<T>>,
    /// owned blocks (local positions) with at least one stabilized direction
    pub stabilized_blocks: Vec<usize>,
    /// `L_j⁻¹ U_j` for each owned block (empty width if unstabilized)
    stabilize_columns: Vec<Matrix<T>>,
    /// column offset of each owned block's `U` columns within `Q`
    stabilize_offsets: Vec<usize>,
    /// dimension of `Q`: dual dimension + total stabilized directions
    pub q_dim: usize,
    pub Q: Matrix<T>,
    lu: Option<LuEngine<T>>,
}

impl<T: Scalar> SchurSolver<T> {
    pub fn new(schur_sizes: &[usize]) -> Self {
        let num_local = schur_sizes.len();
        Self {
            schur_complement: BlockDiagonalMatrix::zeros(schur_sizes),
            schur_cholesky: BlockDiagonalMatrix::zeros(schur_sizes),
            schur_off_diagonal: Vec::new(),
            stabilize_indices: vec![Vec::new(); num_local],
            stabilize_lambdas: vec![Vec::new(); num_local],
            stabilized_blocks: Vec::new(),
            stabilize_columns: vec![Matrix::zeros((0, 0)); num_local],
            stabilize_offsets: vec![0; num_local],
            q_dim: 0,
            Q: Matrix::zeros((0, 0)),
            lu: None,
        }
    }

    /// Assemble and factor everything needed to solve the Schur complement
    /// equation at the current point.
    ///
    /// The pairing matrices are indexed like the local psd blocks (two per
    /// owned block).  Work on each block's columns is split across the
    /// owning group and combined with a group reduction, so every group
    /// member ends up with identical factors.
    #[allow(clippy::too_many_arguments)]
    pub fn initialize<C: Collective>(
        &mut self,
        block_info: &BlockInfo<C>,
        world: &C,
        sdp: &Sdp<T>,
        shapes: &[BlockShape],
        pairings_x_inv: &[Matrix<T>],
        pairings_y: &[Matrix<T>],
        stabilize_threshold: T,
        timers: &mut Timers,
    ) -> Result<(), SolverError> {
        let group = &block_info.group;

        // ---- per-block Schur complement assembly
        for (blk, shape) in shapes.iter().enumerate() {
            timeit! {timers => &format!("schur.block_{}", shape.global_index); {
                let S = &mut self.schur_complement.blocks[blk];
                S.set_zero();
                let cols = columns_for_member(shape.schur_size(), group.rank(), group.size());
                schur_complement_block(
                    shape,
                    &[&pairings_x_inv[2 * blk], &pairings_x_inv[2 * blk + 1]],
                    &[&pairings_y[2 * blk], &pairings_y[2 * blk + 1]],
                    cols,
                    S,
                );
                group.sum_all(S.data_mut());
            }}
        }

        // ---- stabilized Cholesky of every block
        self.stabilized_blocks.clear();
        for (blk, shape) in shapes.iter().enumerate() {
            let S = &self.schur_complement.blocks[blk];
            let mut eng = StabilizedCholeskyEngine::new(S.nrows());
            eng.cholesky(S, stabilize_threshold)
                .map_err(|source| SolverError::SingularSchurBlock {
                    block: shape.global_index,
                    source,
                })?;
            std::mem::swap(&mut self.schur_cholesky.blocks[blk], &mut eng.L);
            self.stabilize_indices[blk] = eng.stabilize_indices;
            self.stabilize_lambdas[blk] = eng.stabilize_lambdas;
            if !self.stabilize_indices[blk].is_empty() {
                self.stabilized_blocks.push(blk);
            }
        }

        // ---- global layout of the U columns inside Q
        let N = sdp.dual_dim();
        let mut counts = vec![0u64; block_info.num_blocks()];
        if block_info.is_group_root() {
            for (blk, shape) in shapes.iter().enumerate() {
                counts[shape.global_index] = self.stabilize_indices[blk].len() as u64;
            }
        }
        world.sum_all_u64(&mut counts);
        let mut offsets_global = vec![0usize; block_info.num_blocks()];
        let mut total = 0usize;
        for (j, &c) in counts.iter().enumerate() {
            offsets_global[j] = N + total;
            total += c as usize;
        }
        self.q_dim = N + total;
        for (blk, shape) in shapes.iter().enumerate() {
            self.stabilize_offsets[blk] = offsets_global[shape.global_index];
        }

        // ---- off-diagonal parts L⁻¹B and L⁻¹U
        self.schur_off_diagonal.clear();
        for (blk, _) in shapes.iter().enumerate() {
            let L = &self.schur_cholesky.blocks[blk];
            let mut off = sdp.free_var_matrix[blk].clone();
            off.lower_triangular_solve(L);
            self.schur_off_diagonal.push(off);

            let indices = &self.stabilize_indices[blk];
            let mut U = Matrix::<T>::zeros((L.nrows(), indices.len()));
            for (col, (&row, &λ)) in indices
                .iter()
                .zip(self.stabilize_lambdas[blk].iter())
                .enumerate()
            {
                U[(row, col)] = λ;
            }
            U.lower_triangular_solve(L);
            self.stabilize_columns[blk] = U;
        }

        // ---- assemble and factor Q
        timeit! {timers => "schur.Q"; {
            self.assemble_q(block_info, world, N);
        }}
        let mut lu = LuEngine::new(self.q_dim);
        lu.factor(&self.Q)
            .map_err(|source| SolverError::SingularQ { source })?;
        self.lu = Some(lu);
        Ok(())
    }

    // Q = [B U]ᵀ L⁻ᵀ L⁻¹ [B U] − diag(0,…,0, 1,…,1), summed over blocks.
    // Cross terms between different blocks' U columns vanish because each
    // U column is supported on a single block's rows, so every entry is a
    // sum of per-block contributions and one global reduction replicates
    // the full matrix.
    fn assemble_q<C: Collective>(&mut self, block_info: &BlockInfo<C>, world: &C, N: usize) {
        self.Q = Matrix::zeros((self.q_dim, self.q_dim));
        if block_info.is_group_root() {
            for off in &self.schur_off_diagonal {
                let mut top = Matrix::<T>::zeros((N, N));
                top.mul(&off.t(), off, T::one(), T::zero());
                for j in 0..N {
                    for i in 0..N {
                        self.Q[(i, j)] += top[(i, j)];
                    }
                }
            }

            for &blk in &self.stabilized_blocks {
                let off = &self.schur_off_diagonal[blk];
                let stab = &self.stabilize_columns[blk];
                let offset = self.stabilize_offsets[blk];

                let mut cross = Matrix::<T>::zeros((N, stab.ncols()));
                cross.mul(&off.t(), stab, T::one(), T::zero());
                for j in 0..stab.ncols() {
                    for i in 0..N {
                        self.Q[(i, offset + j)] += cross[(i, j)];
                        self.Q[(offset + j, i)] += cross[(i, j)];
                    }
                }
                let mut corner = Matrix::<T>::zeros((stab.ncols(), stab.ncols()));
                corner.mul(&stab.t(), stab, T::one(), T::zero());
                for j in 0..stab.ncols() {
                    for i in 0..stab.ncols() {
                        self.Q[(offset + i, offset + j)] += corner[(i, j)];
                    }
                }
            }
        }
        world.sum_all(self.Q.data_mut());
        for i in N..self.q_dim {
            self.Q[(i, i)] -= T::one();
        }
    }

    /// Solve the coupled system in place.
    ///
    /// On entry `dx` holds the per-block right-hand side `r_x` and `r_y`
    /// the replicated free-variable right-hand side; on exit `dx` is the
    /// solution and the returned vector is `dy`.
    pub fn solve<C: Collective>(
        &self,
        block_info: &BlockInfo<C>,
        world: &C,
        dx: &mut [Vec<T>],
        r_y: &[T],
    ) -> Vec<T> {
        let lu = self.lu.as_ref().unwrap();
        let N = r_y.len();

        // v = L⁻¹ r_x blockwise
        for (blk, v) in dx.iter_mut().enumerate() {
            lower_triangular_solve_vec(&self.schur_cholesky.blocks[blk], v);
        }

        // w = r_y~ − [B U]ᵀ L⁻ᵀ... i.e. subtract (L⁻¹[B U])ᵀ v, globally
        let mut contrib = vec![T::zero(); self.q_dim];
        if block_info.is_group_root() {
            for (blk, v) in dx.iter().enumerate() {
                let off = &self.schur_off_diagonal[blk];
                off.gemv_t(&mut contrib[0..N], v, T::one(), T::one());
            }
            for &blk in &self.stabilized_blocks {
                let stab = &self.stabilize_columns[blk];
                let offset = self.stabilize_offsets[blk];
                stab.gemv_t(
                    &mut contrib[offset..offset + stab.ncols()],
                    &dx[blk],
                    T::one(),
                    T::one(),
                );
            }
        }
        world.sum_all(&mut contrib);

        let mut dy_ext = vec![T::zero(); self.q_dim];
        for i in 0..N {
            dy_ext[i] = r_y[i] - contrib[i];
        }
        for i in N..self.q_dim {
            dy_ext[i] = -contrib[i];
        }

        // dy~ = Q⁻¹ (r_y~ − contrib), replicated on every process
        lu.solve(&mut dy_ext);

        // dx = L⁻ᵀ (v + L⁻¹[B U]·dy~) blockwise
        for &blk in &self.stabilized_blocks {
            let stab = &self.stabilize_columns[blk];
            let offset = self.stabilize_offsets[blk];
            stab.gemv(
                &mut dx[blk],
                &dy_ext[offset..offset + stab.ncols()],
                T::one(),
                T::one(),
            );
        }
        for (blk, v) in dx.iter_mut().enumerate() {
            let off = &self.schur_off_diagonal[blk];
            off.gemv(v, &dy_ext[0..N], T::one(), T::one());
            lower_triangular_transpose_solve_vec(&self.schur_cholesky.blocks[blk], v);
        }

        dy_ext.truncate(N);
        dy_ext
    }
}

// Contiguous column range handled by group member `rank` of `size`.
fn columns_for_member(n: usize, rank: usize, size: usize) -> (usize, usize) {
    let per = n / size;
    let rem = n % size;
    let begin = rank * per + rank.min(rem);
    let len = per + usize::from(rank < rem);
    (begin, begin + len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_for_member_cover() {
        for n in 0..20 {
            for size in 1..5 {
                let mut covered = vec![false; n];
                for rank in 0..size {
                    let (a, b) = columns_for_member(n, rank, size);
                    for c in a..b {
                        assert!(!covered[c]);
                        covered[c] = true;
                    }
                }
                assert!(covered.iter().all(|&c| c));
            }
        }
    }
}
