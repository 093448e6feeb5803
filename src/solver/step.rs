//! Search directions and step-length control.

#![allow(non_snake_case)]

use super::pairings::{constraint_matrix_weighted_sum, subtract_trace_pairings};
use super::{SdpSolver, SolverError};
use crate::algebra::dense::SymEigenEngine;
use crate::algebra::{AsScalarT, BlockDiagonalMatrix, Scalar, VectorMath};
use crate::comm::Collective;

impl<T: Scalar, C: Collective> SdpSolver<'_, T, C> {
    /// Solve the Newton system for `(dx, dX, dy, dY)` with the centering
    /// target `R = β·μ·I − XY` (minus `dX·dY` in the corrector phase,
    /// which refines the predictor direction already held in the `d`
    /// fields).
    pub(crate) fn compute_search_direction(&mut self, β: T, corrector: bool) {
        let one = T::one();

        // R = β·μ·I − XY (− dX·dY)
        self.R.mul(&self.X, &self.Y, -one, T::zero());
        if corrector {
            self.R.mul(&self.dX, &self.dY, -one, one);
        }
        self.R.add_diagonal(β * self.mu);

        // Z = Symmetrize(X⁻¹ (PrimalResidues·Y − R))
        self.Z.mul(&self.primal_residues, &self.Y, one, T::zero());
        self.Z.axpy(-one, &self.R);
        self.Z.solve_with_cholesky(&self.X_cholesky);
        self.Z.symmetrize();

        // r_x = −dualResidues − Tr(A·Z), per owned block
        for blk in 0..self.shapes.len() {
            let rhs = &mut self.dx[blk];
            rhs.copy_from(&self.dual_residues[blk]);
            rhs.negate();
            subtract_trace_pairings(
                &self.shapes[blk],
                &self.sdp.bilinear_bases[blk],
                &self.Z.blocks[2 * blk],
                &self.Z.blocks[2 * blk + 1],
                rhs,
            );
        }

        // r_y = b − Bᵀx, globally reduced once
        let N = self.sdp.dual_dim();
        let mut r_y = vec![T::zero(); N];
        if self.block_info.is_group_root() {
            for blk in 0..self.shapes.len() {
                self.sdp.free_var_matrix[blk].gemv_t(&mut r_y, &self.x[blk], T::one(), T::one());
            }
        }
        self.world.sum_all(&mut r_y);
        for (r, b) in r_y.iter_mut().zip(self.sdp.dual_objective_b.iter()) {
            *r = *b - *r;
        }

        // the two-level Schur solve replaces dx in place and yields dy
        self.dy = self
            .schur
            .solve(self.block_info, self.world, &mut self.dx, &r_y);

        // dX = PrimalResidues + Σ_p A_p dx_p
        constraint_matrix_weighted_sum(
            &self.shapes,
            &self.sdp.bilinear_bases,
            &self.dx,
            &mut self.dX,
        );
        self.dX.axpy(one, &self.primal_residues);

        // dY = Symmetrize(X⁻¹ (R − dX·Y))
        self.dY.mul(&self.dX, &self.Y, one, T::zero());
        self.dY.axpy(-one, &self.R);
        self.dY.solve_with_cholesky(&self.X_cholesky);
        self.dY.scale(-one);
        self.dY.symmetrize();
    }

    /// Mehrotra-style centering parameter for the corrector phase, from
    /// `r = Tr((X+dX)(Y+dY)) / (μ·dim)`.
    pub(crate) fn corrector_centering_parameter(&self, is_feasible: bool) -> T {
        let mut tr = [T::zero()];
        if self.block_info.is_group_root() {
            tr[0] = BlockDiagonalMatrix::trace_product_of_sums_local(
                &self.X, &self.dX, &self.Y, &self.dY,
            );
        }
        self.world.sum_all(&mut tr);

        let dim: T = self.block_info.psd_total_dim().as_T();
        let r = tr[0] / (self.mu * dim);
        let β = if r < T::one() { r * r } else { r };
        if is_feasible {
            T::min(
                T::max(self.settings.feasible_centering_parameter, β),
                T::one(),
            )
        } else {
            T::max(self.settings.infeasible_centering_parameter, β)
        }
    }
}

/// Largest step fraction `α` keeping `M + α·dM` positive semidefinite,
/// backed off by `γ`: with `λ` the minimum eigenvalue of `L⁻¹·dM·L⁻ᵀ`,
/// the step is `1` when `λ > −γ` and `−γ/λ` otherwise.  Agreed globally
/// so every process steps identically.
pub(crate) fn step_length<T: Scalar, C: Collective>(
    world: &C,
    cholesky: &BlockDiagonalMatrix<T>,
    direction: &BlockDiagonalMatrix<T>,
    γ: T,
) -> Result<T, SolverError> {
    let mut λ_local = T::infinity();
    for (L, dM) in cholesky.blocks.iter().zip(direction.blocks.iter()) {
        if dM.m == 0 {
            continue;
        }
        let mut W = dM.clone();
        W.lower_triangular_inverse_congruence(L);
        let mut eng = SymEigenEngine::new(W.m);
        eng.factor(&W)
            .map_err(|source| SolverError::StepLength { source })?;
        λ_local = T::min(λ_local, eng.min_eigenvalue());
    }
    let λ = -world.max_all(-λ_local);

    if λ > -γ {
        Ok(T::one())
    } else {
        Ok(-γ / λ)
    }
}
