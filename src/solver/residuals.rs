//! Residues, objectives and the complementarity gap.

#![allow(non_snake_case)]

use super::pairings::{
    bilinear_pairings_x_inv, bilinear_pairings_y, constraint_matrix_weighted_sum,
    subtract_trace_from_pairings,
};
use super::{SolverError, SdpSolver};
use crate::algebra::{AsScalarT, Scalar, VectorMath};
use crate::comm::Collective;

impl<T: Scalar, C: Collective> SdpSolver<'_, T, C> {
    /// Update everything derived from the current point: the Cholesky
    /// factors of `X` and `Y`, the bilinear pairing matrices, both
    /// residues and their max-abs errors, the objectives, the normalized
    /// duality gap, and `mu = Tr(XY)/dim(X)`.
    pub(crate) fn compute_residues(&mut self) -> Result<(), SolverError> {
        self.X
            .cholesky_into(&mut self.X_cholesky)
            .map_err(|source| SolverError::Cholesky {
                matrix: "X",
                source,
            })?;
        self.Y
            .cholesky_into(&mut self.Y_cholesky)
            .map_err(|source| SolverError::Cholesky {
                matrix: "Y",
                source,
            })?;

        for blk in 0..self.shapes.len() {
            for parity in 0..2 {
                let b = 2 * blk + parity;
                let E = &self.sampled_bases[blk][parity];
                self.bilinear_pairings_X_inv[b] =
                    bilinear_pairings_x_inv(E, &self.X_cholesky.blocks[b]);
                self.bilinear_pairings_Y[b] = bilinear_pairings_y(E, &self.Y.blocks[b]);
            }
        }

        // PrimalResidues = Σ_p A_p x_p − X
        constraint_matrix_weighted_sum(
            &self.shapes,
            &self.sdp.bilinear_bases,
            &self.x,
            &mut self.primal_residues,
        );
        self.primal_residues.axpy(-T::one(), &self.X);
        self.primal_error = self.world.max_all(self.primal_residues.max_abs_local());

        // dualResidues = c − Tr(A·Y) − B·y
        let mut dual_error_local = T::zero();
        for blk in 0..self.shapes.len() {
            let d = &mut self.dual_residues[blk];
            d.copy_from(&self.sdp.primal_objective_c[blk]);
            self.sdp.free_var_matrix[blk].gemv(d, &self.y, -T::one(), T::one());
            subtract_trace_from_pairings(
                &self.shapes[blk],
                &[
                    &self.bilinear_pairings_Y[2 * blk],
                    &self.bilinear_pairings_Y[2 * blk + 1],
                ],
                d,
            );
            dual_error_local = T::max(dual_error_local, d.norm_inf());
        }
        self.dual_error = self.world.max_all(dual_error_local);

        // objectives and mu from globally reduced sums; block data is
        // replicated within a group, so only group roots contribute
        let mut sums = [T::zero(); 2];
        if self.block_info.is_group_root() {
            for blk in 0..self.shapes.len() {
                sums[0] += self.sdp.primal_objective_c[blk].dot(&self.x[blk]);
            }
            sums[1] = self.X.trace_product_sym_local(&self.Y);
        }
        self.world.sum_all(&mut sums);

        self.primal_objective = self.sdp.objective_const + sums[0];
        self.dual_objective =
            self.sdp.objective_const + self.sdp.dual_objective_b.dot(&self.y);
        let gap_scale = T::max(
            T::one(),
            T::abs(self.primal_objective) + T::abs(self.dual_objective),
        );
        self.duality_gap = T::abs(self.primal_objective - self.dual_objective) / gap_scale;
        self.mu = sums[1] / self.block_info.psd_total_dim().as_T();
        Ok(())
    }
}
