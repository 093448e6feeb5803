//! Immutable SDP problem data.
//!
//! [`SdpData`] holds the full problem as produced by the external input
//! layer; [`Sdp`] is the distributed view a process group works with,
//! carrying only the owned blocks.  Both are immutable once constructed
//! and live for the duration of one solve (or one outer-refinement pass).

#![allow(non_snake_case)]

use crate::algebra::{Matrix, Scalar, ShapedMatrix};
use crate::blockinfo::BlockInfo;
use crate::comm::Collective;

/// Full (undistributed) problem data.
///
/// Block `j` has matrix dimension `dimensions[j]` and `num_points[j]`
/// sample points; its constraint rows number
/// `num_points[j]·dim[j]·(dim[j]+1)/2`.
#[derive(Debug, Clone)]
pub struct SdpData<T> {
    /// constant `b₀` added to both objectives
    pub objective_const: T,
    /// dual objective vector `b`, length `N`
    pub dual_objective_b: Vec<T>,
    pub dimensions: Vec<usize>,
    pub num_points: Vec<usize>,
    /// primal objective vector `c`, one segment per block
    pub primal_objective_c: Vec<Vec<T>>,
    /// free-variable matrix `B`, one row-segment per block, each `P_j × N`
    pub free_var_matrix: Vec<Matrix<T>>,
    /// sample bases, even/odd parity pair per block
    pub bilinear_bases: Vec<[Matrix<T>; 2]>,
    /// transform from the reduced variable space to the dual-objective
    /// space, used by the outer refinement loop
    pub yp_to_y: Option<Matrix<T>>,
    /// scale applied to `c` when a reduced transform is in use
    pub primal_c_scale: T,
}

impl<T: Scalar> SdpData<T> {
    pub fn new(
        objective_const: T,
        dimensions: Vec<usize>,
        num_points: Vec<usize>,
        primal_objective_c: Vec<Vec<T>>,
        free_var_matrix: Vec<Matrix<T>>,
        bilinear_bases: Vec<[Matrix<T>; 2]>,
        dual_objective_b: Vec<T>,
    ) -> Self {
        let data = Self {
            objective_const,
            dual_objective_b,
            dimensions,
            num_points,
            primal_objective_c,
            free_var_matrix,
            bilinear_bases,
            yp_to_y: None,
            primal_c_scale: T::one(),
        };
        data.check_dimensions();
        data
    }

    /// Problem data expressed against a reduced variable space: the solver
    /// runs over `yp` with `y = yp_to_y · yp`, and `c` is scaled by
    /// `primal_c_scale`.  `dual_objective_b` must already be the reduced
    /// vector `b*`.
    pub fn with_reduced_transform(mut self, yp_to_y: Matrix<T>, primal_c_scale: T) -> Self {
        assert!(yp_to_y.ncols() == self.dual_objective_b.len());
        self.yp_to_y = Some(yp_to_y);
        self.primal_c_scale = primal_c_scale;
        self
    }

    pub fn num_blocks(&self) -> usize {
        self.dimensions.len()
    }

    /// Length of the free variable vector `y` the solver iterates over.
    pub fn dual_dim(&self) -> usize {
        self.dual_objective_b.len()
    }

    fn schur_size(&self, j: usize) -> usize {
        self.num_points[j] * self.dimensions[j] * (self.dimensions[j] + 1) / 2
    }

    fn check_dimensions(&self) {
        let J = self.num_blocks();
        assert!(self.num_points.len() == J);
        assert!(self.primal_objective_c.len() == J);
        assert!(self.free_var_matrix.len() == J);
        assert!(self.bilinear_bases.len() == J);
        let N = self.dual_dim();
        for j in 0..J {
            let P_j = self.schur_size(j);
            let k = self.num_points[j];
            assert!(self.primal_objective_c[j].len() == P_j);
            assert!(self.free_var_matrix[j].nrows() == P_j);
            assert!(self.free_var_matrix[j].ncols() == N);
            let even = (k + 1) / 2;
            assert!(self.bilinear_bases[j][0].size() == (even, k));
            assert!(self.bilinear_bases[j][1].size() == (k - even, k));
        }
    }
}

/// The distributed view of an [`SdpData`]: the blocks owned by this
/// process's group, against a fixed [`BlockInfo`] partition.
#[derive(Debug, Clone)]
pub struct Sdp<T> {
    pub objective_const: T,
    /// reduced-space dual objective, replicated on every process
    pub dual_objective_b: Vec<T>,
    /// per owned block, in `block_indices` order
    pub primal_objective_c: Vec<Vec<T>>,
    pub free_var_matrix: Vec<Matrix<T>>,
    pub bilinear_bases: Vec<[Matrix<T>; 2]>,
    pub yp_to_y: Option<Matrix<T>>,
    pub primal_c_scale: T,
}

impl<T: Scalar> Sdp<T> {
    /// Select this process's owned blocks out of the full data, applying
    /// the reduced transform if one is present.
    pub fn distribute<C: Collective>(data: &SdpData<T>, block_info: &BlockInfo<C>) -> Self {
        assert!(data.dimensions == block_info.dimensions);
        assert!(data.num_points == block_info.num_points);

        let mut primal_objective_c = Vec::with_capacity(block_info.block_indices.len());
        let mut free_var_matrix = Vec::with_capacity(block_info.block_indices.len());
        let mut bilinear_bases = Vec::with_capacity(block_info.block_indices.len());

        for &j in &block_info.block_indices {
            let mut c = data.primal_objective_c[j].clone();
            if data.yp_to_y.is_some() {
                for v in &mut c {
                    *v = *v * data.primal_c_scale;
                }
            }
            primal_objective_c.push(c);

            let B = match &data.yp_to_y {
                Some(transform) => {
                    let src = &data.free_var_matrix[j];
                    let mut reduced =
                        Matrix::<T>::zeros((src.nrows(), transform.ncols()));
                    reduced.mul(src, transform, T::one(), T::zero());
                    reduced
                }
                None => data.free_var_matrix[j].clone(),
            };
            free_var_matrix.push(B);
            bilinear_bases.push(data.bilinear_bases[j].clone());
        }

        Self {
            objective_const: data.objective_const,
            dual_objective_b: data.dual_objective_b.clone(),
            primal_objective_c,
            free_var_matrix,
            bilinear_bases,
            yp_to_y: data.yp_to_y.clone(),
            primal_c_scale: data.primal_c_scale,
        }
    }

    pub fn dual_dim(&self) -> usize {
        self.dual_objective_b.len()
    }

    /// Map a reduced-space point back to the dual-objective space.
    pub fn y_from_yp(&self, yp: &[T]) -> Vec<T> {
        match &self.yp_to_y {
            Some(transform) => {
                let mut y = vec![T::zero(); transform.nrows()];
                transform.gemv(&mut y, yp, T::one(), T::zero());
                y
            }
            None => yp.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::SerialComm;

    fn tiny_data() -> SdpData<f64> {
        // two 1×1 blocks with one sample point each, N = 1
        SdpData::new(
            0.0,
            vec![1, 1],
            vec![1, 1],
            vec![vec![1.0], vec![2.0]],
            vec![
                Matrix::from_rows(&[&[1.0]]),
                Matrix::from_rows(&[&[1.0]]),
            ],
            vec![
                [Matrix::from_rows(&[&[1.0]]), Matrix::zeros((0, 1))],
                [Matrix::from_rows(&[&[1.0]]), Matrix::zeros((0, 1))],
            ],
            vec![1.0],
        )
    }

    #[test]
    fn test_distribute_serial() {
        let data = tiny_data();
        let world = SerialComm::world();
        let info = BlockInfo::serial(&world, data.dimensions.clone(), data.num_points.clone());
        let sdp = Sdp::distribute(&data, &info);
        assert_eq!(sdp.primal_objective_c.len(), 2);
        assert_eq!(sdp.dual_dim(), 1);
    }

    #[test]
    fn test_reduced_transform_folds_into_free_vars() {
        let data = tiny_data();
        // reduced space of dimension 1, y = 2·yp
        let data = SdpData {
            dual_objective_b: vec![3.0],
            ..data
        }
        .with_reduced_transform(Matrix::from_rows(&[&[2.0]]), 0.5);

        let world = SerialComm::world();
        let info = BlockInfo::serial(&world, data.dimensions.clone(), data.num_points.clone());
        let sdp = Sdp::distribute(&data, &info);
        assert_eq!(sdp.free_var_matrix[0][(0, 0)], 2.0);
        assert_eq!(sdp.primal_objective_c[0][0], 0.5);
        assert_eq!(sdp.y_from_yp(&[1.5]), vec![3.0]);
    }
}
