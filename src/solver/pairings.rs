//! Bilinear pairings between sample bases and the psd matrix variables.
//!
//! Every constraint matrix `A_p` of a block is a symmetrized placement of
//! a rank-one sample product into one `(r, s)` sub-block grid position, so
//! all the contractions the solver needs (`Tr(A_p Y)`, `Tr(A_p Z)`, the
//! Schur complement entries `Tr(A_p X⁻¹ A_q Y)` and the weighted sum
//! `Σₚ aₚ A_p`) reduce to pairings of basis columns against sub-blocks of
//! the psd matrices.

#![allow(non_snake_case)]

use crate::algebra::{AsScalarT, BlockDiagonalMatrix, Matrix, Scalar};

/// Shape of one locally owned block, with its constraint index tuples.
///
/// Tuples run `(r, s, t)` with `s` outermost, `r ≤ s`, and the sample
/// index `t` innermost; the tuple's position is the local constraint
/// index `p`.
#[derive(Debug, Clone)]
pub(crate) struct BlockShape {
    pub global_index: usize,
    pub dim: usize,
    pub num_points: usize,
    pub tuples: Vec<(usize, usize, usize)>,
}

impl BlockShape {
    pub fn new(global_index: usize, dim: usize, num_points: usize) -> Self {
        let mut tuples = Vec::with_capacity(num_points * dim * (dim + 1) / 2);
        for s in 0..dim {
            for r in 0..=s {
                for t in 0..num_points {
                    tuples.push((r, s, t));
                }
            }
        }
        Self {
            global_index,
            dim,
            num_points,
            tuples,
        }
    }

    pub fn schur_size(&self) -> usize {
        self.tuples.len()
    }
}

/// The block-replicated sample basis `I_dim ⊗ V`, sized
/// `(dim·rows(V)) × (dim·num_points)`.  Constant across iterations.
pub(crate) fn sampled_basis<T: Scalar>(V: &Matrix<T>, dim: usize) -> Matrix<T> {
    let rows = V.m;
    let k = V.n;
    let mut E = Matrix::<T>::zeros((dim * rows, dim * k));
    for s in 0..dim {
        for u in 0..k {
            for i in 0..rows {
                E[(s * rows + i, s * k + u)] = V[(i, u)];
            }
        }
    }
    E
}

/// Both parities' sampled bases for one block.
pub(crate) fn sampled_basis_pair<T: Scalar>(bases: &[Matrix<T>; 2], dim: usize) -> [Matrix<T>; 2] {
    [
        sampled_basis(&bases[0], dim),
        sampled_basis(&bases[1], dim),
    ]
}

/// `Eᵀ·(X⁻¹)·E` given the lower Cholesky factor of the psd block, i.e.
/// `(L⁻¹E)ᵀ(L⁻¹E)`.  Entry `(s·k+u, r·k+v)` is `v_uᵀ (X⁻¹)⁽ˢʳ⁾ v_v`.
pub(crate) fn bilinear_pairings_x_inv<T: Scalar>(E: &Matrix<T>, L: &Matrix<T>) -> Matrix<T> {
    let mut W = E.clone();
    W.lower_triangular_solve(L);
    let mut P = Matrix::<T>::zeros((E.n, E.n));
    P.mul(&W.t(), &W, T::one(), T::zero());
    P
}

/// `Eᵀ·Y·E`.  Entry `(s·k+u, r·k+v)` is `v_uᵀ Y⁽ˢʳ⁾ v_v`.
pub(crate) fn bilinear_pairings_y<T: Scalar>(E: &Matrix<T>, Y: &Matrix<T>) -> Matrix<T> {
    let mut W = Matrix::<T>::zeros((Y.m, E.n));
    W.mul(Y, E, T::one(), T::zero());
    let mut P = Matrix::<T>::zeros((E.n, E.n));
    P.mul(&E.t(), &W, T::one(), T::zero());
    P
}

/// `result = Σₚ aₚ·A_p` over the local blocks, written into the psd block
/// structure of `result` (two psd blocks per local block).
pub(crate) fn constraint_matrix_weighted_sum<T: Scalar>(
    shapes: &[BlockShape],
    bases: &[[Matrix<T>; 2]],
    a: &[Vec<T>],
    result: &mut BlockDiagonalMatrix<T>,
) {
    result.set_zero();
    for (blk, shape) in shapes.iter().enumerate() {
        let k = shape.num_points;
        for parity in 0..2 {
            let V = &bases[blk][parity];
            let block = &mut result.blocks[2 * blk + parity];
            // tuples with the same (r, s) are contiguous over t, so each
            // group contributes one diagonal congruence V·diag(a)·Vᵀ
            let mut p = 0;
            while p < shape.tuples.len() {
                let (r, s, _) = shape.tuples[p];
                diagonal_congruence(&a[blk][p..p + k], V, r, s, block);
                p += k;
            }
            block.symmetrize();
        }
    }
}

// block^(r,s) += V·diag(d)·Vᵀ
fn diagonal_congruence<T: Scalar>(
    d: &[T],
    V: &Matrix<T>,
    r: usize,
    s: usize,
    block: &mut Matrix<T>,
) {
    let rows = V.m;
    for j in 0..rows {
        for i in 0..rows {
            let mut acc = T::zero();
            for (t, &dt) in d.iter().enumerate() {
                acc += dt * V[(i, t)] * V[(j, t)];
            }
            block[(r * rows + i, s * rows + j)] += acc;
        }
    }
}

/// Accumulate `out[p] -= Tr(A_p M)` for a symmetric block-diagonal `M`
/// with the same psd structure as `X`, computed directly from `M`.
pub(crate) fn subtract_trace_pairings<T: Scalar>(
    shape: &BlockShape,
    bases: &[Matrix<T>; 2],
    M_even: &Matrix<T>,
    M_odd: &Matrix<T>,
    out: &mut [T],
) {
    let half: T = (0.5).as_T();
    for (p, &(r, s, t)) in shape.tuples.iter().enumerate() {
        let mut acc = T::zero();
        for (parity, M) in [M_even, M_odd].into_iter().enumerate() {
            let V = &bases[parity];
            acc += quadratic_form(V, t, M, r, s) + quadratic_form(V, t, M, s, r);
        }
        out[p] -= acc * half;
    }
}

// v_tᵀ · M^(r,s) · v_t
fn quadratic_form<T: Scalar>(
    V: &Matrix<T>,
    t: usize,
    M: &Matrix<T>,
    r: usize,
    s: usize,
) -> T {
    let rows = V.m;
    let mut acc = T::zero();
    for i in 0..rows {
        let vi = V[(i, t)];
        if vi == T::zero() {
            continue;
        }
        let mut inner = T::zero();
        for j in 0..rows {
            inner += M[(r * rows + i, s * rows + j)] * V[(j, t)];
        }
        acc += vi * inner;
    }
    acc
}

/// Accumulate `out[p] -= Tr(A_p Y)` from precomputed pairing matrices.
pub(crate) fn subtract_trace_from_pairings<T: Scalar>(
    shape: &BlockShape,
    pairings: &[&Matrix<T>; 2],
    out: &mut [T],
) {
    let k = shape.num_points;
    let half: T = (0.5).as_T();
    for (p, &(r, s, t)) in shape.tuples.iter().enumerate() {
        let mut acc = T::zero();
        for P in pairings {
            acc += P[(s * k + t, r * k + t)] + P[(r * k + t, s * k + t)];
        }
        out[p] -= acc * half;
    }
}

/// One block of the Schur complement:
/// `S[p,q] = Tr(A_p X⁻¹ A_q Y)`, assembled from the `X⁻¹` and `Y` pairing
/// matrices of the block's two psd halves.  Only columns in
/// `col_begin..col_end` are written, so group members can split the work.
pub(crate) fn schur_complement_block<T: Scalar>(
    shape: &BlockShape,
    pairings_x_inv: &[&Matrix<T>; 2],
    pairings_y: &[&Matrix<T>; 2],
    col_range: (usize, usize),
    S: &mut Matrix<T>,
) {
    let k = shape.num_points;
    let quarter: T = (0.25).as_T();
    for u2 in col_range.0..col_range.1 {
        let (r2, s2, t2) = shape.tuples[u2];
        for u1 in 0..shape.tuples.len() {
            let (r1, s1, t1) = shape.tuples[u1];
            let mut elt = T::zero();
            for (PXI, PY) in pairings_x_inv.iter().zip(pairings_y.iter()) {
                elt += PXI[(s1 * k + t1, r2 * k + t2)] * PY[(s2 * k + t2, r1 * k + t1)]
                    + PXI[(r1 * k + t1, r2 * k + t2)] * PY[(s2 * k + t2, s1 * k + t1)]
                    + PXI[(s1 * k + t1, s2 * k + t2)] * PY[(r2 * k + t2, r1 * k + t1)]
                    + PXI[(r1 * k + t1, s2 * k + t2)] * PY[(r2 * k + t2, s1 * k + t1)];
            }
            S[(u1, u2)] = elt * quarter;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::dense::CholeskyEngine;

    // dim = 1, one sample point, base V = [[1]]: A_0 is the 1×1 identity
    fn scalar_shape() -> (BlockShape, [Matrix<f64>; 2]) {
        let shape = BlockShape::new(0, 1, 1);
        let bases = [Matrix::from_rows(&[&[1.0]]), Matrix::zeros((0, 1))];
        (shape, bases)
    }

    #[test]
    fn test_tuple_enumeration() {
        let shape = BlockShape::new(0, 2, 3);
        assert_eq!(shape.schur_size(), 3 * 2 * 3 / 2);
        // s outer, r ≤ s, t inner
        assert_eq!(shape.tuples[0], (0, 0, 0));
        assert_eq!(shape.tuples[3], (0, 1, 0));
        assert_eq!(shape.tuples[6], (1, 1, 0));
    }

    #[test]
    fn test_weighted_sum_scalar_block() {
        let (shape, bases) = scalar_shape();
        let mut result = BlockDiagonalMatrix::<f64>::zeros(&[1, 0]);
        constraint_matrix_weighted_sum(
            &[shape],
            std::slice::from_ref(&bases),
            &[vec![2.5]],
            &mut result,
        );
        assert_eq!(result.blocks[0][(0, 0)], 2.5);
    }

    #[test]
    fn test_weighted_sum_2x2_offdiagonal() {
        // dim 2, one point: the (0,1) constraint is the symmetrized
        // off-diagonal unit matrix
        let shape = BlockShape::new(0, 2, 1);
        let bases = [Matrix::from_rows(&[&[1.0]]), Matrix::zeros((0, 1))];
        let mut result = BlockDiagonalMatrix::<f64>::zeros(&[2, 0]);
        // constraints in tuple order: (0,0,0), (0,1,0), (1,1,0)
        constraint_matrix_weighted_sum(
            &[shape],
            std::slice::from_ref(&bases),
            &[vec![3.0, 4.0, 5.0]],
            &mut result,
        );
        let B = &result.blocks[0];
        assert_eq!(B[(0, 0)], 3.0);
        assert_eq!(B[(1, 1)], 5.0);
        assert_eq!(B[(0, 1)], 2.0);
        assert_eq!(B[(1, 0)], 2.0);
    }

    #[test]
    fn test_pairings_match_direct_traces() {
        let shape = BlockShape::new(0, 2, 1);
        let bases = [Matrix::from_rows(&[&[1.0]]), Matrix::zeros((0, 1))];
        let Y = Matrix::from_rows(&[&[2.0, 0.5], &[0.5, 1.0]]);
        let E0 = sampled_basis(&bases[0], 2);
        let PY0 = bilinear_pairings_y(&E0, &Y);
        let PY1 = Matrix::<f64>::zeros((2, 2));

        let mut via_pairings = vec![0.0; 3];
        subtract_trace_from_pairings(&shape, &[&PY0, &PY1], &mut via_pairings);

        let empty = Matrix::<f64>::zeros((0, 0));
        let mut direct = vec![0.0; 3];
        subtract_trace_pairings(&shape, &bases, &Y, &empty, &mut direct);

        for (a, b) in via_pairings.iter().zip(direct.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
        // Tr(A_(0,1) Y) is the symmetrized off-diagonal: 0.5
        assert!((via_pairings[1] + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_schur_block_scalar_case() {
        // with X = 4, Y = 3 and A = 1: S = Tr(A X⁻¹ A Y) = 3/4
        let (shape, bases) = scalar_shape();
        let X = Matrix::from_rows(&[&[4.0]]);
        let Y = Matrix::from_rows(&[&[3.0]]);
        let mut chol = CholeskyEngine::<f64>::new(1);
        chol.cholesky(&X).unwrap();

        let E0 = sampled_basis(&bases[0], 1);
        let PXI0 = bilinear_pairings_x_inv(&E0, &chol.L);
        let PY0 = bilinear_pairings_y(&E0, &Y);
        let zero = Matrix::<f64>::zeros((1, 1));

        let mut S = Matrix::<f64>::zeros((1, 1));
        schur_complement_block(&shape, &[&PXI0, &zero], &[&PY0, &zero], (0, 1), &mut S);
        assert!((S[(0, 0)] - 0.75).abs() < 1e-12);
    }
}
