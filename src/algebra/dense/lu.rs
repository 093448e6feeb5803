#![allow(non_snake_case)]
use super::core::{Matrix, ShapedMatrix};
use crate::algebra::{DenseFactorizationError, Scalar};

/// Dense LU factorization with partial pivoting.
///
/// Used for the small replicated `Q` matrix closing the Schur complement
/// system.  `Q` is symmetric quasi-definite rather than positive definite,
/// so a pivoted decomposition is required.
pub(crate) struct LuEngine<T> {
    /// combined L (unit lower) / U factors
    pub LU: Matrix<T>,
    /// row pivots: row `i` was swapped with `pivots[i]` at step `i`
    pub pivots: Vec<usize>,
}

impl<T: Scalar> LuEngine<T> {
    pub fn new(n: usize) -> Self {
        Self {
            LU: Matrix::<T>::zeros((n, n)),
            pivots: vec![0; n],
        }
    }

    pub fn factor(&mut self, A: &Matrix<T>) -> Result<(), DenseFactorizationError> {
        if A.size() != self.LU.size() {
            return Err(DenseFactorizationError::IncompatibleDimension);
        }
        let n = A.nrows();
        self.LU.data_mut().copy_from_slice(A.data());

        for j in 0..n {
            // select pivot row
            let mut p = j;
            let mut pmax = T::abs(self.LU[(j, j)]);
            for i in (j + 1)..n {
                let v = T::abs(self.LU[(i, j)]);
                if v > pmax {
                    pmax = v;
                    p = i;
                }
            }
            if pmax == T::zero() {
                return Err(DenseFactorizationError::LU(j));
            }
            self.pivots[j] = p;
            if p != j {
                self.swap_rows(j, p);
            }

            let piv = self.LU[(j, j)];
            for i in (j + 1)..n {
                let l = self.LU[(i, j)] / piv;
                self.LU[(i, j)] = l;
                for k in (j + 1)..n {
                    let u = self.LU[(j, k)];
                    self.LU[(i, k)] = self.LU[(i, k)] - l * u;
                }
            }
        }
        Ok(())
    }

    /// Solve `A·x = b` in place using the stored factors.
    pub fn solve(&self, b: &mut [T]) {
        let n = self.LU.nrows();
        assert!(b.len() == n);

        for j in 0..n {
            b.swap(j, self.pivots[j]);
        }
        // forward substitution with unit lower factor
        for i in 1..n {
            let mut v = b[i];
            for k in 0..i {
                v -= self.LU[(i, k)] * b[k];
            }
            b[i] = v;
        }
        // back substitution with upper factor
        for i in (0..n).rev() {
            let mut v = b[i];
            for k in (i + 1)..n {
                v -= self.LU[(i, k)] * b[k];
            }
            b[i] = v / self.LU[(i, i)];
        }
    }

    fn swap_rows(&mut self, a: usize, b: usize) {
        for k in 0..self.LU.ncols() {
            let ia = self.LU.index_linear((a, k));
            let ib = self.LU.index_linear((b, k));
            self.LU.data.swap(ia, ib);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lu_solve() {
        #[rustfmt::skip]
        let A = Matrix::from_rows(
            &[&[0.0, 2.0, 1.0],
              &[1.0, 1.0, 0.0],
              &[2.0, 0.0, 3.0]]);
        let mut eng = LuEngine::<f64>::new(3);
        eng.factor(&A).unwrap();

        // solve against a known x
        let x = [1.0, -2.0, 0.5];
        let mut b = vec![0.0; 3];
        A.gemv(&mut b, &x, 1.0, 0.0);
        eng.solve(&mut b);
        for (got, want) in b.iter().zip(x.iter()) {
            assert!((got - want).abs() < 1e-12);
        }
    }

    #[test]
    fn test_lu_singular() {
        let A = Matrix::from_rows(&[&[1.0, 2.0], &[2.0, 4.0]]);
        let mut eng = LuEngine::<f64>::new(2);
        assert!(matches!(
            eng.factor(&A),
            Err(DenseFactorizationError::LU(1))
        ));
    }
}
