#![allow(non_snake_case)]
use super::core::{Matrix, ShapedMatrix};
use crate::algebra::{DenseFactorizationError, Scalar};

/// Eigenvalues of a symmetric dense matrix.
///
/// Householder reduction to tridiagonal form followed by the implicit QL
/// iteration, eigenvalues only.  This is the step-length workhorse: the
/// solver needs the minimum eigenvalue of `L⁻¹·dX·L⁻ᵀ` for every block at
/// every iteration, over the opaque scalar type.
pub(crate) struct SymEigenEngine<T> {
    work: Matrix<T>,
    d: Vec<T>,
    e: Vec<T>,
}

impl<T: Scalar> SymEigenEngine<T> {
    pub fn new(n: usize) -> Self {
        Self {
            work: Matrix::<T>::zeros((n, n)),
            d: vec![T::zero(); n],
            e: vec![T::zero(); n],
        }
    }

    /// Compute all eigenvalues of symmetric `A` into `self.eigenvalues()`,
    /// unordered.
    pub fn factor(&mut self, A: &Matrix<T>) -> Result<(), DenseFactorizationError> {
        if A.size() != self.work.size() {
            return Err(DenseFactorizationError::IncompatibleDimension);
        }
        if A.nrows() == 0 {
            return Ok(());
        }
        self.work.data_mut().copy_from_slice(A.data());
        self.tridiagonalize();
        self.ql_implicit()
    }

    pub fn eigenvalues(&self) -> &[T] {
        &self.d
    }

    pub fn min_eigenvalue(&self) -> T {
        self.d
            .iter()
            .fold(T::infinity(), |m, &v| T::min(m, v))
    }

    // Householder reduction of work to tridiagonal (d, e), lower triangle
    // referenced, eigenvector accumulation omitted.
    fn tridiagonalize(&mut self) {
        let a = &mut self.work;
        let d = &mut self.d;
        let e = &mut self.e;
        let n = a.nrows();

        for i in (1..n).rev() {
            let l = i - 1;
            let mut h = T::zero();
            if l > 0 {
                let mut scale = T::zero();
                for k in 0..=l {
                    scale += T::abs(a[(i, k)]);
                }
                if scale == T::zero() {
                    e[i] = a[(i, l)];
                } else {
                    for k in 0..=l {
                        a[(i, k)] = a[(i, k)] / scale;
                        h += a[(i, k)] * a[(i, k)];
                    }
                    let f = a[(i, l)];
                    let g = if f >= T::zero() {
                        -T::sqrt(h)
                    } else {
                        T::sqrt(h)
                    };
                    e[i] = scale * g;
                    h -= f * g;
                    a[(i, l)] = f - g;
                    let mut f = T::zero();
                    for j in 0..=l {
                        let mut g = T::zero();
                        for k in 0..=j {
                            g += a[(j, k)] * a[(i, k)];
                        }
                        for k in (j + 1)..=l {
                            g += a[(k, j)] * a[(i, k)];
                        }
                        e[j] = g / h;
                        f += e[j] * a[(i, j)];
                    }
                    let hh = f / (h + h);
                    for j in 0..=l {
                        let f = a[(i, j)];
                        let g = e[j] - hh * f;
                        e[j] = g;
                        for k in 0..=j {
                            a[(j, k)] = a[(j, k)] - (f * e[k] + g * a[(i, k)]);
                        }
                    }
                }
            } else {
                e[i] = a[(i, l)];
            }
            d[i] = h;
        }
        for i in 0..n {
            d[i] = a[(i, i)];
        }
        e[0] = T::zero();
    }

    // Implicit QL iteration with shifts on the tridiagonal (d, e).
    fn ql_implicit(&mut self) -> Result<(), DenseFactorizationError> {
        let d = &mut self.d;
        let e = &mut self.e;
        let n = d.len();
        for i in 1..n {
            e[i - 1] = e[i];
        }
        e[n - 1] = T::zero();

        for l in 0..n {
            let mut iter = 0usize;
            loop {
                let mut m = l;
                while m + 1 < n {
                    let dd = T::abs(d[m]) + T::abs(d[m + 1]);
                    if T::abs(e[m]) <= T::epsilon() * dd {
                        break;
                    }
                    m += 1;
                }
                if m == l {
                    break;
                }
                iter += 1;
                if iter > 50 {
                    return Err(DenseFactorizationError::Eigen);
                }
                let mut g = (d[l + 1] - d[l]) / ((T::one() + T::one()) * e[l]);
                let mut r = T::hypot(g, T::one());
                let sign_r = if g >= T::zero() { T::abs(r) } else { -T::abs(r) };
                g = d[m] - d[l] + e[l] / (g + sign_r);
                let mut s = T::one();
                let mut c = T::one();
                let mut p = T::zero();
                let mut underflow = false;
                for i in (l..m).rev() {
                    let mut f = s * e[i];
                    let b = c * e[i];
                    r = T::hypot(f, g);
                    e[i + 1] = r;
                    if r == T::zero() {
                        d[i + 1] -= p;
                        e[m] = T::zero();
                        underflow = true;
                        break;
                    }
                    s = f / r;
                    c = g / r;
                    g = d[i + 1] - p;
                    f = (d[i] - g) * s + (T::one() + T::one()) * c * b;
                    p = s * f;
                    d[i + 1] = g + p;
                    g = c * f - b;
                }
                if underflow {
                    continue;
                }
                d[l] -= p;
                e[l] = g;
                e[m] = T::zero();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eigenvalues_3x3() {
        #[rustfmt::skip]
        let A = Matrix::from_rows(
            &[&[ 2.0, -1.0,  0.0],
              &[-1.0,  2.0, -1.0],
              &[ 0.0, -1.0,  2.0]]);
        let mut eng = SymEigenEngine::<f64>::new(3);
        eng.factor(&A).unwrap();

        let mut ev = eng.eigenvalues().to_vec();
        ev.sort_by(|a, b| a.partial_cmp(b).unwrap());
        // analytic spectrum: 2 - √2, 2, 2 + √2
        let sqrt2 = 2.0_f64.sqrt();
        assert!((ev[0] - (2.0 - sqrt2)).abs() < 1e-12);
        assert!((ev[1] - 2.0).abs() < 1e-12);
        assert!((ev[2] - (2.0 + sqrt2)).abs() < 1e-12);
    }

    #[test]
    fn test_min_eigenvalue_indefinite() {
        let A = Matrix::from_rows(&[&[0.0, 3.0], &[3.0, 0.0]]);
        let mut eng = SymEigenEngine::<f64>::new(2);
        eng.factor(&A).unwrap();
        assert!((eng.min_eigenvalue() + 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_eigenvalues_1x1_and_empty() {
        let A = Matrix::from_rows(&[&[5.0]]);
        let mut eng = SymEigenEngine::<f64>::new(1);
        eng.factor(&A).unwrap();
        assert_eq!(eng.min_eigenvalue(), 5.0);

        let A = Matrix::<f64>::zeros((0, 0));
        let mut eng = SymEigenEngine::<f64>::new(0);
        eng.factor(&A).unwrap();
    }
}
