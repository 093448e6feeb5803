#![allow(non_snake_case)]
use crate::algebra::{AsScalarT, Scalar, VectorMath};
use std::ops::{Index, IndexMut};

/// Dense column-major matrix.
///
/// The only storage type used for per-block data throughout the solver.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix<T> {
    /// number of rows
    pub m: usize,
    /// number of columns
    pub n: usize,
    /// vector of data in column major format
    pub data: Vec<T>,
}

/// Transposed view of a matrix, produced by [`Matrix::t`].
#[derive(Debug)]
pub struct Adjoint<'a, M> {
    pub src: &'a M,
}

pub trait ShapedMatrix {
    fn nrows(&self) -> usize;
    fn ncols(&self) -> usize;
    fn size(&self) -> (usize, usize) {
        (self.nrows(), self.ncols())
    }
    fn is_square(&self) -> bool {
        self.nrows() == self.ncols()
    }
}

/// Read access through (row, col) indexing for dense operands.
pub trait DenseMatrix: ShapedMatrix {
    type T;
    fn at(&self, idx: (usize, usize)) -> Self::T;
}

impl<T: Scalar> Matrix<T> {
    pub fn zeros(size: (usize, usize)) -> Self {
        let (m, n) = size;
        let data = vec![T::zero(); m * n];
        Self { m, n, data }
    }

    pub fn identity(n: usize) -> Self {
        let mut mat = Matrix::zeros((n, n));
        mat.set_identity();
        mat
    }

    pub fn set_identity(&mut self) {
        assert!(self.m == self.n);
        self.data_mut().set(T::zero());
        for i in 0..self.n {
            self[(i, i)] = T::one();
        }
    }

    pub fn new_from_slice(size: (usize, usize), src: &[T]) -> Self {
        let (m, n) = size;
        assert!(m * n == src.len());
        Self {
            m,
            n,
            data: src.to_vec(),
        }
    }

    /// Build from a row-major nested array, for tests and small fixtures.
    pub fn from_rows(rows: &[&[T]]) -> Self {
        let m = rows.len();
        let n = if m == 0 { 0 } else { rows[0].len() };
        let mut mat = Matrix::zeros((m, n));
        for (i, row) in rows.iter().enumerate() {
            assert!(row.len() == n);
            for (j, &v) in row.iter().enumerate() {
                mat[(i, j)] = v;
            }
        }
        mat
    }

    #[inline]
    pub fn index_linear(&self, idx: (usize, usize)) -> usize {
        debug_assert!(idx.0 < self.m && idx.1 < self.n);
        idx.0 + self.m * idx.1
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn t(&self) -> Adjoint<'_, Self> {
        Adjoint { src: self }
    }

    pub fn col_slice(&self, col: usize) -> &[T] {
        assert!(col < self.n);
        &self.data[(col * self.m)..(col + 1) * self.m]
    }

    pub fn col_slice_mut(&mut self, col: usize) -> &mut [T] {
        assert!(col < self.n);
        &mut self.data[(col * self.m)..(col + 1) * self.m]
    }

    pub fn set_zero(&mut self) {
        self.data_mut().set(T::zero());
    }

    pub fn scale(&mut self, c: T) {
        self.data_mut().scale(c);
    }

    /// `self += a * B`
    pub fn axpy(&mut self, a: T, B: &Matrix<T>) {
        assert!(self.size() == B.size());
        self.data_mut().axpby(a, B.data(), T::one());
    }

    /// Largest absolute entry.
    pub fn max_abs(&self) -> T {
        self.data().norm_inf()
    }

    /// `self = (self + selfᵀ)/2`
    pub fn symmetrize(&mut self) {
        assert!(self.is_square());
        let half: T = (0.5).as_T();
        for j in 0..self.n {
            for i in 0..j {
                let v = (self[(i, j)] + self[(j, i)]) * half;
                self[(i, j)] = v;
                self[(j, i)] = v;
            }
        }
    }

    /// Add `c` to every diagonal entry.
    pub fn add_diagonal(&mut self, c: T) {
        assert!(self.is_square());
        for i in 0..self.n {
            self[(i, i)] += c;
        }
    }

    /// Trace of the product `self · B`, both operands symmetric.
    pub fn trace_product_sym(&self, B: &Matrix<T>) -> T {
        assert!(self.size() == B.size());
        self.data().dot(B.data())
    }

    pub fn trace(&self) -> T {
        assert!(self.is_square());
        let mut t = T::zero();
        for i in 0..self.n {
            t += self[(i, i)];
        }
        t
    }
}

impl<T: Scalar> IndexMut<(usize, usize)> for Matrix<T> {
    fn index_mut(&mut self, idx: (usize, usize)) -> &mut Self::Output {
        let lidx = self.index_linear(idx);
        &mut self.data[lidx]
    }
}

impl<T: Scalar> Index<(usize, usize)> for Matrix<T> {
    type Output = T;
    fn index(&self, idx: (usize, usize)) -> &Self::Output {
        &self.data[self.index_linear(idx)]
    }
}

impl<T: Scalar> ShapedMatrix for Matrix<T> {
    fn nrows(&self) -> usize {
        self.m
    }
    fn ncols(&self) -> usize {
        self.n
    }
}

impl<T: Scalar> DenseMatrix for Matrix<T> {
    type T = T;
    #[inline]
    fn at(&self, idx: (usize, usize)) -> T {
        self.data[self.index_linear(idx)]
    }
}

impl<T: Scalar> ShapedMatrix for Adjoint<'_, Matrix<T>> {
    fn nrows(&self) -> usize {
        self.src.n
    }
    fn ncols(&self) -> usize {
        self.src.m
    }
}

impl<T: Scalar> DenseMatrix for Adjoint<'_, Matrix<T>> {
    type T = T;
    #[inline]
    fn at(&self, idx: (usize, usize)) -> T {
        self.src.at((idx.1, idx.0))
    }
}
