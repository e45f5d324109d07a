//! Constant sparse matrices used to build expressions.
use crate::error::BuildError;
use crate::shape::Shape;

/// A constant sparse matrix, stored as (row, column, value) triplets sorted
/// in row-major order without duplicates.
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    entries: Vec<(usize, usize, f64)>,
}

impl Matrix {
    /// Build a sparse matrix from triplets. Duplicate entries are summed.
    ///
    /// ```
    /// # use good_conic::Matrix;
    /// let m = Matrix::sparse(2, 3, &[0, 1, 1], &[2, 0, 0], &[1.5, 2., 3.]).unwrap();
    /// assert_eq!(m.get(1, 0), 5.);
    /// assert_eq!(m.get(0, 0), 0.);
    /// ```
    pub fn sparse(
        rows: usize,
        cols: usize,
        row_indices: &[usize],
        col_indices: &[usize],
        values: &[f64],
    ) -> Result<Self, BuildError> {
        if row_indices.len() != values.len() || col_indices.len() != values.len() {
            return Err(BuildError::ShapeMismatch(format!(
                "sparse matrix triplets have different lengths ({}, {}, {})",
                row_indices.len(),
                col_indices.len(),
                values.len()
            )));
        }
        let mut entries = Vec::with_capacity(values.len());
        for ((&i, &j), &v) in row_indices.iter().zip(col_indices).zip(values) {
            if i >= rows || j >= cols {
                return Err(BuildError::ShapeMismatch(format!(
                    "entry ({}, {}) is outside of a {}x{} matrix",
                    i, j, rows, cols
                )));
            }
            entries.push((i, j, v));
        }
        Ok(Self::from_unsorted(rows, cols, entries))
    }

    /// Build a matrix from dense row-major data
    pub fn dense(rows: usize, cols: usize, data: &[f64]) -> Result<Self, BuildError> {
        if data.len() != rows * cols {
            return Err(BuildError::shape_mismatch(
                "dense matrix data",
                rows * cols,
                data.len(),
            ));
        }
        let entries = data
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v != 0.)
            .map(|(k, &v)| (k / cols, k % cols, v))
            .collect();
        Ok(Matrix {
            rows,
            cols,
            entries,
        })
    }

    /// Build a matrix from a list of rows, which must all have the same length
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self, BuildError> {
        let cols = rows.first().map(|r| r.as_ref().len()).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            let row = row.as_ref();
            if row.len() != cols {
                return Err(BuildError::shape_mismatch("matrix row length", cols, row.len()));
            }
            data.extend_from_slice(row);
        }
        Self::dense(rows.len(), cols, &data)
    }

    /// The n x n identity matrix
    pub fn identity(n: usize) -> Self {
        Self::diag(&vec![1.; n])
    }

    /// A square matrix with the given diagonal
    pub fn diag(values: &[f64]) -> Self {
        let n = values.len();
        Matrix {
            rows: n,
            cols: n,
            entries: values
                .iter()
                .enumerate()
                .filter(|&(_, &v)| v != 0.)
                .map(|(i, &v)| (i, i, v))
                .collect(),
        }
    }

    fn from_unsorted(rows: usize, cols: usize, mut entries: Vec<(usize, usize, f64)>) -> Self {
        entries.sort_by_key(|&(i, j, _)| (i, j));
        let mut merged: Vec<(usize, usize, f64)> = Vec::with_capacity(entries.len());
        for (i, j, v) in entries {
            match merged.last_mut() {
                Some(last) if last.0 == i && last.1 == j => last.2 += v,
                _ => merged.push((i, j, v)),
            }
        }
        Matrix {
            rows,
            cols,
            entries: merged,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> Shape {
        Shape::matrix(self.rows, self.cols)
    }

    /// Number of stored entries
    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    /// The value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.entries
            .binary_search_by_key(&(row, col), |&(i, j, _)| (i, j))
            .map(|k| self.entries[k].2)
            .unwrap_or(0.)
    }

    /// Stored entries in row-major order
    pub fn entries(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.entries.iter().copied()
    }

    /// The transposed matrix
    pub fn transpose(&self) -> Matrix {
        Self::from_unsorted(
            self.cols,
            self.rows,
            self.entries.iter().map(|&(i, j, v)| (j, i, v)).collect(),
        )
    }
}
