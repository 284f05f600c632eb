//! Flat, shape-checked containers for setpoint tables and filter taps.

use crate::error::{BuildError, Result};

/// Row-major 2-D array of `f32`.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Wrap row-major `data`; its length must be `rows * cols`.
    pub fn from_flat(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        if rows.checked_mul(cols) != Some(data.len()) {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "matrix data does not match its shape",
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Build from nested rows; all rows must have the same length.
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != cols) {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "matrix rows differ in length",
            )));
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data: rows.concat(),
        })
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn row(&self, r: usize) -> &[f32] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    #[inline]
    pub fn row_mut(&mut self, r: usize) -> &mut [f32] {
        &mut self.data[r * self.cols..(r + 1) * self.cols]
    }

    pub fn get(&self, r: usize, c: usize) -> Option<f32> {
        (r < self.rows && c < self.cols).then(|| self.data[r * self.cols + c])
    }

    pub fn fill(&mut self, v: f32) {
        self.data.fill(v);
    }
}

/// Row-major 3-D array of `f32` indexed `[i][j][k]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Cube {
    dims: [usize; 3],
    data: Vec<f32>,
}

impl Cube {
    pub fn zeros(d0: usize, d1: usize, d2: usize) -> Self {
        Self {
            dims: [d0, d1, d2],
            data: vec![0.0; d0 * d1 * d2],
        }
    }

    pub fn from_flat(dims: [usize; 3], data: Vec<f32>) -> Result<Self> {
        let len = dims[0]
            .checked_mul(dims[1])
            .and_then(|n| n.checked_mul(dims[2]));
        if len != Some(data.len()) {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "cube data does not match its shape",
            )));
        }
        Ok(Self { dims, data })
    }

    #[inline]
    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// The innermost run `[i][j][..]`.
    #[inline]
    pub fn lane(&self, i: usize, j: usize) -> &[f32] {
        let start = (i * self.dims[1] + j) * self.dims[2];
        &self.data[start..start + self.dims[2]]
    }

    #[inline]
    pub fn lane_mut(&mut self, i: usize, j: usize) -> &mut [f32] {
        let start = (i * self.dims[1] + j) * self.dims[2];
        &mut self.data[start..start + self.dims[2]]
    }

    pub fn get(&self, i: usize, j: usize, k: usize) -> Option<f32> {
        let [d0, d1, d2] = self.dims;
        (i < d0 && j < d1 && k < d2).then(|| self.data[(i * d1 + j) * d2 + k])
    }

    pub fn fill(&mut self, v: f32) {
        self.data.fill(v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_flat_checks_shape() {
        assert!(Matrix::from_flat(2, 3, vec![0.0; 6]).is_ok());
        assert!(Matrix::from_flat(2, 3, vec![0.0; 5]).is_err());
        assert!(Cube::from_flat([2, 2, 2], vec![0.0; 7]).is_err());
    }

    #[test]
    fn ragged_rows_rejected() {
        let err = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(err.downcast_ref::<BuildError>().is_some());
    }

    #[test]
    fn rows_and_lanes_index_row_major() {
        let m = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(m.row(1), &[3.0, 4.0]);
        assert_eq!(m.get(0, 1), Some(2.0));
        assert_eq!(m.get(2, 0), None);

        let c = Cube::from_flat([2, 2, 2], (0..8).map(|v| v as f32).collect()).unwrap();
        assert_eq!(c.lane(1, 0), &[4.0, 5.0]);
        assert_eq!(c.get(0, 1, 1), Some(3.0));
    }

    #[test]
    fn zero_row_matrix_is_empty() {
        let m = Matrix::zeros(0, 19);
        assert!(m.is_empty());
        assert_eq!(m.cols(), 19);
    }
}
