use crate::error::Result;
use crate::matrix::Matrix;

/// Per-slice setpoint vectors in Amps; one row per slice, one column per
/// input channel (3 gradient columns followed by the shim coils).
#[derive(Debug, Clone, PartialEq)]
pub struct ShimTable {
    values: Matrix,
}

impl ShimTable {
    pub fn new(values: Matrix) -> Self {
        Self { values }
    }

    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        Ok(Self::new(Matrix::from_rows(rows)?))
    }

    /// Number of slices.
    #[inline]
    pub fn slices(&self) -> usize {
        self.values.rows()
    }

    /// Total input channels per slice.
    #[inline]
    pub fn width(&self) -> usize {
        self.values.cols()
    }

    #[inline]
    pub fn setpoint(&self, slice: usize) -> &[f32] {
        self.values.row(slice)
    }

    pub fn is_empty(&self) -> bool {
        self.slices() == 0 || self.width() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_shape() {
        let t = ShimTable::from_rows(&[vec![0.0; 19], vec![1.0; 19]]).unwrap();
        assert_eq!(t.slices(), 2);
        assert_eq!(t.width(), 19);
        assert_eq!(t.setpoint(1)[18], 1.0);
        assert!(!t.is_empty());
    }

    #[test]
    fn zero_slices_is_empty() {
        assert!(ShimTable::new(Matrix::zeros(0, 19)).is_empty());
        assert!(ShimTable::new(Matrix::zeros(4, 0)).is_empty());
    }
}
