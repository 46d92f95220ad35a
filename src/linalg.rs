//! Small dense linear algebra helpers
//!
//! Determinant by cofactor (Laplace) expansion and inverse by the adjugate.
//! Both cost O(d!) and are meant for the low-dimensional covariance matrices
//! used by the Gaussian densities.

use crate::error::{HmmError, Result};
use ndarray::{Array1, Array2};

fn check_square(m: &Array2<f64>) -> Result<usize> {
    let (rows, cols) = m.dim();
    if rows == 0 || rows != cols {
        return Err(HmmError::invalid(format!(
            "expected a non-empty square matrix, got {}x{}",
            rows, cols
        )));
    }
    Ok(rows)
}

/// Determinant of a square matrix
pub fn determinant(m: &Array2<f64>) -> Result<f64> {
    check_square(m)?;
    Ok(laplace(m))
}

fn laplace(m: &Array2<f64>) -> f64 {
    match m.nrows() {
        1 => m[[0, 0]],
        2 => m[[0, 0]] * m[[1, 1]] - m[[1, 0]] * m[[0, 1]],
        n => {
            let mut det = 0.0;
            for col in 0..n {
                if m[[0, col]] == 0.0 {
                    continue;
                }
                let term = m[[0, col]] * laplace(&minor(m, 0, col));
                if col % 2 == 0 {
                    det += term;
                } else {
                    det -= term;
                }
            }
            det
        }
    }
}

/// Matrix with `row` and `col` removed
///
/// # Panics
/// Panics if the matrix is smaller than 2x2 or the indices are out of range.
pub fn minor(m: &Array2<f64>, row: usize, col: usize) -> Array2<f64> {
    let (rows, cols) = m.dim();
    assert!(row < rows && col < cols, "minor index out of range");
    Array2::from_shape_fn((rows - 1, cols - 1), |(i, j)| {
        let src_i = if i >= row { i + 1 } else { i };
        let src_j = if j >= col { j + 1 } else { j };
        m[[src_i, src_j]]
    })
}

/// Matrix of signed cofactors `(-1)^(i+j) * det(minor(i, j))`
pub fn cofactor_matrix(m: &Array2<f64>) -> Result<Array2<f64>> {
    let n = check_square(m)?;
    if n == 1 {
        return Ok(Array2::ones((1, 1)));
    }
    Ok(Array2::from_shape_fn((n, n), |(i, j)| {
        let sign = if (i + j) % 2 == 0 { 1.0 } else { -1.0 };
        sign * laplace(&minor(m, i, j))
    }))
}

/// Inverse via the adjugate: transpose of the cofactor matrix divided by the determinant
pub fn inverse(m: &Array2<f64>) -> Result<Array2<f64>> {
    let det = determinant(m)?;
    if det == 0.0 || !det.is_finite() {
        return Err(HmmError::SingularMatrix);
    }
    let cofactors = cofactor_matrix(m)?;
    Ok(transpose(&cofactors) / det)
}

/// Owned transpose
pub fn transpose(m: &Array2<f64>) -> Array2<f64> {
    m.t().to_owned()
}

/// Dot product of two equal-length vectors
pub fn inner_product(a: &Array1<f64>, b: &Array1<f64>) -> Result<f64> {
    if a.len() != b.len() {
        return Err(HmmError::invalid(format!(
            "inner product of vectors with lengths {} and {}",
            a.len(),
            b.len()
        )));
    }
    Ok(a.iter().zip(b.iter()).map(|(x, y)| x * y).sum())
}

/// Squared Mahalanobis distance `(x - mean)' * covariance^-1 * (x - mean)`
///
/// A non-invertible covariance is reported as `SingularCovariance`.
pub fn mahalanobis_distance(
    x: &Array1<f64>,
    mean: &Array1<f64>,
    covariance: &Array2<f64>,
) -> Result<f64> {
    let d = check_square(covariance)?;
    if x.len() != d || mean.len() != d {
        return Err(HmmError::invalid(format!(
            "dimension mismatch: x has {}, mean has {}, covariance is {}x{}",
            x.len(),
            mean.len(),
            d,
            d
        )));
    }

    let inverse_covariance = match inverse(covariance) {
        Ok(inv) => inv,
        Err(HmmError::SingularMatrix) => {
            return Err(HmmError::SingularCovariance {
                determinant: laplace(covariance),
            })
        }
        Err(e) => return Err(e),
    };

    let diff = x - mean;
    let weighted: Array1<f64> = inverse_covariance
        .rows()
        .into_iter()
        .map(|row| inner_product(&row.to_owned(), &diff))
        .collect::<Result<_>>()?;

    inner_product(&weighted, &diff)
}
