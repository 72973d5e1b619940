//! Linear algebra utilities
//!
//! Small matrix helpers the predictor and corrector are built on. Everything
//! works on runtime-sized `nalgebra` types; shapes are validated by the
//! callers before any of these are reached.

use nalgebra::{DMatrix, DVector};

/// Make matrix symmetric
///
/// Averages a matrix with its transpose. Applied to every covariance the
/// estimator produces so floating-point asymmetry cannot accumulate.
pub fn symmetrize(matrix: &DMatrix<f64>) -> DMatrix<f64> {
    0.5 * (matrix + matrix.transpose())
}

/// Largest absolute difference between `matrix[(i, j)]` and `matrix[(j, i)]`
///
/// Returns `f64::INFINITY` for non-square input.
pub fn max_asymmetry(matrix: &DMatrix<f64>) -> f64 {
    if !matrix.is_square() {
        return f64::INFINITY;
    }
    (matrix - matrix.transpose()).amax()
}

/// Check symmetry within an absolute tolerance scaled by the matrix magnitude
pub fn is_symmetric(matrix: &DMatrix<f64>, tolerance: f64) -> bool {
    max_asymmetry(matrix) <= tolerance * matrix.amax().max(1.0)
}

/// Smallest eigenvalue of the symmetric part of `matrix`
///
/// Uses the symmetric eigensolver, so only the lower triangle matters after
/// symmetrization. Returns `f64::NAN` for an empty or non-finite matrix.
pub fn min_eigenvalue(matrix: &DMatrix<f64>) -> f64 {
    if matrix.is_empty() || matrix.iter().any(|v| !v.is_finite()) {
        return f64::NAN;
    }
    symmetrize(matrix)
        .symmetric_eigenvalues()
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min)
}

/// Check if matrix is positive semi-definite
///
/// Eigenvalues down to `-tolerance * max(1, |λ|max)` are accepted to absorb
/// rounding in matrices that are singular by construction (e.g. Q = 0).
pub fn is_positive_semi_definite(matrix: &DMatrix<f64>, tolerance: f64) -> bool {
    if !matrix.is_square() {
        return false;
    }
    if matrix.is_empty() {
        return true;
    }
    if !is_symmetric(matrix, tolerance) {
        return false;
    }
    let eigenvalues = symmetrize(matrix).symmetric_eigenvalues();
    if eigenvalues.iter().any(|v| !v.is_finite()) {
        return false;
    }
    let scale = eigenvalues.amax().max(1.0);
    eigenvalues.min() >= -tolerance * scale
}

/// 2-norm condition number (ratio of extreme singular values)
///
/// Returns `f64::INFINITY` when the smallest singular value is zero.
pub fn condition_number(matrix: &DMatrix<f64>) -> f64 {
    if matrix.is_empty() {
        return f64::INFINITY;
    }
    let singular_values = matrix.clone().svd(false, false).singular_values;
    let max = singular_values.max();
    let min = singular_values.min();
    if min <= 0.0 || !min.is_finite() {
        f64::INFINITY
    } else {
        max / min
    }
}

/// Determinant of the matrix rescaled to a unit diagonal
///
/// `det(D^-1/2 · M · D^-1/2)` with `D = diag(M)`, i.e. `det(M) / ∏ M[i,i]`
/// without forming either product. Independent of the units of each row, and
/// within `[0, 1]` for a symmetric PSD matrix. Returns 0 if any diagonal entry
/// is not strictly positive.
pub fn normalized_determinant(matrix: &DMatrix<f64>) -> f64 {
    let diagonal = matrix.diagonal();
    if diagonal.iter().any(|d| !d.is_finite() || *d <= 0.0) {
        return 0.0;
    }
    let inv_sqrt = diagonal.map(|d| 1.0 / d.sqrt());
    let scaled = DMatrix::from_fn(matrix.nrows(), matrix.ncols(), |i, j| {
        matrix[(i, j)] * inv_sqrt[i] * inv_sqrt[j]
    });
    scaled.determinant()
}

/// Invert a symmetric positive-definite matrix
///
/// Cholesky first, plain LU inverse as fallback for matrices that are
/// invertible but lost definiteness to rounding. `None` if neither works.
pub fn invert_spd(matrix: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let finite = |m: &DMatrix<f64>| m.iter().all(|v| v.is_finite());
    matrix
        .clone()
        .cholesky()
        .map(|chol| symmetrize(&chol.inverse()))
        .filter(finite)
        .or_else(|| matrix.clone().try_inverse().filter(finite))
}

/// Quadratic form `vᵀ · M⁻¹ · v`
///
/// Used for the normalized innovation squared. `None` if `M` is singular.
pub fn inverse_quadratic_form(v: &DVector<f64>, m: &DMatrix<f64>) -> Option<f64> {
    invert_spd(m)
        .map(|inv| v.dot(&(inv * v)))
        .filter(|q| q.is_finite())
}

/// Flatten a matrix in row-major order
pub fn row_major(matrix: &DMatrix<f64>) -> Vec<f64> {
    matrix.transpose().iter().copied().collect()
}
