//! Estimator state and input types
//!
//! [`EstimatorState`] is the (mean, covariance) belief the estimator owns
//! between ticks. [`Tick`] is one entry of the input stream.

use nalgebra::{DMatrix, DVector};

use super::config::NumericTolerances;
use super::errors::EstimatorError;
use crate::common::linalg::{
    is_positive_semi_definite, is_symmetric, max_asymmetry, min_eigenvalue,
};

/// Check that `matrix` is an `dim×dim` symmetric PSD covariance
///
/// # Errors
/// - `DimensionMismatch` if the shape is wrong
/// - `AsymmetricCovariance` if asymmetric beyond `tolerances.symmetry`
/// - `NonPositiveSemiDefinite` if an eigenvalue is negative beyond `tolerances.psd`
pub fn validate_covariance(
    matrix: &DMatrix<f64>,
    dim: usize,
    tolerances: &NumericTolerances,
    context: &str,
) -> Result<(), EstimatorError> {
    if matrix.nrows() != dim {
        return Err(EstimatorError::dimension(dim, matrix.nrows(), format!("{} rows", context)));
    }
    if matrix.ncols() != dim {
        return Err(EstimatorError::dimension(dim, matrix.ncols(), format!("{} columns", context)));
    }
    if !is_symmetric(matrix, tolerances.symmetry) {
        return Err(EstimatorError::AsymmetricCovariance {
            context: context.to_string(),
            max_asymmetry: max_asymmetry(matrix),
        });
    }
    if !is_positive_semi_definite(matrix, tolerances.psd) {
        return Err(EstimatorError::NonPositiveSemiDefinite {
            context: context.to_string(),
            min_eigenvalue: min_eigenvalue(matrix),
        });
    }
    Ok(())
}

/// Current belief: state vector and its covariance
#[derive(Debug, Clone, PartialEq)]
pub struct EstimatorState {
    /// State vector x (n)
    pub mean: DVector<f64>,
    /// Covariance P (n×n), symmetric PSD
    pub covariance: DMatrix<f64>,
}

impl EstimatorState {
    /// Create a validated state
    ///
    /// # Errors
    /// `DimensionMismatch`, `AsymmetricCovariance` or `NonPositiveSemiDefinite`
    /// if `covariance` is not a symmetric PSD matrix matching `mean`.
    pub fn new(
        mean: DVector<f64>,
        covariance: DMatrix<f64>,
        tolerances: &NumericTolerances,
    ) -> Result<Self, EstimatorError> {
        if mean.iter().any(|v| !v.is_finite()) {
            return Err(EstimatorError::configuration("initial state has non-finite entries"));
        }
        validate_covariance(&covariance, mean.len(), tolerances, "initial covariance")?;
        Ok(Self { mean, covariance })
    }

    /// Build without validation. Used for intermediate results.
    pub(crate) fn from_parts(mean: DVector<f64>, covariance: DMatrix<f64>) -> Self {
        Self { mean, covariance }
    }

    /// State estimate x
    #[inline]
    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    /// Covariance P
    #[inline]
    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }

    /// Get state dimension
    #[inline]
    pub fn x_dim(&self) -> usize {
        self.mean.len()
    }

    /// Total uncertainty, trace(P)
    #[inline]
    pub fn trace(&self) -> f64 {
        self.covariance.trace()
    }

    /// Standard deviation of each state component, sqrt(diag(P))
    pub fn std_devs(&self) -> DVector<f64> {
        self.covariance.diagonal().map(|v| v.max(0.0).sqrt())
    }

    /// Re-check the covariance invariant
    pub fn validate(&self, tolerances: &NumericTolerances, context: &str) -> Result<(), EstimatorError> {
        if self.mean.iter().any(|v| !v.is_finite()) {
            return Err(EstimatorError::configuration(format!("{} mean has non-finite entries", context)));
        }
        validate_covariance(&self.covariance, self.x_dim(), tolerances, context)
    }
}

/// One input tick: control plus an optional co-timed measurement
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    /// Control input u (p)
    pub control: DVector<f64>,
    /// Measurement z (m), absent when the sensor produced nothing
    pub measurement: Option<DVector<f64>>,
}

impl Tick {
    /// Create a new tick
    pub fn new(control: DVector<f64>, measurement: Option<DVector<f64>>) -> Self {
        Self { control, measurement }
    }

    /// Scalar control with a scalar measurement
    pub fn scalar(control: f64, measurement: Option<f64>) -> Self {
        Self {
            control: DVector::from_element(1, control),
            measurement: measurement.map(|z| DVector::from_element(1, z)),
        }
    }
}
