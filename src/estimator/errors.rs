//! Error types for the estimator and its components
//!
//! Shape and definiteness problems are configuration faults and abort setup.
//! A singular innovation covariance is the one condition expected under normal
//! operation, and the estimator recovers from it by keeping the prediction.

use std::fmt;

/// Errors that can occur while building or stepping the estimator
#[derive(Debug, Clone, PartialEq)]
pub enum EstimatorError {
    /// Dimension mismatch between expected and actual
    DimensionMismatch {
        /// What was expected
        expected: usize,
        /// What was received
        actual: usize,
        /// Context (e.g., "control input length", "transition matrix columns")
        context: String,
    },

    /// A covariance has a negative eigenvalue beyond tolerance
    NonPositiveSemiDefinite {
        /// Which matrix failed
        context: String,
        /// Smallest eigenvalue found
        min_eigenvalue: f64,
    },

    /// A covariance is not symmetric within tolerance
    AsymmetricCovariance {
        /// Which matrix failed
        context: String,
        /// Largest |M[i,j] - M[j,i]|
        max_asymmetry: f64,
    },

    /// Innovation covariance S cannot be inverted for this tick
    SingularInnovationCovariance {
        /// det(S)
        determinant: f64,
        /// Ratio of largest to smallest singular value of S
        condition_number: f64,
    },

    /// Configuration error
    Configuration {
        /// Description of the configuration issue
        description: String,
    },
}

impl EstimatorError {
    /// Shorthand for a [`EstimatorError::DimensionMismatch`]
    pub fn dimension(expected: usize, actual: usize, context: impl Into<String>) -> Self {
        EstimatorError::DimensionMismatch {
            expected,
            actual,
            context: context.into(),
        }
    }

    /// Shorthand for a [`EstimatorError::Configuration`]
    pub fn configuration(description: impl Into<String>) -> Self {
        EstimatorError::Configuration {
            description: description.into(),
        }
    }

    /// Whether a tick can complete despite this error.
    ///
    /// Only a singular innovation covariance qualifies: the correction is
    /// dropped and the prediction stands for that tick.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EstimatorError::SingularInnovationCovariance { .. })
    }
}

impl fmt::Display for EstimatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EstimatorError::DimensionMismatch {
                expected,
                actual,
                context,
            } => {
                write!(
                    f,
                    "Dimension mismatch for {}: expected {}, got {}",
                    context, expected, actual
                )
            }
            EstimatorError::NonPositiveSemiDefinite {
                context,
                min_eigenvalue,
            } => {
                write!(
                    f,
                    "{} is not positive semi-definite (min eigenvalue {:.3e})",
                    context, min_eigenvalue
                )
            }
            EstimatorError::AsymmetricCovariance {
                context,
                max_asymmetry,
            } => {
                write!(
                    f,
                    "{} is not symmetric (max asymmetry {:.3e})",
                    context, max_asymmetry
                )
            }
            EstimatorError::SingularInnovationCovariance {
                determinant,
                condition_number,
            } => {
                write!(
                    f,
                    "Innovation covariance is singular (det {:.3e}, condition number {:.3e})",
                    determinant, condition_number
                )
            }
            EstimatorError::Configuration { description } => {
                write!(f, "Configuration error: {}", description)
            }
        }
    }
}

impl std::error::Error for EstimatorError {}
