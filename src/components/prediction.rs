//! Prediction step (time update)
//!
//! Projects the current belief one time step forward through the motion model,
//! folding in the known control input.

use nalgebra::DVector;

use crate::common::linalg::symmetrize;
use crate::estimator::{EstimatorError, EstimatorState, ModelParameters};

/// Predict a state forward one time step
///
/// Implements the linear time update:
/// - `x' = F × x + B × u`
/// - `P' = F × P × Fᵀ + Q`, then averaged with its transpose
///
/// Pure: the input state is left untouched.
///
/// # Errors
/// `DimensionMismatch` if `state` or `control` do not match the model's n and p.
pub fn predict(
    state: &EstimatorState,
    control: &DVector<f64>,
    model: &ModelParameters,
) -> Result<EstimatorState, EstimatorError> {
    let n = model.x_dim();
    if state.mean.len() != n {
        return Err(EstimatorError::dimension(n, state.mean.len(), "state length"));
    }
    if state.covariance.nrows() != n || state.covariance.ncols() != n {
        return Err(EstimatorError::dimension(n, state.covariance.nrows(), "covariance dimension"));
    }
    model.check_control(control)?;

    let f = model.transition();

    // Mean prediction: x' = F × x + B × u
    let mean = f * &state.mean + model.control() * control;

    // Covariance prediction: P' = F × P × Fᵀ + Q
    let covariance = f * &state.covariance * f.transpose() + model.process_noise();

    Ok(EstimatorState::from_parts(mean, symmetrize(&covariance)))
}
