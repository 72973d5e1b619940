//! Measurement update (correction)
//!
//! Fuses a measurement into the predicted belief. The gain weighs the
//! prediction against the sensor: it grows when the prediction is uncertain
//! relative to the sensor and shrinks when the sensor is the noisier of the two.
//!
//! Incorporating a measurement can only shrink total uncertainty:
//! `trace(P) ≤ trace(P_pred)` for any symmetric PSD `R`.

use nalgebra::{DMatrix, DVector};

use crate::common::linalg::{condition_number, invert_spd, normalized_determinant, symmetrize};
use crate::estimator::{
    CovarianceUpdateForm, EstimatorError, EstimatorState, Innovation, ModelParameters,
    NumericTolerances,
};

/// Result of a successful measurement update
#[derive(Debug, Clone)]
pub struct Correction {
    /// Updated (posterior) state
    pub posterior: EstimatorState,
    /// Innovation, its covariance and the gain that produced `posterior`
    pub innovation: Innovation,
}

/// Compute `S⁻¹`, refusing matrices that are singular or badly conditioned
///
/// Both tests are scale-free, so an S with tiny (or huge) entries is judged
/// by its shape alone.
///
/// # Errors
/// `SingularInnovationCovariance` if `det(S) / ∏ S[i,i] ≤ singular_determinant`
/// (which includes any non-positive variance on the diagonal),
/// `cond(S) > max_condition_number`, or the inversion itself fails.
pub fn invert_innovation_covariance(
    s: &DMatrix<f64>,
    tolerances: &NumericTolerances,
) -> Result<DMatrix<f64>, EstimatorError> {
    let determinant = s.determinant();
    let condition = condition_number(s);
    let singular = || EstimatorError::SingularInnovationCovariance {
        determinant,
        condition_number: condition,
    };

    if !determinant.is_finite()
        || normalized_determinant(s) <= tolerances.singular_determinant
        || condition > tolerances.max_condition_number
    {
        return Err(singular());
    }

    invert_spd(s).ok_or_else(singular)
}

/// Kalman measurement update
///
/// - `y = z − H × x_pred`
/// - `S = H × P_pred × Hᵀ + R`
/// - `K = P_pred × Hᵀ × S⁻¹`
/// - `x = x_pred + K × y`
/// - `P = (I − K × H) × P_pred` (or the Joseph form), then symmetrized
///
/// # Errors
/// - `DimensionMismatch` if `z` or `predicted` do not match the model
/// - `SingularInnovationCovariance` if `S` cannot be inverted
pub fn update(
    predicted: &EstimatorState,
    measurement: &DVector<f64>,
    model: &ModelParameters,
    form: CovarianceUpdateForm,
    tolerances: &NumericTolerances,
) -> Result<Correction, EstimatorError> {
    let n = model.x_dim();
    if predicted.mean.len() != n {
        return Err(EstimatorError::dimension(n, predicted.mean.len(), "predicted state length"));
    }
    model.check_measurement(measurement)?;

    let h = model.observation();
    let r = model.measurement_noise();
    let p_pred = &predicted.covariance;

    // Innovation
    let innovation = measurement - h * &predicted.mean;

    // Innovation covariance
    let s = symmetrize(&(h * p_pred * h.transpose() + r));
    let s_inv = invert_innovation_covariance(&s, tolerances)?;

    // Kalman gain
    let gain = p_pred * h.transpose() * s_inv;

    // Updated state
    let mean = &predicted.mean + &gain * &innovation;

    // Updated covariance
    let i_minus_kh = DMatrix::identity(n, n) - &gain * h;
    let covariance = match form {
        CovarianceUpdateForm::Standard => &i_minus_kh * p_pred,
        CovarianceUpdateForm::Joseph => {
            &i_minus_kh * p_pred * i_minus_kh.transpose() + &gain * r * gain.transpose()
        }
    };

    Ok(Correction {
        posterior: EstimatorState::from_parts(mean, symmetrize(&covariance)),
        innovation: Innovation::new(innovation, s, gain),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::NoiseTuning;

    fn predicted_state() -> EstimatorState {
        EstimatorState::from_parts(
            DVector::from_vec(vec![0.5, 1.0]),
            DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 1.0]),
        )
    }

    fn model_with_r(r: f64) -> ModelParameters {
        ModelParameters::new(
            DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 0.0, 1.0]),
            DMatrix::from_column_slice(2, 1, &[0.5, 1.0]),
            DMatrix::from_row_slice(1, 2, &[1.0, 0.0]),
            DMatrix::zeros(2, 2),
            DMatrix::from_element(1, 1, r),
        )
        .unwrap()
    }

    #[test]
    fn test_update_reference_values() {
        let result = update(
            &predicted_state(),
            &DVector::from_element(1, 0.6),
            &model_with_r(1.0),
            CovarianceUpdateForm::Standard,
            &NumericTolerances::default(),
        )
        .unwrap();

        assert!((result.innovation.innovation[0] - 0.1).abs() < 1e-12);
        assert!((result.innovation.innovation_covariance[(0, 0)] - 3.0).abs() < 1e-12);
        assert!((result.innovation.gain[(0, 0)] - 2.0 / 3.0).abs() < 1e-12);
        assert!((result.innovation.gain[(1, 0)] - 1.0 / 3.0).abs() < 1e-12);
        assert!((result.posterior.mean[0] - (0.5 + 0.2 / 3.0)).abs() < 1e-12);
        assert!((result.posterior.mean[1] - (1.0 + 0.1 / 3.0)).abs() < 1e-12);

        let expected = DMatrix::from_row_slice(2, 2, &[2.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0, 2.0 / 3.0]);
        assert!((&result.posterior.covariance - expected).amax() < 1e-12);
    }

    #[test]
    fn test_joseph_matches_standard_for_optimal_gain() {
        let z = DVector::from_element(1, 0.6);
        let tol = NumericTolerances::default();
        let model = model_with_r(1.0);
        let standard = update(&predicted_state(), &z, &model, CovarianceUpdateForm::Standard, &tol).unwrap();
        let joseph = update(&predicted_state(), &z, &model, CovarianceUpdateForm::Joseph, &tol).unwrap();
        assert!((&standard.posterior.covariance - &joseph.posterior.covariance).amax() < 1e-12);
        assert!((&standard.posterior.mean - &joseph.posterior.mean).amax() < 1e-12);
    }

    #[test]
    fn test_update_never_increases_trace() {
        let z = DVector::from_element(1, 4.0);
        for r in [0.0, 1e-6, 0.1, 1.0, 10.0, 1e6] {
            let result = update(
                &predicted_state(),
                &z,
                &model_with_r(r),
                CovarianceUpdateForm::Standard,
                &NumericTolerances::default(),
            )
            .unwrap();
            assert!(result.posterior.trace() <= predicted_state().trace() + 1e-12, "r = {}", r);
        }
    }

    #[test]
    fn test_large_noise_ignores_measurement() {
        let result = update(
            &predicted_state(),
            &DVector::from_element(1, 100.0),
            &model_with_r(1e12),
            CovarianceUpdateForm::Standard,
            &NumericTolerances::default(),
        )
        .unwrap();
        assert!(result.innovation.gain.amax() < 1e-11);
        assert!((result.posterior.mean[0] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_zero_noise_matches_measurement() {
        let result = update(
            &predicted_state(),
            &DVector::from_element(1, 7.25),
            &model_with_r(0.0),
            CovarianceUpdateForm::Standard,
            &NumericTolerances::default(),
        )
        .unwrap();
        assert!((result.posterior.mean[0] - 7.25).abs() < 1e-12);
        assert!(result.posterior.covariance[(0, 0)].abs() < 1e-12);
    }

    #[test]
    fn test_singular_innovation_covariance() {
        // Zero predicted uncertainty plus zero sensor noise gives S = 0
        let predicted = EstimatorState::from_parts(DVector::zeros(2), DMatrix::zeros(2, 2));
        let err = update(
            &predicted,
            &DVector::from_element(1, 1.0),
            &model_with_r(0.0),
            CovarianceUpdateForm::Standard,
            &NumericTolerances::default(),
        )
        .unwrap_err();
        assert!(matches!(err, EstimatorError::SingularInnovationCovariance { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_ill_conditioned_innovation_covariance() {
        let s = DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, 1e-3]));
        let strict = NumericTolerances {
            max_condition_number: 100.0,
            ..NumericTolerances::default()
        };
        assert!(invert_innovation_covariance(&s, &strict).is_err());
        assert!(invert_innovation_covariance(&s, &NumericTolerances::default()).is_ok());
    }

    #[test]
    fn test_small_innovation_covariance_is_not_singular() {
        let tol = NumericTolerances::default();
        for scale in [1e-7, 1.0, 1e6] {
            let s = DMatrix::<f64>::identity(2, 2) * (2.0 * scale);
            let inv = invert_innovation_covariance(&s, &tol).unwrap();
            assert!((inv[(0, 0)] * 2.0 * scale - 1.0).abs() < 1e-12, "scale = {}", scale);
        }

        // Negative or zero variances are singular whatever the scale
        let negative = DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, -1e-17]));
        assert!(invert_innovation_covariance(&negative, &tol).is_err());
        let rank_one = DMatrix::from_row_slice(2, 2, &[1e-8, 1e-8, 1e-8, 1e-8]);
        assert!(invert_innovation_covariance(&rank_one, &tol).is_err());
    }

    #[test]
    fn test_update_with_small_scale_noise() {
        // F = H = I, R = P_pred = 1e-7·I gives S = 2e-7·I and K = I/2
        let model = ModelParameters::new(
            DMatrix::identity(2, 2),
            DMatrix::zeros(2, 1),
            DMatrix::identity(2, 2),
            DMatrix::zeros(2, 2),
            DMatrix::identity(2, 2) * 1e-7,
        )
        .unwrap();
        let predicted = EstimatorState::from_parts(DVector::zeros(2), DMatrix::identity(2, 2) * 1e-7);
        let result = update(
            &predicted,
            &DVector::from_vec(vec![2e-4, -4e-4]),
            &model,
            CovarianceUpdateForm::Standard,
            &NumericTolerances::default(),
        )
        .unwrap();

        assert!((&result.innovation.gain - DMatrix::identity(2, 2) * 0.5).amax() < 1e-12);
        assert!((result.posterior.mean[0] - 1e-4).abs() < 1e-15);
        assert!((result.posterior.mean[1] + 2e-4).abs() < 1e-15);
        assert!((&result.posterior.covariance - DMatrix::identity(2, 2) * 5e-8).amax() < 1e-20);
    }

    #[test]
    fn test_update_rejects_wrong_measurement_length() {
        let model = ModelParameters::constant_acceleration_1d(1.0, &NoiseTuning::default()).unwrap();
        let err = update(
            &predicted_state(),
            &DVector::from_vec(vec![1.0, 2.0]),
            &model,
            CovarianceUpdateForm::Standard,
            &NumericTolerances::default(),
        )
        .unwrap_err();
        assert!(matches!(err, EstimatorError::DimensionMismatch { expected: 1, actual: 2, .. }));
    }
}
