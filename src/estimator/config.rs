//! Configuration types for the estimator
//!
//! [`ModelParameters`] describes the linear system and is validated once at
//! construction. [`EstimatorConfig`] carries the numeric knobs that decide when
//! a covariance counts as broken and how the posterior covariance is formed.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::errors::EstimatorError;
use super::types::validate_covariance;
use crate::common::linalg::row_major;

/// Noise tuning constants for the kinematic model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseTuning {
    /// Standard deviation of unmodelled acceleration (m/s²)
    pub accel_process_noise: f64,
    /// Standard deviation of the position sensor (m)
    pub measurement_noise_std: f64,
}

impl NoiseTuning {
    /// Create a new noise tuning
    pub fn new(accel_process_noise: f64, measurement_noise_std: f64) -> Self {
        Self {
            accel_process_noise,
            measurement_noise_std,
        }
    }

    fn validate(&self) -> Result<(), EstimatorError> {
        for (name, value) in [
            ("accel_process_noise", self.accel_process_noise),
            ("measurement_noise_std", self.measurement_noise_std),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(EstimatorError::configuration(format!(
                    "{} must be finite and non-negative, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

impl Default for NoiseTuning {
    fn default() -> Self {
        Self::new(0.2, 1.5)
    }
}

/// Tolerances used by invariant checks and the innovation inversion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericTolerances {
    /// Relative tolerance on |M[i,j] - M[j,i]|
    pub symmetry: f64,
    /// Relative tolerance on negative eigenvalues
    pub psd: f64,
    /// `det(S) / ∏ S[i,i]` at or below this is treated as singular
    ///
    /// The ratio is 1 for a diagonal S and falls towards 0 as S loses rank,
    /// whatever the units of the measurement.
    pub singular_determinant: f64,
    /// cond(S) above this is treated as singular
    pub max_condition_number: f64,
}

impl NumericTolerances {
    /// Reject tolerances that would disable or invert the checks
    pub fn validate(&self) -> Result<(), EstimatorError> {
        let checks = [
            ("symmetry", self.symmetry),
            ("psd", self.psd),
            ("singular_determinant", self.singular_determinant),
        ];
        for (name, value) in checks {
            if !value.is_finite() || value < 0.0 {
                return Err(EstimatorError::configuration(format!(
                    "{} tolerance must be finite and non-negative, got {}",
                    name, value
                )));
            }
        }
        if self.max_condition_number.is_nan() || self.max_condition_number < 1.0 {
            return Err(EstimatorError::configuration(format!(
                "max_condition_number must be at least 1, got {}",
                self.max_condition_number
            )));
        }
        Ok(())
    }
}

impl Default for NumericTolerances {
    fn default() -> Self {
        Self {
            symmetry: 1e-9,
            psd: 1e-9,
            singular_determinant: 1e-12,
            max_condition_number: 1e12,
        }
    }
}

/// How the corrector forms the posterior covariance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CovarianceUpdateForm {
    /// `(I - K·H)·P_pred`
    #[default]
    Standard,
    /// `(I - K·H)·P_pred·(I - K·H)ᵀ + K·R·Kᵀ`
    Joseph,
}

/// Estimator behaviour that is not part of the linear model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Numeric tolerances
    pub tolerances: NumericTolerances,
    /// Posterior covariance form
    pub update_form: CovarianceUpdateForm,
    /// Check symmetry and PSD of every predicted and posterior covariance
    #[serde(default = "default_true")]
    pub validate_every_tick: bool,
}

fn default_true() -> bool {
    true
}

impl EstimatorConfig {
    /// Default configuration with per-tick validation enabled
    pub fn new() -> Self {
        Self {
            tolerances: NumericTolerances::default(),
            update_form: CovarianceUpdateForm::default(),
            validate_every_tick: true,
        }
    }

    /// Replace the numeric tolerances
    pub fn with_tolerances(mut self, tolerances: NumericTolerances) -> Self {
        self.tolerances = tolerances;
        self
    }

    /// Choose the posterior covariance form
    pub fn with_update_form(mut self, form: CovarianceUpdateForm) -> Self {
        self.update_form = form;
        self
    }

    /// Enable or disable per-tick invariant validation
    pub fn with_invariant_validation(mut self, enabled: bool) -> Self {
        self.validate_every_tick = enabled;
        self
    }

    /// Parse from JSON
    pub fn from_json(json: &str) -> Result<Self, EstimatorError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| EstimatorError::configuration(format!("invalid config JSON: {}", e)))?;
        config.tolerances.validate()?;
        Ok(config)
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable description of the linear system
///
/// - `F` (n×n) transition matrix
/// - `B` (n×p) control-input matrix
/// - `H` (m×n) measurement matrix
/// - `Q` (n×n) process-noise covariance, symmetric PSD
/// - `R` (m×m) measurement-noise covariance, symmetric PSD
///
/// Shapes are checked against each other once, in the constructor. Nothing
/// downstream has to re-check them.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelParameters {
    transition: DMatrix<f64>,
    control: DMatrix<f64>,
    observation: DMatrix<f64>,
    process_noise: DMatrix<f64>,
    measurement_noise: DMatrix<f64>,
    time_step: Option<f64>,
    tuning: Option<NoiseTuning>,
}

impl ModelParameters {
    /// Build a model from explicit matrices using default tolerances
    pub fn new(
        transition: DMatrix<f64>,
        control: DMatrix<f64>,
        observation: DMatrix<f64>,
        process_noise: DMatrix<f64>,
        measurement_noise: DMatrix<f64>,
    ) -> Result<Self, EstimatorError> {
        Self::with_tolerances(
            transition,
            control,
            observation,
            process_noise,
            measurement_noise,
            &NumericTolerances::default(),
        )
    }

    /// Build a model from explicit matrices
    ///
    /// # Errors
    /// - `DimensionMismatch` if the shapes are inconsistent
    /// - `AsymmetricCovariance` / `NonPositiveSemiDefinite` for a bad Q or R
    /// - `Configuration` for non-finite entries
    pub fn with_tolerances(
        transition: DMatrix<f64>,
        control: DMatrix<f64>,
        observation: DMatrix<f64>,
        process_noise: DMatrix<f64>,
        measurement_noise: DMatrix<f64>,
        tolerances: &NumericTolerances,
    ) -> Result<Self, EstimatorError> {
        let n = transition.nrows();
        if n == 0 {
            return Err(EstimatorError::configuration("state dimension must be at least 1"));
        }
        if transition.ncols() != n {
            return Err(EstimatorError::dimension(n, transition.ncols(), "transition matrix columns"));
        }
        if control.nrows() != n {
            return Err(EstimatorError::dimension(n, control.nrows(), "control matrix rows"));
        }
        if observation.ncols() != n {
            return Err(EstimatorError::dimension(n, observation.ncols(), "measurement matrix columns"));
        }
        let m = observation.nrows();
        if m == 0 {
            return Err(EstimatorError::configuration("measurement dimension must be at least 1"));
        }

        for (name, matrix) in [
            ("transition matrix", &transition),
            ("control matrix", &control),
            ("measurement matrix", &observation),
            ("process noise", &process_noise),
            ("measurement noise", &measurement_noise),
        ] {
            if matrix.iter().any(|v| !v.is_finite()) {
                return Err(EstimatorError::configuration(format!("{} has non-finite entries", name)));
            }
        }

        validate_covariance(&process_noise, n, tolerances, "process noise")?;
        validate_covariance(&measurement_noise, m, tolerances, "measurement noise")?;

        Ok(Self {
            transition,
            control,
            observation,
            process_noise,
            measurement_noise,
            time_step: None,
            tuning: None,
        })
    }

    /// Position/velocity model driven by a measured acceleration
    ///
    /// State `[position, velocity]`, control `[acceleration]`, measurement
    /// `[position]`:
    /// - `F = [[1, dt], [0, 1]]`
    /// - `B = [dt²/2, dt]ᵀ`
    /// - `H = [1, 0]`
    /// - `Q = σa² · [[dt⁴/4, dt³/2], [dt³/2, dt²]]`
    /// - `R = [σz²]`
    pub fn constant_acceleration_1d(dt: f64, tuning: &NoiseTuning) -> Result<Self, EstimatorError> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(EstimatorError::configuration(format!(
                "time step must be finite and positive, got {}",
                dt
            )));
        }
        tuning.validate()?;

        let dt2 = dt * dt;
        let dt3 = dt2 * dt;
        let dt4 = dt3 * dt;

        #[rustfmt::skip]
        let f = DMatrix::from_row_slice(2, 2, &[
            1.0, dt,    // p' = p + dt*v
            0.0, 1.0,   // v' = v
        ]);

        let b = DMatrix::from_column_slice(2, 1, &[0.5 * dt2, dt]);

        let h = DMatrix::from_row_slice(1, 2, &[1.0, 0.0]);

        let qa = tuning.accel_process_noise * tuning.accel_process_noise;
        #[rustfmt::skip]
        let q = DMatrix::from_row_slice(2, 2, &[
            0.25 * dt4 * qa, 0.5 * dt3 * qa,
            0.5 * dt3 * qa,  dt2 * qa,
        ]);

        let r = DMatrix::from_element(
            1,
            1,
            tuning.measurement_noise_std * tuning.measurement_noise_std,
        );

        let mut model = Self::new(f, b, h, q, r)?;
        model.time_step = Some(dt);
        model.tuning = Some(*tuning);
        Ok(model)
    }

    /// Recompute a kinematic model for a different time step.
    ///
    /// Only available for models built by [`Self::constant_acceleration_1d`].
    pub fn with_time_step(&self, dt: f64) -> Result<Self, EstimatorError> {
        match &self.tuning {
            Some(tuning) => Self::constant_acceleration_1d(dt, tuning),
            None => Err(EstimatorError::configuration(
                "time step can only be changed on a model derived from noise tuning",
            )),
        }
    }

    /// State dimension (n)
    #[inline]
    pub fn x_dim(&self) -> usize {
        self.transition.nrows()
    }

    /// Control dimension (p)
    #[inline]
    pub fn u_dim(&self) -> usize {
        self.control.ncols()
    }

    /// Measurement dimension (m)
    #[inline]
    pub fn z_dim(&self) -> usize {
        self.observation.nrows()
    }

    /// Transition matrix F
    pub fn transition(&self) -> &DMatrix<f64> {
        &self.transition
    }

    /// Control-input matrix B
    pub fn control(&self) -> &DMatrix<f64> {
        &self.control
    }

    /// Measurement matrix H
    pub fn observation(&self) -> &DMatrix<f64> {
        &self.observation
    }

    /// Process-noise covariance Q
    pub fn process_noise(&self) -> &DMatrix<f64> {
        &self.process_noise
    }

    /// Measurement-noise covariance R
    pub fn measurement_noise(&self) -> &DMatrix<f64> {
        &self.measurement_noise
    }

    /// Time step, if the model was derived from one
    pub fn time_step(&self) -> Option<f64> {
        self.time_step
    }

    /// Noise tuning, if the model was derived from one
    pub fn tuning(&self) -> Option<&NoiseTuning> {
        self.tuning.as_ref()
    }

    /// Whether another model can stand in for this one (same n, p, m)
    pub fn same_shape(&self, other: &ModelParameters) -> bool {
        self.x_dim() == other.x_dim() && self.u_dim() == other.u_dim() && self.z_dim() == other.z_dim()
    }

    /// Check a control vector against p
    pub fn check_control(&self, u: &DVector<f64>) -> Result<(), EstimatorError> {
        if u.len() != self.u_dim() {
            return Err(EstimatorError::dimension(self.u_dim(), u.len(), "control input length"));
        }
        Ok(())
    }

    /// Check a measurement vector against m
    pub fn check_measurement(&self, z: &DVector<f64>) -> Result<(), EstimatorError> {
        if z.len() != self.z_dim() {
            return Err(EstimatorError::dimension(self.z_dim(), z.len(), "measurement length"));
        }
        Ok(())
    }
}

/// Snapshot of the model for debugging and comparison.
#[derive(Debug, Clone, Serialize)]
pub struct ModelSnapshot {
    /// State dimension
    pub x_dim: usize,
    /// Control dimension
    pub u_dim: usize,
    /// Measurement dimension
    pub z_dim: usize,
    /// Time step, if derived from one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_step: Option<f64>,
    /// Noise tuning, if derived from one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tuning: Option<NoiseTuning>,
    /// Transition matrix F (flattened row-major)
    pub transition: Vec<f64>,
    /// Control matrix B (flattened row-major)
    pub control: Vec<f64>,
    /// Measurement matrix H (flattened row-major)
    pub observation: Vec<f64>,
    /// Process noise Q (flattened row-major)
    pub process_noise: Vec<f64>,
    /// Measurement noise R (flattened row-major)
    pub measurement_noise: Vec<f64>,
}

impl From<&ModelParameters> for ModelSnapshot {
    fn from(m: &ModelParameters) -> Self {
        Self {
            x_dim: m.x_dim(),
            u_dim: m.u_dim(),
            z_dim: m.z_dim(),
            time_step: m.time_step,
            tuning: m.tuning,
            transition: row_major(&m.transition),
            control: row_major(&m.control),
            observation: row_major(&m.observation),
            process_noise: row_major(&m.process_noise),
            measurement_noise: row_major(&m.measurement_noise),
        }
    }
}

impl ModelSnapshot {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Serialize to pretty-printed JSON string.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}
