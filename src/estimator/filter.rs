//! The state estimator: one predict/correct recursion per tick.
//!
//! ```text
//! Idle → Predicting → (Correcting | SkippingCorrection) → Idle
//! ```
//!
//! Every tick predicts. A tick corrects iff it carries a measurement. A
//! singular innovation covariance drops that tick's correction and the
//! prediction stands. Any other error aborts the tick before the owned
//! state is touched.

use nalgebra::{DMatrix, DVector};

use super::config::{EstimatorConfig, ModelParameters};
use super::errors::EstimatorError;
use super::output::{CorrectionOutcome, EstimateHistory, FilterStep};
use super::types::{EstimatorState, Tick};
use crate::components::{predict, update};
use crate::reporter::{NoOpReporter, StepReporter};

/// Linear Kalman filter over a fixed [`ModelParameters`]
///
/// Owns the current (x, P) exclusively. Callers only ever see clones inside
/// the [`FilterStep`] records returned by [`StateEstimator::step`].
#[derive(Debug, Clone)]
pub struct StateEstimator<R: StepReporter = NoOpReporter> {
    model: ModelParameters,
    config: EstimatorConfig,
    state: EstimatorState,
    timestep: usize,
    dropped_corrections: usize,
    reporter: R,
}

impl StateEstimator<NoOpReporter> {
    /// Create an estimator with the default configuration
    ///
    /// # Errors
    /// `DimensionMismatch` if `x0`/`P0` do not match the model,
    /// `NonPositiveSemiDefinite` / `AsymmetricCovariance` for a bad `P0`.
    pub fn new(
        x0: DVector<f64>,
        p0: DMatrix<f64>,
        model: ModelParameters,
    ) -> Result<Self, EstimatorError> {
        Self::with_config(x0, p0, model, EstimatorConfig::default())
    }

    /// Create an estimator with an explicit configuration
    pub fn with_config(
        x0: DVector<f64>,
        p0: DMatrix<f64>,
        model: ModelParameters,
        config: EstimatorConfig,
    ) -> Result<Self, EstimatorError> {
        config.tolerances.validate()?;
        if x0.len() != model.x_dim() {
            return Err(EstimatorError::dimension(model.x_dim(), x0.len(), "initial state length"));
        }
        let state = EstimatorState::new(x0, p0, &config.tolerances)?;

        log::debug!(
            "StateEstimator created: n={}, p={}, m={}, trace(P0)={:.4}, update_form={:?}",
            model.x_dim(),
            model.u_dim(),
            model.z_dim(),
            state.trace(),
            config.update_form
        );

        Ok(Self {
            model,
            config,
            state,
            timestep: 0,
            dropped_corrections: 0,
            reporter: NoOpReporter,
        })
    }
}

impl<R: StepReporter> StateEstimator<R> {
    /// Replace the reporter, keeping state and model
    pub fn with_reporter<R2: StepReporter>(self, reporter: R2) -> StateEstimator<R2> {
        StateEstimator {
            model: self.model,
            config: self.config,
            state: self.state,
            timestep: self.timestep,
            dropped_corrections: self.dropped_corrections,
            reporter,
        }
    }

    /// Process one tick with the configured model
    ///
    /// # Errors
    /// `DimensionMismatch` for a wrong-sized `control` or `measurement`, and
    /// invariant violations when `validate_every_tick` is set. In both cases
    /// the owned state is unchanged. A singular innovation covariance is not
    /// an error here: it shows up as [`CorrectionOutcome::Dropped`].
    pub fn step(
        &mut self,
        control: &DVector<f64>,
        measurement: Option<&DVector<f64>>,
    ) -> Result<FilterStep, EstimatorError> {
        self.step_inner(control, measurement, None)
    }

    /// Process one [`Tick`]
    pub fn step_tick(&mut self, tick: &Tick) -> Result<FilterStep, EstimatorError> {
        self.step(&tick.control, tick.measurement.as_ref())
    }

    /// Process one tick with a substitute model of the same shape
    ///
    /// Used when the time step varies per tick; see
    /// [`ModelParameters::with_time_step`].
    pub fn step_with_model(
        &mut self,
        control: &DVector<f64>,
        measurement: Option<&DVector<f64>>,
        model: &ModelParameters,
    ) -> Result<FilterStep, EstimatorError> {
        if !self.model.same_shape(model) {
            return Err(EstimatorError::dimension(
                self.model.x_dim(),
                model.x_dim(),
                "substitute model state dimension",
            ));
        }
        self.step_inner(control, measurement, Some(model))
    }

    fn step_inner(
        &mut self,
        control: &DVector<f64>,
        measurement: Option<&DVector<f64>>,
        substitute: Option<&ModelParameters>,
    ) -> Result<FilterStep, EstimatorError> {
        let model = substitute.unwrap_or(&self.model);

        // Shape errors must surface before anything is committed
        model.check_control(control)?;
        if let Some(z) = measurement {
            model.check_measurement(z)?;
        }

        let timestep = self.timestep;
        let tolerances = self.config.tolerances;

        let predicted = predict(&self.state, control, model)?;
        if self.config.validate_every_tick {
            predicted.validate(&tolerances, "predicted covariance")?;
        }

        let (correction, posterior) = match measurement {
            None => (CorrectionOutcome::NoMeasurement, predicted.clone()),
            Some(z) => match update(&predicted, z, model, self.config.update_form, &tolerances) {
                Ok(result) => {
                    if self.config.validate_every_tick {
                        result.posterior.validate(&tolerances, "posterior covariance")?;
                    }
                    (CorrectionOutcome::Applied(result.innovation), result.posterior)
                }
                Err(e) if e.is_recoverable() => {
                    log::warn!("Tick {}: dropping correction, keeping prediction: {}", timestep, e);
                    (CorrectionOutcome::Dropped(e), predicted.clone())
                }
                Err(e) => return Err(e),
            },
        };

        log::trace!(
            "Tick {}: trace(P_pred)={:.6}, trace(P)={:.6}",
            timestep,
            predicted.trace(),
            posterior.trace()
        );

        if matches!(correction, CorrectionOutcome::Dropped(_)) {
            self.dropped_corrections += 1;
        }
        self.state = posterior.clone();
        self.timestep += 1;

        let step = FilterStep {
            timestep,
            control: control.clone(),
            measurement: measurement.cloned(),
            predicted,
            correction,
            posterior,
        };

        // Reporters only hear about committed ticks
        self.reporter.on_prediction(timestep, &step.predicted);
        match &step.correction {
            CorrectionOutcome::Applied(innovation) => {
                self.reporter.on_correction(timestep, innovation, &step.posterior)
            }
            CorrectionOutcome::Dropped(e) => self.reporter.on_correction_dropped(timestep, e),
            CorrectionOutcome::NoMeasurement => {}
        }
        self.reporter.on_step_complete(&step);
        Ok(step)
    }

    /// Current belief
    pub fn state(&self) -> &EstimatorState {
        &self.state
    }

    /// The linear model
    pub fn model(&self) -> &ModelParameters {
        &self.model
    }

    /// Estimator configuration
    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Number of completed ticks
    pub fn timestep(&self) -> usize {
        self.timestep
    }

    /// Number of ticks whose correction was dropped
    pub fn dropped_corrections(&self) -> usize {
        self.dropped_corrections
    }

    /// Attached reporter
    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    /// Attached reporter (mutable)
    pub fn reporter_mut(&mut self) -> &mut R {
        &mut self.reporter
    }

    /// Get state dimension
    pub fn x_dim(&self) -> usize {
        self.model.x_dim()
    }

    /// Get measurement dimension
    pub fn z_dim(&self) -> usize {
        self.model.z_dim()
    }
}

/// Run an estimator over a whole tick stream
///
/// Stops at the first non-recoverable error.
pub fn run_estimator<'a, R, I>(
    estimator: &mut StateEstimator<R>,
    ticks: I,
) -> Result<EstimateHistory, EstimatorError>
where
    R: StepReporter,
    I: IntoIterator<Item = &'a Tick>,
{
    let mut history = EstimateHistory::new();
    for tick in ticks {
        history.push(estimator.step_tick(tick)?);
    }
    Ok(history)
}

/// Run independent estimators, each over its own stream
///
/// Estimators share nothing, so with the `rayon` feature they run in
/// parallel. Results come back in input order either way.
#[cfg(feature = "rayon")]
pub fn run_parallel<R>(
    jobs: Vec<(StateEstimator<R>, Vec<Tick>)>,
) -> Vec<Result<(StateEstimator<R>, EstimateHistory), EstimatorError>>
where
    R: StepReporter + Send,
{
    use rayon::prelude::*;

    jobs.into_par_iter()
        .map(|(mut estimator, ticks)| {
            let history = run_estimator(&mut estimator, &ticks)?;
            Ok((estimator, history))
        })
        .collect()
}

/// Run independent estimators, each over its own stream
///
/// Estimators share nothing, so with the `rayon` feature they run in
/// parallel. Results come back in input order either way.
#[cfg(not(feature = "rayon"))]
pub fn run_parallel<R>(
    jobs: Vec<(StateEstimator<R>, Vec<Tick>)>,
) -> Vec<Result<(StateEstimator<R>, EstimateHistory), EstimatorError>>
where
    R: StepReporter + Send,
{
    jobs.into_iter()
        .map(|(mut estimator, ticks)| {
            let history = run_estimator(&mut estimator, &ticks)?;
            Ok((estimator, history))
        })
        .collect()
}
