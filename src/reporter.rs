//! Observability for estimator execution.
//!
//! This module provides the [`StepReporter`] trait. Reporters receive callbacks
//! at key points of every tick without the estimation code knowing anything
//! about presentation.
//!
//! # Zero-Cost Abstraction
//!
//! The default [`NoOpReporter`] compiles to zero overhead - all callback
//! methods are empty and will be optimized away by the compiler.
//!
//! # Use Cases
//!
//! - **Debugging**: Capture every FilterStep to diagnose divergence
//! - **Logging**: Emit structured events through the `log` facade
//! - **Reporting**: Render ticks as the PREDICT/UPDATE text blocks of [`TableFormatter`]
//!
//! # Example
//!
//! ```
//! use kinematic_kalman::{DebugReporter, ModelParameters, NoiseTuning, StateEstimator};
//! use nalgebra::{DMatrix, DVector};
//!
//! let model = ModelParameters::constant_acceleration_1d(0.5, &NoiseTuning::default()).unwrap();
//! let mut estimator = StateEstimator::new(DVector::zeros(2), DMatrix::identity(2, 2) * 4.0, model)
//!     .unwrap()
//!     .with_reporter(DebugReporter::new());
//!
//! let u = DVector::from_element(1, 0.8);
//! let z = DVector::from_element(1, 0.2);
//! estimator.step(&u, Some(&z)).unwrap();
//!
//! assert_eq!(estimator.reporter().steps().len(), 1);
//! ```

use std::fmt::Write as _;

use nalgebra::{DMatrix, DVector};

use crate::common::ground_truth::Trajectory;
use crate::estimator::{
    CorrectionOutcome, EstimateHistory, EstimatorError, EstimatorState, FilterStep, Innovation,
};

// ============================================================================
// StepReporter Trait
// ============================================================================

/// Observability trait for estimator ticks.
///
/// All methods have default empty implementations, so you only need
/// to override the events you care about.
///
/// Callbacks receive references. Clone inside the callback if the data has
/// to outlive it.
///
/// Events are emitted only once a tick has been committed, in the order
/// prediction, correction (or dropped correction), step complete. A tick that
/// fails (wrong input shape, covariance check) emits nothing.
pub trait StepReporter {
    /// Called after the prediction of a tick.
    fn on_prediction(&mut self, _timestep: usize, _predicted: &EstimatorState) {}

    /// Called after a measurement has been fused.
    fn on_correction(&mut self, _timestep: usize, _innovation: &Innovation, _posterior: &EstimatorState) {}

    /// Called when a measurement arrived but the correction had to be dropped.
    ///
    /// The tick still completes with the prediction as its posterior.
    fn on_correction_dropped(&mut self, _timestep: usize, _error: &EstimatorError) {}

    /// Called once the tick's final result has replaced the owned state.
    fn on_step_complete(&mut self, _step: &FilterStep) {}
}

// ============================================================================
// NoOpReporter
// ============================================================================

/// Zero-cost reporter that does nothing.
///
/// This is the default reporter used when no observability is needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpReporter;

impl NoOpReporter {
    /// Create a new no-op reporter.
    pub fn new() -> Self {
        Self
    }
}

impl StepReporter for NoOpReporter {}

// ============================================================================
// DebugReporter
// ============================================================================

/// Reporter that captures all events for debugging.
///
/// Stores clones of everything it receives. Long runs grow memory linearly
/// with the number of ticks.
#[derive(Debug, Clone, Default)]
pub struct DebugReporter {
    /// Captured predictions (timestep, prior)
    predictions: Vec<(usize, EstimatorState)>,

    /// Captured corrections (timestep, innovation)
    corrections: Vec<(usize, Innovation)>,

    /// Captured dropped corrections (timestep, reason)
    dropped: Vec<(usize, EstimatorError)>,

    /// Captured complete ticks
    steps: Vec<FilterStep>,
}

impl DebugReporter {
    /// Create a new debug reporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all captured events.
    pub fn clear(&mut self) {
        self.predictions.clear();
        self.corrections.clear();
        self.dropped.clear();
        self.steps.clear();
    }

    /// Get captured prediction events.
    pub fn prediction_events(&self) -> &[(usize, EstimatorState)] {
        &self.predictions
    }

    /// Get captured correction events.
    pub fn correction_events(&self) -> &[(usize, Innovation)] {
        &self.corrections
    }

    /// Get captured dropped-correction events.
    pub fn dropped_events(&self) -> &[(usize, EstimatorError)] {
        &self.dropped
    }

    /// Get captured complete ticks.
    pub fn steps(&self) -> &[FilterStep] {
        &self.steps
    }

    /// Total number of captured events across all types.
    pub fn total_events(&self) -> usize {
        self.predictions.len() + self.corrections.len() + self.dropped.len() + self.steps.len()
    }
}

impl StepReporter for DebugReporter {
    fn on_prediction(&mut self, timestep: usize, predicted: &EstimatorState) {
        self.predictions.push((timestep, predicted.clone()));
    }

    fn on_correction(&mut self, timestep: usize, innovation: &Innovation, _posterior: &EstimatorState) {
        self.corrections.push((timestep, innovation.clone()));
    }

    fn on_correction_dropped(&mut self, timestep: usize, error: &EstimatorError) {
        self.dropped.push((timestep, error.clone()));
    }

    fn on_step_complete(&mut self, step: &FilterStep) {
        self.steps.push(step.clone());
    }
}

// ============================================================================
// LoggingReporter
// ============================================================================

/// Reporter that emits events through the `log` crate.
///
/// # Log Levels
///
/// - `on_step_complete`: INFO
/// - `on_prediction`, `on_correction`: DEBUG (verbose only)
/// - `on_correction_dropped`: WARN
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingReporter {
    /// Whether to include prediction/correction details in log messages
    verbose: bool,
}

impl LoggingReporter {
    /// Create a new logging reporter.
    pub fn new() -> Self {
        Self { verbose: false }
    }

    /// Create a verbose logging reporter that includes per-phase details.
    pub fn verbose() -> Self {
        Self { verbose: true }
    }
}

impl StepReporter for LoggingReporter {
    fn on_prediction(&mut self, timestep: usize, predicted: &EstimatorState) {
        if self.verbose {
            log::debug!(
                "t={} predict: x={}, trace(P)={:.4}",
                timestep,
                format_vector(&predicted.mean),
                predicted.trace()
            );
        }
    }

    fn on_correction(&mut self, timestep: usize, innovation: &Innovation, posterior: &EstimatorState) {
        if self.verbose {
            log::debug!(
                "t={} update: y={}, K={}, trace(P)={:.4}",
                timestep,
                format_vector(&innovation.innovation),
                format_matrix_inline(&innovation.gain),
                posterior.trace()
            );
        }
    }

    fn on_correction_dropped(&mut self, timestep: usize, error: &EstimatorError) {
        log::warn!("t={} correction dropped, keeping prediction: {}", timestep, error);
    }

    fn on_step_complete(&mut self, step: &FilterStep) {
        log::info!(
            "Tick {} complete: x={}, trace(P)={:.4}, corrected={}",
            step.timestep,
            format_vector(&step.posterior.mean),
            step.posterior.trace(),
            step.was_corrected()
        );
    }
}

// ============================================================================
// CompositeReporter
// ============================================================================

/// Reporter that forwards events to two child reporters.
///
/// ```
/// use kinematic_kalman::{CompositeReporter, DebugReporter, LoggingReporter, StepReporter};
///
/// let mut composite = CompositeReporter::new(DebugReporter::new(), LoggingReporter::new());
/// let dropped = kinematic_kalman::EstimatorError::SingularInnovationCovariance {
///     determinant: 0.0,
///     condition_number: f64::INFINITY,
/// };
/// composite.on_correction_dropped(3, &dropped);
///
/// assert_eq!(composite.first().dropped_events().len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct CompositeReporter<A: StepReporter, B: StepReporter> {
    first: A,
    second: B,
}

impl<A: StepReporter, B: StepReporter> CompositeReporter<A, B> {
    /// Create a new composite reporter.
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }

    /// Get a reference to the first reporter.
    pub fn first(&self) -> &A {
        &self.first
    }

    /// Get a mutable reference to the first reporter.
    pub fn first_mut(&mut self) -> &mut A {
        &mut self.first
    }

    /// Get a reference to the second reporter.
    pub fn second(&self) -> &B {
        &self.second
    }

    /// Get a mutable reference to the second reporter.
    pub fn second_mut(&mut self) -> &mut B {
        &mut self.second
    }

    /// Consume and return both reporters.
    pub fn into_parts(self) -> (A, B) {
        (self.first, self.second)
    }
}

impl<A: StepReporter, B: StepReporter> StepReporter for CompositeReporter<A, B> {
    fn on_prediction(&mut self, timestep: usize, predicted: &EstimatorState) {
        self.first.on_prediction(timestep, predicted);
        self.second.on_prediction(timestep, predicted);
    }

    fn on_correction(&mut self, timestep: usize, innovation: &Innovation, posterior: &EstimatorState) {
        self.first.on_correction(timestep, innovation, posterior);
        self.second.on_correction(timestep, innovation, posterior);
    }

    fn on_correction_dropped(&mut self, timestep: usize, error: &EstimatorError) {
        self.first.on_correction_dropped(timestep, error);
        self.second.on_correction_dropped(timestep, error);
    }

    fn on_step_complete(&mut self, step: &FilterStep) {
        self.first.on_step_complete(step);
        self.second.on_step_complete(step);
    }
}

// ============================================================================
// TableFormatter
// ============================================================================

/// Renders FilterStep records as text.
///
/// Formatting only; printing is left to the caller.
#[derive(Debug, Clone, Copy)]
pub struct TableFormatter {
    /// Time step used to turn tick indices into seconds
    pub dt: f64,
    /// Decimal places for scalar values
    pub precision: usize,
}

impl TableFormatter {
    /// Create a formatter for ticks `dt` seconds apart
    pub fn new(dt: f64) -> Self {
        Self { dt, precision: 3 }
    }

    /// Set decimal places
    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    /// PREDICT and UPDATE blocks for one tick
    pub fn format_step(&self, step: &FilterStep) -> String {
        let t = step.timestep as f64 * self.dt;
        let mut out = String::new();

        let _ = writeln!(out, "Time {:4.2}s - PREDICT", t);
        let _ = writeln!(out, "  Control input = {}", self.vector(&step.control));
        let _ = writeln!(out, "  Predicted state = {}", self.vector(&step.predicted.mean));
        let _ = writeln!(out, "  Predicted uncertainty P =");
        out.push_str(&self.matrix(&step.predicted.covariance));
        out.push('\n');

        match &step.correction {
            CorrectionOutcome::Applied(innovation) => {
                let _ = writeln!(out, "Time {:4.2}s - UPDATE", t);
                if let Some(z) = &step.measurement {
                    let _ = writeln!(out, "  Measurement = {}", self.vector(z));
                }
                let _ = writeln!(out, "  Innovation (z - Hx_pred) = {}", self.vector(&innovation.innovation));
                let _ = writeln!(out, "  Gain K = {}", self.values(innovation.gain.iter()));
                let _ = writeln!(out, "  Updated state = {}", self.vector(&step.posterior.mean));
                let _ = writeln!(out, "  Updated uncertainty P =");
                out.push_str(&self.matrix(&step.posterior.covariance));
            }
            CorrectionOutcome::NoMeasurement => {
                let _ = writeln!(out, "Time {:4.2}s - NO MEASUREMENT (prediction kept)", t);
            }
            CorrectionOutcome::Dropped(error) => {
                let _ = writeln!(out, "Time {:4.2}s - UPDATE DROPPED: {}", t, error);
            }
        }
        let _ = writeln!(out, "{}", "-".repeat(60));
        out
    }

    /// Final truth-vs-estimate table for a position/velocity run
    ///
    /// Rows are paired by index; extra rows on either side are ignored.
    pub fn format_comparison(&self, truth: &Trajectory, history: &EstimateHistory) -> String {
        let p = self.precision;
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:>6} | {:>8} {:>9} | {:>8} {:>8}",
            "time", "true_pos", "est_pos", "true_vel", "est_vel"
        );
        let _ = writeln!(out, "{}", "-".repeat(55));
        for (k, step) in history.iter().enumerate().take(truth.len()) {
            let mean = &step.posterior.mean;
            let est_vel = if mean.len() > 1 { mean[1] } else { f64::NAN };
            let _ = writeln!(
                out,
                "{:6.2} | {:8.p$} {:9.p$} | {:8.p$} {:8.p$}",
                truth.time[k],
                truth.position[k],
                mean[0],
                truth.velocity[k],
                est_vel,
                p = p
            );
        }
        out
    }

    fn vector(&self, v: &DVector<f64>) -> String {
        self.values(v.iter())
    }

    fn values<'a>(&self, values: impl Iterator<Item = &'a f64>) -> String {
        let parts: Vec<String> = values.map(|x| format!("{:.*}", self.precision, x)).collect();
        format!("({})", parts.join(", "))
    }

    fn matrix(&self, m: &DMatrix<f64>) -> String {
        let mut out = String::new();
        for row in m.row_iter() {
            let parts: Vec<String> = row
                .iter()
                .map(|x| format!("{:>10.*}", self.precision, x))
                .collect();
            let _ = writeln!(out, "    [{}]", parts.join(" "));
        }
        out
    }
}

fn format_vector(v: &DVector<f64>) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{:.4}", x)).collect();
    format!("[{}]", parts.join(", "))
}

fn format_matrix_inline(m: &DMatrix<f64>) -> String {
    let rows: Vec<String> = m
        .row_iter()
        .map(|r| {
            let parts: Vec<String> = r.iter().map(|x| format!("{:.4}", x)).collect();
            format!("[{}]", parts.join(", "))
        })
        .collect();
    format!("[{}]", rows.join(", "))
}

// ============================================================================
// Tests
// ============================================================================
