/*!
# Kinematic Kalman - Linear state estimation for 1D motion

Discrete-time Kalman filter that fuses a noisy acceleration control input
with a noisy position fix into a running estimate of `[position, velocity]`
and its covariance.

## Features

- Predict/correct recursion with explicit symmetrization of every covariance
- Symmetry and PSD checks on the prior, the model noise and (optionally) every tick
- Singular innovation covariance drops the tick's correction instead of failing
- Standard or Joseph-form covariance update
- Observer hooks ([`StepReporter`]) and a text table formatter
- Synthetic truth and sensor generation for demos and tests

## Modules

- [`estimator`] - The estimator, its model, state, output records and errors
- [`components`] - Predictor and Corrector as pure functions
- [`reporter`] - Observability hooks and formatting
- [`common`] - Linear algebra helpers, ground truth generation

## Example

```rust
use kinematic_kalman::{ModelParameters, NoiseTuning, StateEstimator};
use nalgebra::{DMatrix, DVector};

// dt = 1, no process noise, unit sensor variance
let model = ModelParameters::new(
    DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 0.0, 1.0]),
    DMatrix::from_column_slice(2, 1, &[0.5, 1.0]),
    DMatrix::from_row_slice(1, 2, &[1.0, 0.0]),
    DMatrix::zeros(2, 2),
    DMatrix::from_element(1, 1, 1.0),
)
.unwrap();

let mut estimator = StateEstimator::new(DVector::zeros(2), DMatrix::identity(2, 2), model).unwrap();

// Accelerate at 1 m/s², sensor reads 0.6 m
let step = estimator
    .step(&DVector::from_element(1, 1.0), Some(&DVector::from_element(1, 0.6)))
    .unwrap();

assert!((step.posterior.mean[0] - 0.567).abs() < 1e-3);
assert!((step.posterior.mean[1] - 1.033).abs() < 1e-3);

// A tuned constant-acceleration model for a 0.5 s time step
let tuned = ModelParameters::constant_acceleration_1d(0.5, &NoiseTuning::default()).unwrap();
assert_eq!(tuned.x_dim(), 2);
```
*/

// ============================================================================
// Core modules
// ============================================================================

/// The estimator, its model, state, outputs and errors
pub mod estimator;

/// Predictor and Corrector
pub mod components;

/// Observability hooks for estimator ticks
pub mod reporter;

/// Low-level utilities (linear algebra, ground truth)
pub mod common;

// ============================================================================
// Re-exports for convenience
// ============================================================================

// Core types
pub use estimator::{
    CorrectionOutcome, CovarianceUpdateForm, EstimateHistory, EstimatorConfig, EstimatorState,
    FilterStep, Innovation, ModelParameters, ModelSnapshot, NoiseTuning, NumericTolerances, Tick,
};

// Errors
pub use estimator::EstimatorError;

// Estimator
pub use estimator::{run_estimator, run_parallel, StateEstimator};

// Components
pub use components::{predict, update, Correction};

// Reporters
pub use reporter::{
    CompositeReporter, DebugReporter, LoggingReporter, NoOpReporter, StepReporter, TableFormatter,
};

// Collaborators
pub use common::ground_truth::{
    generate_scenario, simulate_truth, synthesize_ticks, AccelerationPhase, Scenario,
    ScenarioConfig, SensorNoiseConfig, Trajectory, TrajectoryConfig,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
