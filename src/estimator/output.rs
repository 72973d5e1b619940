//! Output types handed to observers after every tick.
//!
//! - [`Innovation`] - What the corrector saw and how much it trusted it
//! - [`CorrectionOutcome`] - Whether the tick's measurement was fused
//! - [`FilterStep`] - Complete record of one tick
//! - [`EstimateHistory`] - All records of a run, in tick order

use nalgebra::{DMatrix, DVector};

use super::errors::EstimatorError;
use super::types::EstimatorState;
use crate::common::linalg::inverse_quadratic_form;

/// Innovation, innovation covariance and gain of one measurement update
#[derive(Debug, Clone, PartialEq)]
pub struct Innovation {
    /// y = z − H·x_pred (m)
    pub innovation: DVector<f64>,
    /// S = H·P_pred·Hᵀ + R (m×m)
    pub innovation_covariance: DMatrix<f64>,
    /// K = P_pred·Hᵀ·S⁻¹ (n×m)
    pub gain: DMatrix<f64>,
}

impl Innovation {
    /// Create a new innovation record
    pub fn new(innovation: DVector<f64>, innovation_covariance: DMatrix<f64>, gain: DMatrix<f64>) -> Self {
        Self {
            innovation,
            innovation_covariance,
            gain,
        }
    }

    /// Normalized innovation squared, yᵀ·S⁻¹·y
    ///
    /// For a consistent filter this is χ²-distributed with m degrees of freedom.
    pub fn normalized_squared(&self) -> Option<f64> {
        inverse_quadratic_form(&self.innovation, &self.innovation_covariance)
    }
}

/// What happened to the measurement on a tick
#[derive(Debug, Clone, PartialEq)]
pub enum CorrectionOutcome {
    /// Measurement fused into the prediction
    Applied(Innovation),
    /// No measurement arrived; posterior is the prediction
    NoMeasurement,
    /// Measurement could not be fused; posterior is the prediction
    Dropped(EstimatorError),
}

/// Complete record of one tick.
///
/// Produced fresh by every `step` call and owned by the caller. The estimator
/// keeps no reference to it.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterStep {
    /// Tick index (0-based)
    pub timestep: usize,
    /// Control input applied in prediction
    pub control: DVector<f64>,
    /// Measurement offered to the corrector, if any
    pub measurement: Option<DVector<f64>>,
    /// Prior for this tick
    pub predicted: EstimatorState,
    /// Correction result
    pub correction: CorrectionOutcome,
    /// Final belief for this tick
    pub posterior: EstimatorState,
}

impl FilterStep {
    /// Whether a measurement was fused on this tick
    #[inline]
    pub fn was_corrected(&self) -> bool {
        matches!(self.correction, CorrectionOutcome::Applied(_))
    }

    /// Whether a measurement arrived but had to be dropped
    #[inline]
    pub fn was_dropped(&self) -> bool {
        matches!(self.correction, CorrectionOutcome::Dropped(_))
    }

    fn applied(&self) -> Option<&Innovation> {
        match &self.correction {
            CorrectionOutcome::Applied(innovation) => Some(innovation),
            _ => None,
        }
    }

    /// Innovation y, if a measurement was fused
    pub fn innovation(&self) -> Option<&DVector<f64>> {
        self.applied().map(|i| &i.innovation)
    }

    /// Innovation covariance S, if a measurement was fused
    pub fn innovation_covariance(&self) -> Option<&DMatrix<f64>> {
        self.applied().map(|i| &i.innovation_covariance)
    }

    /// Gain K, if a measurement was fused
    pub fn gain(&self) -> Option<&DMatrix<f64>> {
        self.applied().map(|i| &i.gain)
    }

    /// yᵀ·S⁻¹·y, if a measurement was fused
    pub fn normalized_innovation_squared(&self) -> Option<f64> {
        self.applied().and_then(Innovation::normalized_squared)
    }
}

/// Ordered FilterStep records of a whole run
#[derive(Debug, Clone, Default)]
pub struct EstimateHistory {
    steps: Vec<FilterStep>,
}

impl EstimateHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Append a record
    pub fn push(&mut self, step: FilterStep) {
        self.steps.push(step);
    }

    /// Number of recorded ticks
    #[inline]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// All records in tick order
    pub fn steps(&self) -> &[FilterStep] {
        &self.steps
    }

    /// Iterate over records
    pub fn iter(&self) -> std::slice::Iter<'_, FilterStep> {
        self.steps.iter()
    }

    /// Posterior mean of every tick
    pub fn posterior_means(&self) -> Vec<DVector<f64>> {
        self.steps.iter().map(|s| s.posterior.mean.clone()).collect()
    }

    /// trace(P) of every posterior
    pub fn posterior_traces(&self) -> Vec<f64> {
        self.steps.iter().map(|s| s.posterior.trace()).collect()
    }

    /// Number of ticks whose measurement had to be dropped
    pub fn dropped_corrections(&self) -> usize {
        self.steps.iter().filter(|s| s.was_dropped()).count()
    }

    /// Last posterior, if any tick ran
    pub fn last_posterior(&self) -> Option<&EstimatorState> {
        self.steps.last().map(|s| &s.posterior)
    }

    /// Consume into the underlying records
    pub fn into_steps(self) -> Vec<FilterStep> {
        self.steps
    }
}

impl IntoIterator for EstimateHistory {
    type Item = FilterStep;
    type IntoIter = std::vec::IntoIter<FilterStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.into_iter()
    }
}

impl<'a> IntoIterator for &'a EstimateHistory {
    type Item = &'a FilterStep;
    type IntoIter = std::slice::Iter<'a, FilterStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}
