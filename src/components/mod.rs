//! Core algorithmic components
//!
//! The two halves of a tick, as pure functions over an [`EstimatorState`]
//! and a [`ModelParameters`]:
//!
//! - [`prediction`] - Motion model plus control input (Predictor)
//! - [`update`] - Measurement fusion (Corrector)
//!
//! [`EstimatorState`]: crate::estimator::EstimatorState
//! [`ModelParameters`]: crate::estimator::ModelParameters

pub mod prediction;
pub mod update;

pub use prediction::predict;
pub use update::{invert_innovation_covariance, update, Correction};
