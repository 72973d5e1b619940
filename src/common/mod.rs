//! Common utilities shared by the estimator and its collaborators.
//!
//! Linear algebra helpers the Predictor and Corrector build on, and the
//! synthetic truth/sensor generators used by the demo, tests and benches.

pub mod ground_truth;
pub mod linalg;
