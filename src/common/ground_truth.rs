//! Ground truth and measurement generation
//!
//! Simulates a 1D piecewise-constant-acceleration motion and the noisy
//! accelerometer / position-fix readings an estimator would receive.

use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::estimator::{EstimatorError, Tick};

/// Constant acceleration applied while `t < until`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccelerationPhase {
    /// Phase ends at this time (exclusive), seconds
    pub until: f64,
    /// Acceleration during the phase, m/s²
    pub acceleration: f64,
}

/// Shape of the simulated motion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryConfig {
    /// Simulation length, seconds (inclusive end)
    pub total_time: f64,
    /// Sample spacing, seconds
    pub dt: f64,
    /// Acceleration schedule, ordered by `until`
    pub phases: Vec<AccelerationPhase>,
    /// Acceleration once every phase has ended
    pub final_acceleration: f64,
}

impl Default for TrajectoryConfig {
    /// Speed up, coast, then brake over 8 seconds
    fn default() -> Self {
        Self {
            total_time: 8.0,
            dt: 0.5,
            phases: vec![
                AccelerationPhase {
                    until: 3.0,
                    acceleration: 0.8,
                },
                AccelerationPhase {
                    until: 5.0,
                    acceleration: 0.0,
                },
            ],
            final_acceleration: -0.6,
        }
    }
}

impl TrajectoryConfig {
    /// Acceleration in effect at time `t`
    pub fn acceleration_at(&self, t: f64) -> f64 {
        self.phases
            .iter()
            .find(|phase| t < phase.until)
            .map_or(self.final_acceleration, |phase| phase.acceleration)
    }

    /// Number of samples, `0, dt, ..., total_time`
    pub fn num_samples(&self) -> usize {
        ((self.total_time + 1e-9) / self.dt).floor() as usize + 1
    }

    fn validate(&self) -> Result<(), EstimatorError> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(EstimatorError::configuration(format!(
                "trajectory dt must be finite and positive, got {}",
                self.dt
            )));
        }
        if !self.total_time.is_finite() || self.total_time < 0.0 {
            return Err(EstimatorError::configuration(format!(
                "total_time must be finite and non-negative, got {}",
                self.total_time
            )));
        }
        Ok(())
    }
}

/// Ground truth trajectory, one entry per sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    /// Sample times
    pub time: Vec<f64>,
    /// True position
    pub position: Vec<f64>,
    /// True velocity
    pub velocity: Vec<f64>,
    /// True acceleration applied to reach the sample (0 at the first sample)
    pub acceleration: Vec<f64>,
}

impl Trajectory {
    /// Number of samples
    #[inline]
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// Check if empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// True `[position, velocity]` at sample `k`
    pub fn state(&self, k: usize) -> DVector<f64> {
        DVector::from_vec(vec![self.position[k], self.velocity[k]])
    }
}

/// Generate the ground truth trajectory
///
/// Starts at rest at the origin. Each later sample applies the acceleration
/// in effect at its own time:
/// - `v_k = v_{k-1} + a·dt`
/// - `p_k = p_{k-1} + v_{k-1}·dt + ½·a·dt²`
pub fn simulate_truth(config: &TrajectoryConfig) -> Result<Trajectory, EstimatorError> {
    config.validate()?;

    let n = config.num_samples();
    let dt = config.dt;
    let mut trajectory = Trajectory {
        time: (0..n).map(|k| k as f64 * dt).collect(),
        position: vec![0.0; n],
        velocity: vec![0.0; n],
        acceleration: vec![0.0; n],
    };

    for k in 1..n {
        let a = config.acceleration_at(trajectory.time[k]);
        trajectory.acceleration[k] = a;
        trajectory.velocity[k] = trajectory.velocity[k - 1] + a * dt;
        trajectory.position[k] =
            trajectory.position[k - 1] + trajectory.velocity[k - 1] * dt + 0.5 * a * dt * dt;
    }

    Ok(trajectory)
}

/// Sensor noise and availability
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorNoiseConfig {
    /// Accelerometer noise standard deviation, m/s²
    pub imu_noise_std: f64,
    /// Position-fix noise standard deviation, m
    pub gps_noise_std: f64,
    /// RNG seed
    pub seed: u64,
    /// A position fix is produced every `measurement_interval` ticks
    pub measurement_interval: usize,
}

impl Default for SensorNoiseConfig {
    fn default() -> Self {
        Self {
            imu_noise_std: 0.05,
            gps_noise_std: 1.5,
            seed: 1,
            measurement_interval: 1,
        }
    }
}

impl SensorNoiseConfig {
    fn validate(&self) -> Result<(), EstimatorError> {
        for (name, value) in [("imu_noise_std", self.imu_noise_std), ("gps_noise_std", self.gps_noise_std)] {
            if !value.is_finite() || value < 0.0 {
                return Err(EstimatorError::configuration(format!(
                    "{} must be finite and non-negative, got {}",
                    name, value
                )));
            }
        }
        if self.measurement_interval == 0 {
            return Err(EstimatorError::configuration("measurement_interval must be at least 1"));
        }
        Ok(())
    }
}

/// Turn a trajectory into the estimator's input stream
///
/// Control is the true acceleration plus accelerometer noise. The position fix
/// is the true position plus GPS noise on every `measurement_interval`-th tick
/// (tick 0 included) and absent otherwise. Deterministic for a given seed.
pub fn synthesize_ticks(
    truth: &Trajectory,
    config: &SensorNoiseConfig,
) -> Result<Vec<Tick>, EstimatorError> {
    config.validate()?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let imu = Normal::new(0.0, config.imu_noise_std)
        .map_err(|e| EstimatorError::configuration(format!("imu noise: {}", e)))?;
    let gps = Normal::new(0.0, config.gps_noise_std)
        .map_err(|e| EstimatorError::configuration(format!("gps noise: {}", e)))?;

    let ticks = (0..truth.len())
        .map(|k| {
            let control = truth.acceleration[k] + imu.sample(&mut rng);
            let fix = truth.position[k] + gps.sample(&mut rng);
            let measurement = (k % config.measurement_interval == 0).then_some(fix);
            Tick::scalar(control, measurement)
        })
        .collect();

    Ok(ticks)
}

/// Full demo scenario configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Truth trajectory
    #[serde(default)]
    pub trajectory: TrajectoryConfig,
    /// Sensor synthesis
    #[serde(default)]
    pub sensors: SensorNoiseConfig,
}

impl ScenarioConfig {
    /// Parse from JSON
    pub fn from_json(json: &str) -> Result<Self, EstimatorError> {
        serde_json::from_str(json)
            .map_err(|e| EstimatorError::configuration(format!("invalid scenario JSON: {}", e)))
    }

    /// Serialize to pretty-printed JSON string.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Truth plus the tick stream derived from it
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Ground truth
    pub truth: Trajectory,
    /// Input stream for the estimator
    pub ticks: Vec<Tick>,
}

/// Generate truth and ticks in one go
pub fn generate_scenario(config: &ScenarioConfig) -> Result<Scenario, EstimatorError> {
    let truth = simulate_truth(&config.trajectory)?;
    let ticks = synthesize_ticks(&truth, &config.sensors)?;
    Ok(Scenario { truth, ticks })
}
