//! Property tests for the state estimator
//!
//! Covariance invariants, monotonicity of the update, growth without
//! measurements, gain limits and convergence on noiseless data. Inputs come
//! from the seeded scenario generator so every run is reproducible.

use kinematic_kalman::common::linalg::{is_positive_semi_definite, is_symmetric, min_eigenvalue};
use kinematic_kalman::{
    generate_scenario, run_estimator, simulate_truth, synthesize_ticks, CovarianceUpdateForm,
    EstimatorConfig, EstimatorError, ModelParameters, NoiseTuning, ScenarioConfig,
    SensorNoiseConfig, StateEstimator, Tick, TrajectoryConfig,
};
use nalgebra::{DMatrix, DVector};

fn long_scenario(seed: u64, measurement_interval: usize) -> ScenarioConfig {
    let mut config = ScenarioConfig::default();
    config.trajectory.dt = 0.1;
    config.trajectory.total_time = 200.0;
    config.sensors.seed = seed;
    config.sensors.measurement_interval = measurement_interval;
    config
}

fn kinematic_estimator(dt: f64) -> StateEstimator {
    let model = ModelParameters::constant_acceleration_1d(dt, &NoiseTuning::default()).unwrap();
    StateEstimator::new(DVector::zeros(2), DMatrix::identity(2, 2) * 4.0, model).unwrap()
}

/// The worked example: dt = 1, Q = 0, R = 1, one tick with a = 1 and z = 0.6
#[test]
fn test_concrete_scenario() {
    let model = ModelParameters::new(
        DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 0.0, 1.0]),
        DMatrix::from_column_slice(2, 1, &[0.5, 1.0]),
        DMatrix::from_row_slice(1, 2, &[1.0, 0.0]),
        DMatrix::zeros(2, 2),
        DMatrix::from_element(1, 1, 1.0),
    )
    .unwrap();
    let mut estimator = StateEstimator::new(DVector::zeros(2), DMatrix::identity(2, 2), model).unwrap();

    let step = estimator
        .step(&DVector::from_element(1, 1.0), Some(&DVector::from_element(1, 0.6)))
        .unwrap();

    let tol = 1e-3;
    assert!((step.predicted.mean[0] - 0.5).abs() < tol);
    assert!((step.predicted.mean[1] - 1.0).abs() < tol);

    let p_pred = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 1.0]);
    assert!((&step.predicted.covariance - p_pred).amax() < tol);

    let gain = step.gain().unwrap();
    assert!((gain[(0, 0)] - 0.667).abs() < tol);
    assert!((gain[(1, 0)] - 0.333).abs() < tol);
    assert!((step.innovation().unwrap()[0] - 0.1).abs() < tol);
    assert!((step.innovation_covariance().unwrap()[(0, 0)] - 3.0).abs() < tol);

    assert!((step.posterior.mean[0] - 0.567).abs() < tol);
    assert!((step.posterior.mean[1] - 1.033).abs() < tol);
    let p_post = DMatrix::from_row_slice(2, 2, &[0.667, 0.333, 0.333, 0.667]);
    assert!((&step.posterior.covariance - p_post).amax() < tol);
}

/// Every returned covariance stays symmetric PSD over a long run
#[test]
fn test_covariance_invariant_over_long_run() {
    for form in [CovarianceUpdateForm::Standard, CovarianceUpdateForm::Joseph] {
        let scenario = generate_scenario(&long_scenario(7, 3)).unwrap();
        let model = ModelParameters::constant_acceleration_1d(0.1, &NoiseTuning::default()).unwrap();
        let config = EstimatorConfig::new().with_update_form(form);
        let mut estimator =
            StateEstimator::with_config(DVector::zeros(2), DMatrix::identity(2, 2) * 4.0, model, config)
                .unwrap();

        let history = run_estimator(&mut estimator, &scenario.ticks).unwrap();
        assert_eq!(history.len(), scenario.ticks.len());

        for step in &history {
            for p in [&step.predicted.covariance, &step.posterior.covariance] {
                assert!(is_symmetric(p, 1e-12), "tick {}: asymmetric {:?}", step.timestep, form);
                assert!(is_positive_semi_definite(p, 1e-9), "tick {}: not PSD", step.timestep);
                assert!(min_eigenvalue(p) > -1e-9);
            }
        }
    }
}

/// trace(P) never grows from a correction
#[test]
fn test_update_never_increases_uncertainty() {
    let scenario = generate_scenario(&long_scenario(11, 1)).unwrap();
    let mut estimator = kinematic_estimator(0.1);
    let history = run_estimator(&mut estimator, &scenario.ticks).unwrap();

    let mut corrected = 0;
    for step in &history {
        if step.was_corrected() {
            corrected += 1;
            let scale = step.predicted.trace().max(1.0);
            assert!(
                step.posterior.trace() <= step.predicted.trace() + 1e-12 * scale,
                "tick {}: {} > {}",
                step.timestep,
                step.posterior.trace(),
                step.predicted.trace()
            );
        }
    }
    assert_eq!(corrected, history.len());
}

/// Without measurements the uncertainty can only grow
#[test]
fn test_uncertainty_grows_without_measurements() {
    let truth = simulate_truth(&TrajectoryConfig::default()).unwrap();
    let mut ticks = synthesize_ticks(&truth, &SensorNoiseConfig::default()).unwrap();
    // Blackout from tick 6 onwards
    for tick in ticks.iter_mut().skip(6) {
        tick.measurement = None;
    }
    ticks.extend((0..40).map(|_| Tick::scalar(0.0, None)));

    let mut estimator = kinematic_estimator(0.5);
    let history = run_estimator(&mut estimator, &ticks).unwrap();

    let traces = history.posterior_traces();
    for k in 6..traces.len() {
        assert!(
            traces[k] >= traces[k - 1] - 1e-12,
            "trace shrank at tick {}: {} -> {}",
            k,
            traces[k - 1],
            traces[k]
        );
    }
    assert!(traces[traces.len() - 1] > 10.0 * traces[6]);
    assert_eq!(history.steps().iter().filter(|s| s.was_corrected()).count(), 6);
}

/// Huge sensor noise: measurement is ignored. No sensor noise: measurement is adopted.
#[test]
fn test_gain_limits() {
    let build = |r: f64| {
        let model = ModelParameters::new(
            DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.0, 1.0]),
            DMatrix::from_column_slice(2, 1, &[0.125, 0.5]),
            DMatrix::from_row_slice(1, 2, &[1.0, 0.0]),
            DMatrix::identity(2, 2) * 0.01,
            DMatrix::from_element(1, 1, r),
        )
        .unwrap();
        StateEstimator::new(DVector::from_vec(vec![1.0, 2.0]), DMatrix::identity(2, 2), model).unwrap()
    };
    let u = DVector::from_element(1, 0.0);
    let z = DVector::from_element(1, 50.0);

    let mut ignoring = build(1e12);
    let step = ignoring.step(&u, Some(&z)).unwrap();
    assert!(step.gain().unwrap().amax() < 1e-10);
    assert!((&step.posterior.mean - &step.predicted.mean).amax() < 1e-8);

    let mut trusting = build(0.0);
    let step = trusting.step(&u, Some(&z)).unwrap();
    assert!((step.gain().unwrap()[(0, 0)] - 1.0).abs() < 1e-12);
    assert!((step.posterior.mean[0] - 50.0).abs() < 1e-9);
    assert!(step.posterior.covariance[(0, 0)].abs() < 1e-9);

    // Gain shrinks monotonically as R grows
    let mut previous = f64::INFINITY;
    for r in [0.0, 0.01, 0.1, 1.0, 10.0, 100.0] {
        let mut estimator = build(r);
        let gain = estimator.step(&u, Some(&z)).unwrap().gain().unwrap()[(0, 0)];
        assert!(gain < previous);
        previous = gain;
    }
}

/// Q = 0, R = 0 and a noiseless stream from the same model: the estimate locks onto truth
#[test]
fn test_exact_model_converges_to_truth() {
    let trajectory = TrajectoryConfig::default();
    let truth = simulate_truth(&trajectory).unwrap();
    let sensors = SensorNoiseConfig {
        imu_noise_std: 0.0,
        gps_noise_std: 0.0,
        ..SensorNoiseConfig::default()
    };
    let ticks = synthesize_ticks(&truth, &sensors).unwrap();

    let dt = trajectory.dt;
    let model = ModelParameters::new(
        DMatrix::from_row_slice(2, 2, &[1.0, dt, 0.0, 1.0]),
        DMatrix::from_column_slice(2, 1, &[0.5 * dt * dt, dt]),
        DMatrix::from_row_slice(1, 2, &[1.0, 0.0]),
        DMatrix::zeros(2, 2),
        DMatrix::zeros(1, 1),
    )
    .unwrap();

    for p0 in [
        DMatrix::identity(2, 2),
        DMatrix::from_row_slice(2, 2, &[25.0, 3.0, 3.0, 9.0]),
    ] {
        let mut estimator =
            StateEstimator::new(DVector::from_vec(vec![5.0, -3.0]), p0, model.clone()).unwrap();
        let history = run_estimator(&mut estimator, &ticks).unwrap();

        for (k, step) in history.iter().enumerate().skip(1) {
            let error = &step.posterior.mean - truth.state(k);
            assert!(error.amax() < 1e-6, "tick {}: error {:?}", k, error);
        }
    }
}

#[test]
fn test_construction_errors() {
    let model = ModelParameters::constant_acceleration_1d(0.5, &NoiseTuning::default()).unwrap();

    let err = StateEstimator::new(DVector::zeros(3), DMatrix::identity(2, 2), model.clone()).unwrap_err();
    assert!(matches!(err, EstimatorError::DimensionMismatch { .. }));

    let not_psd = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]);
    let err = StateEstimator::new(DVector::zeros(2), not_psd, model.clone()).unwrap_err();
    assert!(matches!(err, EstimatorError::NonPositiveSemiDefinite { .. }));

    let asymmetric = DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.0, 1.0]);
    let err = StateEstimator::new(DVector::zeros(2), asymmetric, model).unwrap_err();
    assert!(matches!(err, EstimatorError::AsymmetricCovariance { .. }));

    // Control matrix with the wrong number of rows
    let err = ModelParameters::new(
        DMatrix::identity(2, 2),
        DMatrix::zeros(3, 1),
        DMatrix::from_row_slice(1, 2, &[1.0, 0.0]),
        DMatrix::zeros(2, 2),
        DMatrix::identity(1, 1),
    )
    .unwrap_err();
    assert!(matches!(err, EstimatorError::DimensionMismatch { .. }));

    // Negative measurement noise
    let err = ModelParameters::new(
        DMatrix::identity(2, 2),
        DMatrix::zeros(2, 1),
        DMatrix::from_row_slice(1, 2, &[1.0, 0.0]),
        DMatrix::zeros(2, 2),
        DMatrix::from_element(1, 1, -1.0),
    )
    .unwrap_err();
    assert!(matches!(err, EstimatorError::NonPositiveSemiDefinite { .. }));

    assert!(ModelParameters::constant_acceleration_1d(0.0, &NoiseTuning::default()).is_err());
    assert!(ModelParameters::constant_acceleration_1d(f64::NAN, &NoiseTuning::default()).is_err());
}

/// A singular correction mid-stream degrades that tick only
#[test]
fn test_dropped_correction_recovers() {
    // R = 0 and a state that starts certain: the first corrections are singular
    let model = ModelParameters::new(
        DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 0.0, 1.0]),
        DMatrix::from_column_slice(2, 1, &[0.5, 1.0]),
        DMatrix::from_row_slice(1, 2, &[1.0, 0.0]),
        DMatrix::from_row_slice(2, 2, &[0.0, 0.0, 0.0, 1.0]),
        DMatrix::zeros(1, 1),
    )
    .unwrap();
    let mut estimator = StateEstimator::new(DVector::zeros(2), DMatrix::zeros(2, 2), model).unwrap();

    let u = DVector::from_element(1, 0.0);
    let z = DVector::from_element(1, 1.0);

    // P_pred[0][0] = 0, so S = 0
    let first = estimator.step(&u, Some(&z)).unwrap();
    assert!(first.was_dropped());
    assert_eq!(first.posterior, first.predicted);
    assert!(matches!(
        first.correction,
        kinematic_kalman::CorrectionOutcome::Dropped(EstimatorError::SingularInnovationCovariance { .. })
    ));

    // Velocity uncertainty has now leaked into position
    let second = estimator.step(&u, Some(&z)).unwrap();
    assert!(second.was_corrected());
    assert!((second.posterior.mean[0] - 1.0).abs() < 1e-12);
    assert_eq!(estimator.dropped_corrections(), 1);
    assert_eq!(estimator.timestep(), 2);
}

#[test]
fn test_joseph_form_agrees_with_standard() {
    let scenario = generate_scenario(&ScenarioConfig::default()).unwrap();
    let run = |form| {
        let model = ModelParameters::constant_acceleration_1d(0.5, &NoiseTuning::default()).unwrap();
        let config = EstimatorConfig::new().with_update_form(form);
        let mut estimator =
            StateEstimator::with_config(DVector::zeros(2), DMatrix::identity(2, 2) * 4.0, model, config)
                .unwrap();
        run_estimator(&mut estimator, &scenario.ticks).unwrap()
    };

    let standard = run(CovarianceUpdateForm::Standard);
    let joseph = run(CovarianceUpdateForm::Joseph);
    for (a, b) in standard.iter().zip(joseph.iter()) {
        assert!((&a.posterior.mean - &b.posterior.mean).amax() < 1e-9);
        assert!((&a.posterior.covariance - &b.posterior.covariance).amax() < 1e-9);
    }
}
