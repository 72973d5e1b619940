//! 1D position/velocity Kalman filter example
//!
//! Simulates a speed-up / coast / brake motion, synthesizes noisy accelerometer
//! and position-fix readings, runs the estimator over them and prints every
//! PREDICT/UPDATE step followed by a truth-vs-estimate table.
//!
//! Run with `RUST_LOG=debug` to see the estimator's own log output.

use clap::Parser;
use kinematic_kalman::{
    generate_scenario, run_estimator, CovarianceUpdateForm, EstimatorConfig,
    LoggingReporter, ModelParameters, NoiseTuning, ScenarioConfig, StateEstimator, TableFormatter,
};
use nalgebra::{DMatrix, DVector};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Time step in seconds
    #[arg(long, default_value_t = 0.5)]
    dt: f64,

    /// Simulation length in seconds
    #[arg(short, long, default_value_t = 8.0)]
    total_time: f64,

    /// Random seed for the sensor noise
    #[arg(short, long, default_value_t = 1)]
    seed: u64,

    /// Accelerometer noise standard deviation (m/s²)
    #[arg(long, default_value_t = 0.05)]
    imu_noise: f64,

    /// Position-fix noise standard deviation (m), also the filter's R; ignored with --config
    #[arg(long, default_value_t = 1.5)]
    gps_noise: f64,

    /// Process noise tuning for the filter (m/s²)
    #[arg(long, default_value_t = 0.2)]
    accel_process_noise: f64,

    /// Deliver a position fix every N ticks
    #[arg(short = 'n', long, default_value_t = 1)]
    measurement_interval: usize,

    /// Print every N-th tick
    #[arg(short, long, default_value_t = 1)]
    print_every: usize,

    /// Use the Joseph-form covariance update
    #[arg(long)]
    joseph: bool,

    /// Scenario JSON file (overrides the trajectory/sensor flags)
    #[arg(short, long)]
    config: Option<String>,
}

fn load_scenario(args: &Args) -> ScenarioConfig {
    if let Some(path) = &args.config {
        let json = match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) => {
                eprintln!("Cannot read {}: {}", path, e);
                std::process::exit(1);
            }
        };
        return match ScenarioConfig::from_json(&json) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{}", e);
                std::process::exit(1);
            }
        };
    }

    let mut scenario = ScenarioConfig::default();
    scenario.trajectory.dt = args.dt;
    scenario.trajectory.total_time = args.total_time;
    scenario.sensors.seed = args.seed;
    scenario.sensors.imu_noise_std = args.imu_noise;
    scenario.sensors.gps_noise_std = args.gps_noise;
    scenario.sensors.measurement_interval = args.measurement_interval;
    scenario
}

/// R is the scenario's position-fix noise, whether it came from --config or --gps-noise
fn filter_tuning(args: &Args, scenario: &ScenarioConfig) -> NoiseTuning {
    NoiseTuning::new(args.accel_process_noise, scenario.sensors.gps_noise_std)
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    let scenario_config = load_scenario(&args);
    let dt = scenario_config.trajectory.dt;

    println!("Baby Kalman Filter Example (1D)");
    println!("=====================================");
    println!("Time step: {} s", dt);
    println!("Simulation length: {} s", scenario_config.trajectory.total_time);
    println!("Seed: {}", scenario_config.sensors.seed);
    println!("IMU noise: {} m/s²", scenario_config.sensors.imu_noise_std);
    println!("GPS noise: {} m", scenario_config.sensors.gps_noise_std);
    println!("Measurement interval: {}", scenario_config.sensors.measurement_interval);
    println!();

    let scenario = match generate_scenario(&scenario_config) {
        Ok(scenario) => scenario,
        Err(e) => {
            eprintln!("Scenario generation failed: {}", e);
            std::process::exit(1);
        }
    };

    let tuning = filter_tuning(&args, &scenario_config);
    let model = match ModelParameters::constant_acceleration_1d(dt, &tuning) {
        Ok(model) => model,
        Err(e) => {
            eprintln!("Invalid model: {}", e);
            std::process::exit(1);
        }
    };

    let form = if args.joseph {
        CovarianceUpdateForm::Joseph
    } else {
        CovarianceUpdateForm::Standard
    };
    let config = EstimatorConfig::new().with_update_form(form);

    // Initial guess: at rest at the origin, quite unsure
    let estimator = StateEstimator::with_config(
        DVector::zeros(2),
        DMatrix::identity(2, 2) * 4.0,
        model,
        config,
    );
    let mut estimator = match estimator {
        Ok(estimator) => estimator.with_reporter(LoggingReporter::verbose()),
        Err(e) => {
            eprintln!("Invalid prior: {}", e);
            std::process::exit(1);
        }
    };

    println!("Running filter over {} ticks...", scenario.ticks.len());
    let start_time = std::time::Instant::now();
    let history = match run_estimator(&mut estimator, &scenario.ticks) {
        Ok(history) => history,
        Err(e) => {
            eprintln!("Filter failed at tick {}: {}", estimator.timestep(), e);
            std::process::exit(1);
        }
    };
    let elapsed = start_time.elapsed();
    println!();

    let formatter = TableFormatter::new(dt);
    let print_every = args.print_every.max(1);
    for step in history.iter().filter(|s| s.timestep % print_every == 0) {
        print!("{}", formatter.format_step(step));
    }

    println!();
    println!("Final comparison (true vs estimated):");
    print!("{}", formatter.format_comparison(&scenario.truth, &history));

    println!();
    println!("Filter completed in {:.3} ms", elapsed.as_secs_f64() * 1000.0);
    println!("Dropped corrections: {}", estimator.dropped_corrections());
    if let Some(last) = history.last_posterior() {
        let sd = last.std_devs();
        println!("Final 1-sigma: position {:.3} m, velocity {:.3} m/s", sd[0], sd[1]);
    }
}
