//! Simulated magnetometer calibration.
//!
//! Tumbles a simulated magnetometer through evenly spread orientations, adds a
//! hard-iron bias and gaussian noise to every reading, and feeds the readings
//! to a calibration session until it completes.

use std::f32::consts::PI;

use clap::Parser;
use log::{info, warn};
use magcal::{params::ram::RamParams, CalibrationSession, MagCalib, MagParams};
use nalgebra::Vector3;
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};

#[derive(clap::Parser)]
struct Args {
    /// Number of samples collected before fitting
    #[clap(short, long, default_value_t = magcal::consts::MAG_SAMPLES)]
    samples: usize,

    /// Maximum number of sphere fit iterations
    #[clap(short = 'i', long, default_value_t = magcal::consts::MAG_MAX_ITERATIONS)]
    max_iterations: u32,

    /// Simulated hard-iron bias, comma separated
    #[clap(short, long, value_delimiter = ',', default_value = "0.12,-0.31,0.05")]
    bias: Vec<f32>,

    /// Strength of the simulated earth field
    #[clap(short, long, default_value_t = 0.48)]
    field: f32,

    /// Standard deviation of the sensor noise on each axis
    #[clap(short, long, default_value_t = 0.002)]
    noise: f32,

    /// Seed of the noise generator
    #[clap(long, default_value_t = 0)]
    seed: u64,
}

/// Applies bias and noise to ideal readings.
struct Distortion {
    bias: Vector3<f32>,
    noise: Normal<f32>,
    rng: StdRng,
}

impl Distortion {
    fn apply(&mut self, ideal: Vector3<f32>) -> Vector3<f32> {
        let noise = Vector3::new(
            self.noise.sample(&mut self.rng),
            self.noise.sample(&mut self.rng),
            self.noise.sample(&mut self.rng),
        );
        ideal + self.bias + noise
    }
}

/// Direction of the field in the sensor frame for step `i` of a maneuver with `n` steps.
fn maneuver_direction(i: usize, n: usize) -> Vector3<f32> {
    let golden_angle = PI * (3.0 - 5.0f32.sqrt());
    let z = 1.0 - 2.0 * (i as f32 + 0.5) / n as f32;
    let r = (1.0 - z * z).sqrt();
    let theta = golden_angle * i as f32;
    Vector3::new(r * theta.cos(), r * theta.sin(), z)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let [bx, by, bz] = <[f32; 3]>::try_from(args.bias.as_slice())
        .map_err(|_| "the bias must have exactly three components")?;

    let mut sensor = Distortion {
        bias: Vector3::new(bx, by, bz),
        noise: Normal::new(0.0, args.noise)?,
        rng: StdRng::seed_from_u64(args.seed),
    };

    let config = MagCalib::default()
        .capacity(args.samples)
        .max_iterations(args.max_iterations);

    let mut params = RamParams::<8>::new();
    let mut session = CalibrationSession::from_params(config, &mut params);

    session.start()?;

    let mut reported = 0;
    let mut step = 0;
    loop {
        let ideal = maneuver_direction(step, args.samples) * args.field;
        let reading = sensor.apply(ideal);
        step += 1;

        if session.update(reading.into())? {
            break;
        }

        let progress = session.progress();
        if progress >= reported + 10 {
            reported = progress;
            info!("Collecting samples: {}%", progress);
        }
    }

    let calibration = *session.calibration();
    session.end(&mut params)?;

    let stored = MagParams::define(&mut params);
    info!(
        "Stored offset: {:?}, radius: {}",
        stored.offset, stored.radius
    );

    let error = (calibration.offset - sensor.bias).norm();
    info!(
        "Offset error: {:.5}, radius error: {:.5}",
        error,
        (calibration.radius - args.field).abs()
    );

    let live = calibration.apply(sensor.apply(maneuver_direction(0, 4) * args.field));
    if session.is_valid(live.into()) {
        info!(
            "Corrected live reading passes the validity check, magnitude: {:.4}",
            live.norm()
        );
    } else {
        warn!("Corrected live reading fails the validity check");
    }

    Ok(())
}
